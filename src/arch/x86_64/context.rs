//! The register-save leaf (C2's actual mechanism on x86-64).
//!
//! Six callee-saved GPRs plus `rflags`, saved/restored with the classic
//! `push`-everything/swap-`rsp`/`pop`-everything sequence a naked-asm Sys-V
//! context switch uses. Only a raw stack pointer carries the saved state
//! between calls — the pushed registers live on the task's own stack; this
//! crate's `Arch` contract asks for a `Context` value the caller
//! (`Tcb::context`) owns directly, so `Context` here is a one-field wrapper
//! around that same saved `rsp`, only the handle to the pushed registers
//! moved into a named field.

use core::arch::naked_asm;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Context {
    pub rsp: u64,
}

/// Number of 8-byte words pushed by [`save_context`]/popped by
/// [`restore_context`]: rbx, rbp, r12, r13, r14, r15, rflags.
const SAVED_WORDS: usize = 7;

/// Build a fresh frame at the top of `stack_top` (must be 8-byte aligned,
/// per §3 invariant 3) such that resuming it starts execution at `entry`
/// with interrupts enabled and the six callee-saved GPRs zeroed. Shared by
/// `Arch::initial_state` and `Arch::trampoline_state` — the only difference
/// between priming a brand new task and arranging a signal trampoline is
/// which function pointer execution resumes at.
pub fn build_initial_state(entry: usize, stack_top: usize) -> Context {
    // Interrupts-enabled rflags (IF, bit 9); every other flag clear.
    const RFLAGS_IF: u64 = 1 << 9;

    let mut addr = stack_top as u64;
    let mut push = |value: u64| {
        addr -= 8;
        unsafe { (addr as *mut u64).write(value) };
    };

    push(entry as u64); // consumed by `ret`, not popped by name
    push(0); // rbx
    push(0); // rbp
    push(0); // r12
    push(0); // r13
    push(0); // r14
    push(0); // r15
    push(RFLAGS_IF);

    Context { rsp: addr }
}

/// Switch from `from` (if any) to `to`. See [`crate::arch::Arch::switch`]
/// for the full contract; this is the raw leaf, with no no-op-on-self or
/// not-in-interrupt checks of its own — [`crate::context::switch`] enforces
/// those before ever reaching here.
///
/// # Safety
/// `to` must hold a context built by [`build_initial_state`] or previously
/// saved by this function; `from`, if given, must be valid for a write of a
/// `Context`.
pub unsafe fn switch(from: Option<*mut Context>, to: *mut Context) {
    let to_rsp = unsafe { (*to).rsp };
    match from {
        Some(from) => unsafe { switch_stacks(from, to_rsp) },
        None => unsafe { resume_stack(to_rsp) },
    }
}

/// Save the caller's registers onto its own stack, stash the resulting `rsp`
/// into `*from`, switch to `to_rsp`, and restore from there. Returns to the
/// caller of this function exactly as if it had simply returned, whenever
/// some later `switch` targets `from` again.
#[unsafe(naked)]
unsafe extern "sysv64" fn switch_stacks(from: *mut Context, to_rsp: u64) {
    naked_asm!(
        "push rbx",
        "push rbp",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "pushfq",
        "mov [rdi], rsp", // from->rsp = rsp  (Context is repr(C) { rsp: u64 }, offset 0)
        "mov rsp, rsi",
        "popfq",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbp",
        "pop rbx",
        "ret",
    );
}

/// Load `to_rsp` with nothing to save — used from `exit_current` and
/// `deliver`, where the caller's own context is intentionally discarded.
#[unsafe(naked)]
unsafe extern "sysv64" fn resume_stack(to_rsp: u64) {
    naked_asm!(
        "mov rsp, rdi",
        "popfq",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbp",
        "pop rbx",
        "ret",
    );
}

const _: () = assert!(SAVED_WORDS == 7);
