//! Hosted backend: a virtual CPU whose context switch is a plain function
//! call swapping saved register sets, whose heap comes straight from the
//! global allocator, and whose interrupt context is whatever
//! [`crate::interrupt_context`] says it is.
//!
//! Modeled on NuttX's `arch/rgmp`, which runs each task as a host thread and
//! represents a context switch as a function call rather than a
//! register-level trap. It does not actually transfer control between two
//! live call stacks —
//! nothing in this crate drives two cooperating stacks end to end without a
//! real scheduler loop — so `switch` here is a faithful test double: it
//! performs the bookkeeping C2's contract promises (no-op on self, refuses
//! interrupt context, skips the save when `from` is null) without pretending
//! to execute borrowed machine code.

use crate::arch::{Arch, IrqFlags, StackAllocator};
use crate::interrupt_context;
use alloc::alloc::{alloc, dealloc};
use core::alloc::Layout;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

/// Saved register set for the hosted backend.
///
/// Real ports store actual register contents; this one stores what a test
/// needs to assert the switch happened: where it would have resumed
/// (`entry`/`stack_top`, set by [`SimArch::initial_state`] /
/// [`SimArch::trampoline_state`]), whether it has been saved at least once,
/// and how many times it has been resumed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Context {
    pub entry: usize,
    pub stack_top: usize,
    pub saved: bool,
    pub resumed: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags(bool);

impl IrqFlags for Flags {}

static IRQS_ENABLED: AtomicBool = AtomicBool::new(true);

pub struct SimArch;

impl Arch for SimArch {
    type Context = Context;
    type Flags = Flags;

    unsafe fn switch(from: Option<*mut Self::Context>, to: *mut Self::Context) {
        if interrupt_context::in_interrupt() {
            panic!("SimArch::switch: attempted context switch from interrupt context");
        }
        if let Some(from) = from {
            if from == to {
                return;
            }
            unsafe {
                (*from).saved = true;
            }
        }
        unsafe {
            (*to).resumed += 1;
        }
    }

    fn initial_state(entry: usize, stack_top: usize) -> Self::Context {
        Context {
            entry,
            stack_top,
            saved: false,
            resumed: 0,
        }
    }

    fn trampoline_state(trampoline_entry: usize, stack_top: usize) -> Self::Context {
        Context {
            entry: trampoline_entry,
            stack_top,
            saved: false,
            resumed: 0,
        }
    }

    fn stack_pointer_of(ctx: &Self::Context) -> usize {
        ctx.stack_top
    }

    fn irq_save() -> Self::Flags {
        let prev = IRQS_ENABLED.swap(false, Ordering::SeqCst);
        Flags(prev)
    }

    fn irq_restore(flags: Self::Flags) {
        IRQS_ENABLED.store(flags.0, Ordering::SeqCst);
    }

    fn irqs_enabled() -> bool {
        IRQS_ENABLED.load(Ordering::SeqCst)
    }

    fn enable_irqs() {
        IRQS_ENABLED.store(true, Ordering::SeqCst);
    }

    fn disable_irqs() {
        IRQS_ENABLED.store(false, Ordering::SeqCst);
    }

    fn halt() {
        core::hint::spin_loop();
    }
}

/// Plain global-allocator-backed heap, standing in for the kernel/user heap
/// split a real port would have.
pub struct HeapAllocator;

unsafe impl StackAllocator for HeapAllocator {
    fn alloc(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }
        let ptr = unsafe { alloc(layout) };
        NonNull::new(ptr)
    }

    unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { dealloc(ptr.as_ptr(), layout) };
    }
}
