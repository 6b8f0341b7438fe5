//! C1: stack allocation, framing, and release.
//!
//! Grounded in `up_create_stack`/`up_use_stack`/`up_stack_frame`/
//! `up_release_stack` in the hosted port, which allocate from one of two
//! heaps selected by task type, trim sizes to 4-byte multiples, and leave a
//! one-word guard at the top of any reserved argument frame.

use crate::arch::StackAllocator;
use crate::error::{Error, Result};
use crate::tcb::{Stack, Tcb};
use core::alloc::Layout;
use core::mem::size_of;
use core::ptr::NonNull;

/// Selects which of the two segregated heaps a stack operation uses.
/// Kernel-thread tasks use the kernel allocator when a distinct kernel heap
/// exists; user tasks use the user allocator.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TaskType {
    Kernel,
    User,
}

fn round_up_4(n: usize) -> usize {
    (n + 3) & !3
}

/// The required alignment of `stack.adj_base`: the architecture's saved
/// register frame is pushed downward from here.
const ADJ_BASE_ALIGN: usize = 8;

/// `adj_base` is the address of the highest usable word: one `ADJ_BASE_ALIGN`
/// word below the buffer's top (the stack grows downward, so the top itself
/// is one-past-the-end, not a usable address), rounded down to 8 bytes.
/// Matches `nuttx.c`'s `&stack_alloc_ptr[adj_stack_words - 1] & ~7` — the
/// last word's address, then aligned. `adj_size` is independent of that
/// pointer rounding (the original stores `adj_stack_size` straight from the
/// caller's 4-byte-rounded size, not reduced by whatever `adj_base` trims
/// off the top); it is only ever trimmed to a multiple of 4.
fn compute_adjusted(base: NonNull<u8>, size: usize) -> (usize, usize) {
    let top = base.as_ptr() as usize + size;
    let adj_base = top.saturating_sub(ADJ_BASE_ALIGN) & !(ADJ_BASE_ALIGN - 1);
    let adj_size = size & !3;
    (adj_base, adj_size)
}

/// Allocate `requested_size` bytes (rounded up to a multiple of 4) from the
/// allocator matching `task_type` and wire the result into `tcb.stack`.
///
/// Idempotent on failure: the TCB's stack fields are left in the null state.
pub fn create<C>(
    tcb: &mut Tcb<C>,
    requested_size: usize,
    task_type: TaskType,
    kernel: &dyn StackAllocator,
    user: &dyn StackAllocator,
) -> Result<()> {
    let size = round_up_4(requested_size);
    let layout = Layout::from_size_align(size, ADJ_BASE_ALIGN).map_err(|_| Error::NoMemory)?;
    let allocator: &dyn StackAllocator = match task_type {
        TaskType::Kernel => kernel,
        TaskType::User => user,
    };
    let base = allocator.alloc(layout).ok_or(Error::NoMemory)?;
    let (adj_base, adj_size) = compute_adjusted(base, size);
    tcb.stack = Stack {
        base: Some(base),
        size,
        adj_base,
        adj_size,
    };
    Ok(())
}

/// Use a caller-provided buffer without transferring ownership to an
/// allocator. `size` is trimmed down to a multiple of 4 before computing
/// `adj_base`. Never fails.
pub fn adopt<C>(tcb: &mut Tcb<C>, buffer: NonNull<u8>, size: usize) {
    let trimmed = size & !3;
    let (adj_base, adj_size) = compute_adjusted(buffer, trimmed);
    tcb.stack = Stack {
        base: Some(buffer),
        size: trimmed,
        adj_base,
        adj_size,
    };
}

/// Reserve `round_up(frame_size, 4)` bytes at the top of the stack for an
/// in-stack argument frame, resetting the initial register state on it via
/// `reset_initial_state`.
///
/// Returns a pointer past one machine-word guard, or `None` if there is no
/// stack or the requested frame would consume the guard word (the check is
/// strict greater-or-equal: a frame exactly `adj_size` leaves no guard).
pub fn frame<C>(
    tcb: &mut Tcb<C>,
    frame_size: usize,
    reset_initial_state: impl FnOnce(NonNull<u8>, usize, &mut Tcb<C>),
) -> Option<NonNull<u8>> {
    if !tcb.stack.is_allocated() {
        return None;
    }
    let requested = round_up_4(frame_size);
    if requested >= tcb.stack.adj_size {
        return None;
    }

    let guard = size_of::<usize>();
    let new_adj_size = tcb.stack.adj_size - requested;
    let frame_top = tcb.stack.adj_base - requested;
    let ptr = NonNull::new(frame_top as *mut u8)?;
    let entry = tcb.entry;
    tcb.stack.adj_size = new_adj_size;
    reset_initial_state(ptr, entry, tcb);
    NonNull::new((frame_top + guard) as *mut u8)
}

/// Release the stack via the matching allocator and clear the TCB's stack
/// fields. A no-op if the TCB has no stack allocated.
pub fn release<C>(
    tcb: &mut Tcb<C>,
    task_type: TaskType,
    kernel: &dyn StackAllocator,
    user: &dyn StackAllocator,
) {
    let Some(base) = tcb.stack.base else {
        return;
    };
    let Ok(layout) = Layout::from_size_align(tcb.stack.size, ADJ_BASE_ALIGN) else {
        return;
    };
    let allocator: &dyn StackAllocator = match task_type {
        TaskType::Kernel => kernel,
        TaskType::User => user,
    };
    unsafe { allocator.dealloc(base, layout) };
    tcb.stack = Stack::empty();
}
