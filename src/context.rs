//! C2: the portable context-switch wrapper.
//!
//! [`crate::arch::Arch::switch`] is the architecture's raw leaf primitive;
//! this module wraps it with the two rules every caller in [`crate::sched`]
//! and [`crate::signal`] gets for free instead of having to reimplement:
//! switching to yourself is a no-op, and switching from interrupt context is
//! a bug, not a runtime state to handle.
//!
//! Grounded in the hosted port's `up_switchcontext`, which short-circuits
//! `tcb == rtcb` before touching any register state and which is never
//! reachable from the IRQ path in the first place (the scheduler only calls
//! it from `sched_unlock`/task-exit paths that run with interrupts enabled
//! at task level).

use crate::arch::Arch;
use crate::interrupt_context;

/// Switch from `from` (the currently running context, if there is one) to
/// `to`. A no-op if `from` and `to` are the same context slot.
///
/// # Panics
/// If called from interrupt context.
///
/// # Safety
/// Same obligations as [`Arch::switch`]: `to` must hold a context previously
/// produced by `Arch::initial_state`/`Arch::trampoline_state`/a prior
/// `switch`, and `from`, if given, must be valid for writes.
pub unsafe fn switch<A: Arch>(from: Option<*mut A::Context>, to: *mut A::Context) {
    assert!(
        !interrupt_context::in_interrupt(),
        "context switch attempted from interrupt context"
    );
    if let Some(from) = from {
        if from == to {
            return;
        }
    }
    unsafe { A::switch(from, to) };
}
