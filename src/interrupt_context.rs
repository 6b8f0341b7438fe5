//! C3: interrupt-context tracking.
//!
//! A single nesting counter, incremented on entry and decremented on exit.
//! `in_interrupt()` is the predicate everything else in this crate (C2's
//! switch guard, C4's block/unblock preconditions, C8's assert routing)
//! consults to tell a task context from an interrupt handler's.
//!
//! Grounded in `up_interrupt_context()` from the hosted port, which reads a
//! single global nesting counter maintained by the IRQ entry/exit stubs; we
//! keep the same "just a counter" shape rather than a boolean, since nested
//! interrupts (an NMI landing inside a timer ISR) must not make the outer
//! handler's exit look like a return to task context.

use core::sync::atomic::{AtomicU32, Ordering};

static DEPTH: AtomicU32 = AtomicU32::new(0);

/// Called by the arch-specific IRQ entry stub before running a handler.
pub fn enter() {
    DEPTH.fetch_add(1, Ordering::SeqCst);
}

/// Called by the arch-specific IRQ entry stub after a handler returns.
///
/// # Panics
/// If called with no matching `enter()` — an arch stub bug, not a recoverable
/// runtime condition.
pub fn leave() {
    let prev = DEPTH.fetch_sub(1, Ordering::SeqCst);
    assert!(prev > 0, "interrupt_context::leave without matching enter");
}

/// True whenever at least one interrupt handler is currently executing,
/// including nested ones.
pub fn in_interrupt() -> bool {
    DEPTH.load(Ordering::SeqCst) > 0
}

/// Current nesting depth, mostly useful for assertions in tests.
pub fn depth() -> u32 {
    DEPTH.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // DEPTH is a single process-wide global; serialize the tests that touch
    // it so they don't interleave.
    static GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn starts_outside_interrupt_context() {
        let _g = GUARD.lock().unwrap();
        assert_eq!(depth(), 0);
        assert!(!in_interrupt());
    }

    #[test]
    fn enter_leave_is_balanced() {
        let _g = GUARD.lock().unwrap();
        enter();
        assert!(in_interrupt());
        enter();
        assert_eq!(depth(), 2);
        leave();
        assert!(in_interrupt());
        leave();
        assert!(!in_interrupt());
    }

    #[test]
    #[should_panic(expected = "without matching enter")]
    fn leave_without_enter_panics() {
        let _g = GUARD.lock().unwrap();
        // depth is already 0 here since the previous test balanced its own
        // enter/leave calls before releasing the guard.
        leave();
    }
}
