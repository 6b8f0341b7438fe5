//! C5: asynchronous signal delivery.
//!
//! Grounded in `up_schedule_sigaction`/`up_sigdeliver` in the hosted port.
//! The three-way split (already pending / self / other task) and the
//! synthetic-frame trampoline protocol are both taken directly from there;
//! §9 replaces the original's `push_xcpt`/`pop_xcpt` pointer juggling with
//! the two explicit `Tcb` fields `sig_pending_handler` and `pending_frame`.

use crate::arch::Arch;
use crate::interrupt_context;
use crate::sched::Scheduler;
use crate::tcb::{SignalHandler, TaskId, Tcb};
use spin::Once;

/// Schedule `handler` to run against `id`. Global interrupts are disabled
/// internally for the duration of the call.
///
/// * If `id` already has a pending handler, this is a no-op (§3 invariant 6:
///   never more than one).
/// * If `id` is the current task and we're not servicing an interrupt, the
///   handler runs synchronously before this function returns.
/// * If `id` is the current task and we are servicing an interrupt, the
///   handler is stashed for the IRQ return path to pick up.
/// * Otherwise a synthetic context is pushed so the next dispatch to `id`
///   runs [`deliver`] instead of resuming normally.
pub fn schedule_sigaction<C, A, S>(sched: &mut S, id: TaskId, handler: SignalHandler<C>)
where
    A: Arch<Context = C>,
    S: Scheduler<C>,
    C: Default,
{
    let flags = A::irq_save();

    if sched.tcb(id).sig_pending_handler.is_some() {
        A::irq_restore(flags);
        return;
    }

    let current = sched.this_task();
    if id == current {
        if interrupt_context::in_interrupt() {
            sched.tcb_mut(id).sig_pending_handler = Some(handler);
        } else {
            handler(sched.tcb_mut(id));
        }
        A::irq_restore(flags);
        return;
    }

    sched.tcb_mut(id).sig_pending_handler = Some(handler);
    push_synthetic_frame::<C, A>(sched.tcb_mut(id));
    A::irq_restore(flags);
}

/// Sets `tcb`'s real (live) context aside in `pending_frame` and installs a
/// trampoline frame in its place, so the next dispatch onto `tcb` runs
/// [`trampoline_entry`]/[`deliver`] instead of resuming normally.
fn push_synthetic_frame<C, A>(tcb: &mut Tcb<C>)
where
    A: Arch<Context = C>,
    C: Default,
{
    let real = core::mem::take(&mut tcb.context);
    let stack_top = A::stack_pointer_of(&real);
    tcb.pending_frame = Some(real);
    tcb.context = A::trampoline_state(trampoline_entry::<C, A> as usize, stack_top);
}

/// Installed once at boot by the concrete OS, so that the architecture-level
/// trampoline stub (a plain `fn()`, unaware of the scheduler's concrete
/// types) can reach [`deliver`] for whatever `Scheduler`/`Arch` pair that OS
/// was built with. Mirrors the hosted port's single global `current_task`
/// and `sigdeliver` hook — both process-wide singletons rather than
/// generic parameters threaded through every call site.
pub static DELIVER_HOOK: Once<fn()> = Once::new();

/// Installs the concrete `deliver` closure. Call once during bootstrap
/// before any `schedule_sigaction` targeting a non-current task can fire.
pub fn install_deliver_hook(hook: fn()) {
    DELIVER_HOOK.call_once(|| hook);
}

extern "C" fn trampoline_entry<C, A>() -> !
where
    A: Arch<Context = C>,
{
    (DELIVER_HOOK
        .get()
        .expect("signal trampoline entered before install_deliver_hook"))();
    unreachable!("deliver() must not return")
}

/// Runs the pending handler with IRQs enabled, then either switches into
/// the restored context or returns normally, depending on whether a
/// synthetic frame was pushed.
///
/// Called from the installed deliver hook with the target's own `Tcb`. Two
/// callers reach this, per §4.5:
///
/// * The trampoline (`trampoline_entry`), resumed in place of a suspended
///   other-task target — `pending_frame` holds the real context
///   `schedule_sigaction` set aside, and delivery ends with a `switch` into
///   it, never returning here.
/// * The IRQ return path, for a handler scheduled against the current task
///   while servicing an interrupt — no frame was ever pushed (the task was
///   never suspended), so there is nothing to pop or switch into; this
///   returns normally and the IRQ return path resumes as usual.
pub fn deliver<C, A>(tcb: &mut Tcb<C>)
where
    A: Arch<Context = C>,
{
    let pending_frame = tcb.pending_frame.take();
    let handler = tcb
        .sig_pending_handler
        .take()
        .expect("deliver: no sig_pending_handler");

    A::enable_irqs();
    handler(tcb);
    A::disable_irqs();

    if let Some(mut real) = pending_frame {
        unsafe { crate::context::switch::<A>(None, &mut real as *mut C) };
        unreachable!("deliver: switch(None, _) must not return")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::{Context, SimArch};
    use crate::tcb::Priority;
    use alloc::collections::BTreeMap;

    struct OneTaskScheduler {
        tcbs: BTreeMap<TaskId, Tcb<Context>>,
        current: TaskId,
    }

    impl Scheduler<Context> for OneTaskScheduler {
        fn add_ready_to_run(&mut self, _id: TaskId) -> bool {
            false
        }
        fn remove_ready_to_run(&mut self, _id: TaskId) -> bool {
            false
        }
        fn add_blocked(&mut self, _id: TaskId, _state: crate::tcb::TaskState) {}
        fn remove_blocked(&mut self, _id: TaskId) {}
        fn merge_pending(&mut self) -> bool {
            false
        }
        fn pending_is_empty(&self) -> bool {
            true
        }
        fn suspend_scheduler(&mut self, _id: TaskId) {}
        fn resume_scheduler(&mut self, _id: TaskId) {}
        fn this_task(&self) -> TaskId {
            self.current
        }
        fn task_exit(&mut self) {}
        fn tcb(&self, id: TaskId) -> &Tcb<Context> {
            &self.tcbs[&id]
        }
        fn tcb_mut(&mut self, id: TaskId) -> &mut Tcb<Context> {
            self.tcbs.get_mut(&id).unwrap()
        }
    }

    const T1: TaskId = TaskId(1);
    const T2: TaskId = TaskId(2);

    static CALLS: core::sync::atomic::AtomicU32 = core::sync::atomic::AtomicU32::new(0);

    fn bump_handler(_tcb: &mut Tcb<Context>) {
        CALLS.fetch_add(1, core::sync::atomic::Ordering::SeqCst);
    }

    fn new_sched() -> OneTaskScheduler {
        let mut tcbs = BTreeMap::new();
        tcbs.insert(T1, Tcb::new(T1, Priority::clamped(100), 0));
        tcbs.insert(T2, Tcb::new(T2, Priority::clamped(100), 0));
        OneTaskScheduler { tcbs, current: T1 }
    }

    #[test]
    fn self_signal_outside_interrupt_runs_synchronously() {
        CALLS.store(0, core::sync::atomic::Ordering::SeqCst);
        let mut s = new_sched();
        schedule_sigaction::<Context, SimArch, _>(&mut s, T1, bump_handler);
        assert_eq!(CALLS.load(core::sync::atomic::Ordering::SeqCst), 1);
        assert!(s.tcb(T1).sig_pending_handler.is_none());
    }

    #[test]
    fn second_schedule_before_delivery_is_a_noop() {
        let mut s = new_sched();
        schedule_sigaction::<Context, SimArch, _>(&mut s, T2, bump_handler);
        assert!(s.tcb(T2).sig_pending_handler.is_some());
        schedule_sigaction::<Context, SimArch, _>(&mut s, T2, bump_handler);
        // still exactly one pending handler; the second call changed nothing
        assert!(s.tcb(T2).sig_pending_handler.is_some());
    }

    #[test]
    fn other_task_gets_a_synthetic_frame_pushed() {
        let mut s = new_sched();
        schedule_sigaction::<Context, SimArch, _>(&mut s, T2, bump_handler);
        assert!(s.tcb(T2).pending_frame.is_some());
        assert_eq!(
            s.tcb(T2).context.entry,
            trampoline_entry::<Context, SimArch> as usize
        );
    }

    #[test]
    fn self_signal_in_interrupt_stashes_handler_without_pushing_a_frame() {
        let mut s = new_sched();
        interrupt_context::enter();
        schedule_sigaction::<Context, SimArch, _>(&mut s, T1, bump_handler);
        interrupt_context::leave();

        assert!(s.tcb(T1).sig_pending_handler.is_some());
        assert!(s.tcb(T1).pending_frame.is_none());
    }

    #[test]
    fn deliver_without_a_pushed_frame_runs_handler_and_returns_normally() {
        CALLS.store(0, core::sync::atomic::Ordering::SeqCst);
        let mut s = new_sched();
        interrupt_context::enter();
        schedule_sigaction::<Context, SimArch, _>(&mut s, T1, bump_handler);
        interrupt_context::leave();

        // Matches the IRQ return path of §4.5 "self, in IRQ": no frame was
        // ever pushed, so deliver() must run the handler and return
        // instead of popping/switching into a frame that doesn't exist.
        deliver::<Context, SimArch>(s.tcb_mut(T1));

        assert_eq!(CALLS.load(core::sync::atomic::Ordering::SeqCst), 1);
        assert!(s.tcb(T1).sig_pending_handler.is_none());
    }
}
