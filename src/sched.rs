//! C4: the scheduler interaction layer — block, unblock, reprioritize,
//! release-pending, exit. Each composes [`Scheduler`] queue operations with
//! [`crate::context::switch`]; none of them touch a queue's internal
//! ordering, only whether an operation changed its head.
//!
//! Grounded in `up_block_task`/`up_unblock_task`/`up_reprioritize_rtr`/
//! `up_release_pending`/`_exit` in the hosted port. All five follow the same
//! shape: mutate a queue, decide from the return value whether the current
//! task changed, and if so run `sched_suspend_scheduler` /
//! (address-environment handoff) / `sched_resume_scheduler` /
//! `up_switchcontext` in that order.

use crate::arch::{AddressEnvironment, Arch};
use crate::tcb::{Priority, TaskId, TaskState, Tcb};
use log::warn;

/// The scheduler's queues and policy — external to this crate (§6 "To the
/// scheduler"). Implementations own where `Tcb`s live; the addresses
/// returned by `tcb`/`tcb_mut` must stay stable for as long as the `Tcb`
/// exists, since [`run_switch`] takes two such references across a single
/// call without re-fetching either.
pub trait Scheduler<C> {
    /// Add to the ready-to-run list in priority order. Returns whether this
    /// changed the head of the list.
    fn add_ready_to_run(&mut self, id: TaskId) -> bool;
    /// Remove from the ready-to-run list. Returns whether the removed entry
    /// was the head.
    fn remove_ready_to_run(&mut self, id: TaskId) -> bool;
    fn add_blocked(&mut self, id: TaskId, state: TaskState);
    fn remove_blocked(&mut self, id: TaskId);
    /// Merge the pending list into ready-to-run. Returns whether this
    /// changed the head.
    fn merge_pending(&mut self) -> bool;
    fn pending_is_empty(&self) -> bool;
    fn suspend_scheduler(&mut self, id: TaskId);
    fn resume_scheduler(&mut self, id: TaskId);
    /// The head of the ready-to-run list — the task that should be (or
    /// already is) running.
    fn this_task(&self) -> TaskId;
    /// Destroy the task at the head of the ready-to-run list.
    fn task_exit(&mut self);
    fn tcb(&self, id: TaskId) -> &Tcb<C>;
    fn tcb_mut(&mut self, id: TaskId) -> &mut Tcb<C>;
}

/// Drains the pending-tasks list into ready-to-run with a warning — the
/// caller was supposed to have preemption disabled, but self-block and
/// self-reprioritize tolerate it (§4.4).
fn drain_pending_with_warning<C>(sched: &mut impl Scheduler<C>, who: &str) {
    if !sched.pending_is_empty() {
        warn!("{who}: pending-tasks list non-empty, preemption was not disabled by caller");
        sched.merge_pending();
    }
}

/// Runs the suspend/address-environment/resume/switch sequence common to
/// every C4 operation that changes the current task.
fn run_switch<C, A, S, AE>(sched: &mut S, addrenv: &mut AE, outgoing: TaskId)
where
    A: Arch<Context = C>,
    S: Scheduler<C>,
    AE: AddressEnvironment<C>,
{
    let incoming = sched.this_task();
    sched.suspend_scheduler(outgoing);
    addrenv.close(sched.tcb(outgoing));
    addrenv.open(sched.tcb(incoming));
    sched.resume_scheduler(incoming);

    let from = core::ptr::addr_of_mut!(sched.tcb_mut(outgoing).context);
    let to = core::ptr::addr_of_mut!(sched.tcb_mut(incoming).context);
    unsafe { crate::context::switch::<A>(Some(from), to) };
}

/// Move `id` from ready-to-run into the blocked list indexed by
/// `target_state`. No-op with a warning if `id` is not currently
/// ready-to-run.
pub fn block<C, A, S, AE>(sched: &mut S, addrenv: &mut AE, id: TaskId, target_state: TaskState)
where
    A: Arch<Context = C>,
    S: Scheduler<C>,
    AE: AddressEnvironment<C>,
{
    if !sched.tcb(id).state.is_ready_to_run() {
        warn!("block: {id:?} is not ready-to-run");
        return;
    }
    debug_assert!(target_state.is_blocked());

    let rtcb = sched.this_task();
    let switch_needed = sched.remove_ready_to_run(id);
    sched.add_blocked(id, target_state);
    sched.tcb_mut(id).state = target_state;

    if switch_needed {
        assert!(
            !crate::interrupt_context::in_interrupt(),
            "block: switch required from interrupt context"
        );
        drain_pending_with_warning(sched, "block");
        run_switch::<C, A, S, AE>(sched, addrenv, rtcb);
    }
}

/// Move `id` from blocked back into ready-to-run. No-op with a warning if
/// `id` is not currently blocked. If this changes the ready-to-run head and
/// we're not servicing an interrupt, switches immediately; otherwise the
/// switch is implicitly deferred to whenever the IRQ return path next checks
/// the ready-to-run head.
pub fn unblock<C, A, S, AE>(sched: &mut S, addrenv: &mut AE, id: TaskId)
where
    A: Arch<Context = C>,
    S: Scheduler<C>,
    AE: AddressEnvironment<C>,
{
    if !sched.tcb(id).state.is_blocked() {
        warn!("unblock: {id:?} is not blocked");
        return;
    }

    let rtcb = sched.this_task();
    sched.remove_blocked(id);
    let new_state = TaskState::new(crate::tcb::FIRST_READY_TO_RUN);
    let head_changed = sched.add_ready_to_run(id);
    sched.tcb_mut(id).state = new_state;

    if head_changed && !crate::interrupt_context::in_interrupt() {
        run_switch::<C, A, S, AE>(sched, addrenv, rtcb);
    }
}

/// Change `id`'s priority and re-insert it into ready-to-run. No-op with a
/// warning if `id` is not ready-to-run or `new_priority` is out of range.
pub fn reprioritize<C, A, S, AE>(sched: &mut S, addrenv: &mut AE, id: TaskId, new_priority: i32)
where
    A: Arch<Context = C>,
    S: Scheduler<C>,
    AE: AddressEnvironment<C>,
{
    if !sched.tcb(id).state.is_ready_to_run() || !Priority::in_range(new_priority) {
        warn!("reprioritize: {id:?} not ready-to-run or priority {new_priority} out of range");
        return;
    }

    let rtcb = sched.this_task();
    let removed_head = sched.remove_ready_to_run(id);
    sched.tcb_mut(id).priority = Priority::clamped(new_priority);
    let added_head = sched.add_ready_to_run(id);
    let switch_needed = removed_head ^ added_head;

    if switch_needed && !crate::interrupt_context::in_interrupt() {
        drain_pending_with_warning(sched, "reprioritize");
        run_switch::<C, A, S, AE>(sched, addrenv, rtcb);
    }
}

/// Called from `sched_unlock` when preemption is re-enabled outside
/// interrupt context: merges the pending list and switches if that changed
/// the ready-to-run head.
pub fn release_pending<C, A, S, AE>(sched: &mut S, addrenv: &mut AE)
where
    A: Arch<Context = C>,
    S: Scheduler<C>,
    AE: AddressEnvironment<C>,
{
    let rtcb = sched.this_task();
    if sched.merge_pending() {
        run_switch::<C, A, S, AE>(sched, addrenv, rtcb);
    }
}

/// `_exit`: destroy the current task and switch to whatever is now head of
/// ready-to-run. The outgoing context is intentionally discarded — there is
/// nothing to resume it into.
pub fn exit_current<C, A, S, AE>(sched: &mut S, addrenv: &mut AE) -> !
where
    A: Arch<Context = C>,
    S: Scheduler<C>,
    AE: AddressEnvironment<C>,
{
    sched.task_exit();
    let next = sched.this_task();
    addrenv.open(sched.tcb(next));
    let to = core::ptr::addr_of_mut!(sched.tcb_mut(next).context);
    unsafe { crate::context::switch::<A>(None, to) };
    unreachable!("exit_current: switch(None, _) must not return")
}
