//! C8: the assert/fault path (`up_assert`).
//!
//! Where the assertion happened decides how fatal it is: inside an
//! interrupt handler or the idle task, the whole OS is no longer coherent
//! and the only option is to panic; anywhere else, only the offending task
//! needs to go away. `crashdump` and `exit_task` are supplied by the caller
//! rather than reached through a global hook — unlike the signal trampoline,
//! `assert` is always called directly from source, never resumed via a raw
//! function pointer, so there's no monomorphization problem to work around.

use crate::interrupt_context;
use crate::tcb::TaskId;

/// Print the failure location, run the board crashdump hook, then either
/// panic (interrupt or idle-task context) or hand off to `exit_task`
/// (any other task). Never returns.
pub fn assert(
    filename: &str,
    line: u32,
    sp: usize,
    current: TaskId,
    crashdump: impl FnOnce(usize, TaskId),
    exit_task: impl FnOnce() -> !,
) -> ! {
    log::error!("Assertion failed at file:{filename} line: {line}");
    crashdump(sp, current);

    if interrupt_context::in_interrupt() || current.is_idle() {
        panic!("up_assert: fatal assertion at {filename}:{line}, OS halted");
    }

    exit_task()
}
