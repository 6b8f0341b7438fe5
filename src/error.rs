//! Error kinds surfaced across a process boundary.
//!
//! Most failure paths in this crate are *not* represented here: precondition
//! violations (wrong state for block/unblock/reprioritize) log a warning and
//! return without mutating anything, and invariant violations (context
//! switch from interrupt context, sync-region underflow) panic outright.
//! `Error` only covers the one path with a real caller-recoverable failure:
//! stack allocation.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Stack allocation failed (`create`). The TCB's stack fields are left
    /// in the null state.
    NoMemory,
}

pub type Result<T> = core::result::Result<T, Error>;
