//! Architecture-port core: the glue between an architecture-neutral
//! scheduler and a concrete CPU/platform.
//!
//! This crate owns the task control block layout, stack framing, the
//! context-switch contract, the block/unblock/reprioritize/exit dance that
//! composes scheduler queue operations with context switches, asynchronous
//! signal delivery, and a tickless deadline-timer time source. The
//! scheduler's queues and policies, device drivers, and the register
//! save/restore leaf are all external collaborators reached through the
//! traits in [`sched`] and [`arch`].
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod arch;
pub mod boot;
#[cfg(feature = "x86_64-port")]
pub(crate) mod consts;
pub mod context;
pub mod error;
pub mod fault;
pub mod interrupt_context;
pub mod logger;
pub mod sched;
pub mod signal;
pub mod stack;
pub mod tcb;
pub mod time;

pub use error::Error;
pub use tcb::{Priority, Stack, TaskId, TaskState, Tcb};
