//! C6: the tickless time source — a monotonic clock plus a single deadline
//! timer, in two variants (interval, absolute-alarm).
//!
//! Grounded in `intel64_tickless.c`. The local APIC / TSC-deadline specifics
//! live behind [`DeadlineTimer`] and a `read_tsc: fn() -> u64` callback, both
//! supplied by the architecture (the `x86_64-port` feature wires
//! `arch::x86_64::lapic_timer` in as the `DeadlineTimer` and `rdtsc` as the
//! clock); everything in this module is portable.

mod sync_region;
mod tickless;
mod ticks;

pub use sync_region::SyncRegion;
pub use tickless::{AlarmTimer, DeadlineTimer, IntervalTimer};
pub use ticks::{ticks_to_ts, ts_to_ticks, Timespec, NSEC_PER_SEC};
