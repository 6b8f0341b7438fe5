//! The two tickless timer variants (`up_timer_*` / `up_alarm_*`), both
//! built on [`super::sync_region::SyncRegion`] and [`super::ticks`].
//!
//! The process-wide state block `{ start_tsc, last_stop, goal, goal_ts,
//! active, sync_depth, saved_irq_flags }` from §4.6 is split here: the sync
//! fields live in `SyncRegion`, the rest in each variant's own struct. Only
//! one of `IntervalTimer`/`AlarmTimer` is ever instantiated by a given OS —
//! they share no state, just the same shape.

use super::sync_region::SyncRegion;
use super::ticks::{ticks_to_ts, ts_to_ticks, Timespec};
use crate::arch::Arch;

/// The deadline-timer device (arch-specific: on x86-64, the local APIC in
/// TSC-deadline mode). Mask/unmask/program are the three operations the
/// tickless core needs; reading time is a separate `read_tsc` callback since
/// it has no masked/unmasked distinction.
pub trait DeadlineTimer {
    fn mask(&mut self);
    fn unmask(&mut self);
    /// Program the timer to fire when the monotonic tick counter reaches
    /// `absolute_ticks`.
    fn program(&mut self, absolute_ticks: u64);
}

/// Interval variant: `start` takes a relative interval, `cancel` reports
/// time remaining until the programmed deadline.
pub struct IntervalTimer<A: Arch> {
    sync: SyncRegion<A>,
    tsc_freq: u64,
    start_tsc: u64,
    goal: u64,
    active: bool,
}

impl<A: Arch> IntervalTimer<A> {
    pub const fn new(tsc_freq: u64) -> Self {
        IntervalTimer {
            sync: SyncRegion::new(),
            tsc_freq,
            start_tsc: 0,
            goal: 0,
            active: false,
        }
    }

    /// Sample the free-running counter as the epoch. Call once during
    /// bootstrap, before any `start`/`cancel`/`gettime`.
    pub fn initialize(&mut self, read_tsc: fn() -> u64) {
        self.start_tsc = read_tsc();
    }

    /// Elapsed time since `initialize`. Always succeeds; unlike
    /// `start`/`cancel` it doesn't need to mask the timer.
    pub fn gettime(&self, read_tsc: fn() -> u64) -> Timespec {
        ticks_to_ts(read_tsc().wrapping_sub(self.start_tsc), self.tsc_freq)
    }

    pub fn start(&mut self, interval: Timespec, timer: &mut impl DeadlineTimer, read_tsc: fn() -> u64) {
        self.sync.sync_up();
        let ticks = ts_to_ticks(interval, self.tsc_freq) + read_tsc();
        self.active = true;
        timer.program(ticks);
        self.goal = ticks;
        timer.unmask();
        self.sync.sync_down();
    }

    /// Cancel and report remaining time, or zero if the timer wasn't active
    /// (including the race where it already fired).
    pub fn cancel(&mut self, timer: &mut impl DeadlineTimer, read_tsc: fn() -> u64) -> Timespec {
        self.sync.sync_up();
        timer.mask();
        let remaining = if self.active {
            ticks_to_ts(self.goal.saturating_sub(read_tsc()), self.tsc_freq)
        } else {
            Timespec::ZERO
        };
        self.active = false;
        self.sync.sync_down();
        remaining
    }

    /// IRQ handler: mask, clear active, call the scheduler's expiration
    /// hook (`sched_timer_expiration`).
    pub fn on_expire(&mut self, timer: &mut impl DeadlineTimer, expiration: impl FnOnce()) {
        self.active = false;
        timer.mask();
        expiration();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Absolute-alarm variant: `start` takes an absolute deadline (relative to
/// the same epoch `gettime` reports), `cancel` and `on_expire` report the
/// current time rather than time remaining.
pub struct AlarmTimer<A: Arch> {
    sync: SyncRegion<A>,
    tsc_freq: u64,
    start_tsc: u64,
    goal_ts: Timespec,
    active: bool,
}

impl<A: Arch> AlarmTimer<A> {
    pub const fn new(tsc_freq: u64) -> Self {
        AlarmTimer {
            sync: SyncRegion::new(),
            tsc_freq,
            start_tsc: 0,
            goal_ts: Timespec::ZERO,
            active: false,
        }
    }

    pub fn initialize(&mut self, read_tsc: fn() -> u64) {
        self.start_tsc = read_tsc();
    }

    pub fn gettime(&self, read_tsc: fn() -> u64) -> Timespec {
        ticks_to_ts(read_tsc().wrapping_sub(self.start_tsc), self.tsc_freq)
    }

    pub fn start(&mut self, absolute: Timespec, timer: &mut impl DeadlineTimer) {
        self.sync.sync_up();
        timer.unmask();
        let ticks = ts_to_ticks(absolute, self.tsc_freq) + self.start_tsc;
        timer.program(ticks);
        self.active = true;
        self.goal_ts = absolute;
        self.sync.sync_down();
    }

    pub fn cancel(&mut self, timer: &mut impl DeadlineTimer, read_tsc: fn() -> u64) -> Timespec {
        self.sync.sync_up();
        timer.mask();
        let now = self.gettime(read_tsc);
        self.active = false;
        self.sync.sync_down();
        now
    }

    /// IRQ handler: mask, clear active, call `nxsched_alarm_expiration(now)`.
    pub fn on_expire(&mut self, timer: &mut impl DeadlineTimer, read_tsc: fn() -> u64, expiration: impl FnOnce(Timespec)) {
        timer.mask();
        self.active = false;
        let now = self.gettime(read_tsc);
        expiration(now);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn goal(&self) -> Timespec {
        self.goal_ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::SimArch;
    use core::sync::atomic::{AtomicU64, Ordering};

    static CLOCK: AtomicU64 = AtomicU64::new(0);

    fn read_tsc() -> u64 {
        CLOCK.load(Ordering::SeqCst)
    }

    struct FakeDeadline {
        masked: bool,
        programmed: Option<u64>,
    }

    impl FakeDeadline {
        fn new() -> Self {
            FakeDeadline {
                masked: true,
                programmed: None,
            }
        }
    }

    impl DeadlineTimer for FakeDeadline {
        fn mask(&mut self) {
            self.masked = true;
        }
        fn unmask(&mut self) {
            self.masked = false;
        }
        fn program(&mut self, absolute_ticks: u64) {
            self.programmed = Some(absolute_ticks);
        }
    }

    #[test]
    fn interval_cancel_before_arm_returns_zero() {
        CLOCK.store(0, Ordering::SeqCst);
        let mut t: IntervalTimer<SimArch> = IntervalTimer::new(1_000_000_000);
        t.initialize(read_tsc);
        let mut dev = FakeDeadline::new();
        let remaining = t.cancel(&mut dev, read_tsc);
        assert_eq!(remaining, Timespec::ZERO);
    }

    #[test]
    fn interval_start_then_immediate_cancel_reports_the_full_interval() {
        CLOCK.store(0, Ordering::SeqCst);
        let mut t: IntervalTimer<SimArch> = IntervalTimer::new(1_000_000_000);
        t.initialize(read_tsc);
        let mut dev = FakeDeadline::new();
        t.start(Timespec { sec: 0, nsec: 1_000_000 }, &mut dev, read_tsc);
        assert!(!dev.masked);
        assert_eq!(dev.programmed, Some(1_000_000));

        let remaining = t.cancel(&mut dev, read_tsc);
        assert_eq!(remaining, Timespec { sec: 0, nsec: 1_000_000 });
        assert!(dev.masked);
    }

    #[test]
    fn interval_cancel_after_expiration_returns_zero() {
        CLOCK.store(0, Ordering::SeqCst);
        let mut t: IntervalTimer<SimArch> = IntervalTimer::new(1_000_000_000);
        t.initialize(read_tsc);
        let mut dev = FakeDeadline::new();
        t.start(Timespec { sec: 0, nsec: 1_000_000 }, &mut dev, read_tsc);

        CLOCK.store(2_000_000, Ordering::SeqCst);
        let mut fired = false;
        t.on_expire(&mut dev, || fired = true);
        assert!(fired);
        assert!(!t.is_active());

        let remaining = t.cancel(&mut dev, read_tsc);
        assert_eq!(remaining, Timespec::ZERO);
    }

    #[test]
    fn alarm_start_programs_deadline_relative_to_epoch() {
        CLOCK.store(500, Ordering::SeqCst);
        let mut t: AlarmTimer<SimArch> = AlarmTimer::new(1_000_000_000);
        t.initialize(read_tsc); // start_tsc = 500
        let mut dev = FakeDeadline::new();
        t.start(Timespec { sec: 0, nsec: 1_000_000 }, &mut dev);
        assert_eq!(dev.programmed, Some(1_000_000 + 500));
        assert!(t.is_active());
    }

    #[test]
    fn alarm_on_expire_reports_now_and_clears_active() {
        CLOCK.store(0, Ordering::SeqCst);
        let mut t: AlarmTimer<SimArch> = AlarmTimer::new(1_000_000_000);
        t.initialize(read_tsc);
        let mut dev = FakeDeadline::new();
        t.start(Timespec { sec: 1, nsec: 0 }, &mut dev);

        CLOCK.store(1_000_000_000, Ordering::SeqCst);
        let mut seen = None;
        t.on_expire(&mut dev, read_tsc, |now| seen = Some(now));
        assert_eq!(seen, Some(Timespec { sec: 1, nsec: 0 }));
        assert!(!t.is_active());
    }
}
