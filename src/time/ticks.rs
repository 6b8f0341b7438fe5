//! Bit-exact `timespec` ⇄ tick conversion (`up_ts2tick`/`up_tick2ts`).
//!
//! Both directions round half-up on the integer division, exactly
//! `ROUND_INT_DIV(s, d) = (s + (d >> 1)) / d` from the x86-64 tickless timer.
//! The intermediate products are computed in `u128` purely to give headroom
//! against overflow at large `tsc_freq`; the arithmetic and rounding are
//! otherwise identical to the original.

pub const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Elapsed wall-clock time as seconds plus a sub-second remainder in
/// nanoseconds (`0 <= nsec < NSEC_PER_SEC`).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Timespec {
    pub sec: u64,
    pub nsec: u32,
}

impl Timespec {
    pub const ZERO: Timespec = Timespec { sec: 0, nsec: 0 };
}

fn round_div_u128(numerator: u128, denominator: u128) -> u128 {
    (numerator + (denominator >> 1)) / denominator
}

/// `round(ts.nsec * tsc_freq / 1e9) + ts.sec * tsc_freq`.
pub fn ts_to_ticks(ts: Timespec, tsc_freq: u64) -> u64 {
    let frac = round_div_u128(ts.nsec as u128 * tsc_freq as u128, NSEC_PER_SEC as u128);
    frac as u64 + ts.sec.saturating_mul(tsc_freq)
}

/// `{ sec: t / tsc_freq, nsec: round((t % tsc_freq) * 1e9 / tsc_freq) }`.
pub fn ticks_to_ts(ticks: u64, tsc_freq: u64) -> Timespec {
    let sec = ticks / tsc_freq;
    let nsec = round_div_u128((ticks % tsc_freq) as u128 * NSEC_PER_SEC as u128, tsc_freq as u128);
    Timespec {
        sec,
        nsec: nsec as u32,
    }
}
