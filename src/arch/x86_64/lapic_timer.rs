//! The local APIC in TSC-deadline mode, as [`crate::time::DeadlineTimer`].
//!
//! Grounded in `intel64_tickless.c`'s `up_mask_tmr`/`up_unmask_tmr` (mask and
//! unmask both write the LVT-timer MSR in TSC-deadline mode and `mfence` —
//! required per Intel SDM when using TSC-deadline mode so the write is
//! ordered before the next `IA32_TSC_DEADLINE` write). Direct `wrmsr`/`rdmsr`
//! via the `x86` crate rather than a higher-level x2APIC builder, since
//! TSC-deadline mode needs LVT-timer bit twiddling such builders don't
//! expose.

use crate::consts::{APIC_TIMER_DISABLE, APIC_TIMER_MODE_TSC_DEADLINE};
use crate::time::DeadlineTimer;
use core::arch::asm;
use x86::msr::{wrmsr, IA32_TSC_DEADLINE, IA32_X2APIC_LVT_TIMER};

/// Local-APIC deadline timer bound to one interrupt vector. `vector` is
/// whatever the IRQ controller (out of scope per §1) was told to route
/// `IA32_X2APIC_LVT_TIMER` to.
pub struct LapicDeadlineTimer {
    vector: u8,
}

impl LapicDeadlineTimer {
    pub const fn new(vector: u8) -> Self {
        LapicDeadlineTimer { vector }
    }

    fn write_lvt(&self, extra: u32) {
        unsafe { wrmsr(IA32_X2APIC_LVT_TIMER, self.vector as u64 | extra as u64) };
        // Ordering requirement for TSC-deadline mode (Intel SDM 10.5.4.1):
        // the LVT write must complete before the next IA32_TSC_DEADLINE write.
        unsafe { asm!("mfence", options(nomem, nostack)) };
    }
}

impl DeadlineTimer for LapicDeadlineTimer {
    fn mask(&mut self) {
        self.write_lvt(APIC_TIMER_MODE_TSC_DEADLINE | APIC_TIMER_DISABLE);
    }

    fn unmask(&mut self) {
        self.write_lvt(APIC_TIMER_MODE_TSC_DEADLINE);
    }

    fn program(&mut self, absolute_ticks: u64) {
        unsafe { wrmsr(IA32_TSC_DEADLINE, absolute_ticks) };
    }
}
