//! x86-64 backend (`x86_64-port` feature): local APIC in TSC-deadline mode
//! for [`crate::time`], a Sys-V callee-saved register-set context switch for
//! C2, and the CPUID capability gate that must pass before either is safe
//! to arm.
//!
//! The register-save leaf is a naked-asm Sys-V context switch generalized
//! from a raw stack-pointer handoff to this crate's `Arch::Context`
//! contract; the timer is `intel64_tickless.c`'s `up_mask_tmr`/`up_unmask_tmr`
//! (mask/unmask write the LVT timer MSR and `mfence`) and `tsc.rs`'s
//! `rdtsc`-via-intrinsic read, against real X2APIC MSRs; the capability gate
//! is `intel64_check_capability.c`'s `x86_64_check_and_enable_capability`
//! ported onto the `raw-cpuid` crate.

mod capability;
mod context;
mod lapic_timer;

pub use capability::check_and_enable_capability;
pub use context::Context;
pub use lapic_timer::LapicDeadlineTimer;

use crate::arch::{Arch, IrqFlags};

/// Saved IRQ-enabled flag, as returned by `irq_save`/consumed by
/// `irq_restore`. Mirrors the hosted port's `irqstate_t` (on real x86-64
/// this is conceptually "was IF set", not the whole `rflags` register —
/// nothing else in `rflags` needs restoring across the core's critical
/// sections).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags(bool);

impl IrqFlags for Flags {}

/// Read the free-running timestamp counter. Serialized with `lfence` so it
/// cannot be reordered ahead of the instructions whose timing it measures.
/// The `rdtscp` fast path is skipped here since this crate doesn't
/// calibrate/detect that CPUID leaf itself — TSC frequency is supplied by
/// the caller per §1 non-goals.
pub fn read_tsc() -> u64 {
    use core::arch::x86_64::{_mm_lfence, _rdtsc};
    unsafe {
        _mm_lfence();
        _rdtsc()
    }
}

pub struct X86_64Arch;

impl Arch for X86_64Arch {
    type Context = Context;
    type Flags = Flags;

    unsafe fn switch(from: Option<*mut Self::Context>, to: *mut Self::Context) {
        unsafe { context::switch(from, to) }
    }

    fn initial_state(entry: usize, stack_top: usize) -> Self::Context {
        context::build_initial_state(entry, stack_top)
    }

    fn trampoline_state(trampoline_entry: usize, stack_top: usize) -> Self::Context {
        context::build_initial_state(trampoline_entry, stack_top)
    }

    fn stack_pointer_of(ctx: &Self::Context) -> usize {
        ctx.rsp as usize
    }

    fn irq_save() -> Self::Flags {
        let enabled = x86_64::instructions::interrupts::are_enabled();
        x86_64::instructions::interrupts::disable();
        Flags(enabled)
    }

    fn irq_restore(flags: Self::Flags) {
        if flags.0 {
            x86_64::instructions::interrupts::enable();
        }
    }

    fn irqs_enabled() -> bool {
        x86_64::instructions::interrupts::are_enabled()
    }

    fn enable_irqs() {
        x86_64::instructions::interrupts::enable();
    }

    fn disable_irqs() {
        x86_64::instructions::interrupts::disable();
    }

    fn halt() {
        x86_64::instructions::hlt();
    }
}
