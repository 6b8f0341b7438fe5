//! Boot-time CPU capability gate (SPEC_FULL §4.6a), ported from
//! `intel64_check_capability.c`'s `x86_64_check_and_enable_capability`: read
//! `CPUID.01H:ECX`, require x2APIC unconditionally plus whatever subset of
//! {TSC-deadline, SSE3+XSAVE, RDRAND, PCID} the crate was built with
//! (`cap-tsc-deadline`/`cap-sse3`/`cap-rdrand`/`cap-pcid`, mirroring the
//! original's `CONFIG_ARCH_INTEL64_HAVE_*` guards), then enable SSE3/PCID in
//! `CR4` on success. On failure the original does `cli; hlt; goto err` in a
//! tight loop; §7 policy is identical ("mask all interrupts and halt the CPU
//! forever") so that's exactly what this does too, via the generic `Arch`
//! rather than inline asm.

use crate::arch::Arch;
use raw_cpuid::CpuId;
use x86_64::registers::control::{Cr4, Cr4Flags};

fn capable() -> bool {
    let cpuid = CpuId::new();
    let Some(features) = cpuid.get_feature_info() else {
        return false;
    };

    if !features.has_x2apic() {
        return false;
    }

    #[cfg(feature = "cap-tsc-deadline")]
    if !features.has_tsc_deadline() {
        return false;
    }

    #[cfg(feature = "cap-sse3")]
    if !(features.has_sse3() && features.has_xsave()) {
        return false;
    }

    #[cfg(feature = "cap-rdrand")]
    if !features.has_rdrand() {
        return false;
    }

    #[cfg(feature = "cap-pcid")]
    if !features.has_pcid() {
        return false;
    }

    true
}

/// Check capabilities required by this port and enable the optional ones
/// that were found. Never returns if the CPU is missing something the build
/// configuration requires — there is no recoverable state at that point.
pub fn check_and_enable_capability<A: Arch>() {
    if !capable() {
        A::disable_irqs();
        loop {
            A::halt();
        }
    }

    #[cfg(feature = "cap-sse3")]
    unsafe {
        Cr4::update(|flags| *flags |= Cr4Flags::OSXSAVE);
    }

    #[cfg(feature = "cap-pcid")]
    unsafe {
        Cr4::update(|flags| *flags |= Cr4Flags::PCID);
    }
}
