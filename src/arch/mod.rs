//! Seams to architecture-specific code (§6 "To the architecture").
//!
//! Everything in [`crate::sched`], [`crate::signal`], [`crate::stack`] and
//! [`crate::time`] is portable; it depends only on the contracts below. Two
//! backends implement them: [`sim`], a hosted virtual CPU used for tests and
//! host tooling, and [`x86_64`] (behind the `x86_64-port` feature), a local
//! APIC in TSC-deadline mode plus the Sys-V register-save leaf.

use crate::tcb::Tcb;

pub mod sim;

#[cfg(feature = "x86_64-port")]
pub mod x86_64;

/// IRQ state as saved/restored by [`enter_critical_section`] /
/// [`leave_critical_section`]. Opaque to everything but the `Arch` impl.
pub trait IrqFlags: Copy + Send {}

/// The architecture's single leaf primitive (C2) plus the handful of other
/// arch hooks the core needs (§6 "To the architecture").
pub trait Arch {
    /// Saved register set sufficient to resume a task.
    type Context: Default;
    type Flags: IrqFlags;

    /// Save `from` (if any) and resume `to`. Must not be called from
    /// interrupt context; callers are expected to already hold the
    /// global-IRQ-disabled invariant across the whole call. See
    /// [`crate::context::switch`] for the portable wrapper that enforces
    /// the no-op-on-self-switch and not-in-interrupt rules.
    ///
    /// # Safety
    /// `to` must point at a context previously written by this function or
    /// by [`Arch::initial_state`]; `from`, if non-null, must be valid for
    /// writes for the duration of a `Self::Context`.
    unsafe fn switch(from: Option<*mut Self::Context>, to: *mut Self::Context);

    /// Prime a fresh context so the first dispatch starts at `entry` with
    /// `stack_top` as the initial stack pointer.
    fn initial_state(entry: usize, stack_top: usize) -> Self::Context;

    /// Build a trampoline context that, when resumed, runs `trampoline_entry`
    /// on `stack_top` (the same stack the real context was using — the
    /// trampoline frame does not need its own stack). Used by
    /// [`crate::signal::schedule_sigaction`] to arrange delivery in a target
    /// task that is not currently running.
    fn trampoline_state(trampoline_entry: usize, stack_top: usize) -> Self::Context;

    /// Read the target's current stack pointer, for building a trampoline
    /// context that resumes on the same stack as `ctx`.
    fn stack_pointer_of(ctx: &Self::Context) -> usize;

    fn irq_save() -> Self::Flags;
    fn irq_restore(flags: Self::Flags);
    fn irqs_enabled() -> bool;

    /// Unconditionally enable/disable interrupts, independent of the
    /// save/restore pair above. Used by [`crate::signal::deliver`] to bracket
    /// the handler call per §4.5 step 3, where there is no saved flags value
    /// to restore to.
    fn enable_irqs();
    fn disable_irqs();

    fn halt();
}

/// Per-task MMU state swap on context switch (§9: the address-environment
/// handoff is treated as required on every inter-task switch, resolving the
/// open question about the unreachable `group_addrenv` comment — a port
/// without address environments just makes this a no-op).
pub trait AddressEnvironment<C> {
    fn close(&mut self, outgoing: &Tcb<C>);
    fn open(&mut self, incoming: &Tcb<C>);
}

/// An `AddressEnvironment` that does nothing; for ports with a single
/// shared address space.
pub struct NoAddressEnvironment;

impl<C> AddressEnvironment<C> for NoAddressEnvironment {
    fn close(&mut self, _outgoing: &Tcb<C>) {}
    fn open(&mut self, _incoming: &Tcb<C>) {}
}

/// Allocator seam for [`crate::stack`] — kernel and user heaps may be
/// segregated; `create`/`release` pick one by task type.
///
/// # Safety
/// Implementors must behave like `GlobalAlloc`: `alloc` returns either null
/// or a block valid for `layout`; `dealloc` must be called with the same
/// layout `alloc` returned a block for.
pub unsafe trait StackAllocator {
    fn alloc(&self, layout: core::alloc::Layout) -> Option<core::ptr::NonNull<u8>>;
    /// # Safety
    /// `ptr`/`layout` must be exactly what a prior `alloc` call returned.
    unsafe fn dealloc(&self, ptr: core::ptr::NonNull<u8>, layout: core::alloc::Layout);
}
