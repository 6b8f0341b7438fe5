//! Nestable IRQ-disabled critical section for the timer subsystem
//! (`up_tmr_sync_up`/`up_tmr_sync_down`).
//!
//! Start/cancel must be callable from both task and IRQ context and must
//! serialize against themselves; a plain `enter_critical_section` call on
//! every entry would deadlock a nested call (cancel calling into start, or
//! an IRQ firing mid-call on the same CPU). The nesting counter makes only
//! the outermost pair actually touch the saved IRQ flags.

use crate::arch::Arch;
use core::sync::atomic::{AtomicU32, Ordering};
use spin::Mutex;

pub struct SyncRegion<A: Arch> {
    depth: AtomicU32,
    flags: Mutex<Option<A::Flags>>,
}

impl<A: Arch> SyncRegion<A> {
    pub const fn new() -> Self {
        SyncRegion {
            depth: AtomicU32::new(0),
            flags: Mutex::new(None),
        }
    }

    /// Enter the region. The first call on an empty depth saves IRQ state
    /// and disables interrupts; nested calls only bump the counter.
    pub fn sync_up(&self) {
        if self.depth.load(Ordering::SeqCst) == 0 {
            let saved = A::irq_save();
            *self.flags.lock() = Some(saved);
        }
        self.depth.fetch_add(1, Ordering::SeqCst);
    }

    /// Leave the region. The outermost call restores the IRQ state saved by
    /// the matching `sync_up`.
    ///
    /// # Panics
    /// If called with no matching `sync_up` — depth must never underflow
    /// (§8 testable property).
    pub fn sync_down(&self) {
        let depth = self.depth.load(Ordering::SeqCst);
        assert!(depth > 0, "sync_region: sync_down without matching sync_up");
        if depth == 1 {
            if let Some(saved) = self.flags.lock().take() {
                A::irq_restore(saved);
            }
        }
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::SimArch;

    #[test]
    fn nested_sync_only_restores_flags_at_outermost_down() {
        let region: SyncRegion<SimArch> = SyncRegion::new();
        assert_eq!(region.depth(), 0);
        region.sync_up();
        region.sync_up();
        assert_eq!(region.depth(), 2);
        region.sync_down();
        assert_eq!(region.depth(), 1);
        region.sync_down();
        assert_eq!(region.depth(), 0);
    }

    #[test]
    #[should_panic(expected = "without matching sync_up")]
    fn sync_down_without_sync_up_panics() {
        let region: SyncRegion<SimArch> = SyncRegion::new();
        region.sync_down();
    }
}
