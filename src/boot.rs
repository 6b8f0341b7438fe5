//! C7: bootstrap and idle.
//!
//! Grounded in the hosted port's `up_initialize`/`up_idle`/
//! `up_allocate_heap`. Device registration, syslog, and power management are
//! all external OS concerns (§1 out of scope); what's left here is the
//! *shape* `up_initialize` imposes on them: point the scheduler at the idle
//! task, bring up virtual devices and the architecture, optionally power
//! management, register whichever pseudo-devices the caller's feature set
//! enables, start early syslog, and only then unmask interrupts — in that
//! order, matching the original (device registration before the allocator
//! is live, or before interrupts are enabled, is not a sequencing the
//! original permits).

use crate::arch::Arch;
use crate::sched::Scheduler;
use crate::tcb::TaskId;
use bitflags::bitflags;

bitflags! {
    /// Compile-time-selected pseudo-device/facility toggles (§4.7). Each bit
    /// gates exactly one registration call; the core requires none of them,
    /// mirroring the original's `CONFIG_DEV_NULL`/`CONFIG_DEV_URANDOM`/...
    /// guards around `up_initialize`'s device-registration block.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct Facilities: u16 {
        const DEV_NULL    = 1 << 0;
        const DEV_ZERO    = 1 << 1;
        const DEV_URANDOM = 1 << 2;
        const DEV_RANDOM  = 1 << 3;
        const DEV_LOOP    = 1 << 4;
        const CRYPTO      = 1 << 5;
        const NOTE        = 1 << 6;
        const PTMX        = 1 << 7;
        const PM          = 1 << 8;
    }
}

/// Half-open `[base, base+size)` interval of RAM available to the OS
/// allocator (`up_allocate_heap`'s out-parameters).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapBounds {
    pub base: usize,
    pub size: usize,
}

/// The half-open interval between the first word after the boot
/// allocator's current bump pointer and the architectural end of RAM.
/// Grounded in `up_allocate_heap`: `*heap_start = boot_freemem; *heap_size =
/// KERNBASE + kmem_size - boot_freemem`.
pub fn heap_bounds(bump_ptr: usize, ram_end: usize) -> HeapBounds {
    HeapBounds {
        base: bump_ptr,
        size: ram_end.saturating_sub(bump_ptr),
    }
}

/// Hooks a concrete OS supplies for the pieces `initialize` sequences but
/// does not itself implement (§1: device drivers, PM, and syslog are out of
/// scope for this crate).
pub trait BootHooks {
    fn init_virtual_devices(&mut self);
    fn init_arch(&mut self);
    fn init_power_management(&mut self) {}
    fn register_facility(&mut self, facility: Facilities) {
        let _ = facility;
    }
    fn syslog_init_early(&mut self) {}
}

/// `up_initialize`. Runs the fixed boot sequence, gating each optional step
/// on whether `facilities` enables it, then enables interrupts last.
pub fn initialize<C, A, S, H>(sched: &mut S, hooks: &mut H, facilities: Facilities)
where
    A: Arch,
    S: Scheduler<C>,
    H: BootHooks,
{
    sched.resume_scheduler(TaskId::IDLE);

    hooks.init_virtual_devices();
    hooks.init_arch();

    if facilities.contains(Facilities::PM) {
        hooks.init_power_management();
    }

    if facilities.contains(Facilities::PTMX) {
        hooks.register_facility(Facilities::PTMX);
    }

    hooks.syslog_init_early();

    for f in [
        Facilities::DEV_NULL,
        Facilities::DEV_URANDOM,
        Facilities::DEV_ZERO,
        Facilities::DEV_LOOP,
        Facilities::NOTE,
        Facilities::CRYPTO,
        Facilities::DEV_RANDOM,
    ] {
        if facilities.contains(f) {
            hooks.register_facility(f);
        }
    }

    A::enable_irqs();
}

/// `up_idle`: halt until the next interrupt.
pub fn idle<A: Arch>() {
    A::halt();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::SimArch;
    use crate::tcb::{Priority, Tcb};
    use alloc::collections::BTreeMap;
    use alloc::vec::Vec;

    #[test]
    fn heap_bounds_spans_from_bump_pointer_to_ram_end() {
        let b = heap_bounds(0x10_0000, 0x100_0000);
        assert_eq!(b.base, 0x10_0000);
        assert_eq!(b.size, 0x100_0000 - 0x10_0000);
    }

    #[test]
    fn heap_bounds_saturates_if_bump_pointer_already_past_ram_end() {
        let b = heap_bounds(0x200_0000, 0x100_0000);
        assert_eq!(b.size, 0);
    }

    struct RecordingHooks {
        order: Vec<&'static str>,
        registered: Vec<Facilities>,
    }

    impl BootHooks for RecordingHooks {
        fn init_virtual_devices(&mut self) {
            self.order.push("vdev");
        }
        fn init_arch(&mut self) {
            self.order.push("arch");
        }
        fn init_power_management(&mut self) {
            self.order.push("pm");
        }
        fn register_facility(&mut self, facility: Facilities) {
            self.order.push("register");
            self.registered.push(facility);
        }
        fn syslog_init_early(&mut self) {
            self.order.push("syslog");
        }
    }

    struct IdleOnlyScheduler {
        tcbs: BTreeMap<TaskId, Tcb<crate::arch::sim::Context>>,
        current: TaskId,
    }

    impl Scheduler<crate::arch::sim::Context> for IdleOnlyScheduler {
        fn add_ready_to_run(&mut self, _id: TaskId) -> bool {
            false
        }
        fn remove_ready_to_run(&mut self, _id: TaskId) -> bool {
            false
        }
        fn add_blocked(&mut self, _id: TaskId, _state: crate::tcb::TaskState) {}
        fn remove_blocked(&mut self, _id: TaskId) {}
        fn merge_pending(&mut self) -> bool {
            false
        }
        fn pending_is_empty(&self) -> bool {
            true
        }
        fn suspend_scheduler(&mut self, _id: TaskId) {}
        fn resume_scheduler(&mut self, id: TaskId) {
            self.current = id;
        }
        fn this_task(&self) -> TaskId {
            self.current
        }
        fn task_exit(&mut self) {}
        fn tcb(&self, id: TaskId) -> &Tcb<crate::arch::sim::Context> {
            &self.tcbs[&id]
        }
        fn tcb_mut(&mut self, id: TaskId) -> &mut Tcb<crate::arch::sim::Context> {
            self.tcbs.get_mut(&id).unwrap()
        }
    }

    #[test]
    fn initialize_sets_idle_current_and_enables_irqs_last() {
        SimArch::disable_irqs();
        let mut tcbs = BTreeMap::new();
        tcbs.insert(
            TaskId::IDLE,
            Tcb::new(TaskId::IDLE, Priority::clamped(0), 0),
        );
        let mut sched = IdleOnlyScheduler {
            tcbs,
            current: TaskId(99),
        };
        let mut hooks = RecordingHooks {
            order: Vec::new(),
            registered: Vec::new(),
        };

        initialize::<crate::arch::sim::Context, SimArch, _, _>(
            &mut sched,
            &mut hooks,
            Facilities::DEV_NULL | Facilities::PTMX,
        );

        assert_eq!(sched.this_task(), TaskId::IDLE);
        assert!(SimArch::irqs_enabled());
        assert_eq!(hooks.order[0], "vdev");
        assert_eq!(hooks.order[1], "arch");
        assert_eq!(*hooks.order.last().unwrap(), "register");
        assert!(hooks.registered.contains(&Facilities::DEV_NULL));
        assert!(hooks.registered.contains(&Facilities::PTMX));
        assert!(!hooks.registered.contains(&Facilities::PM));
    }

    #[test]
    fn initialize_requires_no_facilities_enabled() {
        let mut tcbs = BTreeMap::new();
        tcbs.insert(
            TaskId::IDLE,
            Tcb::new(TaskId::IDLE, Priority::clamped(0), 0),
        );
        let mut sched = IdleOnlyScheduler {
            tcbs,
            current: TaskId(1),
        };
        let mut hooks = RecordingHooks {
            order: Vec::new(),
            registered: Vec::new(),
        };
        initialize::<crate::arch::sim::Context, SimArch, _, _>(
            &mut sched,
            &mut hooks,
            Facilities::empty(),
        );
        assert!(hooks.registered.is_empty());
    }
}
