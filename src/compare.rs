//! # Compare slots
//!
//! The RTC has a single compare register. Movement multiplexes a fixed set of single shot
//! callbacks onto it: one slot per purpose, each holding a target counter value.
//!
//! Slots are mutated freely while a loop pass runs. Arming the hardware takes several cycles of
//! the slow RTC clock so the earliest target is only written out once, at the end of the pass,
//! when the table is marked dirty.
//!
//! All comparisons are done on wrapped differences so targets stay valid across the counter
//! overflowing, as long as no target is more than 2^31 ticks away from the counter.

use crate::logging::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Slot {
    LightButton,
    ModeButton,
    AlarmButton,
    /// LED dwell timeout
    Led,
    /// Inactivity timeout which resigns to the home face
    Resign,
    /// Inactivity timeout which enters low energy mode
    Sleep,
    /// Top of the minute
    Minute,
}

impl Slot {
    pub const COUNT: usize = 7;

    pub const ALL: [Slot; Slot::COUNT] = [
        Slot::LightButton,
        Slot::ModeButton,
        Slot::AlarmButton,
        Slot::Led,
        Slot::Resign,
        Slot::Sleep,
        Slot::Minute,
    ];
}

/// Whether `target` has been reached by `now`
pub const fn reached(target: u32, now: u32) -> bool {
    (now.wrapping_sub(target) as i32) >= 0
}

/// A set of slots that fired together
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fired(u8);

impl Fired {
    pub const fn contains(self, slot: Slot) -> bool {
        self.0 & (1 << slot as u8) != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Slot> {
        Slot::ALL.into_iter().filter(move |slot| self.contains(*slot))
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// The compare slot table
#[derive(Debug, Clone)]
pub struct CompareTable {
    targets: [Option<u32>; Slot::COUNT],
    dirty: bool,
}

impl Default for CompareTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CompareTable {
    pub const fn new() -> Self {
        Self {
            targets: [None; Slot::COUNT],
            dirty: false,
        }
    }

    pub fn target(&self, slot: Slot) -> Option<u32> {
        self.targets[slot as usize]
    }

    /// Arm `slot` at `target`, replacing any previous target
    pub fn set(&mut self, slot: Slot, target: u32) {
        trace!("compare {:?} at {}", slot, target);
        self.targets[slot as usize] = Some(target);
        self.dirty = true;
    }

    /// Disable `slot`. Disabling a disabled slot does nothing.
    pub fn disable(&mut self, slot: Slot) {
        if self.targets[slot as usize].take().is_some() {
            self.dirty = true;
        }
    }

    /// Take every slot whose target has been reached, disabling it
    pub fn take_expired(&mut self, now: u32) -> Fired {
        let mut fired = 0;

        for (i, target) in self.targets.iter_mut().enumerate() {
            if matches!(*target, Some(t) if reached(t, now)) {
                *target = None;
                fired |= 1 << i;
            }
        }

        if fired != 0 {
            self.dirty = true;
        }

        Fired(fired)
    }

    /// The earliest enabled target, nudged to be strictly after `now`.
    ///
    /// The hardware only matches on equality so a target that has already passed is armed for
    /// the next tick instead.
    pub fn next(&self, now: u32) -> Option<u32> {
        self.targets
            .iter()
            .flatten()
            .min_by_key(|target| target.wrapping_sub(now) as i32)
            .map(|&target| {
                if reached(target, now) {
                    now.wrapping_add(1)
                } else {
                    target
                }
            })
    }

    /// Whether the hardware compare needs to be rewritten, clearing the flag
    pub fn take_dirty(&mut self) -> bool {
        core::mem::replace(&mut self.dirty, false)
    }
}
