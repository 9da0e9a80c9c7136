//! # Events
//!
//! Every event kind owns one bit of the pending events bitmap. The bit position is the ordinal of
//! the kind, so scanning the bitmap from the lowest bit delivers events in a fixed order: the
//! tick before any button, buttons in Light, Mode, Alarm order and accelerometer gestures last.

use crate::button::Button;

/// The kinds of event delivered to a face
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum EventKind {
    None = 0,
    /// The face just entered the foreground
    Activate,
    /// The periodic tick
    Tick,
    /// Once a minute refresh while in low energy mode
    LowEnergyUpdate,
    /// A background task requested through an advisory or a scheduled slot
    BackgroundTask,
    /// The inactivity timeout elapsed
    Timeout,
    LightButtonDown,
    LightButtonUp,
    LightLongPress,
    LightLongUp,
    LightReallyLongPress,
    ModeButtonDown,
    ModeButtonUp,
    ModeLongPress,
    ModeLongUp,
    ModeReallyLongPress,
    AlarmButtonDown,
    AlarmButtonUp,
    AlarmLongPress,
    AlarmLongUp,
    AlarmReallyLongPress,
    AccelerometerWake,
    SingleTap,
    DoubleTap,
}

impl EventKind {
    const ALL: [EventKind; 24] = [
        EventKind::None,
        EventKind::Activate,
        EventKind::Tick,
        EventKind::LowEnergyUpdate,
        EventKind::BackgroundTask,
        EventKind::Timeout,
        EventKind::LightButtonDown,
        EventKind::LightButtonUp,
        EventKind::LightLongPress,
        EventKind::LightLongUp,
        EventKind::LightReallyLongPress,
        EventKind::ModeButtonDown,
        EventKind::ModeButtonUp,
        EventKind::ModeLongPress,
        EventKind::ModeLongUp,
        EventKind::ModeReallyLongPress,
        EventKind::AlarmButtonDown,
        EventKind::AlarmButtonUp,
        EventKind::AlarmLongPress,
        EventKind::AlarmLongUp,
        EventKind::AlarmReallyLongPress,
        EventKind::AccelerometerWake,
        EventKind::SingleTap,
        EventKind::DoubleTap,
    ];

    /// Look up an event kind from its ordinal
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(ordinal as usize).copied()
    }

    /// The bit this kind occupies in an [`EventSet`]
    pub const fn bit(self) -> u32 {
        1 << self as u8
    }

    /// The button that produced this event, if any
    pub fn button(self) -> Option<Button> {
        Button::ALL
            .into_iter()
            .find(|button| (button.events() & self.bit()) != 0)
    }
}

/// An event as delivered to a face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Event {
    pub kind: EventKind,
    /// Position within the current second for [`EventKind::Tick`], zero otherwise
    pub subsecond: u8,
}

impl Event {
    pub const fn new(kind: EventKind) -> Self {
        Self { kind, subsecond: 0 }
    }

    pub const fn tick(subsecond: u8) -> Self {
        Self {
            kind: EventKind::Tick,
            subsecond,
        }
    }
}

impl From<EventKind> for Event {
    fn from(kind: EventKind) -> Self {
        Self::new(kind)
    }
}

/// A set of event kinds backed by a 32 bit bitmap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventSet(pub u32);

impl EventSet {
    pub const EMPTY: EventSet = EventSet(0);

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn insert(&mut self, kind: EventKind) {
        self.0 |= kind.bit();
    }

    /// Remove `kind` from the set, returning whether it was present
    pub fn remove(&mut self, kind: EventKind) -> bool {
        let present = self.contains(kind);
        self.0 &= !kind.bit();
        present
    }

    /// Split the set into the events inside and outside of `mask`
    pub const fn partition(self, mask: u32) -> (EventSet, EventSet) {
        (EventSet(self.0 & mask), EventSet(self.0 & !mask))
    }

    /// Whether any of the events were produced by a button
    pub const fn has_button_events(self) -> bool {
        self.0 & Button::ALL_EVENTS != 0
    }
}

impl core::ops::BitOr for EventSet {
    type Output = EventSet;

    fn bitor(self, rhs: Self) -> Self::Output {
        EventSet(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for EventSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl IntoIterator for EventSet {
    type Item = EventKind;
    type IntoIter = Events;

    fn into_iter(self) -> Self::IntoIter {
        Events(self.0)
    }
}

/// Iterator over an [`EventSet`], lowest ordinal first
pub struct Events(u32);

impl Iterator for Events {
    type Item = EventKind;

    fn next(&mut self) -> Option<Self::Item> {
        while self.0 != 0 {
            let ordinal = self.0.trailing_zeros() as u8;
            self.0 &= self.0 - 1;

            if let Some(kind) = EventKind::from_ordinal(ordinal) {
                return Some(kind);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterates_lowest_ordinal_first() {
        let mut set = EventSet::EMPTY;
        set.insert(EventKind::DoubleTap);
        set.insert(EventKind::ModeButtonUp);
        set.insert(EventKind::Tick);
        set.insert(EventKind::LightButtonDown);

        let order: Vec<_> = set.into_iter().collect();
        assert_eq!(
            order,
            [
                EventKind::Tick,
                EventKind::LightButtonDown,
                EventKind::ModeButtonUp,
                EventKind::DoubleTap
            ]
        );
    }

    #[test]
    fn unknown_bits_are_skipped() {
        let set = EventSet(1 << 31 | EventKind::Timeout.bit());
        assert_eq!(set.into_iter().collect::<Vec<_>>(), [EventKind::Timeout]);
    }

    #[test]
    fn button_of_event() {
        assert_eq!(EventKind::ModeLongUp.button(), Some(Button::Mode));
        assert_eq!(EventKind::AlarmReallyLongPress.button(), Some(Button::Alarm));
        assert_eq!(EventKind::Tick.button(), None);
        assert_eq!(EventKind::SingleTap.button(), None);
    }

    #[test]
    fn remove_reports_presence() {
        let mut set = EventSet(EventKind::Timeout.bit());
        assert!(set.remove(EventKind::Timeout));
        assert!(!set.remove(EventKind::Timeout));
        assert!(set.is_empty());
    }
}
