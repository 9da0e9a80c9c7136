//! # Buttons
//!
//! The watch has three buttons: Light, Mode and Alarm. Each button produces five events, derived
//! from a base down event:
//!
//! | Offset | Event |
//! |---|---|
//! | 0 | down |
//! | 1 | up (released before the long press threshold) |
//! | 2 | long press (still held at the long press threshold) |
//! | 3 | long up (released after a long press) |
//! | 4 | really long press (still held at the really long press threshold) |
//!
//! A release after a really long press is reported as a long up.
//!
//! ## Long press detection
//!
//! A press arms the button's compare slot at `down + LONG_PRESS_TICKS`. Each time the slot fires
//! while the button is still down the next stage is posted and the slot is re-armed for the
//! following threshold. The last threshold is a guard against stuck buttons which ends the chain
//! without posting anything.

use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::clock::COUNTER_HZ;
use crate::compare::Slot;
use crate::event::{EventKind, EventSet};
use crate::logging::warn;

/// Counter ticks before a held button becomes a long press (500 ms)
pub const LONG_PRESS_TICKS: u32 = COUNTER_HZ / 2;

/// Counter ticks before a held button becomes a really long press (1.5 s)
pub const REALLY_LONG_PRESS_TICKS: u32 = COUNTER_HZ * 3 / 2;

/// Counter ticks after which a held button is considered stuck (10 s)
pub const MAX_LONG_PRESS_TICKS: u32 = COUNTER_HZ * 10;

/// Window in which a down edge following an up edge is treated as contact bounce
#[cfg(feature = "debounce")]
pub const DEBOUNCE_TICKS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    Light,
    Mode,
    Alarm,
}

impl Button {
    pub const ALL: [Button; 3] = [Button::Light, Button::Mode, Button::Alarm];

    /// Every event produced by any button
    pub const ALL_EVENTS: u32 =
        Button::Light.events() | Button::Mode.events() | Button::Alarm.events();

    /// Every event that is routed to the default handler after a face change
    pub const ALL_PASSTHROUGH: u32 = Button::Light.passthrough()
        | Button::Mode.passthrough()
        | Button::Alarm.passthrough();

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn down(self) -> EventKind {
        match self {
            Button::Light => EventKind::LightButtonDown,
            Button::Mode => EventKind::ModeButtonDown,
            Button::Alarm => EventKind::AlarmButtonDown,
        }
    }

    pub const fn up(self) -> EventKind {
        match self {
            Button::Light => EventKind::LightButtonUp,
            Button::Mode => EventKind::ModeButtonUp,
            Button::Alarm => EventKind::AlarmButtonUp,
        }
    }

    pub const fn long_press(self) -> EventKind {
        match self {
            Button::Light => EventKind::LightLongPress,
            Button::Mode => EventKind::ModeLongPress,
            Button::Alarm => EventKind::AlarmLongPress,
        }
    }

    pub const fn long_up(self) -> EventKind {
        match self {
            Button::Light => EventKind::LightLongUp,
            Button::Mode => EventKind::ModeLongUp,
            Button::Alarm => EventKind::AlarmLongUp,
        }
    }

    pub const fn really_long_press(self) -> EventKind {
        match self {
            Button::Light => EventKind::LightReallyLongPress,
            Button::Mode => EventKind::ModeReallyLongPress,
            Button::Alarm => EventKind::AlarmReallyLongPress,
        }
    }

    /// Bitmap of the five events of this button
    pub const fn events(self) -> u32 {
        0b11111 << self.down() as u8
    }

    /// Bitmap of the events of this button except for down
    pub const fn passthrough(self) -> u32 {
        self.events() & !self.down().bit()
    }

    /// The compare slot used for long press detection
    pub const fn slot(self) -> Slot {
        match self {
            Button::Light => Slot::LightButton,
            Button::Mode => Slot::ModeButton,
            Button::Alarm => Slot::AlarmButton,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Stage {
    Up = 0,
    Down,
    Long,
    ReallyLong,
    Stuck,
}

impl Stage {
    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Stage::Down,
            2 => Stage::Long,
            3 => Stage::ReallyLong,
            4 => Stage::Stuck,
            _ => Stage::Up,
        }
    }
}

/// Result of an accepted button edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edge {
    /// The button went down, the long press slot must be armed at `long_press_at`
    Pressed { events: EventSet, long_press_at: u32 },
    /// The button was released, the long press slot must be disabled
    Released { events: EventSet },
}

/// Per button record written by the button and compare interrupts
pub(crate) struct ButtonLine {
    is_down: AtomicBool,
    down_timestamp: AtomicU32,
    #[cfg_attr(not(feature = "debounce"), allow(dead_code))]
    up_timestamp: AtomicU32,
    stage: AtomicU8,
}

impl ButtonLine {
    pub(crate) const fn new() -> Self {
        Self {
            is_down: AtomicBool::new(false),
            down_timestamp: AtomicU32::new(0),
            up_timestamp: AtomicU32::new(0),
            stage: AtomicU8::new(Stage::Up as u8),
        }
    }

    pub(crate) fn is_down(&self) -> bool {
        self.is_down.load(Ordering::Acquire)
    }

    fn stage(&self) -> Stage {
        Stage::from_bits(self.stage.load(Ordering::Acquire))
    }

    fn set_stage(&self, stage: Stage) {
        self.stage.store(stage as u8, Ordering::Release);
    }

    /// Mark the button as up without posting anything
    ///
    /// Used when edges stop being delivered, so a release that was never seen can't leave the
    /// line down. A release seen afterwards is then spurious and dropped.
    pub(crate) fn forget(&self) {
        self.is_down.store(false, Ordering::Release);
        self.set_stage(Stage::Up);
    }

    /// Handle a pin edge. `pressed` is the pin level read in the interrupt.
    ///
    /// Returns `None` when the edge is spurious (the level matches the recorded state) or was
    /// dropped by the debouncer.
    pub(crate) fn edge(&self, button: Button, pressed: bool, now: u32) -> Option<Edge> {
        if pressed == self.is_down() {
            return None;
        }

        if pressed {
            #[cfg(feature = "debounce")]
            if now.wrapping_sub(self.up_timestamp.load(Ordering::Acquire)) < DEBOUNCE_TICKS {
                return None;
            }

            self.down_timestamp.store(now, Ordering::Release);
            self.set_stage(Stage::Down);
            self.is_down.store(true, Ordering::Release);

            Some(Edge::Pressed {
                events: EventSet(button.down().bit()),
                long_press_at: now.wrapping_add(LONG_PRESS_TICKS),
            })
        } else {
            #[cfg(feature = "debounce")]
            self.up_timestamp.store(now, Ordering::Release);

            self.is_down.store(false, Ordering::Release);
            let stage = self.stage();
            self.set_stage(Stage::Up);

            let elapsed = now.wrapping_sub(self.down_timestamp.load(Ordering::Acquire));
            let mut events = EventSet::EMPTY;

            if elapsed < LONG_PRESS_TICKS {
                events.insert(button.up());
            } else {
                // The release raced the long press compare
                if stage == Stage::Down {
                    events.insert(button.long_press());
                }
                events.insert(button.long_up());
            }

            Some(Edge::Released { events })
        }
    }

    /// Handle the button's compare slot firing.
    ///
    /// Returns the events to post and the next target for the slot, if the chain continues.
    pub(crate) fn long_press_elapsed(&self, button: Button) -> (EventSet, Option<u32>) {
        if !self.is_down() {
            return (EventSet::EMPTY, None);
        }

        let down = self.down_timestamp.load(Ordering::Acquire);

        match self.stage() {
            Stage::Down => {
                self.set_stage(Stage::Long);
                (
                    EventSet(button.long_press().bit()),
                    Some(down.wrapping_add(REALLY_LONG_PRESS_TICKS)),
                )
            }
            Stage::Long => {
                self.set_stage(Stage::ReallyLong);
                (
                    EventSet(button.really_long_press().bit()),
                    Some(down.wrapping_add(MAX_LONG_PRESS_TICKS)),
                )
            }
            Stage::ReallyLong => {
                warn!("{:?} button stuck down", button);
                self.set_stage(Stage::Stuck);
                (EventSet::EMPTY, None)
            }
            Stage::Up | Stage::Stuck => (EventSet::EMPTY, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(events: EventSet) -> Vec<EventKind> {
        events.into_iter().collect()
    }

    #[test]
    fn event_offsets() {
        for button in Button::ALL {
            let base = button.down() as u8;
            assert_eq!(button.up() as u8, base + 1);
            assert_eq!(button.long_press() as u8, base + 2);
            assert_eq!(button.long_up() as u8, base + 3);
            assert_eq!(button.really_long_press() as u8, base + 4);
        }
    }

    #[test]
    fn passthrough_excludes_down() {
        assert_eq!(Button::ALL_PASSTHROUGH & EventKind::ModeButtonDown.bit(), 0);
        assert_ne!(Button::ALL_PASSTHROUGH & EventKind::ModeButtonUp.bit(), 0);
        assert_ne!(Button::ALL_PASSTHROUGH & EventKind::LightLongUp.bit(), 0);
    }

    #[test]
    fn short_press() {
        let line = ButtonLine::new();

        let pressed = line.edge(Button::Mode, true, 1000).unwrap();
        assert_eq!(
            pressed,
            Edge::Pressed {
                events: EventSet(EventKind::ModeButtonDown.bit()),
                long_press_at: 1000 + LONG_PRESS_TICKS
            }
        );

        let Edge::Released { events } = line.edge(Button::Mode, false, 1010).unwrap() else {
            panic!("expected a release");
        };
        assert_eq!(kinds(events), [EventKind::ModeButtonUp]);
    }

    #[test]
    fn spurious_edges_are_ignored() {
        let line = ButtonLine::new();
        assert_eq!(line.edge(Button::Light, false, 10), None);

        line.edge(Button::Light, true, 20).unwrap();
        assert_eq!(line.edge(Button::Light, true, 21), None);
    }

    #[test]
    fn long_and_really_long_press() {
        let line = ButtonLine::new();
        line.edge(Button::Alarm, true, 0).unwrap();

        let (events, next) = line.long_press_elapsed(Button::Alarm);
        assert_eq!(kinds(events), [EventKind::AlarmLongPress]);
        assert_eq!(next, Some(REALLY_LONG_PRESS_TICKS));

        let (events, next) = line.long_press_elapsed(Button::Alarm);
        assert_eq!(kinds(events), [EventKind::AlarmReallyLongPress]);
        assert_eq!(next, Some(MAX_LONG_PRESS_TICKS));

        // Stuck guard ends the chain silently
        let (events, next) = line.long_press_elapsed(Button::Alarm);
        assert!(events.is_empty());
        assert_eq!(next, None);

        let Edge::Released { events } =
            line.edge(Button::Alarm, false, MAX_LONG_PRESS_TICKS + 5).unwrap()
        else {
            panic!("expected a release");
        };
        assert_eq!(kinds(events), [EventKind::AlarmLongUp]);
    }

    #[test]
    fn late_release_still_posts_long_press() {
        let line = ButtonLine::new();
        line.edge(Button::Light, true, u32::MAX - 10).unwrap();

        let Edge::Released { events } = line
            .edge(Button::Light, false, (u32::MAX - 10).wrapping_add(LONG_PRESS_TICKS + 1))
            .unwrap()
        else {
            panic!("expected a release");
        };
        assert_eq!(
            kinds(events),
            [EventKind::LightLongPress, EventKind::LightLongUp]
        );
    }

    #[test]
    fn compare_after_release_is_ignored() {
        let line = ButtonLine::new();
        line.edge(Button::Mode, true, 0).unwrap();
        line.edge(Button::Mode, false, 5).unwrap();

        assert_eq!(line.long_press_elapsed(Button::Mode), (EventSet::EMPTY, None));
    }

    #[test]
    fn forgotten_press_starts_over() {
        let line = ButtonLine::new();
        line.edge(Button::Light, true, 0).unwrap();
        line.long_press_elapsed(Button::Light);

        line.forget();
        assert!(!line.is_down());

        // The release of the forgotten press
        assert_eq!(line.edge(Button::Light, false, 40_000), None);
        assert_eq!(line.long_press_elapsed(Button::Light), (EventSet::EMPTY, None));

        assert_eq!(
            line.edge(Button::Light, true, 50_000),
            Some(Edge::Pressed {
                events: EventSet(EventKind::LightButtonDown.bit()),
                long_press_at: 50_000 + LONG_PRESS_TICKS
            })
        );
        let Edge::Released { events } = line.edge(Button::Light, false, 50_010).unwrap() else {
            panic!("expected a release");
        };
        assert_eq!(kinds(events), [EventKind::LightButtonUp]);
    }

    #[cfg(feature = "debounce")]
    #[test]
    fn bounce_after_release_is_dropped() {
        let line = ButtonLine::new();
        line.edge(Button::Mode, true, 100).unwrap();
        line.edge(Button::Mode, false, 120).unwrap();

        assert_eq!(line.edge(Button::Mode, true, 121), None);
        assert!(line.edge(Button::Mode, true, 120 + DEBOUNCE_TICKS).is_some());
    }
}
