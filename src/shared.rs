//! # Volatile state
//!
//! State written by interrupt handlers and drained by the main loop. Scalars are atomics; the
//! compare table, the sequencer and the deferred sequence sit behind critical section mutexes.
//!
//! Interrupt handlers call the methods grouped under "Interrupt entry points" and arm the RTC
//! compare register with whatever target they return.

use core::cell::RefCell;

use critical_section::Mutex;
use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::button::{Button, ButtonLine, Edge};
use crate::buzzer::{OnDone, Priority, Sequence, Sequencer, Step, Volume};
use crate::clock::{self, TICKS_PER_MINUTE};
use crate::compare::{reached, CompareTable, Slot};
use crate::event::{EventKind, EventSet};
use crate::logging::trace;

/// A sequence waiting for low energy mode to end
#[derive(Debug, Clone)]
pub(crate) struct Deferred {
    pub sequence: Sequence,
    pub priority: Priority,
    pub on_done: Option<OnDone>,
}

pub struct Shared {
    events: AtomicU32,
    subsecond: AtomicU8,
    tick_frequency: AtomicU8,
    sleep_requested: AtomicBool,
    wake_requested: AtomicBool,
    sleeping: AtomicBool,
    minute_alarm_fired: AtomicBool,
    led_off_pending: AtomicBool,
    accelerometer_pending: AtomicBool,
    extwake: AtomicBool,
    /// Button events routed to the default handler instead of the foreground face
    passthrough: AtomicU32,
    buttons: [ButtonLine; 3],
    compare: Mutex<RefCell<CompareTable>>,
    sequencer: Mutex<RefCell<Sequencer>>,
    /// Sequence requested while in low energy mode
    deferred: Mutex<RefCell<Option<Deferred>>>,
}

impl Default for Shared {
    fn default() -> Self {
        Self::new()
    }
}

impl Shared {
    pub const fn new() -> Self {
        Self {
            events: AtomicU32::new(0),
            subsecond: AtomicU8::new(0),
            tick_frequency: AtomicU8::new(1),
            sleep_requested: AtomicBool::new(false),
            wake_requested: AtomicBool::new(false),
            sleeping: AtomicBool::new(false),
            minute_alarm_fired: AtomicBool::new(false),
            led_off_pending: AtomicBool::new(false),
            accelerometer_pending: AtomicBool::new(false),
            extwake: AtomicBool::new(false),
            passthrough: AtomicU32::new(0),
            buttons: [ButtonLine::new(), ButtonLine::new(), ButtonLine::new()],
            compare: Mutex::new(RefCell::new(CompareTable::new())),
            sequencer: Mutex::new(RefCell::new(Sequencer::new())),
            deferred: Mutex::new(RefCell::new(None)),
        }
    }

    // Interrupt entry points

    /// Button pin edge. `pressed` is the pin level read in the handler.
    pub fn button_edge(&self, button: Button, pressed: bool, now: u32) -> Option<u32> {
        critical_section::with(|cs| {
            let mut table = self.compare.borrow_ref_mut(cs);

            match self.buttons[button.index()].edge(button, pressed, now) {
                Some(Edge::Pressed {
                    events,
                    long_press_at,
                }) => {
                    self.passthrough
                        .fetch_and(!button.passthrough(), Ordering::AcqRel);
                    table.set(button.slot(), long_press_at);
                    self.post(events);
                }
                Some(Edge::Released { events }) => {
                    table.disable(button.slot());
                    self.post(events);
                }
                None => {}
            }

            Self::rearm(&mut table, now)
        })
    }

    /// The RTC compare matched
    pub fn compare_fired(&self, now: u32) -> Option<u32> {
        critical_section::with(|cs| {
            let mut table = self.compare.borrow_ref_mut(cs);
            let minute = table.target(Slot::Minute);

            for slot in table.take_expired(now).iter() {
                trace!("{:?} fired at {}", slot, now);

                match slot {
                    Slot::LightButton | Slot::ModeButton | Slot::AlarmButton => {
                        let button = match slot {
                            Slot::LightButton => Button::Light,
                            Slot::ModeButton => Button::Mode,
                            _ => Button::Alarm,
                        };
                        let line = &self.buttons[button.index()];
                        let (events, next) = line.long_press_elapsed(button);
                        self.post(events);
                        if let Some(next) = next {
                            table.set(slot, next);
                        }
                    }
                    Slot::Led => self.led_off_pending.store(true, Ordering::Release),
                    Slot::Resign => self.post(EventSet(EventKind::Timeout.bit())),
                    Slot::Sleep => self.sleep_requested.store(true, Ordering::Release),
                    Slot::Minute => {
                        self.minute_alarm_fired.store(true, Ordering::Release);

                        let mut next = minute.unwrap_or(now).wrapping_add(TICKS_PER_MINUTE);
                        while reached(next, now) {
                            next = next.wrapping_add(TICKS_PER_MINUTE);
                        }
                        table.set(Slot::Minute, next);
                    }
                }
            }

            Self::rearm(&mut table, now)
        })
    }

    /// Periodic tick
    pub fn tick(&self, now: u32) {
        let frequency = self.tick_frequency.load(Ordering::Acquire);
        self.subsecond
            .store(clock::subsecond(now, frequency), Ordering::Release);
        self.post(EventSet(EventKind::Tick.bit()));
    }

    /// Sequence timer. Apply the step with [`Buzzer::apply()`](crate::buzzer::Buzzer::apply).
    pub fn sequencer_step(&self) -> Step {
        critical_section::with(|cs| self.sequencer.borrow_ref_mut(cs).step())
    }

    /// External wake pin, only enabled in low energy mode
    pub fn extwake(&self) {
        self.extwake.store(true, Ordering::Release);
        self.wake_requested.store(true, Ordering::Release);
    }

    pub fn accelerometer_interrupt(&self) {
        self.accelerometer_pending.store(true, Ordering::Release);
    }

    fn rearm(table: &mut CompareTable, now: u32) -> Option<u32> {
        table.take_dirty();
        table.next(now)
    }

    // Main loop side

    pub fn post(&self, events: EventSet) {
        if !events.is_empty() {
            self.events.fetch_or(events.0, Ordering::AcqRel);
        }
    }

    /// Take every pending event
    pub fn take_events(&self) -> EventSet {
        EventSet(self.events.swap(0, Ordering::AcqRel))
    }

    /// Whether an interrupt left anything for the main loop since its last pass. Checked with
    /// interrupts masked right before halting.
    ///
    /// In low energy mode only the minute alarm and a wake request count. Anything else is left
    /// for after the wake.
    pub fn has_pending_work(&self) -> bool {
        if self.sleeping.load(Ordering::Acquire) {
            return self.minute_alarm_fired.load(Ordering::Acquire)
                || self.wake_requested.load(Ordering::Acquire);
        }

        self.events.load(Ordering::Acquire) != 0
            || self.minute_alarm_fired.load(Ordering::Acquire)
            || self.sleep_requested.load(Ordering::Acquire)
            || self.led_off_pending.load(Ordering::Acquire)
            || self.accelerometer_pending.load(Ordering::Acquire)
    }

    pub fn subsecond(&self) -> u8 {
        self.subsecond.load(Ordering::Acquire)
    }

    pub(crate) fn set_tick_frequency(&self, frequency: u8) {
        self.tick_frequency.store(frequency, Ordering::Release);
    }

    pub fn button_is_down(&self, button: Button) -> bool {
        self.buttons[button.index()].is_down()
    }

    pub fn passthrough(&self) -> u32 {
        self.passthrough.load(Ordering::Acquire)
    }

    pub(crate) fn set_passthrough(&self, mask: u32) {
        self.passthrough.store(mask, Ordering::Release);
    }

    pub fn request_sleep(&self) {
        self.sleep_requested.store(true, Ordering::Release);
    }

    pub(crate) fn take_sleep_requested(&self) -> bool {
        self.sleep_requested.swap(false, Ordering::AcqRel)
    }

    pub fn request_wake(&self) {
        self.wake_requested.store(true, Ordering::Release);
    }

    pub(crate) fn take_wake_requested(&self) -> bool {
        self.wake_requested.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn take_extwake(&self) -> bool {
        self.extwake.swap(false, Ordering::AcqRel)
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping.load(Ordering::Acquire)
    }

    /// Mark every button as up. Button edges are not delivered in low energy mode.
    pub(crate) fn forget_buttons(&self) {
        for line in &self.buttons {
            line.forget();
        }
    }

    pub(crate) fn set_sleeping(&self, sleeping: bool) {
        self.sleeping.store(sleeping, Ordering::Release);
    }

    pub(crate) fn take_minute_alarm(&self) -> bool {
        self.minute_alarm_fired.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn led_off_pending(&self) -> bool {
        self.led_off_pending.load(Ordering::Acquire)
    }

    pub(crate) fn clear_led_off_pending(&self) {
        self.led_off_pending.store(false, Ordering::Release);
    }

    pub(crate) fn take_accelerometer_pending(&self) -> bool {
        self.accelerometer_pending.swap(false, Ordering::AcqRel)
    }

    /// Run `f` on the compare table inside a critical section
    pub(crate) fn compare<R>(&self, f: impl FnOnce(&mut CompareTable) -> R) -> R {
        critical_section::with(|cs| f(&mut *self.compare.borrow_ref_mut(cs)))
    }

    pub(crate) fn start_sequence(
        &self,
        sequence: Sequence,
        priority: Priority,
        volume: Volume,
        on_done: Option<OnDone>,
    ) -> Option<Step> {
        critical_section::with(|cs| {
            self.sequencer
                .borrow_ref_mut(cs)
                .start(sequence, priority, volume, on_done)
        })
    }

    pub(crate) fn abort_sequence(&self) -> bool {
        critical_section::with(|cs| self.sequencer.borrow_ref_mut(cs).abort())
    }

    pub fn buzzer_busy(&self) -> bool {
        critical_section::with(|cs| self.sequencer.borrow_ref(cs).is_busy())
    }

    /// Stash a sequence to play once low energy mode is left. A pending sequence of higher
    /// priority is kept.
    pub(crate) fn defer(&self, request: Deferred) -> bool {
        critical_section::with(|cs| {
            let mut deferred = self.deferred.borrow_ref_mut(cs);
            match deferred.as_ref() {
                Some(pending) if pending.priority > request.priority => false,
                _ => {
                    *deferred = Some(request);
                    true
                }
            }
        })
    }

    pub(crate) fn take_deferred(&self) -> Option<Deferred> {
        critical_section::with(|cs| self.deferred.borrow_ref_mut(cs).take())
    }
}
