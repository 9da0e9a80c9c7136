//! Simulated watch for host tests
//!
//! [`Sim`] owns a counter and fires the interrupt entry points of [`Shared`] as it advances, the
//! way the RTC, the sequence timer and the button lines do on the watch. The flash and the
//! backup registers outlive a [`Sim::reboot()`].

use std::cell::{Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_storage::nor_flash::{ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash};
use rgb::RGB8;

use crate::accelerometer::{Accelerometer, DataRate, InterruptSource, Mode};
use crate::button::Button;
use crate::buzzer::{Buzzer, Note, Volume};
use crate::clock::{tick_period, TICKS_PER_MINUTE};
use crate::compare::reached;
use crate::event::{Event, EventKind};
use crate::face::{Advisory, Face};
use crate::fs::{RamFlash, BLOCK_SIZE, PAGE_SIZE, READ_SIZE};
use crate::movement::Movement;
use crate::platform::Platform;
use crate::runtime::Runtime;
use crate::shared::Shared;

pub const FLASH_SIZE: usize = 8192;

/// Give up waiting for an interrupt after a simulated day
const WAIT_LIMIT: u32 = TICKS_PER_MINUTE * 60 * 24;

/// A buzzer change: counter, tone, whether it happened in low energy mode
pub type Tone = (u32, Option<(Note, Volume)>, bool);

#[derive(Default)]
pub struct SimState {
    pub counter: u32,
    pub armed: Option<u32>,
    pub tick_frequency: Option<u8>,
    pub sequence_timer: bool,
    pub tones: Vec<Tone>,
    pub led: Option<RGB8>,
    pub clears: usize,
    pub backup: [u32; 8],
    pub low_energy: bool,
    /// Counter values at which low energy mode was entered
    pub low_energy_entries: Vec<u32>,
    pub backups_entered: usize,
    pub usb: bool,
    pub temperature: Option<f32>,
    /// Scheduled pin edges: counter, button, pressed
    edges: VecDeque<(u32, Button, bool)>,
}

impl SimState {
    /// Advance the counter by one tick. Returns whether any interrupt fired.
    fn step(&mut self, shared: &Shared) -> bool {
        self.counter = self.counter.wrapping_add(1);
        let now = self.counter;
        let mut fired = false;

        while self.edges.front().is_some_and(|&(at, _, _)| reached(at, now)) {
            let Some((_, button, pressed)) = self.edges.pop_front() else {
                break;
            };
            fired = true;

            if !self.low_energy {
                self.armed = shared.button_edge(button, pressed, now);
            } else if button == Button::Alarm && pressed {
                shared.extwake();
            }
        }

        if self.armed.is_some_and(|target| reached(target, now)) {
            self.armed = shared.compare_fired(now);
            fired = true;
        }

        if let Some(frequency) = self.tick_frequency {
            if now % tick_period(frequency) == 0 {
                shared.tick(now);
                fired = true;
            }
        }

        // 64 Hz
        if self.sequence_timer && now % 2 == 0 {
            let step = shared.sequencer_step();
            self.apply(step);
            fired = true;
        }

        fired
    }

    /// The tones played so far, without silences
    pub fn notes(&self) -> Vec<(u32, Note, Volume)> {
        self.tones
            .iter()
            .filter_map(|&(at, tone, _)| tone.map(|(note, volume)| (at, note, volume)))
            .collect()
    }
}

impl Buzzer for SimState {
    fn tone(&mut self, tone: Option<(Note, Volume)>) {
        self.tones.push((self.counter, tone, self.low_energy));
    }

    fn start_sequence_timer(&mut self) {
        self.sequence_timer = true;
    }

    fn stop_sequence_timer(&mut self) {
        self.sequence_timer = false;
    }
}

/// Handle on a simulated watch
#[derive(Clone)]
pub struct Sim {
    state: Rc<RefCell<SimState>>,
    flash: Rc<RefCell<RamFlash<FLASH_SIZE>>>,
    shared: &'static Shared,
}

impl Sim {
    pub fn new() -> Self {
        Self {
            state: Rc::default(),
            flash: Rc::new(RefCell::new(RamFlash::new())),
            shared: Box::leak(Box::new(Shared::new())),
        }
    }

    /// A fresh MCU on the same board: the counter, the flash and the backup registers carry
    /// over
    pub fn reboot(&self) -> Self {
        let state = self.state();
        let next = SimState {
            counter: state.counter,
            backup: state.backup,
            ..Default::default()
        };

        Self {
            state: Rc::new(RefCell::new(next)),
            flash: self.flash.clone(),
            shared: Box::leak(Box::new(Shared::new())),
        }
    }

    pub fn platform(&self) -> SimPlatform {
        SimPlatform {
            sim: self.clone(),
            accelerometer: None,
        }
    }

    pub fn platform_with_accelerometer(&self) -> SimPlatform {
        SimPlatform {
            sim: self.clone(),
            accelerometer: Some(SimAccelerometer::default()),
        }
    }

    pub fn flash(&self) -> SimFlash {
        SimFlash(self.flash.clone())
    }

    pub fn shared(&self) -> &'static Shared {
        self.shared
    }

    pub fn state(&self) -> Ref<'_, SimState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, SimState> {
        self.state.borrow_mut()
    }

    pub fn now(&self) -> u32 {
        self.state().counter
    }

    /// Press `button` at counter `at` for `ticks`
    pub fn press(&self, button: Button, at: u32, ticks: u32) {
        let mut state = self.state_mut();
        for edge in [(at, button, true), (at + ticks, button, false)] {
            let index = state.edges.partition_point(|&(t, _, _)| t <= edge.0);
            state.edges.insert(index, edge);
        }
    }

    pub fn step(&self) -> bool {
        self.state_mut().step(self.shared)
    }

    /// Step the counter up to `until`, running a loop pass after every tick. Low energy mode
    /// may carry the counter past `until`.
    pub fn run<const N: usize>(&self, runtime: &mut Runtime<'_, SimPlatform, N>, until: u32) {
        while !reached(until, self.now()) {
            self.step();
            runtime.run_once();
        }
    }

    /// Run for `ticks` counter ticks
    pub fn run_for<const N: usize>(&self, runtime: &mut Runtime<'_, SimPlatform, N>, ticks: u32) {
        let until = self.now().wrapping_add(ticks);
        self.run(runtime, until);
    }
}

pub struct SimPlatform {
    sim: Sim,
    accelerometer: Option<SimAccelerometer>,
}

impl Buzzer for SimPlatform {
    fn tone(&mut self, tone: Option<(Note, Volume)>) {
        self.sim.state_mut().tone(tone);
    }

    fn start_sequence_timer(&mut self) {
        self.sim.state_mut().start_sequence_timer();
    }

    fn stop_sequence_timer(&mut self) {
        self.sim.state_mut().stop_sequence_timer();
    }
}

impl Platform for SimPlatform {
    type Flash = SimFlash;
    type Accelerometer = SimAccelerometer;

    fn counter(&self) -> u32 {
        self.sim.now()
    }

    fn arm_compare(&mut self, target: Option<u32>) {
        self.sim.state_mut().armed = target;
    }

    fn set_tick_frequency(&mut self, frequency: Option<u8>) {
        self.sim.state_mut().tick_frequency = frequency;
    }

    fn clear_display(&mut self) {
        self.sim.state_mut().clears += 1;
    }

    fn set_led(&mut self, color: Option<RGB8>) {
        self.sim.state_mut().led = color;
    }

    fn read_backup(&self, index: u8) -> u32 {
        self.sim.state().backup.get(index as usize).copied().unwrap_or(0)
    }

    fn write_backup(&mut self, index: u8, value: u32) {
        if let Some(register) = self.sim.state_mut().backup.get_mut(index as usize) {
            *register = value;
        }
    }

    fn usb_attached(&self) -> bool {
        self.sim.state().usb
    }

    fn temperature(&mut self) -> Option<f32> {
        self.sim.state().temperature
    }

    fn accelerometer(&mut self) -> Option<&mut SimAccelerometer> {
        self.accelerometer.as_mut()
    }

    fn enter_low_energy(&mut self) {
        let mut state = self.sim.state_mut();
        state.low_energy = true;
        let now = state.counter;
        state.low_energy_entries.push(now);
    }

    fn exit_low_energy(&mut self) {
        self.sim.state_mut().low_energy = false;
    }

    fn wait_for_interrupt(&mut self) {
        let start = self.sim.now();
        while !self.sim.step() {
            assert!(
                self.sim.now().wrapping_sub(start) < WAIT_LIMIT,
                "nothing left to wake up for"
            );
        }
    }

    fn enter_backup(&mut self) {
        self.sim.state_mut().backups_entered += 1;
    }
}

/// Flash that survives a reboot
pub struct SimFlash(Rc<RefCell<RamFlash<FLASH_SIZE>>>);

impl ErrorType for SimFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for SimFlash {
    const READ_SIZE: usize = READ_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.0.borrow_mut().read(offset, bytes)
    }

    fn capacity(&self) -> usize {
        FLASH_SIZE
    }
}

impl NorFlash for SimFlash {
    const WRITE_SIZE: usize = PAGE_SIZE;
    const ERASE_SIZE: usize = BLOCK_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.0.borrow_mut().erase(from, to)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.0.borrow_mut().write(offset, bytes)
    }
}

#[derive(Debug, Default)]
pub struct SimAccelerometer {
    pub rate: DataRate,
    pub mode: Mode,
    pub taps: bool,
    pub threshold: u8,
    /// Returned by the next interrupt source read
    pub source: InterruptSource,
}

impl Accelerometer for SimAccelerometer {
    fn begin(&mut self) -> bool {
        true
    }

    fn data_rate(&self) -> DataRate {
        self.rate
    }

    fn set_data_rate(&mut self, rate: DataRate) {
        self.rate = rate;
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn set_tap_detection(&mut self, enabled: bool) {
        self.taps = enabled;
    }

    fn set_wakeup_threshold(&mut self, threshold: u8) {
        self.threshold = threshold;
    }

    fn interrupt_source(&mut self) -> InterruptSource {
        core::mem::take(&mut self.source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Setup,
    Activate,
    Event(EventKind),
    Resign,
    Advise,
}

/// Calls made on every face, in order
pub type Log = Rc<RefCell<Vec<(u8, Call)>>>;

pub type Hook = fn(&mut Recorder, EventKind, &mut Movement<SimPlatform>);

/// A face that records every call and otherwise behaves like the default handler
pub struct Recorder {
    pub index: u8,
    log: Log,
    pub advisory: Option<Advisory>,
    pub can_sleep: bool,
    pub hook: Option<Hook>,
}

impl Recorder {
    pub fn new(index: u8, log: &Log) -> Self {
        Self {
            index,
            log: log.clone(),
            advisory: None,
            can_sleep: true,
            hook: None,
        }
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().push((self.index, call));
    }
}

impl Face<SimPlatform> for Recorder {
    fn setup(&mut self, index: u8, _movement: &mut Movement<SimPlatform>) {
        assert_eq!(index, self.index);
        self.record(Call::Setup);
    }

    fn activate(&mut self, _movement: &mut Movement<SimPlatform>) {
        self.record(Call::Activate);
    }

    fn handle(&mut self, event: Event, movement: &mut Movement<SimPlatform>) -> bool {
        self.record(Call::Event(event.kind));
        if let Some(hook) = self.hook {
            hook(self, event.kind, movement);
        }
        movement.default_loop_handler(event) && self.can_sleep
    }

    fn resign(&mut self, _movement: &mut Movement<SimPlatform>) {
        self.record(Call::Resign);
    }

    fn advise(&mut self, _movement: &Movement<SimPlatform>) -> Option<Advisory> {
        self.record(Call::Advise);
        self.advisory
    }
}

/// `N` recording faces sharing one log
pub fn recorders<const N: usize>() -> (Log, [Recorder; N]) {
    let log = Log::default();
    let faces = core::array::from_fn(|i| Recorder::new(i as u8, &log));
    (log, faces)
}

/// The calls made on face `index`, ticks left out
pub fn calls(log: &Log, index: u8) -> Vec<Call> {
    log.borrow()
        .iter()
        .filter(|&&(face, call)| face == index && call != Call::Event(EventKind::Tick))
        .map(|&(_, call)| call)
        .collect()
}
