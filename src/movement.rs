//! # Movement
//!
//! The handle faces get to reach the runtime and the hardware. It owns the platform, the
//! filesystem, the settings and the wall clock, and keeps track of which face is in the
//! foreground.

use rgb::RGB8;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::accelerometer::{self, Accelerometer, DataRate, SavedConfig};
use crate::button::Button;
use crate::buzzer::{Note, OnDone, Priority, Sequence, Volume, ALARM_TUNE, SIGNAL_TUNE};
use crate::clock::{self, Clock, COUNTER_HZ};
use crate::compare::Slot;
use crate::config::{Config, MAX_FACES};
use crate::event::{Event, EventKind, EventSet};
use crate::fs::{DirEntry, Filesystem, FsError};
use crate::led::{self, Dwell, LedState};
use crate::logging::{debug, info, warn};
use crate::platform::Platform;
use crate::settings::{Settings, SettingsStore};
use crate::shared::{Deferred, Shared};
use crate::zone::DstCache;

/// Backup register mirroring the settings word
pub const SETTINGS_REGISTER: u8 = 0;
/// Backup register holding the Unix time at counter 0
pub const REFERENCE_REGISTER: u8 = 1;
/// Backup registers handed out by [`Movement::claim_backup_register()`]
pub const USER_REGISTERS: core::ops::RangeInclusive<u8> = 2..=6;

/// Wakeup threshold, in units of 2 g / 64
const DEFAULT_MOTION_THRESHOLD: u8 = 24;

pub struct Movement<P: Platform> {
    platform: P,
    shared: &'static Shared,
    fs: Filesystem<P::Flash>,
    settings: Settings,
    settings_store: SettingsStore,
    clock: Clock,
    dst: DstCache,
    current: u8,
    next: u8,
    face_changed: bool,
    num_faces: u8,
    secondary: Option<u8>,
    led: LedState,
    /// Unix time of each face's scheduled background task
    scheduled: [Option<u32>; MAX_FACES],
    /// `None` while the tick is stopped in low energy mode
    tick_frequency: Option<u8>,
    next_backup_register: u8,
    signal_volume: Volume,
    alarm_volume: Volume,
    has_accelerometer: bool,
    has_thermistor: bool,
    /// Configuration to restore once tap detection is disabled
    tap_detection: Option<SavedConfig>,
    background_rate: DataRate,
    motion_threshold: u8,
    alarm_enabled: bool,
    backup_requested: bool,
}

impl<P: Platform> Movement<P> {
    /// Bring up the filesystem, settings, clock and accelerometer.
    ///
    /// When `resume` is set the settings are taken from their backup register mirror if it is
    /// valid.
    pub(crate) fn new(
        mut platform: P,
        flash: P::Flash,
        shared: &'static Shared,
        config: &Config,
        num_faces: u8,
        resume: bool,
    ) -> Self {
        // Filesystem
        let mut fs = Filesystem::new(flash);
        if let Err(e) = fs.mount_or_format() {
            warn!("filesystem unavailable: {:?}", e);
        }

        // Settings
        //
        // * Prefer the backup register mirror when waking from backup mode
        // * Fall back to the settings file, which writes the defaults if needed
        let mut settings_store = SettingsStore::new();
        let mirrored = Settings::from_bits(platform.read_backup(SETTINGS_REGISTER));
        let settings = if resume && mirrored.is_current() {
            mirrored
        } else {
            settings_store.load(&mut fs, config.settings)
        };
        platform.write_backup(SETTINGS_REGISTER, settings.bits());

        // Clock
        //
        // A zero reference means the backup domain was reset and the time is lost
        let now = platform.counter();
        let clock = match platform.read_backup(REFERENCE_REGISTER) {
            0 => {
                warn!("clock lost, seeding with {}", config.fallback_unix);
                let mut clock = Clock::new(0);
                clock.set_unix_time(now, config.fallback_unix);
                platform.write_backup(REFERENCE_REGISTER, clock.reference());
                clock
            }
            reference => {
                let mut clock = Clock::new(reference);
                clock.observe(now);
                clock
            }
        };

        // Accelerometer
        let has_accelerometer = match platform.accelerometer() {
            Some(accelerometer) => {
                let found = accelerometer.begin();
                if found {
                    accelerometer.set_data_rate(DataRate::Lowest);
                    accelerometer.set_wakeup_threshold(DEFAULT_MOTION_THRESHOLD);
                }
                found
            }
            None => false,
        };
        let has_thermistor = platform.temperature().is_some();

        let mut movement = Self {
            platform,
            shared,
            fs,
            settings,
            settings_store,
            clock,
            dst: DstCache::new(),
            current: 0,
            next: 0,
            face_changed: false,
            num_faces: num_faces.clamp(1, MAX_FACES as u8),
            secondary: config.secondary_face.filter(|&index| index < num_faces),
            led: LedState::Off,
            scheduled: [None; MAX_FACES],
            tick_frequency: None,
            next_backup_register: *USER_REGISTERS.start(),
            signal_volume: config.signal_volume,
            alarm_volume: config.alarm_volume,
            has_accelerometer,
            has_thermistor,
            tap_detection: None,
            background_rate: DataRate::Lowest,
            motion_threshold: DEFAULT_MOTION_THRESHOLD,
            alarm_enabled: false,
            backup_requested: false,
        };

        movement.dst.refresh(movement.utc_timestamp() as i64);
        let minute = movement.clock.next_minute(now);
        shared.compare(|table| table.set(Slot::Minute, minute));
        movement.request_tick_frequency(1);
        movement.reset_inactivity();

        info!(
            "movement up with {} faces, accelerometer: {}",
            movement.num_faces, has_accelerometer
        );

        movement
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn shared(&self) -> &'static Shared {
        self.shared
    }

    /// Build an event stamped with the current subsecond
    pub fn event(&self, kind: EventKind) -> Event {
        Event {
            kind,
            subsecond: self.shared.subsecond(),
        }
    }

    // Faces

    /// Index of the foreground face
    pub fn current_face(&self) -> u8 {
        self.current
    }

    pub fn num_faces(&self) -> u8 {
        self.num_faces
    }

    pub fn secondary_face(&self) -> Option<u8> {
        self.secondary
    }

    /// Switch to the face at `index` at the end of this loop pass
    pub fn move_to_face(&mut self, index: u8) {
        if index >= self.num_faces {
            debug!("no face {}", index);
            return;
        }

        self.next = index;
        self.face_changed = true;
    }

    /// Advance to the next face, wrapping at the secondary face when coming from below it
    pub fn move_to_next_face(&mut self) {
        let end = match self.secondary {
            Some(secondary) if self.current < secondary => secondary,
            _ => self.num_faces,
        };
        self.move_to_face((self.current + 1) % end);
    }

    /// Take a pending face change, returning the face to switch to
    pub(crate) fn take_face_change(&mut self) -> Option<u8> {
        if core::mem::replace(&mut self.face_changed, false) {
            Some(self.next)
        } else {
            None
        }
    }

    /// Make `index` the foreground face, called between resigning the old face and activating
    /// the new one
    pub(crate) fn switch_to(&mut self, index: u8) {
        debug!("face {} -> {}", self.current, index);

        self.current = index;
        self.platform.clear_display();
        self.request_tick_frequency(1);

        if self.settings.button_should_sound() {
            let note = if index == 0 { Note::C8 } else { Note::C7 };
            self.play_note(note, 50);
        }
    }

    // Tick

    /// Request a tick frequency in Hz. Anything but a power of two up to 128 gets 1 Hz.
    pub fn request_tick_frequency(&mut self, frequency: u8) {
        let frequency = clock::tick_frequency(frequency);
        if self.tick_frequency == Some(frequency) {
            return;
        }

        self.tick_frequency = Some(frequency);
        self.shared.set_tick_frequency(frequency);
        self.platform.set_tick_frequency(Some(frequency));
    }

    pub fn tick_frequency(&self) -> Option<u8> {
        self.tick_frequency
    }

    // LED

    /// Light the LED in the user's color for the configured dwell time
    pub fn illuminate_led(&mut self) {
        let dwell = self.settings.led_dwell();
        if dwell == Dwell::Disabled {
            return;
        }

        let s = self.settings;
        self.platform
            .set_led(Some(led::color(s.led_red(), s.led_green(), s.led_blue())));
        self.led = LedState::Illuminated;
        self.shared.clear_led_off_pending();

        let now = self.platform.counter();
        self.shared.compare(|table| match dwell.ticks() {
            Some(ticks) => table.set(Slot::Led, now.wrapping_add(ticks)),
            None => table.disable(Slot::Led),
        });
    }

    /// Light the LED in `color` until [`Movement::force_led_off()`]
    pub fn force_led_on(&mut self, color: RGB8) {
        self.platform.set_led(Some(color));
        self.led = LedState::Forced;
        self.shared.compare(|table| table.disable(Slot::Led));
    }

    pub fn force_led_off(&mut self) {
        self.platform.set_led(None);
        self.led = LedState::Off;
        self.shared.clear_led_off_pending();
        self.shared.compare(|table| table.disable(Slot::Led));
    }

    pub fn led_state(&self) -> LedState {
        self.led
    }

    /// Turn the LED off once its dwell time is up and the Light button has been released
    pub(crate) fn service_led(&mut self) {
        if self.shared.led_off_pending() && !self.shared.button_is_down(Button::Light) {
            self.shared.clear_led_off_pending();
            if self.led == LedState::Illuminated {
                self.force_led_off();
            }
        }
    }

    // Background tasks

    /// Dispatch a background task event to the current face at `unix`
    pub fn schedule_background_task(&mut self, unix: u32) -> bool {
        self.schedule_background_task_for_face(self.current, unix)
    }

    /// Dispatch a background task event to the face at `index` at `unix`, which must be in the
    /// future
    pub fn schedule_background_task_for_face(&mut self, index: u8, unix: u32) -> bool {
        if index >= self.num_faces || unix <= self.utc_timestamp() {
            debug!("not scheduling face {} at {}", index, unix);
            return false;
        }

        self.scheduled[index as usize] = Some(unix);
        true
    }

    pub fn cancel_background_task(&mut self) {
        self.cancel_background_task_for_face(self.current);
    }

    pub fn cancel_background_task_for_face(&mut self, index: u8) {
        if let Some(slot) = self.scheduled.get_mut(index as usize) {
            *slot = None;
        }
    }

    pub(crate) fn has_scheduled_tasks(&self) -> bool {
        self.scheduled.iter().any(Option::is_some)
    }

    /// Clear the face's task if it is due at `now`, returning whether it was
    pub(crate) fn take_due_task(&mut self, index: u8, now: u32) -> bool {
        match self.scheduled.get_mut(index as usize) {
            Some(slot) if slot.is_some_and(|at| at <= now) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    // Sleep

    /// Enter low energy mode at the end of this loop pass
    pub fn request_sleep(&self) {
        self.shared.request_sleep();
    }

    /// Leave low energy mode
    pub fn request_wake(&self) {
        self.shared.request_wake();
    }

    /// Enter backup mode at the end of this loop pass. Only the RTC and the backup registers
    /// survive, waking up resets the watch.
    pub fn enter_backup_mode(&mut self) {
        self.backup_requested = true;
    }

    pub fn usb_attached(&self) -> bool {
        self.platform.usb_attached()
    }

    /// Whether the runtime itself allows halting until the next interrupt
    pub(crate) fn may_halt(&self) -> bool {
        !self.led.is_on() && !self.platform.usb_attached() && !self.shared.buzzer_busy()
    }

    /// Restart both inactivity countdowns
    pub(crate) fn reset_inactivity(&mut self) {
        let now = self.platform.counter();
        let timeout = self.settings.timeout() * COUNTER_HZ;
        let low_energy = self.settings.low_energy_timeout();

        self.shared.compare(|table| {
            table.set(Slot::Resign, now.wrapping_add(timeout));
            match low_energy {
                Some(seconds) => table.set(Slot::Sleep, now.wrapping_add(seconds * COUNTER_HZ)),
                None => table.disable(Slot::Sleep),
            }
        });
    }

    /// A button was pressed or released
    pub(crate) fn button_activity(&mut self) {
        if self.shared.abort_sequence() {
            self.platform.tone(None);
            self.platform.stop_sequence_timer();
        }
        self.reset_inactivity();
    }

    pub(crate) fn enter_low_energy(&mut self) {
        info!("entering low energy mode");

        self.shared.set_sleeping(true);
        self.shared.forget_buttons();
        self.force_led_off();
        self.tick_frequency = None;
        self.platform.set_tick_frequency(None);

        self.shared.compare(|table| {
            table.disable(Slot::Resign);
            table.disable(Slot::Sleep);
            for button in Button::ALL {
                table.disable(button.slot());
            }
        });

        self.platform.enter_low_energy();
        self.apply_compare();
    }

    pub(crate) fn exit_low_energy(&mut self) {
        self.platform.exit_low_energy();
        self.shared.set_sleeping(false);
        self.shared.take_extwake();
        // Nothing posted while asleep is still relevant
        self.shared.take_events();
        self.shared.take_sleep_requested();

        self.request_tick_frequency(1);
        self.reset_inactivity();

        info!("leaving low energy mode");
    }

    pub(crate) fn take_backup_request(&mut self) -> bool {
        core::mem::replace(&mut self.backup_requested, false)
    }

    pub(crate) fn enter_backup(&mut self) {
        info!("entering backup mode");

        self.platform
            .write_backup(SETTINGS_REGISTER, self.settings.bits());
        self.platform
            .write_backup(REFERENCE_REGISTER, self.clock.reference());
        self.force_led_off();
        self.platform.enter_backup();
    }

    // Compare

    /// Write the earliest compare target out to the hardware if the table changed
    pub(crate) fn apply_compare(&mut self) {
        let now = self.platform.counter();
        let platform = &mut self.platform;

        self.shared.compare(|table| {
            if table.take_dirty() {
                platform.arm_compare(table.next(now));
            }
        });
    }

    // Buzzer

    /// Play `sequence` at `priority`. Returns whether the sequence was accepted.
    ///
    /// In low energy mode the sequence is held back, and a wake is requested so it can play once
    /// the watch is awake again.
    pub fn play_sequence(&mut self, sequence: Sequence, priority: Priority) -> bool {
        self.play(sequence, priority, None)
    }

    /// Like [`Movement::play_sequence()`], and call `on_done` once the sequence has played to the
    /// end. It is not called if the sequence is preempted or aborted by a button press.
    ///
    /// `on_done` runs in the sequence timer interrupt.
    pub fn play_sequence_with_callback(
        &mut self,
        sequence: Sequence,
        priority: Priority,
        on_done: OnDone,
    ) -> bool {
        self.play(sequence, priority, Some(on_done))
    }

    fn play(&mut self, sequence: Sequence, priority: Priority, on_done: Option<OnDone>) -> bool {
        if self.shared.is_sleeping() {
            let deferred = self.shared.defer(Deferred {
                sequence,
                priority,
                on_done,
            });
            self.shared.request_wake();
            return deferred;
        }

        match self
            .shared
            .start_sequence(sequence, priority, self.volume(priority), on_done)
        {
            Some(step) => {
                self.platform.apply(step);
                self.platform.start_sequence_timer();
                true
            }
            None => {
                debug!("{:?} sequence dropped", priority);
                false
            }
        }
    }

    /// Play a single note at button priority
    pub fn play_note(&mut self, note: Note, duration_ms: u16) -> bool {
        self.play_sequence(Sequence::note(note, duration_ms), Priority::Button)
    }

    /// Play the hourly chime
    pub fn play_signal(&mut self) -> bool {
        self.play_sequence(Sequence::Static(&SIGNAL_TUNE), Priority::Signal)
    }

    pub fn play_alarm(&mut self) -> bool {
        self.play_sequence(Sequence::Static(&ALARM_TUNE), Priority::Alarm)
    }

    /// Play `rounds` seconds of beeps on `note` at alarm priority
    pub fn play_alarm_beeps(&mut self, rounds: u8, note: Note) -> bool {
        self.play_sequence(Sequence::alarm_beeps(rounds, note), Priority::Alarm)
    }

    pub fn buzzer_busy(&self) -> bool {
        self.shared.buzzer_busy()
    }

    /// Start the sequence held back during low energy mode
    pub(crate) fn play_deferred(&mut self) {
        if let Some(deferred) = self.shared.take_deferred() {
            self.play(deferred.sequence, deferred.priority, deferred.on_done);
        }
    }

    pub fn volume(&self, priority: Priority) -> Volume {
        match priority {
            Priority::Button => self.settings.button_volume(),
            Priority::Signal => self.signal_volume,
            Priority::Alarm => self.alarm_volume,
        }
    }

    pub fn set_signal_volume(&mut self, volume: Volume) {
        self.signal_volume = volume;
    }

    pub fn set_alarm_volume(&mut self, volume: Volume) {
        self.alarm_volume = volume;
    }

    // Backup registers

    /// Claim a backup register for a face. Returns `None` once they have all been handed out.
    pub fn claim_backup_register(&mut self) -> Option<u8> {
        let index = self.next_backup_register;
        if !USER_REGISTERS.contains(&index) || index >= P::BACKUP_REGISTERS {
            debug!("no backup registers left");
            return None;
        }

        self.next_backup_register += 1;
        Some(index)
    }

    fn is_claimed(&self, index: u8) -> bool {
        USER_REGISTERS.contains(&index) && index < self.next_backup_register
    }

    /// Read a claimed backup register, 0 if it hasn't been claimed
    pub fn backup_register(&self, index: u8) -> u32 {
        if self.is_claimed(index) {
            self.platform.read_backup(index)
        } else {
            debug!("backup register {} is not claimed", index);
            0
        }
    }

    pub fn set_backup_register(&mut self, index: u8, value: u32) {
        if self.is_claimed(index) {
            self.platform.write_backup(index, value);
        } else {
            debug!("backup register {} is not claimed", index);
        }
    }

    // Time

    /// Fold a counter wrap into the clock reference
    pub(crate) fn observe_clock(&mut self) {
        if self.clock.observe(self.platform.counter()) {
            info!("counter wrapped");
            self.platform
                .write_backup(REFERENCE_REGISTER, self.clock.reference());
        }
    }

    /// Recompute the zone offsets if they are from another half hour
    pub(crate) fn refresh_dst(&mut self) {
        let unix = self.utc_timestamp() as i64;
        if self.dst.is_stale(unix) {
            self.dst.refresh(unix);
        }
    }

    pub fn utc_timestamp(&self) -> u32 {
        self.clock.unix_time(self.platform.counter())
    }

    pub fn utc_date_time(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.utc_timestamp() as i64)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    /// Date and time in the user's zone
    pub fn local_date_time(&self) -> OffsetDateTime {
        self.date_time_in_zone(self.settings.time_zone())
    }

    pub fn date_time_in_zone(&self, zone: u8) -> OffsetDateTime {
        let offset = UtcOffset::from_whole_seconds(self.timezone_offset_seconds_for(zone))
            .unwrap_or(UtcOffset::UTC);
        self.utc_date_time().to_offset(offset)
    }

    /// Offset of the user's zone from UTC (seconds), including DST
    pub fn timezone_offset_seconds(&self) -> i32 {
        self.timezone_offset_seconds_for(self.settings.time_zone())
    }

    pub fn timezone_offset_seconds_for(&self, zone: u8) -> i32 {
        self.dst.offset(zone)
    }

    pub fn set_utc_timestamp(&mut self, unix: u32) {
        let now = self.platform.counter();
        self.clock.set_unix_time(now, unix);
        self.platform
            .write_backup(REFERENCE_REGISTER, self.clock.reference());
        self.dst.refresh(unix as i64);

        let minute = self.clock.next_minute(now);
        self.shared
            .compare(|table| table.set(Slot::Minute, minute));

        info!("clock set to {}", unix);
    }

    /// Set the clock from a date and time in the user's zone. Returns `false` if it can't be
    /// represented.
    pub fn set_local_date_time(&mut self, local: PrimitiveDateTime) -> bool {
        let unix = local.assume_utc().unix_timestamp() - self.timezone_offset_seconds() as i64;
        match u32::try_from(unix) {
            Ok(unix) => {
                self.set_utc_timestamp(unix);
                true
            }
            Err(_) => {
                debug!("{} is out of range", unix);
                false
            }
        }
    }

    // Settings

    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Replace the settings in memory. They are persisted by [`Movement::store_settings()`].
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// Persist the settings if they changed and update their backup register mirror
    pub fn store_settings(&mut self) -> Result<bool, FsError> {
        self.platform
            .write_backup(SETTINGS_REGISTER, self.settings.bits());
        self.settings_store.store(&mut self.fs, self.settings)
    }

    // Alarm indicator

    /// Whether any face advised an active alarm at the last top of the minute
    pub fn alarm_enabled(&self) -> bool {
        self.alarm_enabled
    }

    pub(crate) fn set_alarm_enabled(&mut self, enabled: bool) {
        self.alarm_enabled = enabled;
    }

    // Sensors

    pub fn has_accelerometer(&self) -> bool {
        self.has_accelerometer
    }

    pub fn has_thermistor(&self) -> bool {
        self.has_thermistor
    }

    /// Temperature in °C
    pub fn temperature(&mut self) -> Option<f32> {
        self.platform.temperature()
    }

    fn accelerometer(&mut self) -> Option<&mut P::Accelerometer> {
        if self.has_accelerometer {
            self.platform.accelerometer()
        } else {
            None
        }
    }

    /// Turn on tap detection, raising the data rate it needs. Returns `false` without an
    /// accelerometer.
    pub fn enable_tap_detection(&mut self) -> bool {
        if self.tap_detection.is_some() {
            return true;
        }

        match self.accelerometer() {
            Some(a) => {
                let saved = accelerometer::enable_tap_detection(a);
                self.tap_detection = Some(saved);
                true
            }
            None => false,
        }
    }

    /// Turn off tap detection, restoring the data rate and mode from before it was enabled
    pub fn disable_tap_detection(&mut self) -> bool {
        let Some(saved) = self.tap_detection else {
            return self.has_accelerometer;
        };

        match self.accelerometer() {
            Some(a) => {
                accelerometer::disable_tap_detection(a, saved);
                self.tap_detection = None;
                true
            }
            None => false,
        }
    }

    pub fn accelerometer_background_rate(&self) -> DataRate {
        self.background_rate
    }

    /// Set the data rate used while tap detection is off
    pub fn set_accelerometer_background_rate(&mut self, rate: DataRate) -> bool {
        if !self.has_accelerometer {
            return false;
        }

        self.background_rate = rate;
        match self.tap_detection.as_mut() {
            Some(saved) => saved.data_rate = rate,
            None => {
                if let Some(a) = self.accelerometer() {
                    a.set_data_rate(rate);
                }
            }
        }
        true
    }

    pub fn accelerometer_motion_threshold(&self) -> u8 {
        self.motion_threshold
    }

    pub fn set_accelerometer_motion_threshold(&mut self, threshold: u8) -> bool {
        match self.accelerometer() {
            Some(a) => {
                a.set_wakeup_threshold(threshold);
                self.motion_threshold = threshold;
                true
            }
            None => false,
        }
    }

    /// Events from a pending accelerometer interrupt
    pub(crate) fn accelerometer_events(&mut self) -> EventSet {
        if !self.shared.take_accelerometer_pending() {
            return EventSet::EMPTY;
        }

        match self.accelerometer() {
            Some(a) => a.interrupt_source().events(),
            None => EventSet::EMPTY,
        }
    }

    // Filesystem

    pub fn filesystem(&mut self) -> &mut Filesystem<P::Flash> {
        &mut self.fs
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.fs.exists(name)
    }

    pub fn file_size(&self, name: &str) -> Result<u32, FsError> {
        self.fs.file_size(name)
    }

    pub fn read_file(&mut self, name: &str, buf: &mut [u8]) -> Result<usize, FsError> {
        self.fs.read_file(name, buf)
    }

    /// Read the line starting at `offset` into `buf`, advancing `offset` past it
    pub fn read_line(
        &mut self,
        name: &str,
        offset: &mut u32,
        buf: &mut [u8],
    ) -> Result<Option<usize>, FsError> {
        self.fs.read_line(name, offset, buf)
    }

    /// Replace the contents of `name`, creating it if needed
    pub fn write_file(&mut self, name: &str, data: &[u8]) -> Result<(), FsError> {
        self.fs.write_file(name, data)
    }

    pub fn append_file(&mut self, name: &str, data: &[u8]) -> Result<(), FsError> {
        self.fs.append_file(name, data)
    }

    pub fn remove_file(&mut self, name: &str) -> Result<(), FsError> {
        self.fs.remove(name)
    }

    pub fn free_space(&self) -> Result<u32, FsError> {
        self.fs.free_space()
    }

    pub fn list_files(&self) -> impl Iterator<Item = DirEntry<'_>> {
        self.fs.list()
    }

    // Default behaviour

    /// What a face should do with events it has no use for:
    ///
    /// * Mode advances to the next face
    /// * Light lights the LED, for as long as it's held if so configured
    /// * A long press of Mode goes to the secondary face from the home face, and home from
    ///   anywhere else
    pub fn default_loop_handler(&mut self, event: Event) -> bool {
        match event.kind {
            EventKind::ModeButtonUp => self.move_to_next_face(),
            EventKind::LightButtonDown => self.illuminate_led(),
            EventKind::LightButtonUp => {
                let while_held = self.settings.led_dwell() == Dwell::WhileHeld;
                if while_held && self.led == LedState::Illuminated {
                    self.force_led_off();
                }
            }
            EventKind::ModeLongPress => match self.secondary {
                Some(secondary) if self.current == 0 => self.move_to_face(secondary),
                _ => self.move_to_face(0),
            },
            _ => {}
        }

        true
    }
}
