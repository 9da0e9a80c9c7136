//! # Event loop
//!
//! [`Runtime::run_once()`] is one pass of the main loop:
//!
//! 1. Take the pending events
//! 2. Turn the LED off if its dwell time is up and Light isn't held
//! 3. Add the events of a pending accelerometer interrupt
//! 4. Treat any button event as activity: stop the buzzer and restart the inactivity countdowns.
//!    A press while the LED is lit restarts its dwell time.
//! 5. On the second boundary, run background tasks that are due
//! 6. Hold the inactivity timeout back, it goes last
//! 7. Dispatch the events, lowest first, to the default handler if they are passed through and
//!    to the foreground face otherwise
//! 8. Poll every face's advisory at the top of the minute
//! 9. Deliver the inactivity timeout unless the home face is in the foreground
//! 10. Switch faces if one was requested
//! 11. Write the compare register if the slot table changed
//!
//! The pass then enters low energy or backup mode if either was requested, and finally reports
//! whether the CPU may halt until the next interrupt.

use crate::button::Button;
use crate::config::{Config, MAX_FACES};
use crate::event::EventKind;
use crate::face::Face;
use crate::led::LedState;
use crate::logging::info;
use crate::movement::Movement;
use crate::platform::Platform;
use crate::shared::Shared;

pub struct Runtime<'a, P: Platform, const N: usize> {
    movement: Movement<P>,
    faces: [&'a mut dyn Face<P>; N],
}

impl<'a, P: Platform, const N: usize> Runtime<'a, P, N> {
    /// Cold boot
    pub fn new(
        platform: P,
        flash: P::Flash,
        shared: &'static Shared,
        config: Config,
        faces: [&'a mut dyn Face<P>; N],
    ) -> Self {
        info!("booting");
        Self::start(platform, flash, shared, config, faces, false)
    }

    /// Wake from backup mode. The settings are restored from their backup register.
    pub fn resume(
        platform: P,
        flash: P::Flash,
        shared: &'static Shared,
        config: Config,
        faces: [&'a mut dyn Face<P>; N],
    ) -> Self {
        info!("waking from backup mode");
        Self::start(platform, flash, shared, config, faces, true)
    }

    fn start(
        platform: P,
        flash: P::Flash,
        shared: &'static Shared,
        config: Config,
        faces: [&'a mut dyn Face<P>; N],
        resume: bool,
    ) -> Self {
        const { assert!(N > 0 && N <= MAX_FACES, "unsupported number of faces") };

        let movement = Movement::new(platform, flash, shared, &config, N as u8, resume);
        let mut runtime = Self { movement, faces };

        runtime.setup_faces();
        runtime.activate_current();
        runtime.movement.apply_compare();

        runtime
    }

    pub fn movement(&self) -> &Movement<P> {
        &self.movement
    }

    pub fn movement_mut(&mut self) -> &mut Movement<P> {
        &mut self.movement
    }

    /// Run one pass of the event loop. Returns whether the CPU may halt until the next
    /// interrupt.
    pub fn run_once(&mut self) -> bool {
        let shared = self.movement.shared();
        self.movement.observe_clock();

        let mut events = shared.take_events();
        self.movement.service_led();
        events |= self.movement.accelerometer_events();

        if events.has_button_events() {
            let pressed = Button::ALL.iter().any(|button| events.contains(button.down()));
            if pressed && self.movement.led_state() == LedState::Illuminated {
                self.movement.illuminate_led();
            }
            self.movement.button_activity();
        }

        let mut can_sleep = true;

        if events.contains(EventKind::Tick)
            && shared.subsecond() == 0
            && self.movement.has_scheduled_tasks()
        {
            can_sleep &= self.run_scheduled_tasks();
        }

        let timeout = events.remove(EventKind::Timeout);

        // Dispatch
        let passthrough = shared.passthrough();
        let current = self.movement.current_face() as usize;
        for kind in events {
            let event = self.movement.event(kind);
            if passthrough & kind.bit() != 0 {
                self.movement.default_loop_handler(event);
            } else {
                can_sleep &= self.faces[current].handle(event, &mut self.movement);
            }
        }

        if shared.take_minute_alarm() {
            can_sleep &= self.top_of_minute();
        }

        if timeout && current != 0 {
            let event = self.movement.event(EventKind::Timeout);
            can_sleep &= self.faces[current].handle(event, &mut self.movement);
        }

        self.transition();
        self.movement.apply_compare();

        if shared.take_sleep_requested() {
            if self.movement.usb_attached() {
                self.movement.reset_inactivity();
                self.movement.apply_compare();
            } else {
                self.low_energy();
                can_sleep = false;
            }
        }

        if self.movement.take_backup_request() {
            self.movement.enter_backup();
        }

        can_sleep && self.movement.may_halt()
    }

    fn setup_faces(&mut self) {
        for (index, face) in self.faces.iter_mut().enumerate() {
            face.setup(index as u8, &mut self.movement);
        }
    }

    /// Activate the foreground face and send it the activate event
    fn activate_current(&mut self) {
        let face = &mut self.faces[self.movement.current_face() as usize];
        face.activate(&mut self.movement);

        let event = self.movement.event(EventKind::Activate);
        face.handle(event, &mut self.movement);
    }

    /// Switch faces until no face asks for another switch
    fn transition(&mut self) {
        while let Some(next) = self.movement.take_face_change() {
            let current = self.movement.current_face() as usize;
            self.faces[current].resign(&mut self.movement);

            self.movement.switch_to(next);
            self.activate_current();

            // The button that caused the switch is probably still down
            self.movement
                .shared()
                .set_passthrough(Button::ALL_PASSTHROUGH);
        }
    }

    /// Poll every face's advisory, dispatching background tasks to those that asked for one
    fn top_of_minute(&mut self) -> bool {
        self.movement.refresh_dst();

        let mut can_sleep = true;
        let mut alarm = false;

        for face in self.faces.iter_mut() {
            let Some(advisory) = face.advise(&self.movement) else {
                continue;
            };

            alarm |= advisory.has_active_alarm;
            if advisory.wants_background_task {
                let event = self.movement.event(EventKind::BackgroundTask);
                can_sleep &= face.handle(event, &mut self.movement);
            }
        }

        self.movement.set_alarm_enabled(alarm);
        can_sleep
    }

    fn run_scheduled_tasks(&mut self) -> bool {
        let now = self.movement.utc_timestamp();
        let mut can_sleep = true;

        for (index, face) in self.faces.iter_mut().enumerate() {
            if self.movement.take_due_task(index as u8, now) {
                let event = self.movement.event(EventKind::BackgroundTask);
                can_sleep &= face.handle(event, &mut self.movement);
            }
        }

        can_sleep
    }

    /// Low energy mode
    ///
    /// Only the top of the minute is serviced until a wake is requested, either by a face or by
    /// the external wake button.
    fn low_energy(&mut self) {
        let shared = self.movement.shared();

        self.movement.enter_low_energy();
        self.update_in_low_energy();

        while !shared.take_wake_requested() {
            self.movement.platform_mut().wait_for_interrupt();

            if shared.take_minute_alarm() {
                self.movement.observe_clock();
                self.top_of_minute();
                self.run_scheduled_tasks();
                self.update_in_low_energy();
            }

            self.movement.apply_compare();
        }

        self.movement.exit_low_energy();
        self.setup_faces();
        self.activate_current();
        self.movement.play_deferred();
        self.movement.apply_compare();
    }

    fn update_in_low_energy(&mut self) {
        let event = self.movement.event(EventKind::LowEnergyUpdate);
        let current = self.movement.current_face() as usize;
        self.faces[current].handle(event, &mut self.movement);
    }
}
