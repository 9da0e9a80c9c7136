//! # Movement
//!
//! The event driven application runtime for watch.
//!
//! ---
//!
//! Movement multiplexes a set of interchangeable watch faces onto a single display. Exactly one
//! face is in the foreground at a time and receives the events produced by the hardware: button
//! presses, the periodic tick, inactivity timeouts and accelerometer gestures. Every face (not
//! just the foreground one) is polled once a minute for background work.
//!
//! The runtime is split in two halves:
//!
//! - [`Shared`] is the volatile state written by interrupt handlers. It is built entirely out of
//!   atomics and critical section mutexes so it can live in a `static`.
//! - [`Runtime`] owns everything else and is driven from the main loop with
//!   [`Runtime::run_once()`]. Its return value tells the platform whether it may halt the CPU
//!   until the next interrupt.
//!
//! The hardware is reached through the [`Platform`] trait so the runtime can be exercised on the
//! host as well as on the watch itself.
//!
//! ## Sleep strata
//!
//! - Active standby: the CPU halts between events, all peripherals keep running
//! - Low energy: entered after a configurable period of inactivity. Buttons are disabled except
//!   for the external wake button and the foreground face is refreshed once a minute
//! - Backup: only the RTC and the backup registers survive, waking up resets the MCU

#![cfg_attr(not(test), no_std)]

mod logging;

pub mod accelerometer;
pub mod button;
pub mod buzzer;
pub mod clock;
pub mod compare;
pub mod config;
pub mod event;
pub mod face;
pub mod fs;
pub mod led;
pub mod movement;
pub mod platform;
pub mod runtime;
pub mod settings;
pub mod shared;
pub mod zone;

#[cfg(test)]
mod sim;

pub use accelerometer::Accelerometer;
pub use button::Button;
pub use buzzer::{Note, Priority, Volume};
pub use config::Config;
pub use event::{Event, EventKind};
pub use face::{Advisory, Face};
pub use fs::{FsError, Filesystem};
pub use movement::Movement;
pub use platform::Platform;
pub use runtime::Runtime;
pub use settings::Settings;
pub use shared::Shared;
