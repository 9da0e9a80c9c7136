//! # Faces
//!
//! A face is a UI module that takes over the display while it's in the foreground. Faces keep
//! their own state and reach the hardware through the [`Movement`] handle they're given.
//!
//! Over its lifetime a face sees:
//!
//! 1. `setup` once per boot and again after waking from low energy or backup mode
//! 2. `activate` when it enters the foreground, followed by an [`EventKind::Activate`] event
//! 3. `handle` for every event while in the foreground, and for background tasks at any time
//! 4. `resign` before the next face is activated
//!
//! `advise` is polled once a minute for every face, foreground or not.
//!
//! [`EventKind::Activate`]: crate::EventKind::Activate

use crate::event::Event;
use crate::movement::Movement;
use crate::platform::Platform;

/// A face's answer to the once a minute poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Advisory {
    /// Dispatch a background task event to the face this minute
    pub wants_background_task: bool,
    pub has_active_alarm: bool,
}

pub trait Face<P: Platform> {
    fn setup(&mut self, _index: u8, _movement: &mut Movement<P>) {}

    fn activate(&mut self, movement: &mut Movement<P>);

    /// Handle an event. Returns whether the watch may halt until the next interrupt.
    ///
    /// Events a face has no use for should be passed on to
    /// [`Movement::default_loop_handler()`].
    fn handle(&mut self, event: Event, movement: &mut Movement<P>) -> bool;

    /// Called before the next face activates. The tick frequency is reset to 1 Hz afterwards.
    fn resign(&mut self, movement: &mut Movement<P>);

    /// `None` for faces with nothing to advise
    fn advise(&mut self, _movement: &Movement<P>) -> Option<Advisory> {
        None
    }
}
