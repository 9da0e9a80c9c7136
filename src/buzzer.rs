//! # Buzzer sequencer
//!
//! The piezo buzzer is a single shared resource. Anything that wants to make a sound hands the
//! sequencer a [`Sequence`] and a [`Priority`]; a request is only honoured when its priority is
//! at least that of the sequence currently playing.
//!
//! ## Sequence format
//!
//! A sequence is a list of signed bytes in `(note, duration)` pairs, terminated by a zero note.
//! Durations are counted in ticks of the 64 Hz sequence timer. A negative note is a repeat
//! marker: the following byte is a repeat count and the playhead rewinds by `|note|` pairs.
//!
//! ```text
//! [C8, 4, REST, 4, -2, 2, 0]
//! ```
//!
//! plays the beep/rest pair three times: once, then repeated twice. Note that as zero terminates
//! the sequence, [`Note::A1`] cannot be played from one.
//!
//! ## Playback
//!
//! [`Sequencer::step()`] is called from the sequence timer interrupt and returns what the buzzer
//! should be doing next. The optional completion callback is handed back once the sequence runs
//! out. A sequence that is preempted or aborted never completes.

use heapless::Vec;

/// Frequency of the sequence timer (Hz)
pub const SEQUENCE_TICK_HZ: u32 = 64;

/// Capacity of a sequence built at runtime
pub const OWNED_SEQUENCE_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Note {
    A1,
    A1Sharp,
    B1,
    C2,
    C2Sharp,
    D2,
    D2Sharp,
    E2,
    F2,
    F2Sharp,
    G2,
    G2Sharp,
    A2,
    A2Sharp,
    B2,
    C3,
    C3Sharp,
    D3,
    D3Sharp,
    E3,
    F3,
    F3Sharp,
    G3,
    G3Sharp,
    A3,
    A3Sharp,
    B3,
    C4,
    C4Sharp,
    D4,
    D4Sharp,
    E4,
    F4,
    F4Sharp,
    G4,
    G4Sharp,
    A4,
    A4Sharp,
    B4,
    C5,
    C5Sharp,
    D5,
    D5Sharp,
    E5,
    F5,
    F5Sharp,
    G5,
    G5Sharp,
    A5,
    A5Sharp,
    B5,
    C6,
    C6Sharp,
    D6,
    D6Sharp,
    E6,
    F6,
    F6Sharp,
    G6,
    G6Sharp,
    A6,
    A6Sharp,
    B6,
    C7,
    C7Sharp,
    D7,
    D7Sharp,
    E7,
    F7,
    F7Sharp,
    G7,
    G7Sharp,
    A7,
    A7Sharp,
    B7,
    C8,
    C8Sharp,
    D8,
    D8Sharp,
    E8,
    F8,
    F8Sharp,
    G8,
    G8Sharp,
    A8,
    A8Sharp,
    B8,
    Rest,
}

#[rustfmt::skip]
const FREQUENCIES: [u16; 87] = [
    55, 58, 62, 65, 69, 73, 78, 82,
    87, 92, 98, 104, 110, 117, 123, 131,
    139, 147, 156, 165, 175, 185, 196, 208,
    220, 233, 247, 262, 277, 294, 311, 330,
    349, 370, 392, 415, 440, 466, 494, 523,
    554, 587, 622, 659, 698, 740, 784, 831,
    880, 932, 988, 1047, 1109, 1175, 1245, 1319,
    1397, 1480, 1568, 1661, 1760, 1865, 1976, 2093,
    2217, 2349, 2489, 2637, 2794, 2960, 3136, 3322,
    3520, 3729, 3951, 4186, 4435, 4699, 4978, 5274,
    5588, 5920, 6272, 6645, 7040, 7459, 7902,
];

impl Note {
    #[rustfmt::skip]
    const ALL: [Note; 88] = [
        Note::A1, Note::A1Sharp, Note::B1, Note::C2, Note::C2Sharp,
        Note::D2, Note::D2Sharp, Note::E2, Note::F2, Note::F2Sharp,
        Note::G2, Note::G2Sharp, Note::A2, Note::A2Sharp, Note::B2,
        Note::C3, Note::C3Sharp, Note::D3, Note::D3Sharp, Note::E3,
        Note::F3, Note::F3Sharp, Note::G3, Note::G3Sharp, Note::A3,
        Note::A3Sharp, Note::B3, Note::C4, Note::C4Sharp, Note::D4,
        Note::D4Sharp, Note::E4, Note::F4, Note::F4Sharp, Note::G4,
        Note::G4Sharp, Note::A4, Note::A4Sharp, Note::B4, Note::C5,
        Note::C5Sharp, Note::D5, Note::D5Sharp, Note::E5, Note::F5,
        Note::F5Sharp, Note::G5, Note::G5Sharp, Note::A5, Note::A5Sharp,
        Note::B5, Note::C6, Note::C6Sharp, Note::D6, Note::D6Sharp,
        Note::E6, Note::F6, Note::F6Sharp, Note::G6, Note::G6Sharp,
        Note::A6, Note::A6Sharp, Note::B6, Note::C7, Note::C7Sharp,
        Note::D7, Note::D7Sharp, Note::E7, Note::F7, Note::F7Sharp,
        Note::G7, Note::G7Sharp, Note::A7, Note::A7Sharp, Note::B7,
        Note::C8, Note::C8Sharp, Note::D8, Note::D8Sharp, Note::E8,
        Note::F8, Note::F8Sharp, Note::G8, Note::G8Sharp, Note::A8,
        Note::A8Sharp, Note::B8,
        Note::Rest,
    ];

    /// Decode a note byte from a sequence. Anything out of range is treated as a rest.
    pub fn from_byte(byte: i8) -> Self {
        u8::try_from(byte)
            .ok()
            .and_then(|i| Self::ALL.get(i as usize).copied())
            .unwrap_or(Note::Rest)
    }

    /// The byte used for this note in a sequence
    pub const fn byte(self) -> i8 {
        self as i8
    }

    /// Equal tempered frequency of the note, rounded to the nearest Hz. `None` for a rest.
    pub fn frequency(self) -> Option<u16> {
        FREQUENCIES.get(self as usize).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Volume {
    #[default]
    Soft,
    Loud,
}

impl Volume {
    /// PWM duty cycle (%) driving the piezo
    pub const fn duty(self) -> u8 {
        match self {
            Volume::Soft => 5,
            Volume::Loud => 25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    Button,
    Signal,
    Alarm,
}

/// Callback invoked once a sequence has played to the end
pub type OnDone = fn();

const R: i8 = Note::Rest.byte();

/// Default hourly chime
pub static SIGNAL_TUNE: [i8; 7] = [Note::C8.byte(), 5, R, 6, Note::C8.byte(), 5, 0];

/// Default alarm, five rounds of four beeps
#[rustfmt::skip]
pub static ALARM_TUNE: [i8; 19] = [
    Note::C8.byte(), 4, R, 4,
    Note::C8.byte(), 4, R, 4,
    Note::C8.byte(), 4, R, 4,
    Note::C8.byte(), 4, R, 36,
    -8, 4, 0,
];

/// A sequence of notes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sequence {
    Static(&'static [i8]),
    Owned(Vec<i8, OWNED_SEQUENCE_LEN>),
}

impl Sequence {
    /// A single note lasting roughly `duration_ms`
    pub fn note(note: Note, duration_ms: u16) -> Self {
        let ticks = (duration_ms as u32 * SEQUENCE_TICK_HZ).div_ceil(1000).clamp(1, 127);

        let mut bytes = Vec::new();
        // Two bytes always fit
        let _ = bytes.extend_from_slice(&[note.byte(), ticks as i8]);
        Sequence::Owned(bytes)
    }

    /// `rounds` seconds of alarm beeps on `note`. Rounds are clamped to 1..=20.
    pub fn alarm_beeps(rounds: u8, note: Note) -> Self {
        let rounds = rounds.clamp(1, 20);
        let n = note.byte();

        let mut bytes: Vec<i8, OWNED_SEQUENCE_LEN> = Vec::new();
        let _ = bytes.extend_from_slice(&[n, 4, R, 4, n, 4, R, 4, n, 4, R, 4, n, 4, R, 36]);
        if rounds > 1 {
            let _ = bytes.extend_from_slice(&[-8, rounds as i8 - 1]);
        }
        Sequence::Owned(bytes)
    }

    pub fn bytes(&self) -> &[i8] {
        match self {
            Sequence::Static(bytes) => bytes,
            Sequence::Owned(bytes) => bytes,
        }
    }

    /// The notes this sequence plays, with repeats expanded
    pub fn notes(&self) -> Notes<'_> {
        Notes {
            bytes: self.bytes(),
            cursor: Cursor::new(),
        }
    }

    /// Total length of the sequence in sequence timer ticks
    pub fn duration(&self) -> u32 {
        self.notes().map(|(_, ticks)| ticks as u32).sum()
    }
}

/// Playhead into a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    index: usize,
    /// Repeats left for the innermost marker, `None` until the marker is first reached
    repeats: Option<u8>,
}

impl Cursor {
    pub const fn new() -> Self {
        Self {
            index: 0,
            repeats: None,
        }
    }

    /// Advance to the next note, returning it with its duration
    pub fn next(&mut self, bytes: &[i8]) -> Option<(Note, u8)> {
        loop {
            let (&note, &duration) = (bytes.get(self.index)?, bytes.get(self.index + 1)?);

            if note < 0 && duration != 0 {
                let remaining = match self.repeats {
                    None => duration as u8,
                    Some(n) => n.saturating_sub(1),
                };

                if remaining > 0 {
                    self.repeats = Some(remaining);
                    self.index = self
                        .index
                        .saturating_sub(note.unsigned_abs() as usize * 2);
                } else {
                    self.repeats = None;
                    self.index += 2;
                }
                continue;
            }

            if note == 0 || duration <= 0 {
                return None;
            }

            self.index += 2;
            return Some((Note::from_byte(note), duration as u8));
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the notes of a sequence
pub struct Notes<'a> {
    bytes: &'a [i8],
    cursor: Cursor,
}

impl Iterator for Notes<'_> {
    type Item = (Note, u8);

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next(self.bytes)
    }
}

/// What the buzzer should do after a sequencer step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing is playing
    Idle,
    /// Keep doing whatever it is doing
    Hold,
    Tone(Note, Volume),
    Silence,
    /// The sequence ran out. The buzzer and sequence timer should be stopped.
    Finished(Option<OnDone>),
}

/// The piezo and the timer that paces the sequencer
pub trait Buzzer {
    /// Sound `tone`, or silence the piezo for `None`
    fn tone(&mut self, tone: Option<(Note, Volume)>);

    fn start_sequence_timer(&mut self);

    fn stop_sequence_timer(&mut self);

    /// Drive the hardware from a sequencer step
    fn apply(&mut self, step: Step) {
        match step {
            Step::Hold => {}
            Step::Tone(note, volume) => self.tone(Some((note, volume))),
            Step::Silence => self.tone(None),
            Step::Idle => {
                self.tone(None);
                self.stop_sequence_timer();
            }
            Step::Finished(on_done) => {
                self.tone(None);
                self.stop_sequence_timer();
                if let Some(on_done) = on_done {
                    on_done();
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Playback {
    sequence: Sequence,
    cursor: Cursor,
    priority: Priority,
    volume: Volume,
    remaining: u8,
    on_done: Option<OnDone>,
}

/// Sequence playback state machine
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    playing: Option<Playback>,
}

impl Sequencer {
    pub const fn new() -> Self {
        Self { playing: None }
    }

    /// Priority of the sequence currently playing
    pub fn priority(&self) -> Option<Priority> {
        self.playing.as_ref().map(|p| p.priority)
    }

    pub fn is_busy(&self) -> bool {
        self.playing.is_some()
    }

    /// Start playing `sequence`, preempting anything of equal or lower priority.
    ///
    /// Returns the first step on success or `None` if the request was dropped.
    pub fn start(
        &mut self,
        sequence: Sequence,
        priority: Priority,
        volume: Volume,
        on_done: Option<OnDone>,
    ) -> Option<Step> {
        if self.priority().is_some_and(|current| priority < current) {
            return None;
        }

        self.playing = Some(Playback {
            sequence,
            cursor: Cursor::new(),
            priority,
            volume,
            remaining: 0,
            on_done,
        });

        Some(self.step())
    }

    /// Advance playback by one sequence timer tick
    pub fn step(&mut self) -> Step {
        let Some(playback) = self.playing.as_mut() else {
            return Step::Idle;
        };

        if playback.remaining > 0 {
            playback.remaining -= 1;
            return Step::Hold;
        }

        match playback.cursor.next(playback.sequence.bytes()) {
            Some((note, ticks)) => {
                playback.remaining = ticks - 1;
                match note {
                    Note::Rest => Step::Silence,
                    note => Step::Tone(note, playback.volume),
                }
            }
            None => {
                let on_done = playback.on_done;
                self.playing = None;
                Step::Finished(on_done)
            }
        }
    }

    /// Stop playback without running the completion callback. Returns whether anything was
    /// playing.
    pub fn abort(&mut self) -> bool {
        self.playing.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    fn seq(bytes: &'static [i8]) -> Sequence {
        Sequence::Static(bytes)
    }

    #[test]
    fn note_bytes() {
        assert_eq!(Note::A1.byte(), 0);
        assert_eq!(Note::A4.frequency(), Some(440));
        assert_eq!(Note::C8.frequency(), Some(4186));
        assert_eq!(Note::Rest.frequency(), None);
        assert_eq!(Note::from_byte(Note::Rest.byte()), Note::Rest);
        assert_eq!(Note::from_byte(120), Note::Rest);
        assert_eq!(Note::from_byte(Note::G7.byte()), Note::G7);
    }

    #[test]
    fn terminates_on_zero_note() {
        static BYTES: [i8; 5] = [Note::C7.byte(), 3, 0, 9, 9];
        let notes: std::vec::Vec<_> = seq(&BYTES).notes().collect();
        assert_eq!(notes, [(Note::C7, 3)]);
    }

    #[test]
    fn repeat_marker_plays_body_again() {
        static BYTES: [i8; 7] = [Note::C8.byte(), 4, R, 4, -2, 2, 0];
        let notes: std::vec::Vec<_> = seq(&BYTES).notes().collect();
        assert_eq!(notes.len(), 6);
        assert!(notes
            .chunks(2)
            .all(|pair| pair == [(Note::C8, 4), (Note::Rest, 4)]));
    }

    #[test]
    fn repeat_marker_continues_after_loop() {
        static BYTES: [i8; 9] = [Note::C6.byte(), 1, -1, 1, Note::D6.byte(), 2, 0, 0, 0];
        let notes: std::vec::Vec<_> = seq(&BYTES).notes().collect();
        assert_eq!(notes, [(Note::C6, 1), (Note::C6, 1), (Note::D6, 2)]);
    }

    #[test]
    fn tunes() {
        assert_eq!(seq(&SIGNAL_TUNE).duration(), 16);
        assert_eq!(seq(&ALARM_TUNE).duration(), 5 * SEQUENCE_TICK_HZ);
        assert_eq!(Sequence::alarm_beeps(3, Note::E7).duration(), 3 * SEQUENCE_TICK_HZ);
        assert_eq!(Sequence::alarm_beeps(0, Note::E7).duration(), SEQUENCE_TICK_HZ);
        assert_eq!(Sequence::alarm_beeps(200, Note::E7).duration(), 20 * SEQUENCE_TICK_HZ);
        assert_eq!(Sequence::note(Note::C7, 50).notes().collect::<std::vec::Vec<_>>(), [(Note::C7, 4)]);
    }

    #[test]
    fn playback_holds_for_duration() {
        static BYTES: [i8; 5] = [Note::C7.byte(), 3, R, 2, 0];
        let mut sequencer = Sequencer::new();

        let first = sequencer.start(seq(&BYTES), Priority::Signal, Volume::Loud, None);
        assert_eq!(first, Some(Step::Tone(Note::C7, Volume::Loud)));
        assert_eq!(sequencer.step(), Step::Hold);
        assert_eq!(sequencer.step(), Step::Hold);
        assert_eq!(sequencer.step(), Step::Silence);
        assert_eq!(sequencer.step(), Step::Hold);
        assert_eq!(sequencer.step(), Step::Finished(None));
        assert_eq!(sequencer.step(), Step::Idle);
        assert_eq!(sequencer.priority(), None);
    }

    #[test]
    fn lower_priority_is_dropped() {
        let mut sequencer = Sequencer::new();
        sequencer
            .start(seq(&SIGNAL_TUNE), Priority::Signal, Volume::Soft, None)
            .unwrap();

        assert_eq!(
            sequencer.start(Sequence::note(Note::C7, 50), Priority::Button, Volume::Soft, None),
            None
        );
        assert_eq!(sequencer.priority(), Some(Priority::Signal));

        assert!(sequencer
            .start(seq(&ALARM_TUNE), Priority::Alarm, Volume::Loud, None)
            .is_some());
        assert_eq!(sequencer.priority(), Some(Priority::Alarm));
    }

    #[test]
    fn completion_callback_only_on_finish() {
        static DONE: AtomicUsize = AtomicUsize::new(0);
        fn done() {
            DONE.fetch_add(1, Ordering::SeqCst);
        }

        let mut sequencer = Sequencer::new();
        sequencer.start(seq(&SIGNAL_TUNE), Priority::Signal, Volume::Soft, Some(done));
        // Preempted by an equal priority request
        sequencer.start(seq(&SIGNAL_TUNE), Priority::Signal, Volume::Soft, None);
        // Aborted
        assert!(sequencer.abort());
        assert!(!sequencer.abort());

        sequencer.start(Sequence::note(Note::C7, 10), Priority::Button, Volume::Soft, Some(done));
        let finished = loop {
            if let Step::Finished(on_done) = sequencer.step() {
                break on_done;
            }
        };
        finished.unwrap()();
        assert_eq!(DONE.load(Ordering::SeqCst), 1);
    }
}
