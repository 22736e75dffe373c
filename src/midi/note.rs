//! Decoded note event.
//!
//! A note event is one sounded note with absolute timing in seconds,
//! produced by the decoder and never mutated afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a decoded note is rejected at construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NoteError {
    #[error("pitch {0} is outside the MIDI range 0-127")]
    Pitch(u8),
    #[error("channel {0} is outside the MIDI range 0-15")]
    Channel(u8),
    #[error("start time {0} must be a finite, non-negative number of seconds")]
    Start(f64),
    #[error("duration {0} must be a finite, positive number of seconds")]
    Duration(f64),
    #[error("velocity {0} must be within 0.0-1.0")]
    Velocity(f32),
}

/// A single timed note, as handed over by the decoder.
///
/// Construction validates every field, so a `NoteEvent` in hand always has
/// a MIDI pitch, a MIDI channel, a non-negative start, a positive duration
/// and a normalized velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNoteEvent", into = "RawNoteEvent")]
pub struct NoteEvent {
    pitch: u8,
    start_seconds: f64,
    duration_seconds: f64,
    velocity: f32,
    channel: u8,
}

impl NoteEvent {
    /// Creates a validated note event.
    ///
    /// # Arguments
    ///
    /// * `pitch` - MIDI note number (0-127). 60 = Middle C (C4).
    /// * `start_seconds` - Onset from the start of the performance
    /// * `duration_seconds` - How long the note sounds
    /// * `velocity` - Normalized intensity (0.0-1.0)
    /// * `channel` - MIDI channel (0-15)
    ///
    /// # Examples
    ///
    /// ```
    /// use keyfall::midi::NoteEvent;
    ///
    /// let note = NoteEvent::new(60, 1.0, 0.5, 0.8, 0).unwrap();
    /// assert_eq!(note.end_seconds(), 1.5);
    /// assert!(NoteEvent::new(60, 1.0, 0.0, 0.8, 0).is_err());
    /// ```
    pub fn new(
        pitch: u8,
        start_seconds: f64,
        duration_seconds: f64,
        velocity: f32,
        channel: u8,
    ) -> Result<Self, NoteError> {
        if pitch > 127 {
            return Err(NoteError::Pitch(pitch));
        }
        if channel > 15 {
            return Err(NoteError::Channel(channel));
        }
        if !start_seconds.is_finite() || start_seconds < 0.0 {
            return Err(NoteError::Start(start_seconds));
        }
        if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return Err(NoteError::Duration(duration_seconds));
        }
        if !(0.0..=1.0).contains(&velocity) {
            return Err(NoteError::Velocity(velocity));
        }

        Ok(Self {
            pitch,
            start_seconds,
            duration_seconds,
            velocity,
            channel,
        })
    }

    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    pub fn start_seconds(&self) -> f64 {
        self.start_seconds
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Returns the release time of this note (start + duration).
    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.duration_seconds
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Returns true if this note sits on the percussion channel.
    pub fn is_percussion(&self) -> bool {
        self.channel == super::PERCUSSION_CHANNEL
    }
}

/// Unvalidated wire form; deserialization goes through [`NoteEvent::new`].
#[derive(Serialize, Deserialize)]
struct RawNoteEvent {
    pitch: u8,
    start: f64,
    duration: f64,
    velocity: f32,
    #[serde(default)]
    channel: u8,
}

impl TryFrom<RawNoteEvent> for NoteEvent {
    type Error = NoteError;

    fn try_from(raw: RawNoteEvent) -> Result<Self, Self::Error> {
        NoteEvent::new(raw.pitch, raw.start, raw.duration, raw.velocity, raw.channel)
    }
}

impl From<NoteEvent> for RawNoteEvent {
    fn from(note: NoteEvent) -> Self {
        Self {
            pitch: note.pitch,
            start: note.start_seconds,
            duration: note.duration_seconds,
            velocity: note.velocity,
            channel: note.channel,
        }
    }
}
