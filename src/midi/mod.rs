//! Performance data: decoded note events and the files they come from.
//!
//! A performance is a flat list of timed note events in seconds. It is
//! produced once by a decoder (Standard MIDI File import or a JSON dump)
//! and never patched afterwards; loading a new file replaces it wholesale.

mod midi_import;
mod note;
mod performance;

pub use midi_import::{import_from_midi, import_from_smf_bytes, ImportError};
pub use note::{NoteError, NoteEvent};
pub use performance::Performance;

/// Standard MIDI note names for display purposes.
/// Maps MIDI note number (0-127) to note name within an octave.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Lowest key of an 88-key piano (A0).
pub const LOWEST_KEY: u8 = 21;

/// Highest key of an 88-key piano (C8).
pub const HIGHEST_KEY: u8 = 108;

/// Number of keys on the keyboard.
pub const KEY_COUNT: usize = (HIGHEST_KEY - LOWEST_KEY + 1) as usize;

/// Channel index reserved for percussion in General MIDI (MIDI channel 10).
/// Events on this channel are unpitched and never reach the roll or the synth.
pub const PERCUSSION_CHANNEL: u8 = 9;

/// Returns true if `pitch` is one of the 88 piano keys.
#[inline]
pub fn is_piano_key(pitch: u8) -> bool {
    (LOWEST_KEY..=HIGHEST_KEY).contains(&pitch)
}

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// # Examples
///
/// ```
/// use keyfall::midi::note_to_name;
///
/// assert_eq!(note_to_name(60), "C4");
/// assert_eq!(note_to_name(21), "A0");
/// ```
pub fn note_to_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1; // MIDI octave convention
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}
