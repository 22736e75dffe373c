//! The static 88-key keyboard layout.
//!
//! Every key gets a continuous horizontal position measured in white-key
//! widths from A0: white keys land on integers, black keys halfway between
//! their neighbours. The table does not depend on any performance and is
//! built once per process.

use crate::midi::{HIGHEST_KEY, KEY_COUNT, LOWEST_KEY};
use std::sync::OnceLock;

/// Number of white keys on an 88-key piano.
pub const WHITE_KEY_COUNT: usize = 52;

/// Key color, derived from the key's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyColor {
    White,
    Black,
}

/// Static descriptor of one piano key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Key {
    /// MIDI note number (21-108).
    pub id: u8,
    /// Horizontal position in white-key widths from the left edge.
    pub position: f64,
    pub color: KeyColor,
}

impl Key {
    fn new(id: u8) -> Self {
        let pitch_class = (id - 12) % 12;
        let octave = (id - 12) / 12;

        let mut position = octave as f64 * 7.0 - 5.0 + 0.5 * pitch_class as f64;
        // E to F is a whole white key with no black key in between
        if pitch_class > 4 {
            position += 0.5;
        }

        let color = if position.fract() == 0.0 {
            KeyColor::White
        } else {
            KeyColor::Black
        };

        Self {
            id,
            position,
            color,
        }
    }

    pub fn is_white(&self) -> bool {
        self.color == KeyColor::White
    }
}

/// Returns the full keyboard, lowest key first.
pub fn keyboard() -> &'static [Key; KEY_COUNT] {
    static KEYBOARD: OnceLock<[Key; KEY_COUNT]> = OnceLock::new();
    KEYBOARD.get_or_init(|| std::array::from_fn(|i| Key::new(LOWEST_KEY + i as u8)))
}

/// Looks up one key by MIDI note number.
pub fn key(id: u8) -> Option<&'static Key> {
    if (LOWEST_KEY..=HIGHEST_KEY).contains(&id) {
        Some(&keyboard()[(id - LOWEST_KEY) as usize])
    } else {
        None
    }
}
