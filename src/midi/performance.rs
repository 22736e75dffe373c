//! Performance container.
//!
//! A performance is the complete decoded piece: every note event, ordered
//! by onset, and the total running time.

use super::note::NoteEvent;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// An ordered collection of note events plus the total duration.
///
/// Owned by the session that loaded it and replaced wholesale when another
/// file is loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    /// Display name, usually the source file stem.
    pub name: String,

    /// Notes sorted by start time.
    notes: Vec<NoteEvent>,

    /// Running time in seconds. At least the latest note end.
    total_duration_seconds: f64,
}

impl Performance {
    /// Creates a performance from decoded notes.
    ///
    /// Notes are sorted by onset (stable, so simultaneous notes keep the
    /// decoder's order) and the duration is the latest note end.
    pub fn new(name: impl Into<String>, mut notes: Vec<NoteEvent>) -> Self {
        notes.sort_by(|a, b| a.start_seconds().total_cmp(&b.start_seconds()));
        let total_duration_seconds = notes
            .iter()
            .map(NoteEvent::end_seconds)
            .fold(0.0, f64::max);

        Self {
            name: name.into(),
            notes,
            total_duration_seconds,
        }
    }

    /// Overrides the total duration, e.g. when the file declares trailing
    /// silence. Never shortens below the latest note end.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        if seconds.is_finite() && seconds > self.total_duration_seconds {
            self.total_duration_seconds = seconds;
        }
        self
    }

    /// Returns all notes, sorted by start time.
    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    /// Returns the notes that reach the keyboard and the synth.
    pub fn pitched_notes(&self) -> impl Iterator<Item = &NoteEvent> {
        self.notes.iter().filter(|n| !n.is_percussion())
    }

    pub fn total_duration_seconds(&self) -> f64 {
        self.total_duration_seconds
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Serializes the performance to a pretty JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes a performance from JSON. Every note is validated.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let parsed: Performance = serde_json::from_str(json)?;
        let name = parsed.name.clone();
        let duration = parsed.total_duration_seconds;
        Ok(Performance::new(name, parsed.notes).with_duration(duration))
    }

    /// Saves the performance as JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = self
            .to_json()
            .context("Failed to serialize performance")?;
        fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write {}", path.as_ref().display()))
    }

    /// Loads a performance from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
        Self::from_json(&json)
            .with_context(|| format!("Invalid performance file {}", path.as_ref().display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: u8, start: f64, duration: f64, channel: u8) -> NoteEvent {
        NoteEvent::new(pitch, start, duration, 0.8, channel).unwrap()
    }

    #[test]
    fn test_notes_sorted_and_duration() {
        let perf = Performance::new(
            "test",
            vec![note(64, 2.0, 1.0, 0), note(60, 0.5, 4.0, 0), note(62, 1.0, 0.5, 0)],
        );
        let starts: Vec<f64> = perf.notes().iter().map(|n| n.start_seconds()).collect();
        assert_eq!(starts, vec![0.5, 1.0, 2.0]);
        assert_eq!(perf.total_duration_seconds(), 4.5);
    }

    #[test]
    fn test_with_duration_never_shortens() {
        let perf = Performance::new("test", vec![note(60, 0.0, 2.0, 0)]);
        assert_eq!(perf.clone().with_duration(1.0).total_duration_seconds(), 2.0);
        assert_eq!(perf.with_duration(3.0).total_duration_seconds(), 3.0);
    }

    #[test]
    fn test_pitched_notes_skip_percussion() {
        let perf = Performance::new("test", vec![note(60, 0.0, 1.0, 0), note(36, 0.0, 0.1, 9)]);
        assert_eq!(perf.notes().len(), 2);
        assert_eq!(perf.pitched_notes().count(), 1);
    }

    #[test]
    fn test_empty_performance() {
        let perf = Performance::new("empty", Vec::new());
        assert!(perf.is_empty());
        assert_eq!(perf.total_duration_seconds(), 0.0);
    }

    #[test]
    fn test_json_roundtrip_preserves_notes() {
        let perf = Performance::new("song", vec![note(60, 0.0, 1.0, 0), note(36, 0.5, 0.1, 9)])
            .with_duration(2.0);
        let restored = Performance::from_json(&perf.to_json().unwrap()).unwrap();
        assert_eq!(restored, perf);
    }
}
