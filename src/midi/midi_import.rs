//! Standard MIDI File (SMF) decoding into a [`Performance`].
//!
//! Imports .mid and .midi files, converting tick positions into absolute
//! seconds through the file's tempo map.
//!
//! # Limitations
//!
//! - Only note on/off pairs become notes; controllers, program changes,
//!   pitch bend and SysEx are ignored
//! - Format 2 (sequential) files are rejected
//! - A note that is never released is closed at the end of its track;
//!   notes that would end up with zero length are dropped

use super::{NoteEvent, Performance};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Tempo assumed until the first tempo event: 120 BPM.
const DEFAULT_MICROS_PER_BEAT: u32 = 500_000;

/// Errors that can occur during MIDI import.
#[derive(Debug, Error)]
pub enum ImportError {
    /// File could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// MIDI parsing failed
    #[error("MIDI parse error: {0}")]
    Parse(String),
    /// Unsupported MIDI format or timing
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Open notes during import.
/// Key is (channel, pitch); value is a FIFO of (start_tick, velocity) so
/// overlapping repeats of one key release in the order they started.
type ActiveNotes = HashMap<(u8, u8), Vec<(u64, u8)>>;

/// Imports a MIDI file and builds a Performance named after the file stem.
///
/// # Errors
///
/// Returns error if the file cannot be read, is not a valid SMF, or uses
/// the sequential (Format 2) layout.
pub fn import_from_midi<P: AsRef<Path>>(path: P) -> Result<Performance, ImportError> {
    let path = path.as_ref();
    let data = fs::read(path)?;

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Imported MIDI");

    import_from_smf_bytes(name, &data)
}

/// Decodes an in-memory SMF image.
pub fn import_from_smf_bytes(name: &str, data: &[u8]) -> Result<Performance, ImportError> {
    let smf = Smf::parse(data).map_err(|e| ImportError::Parse(e.to_string()))?;

    if smf.header.format == Format::Sequential {
        return Err(ImportError::UnsupportedFormat(
            "Format 2 (sequential) MIDI files not supported".to_string(),
        ));
    }

    let tempo_map = TempoMap::from_smf(&smf)?;

    let mut notes = Vec::new();
    let mut dropped = 0usize;
    let mut last_tick = 0u64;

    for track in &smf.tracks {
        let (track_notes, track_dropped, track_end) = parse_track(track, &tempo_map);
        notes.extend(track_notes);
        dropped += track_dropped;
        last_tick = last_tick.max(track_end);
    }

    if dropped > 0 {
        tracing::debug!("Dropped {} zero-length or invalid notes from {}", dropped, name);
    }

    let performance =
        Performance::new(name, notes).with_duration(tempo_map.seconds_at(last_tick));
    tracing::info!(
        "Imported {}: {} notes, {:.1}s",
        name,
        performance.notes().len(),
        performance.total_duration_seconds()
    );

    Ok(performance)
}

/// Collects the notes of one track.
///
/// Returns (notes, number of dropped notes, tick of the last event).
fn parse_track(track: &[midly::TrackEvent], tempo_map: &TempoMap) -> (Vec<NoteEvent>, usize, u64) {
    let mut active_notes: ActiveNotes = HashMap::new();
    let mut notes = Vec::new();
    let mut dropped = 0usize;
    let mut current_tick = 0u64;

    let mut close = |channel: u8, pitch: u8, start: u64, vel: u8, end: u64, dropped: &mut usize| {
        let start_seconds = tempo_map.seconds_at(start);
        let duration = tempo_map.seconds_at(end) - start_seconds;
        match NoteEvent::new(pitch, start_seconds, duration, vel as f32 / 127.0, channel) {
            Ok(note) => notes.push(note),
            Err(_) => *dropped += 1,
        }
    };

    for event in track {
        current_tick += event.delta.as_int() as u64;

        if let TrackEventKind::Midi { channel, message } = event.kind {
            let ch = channel.as_int();
            match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    active_notes
                        .entry((ch, key.as_int()))
                        .or_default()
                        .push((current_tick, vel.as_int()));
                }
                // Note on with velocity 0 = note off
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    let pitch = key.as_int();
                    if let Some(open) = active_notes.get_mut(&(ch, pitch)) {
                        if !open.is_empty() {
                            let (start, vel) = open.remove(0);
                            close(ch, pitch, start, vel, current_tick, &mut dropped);
                        }
                    }
                }
                _ => {} // Ignore other MIDI messages
            }
        }
    }

    // Close any remaining active notes (in case the file is incomplete)
    for ((ch, pitch), open) in active_notes {
        for (start, vel) in open {
            close(ch, pitch, start, vel, current_tick, &mut dropped);
        }
    }

    (notes, dropped, current_tick)
}

/// Piecewise-linear tick to seconds conversion.
#[derive(Debug)]
struct TempoMap {
    /// (tick, seconds at that tick, seconds per tick from there on),
    /// sorted by tick, first entry at tick 0.
    segments: Vec<(u64, f64, f64)>,
}

impl TempoMap {
    fn from_smf(smf: &Smf) -> Result<Self, ImportError> {
        match smf.header.timing {
            Timing::Metrical(tpb) => {
                let ticks_per_beat = tpb.as_int() as f64;
                if ticks_per_beat == 0.0 {
                    return Err(ImportError::UnsupportedFormat(
                        "zero ticks per beat".to_string(),
                    ));
                }

                // Tempo events may live in any track (usually track 0 in Format 1)
                let mut changes: Vec<(u64, u32)> = Vec::new();
                for track in &smf.tracks {
                    let mut tick = 0u64;
                    for event in track {
                        tick += event.delta.as_int() as u64;
                        if let TrackEventKind::Meta(MetaMessage::Tempo(micros)) = event.kind {
                            if micros.as_int() > 0 {
                                changes.push((tick, micros.as_int()));
                            }
                        }
                    }
                }
                changes.sort_by_key(|(tick, _)| *tick);

                Ok(Self::metrical(ticks_per_beat, &changes))
            }
            Timing::Timecode(fps, subframes) => {
                let ticks_per_second = fps.as_f32() as f64 * subframes as f64;
                if ticks_per_second <= 0.0 {
                    return Err(ImportError::UnsupportedFormat(
                        "zero SMPTE subframe resolution".to_string(),
                    ));
                }
                Ok(Self {
                    segments: vec![(0, 0.0, 1.0 / ticks_per_second)],
                })
            }
        }
    }

    fn metrical(ticks_per_beat: f64, changes: &[(u64, u32)]) -> Self {
        let per_tick = |micros: u32| micros as f64 / 1_000_000.0 / ticks_per_beat;
        let mut map = Self {
            segments: vec![(0, 0.0, per_tick(DEFAULT_MICROS_PER_BEAT))],
        };

        for &(tick, micros) in changes {
            let seconds = map.seconds_at(tick);
            match map.segments.last_mut() {
                // A later change at the same tick wins
                Some(last) if last.0 == tick => last.2 = per_tick(micros),
                _ => map.segments.push((tick, seconds, per_tick(micros))),
            }
        }

        map
    }

    fn seconds_at(&self, tick: u64) -> f64 {
        let idx = self.segments.partition_point(|(start, _, _)| *start <= tick);
        let (start, seconds, per_tick) = self.segments[idx.saturating_sub(1)];
        seconds + (tick - start) as f64 * per_tick
    }
}
