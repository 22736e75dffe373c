//! Per-key interval index.
//!
//! The index answers the two questions the roll asks every frame: is this
//! key sounding at time `t`, and which of its notes fall inside the
//! look-ahead window. It is derived once from a performance and read-only
//! afterwards.

use crate::midi::{is_piano_key, Performance, KEY_COUNT, LOWEST_KEY};

/// A closed time interval `[start, end]` in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    /// Inclusive on both ends: a note is still active exactly at its end.
    #[inline]
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Mapping from piano key to its note intervals, sorted by start time.
///
/// Every key 21-108 has an entry, possibly empty. Percussion notes and
/// pitches off the keyboard are not indexed.
#[derive(Debug, Clone)]
pub struct NoteIndex {
    keys: Vec<Vec<Interval>>,
    note_count: usize,
    dropped: usize,
}

impl Default for NoteIndex {
    fn default() -> Self {
        Self {
            keys: vec![Vec::new(); KEY_COUNT],
            note_count: 0,
            dropped: 0,
        }
    }
}

impl NoteIndex {
    /// Builds the index for a performance.
    ///
    /// Pure: the same performance always yields the same index.
    pub fn build(performance: &Performance) -> Self {
        let mut index = Self::default();

        for note in performance.pitched_notes() {
            if !is_piano_key(note.pitch()) {
                index.dropped += 1;
                continue;
            }
            index.keys[(note.pitch() - LOWEST_KEY) as usize].push(Interval {
                start: note.start_seconds(),
                end: note.end_seconds(),
            });
            index.note_count += 1;
        }

        // Performance notes are already ordered; keep the sort for hand-built input
        for intervals in &mut index.keys {
            intervals.sort_by(|a, b| a.start.total_cmp(&b.start));
        }

        if index.dropped > 0 {
            tracing::debug!(
                "Dropped {} notes outside the 88-key range from {}",
                index.dropped,
                performance.name
            );
        }

        index
    }

    /// Returns the intervals for a key, or an empty slice off the keyboard.
    pub fn intervals(&self, pitch: u8) -> &[Interval] {
        if is_piano_key(pitch) {
            &self.keys[(pitch - LOWEST_KEY) as usize]
        } else {
            &[]
        }
    }

    /// Returns true if any note of `pitch` covers `t`, boundaries included.
    pub fn active_at(&self, pitch: u8, t: f64) -> bool {
        let intervals = self.intervals(pitch);
        // Only intervals starting at or before t can contain it
        let candidates = intervals.partition_point(|i| i.start <= t);
        intervals[..candidates].iter().any(|i| i.contains(t))
    }

    /// Returns the intervals of `pitch` that have not finished by `t` and
    /// start before the look-ahead horizon `t + lookahead_seconds`.
    pub fn visible_at(
        &self,
        pitch: u8,
        t: f64,
        lookahead_seconds: f64,
    ) -> impl Iterator<Item = &Interval> {
        let horizon = t + lookahead_seconds;
        let intervals = self.intervals(pitch);
        let candidates = intervals.partition_point(|i| i.start < horizon);
        intervals[..candidates].iter().filter(move |i| i.end > t)
    }

    /// Number of indexed notes.
    pub fn note_count(&self) -> usize {
        self.note_count
    }

    /// Number of pitched notes left out because they are off the keyboard.
    pub fn dropped_count(&self) -> usize {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::NoteEvent;

    fn perf(notes: &[(u8, f64, f64, u8)]) -> Performance {
        let notes = notes
            .iter()
            .map(|&(pitch, start, duration, channel)| {
                NoteEvent::new(pitch, start, duration, 0.8, channel).unwrap()
            })
            .collect();
        Performance::new("test", notes)
    }

    #[test]
    fn test_all_keys_present() {
        let index = NoteIndex::build(&perf(&[]));
        for pitch in 21..=108 {
            assert!(index.intervals(pitch).is_empty());
            assert!(!index.active_at(pitch, 0.0));
        }
        assert!(index.intervals(0).is_empty());
    }

    #[test]
    fn test_single_note_scenario() {
        let index = NoteIndex::build(&perf(&[(60, 1.0, 0.5, 0)]));
        assert!(!index.active_at(60, 0.0));
        assert!(index.active_at(60, 1.25));
        assert!(index.active_at(60, 1.5));
        assert!(!index.active_at(60, 1.6));

        // Just outside the 4s window at t=0 the note is not visible yet
        assert_eq!(index.visible_at(60, 0.0, 1.0).count(), 0);
        assert_eq!(index.visible_at(60, 0.0, 4.0).count(), 1);
    }

    #[test]
    fn test_inclusive_boundaries() {
        let index = NoteIndex::build(&perf(&[(64, 0.0, 1.0, 0), (64, 2.0, 0.25, 0), (70, 3.5, 2.0, 0)]));
        for pitch in [64, 70] {
            for i in index.intervals(pitch) {
                assert!(index.active_at(pitch, i.start));
                assert!(index.active_at(pitch, i.end));
            }
        }
    }

    #[test]
    fn test_inactive_outside_intervals() {
        let index = NoteIndex::build(&perf(&[(64, 0.5, 1.0, 0), (64, 2.0, 0.25, 0)]));
        for t in [0.0, 0.49, 1.51, 1.99, 2.26, 10.0] {
            assert!(!index.active_at(64, t), "t = {}", t);
        }
        // Other keys are untouched
        assert!(!index.active_at(65, 1.0));
    }

    #[test]
    fn test_visible_never_returns_finished_notes() {
        let index = NoteIndex::build(&perf(&[
            (60, 0.0, 1.0, 0),
            (60, 1.0, 1.0, 0),
            (60, 3.0, 1.0, 0),
            (60, 6.0, 1.0, 0),
        ]));
        for step in 0..80 {
            let t = step as f64 * 0.1;
            for interval in index.visible_at(60, t, 4.0) {
                assert!(interval.end > t);
                assert!(interval.start < t + 4.0);
            }
        }
        // At exactly t = 2.0 the second note has ended (end == t) and is hidden
        let visible: Vec<_> = index.visible_at(60, 2.0, 4.0).map(|i| i.start).collect();
        assert_eq!(visible, vec![3.0]);
    }

    #[test]
    fn test_percussion_excluded() {
        let index = NoteIndex::build(&perf(&[(60, 0.0, 1.0, 9), (62, 0.0, 1.0, 3)]));
        assert!(index.intervals(60).is_empty());
        assert!(!index.active_at(60, 0.5));
        assert_eq!(index.intervals(62).len(), 1);
        assert_eq!(index.note_count(), 1);
    }

    #[test]
    fn test_off_keyboard_pitches_dropped() {
        let index = NoteIndex::build(&perf(&[(10, 0.0, 1.0, 0), (120, 0.0, 1.0, 0), (21, 0.0, 1.0, 0)]));
        assert_eq!(index.note_count(), 1);
        assert_eq!(index.dropped_count(), 2);
        assert!(index.active_at(21, 0.5));
    }

    #[test]
    fn test_intervals_sorted() {
        let index = NoteIndex::build(&perf(&[(60, 5.0, 1.0, 0), (60, 1.0, 1.0, 1), (60, 3.0, 1.0, 2)]));
        let starts: Vec<f64> = index.intervals(60).iter().map(|i| i.start).collect();
        assert_eq!(starts, vec![1.0, 3.0, 5.0]);
    }
}
