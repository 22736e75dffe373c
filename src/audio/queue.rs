//! Note queue behind the audio engine.
//!
//! Decides which note-ons and note-offs are due at a transport position,
//! without touching a synthesizer. Due events come out in time order, with
//! releases ahead of onsets at the same instant, so a note ending exactly
//! where the next one on the same key begins does not cut the new one off.
//!
//! A synth's note-off ends every voice on its key, so the queue counts the
//! scheduled instances sounding per pitch and only emits a note-off when the
//! last of them ends.

/// A synthesizer command produced by [`NoteQueue::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthEvent {
    NoteOn { pitch: u8, velocity: i32 },
    NoteOff { pitch: u8 },
}

/// Converts a normalized velocity to a MIDI velocity.
///
/// `scale` multiplies the velocity before clamping. Anything that reaches
/// the synth is at least 1, since velocity 0 means note-off in MIDI.
pub fn midi_velocity(velocity: f32, scale: f32) -> i32 {
    ((velocity * scale).clamp(0.0, 1.0) * 127.0).round().max(1.0) as i32
}

#[derive(Debug, Clone, Copy)]
struct PendingNote {
    at: f64,
    end: f64,
    pitch: u8,
    velocity: i32,
}

/// Scheduled notes and the voices they hold.
#[derive(Debug, Clone)]
pub struct NoteQueue {
    /// Not yet started, sorted by onset.
    pending: Vec<PendingNote>,
    /// Next pending note to start.
    cursor: usize,
    /// Started and not yet released: (end, pitch).
    sounding: Vec<(f64, u8)>,
    /// Started instances per pitch.
    voices: [u16; 128],
}

impl Default for NoteQueue {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            cursor: 0,
            sounding: Vec::new(),
            voices: [0; 128],
        }
    }
}

impl NoteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a note. Notes arriving in onset order are appended.
    pub fn schedule(&mut self, at: f64, pitch: u8, duration: f64, velocity: i32) {
        let note = PendingNote {
            at,
            end: at + duration,
            pitch: pitch.min(127),
            velocity,
        };
        // Never insert behind the cursor: that slot has already fired
        let pos = self.pending.partition_point(|p| p.at <= note.at);
        self.pending.insert(pos.max(self.cursor), note);
    }

    /// Drops every note that has not started. Sounding notes keep their
    /// scheduled release.
    pub fn cancel_pending(&mut self) {
        self.pending.clear();
        self.cursor = 0;
    }

    /// Forgets every sounding note. The caller silences the synth itself.
    pub fn release_all(&mut self) {
        self.sounding.clear();
        self.voices = [0; 128];
    }

    /// Number of notes not started yet.
    pub fn pending_count(&self) -> usize {
        self.pending.len() - self.cursor
    }

    /// Number of started notes still waiting for their release.
    pub fn sounding_count(&self) -> usize {
        self.sounding.len()
    }

    /// Appends to `events` every onset and release due at `now`, in time
    /// order.
    ///
    /// A note whose onset and end both fall before `now` still gets its
    /// note-on, immediately followed by its release.
    pub fn advance(&mut self, now: f64, events: &mut Vec<SynthEvent>) {
        loop {
            let release = self
                .sounding
                .iter()
                .enumerate()
                .filter(|(_, &(end, _))| end <= now)
                .min_by(|(_, a), (_, b)| a.0.total_cmp(&b.0))
                .map(|(i, &(end, _))| (i, end));
            let onset = self
                .pending
                .get(self.cursor)
                .filter(|note| note.at <= now)
                .copied();

            match (release, onset) {
                (Some((i, end)), Some(note)) if end <= note.at => self.release(i, events),
                (_, Some(note)) => {
                    self.cursor += 1;
                    self.voices[note.pitch as usize] += 1;
                    self.sounding.push((note.end, note.pitch));
                    events.push(SynthEvent::NoteOn {
                        pitch: note.pitch,
                        velocity: note.velocity,
                    });
                }
                (Some((i, _)), None) => self.release(i, events),
                (None, None) => break,
            }
        }
    }

    fn release(&mut self, index: usize, events: &mut Vec<SynthEvent>) {
        let (_, pitch) = self.sounding.swap_remove(index);
        let voices = &mut self.voices[pitch as usize];
        *voices = voices.saturating_sub(1);
        if *voices == 0 {
            events.push(SynthEvent::NoteOff { pitch });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SynthEvent::{NoteOff, NoteOn};

    fn advance(queue: &mut NoteQueue, now: f64) -> Vec<SynthEvent> {
        let mut events = Vec::new();
        queue.advance(now, &mut events);
        events
    }

    #[test]
    fn test_onset_and_release() {
        let mut queue = NoteQueue::new();
        queue.schedule(1.0, 60, 0.5, 100);

        assert!(advance(&mut queue, 0.9).is_empty());
        assert_eq!(advance(&mut queue, 1.0), vec![NoteOn { pitch: 60, velocity: 100 }]);
        assert!(advance(&mut queue, 1.4).is_empty());
        assert_eq!(advance(&mut queue, 1.5), vec![NoteOff { pitch: 60 }]);
        assert_eq!(queue.sounding_count(), 0);
    }

    #[test]
    fn test_repeated_note_is_released_before_restrike() {
        let mut queue = NoteQueue::new();
        queue.schedule(1.0, 60, 0.5, 90);
        queue.schedule(1.5, 60, 0.5, 90);

        advance(&mut queue, 1.2);
        // One block straddles the boundary: the old note ends, then the new
        // one starts and stays on
        assert_eq!(
            advance(&mut queue, 1.506),
            vec![NoteOff { pitch: 60 }, NoteOn { pitch: 60, velocity: 90 }]
        );
        assert_eq!(queue.sounding_count(), 1);
        assert!(advance(&mut queue, 1.9).is_empty());
        assert_eq!(advance(&mut queue, 2.0), vec![NoteOff { pitch: 60 }]);
    }

    #[test]
    fn test_short_overlapping_note_does_not_end_longer_one() {
        let mut queue = NoteQueue::new();
        queue.schedule(0.0, 60, 4.0, 80);
        queue.schedule(1.0, 60, 0.5, 80);

        advance(&mut queue, 1.2);
        // The short one ends but the long one still holds the key
        assert!(advance(&mut queue, 1.6).is_empty());
        assert_eq!(advance(&mut queue, 4.0), vec![NoteOff { pitch: 60 }]);
    }

    #[test]
    fn test_grace_note_inside_one_block_still_sounds() {
        let mut queue = NoteQueue::new();
        queue.schedule(1.000, 72, 0.002, 64);
        assert_eq!(
            advance(&mut queue, 1.006),
            vec![NoteOn { pitch: 72, velocity: 64 }, NoteOff { pitch: 72 }]
        );
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(queue.sounding_count(), 0);
    }

    #[test]
    fn test_events_come_out_in_time_order() {
        let mut queue = NoteQueue::new();
        queue.schedule(0.0, 60, 0.1, 70);
        queue.schedule(0.2, 64, 0.1, 70);
        assert_eq!(
            advance(&mut queue, 1.0),
            vec![
                NoteOn { pitch: 60, velocity: 70 },
                NoteOff { pitch: 60 },
                NoteOn { pitch: 64, velocity: 70 },
                NoteOff { pitch: 64 },
            ]
        );
    }

    #[test]
    fn test_late_schedule_is_not_inserted_behind_cursor() {
        let mut queue = NoteQueue::new();
        queue.schedule(1.0, 60, 1.0, 100);
        queue.schedule(2.0, 62, 1.0, 100);
        advance(&mut queue, 1.5);

        // Earlier than the fired note, but must still fire next
        queue.schedule(0.5, 64, 5.0, 100);
        assert_eq!(queue.pending_count(), 2);
        assert_eq!(advance(&mut queue, 1.6), vec![NoteOn { pitch: 64, velocity: 100 }]);
    }

    #[test]
    fn test_cancel_pending_resets_cursor() {
        let mut queue = NoteQueue::new();
        queue.schedule(0.0, 60, 1.0, 100);
        queue.schedule(2.0, 62, 1.0, 100);
        advance(&mut queue, 0.5);

        queue.cancel_pending();
        assert_eq!(queue.pending_count(), 0);
        // The sounding note still gets its release
        assert_eq!(advance(&mut queue, 3.0), vec![NoteOff { pitch: 60 }]);

        // A fresh play starts from the top again
        queue.schedule(0.0, 67, 1.0, 100);
        assert_eq!(advance(&mut queue, 0.0), vec![NoteOn { pitch: 67, velocity: 100 }]);
    }

    #[test]
    fn test_release_all_forgets_voices() {
        let mut queue = NoteQueue::new();
        queue.schedule(0.0, 60, 1.0, 100);
        advance(&mut queue, 0.5);
        queue.release_all();
        assert!(advance(&mut queue, 2.0).is_empty());
    }

    #[test]
    fn test_midi_velocity() {
        assert_eq!(midi_velocity(1.0, 1.0), 127);
        assert_eq!(midi_velocity(0.5, 1.0), 64);
        assert_eq!(midi_velocity(0.0, 1.0), 1);
        assert_eq!(midi_velocity(0.5, 2.0), 127);
        assert_eq!(midi_velocity(0.8, 0.5), 51);
    }
}
