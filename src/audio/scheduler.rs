//! Playback scheduling against an external synthesizer.
//!
//! The scheduler turns transport transitions into commands for a
//! [`SynthSink`]: every pitched note is handed over once on play, and the
//! sink's own clock is paused and resumed with the same [`Timeline`] the
//! transport uses, so scheduled onsets stay aligned with the picture.

use crate::midi::Performance;
use crate::transport::Timeline;

/// The contract an audio backend offers to the scheduler.
///
/// Times are transport seconds. The sink fires an onset once the timeline it
/// was last given reaches `at_seconds` and releases the voice
/// `duration_seconds` later.
pub trait SynthSink {
    /// Queues a note for playback.
    fn schedule_onset(&mut self, at_seconds: f64, pitch: u8, duration_seconds: f64, velocity: f32);

    /// Drops every queued onset and release that has not fired yet.
    fn cancel_all(&mut self);

    /// Silences every sounding voice immediately.
    fn release_all_voices(&mut self);

    /// Freezes the sink's clock at the given (paused) timeline.
    fn pause_clock(&mut self, timeline: Timeline);

    /// Runs the sink's clock from the given (playing) timeline.
    fn resume_clock(&mut self, timeline: Timeline);
}

/// Drives a [`SynthSink`] from transport transitions.
///
/// Without a sink the scheduler runs in visualization-only mode: every
/// transition is accepted and nothing is sent anywhere.
pub struct PlaybackScheduler {
    sink: Option<Box<dyn SynthSink>>,
    /// Number of notes handed to the sink by the last play.
    scheduled: usize,
}

impl PlaybackScheduler {
    /// Creates a scheduler that plays through `sink`.
    pub fn new(sink: Box<dyn SynthSink>) -> Self {
        Self {
            sink: Some(sink),
            scheduled: 0,
        }
    }

    /// Creates a scheduler with no audio. Logs a single warning.
    pub fn visualization_only(reason: impl std::fmt::Display) -> Self {
        tracing::warn!("Audio not available ({}), visualization only", reason);
        Self {
            sink: None,
            scheduled: 0,
        }
    }

    /// Whether a synth is attached.
    pub fn has_audio(&self) -> bool {
        self.sink.is_some()
    }

    /// Number of notes scheduled by the last play.
    pub fn scheduled_count(&self) -> usize {
        self.scheduled
    }

    /// Schedules the whole performance and starts the sink's clock.
    ///
    /// `timeline` must be the transport's timeline right after `play()`.
    pub fn on_play(&mut self, performance: &Performance, timeline: Timeline) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };

        sink.cancel_all();
        let mut scheduled = 0;
        for note in performance.pitched_notes() {
            sink.schedule_onset(
                note.start_seconds(),
                note.pitch(),
                note.duration_seconds(),
                note.velocity(),
            );
            scheduled += 1;
        }
        sink.resume_clock(timeline);

        self.scheduled = scheduled;
        tracing::debug!("Scheduled {} notes", scheduled);
    }

    /// Silences the synth and freezes its clock. Pending onsets are kept.
    pub fn on_pause(&mut self, timeline: Timeline) {
        if let Some(sink) = self.sink.as_mut() {
            sink.release_all_voices();
            sink.pause_clock(timeline);
        }
    }

    /// Restarts the sink's clock; pending onsets continue where they were.
    pub fn on_resume(&mut self, timeline: Timeline) {
        if let Some(sink) = self.sink.as_mut() {
            sink.resume_clock(timeline);
        }
    }

    /// Drops everything pending and cuts sounding notes short.
    pub fn on_stop(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            sink.cancel_all();
            sink.release_all_voices();
        }
        self.scheduled = 0;
    }
}

/// A sink that records every call, for tests.
#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    pub enum SinkCall {
        Onset {
            at: f64,
            pitch: u8,
            duration: f64,
        },
        CancelAll,
        ReleaseAll,
        Pause(Timeline),
        Resume(Timeline),
    }

    /// Shares its call log with the test through an `Rc`.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingSink {
        pub calls: Rc<RefCell<Vec<SinkCall>>>,
    }

    impl RecordingSink {
        pub fn take(&self) -> Vec<SinkCall> {
            std::mem::take(&mut *self.calls.borrow_mut())
        }
    }

    impl SynthSink for RecordingSink {
        fn schedule_onset(&mut self, at: f64, pitch: u8, duration: f64, _velocity: f32) {
            self.calls.borrow_mut().push(SinkCall::Onset {
                at,
                pitch,
                duration,
            });
        }

        fn cancel_all(&mut self) {
            self.calls.borrow_mut().push(SinkCall::CancelAll);
        }

        fn release_all_voices(&mut self) {
            self.calls.borrow_mut().push(SinkCall::ReleaseAll);
        }

        fn pause_clock(&mut self, timeline: Timeline) {
            self.calls.borrow_mut().push(SinkCall::Pause(timeline));
        }

        fn resume_clock(&mut self, timeline: Timeline) {
            self.calls.borrow_mut().push(SinkCall::Resume(timeline));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::recording::{RecordingSink, SinkCall};
    use super::*;
    use crate::midi::NoteEvent;
    use crate::transport::{Clock, ManualClock, TransportClock};

    fn performance() -> Performance {
        Performance::new(
            "test",
            vec![
                NoteEvent::new(60, 1.0, 0.5, 0.8, 0).unwrap(),
                NoteEvent::new(36, 0.0, 0.1, 1.0, 9).unwrap(),
                NoteEvent::new(64, 2.0, 1.0, 0.5, 1).unwrap(),
            ],
        )
    }

    #[test]
    fn test_play_schedules_pitched_notes_then_starts_clock() {
        let sink = RecordingSink::default();
        let mut scheduler = PlaybackScheduler::new(Box::new(sink.clone()));
        let mut transport = TransportClock::new(ManualClock::new());
        transport.play().unwrap();

        scheduler.on_play(&performance(), transport.timeline());

        assert_eq!(
            sink.take(),
            vec![
                SinkCall::CancelAll,
                SinkCall::Onset {
                    at: 1.0,
                    pitch: 60,
                    duration: 0.5
                },
                SinkCall::Onset {
                    at: 2.0,
                    pitch: 64,
                    duration: 1.0
                },
                SinkCall::Resume(transport.timeline()),
            ]
        );
        assert_eq!(scheduler.scheduled_count(), 2);
    }

    #[test]
    fn test_pause_releases_and_freezes_with_transport() {
        let sink = RecordingSink::default();
        let mut scheduler = PlaybackScheduler::new(Box::new(sink.clone()));
        let clock = ManualClock::new();
        let mut transport = TransportClock::new(clock.clone());

        transport.play().unwrap();
        scheduler.on_play(&performance(), transport.timeline());
        sink.take();

        clock.advance_secs(1.2);
        transport.pause().unwrap();
        scheduler.on_pause(transport.timeline());
        let calls = sink.take();
        assert_eq!(calls[0], SinkCall::ReleaseAll);
        // No cancel on pause: pending onsets survive
        assert!(!calls.contains(&SinkCall::CancelAll));
        match calls[1] {
            SinkCall::Pause(timeline) => {
                assert!((timeline.seconds_at(clock.now()) - 1.2).abs() < 1e-9)
            }
            ref other => panic!("unexpected call {:?}", other),
        }

        clock.advance_secs(3.0);
        transport.resume().unwrap();
        scheduler.on_resume(transport.timeline());
        assert_eq!(sink.take(), vec![SinkCall::Resume(transport.timeline())]);
    }

    #[test]
    fn test_stop_cancels_and_releases() {
        let sink = RecordingSink::default();
        let mut scheduler = PlaybackScheduler::new(Box::new(sink.clone()));
        scheduler.on_play(&performance(), Timeline::STOPPED);
        sink.take();

        scheduler.on_stop();
        assert_eq!(sink.take(), vec![SinkCall::CancelAll, SinkCall::ReleaseAll]);
        assert_eq!(scheduler.scheduled_count(), 0);
    }

    #[test]
    fn test_visualization_only_accepts_everything() {
        let mut scheduler = PlaybackScheduler::visualization_only("no soundfont");
        assert!(!scheduler.has_audio());
        scheduler.on_play(&performance(), Timeline::STOPPED);
        scheduler.on_pause(Timeline::STOPPED);
        scheduler.on_resume(Timeline::STOPPED);
        scheduler.on_stop();
        assert_eq!(scheduler.scheduled_count(), 0);
    }
}
