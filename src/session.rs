//! Playback session: one loaded performance and the machinery playing it.
//!
//! The session is the control surface the UI talks to. It owns the
//! performance, the note index derived from it, the transport clock and the
//! playback scheduler, and keeps the scheduler in step with every
//! transport transition.

use crate::audio::PlaybackScheduler;
use crate::midi::Performance;
use crate::roll::NoteIndex;
use crate::transport::{Clock, SystemClock, TransportClock, TransportError, TransportState};

pub struct Session<C: Clock = SystemClock> {
    performance: Performance,
    index: NoteIndex,
    transport: TransportClock<C>,
    scheduler: PlaybackScheduler,
    /// Seconds after the last note end before auto-stop; negative disables it.
    tail_seconds: f64,
}

impl<C: Clock> Session<C> {
    /// Creates a session with an empty performance.
    ///
    /// # Arguments
    ///
    /// * `clock` - Time source for the transport
    /// * `scheduler` - Scheduler for the synth, or a visualization-only one
    pub fn new(clock: C, scheduler: PlaybackScheduler) -> Self {
        Self {
            performance: Performance::default(),
            index: NoteIndex::default(),
            transport: TransportClock::new(clock),
            scheduler,
            tail_seconds: 1.0,
        }
    }

    pub fn set_tail_seconds(&mut self, tail_seconds: f64) {
        self.tail_seconds = tail_seconds;
    }

    /// Replaces the performance. Playback stops and the index is rebuilt.
    pub fn load(&mut self, performance: Performance) {
        self.stop();
        self.index = NoteIndex::build(&performance);
        tracing::info!(
            "Loaded '{}': {} notes on the keyboard, {:.1}s",
            performance.name,
            self.index.note_count(),
            performance.total_duration_seconds()
        );
        if self.index.dropped_count() > 0 {
            tracing::debug!(
                "{} notes outside the keyboard range were not indexed",
                self.index.dropped_count()
            );
        }
        self.performance = performance;
    }

    /// Starts playback from the beginning and schedules the performance.
    pub fn play(&mut self) -> Result<(), TransportError> {
        self.transport.play()?;
        self.scheduler
            .on_play(&self.performance, self.transport.timeline());
        tracing::info!("Playback started");
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), TransportError> {
        self.transport.pause()?;
        self.scheduler.on_pause(self.transport.timeline());
        tracing::info!("Paused at {:.2}s", self.transport.current_seconds());
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), TransportError> {
        self.transport.resume()?;
        self.scheduler.on_resume(self.transport.timeline());
        tracing::info!("Resumed at {:.2}s", self.transport.current_seconds());
        Ok(())
    }

    /// Stops and rewinds. A no-op when already stopped.
    pub fn stop(&mut self) {
        if self.transport.state() == TransportState::Stopped {
            return;
        }
        self.transport.stop();
        self.scheduler.on_stop();
        tracing::info!("Playback stopped");
    }

    /// Toggles between play, pause and resume, like a single play button.
    pub fn toggle(&mut self) -> Result<(), TransportError> {
        match self.transport.state() {
            TransportState::Stopped => self.play(),
            TransportState::Playing => self.pause(),
            TransportState::Paused => self.resume(),
        }
    }

    /// Stops playback once the performance and its tail are over.
    ///
    /// Call once per frame. Returns true if playback was stopped.
    pub fn update(&mut self) -> bool {
        if self.tail_seconds < 0.0 || self.transport.state() != TransportState::Playing {
            return false;
        }
        let end = self.performance.total_duration_seconds() + self.tail_seconds;
        if self.transport.current_seconds() > end {
            self.stop();
            return true;
        }
        false
    }

    pub fn current_seconds(&self) -> f64 {
        self.transport.current_seconds()
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn performance(&self) -> &Performance {
        &self.performance
    }

    pub fn index(&self) -> &NoteIndex {
        &self.index
    }

    pub fn transport(&self) -> &TransportClock<C> {
        &self.transport
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }
}
