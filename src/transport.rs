//! Transport clock: play/pause/resume/stop and the current playback time.
//!
//! Playback time is never accumulated per frame. It is derived from a
//! [`Timeline`], a `(state, origin, offset)` triple that only changes on the
//! four transitions, evaluated against a [`Clock`] reading:
//!
//! ```text
//! current = Playing ? now - origin + offset : offset
//! ```
//!
//! The render loop and the audio thread evaluate the same timeline against
//! the same clock, so the picture and the sound cannot drift apart.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Represents the current playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Not playing, position reset to start.
    Stopped,
    /// Currently playing.
    Playing,
    /// Paused at current position.
    Paused,
}

impl TransportState {
    /// Whether `play()` is allowed. UI layers enable their buttons from these.
    pub fn can_play(self) -> bool {
        self == Self::Stopped
    }

    pub fn can_pause(self) -> bool {
        self == Self::Playing
    }

    pub fn can_resume(self) -> bool {
        self == Self::Paused
    }

    /// Stop is always allowed; from Stopped it is a no-op.
    pub fn can_stop(self) -> bool {
        true
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportState::Stopped => "Stopped",
            TransportState::Playing => "Playing",
            TransportState::Paused => "Paused",
        };
        f.write_str(label)
    }
}

/// A transition the transport refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: TransportState,
        action: &'static str,
    },
}

/// A monotonic time source.
///
/// Readings are durations since an arbitrary, fixed epoch.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
///
/// Clones share the epoch, so every clone returns the same reading at the
/// same instant.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// A clock that only moves when told to. Clones share the same time.
///
/// Used for simulated-time tests and deterministic demos.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward.
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Moves time forward by a number of seconds.
    pub fn advance_secs(&self, seconds: f64) {
        self.advance(Duration::from_secs_f64(seconds));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }
}

/// Copyable snapshot of the transport's time derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeline {
    pub state: TransportState,
    /// Clock reading when playback last started or resumed.
    pub origin: Duration,
    /// Seconds accumulated before `origin`.
    pub offset: f64,
}

impl Timeline {
    /// The stopped timeline at position zero.
    pub const STOPPED: Timeline = Timeline {
        state: TransportState::Stopped,
        origin: Duration::ZERO,
        offset: 0.0,
    };

    /// Evaluates the timeline at a clock reading.
    #[inline]
    pub fn seconds_at(&self, now: Duration) -> f64 {
        match self.state {
            TransportState::Playing => now.saturating_sub(self.origin).as_secs_f64() + self.offset,
            TransportState::Paused | TransportState::Stopped => self.offset,
        }
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::STOPPED
    }
}

/// The playback clock shared by the renderer and the audio scheduler.
///
/// Single writer: only the four transitions modify it, and reads through
/// [`TransportClock::current_seconds`] are pure.
#[derive(Debug, Clone)]
pub struct TransportClock<C: Clock = SystemClock> {
    clock: C,
    timeline: Timeline,
}

impl<C: Clock> TransportClock<C> {
    /// Creates a stopped transport at position zero.
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            timeline: Timeline::STOPPED,
        }
    }

    /// Starts playback from zero. Only valid while stopped.
    pub fn play(&mut self) -> Result<(), TransportError> {
        self.check(TransportState::can_play, "play")?;
        self.timeline = Timeline {
            state: TransportState::Playing,
            origin: self.clock.now(),
            offset: 0.0,
        };
        Ok(())
    }

    /// Freezes playback at the current position. Only valid while playing.
    pub fn pause(&mut self) -> Result<(), TransportError> {
        self.check(TransportState::can_pause, "pause")?;
        let now = self.clock.now();
        self.timeline = Timeline {
            state: TransportState::Paused,
            origin: now,
            offset: self.timeline.seconds_at(now),
        };
        Ok(())
    }

    /// Continues from the frozen position. Only valid while paused.
    pub fn resume(&mut self) -> Result<(), TransportError> {
        self.check(TransportState::can_resume, "resume")?;
        self.timeline = Timeline {
            state: TransportState::Playing,
            origin: self.clock.now(),
            offset: self.timeline.offset,
        };
        Ok(())
    }

    /// Stops and rewinds to zero. Valid from any state.
    pub fn stop(&mut self) {
        self.timeline = Timeline::STOPPED;
    }

    /// Current playback position in seconds.
    ///
    /// 0 when stopped, the frozen offset when paused, live time when playing.
    pub fn current_seconds(&self) -> f64 {
        self.timeline.seconds_at(self.clock.now())
    }

    pub fn state(&self) -> TransportState {
        self.timeline.state
    }

    /// Returns the current time derivation for another reader.
    pub fn timeline(&self) -> Timeline {
        self.timeline
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn check(
        &self,
        allowed: fn(TransportState) -> bool,
        action: &'static str,
    ) -> Result<(), TransportError> {
        if allowed(self.timeline.state) {
            Ok(())
        } else {
            let err = TransportError::InvalidTransition {
                from: self.timeline.state,
                action,
            };
            tracing::warn!("Ignored transport request: {}", err);
            Err(err)
        }
    }
}
