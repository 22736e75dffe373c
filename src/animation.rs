//! Per-display-frame animation loop.
//!
//! The driver never keeps its own notion of time. Each tick asks the
//! transport where playback is and redraws the roll at that position, so it
//! runs the same way in every transport state: a static frame at 0 while
//! stopped, a frozen frame while paused, moving notes while playing.
//!
//! Ticking is tied to a [`FrameRegistration`] held by the view. Cancelling
//! the registration, or dropping it when the view goes away, stops further
//! ticks before the next one can start.

use crate::roll::{DrawSurface, NoteIndex, RollRenderer};
use crate::transport::{Clock, SystemClock, TransportClock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared cancellation flag between a registration and its driver.
#[derive(Debug, Clone, Default)]
struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Handle to a running animation. Dropping it cancels the animation.
#[derive(Debug)]
pub struct FrameRegistration {
    token: CancelToken,
}

impl FrameRegistration {
    /// Stops the animation. No tick runs after this returns.
    pub fn cancel(self) {
        // Drop does the work
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}

impl Drop for FrameRegistration {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// What a call to [`AnimationDriver::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// A frame was drawn at this playback position.
    Rendered { seconds: f64 },
    /// The animation is not registered or was cancelled; nothing was drawn.
    Cancelled,
}

/// Notifies the loop when the display wants the next frame.
pub trait FrameSignal {
    /// Time left until the next frame is due; zero when it is already due.
    fn until_next_frame(&self) -> Duration;

    /// Marks the due frame as handled and schedules the one after it.
    fn frame_done(&mut self);
}

/// A frame signal that fires at a fixed rate.
///
/// Frames missed while the loop was busy are skipped rather than replayed.
#[derive(Debug, Clone)]
pub struct FixedRateFrames<C: Clock = SystemClock> {
    clock: C,
    period: Duration,
    next: Duration,
}

impl<C: Clock> FixedRateFrames<C> {
    /// Creates a signal firing `frames_per_second` times a second.
    /// The first frame is due immediately.
    pub fn new(clock: C, frames_per_second: u32) -> Self {
        let period = Duration::from_secs(1) / frames_per_second.max(1);
        let next = clock.now();
        Self {
            clock,
            period,
            next,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl<C: Clock> FrameSignal for FixedRateFrames<C> {
    fn until_next_frame(&self) -> Duration {
        self.next.saturating_sub(self.clock.now())
    }

    fn frame_done(&mut self) {
        let now = self.clock.now();
        self.next += self.period;
        if self.next <= now {
            self.next = now + self.period;
        }
    }
}

/// Redraws the roll from the transport once per display frame.
#[derive(Debug)]
pub struct AnimationDriver {
    renderer: RollRenderer,
    token: Option<CancelToken>,
    frames: u64,
}

impl AnimationDriver {
    pub fn new(renderer: RollRenderer) -> Self {
        Self {
            renderer,
            token: None,
            frames: 0,
        }
    }

    /// Starts the animation and returns the handle that keeps it alive.
    ///
    /// Registering again replaces (and cancels) any earlier registration.
    pub fn register(&mut self) -> FrameRegistration {
        if let Some(old) = self.token.take() {
            old.cancel();
        }
        let token = CancelToken::default();
        self.token = Some(token.clone());
        tracing::debug!("Animation registered");
        FrameRegistration { token }
    }

    /// Whether the next tick would draw.
    pub fn is_running(&self) -> bool {
        self.token.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// Runs one frame: read the transport, pick up a resize, draw.
    pub fn tick<C, S>(
        &mut self,
        transport: &TransportClock<C>,
        index: &NoteIndex,
        surface: &mut S,
    ) -> Tick
    where
        C: Clock,
        S: DrawSurface + ?Sized,
    {
        if !self.is_running() {
            if self.token.take().is_some() {
                tracing::debug!("Animation cancelled after {} frames", self.frames);
            }
            return Tick::Cancelled;
        }

        let (width, height) = (surface.width(), surface.height());
        if self.renderer.needs_resize(width, height) {
            self.renderer.resize(width, height);
        }

        let seconds = transport.current_seconds();
        self.renderer.render(seconds, index, surface);
        self.frames += 1;
        Tick::Rendered { seconds }
    }

    pub fn renderer(&self) -> &RollRenderer {
        &self.renderer
    }

    /// Frames drawn since construction.
    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RollConfig;
    use crate::midi::{NoteEvent, Performance};
    use crate::roll::RecordingSurface;
    use crate::transport::ManualClock;

    fn setup() -> (AnimationDriver, TransportClock<ManualClock>, ManualClock, NoteIndex) {
        let clock = ManualClock::new();
        let transport = TransportClock::new(clock.clone());
        let performance = Performance::new(
            "test",
            vec![NoteEvent::new(60, 1.0, 0.5, 0.8, 0).unwrap()],
        );
        let driver = AnimationDriver::new(RollRenderer::new(RollConfig::default()));
        (driver, transport, clock, NoteIndex::build(&performance))
    }

    #[test]
    fn test_unregistered_driver_does_not_draw() {
        let (mut driver, transport, _, index) = setup();
        let mut surface = RecordingSurface::new(800, 500);
        assert_eq!(driver.tick(&transport, &index, &mut surface), Tick::Cancelled);
        assert!(surface.commands().is_empty());
    }

    #[test]
    fn test_ticks_follow_the_transport() {
        let (mut driver, mut transport, clock, index) = setup();
        let mut surface = RecordingSurface::new(800, 500);
        let _registration = driver.register();

        // Stopped: static frame at zero
        clock.advance_secs(3.0);
        assert_eq!(
            driver.tick(&transport, &index, &mut surface),
            Tick::Rendered { seconds: 0.0 }
        );

        transport.play().unwrap();
        clock.advance_secs(1.25);
        assert_eq!(
            driver.tick(&transport, &index, &mut surface),
            Tick::Rendered { seconds: 1.25 }
        );

        // Paused: the frame stays frozen
        transport.pause().unwrap();
        surface.take();
        driver.tick(&transport, &index, &mut surface);
        let first = surface.take();
        clock.advance_secs(2.0);
        driver.tick(&transport, &index, &mut surface);
        assert_eq!(first, surface.take());
        assert_eq!(driver.frames_rendered(), 4);
    }

    #[test]
    fn test_cancel_stops_ticks() {
        let (mut driver, transport, _, index) = setup();
        let mut surface = RecordingSurface::new(800, 500);
        let registration = driver.register();
        assert!(registration.is_active());
        driver.tick(&transport, &index, &mut surface);

        registration.cancel();
        assert!(!driver.is_running());
        surface.take();
        assert_eq!(driver.tick(&transport, &index, &mut surface), Tick::Cancelled);
        assert!(surface.commands().is_empty());
    }

    #[test]
    fn test_dropping_registration_cancels() {
        let (mut driver, transport, _, index) = setup();
        let mut surface = RecordingSurface::new(800, 500);
        {
            let _registration = driver.register();
            assert!(driver.is_running());
        }
        assert_eq!(driver.tick(&transport, &index, &mut surface), Tick::Cancelled);
    }

    #[test]
    fn test_reregistering_cancels_old_handle() {
        let (mut driver, _, _, _) = setup();
        let old = driver.register();
        let new = driver.register();
        assert!(!old.is_active());
        assert!(new.is_active());
        drop(old);
        assert!(driver.is_running());
    }

    #[test]
    fn test_resize_recomputes_geometry() {
        let (mut driver, transport, _, index) = setup();
        let mut surface = RecordingSurface::new(800, 500);
        let _registration = driver.register();

        driver.tick(&transport, &index, &mut surface);
        let before = *driver.renderer().geometry().unwrap();
        assert_eq!((before.width, before.height), (800, 500));

        surface.resize(1200, 600);
        driver.tick(&transport, &index, &mut surface);
        let after = *driver.renderer().geometry().unwrap();
        assert_eq!((after.width, after.height), (1200, 600));
        assert!(after.white_key_width > before.white_key_width);
    }

    #[test]
    fn test_fixed_rate_frames() {
        let clock = ManualClock::new();
        let mut frames = FixedRateFrames::new(clock.clone(), 50);
        assert_eq!(frames.period(), Duration::from_millis(20));
        assert_eq!(frames.until_next_frame(), Duration::ZERO);

        frames.frame_done();
        assert_eq!(frames.until_next_frame(), Duration::from_millis(20));
        clock.advance(Duration::from_millis(5));
        assert_eq!(frames.until_next_frame(), Duration::from_millis(15));

        // A long stall skips the missed frames
        clock.advance(Duration::from_millis(200));
        assert_eq!(frames.until_next_frame(), Duration::ZERO);
        frames.frame_done();
        assert_eq!(frames.until_next_frame(), Duration::from_millis(20));
    }
}
