//! Application state for the terminal player.
//!
//! Ties a [`Session`] to the roll animation and the terminal canvas, and
//! keeps the transient status message shown in the transport bar.

use crate::animation::{AnimationDriver, FrameRegistration, Tick};
use crate::audio::PlaybackScheduler;
use crate::config::KeyfallConfig;
use crate::midi::{import_from_midi, Performance};
use crate::roll::{DrawSurface, Geometry, RollRenderer};
use crate::session::Session;
use crate::transport::{SystemClock, TransportState};
use crate::ui::PixelCanvas;
use anyhow::{Context, Result};
use ratatui::layout::Rect;
use std::path::Path;
use std::time::{Duration, Instant};

/// How long a status message stays visible.
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Loads a performance from a Standard MIDI File or a performance JSON dump.
pub fn load_performance(path: &Path) -> Result<Performance> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Performance::load_from_file(path)
    } else {
        import_from_midi(path).with_context(|| format!("Failed to import {}", path.display()))
    }
}

/// Main application state.
pub struct App {
    pub session: Session,
    driver: AnimationDriver,
    /// Keeps the roll animating; dropped on shutdown.
    registration: Option<FrameRegistration>,
    pub canvas: PixelCanvas,
    /// Temporary status message and when it was set.
    pub status_message: Option<(String, Instant)>,
    pub should_quit: bool,
}

impl App {
    /// Creates the application and starts the roll animation.
    pub fn new(config: &KeyfallConfig, clock: SystemClock, scheduler: PlaybackScheduler) -> Self {
        let mut session = Session::new(clock, scheduler);
        session.set_tail_seconds(config.playback.tail_seconds);

        let mut driver = AnimationDriver::new(RollRenderer::new(config.roll.clone()));
        let registration = driver.register();

        Self {
            session,
            driver,
            registration: Some(registration),
            canvas: PixelCanvas::default(),
            status_message: None,
            should_quit: false,
        }
    }

    /// Replaces the current performance.
    pub fn load(&mut self, performance: Performance) {
        let message = format!(
            "Loaded {} ({} notes)",
            performance.name,
            performance.notes().len()
        );
        self.session.load(performance);
        self.set_status(message);
    }

    /// Space bar: play when stopped, pause when playing, resume when paused.
    pub fn toggle_playback(&mut self) {
        match self.session.toggle() {
            Ok(()) => {
                let message = match self.session.transport_state() {
                    TransportState::Playing => "Playing",
                    TransportState::Paused => "Paused",
                    TransportState::Stopped => "Stopped",
                };
                self.set_status(message);
            }
            Err(e) => self.set_status(e.to_string()),
        }
    }

    pub fn stop(&mut self) {
        self.session.stop();
        self.set_status("Stopped");
    }

    /// Per-frame housekeeping: auto-stop at the end and status expiry.
    pub fn update(&mut self) {
        if self.session.update() {
            self.set_status("Finished");
        }
        self.clear_expired_status();
    }

    /// Redraws the roll into the canvas, sized to fill `area`.
    pub fn draw_roll(&mut self, area: Rect) -> Tick {
        let (width, height) = PixelCanvas::size_for(area);
        if self.canvas.width() != width || self.canvas.height() != height {
            self.canvas.resize(width, height);
        }
        self.driver.tick(
            self.session.transport(),
            self.session.index(),
            &mut self.canvas,
        )
    }

    /// Stops the animation and playback before the view goes away.
    pub fn shutdown(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration.cancel();
        }
        self.session.stop();
        self.should_quit = true;
    }

    /// Layout of the last drawn roll.
    pub fn roll_geometry(&self) -> Option<&Geometry> {
        self.driver.renderer().geometry()
    }

    pub fn is_animating(&self) -> bool {
        self.driver.is_running()
    }

    /// Sets a status message to display temporarily.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Clears expired status messages.
    pub fn clear_expired_status(&mut self) {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::NoteEvent;

    fn app() -> App {
        let mut app = App::new(
            &KeyfallConfig::default(),
            SystemClock::new(),
            PlaybackScheduler::visualization_only("test"),
        );
        app.load(Performance::new(
            "test",
            vec![NoteEvent::new(60, 0.0, 1.0, 0.8, 0).unwrap()],
        ));
        app
    }

    #[test]
    fn test_toggle_and_stop() {
        let mut app = app();
        app.toggle_playback();
        assert_eq!(app.session.transport_state(), TransportState::Playing);
        assert_eq!(app.status_message.as_ref().unwrap().0, "Playing");
        app.toggle_playback();
        assert_eq!(app.session.transport_state(), TransportState::Paused);
        app.stop();
        assert_eq!(app.session.transport_state(), TransportState::Stopped);
    }

    #[test]
    fn test_draw_roll_sizes_canvas() {
        let mut app = app();
        assert!(matches!(
            app.draw_roll(Rect::new(1, 4, 120, 30)),
            Tick::Rendered { .. }
        ));
        assert_eq!((app.canvas.width(), app.canvas.height()), (120, 60));
    }

    #[test]
    fn test_roll_fits_an_80x24_terminal() {
        use ratatui::backend::TestBackend;
        use ratatui::Terminal;

        let mut app = app();
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| crate::ui::render(frame, &mut app)).unwrap();

        let (width, height) = (app.canvas.width() as f64, app.canvas.height() as f64);
        assert_eq!((width, height), (78.0, 36.0));
        let g = *app.roll_geometry().unwrap();
        assert!(g.lane_height > 0.0);
        assert!(g.keyboard_top >= 0.0);
        assert!(g.keyboard_top + g.white_key_height <= height);
        assert!(g.padding + g.keyboard_width <= width);
    }

    #[test]
    fn test_shutdown_cancels_animation() {
        let mut app = app();
        app.shutdown();
        assert!(!app.is_animating());
        assert_eq!(app.draw_roll(Rect::new(0, 0, 80, 24)), Tick::Cancelled);
        assert!(app.should_quit);
    }

    #[test]
    fn test_load_json_performance() {
        let path = std::env::temp_dir().join("keyfall_app_test.json");
        let performance = Performance::new(
            "fixture",
            vec![NoteEvent::new(64, 0.5, 0.5, 0.5, 0).unwrap()],
        );
        performance.save_to_file(&path).unwrap();
        let loaded = load_performance(&path).unwrap();
        assert_eq!(loaded, performance);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_midi_fails() {
        assert!(load_performance(Path::new("/nonexistent/song.mid")).is_err());
    }
}
