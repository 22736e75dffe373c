//! Falling-notes renderer.
//!
//! Layout, top to bottom: the note lane where upcoming notes fall towards
//! the judgement line, a small gap, the 88-key keyboard, and bottom padding.
//! A note's distance above the judgement line is `(time - now) * speed`,
//! with the speed chosen so the whole look-ahead window fills the lane.

use super::index::NoteIndex;
use super::keyboard::{keyboard, Key, WHITE_KEY_COUNT};
use super::surface::DrawSurface;
use crate::config::RollConfig;
use crate::midi::KEY_COUNT;

/// Black key height as a fraction of white key height.
const BLACK_KEY_HEIGHT_RATIO: f64 = 5.0 / 8.0;

/// Surface-dependent layout, recomputed on resize only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub padding: f64,
    pub keyboard_width: f64,
    pub keyboard_top: f64,
    pub white_key_width: f64,
    pub white_key_height: f64,
    pub black_key_width: f64,
    pub black_key_height: f64,
    /// Height of the note lane; the judgement line sits at this y.
    pub lane_height: f64,
}

impl Geometry {
    pub fn compute(width: u32, height: u32, config: &RollConfig) -> Self {
        let keyboard_width =
            (width as f64 - 2.0 * config.padding).max(config.min_keyboard_width);
        let white_key_width = keyboard_width / WHITE_KEY_COUNT as f64;
        let white_key_height = white_key_width * config.key_aspect;
        let keyboard_top = height as f64 - config.padding - white_key_height;

        Self {
            width,
            height,
            padding: config.padding,
            keyboard_width,
            keyboard_top,
            white_key_width,
            white_key_height,
            black_key_width: white_key_width * 0.5,
            black_key_height: white_key_height * BLACK_KEY_HEIGHT_RATIO,
            lane_height: (keyboard_top - config.judgement_gap).max(0.0),
        }
    }

    /// Left edge and width of a key (and of the notes falling onto it).
    pub fn key_span(&self, key: &Key) -> (f64, f64) {
        let x = self.padding + key.position * self.white_key_width;
        if key.is_white() {
            (x, self.white_key_width)
        } else {
            (x + self.black_key_width / 2.0, self.black_key_width)
        }
    }
}

/// A falling-note rectangle, already clipped to the lane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallingNote {
    pub pitch: u8,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Everything one frame shows, independent of any surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RollFrame {
    pub seconds: f64,
    /// Sounding state per key, lowest key first.
    pub active: [bool; KEY_COUNT],
    pub notes: Vec<FallingNote>,
}

impl RollFrame {
    pub fn active_pitches(&self) -> impl Iterator<Item = u8> + '_ {
        keyboard()
            .iter()
            .zip(self.active.iter())
            .filter(|(_, &on)| on)
            .map(|(key, _)| key.id)
    }
}

/// Computes and draws roll frames.
///
/// Rendering reads the index and the cached geometry only; calling
/// [`RollRenderer::render`] twice with the same time draws the same thing.
#[derive(Debug, Clone)]
pub struct RollRenderer {
    config: RollConfig,
    geometry: Option<Geometry>,
}

impl RollRenderer {
    pub fn new(config: RollConfig) -> Self {
        Self {
            config,
            geometry: None,
        }
    }

    pub fn config(&self) -> &RollConfig {
        &self.config
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    /// Recomputes the geometry for new surface dimensions.
    pub fn resize(&mut self, width: u32, height: u32) {
        let geometry = Geometry::compute(width, height, &self.config);
        tracing::debug!(
            "Roll resized to {}x{} (white key {:.2})",
            width,
            height,
            geometry.white_key_width
        );
        self.geometry = Some(geometry);
    }

    /// Whether the cached geometry was computed for other dimensions.
    pub fn needs_resize(&self, width: u32, height: u32) -> bool {
        self.geometry
            .map_or(true, |g| g.width != width || g.height != height)
    }

    /// Computes active keys and visible notes at time `t`.
    pub fn frame(&self, t: f64, index: &NoteIndex) -> RollFrame {
        let active = std::array::from_fn(|i| index.active_at(keyboard()[i].id, t));

        let mut notes = Vec::new();
        if let Some(geometry) = self.geometry.as_ref().filter(|g| g.lane_height > 0.0) {
            let lane = geometry.lane_height;
            let lookahead = self.config.lookahead_seconds;
            let pixels_per_second = lane / lookahead;
            let y_of = |time: f64| lane - (time - t) * pixels_per_second;

            for key in keyboard() {
                let (x, w) = geometry.key_span(key);
                for interval in index.visible_at(key.id, t, lookahead) {
                    let top = y_of(interval.end).max(0.0);
                    let bottom = y_of(interval.start).min(lane);
                    notes.push(FallingNote {
                        pitch: key.id,
                        x,
                        y: top,
                        w,
                        h: (bottom - top).max(1.0),
                    });
                }
            }
        }

        RollFrame {
            seconds: t,
            active,
            notes,
        }
    }

    /// Draws a computed frame: background, falling notes, white keys, then
    /// black keys on top.
    pub fn draw<S: DrawSurface + ?Sized>(&self, frame: &RollFrame, surface: &mut S) {
        let colors = &self.config;
        let (width, height) = (surface.width() as f64, surface.height() as f64);
        surface.fill_rect(0.0, 0.0, width, height, colors.background);

        let Some(geometry) = self.geometry.as_ref() else {
            return;
        };

        for note in &frame.notes {
            surface.fill_rect(note.x, note.y, note.w, note.h, colors.note);
        }

        for (white_pass, key_height, idle) in [
            (true, geometry.white_key_height, colors.white_key),
            (false, geometry.black_key_height, colors.black_key),
        ] {
            for (key, &active) in keyboard().iter().zip(frame.active.iter()) {
                if key.is_white() != white_pass {
                    continue;
                }
                let (x, w) = geometry.key_span(key);
                let fill = if active { colors.active_key } else { idle };
                surface.fill_rect(x, geometry.keyboard_top, w, key_height, fill);
                surface.stroke_rect(x, geometry.keyboard_top, w, key_height, colors.key_outline);
            }
        }
    }

    /// Computes and draws the frame for time `t`.
    pub fn render<S: DrawSurface + ?Sized>(&self, t: f64, index: &NoteIndex, surface: &mut S) {
        let frame = self.frame(t, index);
        self.draw(&frame, surface);
    }
}
