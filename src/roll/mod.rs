//! The falling-notes piano roll.
//!
//! - [`keyboard`]: the fixed 88-key layout
//! - [`NoteIndex`]: per-key note intervals for fast per-frame queries
//! - [`RollRenderer`]: geometry, frame computation and drawing
//! - [`DrawSurface`]: the rectangle surface frames are drawn onto

pub mod index;
pub mod keyboard;
pub mod renderer;
pub mod surface;

pub use index::{Interval, NoteIndex};
pub use keyboard::{key, keyboard, Key, KeyColor, WHITE_KEY_COUNT};
pub use renderer::{FallingNote, Geometry, RollFrame, RollRenderer};
pub use surface::{DrawCommand, DrawSurface, RecordingSurface, Rgb};
