//! keyfall - A falling-notes piano roll player.
//!
//! This library provides the playback core (transport clock, note index,
//! synth scheduling, roll rendering and the animation loop) and the
//! terminal front end built on it.

pub mod animation;
pub mod app;
pub mod audio;
pub mod config;
pub mod midi;
pub mod roll;
pub mod session;
pub mod transport;
pub mod ui;

// Re-export commonly used types
pub use animation::{AnimationDriver, FixedRateFrames, FrameRegistration, FrameSignal, Tick};
pub use app::{load_performance, App};
pub use audio::{AudioEngine, PlaybackScheduler, SynthSink};
pub use config::{ConfigError, KeyfallConfig};
pub use midi::{import_from_midi, NoteEvent, Performance};
pub use roll::{DrawSurface, NoteIndex, RollRenderer};
pub use session::Session;
pub use transport::{
    Clock, ManualClock, SystemClock, Timeline, TransportClock, TransportError, TransportState,
};
