//! Audio playback for the loaded performance.
//!
//! This module provides:
//! - The [`SynthSink`] contract the core schedules notes against
//! - The [`PlaybackScheduler`] that maps transport transitions to sink calls
//! - The [`NoteQueue`] deciding which note-ons and note-offs are due
//! - A SoundFont-backed [`AudioEngine`] sink using rustysynth and rodio

pub mod engine;
pub mod queue;
pub mod scheduler;

pub use engine::AudioEngine;
pub use queue::{NoteQueue, SynthEvent};
pub use scheduler::{PlaybackScheduler, SynthSink};
