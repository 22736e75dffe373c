//! Audio engine for scheduled MIDI synthesis.
//!
//! Provides a [`SynthSink`] backed by rustysynth for synthesis and rodio for
//! audio output. Scheduled notes are fired from the audio thread: before
//! each buffer is rendered, the thread evaluates the transport timeline it
//! was last given against the shared clock and triggers every onset and
//! release that has come due.

use super::queue::{midi_velocity, NoteQueue, SynthEvent};
use super::scheduler::SynthSink;
use crate::config::PlaybackConfig;
use crate::transport::{Clock, SystemClock, Timeline};
use anyhow::{Context, Result};
use rodio::{OutputStream, OutputStreamHandle, Source};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sample rate for audio synthesis (44.1 kHz standard).
pub const SAMPLE_RATE: u32 = 44100;

/// Audio buffer size for low-latency playback.
/// Scheduled notes fire on buffer boundaries (~6ms at this size).
const BUFFER_SIZE: usize = 256;

/// All notes are played on one melodic channel with the piano program.
const PLAYBACK_CHANNEL: i32 = 0;

/// Scheduling state shared between the engine and the audio thread.
struct Sequencer {
    synth: Synthesizer,
    clock: SystemClock,
    timeline: Timeline,
    queue: NoteQueue,
    /// Reused between blocks so the audio thread does not allocate.
    events: Vec<SynthEvent>,
}

impl Sequencer {
    /// Fires every onset and release due at the current timeline position.
    fn advance(&mut self) {
        let now = self.timeline.seconds_at(self.clock.now());
        self.queue.advance(now, &mut self.events);
        for event in self.events.drain(..) {
            match event {
                SynthEvent::NoteOn { pitch, velocity } => {
                    self.synth.note_on(PLAYBACK_CHANNEL, pitch as i32, velocity)
                }
                SynthEvent::NoteOff { pitch } => {
                    self.synth.note_off(PLAYBACK_CHANNEL, pitch as i32)
                }
            }
        }
    }
}

/// Rodio source pulling interleaved stereo out of the sequencer's synth,
/// one block of `BUFFER_SIZE` frames at a time.
struct SynthSource {
    sequencer: Arc<Mutex<Sequencer>>,
    left: Vec<f32>,
    right: Vec<f32>,
    /// Interleaved L, R samples of the current block.
    block: Vec<f32>,
    /// Next sample of `block` to hand out.
    pos: usize,
}

impl SynthSource {
    fn new(sequencer: Arc<Mutex<Sequencer>>) -> Self {
        Self {
            sequencer,
            left: vec![0.0; BUFFER_SIZE],
            right: vec![0.0; BUFFER_SIZE],
            block: vec![0.0; BUFFER_SIZE * 2],
            pos: BUFFER_SIZE * 2,
        }
    }

    /// Fires due notes and renders the next block. Silence if the lock is
    /// poisoned.
    fn refill(&mut self) {
        match self.sequencer.lock() {
            Ok(mut sequencer) => {
                sequencer.advance();
                sequencer.synth.render(&mut self.left, &mut self.right);
            }
            Err(_) => {
                self.left.fill(0.0);
                self.right.fill(0.0);
            }
        }
        for (frame, (l, r)) in self
            .block
            .chunks_exact_mut(2)
            .zip(self.left.iter().zip(self.right.iter()))
        {
            frame[0] = *l;
            frame[1] = *r;
        }
        self.pos = 0;
    }
}

impl Iterator for SynthSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.pos >= self.block.len() {
            self.refill();
        }
        let sample = self.block[self.pos];
        self.pos += 1;
        Some(sample)
    }
}

impl Source for SynthSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// SoundFont synthesizer with a transport-locked note queue.
///
/// Constructed explicitly by the application and handed to the
/// [`PlaybackScheduler`](super::PlaybackScheduler); there is no global synth.
pub struct AudioEngine {
    sequencer: Arc<Mutex<Sequencer>>,
    velocity_scale: f32,
    /// Audio output stream (must be kept alive).
    _stream: OutputStream,
    /// Audio output handle for playback.
    _stream_handle: OutputStreamHandle,
}

impl AudioEngine {
    /// Creates a new audio engine with the specified SoundFont.
    ///
    /// # Arguments
    ///
    /// * `soundfont_path` - Path to the SoundFont file (.sf2)
    /// * `clock` - The clock the transport reads; must share its epoch
    /// * `settings` - Synth gain and velocity scaling
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The SoundFont file cannot be read
    /// - The SoundFont is invalid
    /// - Audio output cannot be initialized
    pub fn new<P: AsRef<Path>>(
        soundfont_path: P,
        clock: SystemClock,
        settings: &PlaybackConfig,
    ) -> Result<Self> {
        let mut file = BufReader::new(File::open(soundfont_path.as_ref()).with_context(|| {
            format!(
                "Failed to open SoundFont: {}",
                soundfont_path.as_ref().display()
            )
        })?);
        let soundfont = Arc::new(
            SoundFont::new(&mut file)
                .map_err(|e| anyhow::anyhow!("Failed to load SoundFont: {:?}", e))?,
        );

        let synth_settings = SynthesizerSettings::new(SAMPLE_RATE as i32);
        let mut synth = Synthesizer::new(&soundfont, &synth_settings)
            .map_err(|e| anyhow::anyhow!("Failed to create synthesizer: {:?}", e))?;
        synth.set_master_volume(settings.master_volume);

        let sequencer = Arc::new(Mutex::new(Sequencer {
            synth,
            clock,
            timeline: Timeline::STOPPED,
            queue: NoteQueue::new(),
            events: Vec::new(),
        }));

        let (stream, stream_handle) =
            OutputStream::try_default().context("Failed to open audio output")?;

        let source = SynthSource::new(Arc::clone(&sequencer));
        stream_handle
            .play_raw(source)
            .context("Failed to start audio playback")?;

        tracing::info!(
            "Audio engine started with {}",
            soundfont_path.as_ref().display()
        );

        Ok(Self {
            sequencer,
            velocity_scale: settings.velocity_scale,
            _stream: stream,
            _stream_handle: stream_handle,
        })
    }

    fn with_sequencer(&self, f: impl FnOnce(&mut Sequencer)) {
        if let Ok(mut sequencer) = self.sequencer.lock() {
            f(&mut sequencer);
        }
    }
}

impl SynthSink for AudioEngine {
    fn schedule_onset(&mut self, at_seconds: f64, pitch: u8, duration_seconds: f64, velocity: f32) {
        let velocity = midi_velocity(velocity, self.velocity_scale);
        self.with_sequencer(|seq| {
            seq.queue
                .schedule(at_seconds, pitch, duration_seconds, velocity)
        });
    }

    fn cancel_all(&mut self) {
        self.with_sequencer(|seq| seq.queue.cancel_pending());
    }

    fn release_all_voices(&mut self) {
        self.with_sequencer(|seq| {
            seq.synth.note_off_all(true);
            seq.queue.release_all();
        });
    }

    fn pause_clock(&mut self, timeline: Timeline) {
        self.with_sequencer(|seq| seq.timeline = timeline);
    }

    fn resume_clock(&mut self, timeline: Timeline) {
        self.with_sequencer(|seq| seq.timeline = timeline);
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.release_all_voices();
    }
}
