//! keyfall - A falling-notes piano roll player for the terminal.
//!
//! Loads a MIDI performance, plays it through a SoundFont synthesizer and
//! shows the notes falling onto an 88-key keyboard in time with the audio.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- song.mid --soundfont piano.sf2
//! cargo run -- song.mid                # visualization only
//! cargo run -- cached.json --lookahead 2
//! ```
//!
//! Press Space to play, pause and resume, `s` to stop, `q` to quit.

use keyfall::animation::{FixedRateFrames, FrameSignal};
use keyfall::{load_performance, ui, App, AudioEngine, KeyfallConfig, PlaybackScheduler, SystemClock};

use anyhow::{bail, Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::fs::File;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Mutex;

/// Command-line options for the application.
struct CliOptions {
    /// MIDI file (.mid) or performance dump (.json) to open.
    file: Option<PathBuf>,
    /// Path to a SoundFont file; without one the player is silent.
    soundfont: Option<PathBuf>,
    /// JSON configuration file.
    config: Option<PathBuf>,
    lookahead: Option<f64>,
    fps: Option<u32>,
    /// Log file; the terminal belongs to the UI.
    log: Option<PathBuf>,
}

impl CliOptions {
    /// Parses command-line arguments.
    ///
    /// Supports:
    /// - `<file>`: MIDI file or performance JSON to open
    /// - `--soundfont <path>` or `-sf <path>`: SoundFont for audio
    /// - `--config <path>` or `-c <path>`: JSON configuration file
    /// - `--lookahead <seconds>`: Look-ahead window of the roll
    /// - `--fps <n>`: Frame rate of the animation loop
    /// - `--log <path>`: Write logs to a file
    /// - `--help` or `-h`: Print help and exit
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut options = Self {
            file: None,
            soundfont: None,
            config: None,
            lookahead: None,
            fps: None,
            log: None,
        };
        let mut i = 1;

        while i < args.len() {
            match args[i].as_str() {
                flag @ ("--soundfont" | "-sf") => {
                    i += 1;
                    options.soundfont = Some(PathBuf::from(flag_value(&args, i, flag)?));
                }
                flag @ ("--config" | "-c") => {
                    i += 1;
                    options.config = Some(PathBuf::from(flag_value(&args, i, flag)?));
                }
                flag @ "--lookahead" => {
                    i += 1;
                    let seconds = flag_value(&args, i, flag)?;
                    options.lookahead = Some(
                        seconds
                            .parse::<f64>()
                            .with_context(|| format!("Invalid look-ahead: {}", seconds))?,
                    );
                }
                flag @ "--fps" => {
                    i += 1;
                    let fps = flag_value(&args, i, flag)?;
                    options.fps =
                        Some(fps.parse::<u32>().with_context(|| format!("Invalid frame rate: {}", fps))?);
                }
                flag @ "--log" => {
                    i += 1;
                    options.log = Some(PathBuf::from(flag_value(&args, i, flag)?));
                }
                "--help" | "-h" => {
                    print_help(args.first().map(String::as_str).unwrap_or("keyfall"));
                    std::process::exit(0);
                }
                other if other.ends_with(".sf2") => {
                    options.soundfont = Some(PathBuf::from(other));
                }
                other if other.starts_with('-') => {
                    bail!("Unknown option: {} (use --help for usage information)", other);
                }
                other => {
                    if options.file.is_some() {
                        bail!("Only one file can be opened, got another: {}", other);
                    }
                    options.file = Some(PathBuf::from(other));
                }
            }
            i += 1;
        }

        Ok(options)
    }
}

/// Returns the argument following a flag.
fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i)
        .map(String::as_str)
        .with_context(|| format!("{} requires an argument", flag))
}

fn print_help(program: &str) {
    eprintln!("keyfall - Falling-notes piano roll player");
    eprintln!();
    eprintln!("Usage: {} [OPTIONS] [FILE]", program);
    eprintln!();
    eprintln!("FILE is a Standard MIDI File (.mid) or a performance dump (.json).");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -sf, --soundfont PATH  Play audio with this SoundFont (.sf2)");
    eprintln!("  -c, --config PATH      Load settings from a JSON file");
    eprintln!("      --lookahead SECS   Seconds of upcoming notes shown (default 4)");
    eprintln!("      --fps N            Animation frame rate (default 60)");
    eprintln!("      --log PATH         Write logs to PATH (filter with RUST_LOG)");
    eprintln!("  -h, --help             Print this help message");
    eprintln!();
    eprintln!("Without a SoundFont the roll runs without sound.");
}

/// Loads the configuration file, if any, and applies CLI overrides.
fn load_config(cli: &CliOptions) -> Result<KeyfallConfig> {
    let mut config = match &cli.config {
        Some(path) => KeyfallConfig::load(path)?,
        None => KeyfallConfig::default(),
    };
    if let Some(lookahead) = cli.lookahead {
        config.roll.lookahead_seconds = lookahead;
    }
    if let Some(fps) = cli.fps {
        config.playback.frames_per_second = fps;
    }
    config.validate()?;
    Ok(config)
}

/// Main entry point.
fn main() -> Result<()> {
    // Parse CLI options first (before any terminal setup)
    let cli = CliOptions::parse()?;

    // Logs go to a file when requested; stderr is hidden behind the UI
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    match &cli.log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    let config = load_config(&cli).context("Failed to load configuration")?;
    let performance = cli
        .file
        .as_deref()
        .map(load_performance)
        .transpose()?;

    let clock = SystemClock::new();
    let scheduler = match &cli.soundfont {
        Some(path) => match AudioEngine::new(path, clock, &config.playback) {
            Ok(engine) => PlaybackScheduler::new(Box::new(engine)),
            Err(e) => PlaybackScheduler::visualization_only(format!("{:#}", e)),
        },
        None => PlaybackScheduler::visualization_only("no SoundFont given"),
    };

    let mut app = App::new(&config, clock, scheduler);
    match performance {
        Some(performance) => app.load(performance),
        None => app.set_status("No file loaded"),
    }

    let mut terminal = setup_terminal().context("Failed to setup terminal")?;

    let frames = FixedRateFrames::new(clock, config.playback.frames_per_second);
    let result = run_app(&mut terminal, &mut app, frames);

    // Cancel the animation before the view goes away
    app.shutdown();
    restore_terminal(&mut terminal).context("Failed to restore terminal")?;

    result
}

/// Sets up the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;
    Ok(terminal)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Main application loop: one roll frame per display frame, input in between.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    mut frames: impl FrameSignal,
) -> Result<()> {
    loop {
        app.update();
        terminal.draw(|frame| ui::render(frame, app))?;
        frames.frame_done();

        // Handle input until the next frame is due; resizes are picked up
        // by the next draw
        loop {
            let wait = frames.until_next_frame();
            if !event::poll(wait)? {
                break;
            }
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key.code, key.modifiers);
                }
            }
            if app.should_quit {
                return Ok(());
            }
            if wait.is_zero() {
                break;
            }
        }
    }
}

/// Handles a key press.
fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true
        }
        KeyCode::Char(' ') => app.toggle_playback(),
        KeyCode::Char('s') => app.stop(),
        _ => {}
    }
}
