//! Transport bar rendering.
//!
//! Displays the playback state, the status line and the available controls.

use crate::app::App;
use crate::midi::note_to_name;
use crate::roll::{keyboard, NoteIndex};
use crate::transport::TransportState;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

/// Formats the one-line playback summary.
pub fn status_line(seconds: f64, state: TransportState, notes: usize) -> String {
    format!(
        "Time: {:.1}s | Status: {} | Notes: {}",
        seconds, state, notes
    )
}

/// Names of the keys sounding at `t`, lowest first.
pub fn sounding_keys(index: &NoteIndex, t: f64) -> String {
    keyboard()
        .iter()
        .filter(|key| index.active_at(key.id, t))
        .map(|key| note_to_name(key.id))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders the transport bar at the top of the screen.
///
/// # Arguments
///
/// * `frame` - The frame to render to
/// * `area` - The area to render in
/// * `app` - Application state
pub fn render_transport(frame: &mut Frame, area: Rect, app: &App) {
    let title = if app.session.performance().name.is_empty() {
        " keyfall ".to_string()
    } else {
        format!(" {} ", app.session.performance().name)
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(14), // Playback state
            Constraint::Length(46), // Status line
            Constraint::Length(8),  // Audio indicator
            Constraint::Min(10),    // Status message
        ])
        .split(inner);

    let state = app.session.transport_state();
    let play_status = match state {
        TransportState::Playing => Span::styled(
            " [>] PLAY ",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        TransportState::Paused => Span::styled(
            " [||] PAUSE ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        TransportState::Stopped => Span::styled(
            " [.] STOP ",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
    };
    frame.render_widget(Paragraph::new(Line::from(play_status)), chunks[0]);

    let summary = status_line(
        app.session.current_seconds(),
        state,
        app.session.performance().notes().len(),
    );
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            summary,
            Style::default().fg(Color::White),
        ))),
        chunks[1],
    );

    let audio = if app.session.scheduler().has_audio() {
        Span::styled("AUDIO", Style::default().fg(Color::Green))
    } else {
        Span::styled("MUTE", Style::default().fg(Color::DarkGray))
    };
    frame.render_widget(Paragraph::new(Line::from(audio)), chunks[2]);

    if let Some((msg, _)) = &app.status_message {
        let message = Line::from(Span::styled(
            msg.as_str(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ));
        frame.render_widget(Paragraph::new(message), chunks[3]);
    } else {
        let keys = sounding_keys(app.session.index(), app.session.current_seconds());
        let keys = Line::from(Span::styled(keys, Style::default().fg(Color::Cyan)));
        frame.render_widget(Paragraph::new(keys), chunks[3]);
    }
}

/// Renders the key hints, dimming the ones the transport would refuse.
pub fn render_hints(frame: &mut Frame, area: Rect, state: TransportState) {
    let hint = |key: &'static str, label: &'static str, enabled: bool| {
        let color = if enabled { Color::White } else { Color::DarkGray };
        [
            Span::styled(key, Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::styled(label, Style::default().fg(color)),
        ]
    };

    let toggle_label = match state {
        TransportState::Stopped => " play  ",
        TransportState::Playing => " pause  ",
        TransportState::Paused => " resume  ",
    };
    let toggle_enabled = state.can_play() || state.can_pause() || state.can_resume();

    let spans: Vec<Span> = [
        hint("Space", toggle_label, toggle_enabled),
        hint("s", " stop  ", state != TransportState::Stopped),
        hint("q", " quit", true),
    ]
    .into_iter()
    .flatten()
    .collect();

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
