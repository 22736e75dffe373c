//! Terminal user interface.
//!
//! The screen is the transport bar on top, the falling-notes roll filling
//! the middle, and a row of key hints at the bottom.

mod canvas;
mod transport;

use crate::app::App;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders};
use ratatui::Frame;

pub use canvas::PixelCanvas;
pub use transport::{render_hints, render_transport, sounding_keys, status_line};

/// Renders the whole screen and advances the roll animation by one frame.
pub fn render(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Transport
            Constraint::Min(4),    // Roll
            Constraint::Length(1), // Key hints
        ])
        .split(frame.area());

    render_transport(frame, chunks[0], app);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let roll_area = block.inner(chunks[1]);
    frame.render_widget(block, chunks[1]);

    app.draw_roll(roll_area);
    frame.render_widget(&app.canvas, roll_area);

    render_hints(frame, chunks[2], app.session.transport_state());
}
