use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Clear, Paragraph};

use super::{COLOR_BRAND, COLOR_ERROR};
use crate::tui::state::DashboardState;

pub fn render(f: &mut Frame, area: Rect, state: &DashboardState) {
    f.render_widget(Clear, area);

    let footer_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(32), Constraint::Min(1)])
        .split(area);

    let keys = Paragraph::new(Line::from(Span::styled(
        "r: Refresh   q/Esc: Quit",
        Style::default().fg(COLOR_BRAND).add_modifier(Modifier::BOLD),
    )));
    f.render_widget(keys, footer_chunks[0]);

    if let Some(error) = &state.last_error {
        let error = Paragraph::new(Line::from(Span::styled(
            format!("refresh failed: {error}"),
            Style::default().fg(COLOR_ERROR),
        )));
        f.render_widget(error, footer_chunks[1]);
    }
}
