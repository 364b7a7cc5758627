pub mod footer;
pub mod header;
pub mod resources;

use pulse::{HealthStatus, ResourceKind};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::Color;

use crate::tui::state::DashboardState;

pub const COLOR_BRAND: Color = Color::Cyan;
pub const COLOR_LABEL: Color = Color::Gray;
pub const COLOR_MUTED: Color = Color::DarkGray;
pub const COLOR_SUCCESS: Color = Color::Green;
pub const COLOR_WARNING: Color = Color::Yellow;
pub const COLOR_ERROR: Color = Color::Red;

pub fn status_color(status: HealthStatus) -> Color {
    match status {
        HealthStatus::Healthy => COLOR_SUCCESS,
        HealthStatus::Unhealthy => COLOR_ERROR,
        HealthStatus::Degraded => COLOR_WARNING,
        HealthStatus::Unknown | HealthStatus::Checking => COLOR_MUTED,
    }
}

/// Render the entire dashboard
pub fn render(f: &mut Frame, state: &DashboardState) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Length(3), Constraint::Min(1), Constraint::Length(2)])
        .split(size);

    header::render(f, chunks[0], state);

    let tables = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(1, 3), Constraint::Ratio(1, 3)])
        .split(chunks[1]);

    for (area, kind) in tables.iter().zip(ResourceKind::ALL) {
        resources::render(f, *area, kind, state);
    }

    footer::render(f, chunks[2], state);
}
