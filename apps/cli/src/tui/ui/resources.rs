use pulse::ResourceKind;
use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};

use super::{COLOR_BRAND, COLOR_MUTED, status_color};
use crate::report::{format_latency, format_uptime, status_symbol};
use crate::tui::state::DashboardState;

fn title(kind: ResourceKind, count: usize) -> String {
    match kind {
        ResourceKind::Website => format!(" Websites ({count}) "),
        ResourceKind::App => format!(" Applications ({count}) "),
        ResourceKind::Server => format!(" Servers ({count}) "),
    }
}

fn placeholder(f: &mut Frame, area: Rect, title: &str, message: String) {
    let empty = Paragraph::new(vec![Line::from(""), Line::from(Span::styled(message, Style::default().fg(COLOR_MUTED)))])
        .block(Block::default().borders(Borders::ALL).title(title).border_style(Style::default().fg(COLOR_BRAND)));

    f.render_widget(Clear, area);
    f.render_widget(empty, area);
}

pub fn render(f: &mut Frame, area: Rect, kind: ResourceKind, state: &DashboardState) {
    let Some(refresh) = &state.last_refresh else {
        placeholder(f, area, &title(kind, 0), "Checking...".to_string());
        return;
    };

    let results = refresh.report.results(kind);
    let title = title(kind, results.len());
    if results.is_empty() {
        placeholder(f, area, &title, format!("No {} configured", kind.plural()));
        return;
    }

    let rows: Vec<Row> = results
        .iter()
        .map(|result| {
            let color = status_color(result.status);
            Row::new(vec![
                Cell::from(Span::styled(
                    format!("{} {}", status_symbol(result.status), result.status),
                    Style::default().fg(color),
                )),
                Cell::from(result.name.clone()),
                Cell::from(format_latency(result.response_time_ms)),
                Cell::from(format_uptime(result.uptime_percent)),
                Cell::from(if result.consecutive_failures > 0 {
                    result.consecutive_failures.to_string()
                } else {
                    "-".to_string()
                }),
                Cell::from(result.message.clone()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(12),
        Constraint::Length(20),
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Length(6),
        Constraint::Min(10),
    ];

    let table = Table::new(rows, widths)
        .header(
            Row::new(vec![
                Cell::from("Status"),
                Cell::from("Name"),
                Cell::from("Latency"),
                Cell::from("Uptime"),
                Cell::from("Fails"),
                Cell::from("Message"),
            ])
            .style(Style::default().fg(COLOR_BRAND).add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(title.as_str()).border_style(Style::default().fg(COLOR_BRAND)));

    f.render_widget(Clear, area);
    f.render_widget(table, area);
}
