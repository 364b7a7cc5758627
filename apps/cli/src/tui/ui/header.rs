use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Clear, Paragraph};

use super::{COLOR_BRAND, COLOR_ERROR, COLOR_LABEL, COLOR_MUTED, COLOR_SUCCESS, COLOR_WARNING};
use crate::report::format_elapsed;
use crate::tui::state::{DashboardState, Phase};

pub fn render(f: &mut Frame, area: Rect, state: &DashboardState) {
    // Row 1: brand + aggregate counts
    let mut summary_spans = vec![Span::styled(
        "opsmon ",
        Style::default().fg(COLOR_BRAND).add_modifier(Modifier::BOLD),
    )];

    if let Some(refresh) = &state.last_refresh {
        let summary = &refresh.summary;
        let percent_color = if summary.health_percent >= 100.0 {
            COLOR_SUCCESS
        } else if summary.health_percent >= 50.0 {
            COLOR_WARNING
        } else {
            COLOR_ERROR
        };

        summary_spans.push(Span::styled(format!(" {} total ", summary.total), Style::default().fg(COLOR_LABEL)));
        summary_spans.push(Span::styled(format!(" {} healthy ", summary.healthy), Style::default().fg(COLOR_SUCCESS)));
        summary_spans.push(Span::styled(format!(" {} unhealthy ", summary.unhealthy), Style::default().fg(COLOR_ERROR)));
        summary_spans.push(Span::styled(format!(" {} degraded ", summary.degraded), Style::default().fg(COLOR_WARNING)));
        summary_spans.push(Span::styled(
            format!(" {} unknown ", summary.unknown + summary.checking),
            Style::default().fg(COLOR_MUTED),
        ));
        summary_spans.push(Span::styled(
            format!(" {:.1}% healthy", summary.health_percent),
            Style::default().fg(percent_color).add_modifier(Modifier::BOLD),
        ));
    } else {
        summary_spans.push(Span::styled(" waiting for first check", Style::default().fg(COLOR_MUTED)));
    }

    // Row 2: loop status
    let mut status_spans = vec![
        Span::styled(format!("tick {} ", state.ticks), Style::default().fg(COLOR_LABEL)),
        Span::styled(format!("| up {} ", format_elapsed(state.uptime())), Style::default().fg(COLOR_LABEL)),
        Span::styled(format!("| every {}s ", state.interval.as_secs()), Style::default().fg(COLOR_MUTED)),
    ];
    if let Some(checked) = state.last_checked {
        status_spans.push(Span::styled(
            format!("| last check {} ", checked.format("%H:%M:%S")),
            Style::default().fg(COLOR_MUTED),
        ));
    }
    if state.phase == Phase::Checking {
        status_spans.push(Span::styled("| checking...", Style::default().fg(COLOR_WARNING)));
    }

    let header = Paragraph::new(vec![Line::from(summary_spans), Line::from(""), Line::from(status_spans)]);

    f.render_widget(Clear, area);
    f.render_widget(header, area);
}
