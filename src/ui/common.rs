//! Common UI components: header bar, status bar and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, GraphState};
use crate::graph::HealthStatus;

/// Render the header bar with the graph scope and edge health overview.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let theme = app.theme();
    let title = Span::styled(" MESHWATCH ", Style::default().add_modifier(Modifier::BOLD));
    let scope = Span::raw(format!("│ {} ", app.query().describe()));

    let Some(graph) = app.graph() else {
        let state = match app.graph_state() {
            GraphState::NoData => "│ No data",
            GraphState::Failed(_) => "│ Unavailable",
            GraphState::Loading | GraphState::Ready(_) => "│ Loading...",
        };
        frame.render_widget(Paragraph::new(Line::from(vec![title, scope, Span::raw(state)])), area);
        return;
    };

    let mut healthy = 0;
    let mut warning = 0;
    let mut critical = 0;
    for styled in &app.renderer().elements().edges {
        match styled.health {
            HealthStatus::Healthy => healthy += 1,
            HealthStatus::Warning => warning += 1,
            HealthStatus::Critical => critical += 1,
        }
    }

    let overall = if critical > 0 {
        HealthStatus::Critical
    } else if warning > 0 {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    };

    let mut spans = vec![
        Span::styled(" ● ", theme.status_style(overall)),
        title,
        scope,
        Span::raw(format!(
            "│ {} nodes {} edges │ ",
            graph.node_count(),
            graph.edge_count()
        )),
        Span::styled(format!("{}", healthy), Style::default().fg(theme.healthy)),
        Span::raw(" ok "),
        if warning > 0 {
            Span::styled(format!("{}", warning), Style::default().fg(theme.warning))
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        },
        Span::raw(" degraded "),
        if critical > 0 {
            Span::styled(
                format!("{}", critical),
                Style::default().fg(theme.critical).add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        },
        Span::raw(" failing "),
    ];

    let warnings = app.report().warnings.len();
    if warnings > 0 {
        spans.push(Span::styled(
            format!("│ {} data warnings", warnings),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the status bar at the bottom.
///
/// Temporary messages win over errors, errors over the key hints.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let theme = app.theme();
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    if let Some(ref err) = app.load_error {
        let paragraph = Paragraph::new(format!(" Error: {} | r:retry q:quit", err))
            .style(Style::default().fg(theme.critical));
        frame.render_widget(paragraph, area);
        return;
    }

    let controls = if app.selection().is_open() {
        "Tab:tab o:in/out Esc:close r:retry ?:help q:quit"
    } else {
        "↑↓:select Enter:open d:window r:refresh e:export ?:help q:quit"
    };
    let status = format!(" {} | {}", app.source_description(), controls);

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let theme = app.theme();
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(" Graph", bold)]),
        Line::from("  ↑/↓ j/k     Move through nodes and edges"),
        Line::from("  Enter       Open the selected entity"),
        Line::from("  click       Open the clicked row"),
        Line::from("  d           Cycle the time window"),
        Line::from(""),
        Line::from(vec![Span::styled(" Detail", bold)]),
        Line::from("  Tab/S-Tab   Next/previous tab"),
        Line::from("  1/2/3       Traffic, Flags, Hosts"),
        Line::from("  o           Inbound/outbound metrics"),
        Line::from("  Esc         Close"),
        Line::from(""),
        Line::from(vec![Span::styled(" General", bold)]),
        Line::from("  r         Retry metrics or refresh graph"),
        Line::from("  e         Export to JSON"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(theme.border_type)
        .border_style(Style::default().fg(theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    let help_width = 48u16.min(area.width.saturating_sub(4));
    let help_height = 22u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
