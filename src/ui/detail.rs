//! Detail drawer rendering.
//!
//! Shown beside the topology list while a selection is open. The tab bar
//! mirrors the selection's active tab; the metrics section below it shows
//! whatever state the metrics coordinator is in.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Tabs},
    Frame,
};

use crate::app::App;
use crate::duration::format_duration;
use crate::graph::{
    classify, classify_id, edge_summary, flags, node_traffic, Edge, Node, TopologyGraph,
    TrafficSummary,
};
use crate::metrics::{Direction, MetricsPanel, MetricsSeries};
use crate::render::{format_bytes, RenderTheme};
use crate::selection::{DetailTab, EntityRef};

/// Sparkline characters (8 levels of height).
const SPARKLINE_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render the drawer for the open selection.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let theme = app.theme();
    let (Some(target), Some(tab), Some(graph)) =
        (app.selection().target(), app.selection().active_tab(), app.graph())
    else {
        return;
    };

    let (title, body) = match target.entity {
        EntityRef::Node(ref id) => match graph.node(id) {
            Some(node) => (node_title(node), node_tab(node, graph, tab, theme)),
            None => return,
        },
        EntityRef::Edge(ref id) => match graph.edge(id) {
            Some(edge) => (edge_title(edge, graph), edge_tab(edge, tab, theme)),
            None => return,
        },
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(theme.border_type)
        .border_style(Style::default().fg(theme.highlight));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([
        Constraint::Length(1),      // Tabs
        Constraint::Percentage(55), // Tab content
        Constraint::Min(3),         // Metrics
    ])
    .split(inner);

    let titles: Vec<Line> = DetailTab::ALL
        .iter()
        .enumerate()
        .map(|(i, t)| Line::from(format!(" {}:{} ", i + 1, t.title())))
        .collect();
    let tabs = Tabs::new(titles)
        .select(tab.index())
        .style(theme.tab_inactive)
        .highlight_style(theme.tab_active)
        .divider("|");
    frame.render_widget(tabs, chunks[0]);

    match body {
        TabBody::Lines(lines) => frame.render_widget(Paragraph::new(lines), chunks[1]),
        TabBody::Table(table) => frame.render_widget(table, chunks[1]),
    }

    render_metrics(frame, app, chunks[2]);
}

enum TabBody<'a> {
    Lines(Vec<Line<'a>>),
    Table(Table<'a>),
}

fn node_title(node: &Node) -> String {
    let classification = classify(node);
    let title = if classification.title.is_empty() {
        node.display_name.clone()
    } else {
        classification.title
    };
    format!(" [{}] {} ", classification.badge.as_str(), title)
}

fn edge_title(edge: &Edge, graph: &TopologyGraph) -> String {
    let endpoint = |id: &str| {
        let classification = classify_id(graph, id);
        let title = match graph.node(id) {
            Some(node) if classification.title.is_empty() => node.display_name.clone(),
            None => id.to_string(),
            Some(_) => classification.title,
        };
        format!("[{}] {}", classification.badge.as_str(), title)
    };
    format!(
        " {} → {} ({}) ",
        endpoint(&edge.source),
        endpoint(&edge.target),
        edge.protocol()
    )
}

fn dim(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::styled(
        text.into(),
        Style::default().add_modifier(Modifier::DIM),
    ))
}

fn node_tab<'a>(
    node: &Node,
    graph: &TopologyGraph,
    tab: DetailTab,
    theme: &RenderTheme,
) -> TabBody<'a> {
    match tab {
        DetailTab::Traffic => {
            let traffic = node_traffic(graph, node);
            let rows = [
                ("In HTTP", &traffic.inbound.http),
                ("In gRPC", &traffic.inbound.grpc),
                ("Out HTTP", &traffic.outbound.http),
                ("Out gRPC", &traffic.outbound.grpc),
            ];
            if rows.iter().all(|(_, s)| s.is_empty()) {
                return TabBody::Lines(vec![dim("No request traffic")]);
            }
            let rows: Vec<Row> = rows
                .iter()
                .filter(|(_, s)| !s.is_empty())
                .map(|(label, summary)| traffic_row(*label, summary, theme))
                .collect();
            TabBody::Table(traffic_table(rows, theme))
        }
        DetailTab::Flags => {
            let labels = flags(node);
            if labels.is_empty() {
                return TabBody::Lines(vec![dim("No flags")]);
            }
            TabBody::Lines(
                labels
                    .into_iter()
                    .map(|label| {
                        Line::from(vec![
                            Span::styled(" ● ", Style::default().fg(theme.warning)),
                            Span::raw(label),
                        ])
                    })
                    .collect(),
            )
        }
        DetailTab::Hosts => {
            let hosts = node
                .service_entry
                .as_ref()
                .map(|se| se.hosts.clone())
                .unwrap_or_default();
            if hosts.is_empty() {
                return TabBody::Lines(vec![dim("No hosts")]);
            }
            let mut lines: Vec<Line> =
                hosts.into_iter().map(|h| Line::from(format!(" {}", h))).collect();
            if let Some(location) = node.service_entry.as_ref().and_then(|se| se.location.clone()) {
                lines.push(dim(format!(" location: {}", location)));
            }
            TabBody::Lines(lines)
        }
    }
}

fn traffic_row<'a>(label: &'a str, summary: &TrafficSummary, theme: &RenderTheme) -> Row<'a> {
    Row::new(vec![
        Cell::from(label),
        Cell::from(summary.edge_count.to_string()),
        Cell::from(format!("{:.2}", summary.total_rate)),
        Cell::from(format!("{:.1}%", summary.aggregate_error_pct)).style(
            if summary.aggregate_error_pct > 0.0 {
                Style::default().fg(theme.warning)
            } else {
                Style::default()
            },
        ),
    ])
}

fn traffic_table<'a>(rows: Vec<Row<'a>>, theme: &RenderTheme) -> Table<'a> {
    let header = Row::new(vec!["", "Edges", "rps", "Err"])
        .height(1)
        .style(theme.header);
    Table::new(
        rows,
        [
            Constraint::Length(9),
            Constraint::Length(6),
            Constraint::Length(10),
            Constraint::Fill(1),
        ],
    )
    .header(header)
}

fn edge_tab<'a>(edge: &Edge, tab: DetailTab, theme: &RenderTheme) -> TabBody<'a> {
    let summary = edge_summary(edge);
    match tab {
        DetailTab::Traffic => {
            let mut lines = Vec::new();
            let bold = Style::default().add_modifier(Modifier::BOLD);
            let figure = |label: &'static str, value: String| {
                Line::from(vec![Span::raw(format!(" {:<14}", label)), Span::styled(value, bold)])
            };
            if summary.protocol.is_request_based() {
                lines.push(figure(
                    "Rate",
                    summary.rate.map_or("-".to_string(), |r| format!("{:.2} rps", r)),
                ));
                lines.push(figure(
                    "Success",
                    summary.success_pct.map_or("-".to_string(), |p| format!("{:.1}%", p)),
                ));
                lines.push(figure(
                    "Error",
                    summary.error_pct.map_or("-".to_string(), |p| format!("{:.1}%", p)),
                ));
            }
            if let Some(ms) = edge.response_time_ms {
                lines.push(figure(
                    "Response time",
                    format_duration(std::time::Duration::from_secs_f64(ms.max(0.0) / 1000.0)),
                ));
            }
            if let Some(bytes) = edge.throughput {
                lines.push(figure("Throughput", format_bytes(bytes)));
            }
            if let Some(pct) = edge.mtls_pct {
                lines.push(figure("mTLS", format!("{:.0}%", pct)));
            }
            if lines.is_empty() {
                lines.push(dim("No traffic figures"));
            }
            TabBody::Lines(lines)
        }
        DetailTab::Flags => {
            if summary.flag_rows.is_empty() {
                return TabBody::Lines(vec![dim("No response flags")]);
            }
            let rows: Vec<Row> = summary
                .flag_rows
                .into_iter()
                .map(|r| Row::new(vec![r.code, r.flag, format!("{:.1}%", r.pct)]))
                .collect();
            TabBody::Table(breakdown_table(rows, "Flag", theme))
        }
        DetailTab::Hosts => {
            if summary.host_rows.is_empty() {
                return TabBody::Lines(vec![dim("No hosts")]);
            }
            let rows: Vec<Row> = summary
                .host_rows
                .into_iter()
                .map(|r| Row::new(vec![r.code, r.host, format!("{:.1}%", r.pct)]))
                .collect();
            TabBody::Table(breakdown_table(rows, "Host", theme))
        }
    }
}

fn breakdown_table<'a>(rows: Vec<Row<'a>>, column: &'a str, theme: &RenderTheme) -> Table<'a> {
    let header = Row::new(vec!["Code", column, "%"]).height(1).style(theme.header);
    Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Fill(1),
            Constraint::Length(8),
        ],
    )
    .header(header)
}

fn render_metrics(frame: &mut Frame, app: &App, area: Rect) {
    let theme = app.theme();
    let direction = match app.direction() {
        Direction::Inbound => "inbound",
        Direction::Outbound => "outbound",
    };
    let is_node = matches!(
        app.selection().target().map(|t| &t.entity),
        Some(EntityRef::Node(_))
    );
    let title = if is_node {
        format!(" Metrics ({}) ", direction)
    } else {
        " Metrics ".to_string()
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::TOP)
        .border_style(Style::default().fg(theme.border));

    let lines: Vec<Line> = match app.metrics_panel() {
        None => vec![dim(" No metrics endpoint configured")],
        Some(MetricsPanel::Idle) => Vec::new(),
        Some(MetricsPanel::Unavailable(reason)) => vec![dim(format!(" No metrics: {}", reason))],
        Some(MetricsPanel::Loading(_)) => vec![dim(" Loading metrics...")],
        Some(MetricsPanel::NoData) => vec![dim(" No data")],
        Some(MetricsPanel::Failed(err)) => vec![Line::from(vec![
            Span::styled(format!(" Error: {}", err), Style::default().fg(theme.critical)),
            Span::styled("  (r to retry)", Style::default().add_modifier(Modifier::DIM)),
        ])],
        Some(MetricsPanel::Ready(series)) => {
            let width = area.width.saturating_sub(36).max(8) as usize;
            series.iter().map(|s| series_line(s, width, theme)).collect()
        }
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn series_line<'a>(series: &MetricsSeries, width: usize, theme: &RenderTheme) -> Line<'a> {
    let latest = series
        .latest()
        .map_or("-".to_string(), |v| format!("{:.2}", v));
    Line::from(vec![
        Span::raw(format!(" {:<20.20} ", series.name)),
        Span::styled(sparkline(&series.values(), width), Style::default().fg(theme.highlight)),
        Span::styled(format!(" {}", latest), Style::default().add_modifier(Modifier::BOLD)),
    ])
}

/// Render the last `width` values as sparkline characters scaled to
/// their own min and max.
fn sparkline(values: &[f64], width: usize) -> String {
    if values.is_empty() {
        return " ".repeat(width.min(8));
    }
    let tail = &values[values.len().saturating_sub(width)..];
    let max = tail.iter().copied().fold(f64::MIN, f64::max);
    let min = tail.iter().copied().fold(f64::MAX, f64::min);
    let range = max - min;

    tail.iter()
        .map(|&v| {
            let level = if range > 0.0 {
                ((v - min) / range * 7.0) as usize
            } else {
                0
            };
            SPARKLINE_CHARS[level.min(7)]
        })
        .collect()
}
