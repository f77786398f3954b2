//! Topology list rendering.
//!
//! Shows the terminal renderer's rows: nodes column by column, each
//! followed by its outbound edges. Box members carry their box's title.

use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::app::{App, GraphState};
use crate::render::{RenderElements, RenderTheme, Row};

/// First visible row so that `cursor` stays on screen.
pub fn scroll_offset(cursor: usize, visible: usize) -> usize {
    if visible == 0 {
        return cursor;
    }
    cursor.saturating_sub(visible - 1)
}

/// Render the topology pane.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let theme = app.theme();
    let block = Block::default()
        .title(format!(" {} ", app.query().describe()))
        .borders(Borders::ALL)
        .border_type(theme.border_type)
        .border_style(Style::default().fg(theme.border));

    let message = match app.graph_state() {
        GraphState::Loading => Some(Line::from(Span::styled(
            "Loading graph...",
            Style::default().add_modifier(Modifier::DIM),
        ))),
        GraphState::NoData => Some(Line::from(Span::styled(
            "No graph data for this scope",
            Style::default().add_modifier(Modifier::DIM),
        ))),
        GraphState::Failed(err) => Some(Line::from(vec![
            Span::styled(format!("Error: {}", err), Style::default().fg(theme.critical)),
            Span::styled("  (r to retry)", Style::default().add_modifier(Modifier::DIM)),
        ])),
        GraphState::Ready(_) => None,
    };
    if let Some(message) = message {
        let paragraph = Paragraph::new(vec![Line::from(""), message])
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let renderer = app.renderer();
    let elements = renderer.elements();
    let selected_id = app.selection().view().target_id;

    let items: Vec<ListItem> = renderer
        .rows()
        .iter()
        .map(|row| {
            let open = selected_id.as_deref() == Some(row.id());
            ListItem::new(row_line(row, elements, theme, open))
        })
        .collect();

    let visible = area.height.saturating_sub(2) as usize;
    let mut state = ListState::default()
        .with_selected(Some(renderer.cursor()))
        .with_offset(scroll_offset(renderer.cursor(), visible));

    let list = List::new(items)
        .block(block)
        .highlight_style(theme.selected)
        .highlight_symbol("▶ ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn row_line<'a>(
    row: &Row,
    elements: &'a RenderElements,
    theme: &RenderTheme,
    open: bool,
) -> Line<'a> {
    let emphasis = if open {
        Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    } else {
        Style::default()
    };

    match row {
        Row::Node(id, layer) => {
            let Some(styled) = elements.node(id) else {
                return Line::from(id.clone());
            };
            let title = if styled.title.is_empty() {
                styled.node.display_name.clone()
            } else {
                styled.title.clone()
            };
            let mut name_style = emphasis;
            if styled.dimmed {
                name_style = name_style.add_modifier(Modifier::DIM);
            }

            let mut spans = vec![
                Span::styled(format!("{:>2} ", layer), Style::default().add_modifier(Modifier::DIM)),
                Span::styled(styled.health.symbol(), theme.status_style(styled.health)),
                Span::raw(" "),
                Span::styled(
                    format!("[{}]", styled.badge.as_str()),
                    Style::default().fg(theme.badge_color(styled.badge)),
                ),
                Span::raw(" "),
                Span::styled(title, name_style),
            ];
            if !styled.node.namespace.is_empty() {
                spans.push(Span::styled(
                    format!("  {}", styled.node.namespace),
                    Style::default().add_modifier(Modifier::DIM),
                ));
            }
            if let Some(group) = styled.group.as_deref().and_then(|g| elements.node(g)) {
                spans.push(Span::styled(
                    format!("  in {}", group.title),
                    Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
                ));
            }
            let flags = styled.node.flags.labels();
            if !flags.is_empty() {
                spans.push(Span::styled(
                    format!("  {}", flags.join(", ")),
                    Style::default().fg(theme.warning),
                ));
            }
            Line::from(spans)
        }
        Row::Edge(id) => {
            let Some(styled) = elements.edge(id) else {
                return Line::from(id.clone());
            };
            let target = elements
                .node(&styled.edge.target)
                .map(|n| n.node.display_name.clone())
                .unwrap_or_else(|| styled.edge.target.clone());
            let color = theme.edge_color(styled.protocol, styled.health);
            Line::from(vec![
                Span::raw("      "),
                Span::styled("└─▶ ", Style::default().fg(color)),
                Span::styled(target, emphasis),
                Span::raw("  "),
                Span::styled(styled.label.clone(), Style::default().fg(color)),
            ])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_offset_keeps_cursor_visible() {
        assert_eq!(scroll_offset(0, 10), 0);
        assert_eq!(scroll_offset(9, 10), 0);
        assert_eq!(scroll_offset(10, 10), 1);
        assert_eq!(scroll_offset(25, 10), 16);
        assert_eq!(scroll_offset(3, 0), 3);
    }
}
