//! Terminal renderer.
//!
//! Flattens the layered layout into a scrollable list of rows: each node
//! followed by its outbound edges. The ratatui widgets in `ui::topology`
//! draw those rows; this type owns the cursor and turns Enter or a mouse
//! click into a tap.

use super::{
    layered, GraphRenderer, Layout, RenderElements, RenderError, RenderTheme, TapHandler, TapTarget,
    Viewport,
};

/// One line of the topology list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    /// Node id and its layout column.
    Node(String, usize),
    /// Edge id.
    Edge(String),
}

impl Row {
    pub fn id(&self) -> &str {
        match self {
            Row::Node(id, _) | Row::Edge(id) => id,
        }
    }
}

#[derive(Default)]
pub struct TerminalRenderer {
    theme: Option<RenderTheme>,
    elements: RenderElements,
    layout: Layout,
    viewport: Viewport,
    rows: Vec<Row>,
    cursor: usize,
    handler: Option<TapHandler>,
}

impl std::fmt::Debug for TerminalRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalRenderer")
            .field("mounted", &self.theme.is_some())
            .field("rows", &self.rows.len())
            .field("cursor", &self.cursor)
            .field("viewport", &self.viewport)
            .finish()
    }
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn elements(&self) -> &RenderElements {
        &self.elements
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Theme given at mount, or dark when unmounted.
    pub fn theme(&self) -> RenderTheme {
        self.theme.clone().unwrap_or_else(RenderTheme::dark)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected_row(&self) -> Option<&Row> {
        self.rows.get(self.cursor)
    }

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.cursor + 1 < self.rows.len() {
            self.cursor += 1;
        }
    }

    /// Put the cursor on a row, e.g. from a mouse click. Out-of-range
    /// indexes are ignored.
    pub fn select_row(&mut self, index: usize) -> bool {
        if index < self.rows.len() {
            self.cursor = index;
            true
        } else {
            false
        }
    }

    /// Move the cursor to the row for an entity id, if drawn.
    pub fn focus(&mut self, id: &str) -> bool {
        match self.rows.iter().position(|row| row.id() == id) {
            Some(index) => {
                self.cursor = index;
                true
            }
            None => false,
        }
    }

    /// Tap the row under the cursor. Returns false with no handler or rows.
    pub fn tap_selected(&mut self) -> bool {
        let target = match self.rows.get(self.cursor) {
            Some(Row::Node(id, _)) => self
                .elements
                .node(id)
                .map(|styled| TapTarget::Node(styled.node.clone())),
            Some(Row::Edge(id)) => self
                .elements
                .edge(id)
                .map(|styled| TapTarget::Edge(styled.edge.clone())),
            None => None,
        };
        match (target, self.handler.as_mut()) {
            (Some(target), Some(handler)) => {
                handler(target);
                true
            }
            _ => false,
        }
    }

    fn rebuild_rows(&mut self) {
        let previous = self.selected_row().map(|row| row.id().to_string());

        let mut rows = Vec::with_capacity(self.elements.nodes.len() + self.elements.edges.len());
        for (layer, ids) in self.layout.layers.iter().enumerate() {
            for id in ids {
                rows.push(Row::Node(id.clone(), layer));
                rows.extend(
                    self.elements
                        .edges
                        .iter()
                        .filter(|styled| &styled.edge.source == id)
                        .map(|styled| Row::Edge(styled.edge.id.clone())),
                );
            }
        }
        self.rows = rows;

        // Keep the cursor on the same entity across refreshes.
        let restored = previous.is_some_and(|id| self.focus(&id));
        if !restored {
            self.cursor = self.cursor.min(self.rows.len().saturating_sub(1));
        }
    }
}

impl GraphRenderer for TerminalRenderer {
    fn mount(&mut self, theme: &RenderTheme) -> Result<(), RenderError> {
        if self.theme.is_some() {
            return Err(RenderError::AlreadyMounted);
        }
        self.theme = Some(theme.clone());
        Ok(())
    }

    fn set_elements(&mut self, elements: RenderElements) -> Result<(), RenderError> {
        if self.theme.is_none() {
            return Err(RenderError::NotMounted);
        }
        self.elements = elements;
        self.layout = layered(&self.elements, self.viewport);
        self.rebuild_rows();
        Ok(())
    }

    fn relayout(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        if self.theme.is_none() {
            return Err(RenderError::NotMounted);
        }
        self.viewport = viewport;
        self.layout = layered(&self.elements, viewport);
        self.rebuild_rows();
        Ok(())
    }

    fn on_tap(&mut self, handler: TapHandler) {
        self.handler = Some(handler);
    }

    fn unmount(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{normalize, Thresholds};
    use meshwatch_types::GraphPayload;
    use std::sync::mpsc;

    fn mounted() -> TerminalRenderer {
        let payload = GraphPayload::builder()
            .node("pp", |n| n.node_type("app").app("productpage"))
            .node("reviews", |n| n.node_type("service").service("reviews"))
            .node("details", |n| n.node_type("service").service("details"))
            .edge("e1", "pp", "reviews", |e| e.http("3", "0"))
            .edge("e2", "pp", "details", |e| e.http("1", "0"))
            .build();
        let elements =
            RenderElements::from_graph(&normalize(&payload).graph, &Thresholds::default());

        let mut renderer = TerminalRenderer::new();
        renderer.mount(&RenderTheme::dark()).unwrap();
        renderer.relayout(Viewport::new(80, 24)).unwrap();
        renderer.set_elements(elements).unwrap();
        renderer
    }

    #[test]
    fn test_rows_list_node_then_outbound_edges() {
        let renderer = mounted();
        assert_eq!(
            renderer.rows(),
            &[
                Row::Node("pp".into(), 0),
                Row::Edge("e1".into()),
                Row::Edge("e2".into()),
                Row::Node("reviews".into(), 1),
                Row::Node("details".into(), 1),
            ]
        );
    }

    #[test]
    fn test_tap_selected_emits_target() {
        let (tx, rx) = mpsc::channel();
        let mut renderer = mounted();
        renderer.on_tap(Box::new(move |target| {
            let _ = tx.send(target);
        }));

        renderer.move_down();
        assert!(renderer.tap_selected());
        assert_eq!(rx.try_recv().unwrap().id(), "e1");
        assert!(rx.try_recv().is_err());

        assert!(renderer.select_row(4));
        assert!(!renderer.select_row(40));
        renderer.move_down();
        assert_eq!(renderer.cursor(), 4);
        assert!(renderer.tap_selected());
        assert!(matches!(rx.try_recv().unwrap(), TapTarget::Node(n) if n.id == "details"));
    }

    #[test]
    fn test_cursor_follows_entity_across_refresh() {
        let mut renderer = mounted();
        assert!(renderer.focus("details"));

        let payload = GraphPayload::builder()
            .node("details", |n| n.node_type("service").service("details"))
            .build();
        let elements =
            RenderElements::from_graph(&normalize(&payload).graph, &Thresholds::default());
        renderer.set_elements(elements).unwrap();

        assert_eq!(renderer.selected_row(), Some(&Row::Node("details".into(), 0)));
    }

    #[test]
    fn test_unmount_resets() {
        let mut renderer = mounted();
        renderer.unmount();
        assert!(renderer.rows().is_empty());
        assert_eq!(
            renderer.set_elements(RenderElements::default()),
            Err(RenderError::NotMounted)
        );
    }
}
