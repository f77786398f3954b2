//! A renderer with no surface.

use super::{
    layered, GraphRenderer, Layout, RenderElements, RenderError, RenderTheme, TapHandler, TapTarget,
    Viewport,
};

/// Keeps elements and layout in memory and lets callers simulate taps.
#[derive(Default)]
pub struct HeadlessRenderer {
    theme: Option<RenderTheme>,
    elements: RenderElements,
    layout: Layout,
    viewport: Viewport,
    handler: Option<TapHandler>,
    /// Number of layout passes run so far.
    pub layouts: usize,
}

impl std::fmt::Debug for HeadlessRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessRenderer")
            .field("mounted", &self.is_mounted())
            .field("nodes", &self.elements.nodes.len())
            .field("edges", &self.elements.edges.len())
            .field("layouts", &self.layouts)
            .finish()
    }
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mounted(&self) -> bool {
        self.theme.is_some()
    }

    pub fn elements(&self) -> &RenderElements {
        &self.elements
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Simulate a tap on a node. Returns false if the node is not drawn.
    pub fn tap_node(&mut self, id: &str) -> bool {
        let Some(styled) = self.elements.node(id) else {
            return false;
        };
        let target = TapTarget::Node(styled.node.clone());
        self.emit(target)
    }

    /// Simulate a tap on an edge. Returns false if the edge is not drawn.
    pub fn tap_edge(&mut self, id: &str) -> bool {
        let Some(styled) = self.elements.edge(id) else {
            return false;
        };
        let target = TapTarget::Edge(styled.edge.clone());
        self.emit(target)
    }

    fn emit(&mut self, target: TapTarget) -> bool {
        match self.handler {
            Some(ref mut handler) => {
                handler(target);
                true
            }
            None => false,
        }
    }
}

impl GraphRenderer for HeadlessRenderer {
    fn mount(&mut self, theme: &RenderTheme) -> Result<(), RenderError> {
        if self.is_mounted() {
            return Err(RenderError::AlreadyMounted);
        }
        self.theme = Some(theme.clone());
        Ok(())
    }

    fn set_elements(&mut self, elements: RenderElements) -> Result<(), RenderError> {
        if !self.is_mounted() {
            return Err(RenderError::NotMounted);
        }
        self.elements = elements;
        self.layout = layered(&self.elements, self.viewport);
        self.layouts += 1;
        Ok(())
    }

    fn relayout(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        if !self.is_mounted() {
            return Err(RenderError::NotMounted);
        }
        self.viewport = viewport;
        self.layout = layered(&self.elements, viewport);
        self.layouts += 1;
        Ok(())
    }

    fn on_tap(&mut self, handler: TapHandler) {
        self.handler = Some(handler);
    }

    fn unmount(&mut self) {
        self.theme = None;
        self.elements = RenderElements::default();
        self.layout = Layout::default();
        self.handler = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{normalize, Thresholds};
    use meshwatch_types::GraphPayload;
    use std::sync::{Arc, Mutex};

    fn elements() -> RenderElements {
        let payload = GraphPayload::builder()
            .node("a", |n| n.node_type("app").app("a"))
            .node("b", |n| n.node_type("service").service("b"))
            .edge("ab", "a", "b", |e| e.http("1", "0"))
            .build();
        RenderElements::from_graph(&normalize(&payload).graph, &Thresholds::default())
    }

    #[test]
    fn test_lifecycle_errors() {
        let mut renderer = HeadlessRenderer::new();
        assert_eq!(renderer.set_elements(elements()), Err(RenderError::NotMounted));
        renderer.mount(&RenderTheme::dark()).unwrap();
        assert_eq!(renderer.mount(&RenderTheme::dark()), Err(RenderError::AlreadyMounted));

        renderer.set_elements(elements()).unwrap();
        assert_eq!(renderer.layout().layers.len(), 2);

        renderer.unmount();
        assert!(!renderer.is_mounted());
        assert!(renderer.elements().is_empty());
    }

    #[test]
    fn test_tap_invokes_handler_once() {
        let taps = Arc::new(Mutex::new(Vec::new()));
        let sink = taps.clone();

        let mut renderer = HeadlessRenderer::new();
        renderer.mount(&RenderTheme::dark()).unwrap();
        renderer.set_elements(elements()).unwrap();
        renderer.on_tap(Box::new(move |target| sink.lock().unwrap().push(target)));

        assert!(renderer.tap_edge("ab"));
        assert!(renderer.tap_node("b"));
        assert!(!renderer.tap_node("ghost"));

        let taps = taps.lock().unwrap();
        assert_eq!(taps.len(), 2);
        assert!(matches!(taps[0], TapTarget::Edge(ref e) if e.id == "ab"));
        assert_eq!(taps[1].id(), "b");
    }
}
