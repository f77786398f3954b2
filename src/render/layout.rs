//! Layered layout.
//!
//! Columns are BFS depth from the traffic roots, rows keep the snapshot's
//! node order with box members kept adjacent. Deterministic for a given
//! element set, so the same snapshot always lays out the same way.

use std::collections::{HashMap, HashSet, VecDeque};

use super::{RenderElements, Viewport};

/// Cell position of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: u16,
    pub y: u16,
}

/// Output of [`layered`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    /// Node ids per column, left to right.
    pub layers: Vec<Vec<String>>,
    positions: HashMap<String, Position>,
}

impl Layout {
    pub fn position(&self, id: &str) -> Option<Position> {
        self.positions.get(id).copied()
    }

    pub fn layer_of(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|layer| layer.iter().any(|n| n == id))
    }

    /// All laid-out node ids, column by column.
    pub fn ordered(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().flatten().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Lay out every non-box node.
///
/// Box nodes are not positioned; their members share a column band and
/// are drawn inside the box.
pub fn layered(elements: &RenderElements, viewport: Viewport) -> Layout {
    let order: Vec<&str> = elements
        .nodes
        .iter()
        .filter(|n| !n.node.is_box())
        .map(|n| n.node.id.as_str())
        .collect();
    if order.is_empty() {
        return Layout::default();
    }

    let known: HashSet<&str> = order.iter().copied().collect();
    let mut outbound: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut has_inbound: HashSet<&str> = HashSet::new();
    for styled in &elements.edges {
        let (source, target) = (styled.edge.source.as_str(), styled.edge.target.as_str());
        if source == target || !known.contains(source) || !known.contains(target) {
            continue;
        }
        outbound.entry(source).or_default().push(target);
        has_inbound.insert(target);
    }

    let is_root = |id: &str| {
        !has_inbound.contains(id)
            || elements
                .node(id)
                .map(|n| n.node.flags.is_root)
                .unwrap_or(false)
    };

    let mut depth: HashMap<&str, usize> = HashMap::new();
    let mut queue = VecDeque::new();
    for &id in order.iter().filter(|id| is_root(id)) {
        depth.insert(id, 0);
        queue.push_back(id);
    }

    // Cycles with no root get seeded from their first node in input order.
    loop {
        while let Some(id) = queue.pop_front() {
            let next = depth[id] + 1;
            for &target in outbound.get(id).into_iter().flatten() {
                if !depth.contains_key(target) {
                    depth.insert(target, next);
                    queue.push_back(target);
                }
            }
        }
        match order.iter().find(|id| !depth.contains_key(*id)) {
            Some(&seed) => {
                depth.insert(seed, 0);
                queue.push_back(seed);
            }
            None => break,
        }
    }

    let columns = depth.values().max().map_or(1, |d| d + 1);
    let mut layers: Vec<Vec<&str>> = vec![Vec::new(); columns];
    for &id in &order {
        layers[depth[id]].push(id);
    }

    // Keep box members adjacent, ordered by where their group first appears.
    let group_rank: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let group = elements
                .node(id)
                .and_then(|n| n.group.as_deref())
                .unwrap_or(*id);
            (group, i)
        })
        .fold(HashMap::new(), |mut acc, (group, i)| {
            acc.entry(group).or_insert(i);
            acc
        });
    for layer in &mut layers {
        layer.sort_by_key(|id| {
            let group = elements
                .node(id)
                .and_then(|n| n.group.as_deref())
                .unwrap_or(*id);
            group_rank.get(group).copied().unwrap_or(usize::MAX)
        });
    }

    let column_width = (viewport.width / columns as u16).max(1);
    let tallest = layers.iter().map(Vec::len).max().unwrap_or(1).max(1);
    let row_height = (viewport.height / tallest as u16).max(1);

    let mut positions = HashMap::new();
    for (col, layer) in layers.iter().enumerate() {
        for (row, id) in layer.iter().enumerate() {
            positions.insert(
                id.to_string(),
                Position {
                    x: (col as u16).saturating_mul(column_width),
                    y: (row as u16).saturating_mul(row_height),
                },
            );
        }
    }

    Layout {
        layers: layers
            .into_iter()
            .map(|layer| layer.into_iter().map(str::to_string).collect())
            .collect(),
        positions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{normalize, Thresholds};
    use meshwatch_types::GraphPayload;

    fn elements(payload: GraphPayload) -> RenderElements {
        RenderElements::from_graph(&normalize(&payload).graph, &Thresholds::default())
    }

    #[test]
    fn test_columns_follow_depth() {
        let elements = elements(
            GraphPayload::builder()
                .node("gw", |n| n.node_type("app").app("gateway"))
                .node("pp", |n| n.node_type("app").app("productpage"))
                .node("reviews", |n| n.node_type("service").service("reviews"))
                .edge("e1", "gw", "pp", |e| e.http("1", "0"))
                .edge("e2", "pp", "reviews", |e| e.http("1", "0"))
                .build(),
        );

        let layout = layered(&elements, Viewport::new(90, 30));
        assert_eq!(layout.layers, vec![vec!["gw"], vec!["pp"], vec!["reviews"]]);
        assert_eq!(layout.position("reviews"), Some(Position { x: 60, y: 0 }));
    }

    #[test]
    fn test_cycles_terminate() {
        let elements = elements(
            GraphPayload::builder()
                .node("a", |n| n.node_type("app").app("a"))
                .node("b", |n| n.node_type("app").app("b"))
                .edge("ab", "a", "b", |e| e.http("1", "0"))
                .edge("ba", "b", "a", |e| e.http("1", "0"))
                .build(),
        );

        let layout = layered(&elements, Viewport::new(80, 24));
        assert_eq!(layout.layer_of("a"), Some(0));
        assert_eq!(layout.layer_of("b"), Some(1));
    }

    #[test]
    fn test_boxes_are_not_positioned_and_members_stay_together() {
        let elements = elements(
            GraphPayload::builder()
                .node("x", |n| n.node_type("app").app("x").parent("box"))
                .node("lonely", |n| n.node_type("app").app("lonely"))
                .node("y", |n| n.node_type("app").app("y").parent("box"))
                .node("box", |n| n.node_type("box").boxed("app").app("xy"))
                .build(),
        );

        let layout = layered(&elements, Viewport::new(80, 24));
        assert!(layout.position("box").is_none());
        assert_eq!(layout.ordered().collect::<Vec<_>>(), vec!["x", "y", "lonely"]);
    }

    #[test]
    fn test_empty_elements() {
        assert!(layered(&RenderElements::default(), Viewport::new(10, 10)).is_empty());
    }
}
