pub mod dump;
mod lanes;
mod slots;

pub use dump::LayoutDump;
pub use lanes::{Lane, lane_for_node, lane_for_slot, lane_order, type_priority};
pub use slots::{Slot, SlotFamily, classify, clean_statement};

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::LayoutConfig;
use crate::graphutil::relation_maps;
use crate::model::{Graph, Node, NodeType, Point, Severity, Status};

/// Root of the diagram: among goal nodes, the locked one wins, then the
/// first confirmed one, then the best (importance, confidence) rank.
pub fn pick_root_goal(graph: &Graph) -> Option<&Node> {
    let goals: Vec<&Node> = graph
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Goal)
        .collect();
    if goals.is_empty() {
        return None;
    }
    if let Some(locked) = goals.iter().find(|n| n.locked == Some(true)) {
        return Some(locked);
    }
    if let Some(confirmed) = goals.iter().find(|n| n.status == Status::Confirmed) {
        return Some(confirmed);
    }
    let mut best = goals[0];
    for goal in &goals[1..] {
        let lhs = (goal.importance.unwrap_or(0.0), goal.confidence);
        let rhs = (best.importance.unwrap_or(0.0), best.confidence);
        if lhs.partial_cmp(&rhs) == Some(Ordering::Greater) {
            best = goal;
        }
    }
    Some(best)
}

/// Per-node semantic classification: which node is the root, which level
/// each node sits at, and which lane groups it within that level.
#[derive(Debug, Clone)]
pub struct SemanticMeta {
    pub root_id: Option<String>,
    pub levels: BTreeMap<String, u32>,
    pub lanes: BTreeMap<String, Lane>,
    pub slots: BTreeMap<String, Slot>,
}

pub fn derive_semantic_meta(graph: &Graph) -> SemanticMeta {
    let root_id = pick_root_goal(graph).map(|n| n.id.clone());

    let mut slots: BTreeMap<String, Slot> = BTreeMap::new();
    for node in &graph.nodes {
        if let Some(slot) = classify(node) {
            slots.insert(node.id.clone(), slot);
        }
    }
    let primary_ids: BTreeSet<&str> = slots
        .iter()
        .filter(|(_, slot)| slot.family.is_primary())
        .map(|(id, _)| id.as_str())
        .collect();
    let schedule_critical_ids: BTreeSet<&str> = slots
        .iter()
        .filter(|(_, slot)| slot.family.is_schedule_critical())
        .map(|(id, _)| id.as_str())
        .collect();

    let (outgoing, incoming) = relation_maps(&graph.edges);
    let mut levels: BTreeMap<String, u32> = BTreeMap::new();
    let mut lanes: BTreeMap<String, Lane> = BTreeMap::new();

    for node in &graph.nodes {
        let slot = slots.get(&node.id);

        if root_id.as_deref() == Some(node.id.as_str()) {
            levels.insert(node.id.clone(), 0);
            lanes.insert(node.id.clone(), Lane::Goal);
            continue;
        }
        if let Some(slot) = slot {
            if slot.family.is_primary() {
                levels.insert(node.id.clone(), 1);
                lanes.insert(node.id.clone(), lane_for_slot(slot.family));
                continue;
            }
            if slot.family.is_schedule_critical() {
                levels.insert(node.id.clone(), 2);
                lanes.insert(node.id.clone(), lane_for_slot(slot.family));
                continue;
            }
        }

        let out = outgoing.get(&node.id).map(Vec::as_slice).unwrap_or(&[]);
        let inn = incoming.get(&node.id).map(Vec::as_slice).unwrap_or(&[]);
        let to_primary = out
            .iter()
            .any(|&idx| primary_ids.contains(graph.edges[idx].to.as_str()));
        let from_primary = inn
            .iter()
            .any(|&idx| primary_ids.contains(graph.edges[idx].from.as_str()));
        let to_root = root_id
            .as_deref()
            .map(|root| out.iter().any(|&idx| graph.edges[idx].to == root))
            .unwrap_or(false);
        let to_schedule_critical = out
            .iter()
            .any(|&idx| schedule_critical_ids.contains(graph.edges[idx].to.as_str()));

        // Salient facts stay adjacent to the root regardless of raw edge
        // distance; everything else buckets by its relation to them.
        let level = if root_id.is_none() {
            if slot.is_some() { 1 } else { 2 }
        } else if to_primary || to_root || from_primary {
            2
        } else if to_schedule_critical {
            3
        } else {
            3
        };
        levels.insert(node.id.clone(), level);
        lanes.insert(node.id.clone(), lane_for_node(node, slot));
    }

    SemanticMeta {
        root_id,
        levels,
        lanes,
        slots,
    }
}

/// Computes a position for every node. Pinned nodes (the `pins` argument,
/// or a pin persisted in the node's `value.ui`, argument winning) keep
/// their position untouched; free nodes are packed into lane bands.
/// Deterministic: identical graph content and pin set yield an identical
/// map.
pub fn compute_layout(
    graph: &Graph,
    pins: &BTreeMap<String, Point>,
    config: &LayoutConfig,
) -> BTreeMap<String, Point> {
    let meta = derive_semantic_meta(graph);
    let mut positions: BTreeMap<String, Point> = BTreeMap::new();
    let mut pinned: BTreeSet<String> = BTreeSet::new();

    for node in &graph.nodes {
        if let Some(pin) = pins.get(&node.id).copied().or_else(|| node.pin()) {
            positions.insert(node.id.clone(), pin);
            pinned.insert(node.id.clone());
        }
    }

    if let Some(root) = meta.root_id.as_deref() {
        positions
            .entry(root.to_string())
            .or_insert(Point::new(config.root_x, config.root_y));
    }

    // Undirected adjacency for the cluster-near-neighbors ordering rule.
    let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in &graph.edges {
        adjacency.entry(&edge.from).or_default().push(&edge.to);
        adjacency.entry(&edge.to).or_default().push(&edge.from);
    }

    let start_level = if meta.root_id.is_some() { 1 } else { 0 };
    let max_level = meta
        .levels
        .values()
        .copied()
        .max()
        .unwrap_or(start_level);

    for level in start_level..=max_level {
        let level_nodes: Vec<&Node> = graph
            .nodes
            .iter()
            .filter(|n| {
                meta.levels.get(&n.id).copied() == Some(level)
                    && meta.root_id.as_deref() != Some(n.id.as_str())
            })
            .collect();
        if level_nodes.is_empty() {
            continue;
        }

        let mut by_lane: BTreeMap<Lane, Vec<&Node>> = BTreeMap::new();
        for node in level_nodes {
            let lane = meta.lanes.get(&node.id).copied().unwrap_or(Lane::Other);
            by_lane.entry(lane).or_default().push(node);
        }

        let mut ordered_lanes: Vec<Lane> = lane_order(level)
            .iter()
            .copied()
            .filter(|lane| by_lane.contains_key(lane))
            .collect();
        for lane in by_lane.keys() {
            if !ordered_lanes.contains(lane) {
                ordered_lanes.push(*lane);
            }
        }

        let mut lane_cursor = 0usize;
        for lane in ordered_lanes {
            let members = by_lane.get(&lane).map(Vec::as_slice).unwrap_or(&[]);
            let free: Vec<&Node> = members
                .iter()
                .copied()
                .filter(|n| !pinned.contains(&n.id))
                .collect();
            if free.is_empty() {
                continue;
            }

            let mut ranked: Vec<(f32, u8, f64, u8, String, &Node)> = free
                .iter()
                .map(|node| {
                    let neighbor_y = average_neighbor_y(&node.id, &adjacency, &positions)
                        .unwrap_or(config.root_y);
                    (
                        neighbor_y,
                        Severity::score(node.severity),
                        node.importance.unwrap_or(0.0),
                        type_priority(node.node_type),
                        clean_statement(&node.statement),
                        *node,
                    )
                })
                .collect();
            ranked.sort_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.1.cmp(&a.1))
                    .then_with(|| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal))
                    .then_with(|| a.3.cmp(&b.3))
                    .then_with(|| a.4.cmp(&b.4))
            });

            let rows = config.max_rows_per_column.max(1);
            let columns = ranked.len().div_ceil(rows);
            for col in 0..columns {
                let chunk = &ranked[col * rows..(col * rows + rows).min(ranked.len())];
                let x = config.root_x
                    + level as f32 * config.level_gap
                    + (lane_cursor + col) as f32 * config.lane_gap;
                let y_start = config.root_y - ((chunk.len() - 1) as f32 * config.row_gap) / 2.0;
                for (row, entry) in chunk.iter().enumerate() {
                    positions.insert(
                        entry.5.id.clone(),
                        Point::new(x, y_start + row as f32 * config.row_gap),
                    );
                }
            }
            lane_cursor += columns;
        }
    }

    // Nothing leaves the layout unpositioned.
    let (fallback_x, fallback_y) = config.fallback_position();
    for node in &graph.nodes {
        positions
            .entry(node.id.clone())
            .or_insert(Point::new(fallback_x, fallback_y));
    }

    positions
}

fn average_neighbor_y(
    node_id: &str,
    adjacency: &BTreeMap<&str, Vec<&str>>,
    positions: &BTreeMap<String, Point>,
) -> Option<f32> {
    let neighbors = adjacency.get(node_id)?;
    let mut total = 0.0f32;
    let mut count = 0usize;
    for neighbor in neighbors {
        if let Some(point) = positions.get(*neighbor) {
            total += point.y;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some(total / count as f32)
}
