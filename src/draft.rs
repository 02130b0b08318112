use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::graphutil::{clamp01, generate_id, reachable};
use crate::layout::compute_layout;
use crate::model::{
    BRIDGE_CONFIDENCE_FALLBACK, EDGE_CONFIDENCE_FALLBACK, Edge, EdgeType, Graph,
    IMPORTANCE_FALLBACK, NEW_NODE_CONFIDENCE, NEW_NODE_IMPORTANCE, NODE_CONFIDENCE_FALLBACK,
    Node, NodeLayer, NodeType, Point, Severity, Status, Strength,
};
use crate::normalize::normalize;

const NEW_NODE_STATEMENT: &str = "New node";
// Seed position when the draft has nothing on canvas yet.
const SPAWN_ORIGIN: Point = Point { x: 120.0, y: 120.0 };

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub node_id: Option<String>,
    pub edge_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveOptions {
    #[serde(rename = "requestAdvice", skip_serializing_if = "std::ops::Not::not", default)]
    pub request_advice: bool,
    #[serde(rename = "advicePrompt", skip_serializing_if = "Option::is_none", default)]
    pub advice_prompt: Option<String>,
}

/// Error contract of the persistence boundary. The engine never produces
/// these itself; the external save operation reports them and the draft is
/// left exactly as it was.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("graph backend rejected the save: {0}")]
    Rejected(String),
    #[error("graph backend unreachable: {0}")]
    Transport(String),
}

/// The external collaborator that persists drafts. The response value is
/// the backend's reply object; if it carries a `graph`, the engine
/// re-normalizes it into the new baseline.
pub trait GraphBackend {
    fn save(&mut self, graph: &Graph, options: &SaveOptions) -> Result<Value, SaveError>;
}

/// Captures the edit epoch at the moment a save starts, so a save
/// completing after further local edits does not falsely clear `dirty`.
#[derive(Debug, Clone, Copy)]
pub struct SaveTicket {
    epoch: u64,
}

/// Partial node update. Inner `Option`s distinguish "set to none" from
/// "leave untouched" for the clearable fields.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub node_type: Option<NodeType>,
    pub layer: Option<Option<NodeLayer>>,
    pub strength: Option<Option<Strength>>,
    pub statement: Option<String>,
    pub status: Option<Status>,
    pub confidence: Option<f64>,
    pub importance: Option<Option<f64>>,
    pub severity: Option<Option<Severity>>,
    pub locked: Option<bool>,
    pub value: Option<ValuePatch>,
    pub tags: Option<Vec<String>>,
}

/// Opaque `value` updates arrive either as already-structured data or as
/// raw text from an editor field.
#[derive(Debug, Clone)]
pub enum ValuePatch {
    Text(String),
    Data(Value),
}

/// Single owner of the editable graph. Every mutation is synchronous and
/// total; each one marks the draft dirty and recomputes the position map,
/// except pure selection changes.
#[derive(Debug, Clone)]
pub struct DraftState {
    draft: Graph,
    positions: BTreeMap<String, Point>,
    selection: Selection,
    dirty: bool,
    epoch: u64,
    config: Config,
}

impl DraftState {
    /// Builds a draft from an untrusted payload; normalization happens
    /// here so no other method ever sees an invalid graph.
    pub fn new(payload: &Value, config: Config) -> Self {
        Self::with_graph(normalize(payload), config)
    }

    pub fn with_graph(graph: Graph, config: Config) -> Self {
        let positions = compute_layout(&graph, &BTreeMap::new(), &config.layout);
        Self {
            draft: graph,
            positions,
            selection: Selection::default(),
            dirty: false,
            epoch: 0,
            config,
        }
    }

    pub fn draft(&self) -> &Graph {
        &self.draft
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Positions for every node in the current draft, pins included.
    pub fn positions(&self) -> &BTreeMap<String, Point> {
        &self.positions
    }

    pub fn select_node(&mut self, id: &str) {
        if self.draft.node(id).is_some() {
            self.selection = Selection {
                node_id: Some(id.to_string()),
                edge_id: None,
            };
        }
    }

    pub fn select_edge(&mut self, id: &str) {
        if self.draft.edges.iter().any(|e| e.id == id) {
            self.selection = Selection {
                node_id: None,
                edge_id: Some(id.to_string()),
            };
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::default();
    }

    /// Merges fields into the matching node. Confidence and importance are
    /// re-clamped; a textual `value` that parses as JSON/JSON5 is stored
    /// structured, anything else is kept as the raw text.
    pub fn patch_node(&mut self, id: &str, patch: NodePatch) -> bool {
        let Some(node) = self.draft.node_mut(id) else {
            return false;
        };
        if let Some(node_type) = patch.node_type {
            node.node_type = node_type;
        }
        if let Some(layer) = patch.layer {
            node.layer = layer;
        }
        if let Some(strength) = patch.strength {
            node.strength = strength;
        }
        if let Some(statement) = patch.statement {
            node.statement = statement;
        }
        if let Some(status) = patch.status {
            node.status = status;
        }
        if let Some(confidence) = patch.confidence {
            node.confidence = clamp01(confidence, NODE_CONFIDENCE_FALLBACK);
        }
        if let Some(importance) = patch.importance {
            node.importance = importance.map(|v| clamp01(v, IMPORTANCE_FALLBACK));
        }
        if let Some(severity) = patch.severity {
            node.severity = severity;
        }
        if let Some(locked) = patch.locked {
            node.locked = Some(locked);
        }
        if let Some(tags) = patch.tags {
            node.tags = Some(tags);
        }
        if let Some(value) = patch.value {
            // The pin rides inside `value`; carry it across the update so
            // editing the payload never unpins the node.
            let pin = node.pin();
            node.value = match value {
                ValuePatch::Data(data) => Some(data),
                ValuePatch::Text(text) => parse_value_text(&text),
            };
            if let (Some(pin), None) = (pin, node.pin()) {
                node.set_pin(pin);
            }
        }
        self.mark_edited();
        true
    }

    /// Replaces only the type discriminant of the matching edge.
    pub fn patch_edge_type(&mut self, id: &str, edge_type: EdgeType) -> bool {
        let Some(edge) = self.draft.edge_mut(id) else {
            return false;
        };
        edge.edge_type = edge_type;
        self.mark_edited();
        true
    }

    /// Adds a fresh node near the selection (or to the right of the
    /// current rightmost node), wired under the best available parent.
    /// Returns the new node's id.
    pub fn add_node(&mut self) -> String {
        let id = generate_id("n_manual");
        let seed = self.spawn_position();

        let parent_id = self
            .selection
            .node_id
            .clone()
            .filter(|sel| self.draft.node(sel).is_some())
            .or_else(|| {
                crate::layout::pick_root_goal(&self.draft).map(|goal| goal.id.clone())
            });

        let mut node = Node {
            id: id.clone(),
            node_type: NodeType::Fact,
            layer: None,
            strength: None,
            statement: NEW_NODE_STATEMENT.to_string(),
            status: Status::Proposed,
            confidence: NEW_NODE_CONFIDENCE,
            importance: Some(NEW_NODE_IMPORTANCE),
            severity: None,
            locked: None,
            value: None,
            tags: None,
            evidence_ids: None,
            source_msg_ids: None,
        };
        node.set_pin(seed);
        self.draft.nodes.push(node);

        if let Some(parent) = parent_id {
            self.draft.edges.push(Edge {
                id: generate_id("e_manual"),
                from: parent,
                to: id.clone(),
                edge_type: EdgeType::Enable,
                confidence: EDGE_CONFIDENCE_FALLBACK,
            });
        }

        self.selection = Selection {
            node_id: Some(id.clone()),
            edge_id: None,
        };
        self.mark_edited();
        id
    }

    /// Deletes a node, bridging each (parent, child) pair across it so a
    /// single-parent chain keeps its downstream dependents. A bridge is
    /// skipped when the same-type edge already survives or when adding it
    /// would close a cycle; the rest of the deletion always completes.
    pub fn delete_node(&mut self, id: &str) -> bool {
        if self.draft.node(id).is_none() {
            return false;
        }
        let (touching, mut remaining): (Vec<Edge>, Vec<Edge>) = self
            .draft
            .edges
            .drain(..)
            .partition(|e| e.from == id || e.to == id);

        let incoming: Vec<&Edge> = touching
            .iter()
            .filter(|e| e.to == id && e.edge_type.is_bridgeable())
            .collect();
        let outgoing: Vec<&Edge> = touching
            .iter()
            .filter(|e| e.from == id && e.edge_type.is_bridgeable())
            .collect();

        for parent_edge in &incoming {
            for child_edge in &outgoing {
                let parent = parent_edge.from.as_str();
                let child = child_edge.to.as_str();
                if parent == child {
                    continue;
                }
                let bridge_type = child_edge.edge_type;
                if remaining
                    .iter()
                    .any(|e| e.from == parent && e.to == child && e.edge_type == bridge_type)
                {
                    debug!(parent, child, "bridge already present, skipping");
                    continue;
                }
                if reachable(child, parent, &remaining) {
                    debug!(parent, child, "bridge would close a cycle, skipping");
                    continue;
                }
                remaining.push(Edge {
                    id: generate_id("e_manual"),
                    from: parent.to_string(),
                    to: child.to_string(),
                    edge_type: bridge_type,
                    confidence: bridge_confidence(
                        parent_edge.confidence,
                        child_edge.confidence,
                    ),
                });
            }
        }

        self.draft.edges = remaining;
        self.draft.nodes.retain(|n| n.id != id);
        if self.selection.node_id.as_deref() == Some(id) {
            self.selection.node_id = None;
        }
        self.mark_edited();
        true
    }

    /// Finishes a drag. Below the click threshold this is a selection, not
    /// a move. Past it the node is pinned where it was released; past the
    /// reparent threshold the drop target (given, or resolved by hit test)
    /// may additionally become the node's new structural parent.
    pub fn drag_release(
        &mut self,
        node_id: &str,
        released_at: Point,
        candidate_parent_id: Option<&str>,
    ) -> bool {
        if self.draft.node(node_id).is_none() {
            return false;
        }
        let start = self
            .positions
            .get(node_id)
            .copied()
            .unwrap_or(released_at);
        let displacement = start.distance_to(released_at);
        if displacement < self.config.draft.click_threshold {
            self.select_node(node_id);
            return false;
        }

        if let Some(node) = self.draft.node_mut(node_id) {
            node.set_pin(released_at);
        }

        if displacement > self.config.draft.reparent_threshold {
            let candidate = candidate_parent_id
                .map(str::to_string)
                .or_else(|| self.find_drop_parent(node_id, released_at));
            if let Some(candidate) = candidate {
                self.try_reparent(node_id, &candidate);
            }
        }

        self.mark_edited();
        true
    }

    pub fn begin_save(&self) -> SaveTicket {
        SaveTicket { epoch: self.epoch }
    }

    /// Adopts a successful save response. If the response carries a
    /// `graph`, it is re-normalized, merged with local pins, and becomes
    /// the new baseline. `dirty` clears only when no edit landed since the
    /// ticket was issued.
    pub fn complete_save(&mut self, ticket: SaveTicket, response: &Value) {
        if let Some(server_graph) = response.get("graph") {
            let mut incoming = normalize(server_graph);
            merge_pins(&mut incoming, &self.draft);
            self.draft = incoming;
            self.relayout();
        }
        if ticket.epoch == self.epoch {
            self.dirty = false;
        }
    }

    /// One round trip against the backend. On failure the draft is
    /// untouched and stays dirty so the caller can retry.
    pub fn save_via<B: GraphBackend>(
        &mut self,
        backend: &mut B,
        options: &SaveOptions,
    ) -> Result<(), SaveError> {
        let ticket = self.begin_save();
        let response = backend.save(&self.draft, options)?;
        self.complete_save(ticket, &response);
        Ok(())
    }

    /// Absorbs the fresh graph snapshot a completed conversation turn
    /// delivers: normalize, keep user-arranged pins, adopt as the new
    /// clean baseline.
    pub fn absorb_snapshot(&mut self, payload: &Value) {
        let mut incoming = normalize(payload);
        merge_pins(&mut incoming, &self.draft);
        self.draft = incoming;
        if let Some(selected) = self.selection.node_id.clone() {
            if self.draft.node(&selected).is_none() {
                self.selection.node_id = None;
            }
        }
        if let Some(selected) = self.selection.edge_id.clone() {
            if !self.draft.edges.iter().any(|e| e.id == selected) {
                self.selection.edge_id = None;
            }
        }
        self.dirty = false;
        self.epoch += 1;
        self.relayout();
    }

    fn spawn_position(&self) -> Point {
        if let Some(selected) = self
            .selection
            .node_id
            .as_deref()
            .and_then(|id| self.positions.get(id))
        {
            return Point::new(
                selected.x + self.config.draft.spawn_offset_x,
                selected.y + self.config.draft.spawn_offset_y,
            );
        }
        let rightmost = self
            .positions
            .values()
            .fold(None::<Point>, |best, point| match best {
                Some(current) if current.x >= point.x => Some(current),
                _ => Some(*point),
            });
        match rightmost {
            Some(point) => Point::new(point.x + self.config.draft.spawn_offset_x, point.y),
            None => SPAWN_ORIGIN,
        }
    }

    /// Scans every other positioned node for the one whose margin-expanded
    /// box contains the dragged node's center, nearest center first.
    fn find_drop_parent(&self, dragged_id: &str, dragged_at: Point) -> Option<String> {
        let width = self.config.draft.node_width;
        let height = self.config.draft.node_height;
        let margin = self.config.draft.hit_margin;
        let center_x = dragged_at.x + width / 2.0;
        let center_y = dragged_at.y + height / 2.0;

        let mut best: Option<(String, f32)> = None;
        for (id, point) in &self.positions {
            if id == dragged_id || self.draft.node(id).is_none() {
                continue;
            }
            let inside = center_x >= point.x - margin
                && center_x <= point.x + width + margin
                && center_y >= point.y - margin
                && center_y <= point.y + height + margin;
            if !inside {
                continue;
            }
            let target_center = Point::new(point.x + width / 2.0, point.y + height / 2.0);
            let score = target_center.distance_to(Point::new(center_x, center_y));
            match &best {
                Some((_, best_score)) if *best_score <= score => {}
                _ => best = Some((id.clone(), score)),
            }
        }
        best.map(|(id, _)| id)
    }

    fn try_reparent(&mut self, node_id: &str, candidate: &str) {
        if candidate == node_id || self.draft.node(candidate).is_none() {
            return;
        }
        if self
            .draft
            .edges
            .iter()
            .any(|e| e.from == candidate && e.to == node_id)
        {
            debug!(candidate, node_id, "drop target already parents the node");
            return;
        }
        if let Some(existing) = self
            .draft
            .edges
            .iter()
            .position(|e| e.to == node_id && e.edge_type.is_bridgeable())
        {
            self.draft.edges.remove(existing);
        }
        if reachable(node_id, candidate, &self.draft.edges) {
            debug!(candidate, node_id, "reparent would close a cycle, skipping");
            return;
        }
        self.draft.edges.push(Edge {
            id: generate_id("e_manual"),
            from: candidate.to_string(),
            to: node_id.to_string(),
            edge_type: EdgeType::Enable,
            confidence: crate::model::REPARENT_CONFIDENCE,
        });
    }

    fn mark_edited(&mut self) {
        self.dirty = true;
        self.epoch += 1;
        self.relayout();
    }

    fn relayout(&mut self) {
        self.positions = compute_layout(&self.draft, &BTreeMap::new(), &self.config.layout);
    }
}

fn bridge_confidence(parent: f64, child: f64) -> f64 {
    if parent.is_finite() && child.is_finite() {
        (parent + child) / 2.0
    } else {
        BRIDGE_CONFIDENCE_FALLBACK
    }
}

fn parse_value_text(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    if let Ok(value) = json5::from_str::<Value>(trimmed) {
        return Some(value);
    }
    Some(Value::String(text.to_string()))
}

/// Merges locally pinned positions into an incoming server graph: pins for
/// node ids the server dropped disappear with their nodes; server nodes
/// that lack a position inherit the prior draft's pin.
pub fn merge_pins(incoming: &mut Graph, prior: &Graph) {
    for node in &mut incoming.nodes {
        if node.pin().is_some() {
            continue;
        }
        if let Some(pin) = prior.node(&node.id).and_then(Node::pin) {
            node.set_pin(pin);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_from(payload: Value) -> DraftState {
        DraftState::new(&payload, Config::default())
    }

    fn chain_payload() -> Value {
        serde_json::json!({
            "id": "g",
            "version": 1,
            "nodes": [
                {"id": "a", "type": "goal", "status": "confirmed", "statement": "root"},
                {"id": "b", "type": "fact", "statement": "middle"},
                {"id": "c", "type": "fact", "statement": "leaf"},
            ],
            "edges": [
                {"id": "e1", "from": "a", "to": "b", "type": "enable", "confidence": 0.8},
                {"id": "e2", "from": "b", "to": "c", "type": "constraint", "confidence": 0.6},
            ],
        })
    }

    #[test]
    fn patch_clamps_confidence_and_importance() {
        let mut state = state_from(chain_payload());
        state.patch_node(
            "b",
            NodePatch {
                confidence: Some(5.0),
                importance: Some(Some(-3.0)),
                ..NodePatch::default()
            },
        );
        let node = state.draft().node("b").unwrap();
        assert_eq!(node.confidence, 1.0);
        assert_eq!(node.importance, Some(0.0));
        assert!(state.dirty());
    }

    #[test]
    fn patch_value_text_parses_or_keeps_raw() {
        let mut state = state_from(chain_payload());
        state.patch_node(
            "b",
            NodePatch {
                value: Some(ValuePatch::Text("{amount: 3000}".to_string())),
                ..NodePatch::default()
            },
        );
        assert_eq!(
            state.draft().node("b").unwrap().value,
            Some(serde_json::json!({"amount": 3000}))
        );

        state.patch_node(
            "b",
            NodePatch {
                value: Some(ValuePatch::Text("not structured at all".to_string())),
                ..NodePatch::default()
            },
        );
        assert_eq!(
            state.draft().node("b").unwrap().value,
            Some(Value::String("not structured at all".to_string()))
        );
    }

    #[test]
    fn patch_value_preserves_pin() {
        let mut state = state_from(chain_payload());
        let start = state.positions()["b"];
        let released = Point::new(start.x + 200.0, start.y + 5.0);
        state.drag_release("b", released, None);
        state.patch_node(
            "b",
            NodePatch {
                value: Some(ValuePatch::Data(serde_json::json!({"k": "v"}))),
                ..NodePatch::default()
            },
        );
        let node = state.draft().node("b").unwrap();
        assert_eq!(node.pin(), Some(released));
        assert_eq!(node.value.as_ref().unwrap()["k"], "v");
    }

    #[test]
    fn patch_tags_from_panel_text() {
        let mut state = state_from(chain_payload());
        state.patch_node(
            "b",
            NodePatch {
                tags: Some(crate::graphutil::split_csv("rail, onsen； food")),
                ..NodePatch::default()
            },
        );
        assert_eq!(
            state.draft().node("b").unwrap().tags,
            Some(vec!["rail".to_string(), "onsen".to_string(), "food".to_string()])
        );
    }

    #[test]
    fn patch_edge_type_touches_only_the_discriminant() {
        let mut state = state_from(chain_payload());
        assert!(state.patch_edge_type("e1", EdgeType::Determine));
        let edge = state.draft().edges.iter().find(|e| e.id == "e1").unwrap();
        assert_eq!(edge.edge_type, EdgeType::Determine);
        assert_eq!(edge.confidence, 0.8);
        assert!(!state.patch_edge_type("missing", EdgeType::Enable));
    }

    #[test]
    fn delete_reconnects_chain_with_mean_confidence() {
        let mut state = state_from(chain_payload());
        assert!(state.delete_node("b"));
        let graph = state.draft();
        assert!(graph.node("b").is_none());
        assert_eq!(graph.edges.len(), 1);
        let bridge = &graph.edges[0];
        assert_eq!(bridge.from, "a");
        assert_eq!(bridge.to, "c");
        assert_eq!(bridge.edge_type, EdgeType::Constraint);
        assert!((bridge.confidence - 0.7).abs() < 1e-9);
        assert!(!reachable("c", "a", &graph.edges));
    }

    #[test]
    fn delete_in_diamond_does_not_duplicate_edges() {
        let mut state = state_from(serde_json::json!({
            "nodes": [
                {"id": "a"}, {"id": "b"}, {"id": "c"}, {"id": "d"},
            ],
            "edges": [
                {"id": "e1", "from": "a", "to": "b"},
                {"id": "e2", "from": "a", "to": "c"},
                {"id": "e3", "from": "b", "to": "d"},
                {"id": "e4", "from": "c", "to": "d"},
            ],
        }));
        state.delete_node("b");
        let graph = state.draft();
        // a->c and c->d survive and exactly one a->d bridge appears.
        let a_to_d: Vec<_> = graph
            .edges
            .iter()
            .filter(|e| e.from == "a" && e.to == "d")
            .collect();
        assert_eq!(a_to_d.len(), 1);
        assert_eq!(graph.edges.len(), 3);

        // Deleting c afterwards must not duplicate the existing a->d edge.
        state.delete_node("c");
        let graph = state.draft();
        let a_to_d: Vec<_> = graph
            .edges
            .iter()
            .filter(|e| e.from == "a" && e.to == "d")
            .collect();
        assert_eq!(a_to_d.len(), 1);
    }

    #[test]
    fn delete_skips_bridges_that_would_close_a_cycle() {
        // a -> b -> c with a back edge c -> a: bridging a -> c after
        // deleting b would close the cycle a -> c -> a.
        let mut state = state_from(serde_json::json!({
            "nodes": [{"id": "a"}, {"id": "b"}, {"id": "c"}],
            "edges": [
                {"id": "e1", "from": "a", "to": "b"},
                {"id": "e2", "from": "b", "to": "c"},
                {"id": "e3", "from": "c", "to": "a"},
            ],
        }));
        state.delete_node("b");
        let graph = state.draft();
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].id, "e3");
    }

    #[test]
    fn delete_drops_conflict_edges_without_bridging() {
        let mut state = state_from(serde_json::json!({
            "nodes": [{"id": "a"}, {"id": "b"}, {"id": "c"}],
            "edges": [
                {"id": "e1", "from": "a", "to": "b", "type": "conflicts_with"},
                {"id": "e2", "from": "b", "to": "c", "type": "enable"},
            ],
        }));
        state.delete_node("b");
        assert!(state.draft().edges.is_empty());
    }

    #[test]
    fn small_drag_is_a_click() {
        let mut state = state_from(chain_payload());
        let start = state.positions()["c"];
        let nudged = Point::new(start.x + 2.0, start.y - 1.0);
        assert!(!state.drag_release("c", nudged, None));
        assert!(!state.dirty());
        assert_eq!(state.selection().node_id.as_deref(), Some("c"));
        assert_eq!(state.draft().node("c").unwrap().pin(), None);
    }

    #[test]
    fn real_drag_pins_the_node() {
        let mut state = state_from(chain_payload());
        let start = state.positions()["c"];
        let released = Point::new(start.x + 60.0, start.y + 10.0);
        assert!(state.drag_release("c", released, None));
        assert!(state.dirty());
        assert_eq!(state.draft().node("c").unwrap().pin(), Some(released));
        assert_eq!(state.positions()["c"], released);
    }

    #[test]
    fn reparent_rejects_cycles() {
        // a -> b -> c; dropping a onto c must not create c -> a.
        let mut state = state_from(serde_json::json!({
            "nodes": [{"id": "a"}, {"id": "b"}, {"id": "c"}],
            "edges": [
                {"id": "e1", "from": "a", "to": "b"},
                {"id": "e2", "from": "b", "to": "c"},
            ],
        }));
        let start = state.positions()["a"];
        let released = Point::new(start.x + 500.0, start.y);
        state.drag_release("a", released, Some("c"));
        let graph = state.draft();
        assert!(!graph.edges.iter().any(|e| e.from == "c" && e.to == "a"));
        // The drag itself still landed: the node is pinned where released.
        assert_eq!(graph.node("a").unwrap().pin(), Some(released));
    }

    #[test]
    fn reparent_replaces_the_editable_parent_edge() {
        let mut state = state_from(serde_json::json!({
            "nodes": [{"id": "p1"}, {"id": "p2"}, {"id": "child"}],
            "edges": [
                {"id": "e1", "from": "p1", "to": "child", "type": "determine", "confidence": 0.5},
            ],
        }));
        let start = state.positions()["child"];
        let released = Point::new(start.x - 400.0, start.y);
        state.drag_release("child", released, Some("p2"));
        let graph = state.draft();
        assert!(!graph.edges.iter().any(|e| e.from == "p1"));
        let new_edge = graph
            .edges
            .iter()
            .find(|e| e.from == "p2" && e.to == "child")
            .unwrap();
        assert_eq!(new_edge.edge_type, EdgeType::Enable);
        assert_eq!(new_edge.confidence, crate::model::REPARENT_CONFIDENCE);
    }

    #[test]
    fn drop_parent_hit_test_picks_nearest_containing_box() {
        let mut state = state_from(serde_json::json!({
            "nodes": [{"id": "a"}, {"id": "b"}, {"id": "mover"}],
            "edges": [],
        }));
        // Pin two candidates close together, then release the mover right
        // on top of `b`.
        let config = Config::default();
        let spot_a = Point::new(1000.0, 1000.0);
        let spot_b = Point::new(1000.0 + config.draft.node_width / 2.0, 1000.0);
        state.drag_release("a", spot_a, None);
        state.drag_release("b", spot_b, None);
        state.drag_release("mover", spot_b, None);
        let graph = state.draft();
        assert!(graph.edges.iter().any(|e| e.from == "b" && e.to == "mover"));
        assert!(!graph.edges.iter().any(|e| e.from == "a" && e.to == "mover"));
    }

    #[test]
    fn add_node_wires_under_selection_or_best_goal() {
        let mut state = state_from(chain_payload());
        let id = state.add_node();
        let graph = state.draft();
        let node = graph.node(&id).unwrap();
        assert_eq!(node.node_type, NodeType::Fact);
        assert_eq!(node.status, Status::Proposed);
        assert_eq!(node.confidence, NEW_NODE_CONFIDENCE);
        assert_eq!(node.importance, Some(NEW_NODE_IMPORTANCE));
        assert!(node.pin().is_some());
        // No selection at add time: the confirmed goal parents the node.
        let parent_edge = graph.edges.iter().find(|e| e.to == id).unwrap();
        assert_eq!(parent_edge.from, "a");
        assert_eq!(parent_edge.edge_type, EdgeType::Enable);
        assert_eq!(state.selection().node_id.as_deref(), Some(id.as_str()));

        state.select_node("c");
        let second = state.add_node();
        let parent_edge = state
            .draft()
            .edges
            .iter()
            .find(|e| e.to == second)
            .unwrap();
        assert_eq!(parent_edge.from, "c");
    }

    #[test]
    fn add_node_into_empty_graph_has_no_parent() {
        let mut state = state_from(serde_json::json!({}));
        let id = state.add_node();
        assert_eq!(state.draft().nodes.len(), 1);
        assert!(state.draft().edges.is_empty());
        assert_eq!(state.draft().node(&id).unwrap().pin(), Some(SPAWN_ORIGIN));
    }

    #[test]
    fn save_roundtrip_clears_dirty_and_merges_pins() {
        struct Backend {
            response: Value,
        }
        impl GraphBackend for Backend {
            fn save(&mut self, _graph: &Graph, _options: &SaveOptions) -> Result<Value, SaveError> {
                Ok(self.response.clone())
            }
        }

        let mut state = state_from(chain_payload());
        let start = state.positions()["c"];
        let released = Point::new(start.x + 90.0, start.y);
        state.drag_release("c", released, None);
        assert!(state.dirty());

        // Server echoes the graph without any pins; ours must survive.
        let mut backend = Backend {
            response: serde_json::json!({"graph": chain_payload()}),
        };
        state.save_via(&mut backend, &SaveOptions::default()).unwrap();
        assert!(!state.dirty());
        assert_eq!(state.draft().node("c").unwrap().pin(), Some(released));
    }

    #[test]
    fn failed_save_leaves_the_draft_untouched() {
        struct FailingBackend;
        impl GraphBackend for FailingBackend {
            fn save(&mut self, _graph: &Graph, _options: &SaveOptions) -> Result<Value, SaveError> {
                Err(SaveError::Transport("connection reset".to_string()))
            }
        }

        let mut state = state_from(chain_payload());
        state.patch_node(
            "b",
            NodePatch {
                statement: Some("edited".to_string()),
                ..NodePatch::default()
            },
        );
        let before = state.draft().clone();
        let err = state
            .save_via(&mut FailingBackend, &SaveOptions::default())
            .unwrap_err();
        assert!(matches!(err, SaveError::Transport(_)));
        assert!(state.dirty());
        assert_eq!(state.draft(), &before);
    }

    #[test]
    fn edits_during_save_keep_the_draft_dirty() {
        let mut state = state_from(chain_payload());
        state.patch_node(
            "b",
            NodePatch {
                statement: Some("first edit".to_string()),
                ..NodePatch::default()
            },
        );
        let ticket = state.begin_save();
        // An edit lands while the save is in flight.
        state.patch_node(
            "c",
            NodePatch {
                statement: Some("second edit".to_string()),
                ..NodePatch::default()
            },
        );
        state.complete_save(ticket, &serde_json::json!({"graph": chain_payload()}));
        assert!(state.dirty());
    }

    #[test]
    fn absorb_snapshot_merges_pins_and_drops_stale_ones() {
        let mut state = state_from(chain_payload());
        let start = state.positions()["b"];
        let released = Point::new(start.x + 75.0, start.y);
        state.drag_release("b", released, None);
        state.select_node("c");

        // The next turn drops node c and keeps b without a position.
        state.absorb_snapshot(&serde_json::json!({
            "id": "g",
            "version": 2,
            "nodes": [
                {"id": "a", "type": "goal", "status": "confirmed"},
                {"id": "b", "type": "fact"},
            ],
            "edges": [{"id": "e1", "from": "a", "to": "b"}],
        }));

        assert!(!state.dirty());
        assert_eq!(state.draft().node("b").unwrap().pin(), Some(released));
        assert!(state.draft().node("c").is_none());
        assert_eq!(state.selection().node_id, None);
        assert_eq!(state.positions()["b"], released);
    }
}
