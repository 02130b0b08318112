use std::collections::BTreeSet;

use anyhow::Result;
use serde_json::Value;

use crate::graphutil::coerce01;
use crate::model::{
    EDGE_CONFIDENCE_FALLBACK, Edge, EdgeType, Graph, IMPORTANCE_FALLBACK, Node,
    NODE_CONFIDENCE_FALLBACK, NodeLayer, NodeType, Severity, Status, Strength,
};

/// Parses a raw payload string and normalizes it. Strict JSON first, JSON5
/// as the lenient fallback; this is the only place the boundary can fail,
/// and only when the text is not parseable at all.
pub fn parse_payload(input: &str) -> Result<Graph> {
    let value: Value = match serde_json::from_str(input) {
        Ok(value) => value,
        Err(_) => json5::from_str(input)
            .map_err(|err| anyhow::anyhow!("payload is neither JSON nor JSON5: {err}"))?,
    };
    Ok(normalize(&value))
}

/// Turns an arbitrary payload into a structurally valid graph. Total: any
/// input shape produces a graph whose node ids are unique, whose edges all
/// reference existing nodes, and whose confidences are clamped. The input
/// is never mutated. Normalizing an already-normalized graph is a no-op.
pub fn normalize(input: &Value) -> Graph {
    let mut used_ids: BTreeSet<String> = BTreeSet::new();
    let raw_nodes = input
        .get("nodes")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let mut nodes: Vec<Node> = Vec::with_capacity(raw_nodes.len());
    for (idx, raw) in raw_nodes.iter().enumerate() {
        let trimmed = raw
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        let mut id = if trimmed.is_empty() {
            format!("n_{}", idx + 1)
        } else {
            trimmed.to_string()
        };
        while used_ids.contains(&id) {
            id.push_str("_dup");
        }
        used_ids.insert(id.clone());
        nodes.push(normalize_node(raw, id));
    }

    let raw_edges = input
        .get("edges")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let mut edges: Vec<Edge> = Vec::new();
    for (idx, raw) in raw_edges.iter().enumerate() {
        let from = raw.get("from").and_then(Value::as_str).unwrap_or("");
        let to = raw.get("to").and_then(Value::as_str).unwrap_or("");
        if from.is_empty() || to.is_empty() || !used_ids.contains(from) || !used_ids.contains(to) {
            tracing::debug!(index = idx, from, to, "dropping edge with unresolved endpoint");
            continue;
        }
        let id = match raw.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("e_{}", idx + 1),
        };
        let edge_type = raw
            .get("type")
            .and_then(Value::as_str)
            .and_then(EdgeType::from_token)
            .unwrap_or(EdgeType::Enable);
        edges.push(Edge {
            id,
            from: from.to_string(),
            to: to.to_string(),
            edge_type,
            confidence: coerce01(raw.get("confidence"), EDGE_CONFIDENCE_FALLBACK),
        });
    }

    Graph {
        id: input
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        version: coerce_version(input.get("version")),
        nodes,
        edges,
    }
}

fn normalize_node(raw: &Value, id: String) -> Node {
    let node_type = raw
        .get("type")
        .and_then(Value::as_str)
        .and_then(NodeType::from_token)
        .unwrap_or(NodeType::Fact);
    let importance = match raw.get("importance") {
        None | Some(Value::Null) => None,
        present => Some(coerce01(present, IMPORTANCE_FALLBACK)),
    };
    Node {
        id,
        node_type,
        layer: raw
            .get("layer")
            .and_then(Value::as_str)
            .and_then(NodeLayer::from_token),
        strength: raw
            .get("strength")
            .and_then(Value::as_str)
            .and_then(Strength::from_token),
        statement: raw
            .get("statement")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        status: raw
            .get("status")
            .and_then(Value::as_str)
            .and_then(Status::from_token)
            .unwrap_or(Status::Proposed),
        confidence: coerce01(raw.get("confidence"), NODE_CONFIDENCE_FALLBACK),
        importance,
        severity: raw
            .get("severity")
            .and_then(Value::as_str)
            .and_then(Severity::from_token),
        locked: raw.get("locked").and_then(Value::as_bool),
        value: raw.get("value").filter(|v| !v.is_null()).cloned(),
        tags: string_list(raw.get("tags")),
        evidence_ids: string_list(raw.get("evidenceIds")),
        source_msg_ids: string_list(raw.get("sourceMsgIds")),
    }
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

fn coerce_version(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    }
}
