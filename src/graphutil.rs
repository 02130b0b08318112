use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use uuid::Uuid;

use crate::model::Edge;

/// Clamps a finite number into [0, 1]; non-finite input takes the fallback.
pub fn clamp01(value: f64, fallback: f64) -> f64 {
    if !value.is_finite() {
        return fallback;
    }
    value.clamp(0.0, 1.0)
}

/// Coerces an untyped payload field into [0, 1]. Strings that parse as
/// numbers are accepted the way a loose JS client would; everything else
/// takes the fallback.
pub fn coerce01(value: Option<&Value>, fallback: f64) -> f64 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) => clamp01(n, fallback),
        None => fallback,
    }
}

pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4())
}

/// Directed reachability over the `from`-indexed adjacency of `edges`.
/// A node always reaches itself.
pub fn reachable(from: &str, to: &str, edges: &[Edge]) -> bool {
    if from == to {
        return true;
    }
    let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in edges {
        adjacency.entry(&edge.from).or_default().push(&edge.to);
    }
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut stack = vec![from];
    while let Some(current) = stack.pop() {
        if current == to {
            return true;
        }
        if !seen.insert(current) {
            continue;
        }
        if let Some(next) = adjacency.get(current) {
            for candidate in next {
                if !seen.contains(candidate) {
                    stack.push(candidate);
                }
            }
        }
    }
    false
}

/// Everything transitively reachable following outgoing edges from
/// `start_id`, start node included. Whole-subtree deletion used to be built
/// on this; the bridge-reconnect policy superseded it, but it remains part
/// of the structural toolkit.
pub fn collect_downstream(start_id: &str, edges: &[Edge]) -> BTreeSet<String> {
    let mut out: BTreeSet<String> = BTreeSet::new();
    let mut stack = vec![start_id.to_string()];
    while let Some(current) = stack.pop() {
        if !out.insert(current.clone()) {
            continue;
        }
        for edge in edges {
            if edge.from == current && !out.contains(&edge.to) {
                stack.push(edge.to.clone());
            }
        }
    }
    out
}

/// Splits free text from a panel field into a bounded list of entries.
/// Accepts commas, semicolons (ASCII or full-width) and newlines as
/// separators.
pub fn split_csv(input: &str) -> Vec<String> {
    input
        .split([',', '，', ';', '；', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .take(32)
        .collect()
}

/// `from`- and `to`-indexed views of an edge list, shared by the layout
/// engine and the mutation engine.
pub fn relation_maps(edges: &[Edge]) -> (BTreeMap<String, Vec<usize>>, BTreeMap<String, Vec<usize>>) {
    let mut outgoing: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut incoming: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, edge) in edges.iter().enumerate() {
        outgoing.entry(edge.from.clone()).or_default().push(idx);
        incoming.entry(edge.to.clone()).or_default().push(idx);
    }
    (outgoing, incoming)
}
