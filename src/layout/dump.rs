use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{Graph, Point};

use super::{Lane, derive_semantic_meta};

/// Serializable snapshot of a computed layout for the presentation layer
/// and for debugging: one entry per node with its position and the
/// semantic bucket it was placed by.
#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub graph_id: String,
    pub version: i64,
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<NodeDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub level: u32,
    pub lane: String,
    pub pinned: bool,
}

impl LayoutDump {
    pub fn from_positions(graph: &Graph, positions: &BTreeMap<String, Point>) -> Self {
        let meta = derive_semantic_meta(graph);
        let mut max_x = 0.0f32;
        let mut max_y = 0.0f32;
        let nodes = graph
            .nodes
            .iter()
            .filter_map(|node| {
                let point = positions.get(&node.id)?;
                max_x = max_x.max(point.x);
                max_y = max_y.max(point.y);
                Some(NodeDump {
                    id: node.id.clone(),
                    x: point.x,
                    y: point.y,
                    level: meta.levels.get(&node.id).copied().unwrap_or(0),
                    lane: meta
                        .lanes
                        .get(&node.id)
                        .copied()
                        .unwrap_or(Lane::Other)
                        .as_token()
                        .to_string(),
                    pinned: node.pin().is_some(),
                })
            })
            .collect();
        Self {
            graph_id: graph.id.clone(),
            version: graph.version,
            width: max_x,
            height: max_y,
            nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::layout::compute_layout;
    use crate::model::{Node, NodeType, Status};

    #[test]
    fn dump_serializes_lane_tokens() {
        let graph = Graph {
            id: "g1".to_string(),
            version: 2,
            nodes: vec![Node {
                id: "goal".to_string(),
                node_type: NodeType::Goal,
                layer: None,
                strength: None,
                statement: "Plan the trip".to_string(),
                status: Status::Confirmed,
                confidence: 0.8,
                importance: None,
                severity: None,
                locked: None,
                value: None,
                tags: None,
                evidence_ids: None,
                source_msg_ids: None,
            }],
            edges: vec![],
        };
        let positions = compute_layout(&graph, &BTreeMap::new(), &LayoutConfig::default());
        let dump = LayoutDump::from_positions(&graph, &positions);
        assert_eq!(dump.nodes.len(), 1);
        assert_eq!(dump.nodes[0].lane, "goal");
        assert_eq!(dump.nodes[0].level, 0);
        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["graph_id"], "g1");
        assert_eq!(json["nodes"][0]["pinned"], false);
    }
}
