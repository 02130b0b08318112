use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fallback used when a node arrives without a usable confidence.
pub const NODE_CONFIDENCE_FALLBACK: f64 = 0.6;
/// Fallback used when a node carries an importance that fails coercion.
pub const IMPORTANCE_FALLBACK: f64 = 0.68;
/// Fallback used when an edge arrives without a usable confidence.
pub const EDGE_CONFIDENCE_FALLBACK: f64 = 0.7;
/// Confidence of a bridge edge when either bridged side is missing one.
pub const BRIDGE_CONFIDENCE_FALLBACK: f64 = 0.74;
/// Confidence of the edge synthesized by a drag-reparent.
pub const REPARENT_CONFIDENCE: f64 = 0.86;
/// Defaults for nodes created through the mutation engine.
pub const NEW_NODE_CONFIDENCE: f64 = 0.72;
pub const NEW_NODE_IMPORTANCE: f64 = 0.66;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Goal,
    Constraint,
    Preference,
    Belief,
    Fact,
    Question,
}

impl NodeType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "goal" => Some(Self::Goal),
            "constraint" => Some(Self::Constraint),
            "preference" => Some(Self::Preference),
            "belief" => Some(Self::Belief),
            "fact" => Some(Self::Fact),
            "question" => Some(Self::Question),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeLayer {
    Intent,
    Requirement,
    Preference,
    Risk,
}

impl NodeLayer {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "intent" => Some(Self::Intent),
            "requirement" => Some(Self::Requirement),
            "preference" => Some(Self::Preference),
            "risk" => Some(Self::Risk),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Hard,
    Soft,
}

impl Strength {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "hard" => Some(Self::Hard),
            "soft" => Some(Self::Soft),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Proposed,
    Confirmed,
    Rejected,
    Disputed,
}

impl Status {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "proposed" => Some(Self::Proposed),
            "confirmed" => Some(Self::Confirmed),
            "rejected" => Some(Self::Rejected),
            "disputed" => Some(Self::Disputed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn score(severity: Option<Severity>) -> u8 {
        match severity {
            Some(Self::Critical) => 4,
            Some(Self::High) => 3,
            Some(Self::Medium) => 2,
            Some(Self::Low) => 1,
            None => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Enable,
    Constraint,
    Determine,
    ConflictsWith,
}

impl EdgeType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "enable" => Some(Self::Enable),
            "constraint" => Some(Self::Constraint),
            "determine" => Some(Self::Determine),
            "conflicts_with" => Some(Self::ConflictsWith),
            _ => None,
        }
    }

    /// Edge types the mutation engine treats as an editable parent->child
    /// dependency: these survive deletion via bridging and are the ones a
    /// drag-reparent is allowed to replace.
    pub fn is_bridgeable(self) -> bool {
        matches!(self, Self::Enable | Self::Determine | Self::Constraint)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<NodeLayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<Strength>,
    pub statement: String,
    pub status: Status,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(rename = "evidenceIds", skip_serializing_if = "Option::is_none")]
    pub evidence_ids: Option<Vec<String>>,
    #[serde(rename = "sourceMsgIds", skip_serializing_if = "Option::is_none")]
    pub source_msg_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub id: String,
    pub version: i64,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

impl Node {
    /// Pinned position persisted inside the free-form `value` payload at
    /// `value.ui.{x,y}`. Absent, non-object, or non-numeric entries read
    /// as no pin.
    pub fn pin(&self) -> Option<Point> {
        let ui = self.value.as_ref()?.get("ui")?;
        let x = ui.get("x")?.as_f64()?;
        let y = ui.get("y")?.as_f64()?;
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        Some(Point::new(x as f32, y as f32))
    }

    /// Writes a pin into `value.ui`, preserving any other keys the payload
    /// already carries. A non-object `value` is replaced wholesale.
    pub fn set_pin(&mut self, position: Point) {
        let mut base = match self.value.take() {
            Some(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        base.insert(
            "ui".to_string(),
            serde_json::json!({
                "x": position.x.round() as i64,
                "y": position.y.round() as i64,
            }),
        );
        self.value = Some(Value::Object(base));
    }

    pub fn clear_pin(&mut self) {
        if let Some(Value::Object(map)) = self.value.as_mut() {
            map.remove("ui");
            if map.is_empty() {
                self.value = None;
            }
        }
    }
}

impl Graph {
    pub fn empty() -> Self {
        Self {
            id: String::new(),
            version: 0,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.id == id)
    }

    pub fn has_edge(&self, from: &str, to: &str, edge_type: EdgeType) -> bool {
        self.edges
            .iter()
            .any(|e| e.from == from && e.to == to && e.edge_type == edge_type)
    }
}
