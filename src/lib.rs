pub mod config;
pub mod draft;
pub mod graphutil;
pub mod layout;
pub mod model;
pub mod normalize;

pub use config::{Config, DraftConfig, LayoutConfig, load_config};
pub use draft::{
    DraftState, GraphBackend, NodePatch, SaveError, SaveOptions, SaveTicket, Selection,
    ValuePatch, merge_pins,
};
pub use layout::{LayoutDump, compute_layout, derive_semantic_meta, pick_root_goal};
pub use model::{Edge, EdgeType, Graph, Node, NodeLayer, NodeType, Point, Severity, Status, Strength};
pub use normalize::{normalize, parse_payload};
