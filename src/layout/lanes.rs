use crate::model::{Node, NodeLayer, NodeType, Severity};

use super::slots::{Slot, SlotFamily};

/// Vertical bands nodes are grouped into within a level. Declaration order
/// is the defensive fallback order for lanes missing from a level's fixed
/// list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Lane {
    Goal,
    People,
    Destination,
    Duration,
    Budget,
    Health,
    MeetingCritical,
    Language,
    ConstraintHigh,
    Constraint,
    Lodging,
    PreferenceSlot,
    Preference,
    Fact,
    Belief,
    Question,
    Other,
}

const LEVEL_0_LANES: &[Lane] = &[Lane::Goal];
const LEVEL_1_LANES: &[Lane] = &[Lane::People, Lane::Destination, Lane::Duration, Lane::Budget];
const DEEP_LANES: &[Lane] = &[
    Lane::Health,
    Lane::MeetingCritical,
    Lane::Language,
    Lane::ConstraintHigh,
    Lane::Constraint,
    Lane::Lodging,
    Lane::PreferenceSlot,
    Lane::Preference,
    Lane::Fact,
    Lane::Belief,
    Lane::Question,
    Lane::Other,
];

impl Lane {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Goal => "goal",
            Self::People => "people",
            Self::Destination => "destination",
            Self::Duration => "duration",
            Self::Budget => "budget",
            Self::Health => "health",
            Self::MeetingCritical => "meeting_critical",
            Self::Language => "language",
            Self::ConstraintHigh => "constraint_high",
            Self::Constraint => "constraint",
            Self::Lodging => "lodging",
            Self::PreferenceSlot => "preference_slot",
            Self::Preference => "preference",
            Self::Fact => "fact",
            Self::Belief => "belief",
            Self::Question => "question",
            Self::Other => "other",
        }
    }
}

pub fn lane_order(level: u32) -> &'static [Lane] {
    match level {
        0 => LEVEL_0_LANES,
        1 => LEVEL_1_LANES,
        _ => DEEP_LANES,
    }
}

pub fn lane_for_slot(family: SlotFamily) -> Lane {
    match family {
        SlotFamily::Goal => Lane::Goal,
        SlotFamily::People => Lane::People,
        SlotFamily::Destination => Lane::Destination,
        SlotFamily::Duration => Lane::Duration,
        SlotFamily::Budget => Lane::Budget,
        SlotFamily::Lodging => Lane::Lodging,
        SlotFamily::ScenicPreference => Lane::PreferenceSlot,
        SlotFamily::Health => Lane::Health,
        SlotFamily::MeetingCritical => Lane::MeetingCritical,
        SlotFamily::Language => Lane::Language,
        SlotFamily::NamedConstraint => Lane::Constraint,
    }
}

pub fn lane_for_node(node: &Node, slot: Option<&Slot>) -> Lane {
    if let Some(slot) = slot {
        return lane_for_slot(slot.family);
    }
    match node.layer {
        Some(NodeLayer::Risk) => return Lane::ConstraintHigh,
        Some(NodeLayer::Preference) => return Lane::Preference,
        Some(NodeLayer::Intent) => return Lane::Goal,
        _ => {}
    }
    match node.node_type {
        NodeType::Constraint => {
            if Severity::score(node.severity) >= 3 {
                Lane::ConstraintHigh
            } else {
                Lane::Constraint
            }
        }
        NodeType::Preference => Lane::Preference,
        NodeType::Fact => Lane::Fact,
        NodeType::Belief => Lane::Belief,
        NodeType::Question => Lane::Question,
        NodeType::Goal => Lane::Goal,
    }
}

/// Fixed tie-break order over node types used when ranking nodes inside a
/// lane.
pub fn type_priority(node_type: NodeType) -> u8 {
    match node_type {
        NodeType::Goal => 0,
        NodeType::Constraint => 1,
        NodeType::Preference => 2,
        NodeType::Fact => 3,
        NodeType::Belief => 4,
        NodeType::Question => 5,
    }
}
