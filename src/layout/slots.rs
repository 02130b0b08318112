use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Node, NodeType};

static PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:user task|task|user note)[:：]\s*").unwrap());
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapses whitespace and strips the transcript prefixes the extractor
/// occasionally leaves on statements.
pub fn clean_statement(input: &str) -> String {
    let collapsed = SPACE_RE.replace_all(input, " ");
    PREFIX_RE.replace(collapsed.trim(), "").trim().to_string()
}

/// Semantic families a statement can classify into. `People`,
/// `Destination`, `Duration`, and `Budget` are the primary families the
/// leveling step forces next to the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SlotFamily {
    Goal,
    People,
    Destination,
    Duration,
    Budget,
    Lodging,
    ScenicPreference,
    Health,
    MeetingCritical,
    Language,
    NamedConstraint,
}

impl SlotFamily {
    pub fn is_primary(self) -> bool {
        matches!(
            self,
            Self::People | Self::Destination | Self::Duration | Self::Budget
        )
    }

    /// Health and meeting-critical slots share leveling behavior: both are
    /// forced to level 2 and attract their dependents to level 3.
    pub fn is_schedule_critical(self) -> bool {
        matches!(self, Self::Health | Self::MeetingCritical)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub family: SlotFamily,
    /// Distinguishes repeated slots of a multi-instance family (one
    /// destination per city, one stay length per stop) so they do not
    /// collapse into a single slot.
    pub instance: Option<String>,
}

impl Slot {
    fn new(family: SlotFamily) -> Self {
        Self { family, instance: None }
    }

    fn keyed(family: SlotFamily, instance: &str) -> Self {
        let key = instance.trim().to_lowercase();
        Self {
            family,
            instance: if key.is_empty() { None } else { Some(key) },
        }
    }
}

struct SlotRule {
    family: SlotFamily,
    node_types: &'static [NodeType],
    pattern: Regex,
    /// Capture group holding the instance key, if the family is
    /// multi-instance.
    instance_group: Option<usize>,
}

impl SlotRule {
    fn new(
        family: SlotFamily,
        node_types: &'static [NodeType],
        pattern: &str,
        instance_group: Option<usize>,
    ) -> Self {
        Self {
            family,
            node_types,
            pattern: Regex::new(pattern).unwrap(),
            instance_group,
        }
    }
}

// First match wins, so the tight labelled forms sit above the keyword
// fallbacks and the generic named-constraint form comes last.
static CATALOG: Lazy<Vec<SlotRule>> = Lazy::new(|| {
    use NodeType::{Constraint, Fact, Preference};
    vec![
        SlotRule::new(
            SlotFamily::Budget,
            &[Constraint],
            r"(?i)^budget(?:\s+cap)?[:：]\s*[0-9][0-9,]{1,}(?:\s*(?:usd|eur|gbp|cny|rmb|yen|yuan|dollars?))?$",
            None,
        ),
        SlotRule::new(
            SlotFamily::Duration,
            &[Constraint],
            r"(?i)^(?:total\s+)?(?:trip|itinerary|meeting)\s+duration[:：]\s*[0-9]{1,3}\s*days?$",
            None,
        ),
        SlotRule::new(
            SlotFamily::Duration,
            &[Fact, Constraint],
            r"(?i)^(?:city\s+stay|stay(?:\s+length)?)[:：]\s*(.+?)\s+[0-9]{1,3}\s*days?$",
            Some(1),
        ),
        SlotRule::new(
            SlotFamily::People,
            &[Fact],
            r"(?i)^(?:party\s+size|group\s+size|travell?ers?|people\s+count)[:：]\s*[0-9]{1,3}(?:\s*(?:people|pax))?$",
            None,
        ),
        SlotRule::new(
            SlotFamily::Destination,
            &[Fact],
            r"(?i)^destination[:：]\s*(.+)$",
            Some(1),
        ),
        SlotRule::new(
            SlotFamily::MeetingCritical,
            &[Constraint],
            r"(?i)^(?:critical\s+meeting\s+day|key\s+meeting\s+date|paper\s+presentation\s+day|presentation\s+date)[:：]\s*.+$",
            None,
        ),
        SlotRule::new(
            SlotFamily::ScenicPreference,
            &[Preference, Constraint],
            r"(?i)^(?:scenic|sightseeing|activity)\s+preference[:：]\s*.+$",
            None,
        ),
        SlotRule::new(
            SlotFamily::Lodging,
            &[Preference, Constraint],
            r"(?i)^(?:lodging|hotel|accommodation)\s+(?:preference|standard)[:：]",
            None,
        ),
        SlotRule::new(
            SlotFamily::Lodging,
            &[Preference, Constraint],
            r"(?i)\b(?:stay\s+(?:in|at)|prefer(?:s|red)?)\b.{0,24}\b(?:hotels?|hostels?|guesthouses?|b&bs?)\b|\b(?:five|four|three|5|4|3)[-\s]star\b.{0,12}\bhotels?\b",
            None,
        ),
        SlotRule::new(
            SlotFamily::Health,
            &[Constraint],
            r"(?i)\b(?:cardiac|heart|cardio|blood\s+pressure|hypertension|diabet(?:es|ic)|asthma|chronic|elderly|mobility|wheelchair|medical|first[-\s]aid|health)\b|\bno\s+(?:hiking|climbing|long\s+walks)\b",
            None,
        ),
        SlotRule::new(
            SlotFamily::Language,
            &[Constraint, Preference],
            r"(?i)^language(?:\s+(?:constraint|requirement|preference))?[:：]\s*.+$|\b(?:english|mandarin|japanese|french)[-\s](?:speaking|only)\b|\b(?:translator|interpreter)\b",
            None,
        ),
        SlotRule::new(
            SlotFamily::NamedConstraint,
            &[Constraint],
            r"(?i)^([a-z][a-z0-9\s/-]{1,24}?)\s*(?:cap|limit|constraint)[:：]\s*.+$",
            Some(1),
        ),
    ]
});

/// Classifies a node's cleaned statement against the slot catalog. A node
/// matches at most one slot; goal nodes classify as the goal slot without
/// consulting the catalog.
pub fn classify(node: &Node) -> Option<Slot> {
    let statement = clean_statement(&node.statement);
    if statement.is_empty() {
        return None;
    }
    if node.node_type == NodeType::Goal {
        return Some(Slot::new(SlotFamily::Goal));
    }
    for rule in CATALOG.iter() {
        if !rule.node_types.contains(&node.node_type) {
            continue;
        }
        let Some(captures) = rule.pattern.captures(&statement) else {
            continue;
        };
        let slot = match rule.instance_group {
            Some(group) => match captures.get(group) {
                Some(m) => Slot::keyed(rule.family, m.as_str()),
                None => Slot::new(rule.family),
            },
            None => Slot::new(rule.family),
        };
        return Some(slot);
    }
    None
}
