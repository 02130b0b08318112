use std::path::Path;

use serde::{Deserialize, Serialize};

/// Geometry of the automatic layout. The defaults are the tuned values the
/// canvas ships with; a config file can override any subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub root_x: f32,
    pub root_y: f32,
    pub level_gap: f32,
    pub lane_gap: f32,
    pub row_gap: f32,
    pub max_rows_per_column: usize,
    /// Levels past the root an unplaceable node is parked at.
    pub fallback_level_span: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            root_x: 90.0,
            root_y: 340.0,
            level_gap: 370.0,
            lane_gap: 225.0,
            row_gap: 146.0,
            max_rows_per_column: 4,
            fallback_level_span: 2.0,
        }
    }
}

impl LayoutConfig {
    pub fn fallback_position(&self) -> (f32, f32) {
        (self.root_x + self.level_gap * self.fallback_level_span, self.root_y)
    }
}

/// Interaction thresholds and node hit-box geometry for the mutation
/// engine. Node boxes are the nominal card size the canvas renders;
/// the margin widens each box for the drop-parent hit test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftConfig {
    pub click_threshold: f32,
    pub reparent_threshold: f32,
    pub node_width: f32,
    pub node_height: f32,
    pub hit_margin: f32,
    /// Horizontal offset for a node added next to the current selection.
    pub spawn_offset_x: f32,
    pub spawn_offset_y: f32,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            click_threshold: 6.0,
            reparent_threshold: 24.0,
            node_width: 280.0,
            node_height: 120.0,
            hit_margin: 18.0,
            spawn_offset_x: 320.0,
            spawn_offset_y: 40.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub layout: LayoutConfig,
    pub draft: DraftConfig,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    let parsed: Config = match serde_json::from_str(&contents) {
        Ok(config) => config,
        Err(_) => json5::from_str(&contents)?,
    };
    Ok(parsed)
}
