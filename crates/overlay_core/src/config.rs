//! Per-map configuration supplied by the host at creation time.
//!
//! # Invariants
//! - Every field has a default; an absent or empty document is valid.
//! - Numeric settings are strictly positive.

use crate::model::geometry::{Animation, AnimationKind};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Configuration parse/validation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Document is not valid JSON for `MapConfig`.
    Malformed(String),
    /// Numeric field is zero, negative or not finite.
    NonPositive { field: &'static str, value: f64 },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(message) => write!(f, "malformed map config: {message}"),
            Self::NonPositive { field, value } => {
                write!(f, "map config `{field}` must be positive, got {value}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Map controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapConfig {
    /// Per-map channel name is `<channel_prefix><view_id>`.
    pub channel_prefix: String,
    /// Zoom delta applied by `zoomIn`/`zoomOut`.
    pub zoom_step: f32,
    pub zoom_animation: Animation,
    /// Used when `clusterPlacemarks` omits `clusterRadius`.
    pub default_cluster_radius: f64,
    /// Used when `clusterPlacemarks` omits `minZoom`.
    pub default_cluster_min_zoom: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            channel_prefix: "overlay_map/map_".to_string(),
            zoom_step: 1.0,
            zoom_animation: Animation {
                kind: AnimationKind::Smooth,
                duration: 1.0,
            },
            default_cluster_radius: 60.0,
            default_cluster_min_zoom: 15,
        }
    }
}

impl MapConfig {
    /// Parses and validates a JSON document. Blank input yields defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Malformed(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("zoomStep", f64::from(self.zoom_step))?;
        ensure_positive("zoomAnimation.duration", f64::from(self.zoom_animation.duration))?;
        ensure_positive("defaultClusterRadius", self.default_cluster_radius)?;
        ensure_positive("defaultClusterMinZoom", f64::from(self.default_cluster_min_zoom))?;
        Ok(())
    }

    /// Channel name the host uses for the map with `view_id`.
    pub fn channel_name(&self, view_id: i64) -> String {
        format!("{}{}", self.channel_prefix, view_id)
    }
}

fn ensure_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        return Ok(());
    }
    Err(ConfigError::NonPositive { field, value })
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, MapConfig};
    use crate::model::geometry::AnimationKind;

    #[test]
    fn blank_document_yields_defaults() {
        let config = MapConfig::from_json("  ").expect("defaults");
        assert_eq!(config, MapConfig::default());
        assert_eq!(config.channel_name(3), "overlay_map/map_3");
        assert_eq!(config.zoom_animation.kind, AnimationKind::Smooth);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = MapConfig::from_json(r#"{"zoomStep": 2.5, "channelPrefix": "maps/"}"#)
            .expect("partial config");
        assert_eq!(config.zoom_step, 2.5);
        assert_eq!(config.channel_name(7), "maps/7");
        assert_eq!(config.default_cluster_min_zoom, 15);
    }

    #[test]
    fn rejects_malformed_and_non_positive_values() {
        assert!(matches!(
            MapConfig::from_json("{not json"),
            Err(ConfigError::Malformed(_))
        ));
        assert_eq!(
            MapConfig::from_json(r#"{"defaultClusterRadius": 0}"#),
            Err(ConfigError::NonPositive {
                field: "defaultClusterRadius",
                value: 0.0
            })
        );
        assert!(MapConfig::from_json(r#"{"defaultClusterMinZoom": 0}"#).is_err());
    }
}
