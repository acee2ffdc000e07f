//! Styling descriptors mirrored from the last applied host configuration.
//!
//! Image decoding and asset lookup belong to the rendering engine; these
//! types only describe what the host asked for.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 32-bit ARGB color (`0xAARRGGBB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn blue(self) -> u8 {
        self.0 as u8
    }
}

/// Where the engine should load an icon image from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IconSource {
    /// Host asset key.
    #[serde(rename = "iconName")]
    Asset(String),
    /// Encoded image bytes supplied inline.
    #[serde(rename = "rawImageData")]
    Raw(Vec<u8>),
}

/// Icon rotation behavior.
///
/// Hosts send either the raw value (`0`, `1`) or the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawRotationType")]
pub enum RotationType {
    #[default]
    NoRotation,
    Rotate,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRotationType {
    Value(u8),
    Name(String),
}

impl TryFrom<RawRotationType> for RotationType {
    type Error = String;

    fn try_from(raw: RawRotationType) -> Result<Self, Self::Error> {
        match raw {
            RawRotationType::Value(0) => Ok(Self::NoRotation),
            RawRotationType::Value(1) => Ok(Self::Rotate),
            RawRotationType::Name(name) if name == "noRotation" => Ok(Self::NoRotation),
            RawRotationType::Name(name) if name == "rotate" => Ok(Self::Rotate),
            RawRotationType::Value(value) => Err(format!("unknown rotation type: {value}")),
            RawRotationType::Name(name) => Err(format!("unknown rotation type: `{name}`")),
        }
    }
}

/// Normalized point inside an icon image (`0.0..=1.0` on both axes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IconPoint {
    pub x: f64,
    pub y: f64,
}

/// Icon area that reacts to taps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TappableArea {
    pub min: IconPoint,
    pub max: IconPoint,
}

/// Icon presentation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IconStyle {
    pub anchor: IconPoint,
    pub rotation_type: RotationType,
    pub z_index: f32,
    pub scale: f32,
    pub tappable_area: Option<TappableArea>,
}

impl Default for IconStyle {
    fn default() -> Self {
        Self {
            anchor: IconPoint { x: 0.5, y: 0.5 },
            rotation_type: RotationType::NoRotation,
            z_index: 0.0,
            scale: 1.0,
            tappable_area: None,
        }
    }
}

/// Image source plus optional presentation style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Icon {
    #[serde(flatten)]
    pub source: IconSource,
    #[serde(default)]
    pub style: Option<IconStyle>,
}

impl Icon {
    pub fn asset(name: impl Into<String>) -> Self {
        Self {
            source: IconSource::Asset(name.into()),
            style: None,
        }
    }
}

/// Marker styling.
///
/// Engines apply a single `icon` in preference to `composite` when both
/// are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlacemarkStyle {
    pub opacity: f32,
    pub is_draggable: bool,
    pub direction: f32,
    pub is_visible: bool,
    pub z_index: Option<f32>,
    pub icon: Option<Icon>,
    pub composite: Option<BTreeMap<String, Icon>>,
}

impl Default for PlacemarkStyle {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            is_draggable: false,
            direction: 0.0,
            is_visible: true,
            z_index: None,
            icon: None,
            composite: None,
        }
    }
}

/// Polyline stroke styling, applied atomically at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolylineStyle {
    pub stroke_color: Color,
    pub outline_color: Color,
    pub outline_width: f32,
    pub stroke_width: f32,
    pub is_geodesic: bool,
    pub dash_length: f32,
    pub dash_offset: f32,
    pub gap_length: f32,
}

impl Default for PolylineStyle {
    fn default() -> Self {
        Self {
            stroke_color: Color(0xFF00_00FF),
            outline_color: Color(0),
            outline_width: 0.0,
            stroke_width: 5.0,
            is_geodesic: false,
            dash_length: 0.0,
            dash_offset: 0.0,
            gap_length: 0.0,
        }
    }
}

/// Stroke/fill styling shared by polygons and circles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShapeStyle {
    pub stroke_color: Color,
    pub stroke_width: f32,
    pub fill_color: Color,
    pub is_geodesic: bool,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke_color: Color(0xFF00_00FF),
            stroke_width: 5.0,
            fill_color: Color(0xFF00_FF00),
            is_geodesic: false,
        }
    }
}

/// Appearance of the user-location layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLayerStyle {
    pub icon_name: String,
    pub arrow_name: String,
    #[serde(default)]
    pub user_arrow_orientation: bool,
    #[serde(default = "default_accuracy_circle_fill_color")]
    pub accuracy_circle_fill_color: Color,
}

fn default_accuracy_circle_fill_color() -> Color {
    Color(0x1F69_B04A)
}
