//! Geographic and screen geometry primitives.

use serde::{Deserialize, Serialize};

/// WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Point in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

/// Screen rectangle used as the map focus area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenRect {
    pub top_left: ScreenPoint,
    pub bottom_right: ScreenPoint,
}

/// Geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    #[serde(rename = "southWestPoint")]
    pub south_west: Point,
    #[serde(rename = "northEastPoint")]
    pub north_east: Point,
}

/// Camera state as reported by the rendering engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPosition {
    pub target: Point,
    pub zoom: f32,
    pub azimuth: f32,
    pub tilt: f32,
}

impl CameraPosition {
    /// Returns the same camera shifted by `step` zoom levels.
    pub fn zoomed_by(self, step: f32) -> Self {
        Self {
            zoom: self.zoom + step,
            ..self
        }
    }
}

/// Four corners of the currently visible map area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibleRegion {
    #[serde(rename = "topLeftPoint")]
    pub top_left: Point,
    #[serde(rename = "topRightPoint")]
    pub top_right: Point,
    #[serde(rename = "bottomLeftPoint")]
    pub bottom_left: Point,
    #[serde(rename = "bottomRightPoint")]
    pub bottom_right: Point,
}

/// Camera animation curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    Smooth,
    Linear,
}

/// Camera animation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    pub kind: AnimationKind,
    /// Duration in seconds.
    pub duration: f32,
}

/// Map gestures that can be toggled by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    Zoom,
    Tilt,
    Rotate,
}

/// Horizontal logo placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
}

/// Vertical logo placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAlignment {
    Top,
    Bottom,
}

/// Logo placement inside the map view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoAlignment {
    pub horizontal: HorizontalAlignment,
    pub vertical: VerticalAlignment,
}

impl LogoAlignment {
    /// Maps host raw enum indexes (`x`, `y`) to an alignment.
    ///
    /// Returns `None` for indexes outside the known range.
    pub fn from_raw(x: u32, y: u32) -> Option<Self> {
        let horizontal = match x {
            0 => HorizontalAlignment::Left,
            1 => HorizontalAlignment::Center,
            2 => HorizontalAlignment::Right,
            _ => return None,
        };
        let vertical = match y {
            0 => VerticalAlignment::Top,
            1 => VerticalAlignment::Bottom,
            _ => return None,
        };
        Some(Self {
            horizontal,
            vertical,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraPosition, HorizontalAlignment, LogoAlignment, Point, VerticalAlignment};

    #[test]
    fn zoomed_by_keeps_target_and_orientation() {
        let camera = CameraPosition {
            target: Point::new(55.75, 37.62),
            zoom: 10.0,
            azimuth: 30.0,
            tilt: 15.0,
        };
        let zoomed = camera.zoomed_by(-1.0);
        assert_eq!(zoomed.zoom, 9.0);
        assert_eq!(zoomed.target, camera.target);
        assert_eq!(zoomed.azimuth, 30.0);
        assert_eq!(zoomed.tilt, 15.0);
    }

    #[test]
    fn logo_alignment_maps_raw_indexes() {
        let alignment = LogoAlignment::from_raw(2, 1).expect("known indexes");
        assert_eq!(alignment.horizontal, HorizontalAlignment::Right);
        assert_eq!(alignment.vertical, VerticalAlignment::Bottom);
        assert!(LogoAlignment::from_raw(3, 0).is_none());
        assert!(LogoAlignment::from_raw(0, 2).is_none());
    }
}
