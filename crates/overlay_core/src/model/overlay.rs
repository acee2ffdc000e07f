//! Overlay object and collection records.
//!
//! # Invariants
//! - `ObjectId` uniqueness is scoped per `ObjectKind`.
//! - `CollectionId` uniqueness spans both collection kinds.
//! - Only `CollectionKind::Plain` nodes may own child collections.

use crate::engine::EngineHandle;
use crate::model::geometry::Point;
use crate::model::style::{PlacemarkStyle, PolylineStyle, ShapeStyle};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Caller-assigned overlay object identifier.
pub type ObjectId = i64;

/// Caller-assigned collection identifier. `None` in signatures means root.
pub type CollectionId = i64;

/// Overlay object kinds tracked by the identity registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Marker,
    Polyline,
    Polygon,
    Circle,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Marker => "marker",
            Self::Polyline => "polyline",
            Self::Polygon => "polygon",
            Self::Circle => "circle",
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collection node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Nestable collection that can hold markers and child collections.
    Plain,
    /// Leaf collection whose markers are clustered by zoom level.
    Clusterized,
}

/// One node of the collection hierarchy (root excluded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionNode {
    pub id: CollectionId,
    /// Parent collection. `None` means attached to the map root.
    pub parent_id: Option<CollectionId>,
    pub kind: CollectionKind,
    #[serde(skip)]
    pub handle: EngineHandle,
}

impl CollectionNode {
    pub fn is_plain(&self) -> bool {
        self.kind == CollectionKind::Plain
    }
}

/// Polyline geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub coordinates: Vec<Point>,
}

/// Polygon geometry with optional holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Polygon {
    #[serde(rename = "outerRingCoordinates")]
    pub outer_ring: Vec<Point>,
    #[serde(rename = "innerRingsCoordinates", default)]
    pub inner_rings: Vec<Vec<Point>>,
}

/// Circle geometry; radius in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point,
    pub radius: f32,
}

/// Marker bookkeeping mirrored from the last applied configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRecord {
    pub id: ObjectId,
    pub collection_id: Option<CollectionId>,
    pub point: Point,
    pub style: PlacemarkStyle,
}

/// Polyline bookkeeping. Polylines always live under the root.
#[derive(Debug, Clone, PartialEq)]
pub struct PolylineRecord {
    pub id: ObjectId,
    pub polyline: Polyline,
    pub style: PolylineStyle,
}

/// Polygon bookkeeping. Polygons always live under the root.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonRecord {
    pub id: ObjectId,
    pub polygon: Polygon,
    pub style: ShapeStyle,
}

/// Circle bookkeeping. Circles always live under the root.
#[derive(Debug, Clone, PartialEq)]
pub struct CircleRecord {
    pub id: ObjectId,
    pub circle: Circle,
    pub style: ShapeStyle,
}
