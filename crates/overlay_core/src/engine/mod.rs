//! Rendering engine contract consumed by the overlay core.
//!
//! # Responsibility
//! - Describe the capability set the core needs from a spatial renderer
//!   (object creation/removal, camera, map settings, subscriptions).
//! - Define the callback events the renderer feeds back into the core.
//!
//! # Invariants
//! - All engine calls are synchronous and run on the map owner context.
//! - `EngineHandle` values never cross the host boundary as object ids.
//! - Removal/clear entry points are selected by the `Scope` variant only.

pub mod memory;

use crate::model::cluster::{ClusterAppearance, ClusterKey};
use crate::model::geometry::{
    Animation, BoundingBox, CameraPosition, Gesture, LogoAlignment, Point, ScreenRect,
    VisibleRegion,
};
use crate::model::overlay::{Circle, Polygon, Polyline};
use crate::model::style::{Icon, PlacemarkStyle, PolylineStyle, ShapeStyle, UserLayerStyle};
use serde::{Deserialize, Serialize};

pub use memory::{EngineCall, MemoryEngine};

/// Opaque engine object handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineHandle(pub u64);

/// Target container for engine object operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "handle", rename_all = "snake_case")]
pub enum Scope {
    /// The map's implicit root collection.
    Root,
    /// A nestable collection.
    Plain(EngineHandle),
    /// A clustering leaf collection.
    Clusterized(EngineHandle),
}

impl Scope {
    /// Returns whether the scope may hold child collections.
    pub fn is_plain(self) -> bool {
        matches!(self, Self::Root | Self::Plain(_))
    }

    pub fn handle(self) -> Option<EngineHandle> {
        match self {
            Self::Root => None,
            Self::Plain(handle) | Self::Clusterized(handle) => Some(handle),
        }
    }
}

/// Persistent engine listeners the core can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subscription {
    /// Map tap and long-tap input.
    MapInput,
    /// Map view size changes.
    SizeChanged,
    /// Camera position changes.
    Camera,
}

/// Cluster as reported by the engine, before member resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineCluster {
    pub key: ClusterKey,
    /// Clusterized collection the cluster belongs to.
    pub collection: EngineHandle,
    pub members: Vec<EngineHandle>,
    pub appearance: ClusterAppearance,
    pub size: u32,
}

/// Callbacks emitted by the rendering engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    MapTap {
        point: Point,
    },
    MapLongTap {
        point: Point,
    },
    ObjectTap {
        object: EngineHandle,
        point: Point,
    },
    CameraPositionChanged {
        position: CameraPosition,
        finished: bool,
    },
    SizeChanged {
        width: u32,
        height: u32,
    },
    ClusterAdded {
        cluster: EngineCluster,
    },
    ClusterTap {
        cluster: EngineCluster,
    },
}

/// Capability set of the external spatial-rendering service.
pub trait RenderEngine {
    /// Creates a nested plain collection inside `parent`.
    fn create_collection(&mut self, parent: Scope) -> EngineHandle;
    /// Creates a clusterized leaf collection inside `parent`.
    fn create_clusterized_collection(&mut self, parent: Scope) -> EngineHandle;
    /// Adds one styled marker.
    fn add_marker(&mut self, scope: Scope, point: Point, style: &PlacemarkStyle) -> EngineHandle;
    /// Adds markers sharing one icon in a single call; returns handles in input order.
    fn add_markers(&mut self, scope: Scope, points: &[Point], icon: &Icon) -> Vec<EngineHandle>;
    /// Adds a styled polyline under the root.
    fn add_polyline(&mut self, polyline: &Polyline, style: &PolylineStyle) -> EngineHandle;
    /// Adds a styled polygon under the root.
    fn add_polygon(&mut self, polygon: &Polygon, style: &ShapeStyle) -> EngineHandle;
    /// Adds a styled circle under the root.
    fn add_circle(&mut self, circle: &Circle, style: &ShapeStyle) -> EngineHandle;
    /// Moves an existing marker.
    fn move_marker(&mut self, marker: EngineHandle, point: Point);
    /// Removes one object through the scope's native deletion entry point.
    fn remove(&mut self, scope: Scope, object: EngineHandle);
    /// Removes every object beneath `scope`; the scope itself survives.
    fn clear(&mut self, scope: Scope);
    /// Enables clustering on a clusterized collection.
    fn clusterize(&mut self, collection: EngineHandle, radius: f64, min_zoom: u32);
    /// Returns whether a cluster key is still shown.
    fn cluster_is_valid(&self, key: ClusterKey) -> bool;
    /// Applies an icon to a live cluster; returns `false` when the image
    /// could not be loaded.
    fn set_cluster_icon(&mut self, key: ClusterKey, icon: &Icon) -> bool;

    fn camera_position(&self) -> CameraPosition;
    fn move_camera(&mut self, position: CameraPosition, animation: Option<Animation>);
    /// Computes a camera that fits `bounds`.
    fn camera_position_for_bounds(&self, bounds: &BoundingBox) -> CameraPosition;
    fn min_zoom(&self) -> f32;
    fn max_zoom(&self) -> f32;
    fn visible_region(&self) -> VisibleRegion;

    fn gesture_enabled(&self, gesture: Gesture) -> bool;
    fn set_gesture_enabled(&mut self, gesture: Gesture, enabled: bool);
    fn set_night_mode(&mut self, enabled: bool);
    /// Applies a style document; returns `false` when the engine rejects it.
    fn set_map_style(&mut self, style: &str) -> bool;
    fn set_logo_alignment(&mut self, alignment: LogoAlignment);
    /// Sets (or clears) the focus rect and switches the point of view accordingly.
    fn set_focus_rect(&mut self, rect: Option<ScreenRect>);

    fn subscribe(&mut self, subscription: Subscription);
    fn unsubscribe(&mut self, subscription: Subscription);

    fn has_location_permission(&self) -> bool;
    /// Shows the user-location layer with `style`, or hides it on `None`.
    fn set_user_layer(&mut self, style: Option<&UserLayerStyle>);
    fn user_target_point(&self) -> Option<Point>;
}
