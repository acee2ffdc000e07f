//! In-memory rendering engine.
//!
//! # Responsibility
//! - Mirror the engine object tree, camera and map settings in memory.
//! - Record every mutating call as a serializable `EngineCall` so a host can
//!   replay it against a native SDK, and so tests can assert routing.
//!
//! # Invariants
//! - Handles are allocated monotonically and never reused.
//! - `remove`/`clear` calls whose scope variant does not match the real
//!   container kind are rejected (counted, logged, not applied).
//! - A zoom change invalidates every live cluster key.

use crate::engine::{EngineCluster, EngineEvent, EngineHandle, RenderEngine, Scope, Subscription};
use crate::model::cluster::{ClusterAppearance, ClusterKey};
use crate::model::geometry::{
    Animation, BoundingBox, CameraPosition, Gesture, LogoAlignment, Point, ScreenRect,
    VisibleRegion,
};
use crate::model::overlay::{Circle, Polygon, Polyline};
use crate::model::style::{
    Icon, IconSource, PlacemarkStyle, PolylineStyle, ShapeStyle, UserLayerStyle,
};
use log::warn;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

const DEFAULT_MIN_ZOOM: f32 = 0.0;
const DEFAULT_MAX_ZOOM: f32 = 21.0;

/// One mutating engine call, in issue order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum EngineCall {
    CreateCollection {
        handle: EngineHandle,
        parent: Scope,
    },
    CreateClusterizedCollection {
        handle: EngineHandle,
        parent: Scope,
    },
    AddMarker {
        handle: EngineHandle,
        scope: Scope,
        point: Point,
        style: PlacemarkStyle,
    },
    AddMarkers {
        handles: Vec<EngineHandle>,
        scope: Scope,
        points: Vec<Point>,
        icon: Icon,
    },
    AddPolyline {
        handle: EngineHandle,
        polyline: Polyline,
        style: PolylineStyle,
    },
    AddPolygon {
        handle: EngineHandle,
        polygon: Polygon,
        style: ShapeStyle,
    },
    AddCircle {
        handle: EngineHandle,
        circle: Circle,
        style: ShapeStyle,
    },
    MoveMarker {
        marker: EngineHandle,
        point: Point,
    },
    Remove {
        scope: Scope,
        object: EngineHandle,
    },
    Clear {
        scope: Scope,
    },
    Clusterize {
        collection: EngineHandle,
        radius: f64,
        min_zoom: u32,
    },
    SetClusterIcon {
        key: ClusterKey,
        icon: Icon,
    },
    MoveCamera {
        position: CameraPosition,
        animation: Option<Animation>,
    },
    SetGesture {
        gesture: Gesture,
        enabled: bool,
    },
    SetNightMode {
        enabled: bool,
    },
    SetMapStyle {
        style: String,
    },
    SetLogoAlignment {
        alignment: LogoAlignment,
    },
    SetFocusRect {
        rect: Option<ScreenRect>,
    },
    Subscribe {
        subscription: Subscription,
    },
    Unsubscribe {
        subscription: Subscription,
    },
    SetUserLayer {
        style: Option<UserLayerStyle>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectShape {
    Collection,
    ClusterizedCollection,
    Marker,
    Polyline,
    Polygon,
    Circle,
}

#[derive(Debug, Clone)]
struct MemoryObject {
    /// `None` means the root collection.
    parent: Option<EngineHandle>,
    shape: ObjectShape,
    point: Option<Point>,
}

/// Rendering engine kept entirely in memory.
#[derive(Debug)]
pub struct MemoryEngine {
    next_handle: u64,
    next_cluster_key: ClusterKey,
    objects: BTreeMap<EngineHandle, MemoryObject>,
    clusters: BTreeMap<ClusterKey, EngineHandle>,
    cluster_icons: BTreeMap<ClusterKey, Vec<Icon>>,
    clustering: BTreeMap<EngineHandle, (f64, u32)>,
    camera: CameraPosition,
    zoom_range: (f32, f32),
    size: (u32, u32),
    gestures: BTreeMap<Gesture, bool>,
    night_mode: bool,
    map_style: Option<String>,
    logo: Option<LogoAlignment>,
    focus_rect: Option<ScreenRect>,
    subscriptions: BTreeSet<Subscription>,
    location_permission: bool,
    user_layer: Option<UserLayerStyle>,
    user_location: Option<Point>,
    calls: Vec<EngineCall>,
    rejected_calls: usize,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            next_cluster_key: 1,
            objects: BTreeMap::new(),
            clusters: BTreeMap::new(),
            cluster_icons: BTreeMap::new(),
            clustering: BTreeMap::new(),
            camera: CameraPosition {
                target: Point::new(0.0, 0.0),
                zoom: 1.0,
                azimuth: 0.0,
                tilt: 0.0,
            },
            zoom_range: (DEFAULT_MIN_ZOOM, DEFAULT_MAX_ZOOM),
            size: (0, 0),
            gestures: [Gesture::Zoom, Gesture::Tilt, Gesture::Rotate]
                .into_iter()
                .map(|gesture| (gesture, true))
                .collect(),
            night_mode: false,
            map_style: None,
            logo: None,
            focus_rect: None,
            subscriptions: BTreeSet::new(),
            location_permission: false,
            user_layer: None,
            user_location: None,
            calls: Vec::new(),
            rejected_calls: 0,
        }
    }

    /// Applies state carried by a native callback (camera, size, clusters).
    pub fn apply_event(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::CameraPositionChanged { position, .. } => self.set_camera(*position),
            EngineEvent::SizeChanged { width, height } => self.size = (*width, *height),
            EngineEvent::ClusterAdded { cluster } => {
                self.clusters.insert(cluster.key, cluster.collection);
            }
            EngineEvent::MapTap { .. }
            | EngineEvent::MapLongTap { .. }
            | EngineEvent::ObjectTap { .. }
            | EngineEvent::ClusterTap { .. } => {}
        }
    }

    /// Groups live markers of a clusterized collection into a new cluster.
    ///
    /// The centroid is the mean of member positions.
    pub fn form_cluster(
        &mut self,
        collection: EngineHandle,
        members: &[EngineHandle],
    ) -> EngineCluster {
        let key = self.next_cluster_key;
        self.next_cluster_key += 1;

        let points = members
            .iter()
            .filter_map(|handle| self.objects.get(handle).and_then(|object| object.point))
            .collect::<Vec<_>>();
        let count = points.len().max(1) as f64;
        let geometry = Point::new(
            points.iter().map(|point| point.latitude).sum::<f64>() / count,
            points.iter().map(|point| point.longitude).sum::<f64>() / count,
        );

        self.clusters.insert(key, collection);
        EngineCluster {
            key,
            collection,
            members: members.to_vec(),
            appearance: ClusterAppearance {
                opacity: 1.0,
                direction: 0.0,
                z_index: 0.0,
                geometry,
            },
            size: members.len() as u32,
        }
    }

    pub fn set_location_permission(&mut self, granted: bool) {
        self.location_permission = granted;
    }

    pub fn set_user_location(&mut self, location: Option<Point>) {
        self.user_location = location;
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    /// Drains the call log for replay.
    pub fn take_calls(&mut self) -> Vec<EngineCall> {
        std::mem::take(&mut self.calls)
    }

    /// Number of `remove`/`clear` calls rejected for a mismatched scope.
    pub fn rejected_calls(&self) -> usize {
        self.rejected_calls
    }

    pub fn contains(&self, handle: EngineHandle) -> bool {
        self.objects.contains_key(&handle)
    }

    /// Returns the live parent of an object (`Some(None)` means root).
    pub fn parent_of(&self, handle: EngineHandle) -> Option<Option<EngineHandle>> {
        self.objects.get(&handle).map(|object| object.parent)
    }

    pub fn marker_point(&self, handle: EngineHandle) -> Option<Point> {
        self.objects.get(&handle).and_then(|object| object.point)
    }

    /// Direct children of a scope.
    pub fn children(&self, scope: Scope) -> Vec<EngineHandle> {
        let parent = scope.handle();
        self.objects
            .iter()
            .filter(|(_, object)| object.parent == parent)
            .map(|(handle, _)| *handle)
            .collect()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn cluster_icons(&self, key: ClusterKey) -> &[Icon] {
        self.cluster_icons
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn clustering(&self, collection: EngineHandle) -> Option<(f64, u32)> {
        self.clustering.get(&collection).copied()
    }

    pub fn is_subscribed(&self, subscription: Subscription) -> bool {
        self.subscriptions.contains(&subscription)
    }

    pub fn night_mode(&self) -> bool {
        self.night_mode
    }

    pub fn map_style(&self) -> Option<&str> {
        self.map_style.as_deref()
    }

    pub fn logo_alignment(&self) -> Option<LogoAlignment> {
        self.logo
    }

    pub fn focus_rect(&self) -> Option<ScreenRect> {
        self.focus_rect
    }

    pub fn user_layer(&self) -> Option<&UserLayerStyle> {
        self.user_layer.as_ref()
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    fn allocate(&mut self, parent: Option<EngineHandle>, shape: ObjectShape, point: Option<Point>) -> EngineHandle {
        let handle = EngineHandle(self.next_handle);
        self.next_handle += 1;
        self.objects.insert(
            handle,
            MemoryObject {
                parent,
                shape,
                point,
            },
        );
        handle
    }

    fn set_camera(&mut self, position: CameraPosition) {
        let (min_zoom, max_zoom) = self.zoom_range;
        let zoom = position.zoom.clamp(min_zoom, max_zoom);
        if zoom != self.camera.zoom {
            self.clusters.clear();
        }
        self.camera = CameraPosition { zoom, ..position };
    }

    fn scope_matches(&self, scope: Scope) -> bool {
        match scope {
            Scope::Root => true,
            Scope::Plain(handle) => self.shape_of(handle) == Some(ObjectShape::Collection),
            Scope::Clusterized(handle) => {
                self.shape_of(handle) == Some(ObjectShape::ClusterizedCollection)
            }
        }
    }

    fn shape_of(&self, handle: EngineHandle) -> Option<ObjectShape> {
        self.objects.get(&handle).map(|object| object.shape)
    }

    fn descendants_of(&self, root: Option<EngineHandle>) -> BTreeSet<EngineHandle> {
        let mut found = BTreeSet::new();
        let mut frontier = vec![root];
        while let Some(parent) = frontier.pop() {
            for (handle, object) in &self.objects {
                if object.parent == parent && found.insert(*handle) {
                    frontier.push(Some(*handle));
                }
            }
        }
        found
    }

    fn reject(&mut self, operation: &str, scope: Scope) {
        self.rejected_calls += 1;
        warn!(
            "event=engine_call_rejected module=memory_engine status=error op={} scope={:?}",
            operation, scope
        );
    }
}

impl RenderEngine for MemoryEngine {
    fn create_collection(&mut self, parent: Scope) -> EngineHandle {
        let handle = self.allocate(parent.handle(), ObjectShape::Collection, None);
        self.calls.push(EngineCall::CreateCollection { handle, parent });
        handle
    }

    fn create_clusterized_collection(&mut self, parent: Scope) -> EngineHandle {
        let handle = self.allocate(parent.handle(), ObjectShape::ClusterizedCollection, None);
        self.calls
            .push(EngineCall::CreateClusterizedCollection { handle, parent });
        handle
    }

    fn add_marker(&mut self, scope: Scope, point: Point, style: &PlacemarkStyle) -> EngineHandle {
        let handle = self.allocate(scope.handle(), ObjectShape::Marker, Some(point));
        self.calls.push(EngineCall::AddMarker {
            handle,
            scope,
            point,
            style: style.clone(),
        });
        handle
    }

    fn add_markers(&mut self, scope: Scope, points: &[Point], icon: &Icon) -> Vec<EngineHandle> {
        let handles = points
            .iter()
            .map(|point| self.allocate(scope.handle(), ObjectShape::Marker, Some(*point)))
            .collect::<Vec<_>>();
        self.calls.push(EngineCall::AddMarkers {
            handles: handles.clone(),
            scope,
            points: points.to_vec(),
            icon: icon.clone(),
        });
        handles
    }

    fn add_polyline(&mut self, polyline: &Polyline, style: &PolylineStyle) -> EngineHandle {
        let handle = self.allocate(None, ObjectShape::Polyline, None);
        self.calls.push(EngineCall::AddPolyline {
            handle,
            polyline: polyline.clone(),
            style: style.clone(),
        });
        handle
    }

    fn add_polygon(&mut self, polygon: &Polygon, style: &ShapeStyle) -> EngineHandle {
        let handle = self.allocate(None, ObjectShape::Polygon, None);
        self.calls.push(EngineCall::AddPolygon {
            handle,
            polygon: polygon.clone(),
            style: style.clone(),
        });
        handle
    }

    fn add_circle(&mut self, circle: &Circle, style: &ShapeStyle) -> EngineHandle {
        let handle = self.allocate(None, ObjectShape::Circle, Some(circle.center));
        self.calls.push(EngineCall::AddCircle {
            handle,
            circle: *circle,
            style: style.clone(),
        });
        handle
    }

    fn move_marker(&mut self, marker: EngineHandle, point: Point) {
        if let Some(object) = self.objects.get_mut(&marker) {
            object.point = Some(point);
        }
        self.calls.push(EngineCall::MoveMarker { marker, point });
    }

    fn remove(&mut self, scope: Scope, object: EngineHandle) {
        self.calls.push(EngineCall::Remove { scope, object });
        let in_scope = self
            .objects
            .get(&object)
            .is_some_and(|current| current.parent == scope.handle());
        if !self.scope_matches(scope) || !in_scope {
            self.reject("remove", scope);
            return;
        }
        for handle in self.descendants_of(Some(object)) {
            self.objects.remove(&handle);
        }
        self.objects.remove(&object);
    }

    fn clear(&mut self, scope: Scope) {
        self.calls.push(EngineCall::Clear { scope });
        if !self.scope_matches(scope) {
            self.reject("clear", scope);
            return;
        }
        let removed = self.descendants_of(scope.handle());
        for handle in &removed {
            self.objects.remove(handle);
            self.clustering.remove(handle);
        }
        self.clusters.retain(|_, collection| {
            !removed.contains(collection) && Some(*collection) != scope.handle()
        });
    }

    fn clusterize(&mut self, collection: EngineHandle, radius: f64, min_zoom: u32) {
        self.clustering.insert(collection, (radius, min_zoom));
        self.calls.push(EngineCall::Clusterize {
            collection,
            radius,
            min_zoom,
        });
    }

    fn cluster_is_valid(&self, key: ClusterKey) -> bool {
        self.clusters.contains_key(&key)
    }

    fn set_cluster_icon(&mut self, key: ClusterKey, icon: &Icon) -> bool {
        let loadable = match &icon.source {
            IconSource::Asset(name) => !name.trim().is_empty(),
            IconSource::Raw(bytes) => !bytes.is_empty(),
        };
        if !loadable || !self.cluster_is_valid(key) {
            return false;
        }
        self.cluster_icons.entry(key).or_default().push(icon.clone());
        self.calls.push(EngineCall::SetClusterIcon {
            key,
            icon: icon.clone(),
        });
        true
    }

    fn camera_position(&self) -> CameraPosition {
        self.camera
    }

    fn move_camera(&mut self, position: CameraPosition, animation: Option<Animation>) {
        self.set_camera(position);
        self.calls.push(EngineCall::MoveCamera {
            position: self.camera,
            animation,
        });
    }

    fn camera_position_for_bounds(&self, bounds: &BoundingBox) -> CameraPosition {
        let lat_span = (bounds.north_east.latitude - bounds.south_west.latitude).abs();
        let lon_span = (bounds.north_east.longitude - bounds.south_west.longitude).abs();
        let span = lat_span.max(lon_span).max(1e-9);
        let (min_zoom, max_zoom) = self.zoom_range;
        let zoom = ((360.0 / span).log2() as f32).clamp(min_zoom, max_zoom);
        CameraPosition {
            target: Point::new(
                (bounds.north_east.latitude + bounds.south_west.latitude) / 2.0,
                (bounds.north_east.longitude + bounds.south_west.longitude) / 2.0,
            ),
            zoom,
            azimuth: 0.0,
            tilt: 0.0,
        }
    }

    fn min_zoom(&self) -> f32 {
        self.zoom_range.0
    }

    fn max_zoom(&self) -> f32 {
        self.zoom_range.1
    }

    fn visible_region(&self) -> VisibleRegion {
        let span = 360.0 / 2f64.powf(f64::from(self.camera.zoom));
        let half_lat = span / 4.0;
        let half_lon = span / 2.0;
        let center = self.camera.target;
        VisibleRegion {
            top_left: Point::new(center.latitude + half_lat, center.longitude - half_lon),
            top_right: Point::new(center.latitude + half_lat, center.longitude + half_lon),
            bottom_left: Point::new(center.latitude - half_lat, center.longitude - half_lon),
            bottom_right: Point::new(center.latitude - half_lat, center.longitude + half_lon),
        }
    }

    fn gesture_enabled(&self, gesture: Gesture) -> bool {
        self.gestures.get(&gesture).copied().unwrap_or(true)
    }

    fn set_gesture_enabled(&mut self, gesture: Gesture, enabled: bool) {
        self.gestures.insert(gesture, enabled);
        self.calls.push(EngineCall::SetGesture { gesture, enabled });
    }

    fn set_night_mode(&mut self, enabled: bool) {
        self.night_mode = enabled;
        self.calls.push(EngineCall::SetNightMode { enabled });
    }

    fn set_map_style(&mut self, style: &str) -> bool {
        if serde_json::from_str::<serde_json::Value>(style).is_err() {
            return false;
        }
        self.map_style = Some(style.to_string());
        self.calls.push(EngineCall::SetMapStyle {
            style: style.to_string(),
        });
        true
    }

    fn set_logo_alignment(&mut self, alignment: LogoAlignment) {
        self.logo = Some(alignment);
        self.calls.push(EngineCall::SetLogoAlignment { alignment });
    }

    fn set_focus_rect(&mut self, rect: Option<ScreenRect>) {
        self.focus_rect = rect;
        self.calls.push(EngineCall::SetFocusRect { rect });
    }

    fn subscribe(&mut self, subscription: Subscription) {
        if self.subscriptions.insert(subscription) {
            self.calls.push(EngineCall::Subscribe { subscription });
        }
    }

    fn unsubscribe(&mut self, subscription: Subscription) {
        if self.subscriptions.remove(&subscription) {
            self.calls.push(EngineCall::Unsubscribe { subscription });
        }
    }

    fn has_location_permission(&self) -> bool {
        self.location_permission
    }

    fn set_user_layer(&mut self, style: Option<&UserLayerStyle>) {
        self.user_layer = style.cloned();
        self.calls.push(EngineCall::SetUserLayer {
            style: style.cloned(),
        });
    }

    fn user_target_point(&self) -> Option<Point> {
        self.user_layer.as_ref()?;
        self.user_location
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineCall, MemoryEngine};
    use crate::engine::{EngineEvent, RenderEngine, Scope};
    use crate::model::geometry::{CameraPosition, Point};
    use crate::model::style::{Icon, PlacemarkStyle};

    #[test]
    fn remove_rejects_mismatched_scope_variant() {
        let mut engine = MemoryEngine::new();
        let clusterized = engine.create_clusterized_collection(Scope::Root);
        let marker = engine.add_marker(
            Scope::Clusterized(clusterized),
            Point::new(1.0, 2.0),
            &PlacemarkStyle::default(),
        );

        engine.remove(Scope::Plain(clusterized), marker);
        assert_eq!(engine.rejected_calls(), 1);
        assert!(engine.contains(marker));

        engine.remove(Scope::Clusterized(clusterized), marker);
        assert_eq!(engine.rejected_calls(), 1);
        assert!(!engine.contains(marker));
    }

    #[test]
    fn clear_keeps_scope_and_drops_nested_objects() {
        let mut engine = MemoryEngine::new();
        let outer = engine.create_collection(Scope::Root);
        let inner = engine.create_collection(Scope::Plain(outer));
        let marker = engine.add_marker(
            Scope::Plain(inner),
            Point::new(0.0, 0.0),
            &PlacemarkStyle::default(),
        );

        engine.clear(Scope::Plain(outer));
        assert!(engine.contains(outer));
        assert!(!engine.contains(inner));
        assert!(!engine.contains(marker));
        assert_eq!(engine.calls().last(), Some(&EngineCall::Clear { scope: Scope::Plain(outer) }));
    }

    #[test]
    fn zoom_change_invalidates_clusters() {
        let mut engine = MemoryEngine::new();
        let collection = engine.create_clusterized_collection(Scope::Root);
        let cluster = engine.form_cluster(collection, &[]);
        assert!(engine.cluster_is_valid(cluster.key));

        let camera = engine.camera_position();
        engine.apply_event(&EngineEvent::CameraPositionChanged {
            position: CameraPosition {
                zoom: camera.zoom + 2.0,
                ..camera
            },
            finished: true,
        });
        assert!(!engine.cluster_is_valid(cluster.key));
        assert!(!engine.set_cluster_icon(cluster.key, &Icon::asset("cluster.png")));
    }

    #[test]
    fn map_style_requires_json_document() {
        let mut engine = MemoryEngine::new();
        assert!(!engine.set_map_style("not json"));
        assert!(engine.set_map_style("[]"));
        assert_eq!(engine.map_style(), Some("[]"));
    }
}
