//! Per-map aggregate owning the engine and every overlay component.
//!
//! # Responsibility
//! - Compose `OverlayStore`, `ClusterPipeline` and `CameraTracker` around
//!   one rendering engine and keep them consistent across clears.
//! - Provide typed map settings and camera operations.
//!
//! # Invariants
//! - All state is owned by one controller and mutated from one context.
//! - A clear purges pending clusters of the cleared collections.
//! - A root clear forgets the tracking marker, which the engine dropped.

use crate::cluster::{ClusterPipeline, StyleOutcome};
use crate::config::MapConfig;
use crate::engine::{EngineCluster, EngineHandle, RenderEngine, Subscription};
use crate::error::OverlayResult;
use crate::model::cluster::{Cluster, ClusterKey};
use crate::model::geometry::{
    Animation, BoundingBox, CameraPosition, Gesture, LogoAlignment, Point, ScreenRect,
    VisibleRegion,
};
use crate::model::overlay::{
    Circle, CollectionId, CollectionKind, CollectionNode, ObjectId, ObjectKind, Polygon, Polyline,
};
use crate::model::style::{Icon, PlacemarkStyle, PolylineStyle, ShapeStyle, UserLayerStyle};
use crate::store::{ClearReport, OverlayStore};
use crate::tracking::{CameraTracker, TrackingState, TrackingTemplate};
use log::{debug, info};
use serde::Serialize;

/// Marker id with its owning collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerEntry {
    pub id: ObjectId,
    pub collection_id: Option<CollectionId>,
}

/// Read-only diagnostic view of one map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSnapshot {
    pub collections: Vec<CollectionNode>,
    pub markers: Vec<MarkerEntry>,
    pub polylines: Vec<ObjectId>,
    pub polygons: Vec<ObjectId>,
    pub circles: Vec<ObjectId>,
    pub pending_clusters: Vec<ClusterKey>,
    pub tracking: TrackingState,
}

pub struct MapController<E: RenderEngine> {
    config: MapConfig,
    engine: E,
    store: OverlayStore,
    clusters: ClusterPipeline,
    tracker: CameraTracker,
}

impl<E: RenderEngine> MapController<E> {
    /// Wraps `engine` and registers the map input and size listeners.
    pub fn new(mut engine: E, config: MapConfig) -> Self {
        engine.subscribe(Subscription::MapInput);
        engine.subscribe(Subscription::SizeChanged);
        Self {
            config,
            engine,
            store: OverlayStore::new(),
            clusters: ClusterPipeline::new(),
            tracker: CameraTracker::new(),
        }
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn store(&self) -> &OverlayStore {
        &self.store
    }

    pub fn clusters(&self) -> &ClusterPipeline {
        &self.clusters
    }

    pub fn tracker(&self) -> &CameraTracker {
        &self.tracker
    }

    pub fn add_collection(
        &mut self,
        id: CollectionId,
        parent_id: Option<CollectionId>,
        clusterized: bool,
    ) -> OverlayResult<CollectionNode> {
        let kind = if clusterized {
            CollectionKind::Clusterized
        } else {
            CollectionKind::Plain
        };
        self.store
            .create_collection(&mut self.engine, id, parent_id, kind)
    }

    pub fn add_placemark(
        &mut self,
        id: ObjectId,
        collection_id: Option<CollectionId>,
        point: Point,
        style: PlacemarkStyle,
    ) -> OverlayResult<()> {
        self.store
            .add_marker(&mut self.engine, id, collection_id, point, style)
    }

    pub fn add_placemarks(
        &mut self,
        collection_id: Option<CollectionId>,
        points: &[Point],
        ids: &[ObjectId],
        icon: Icon,
    ) -> OverlayResult<()> {
        self.store
            .add_markers(&mut self.engine, collection_id, points, ids, icon)
    }

    pub fn remove_placemark(&mut self, id: ObjectId) -> bool {
        self.store.remove_marker(&mut self.engine, id)
    }

    pub fn add_polyline(
        &mut self,
        id: ObjectId,
        polyline: Polyline,
        style: PolylineStyle,
    ) -> OverlayResult<()> {
        self.store
            .add_polyline(&mut self.engine, id, polyline, style)
    }

    pub fn remove_polyline(&mut self, id: ObjectId) -> bool {
        self.store.remove_polyline(&mut self.engine, id)
    }

    pub fn add_polygon(
        &mut self,
        id: ObjectId,
        polygon: Polygon,
        style: ShapeStyle,
    ) -> OverlayResult<()> {
        self.store.add_polygon(&mut self.engine, id, polygon, style)
    }

    pub fn remove_polygon(&mut self, id: ObjectId) -> bool {
        self.store.remove_polygon(&mut self.engine, id)
    }

    pub fn add_circle(&mut self, id: ObjectId, circle: Circle, style: ShapeStyle) -> OverlayResult<()> {
        self.store.add_circle(&mut self.engine, id, circle, style)
    }

    pub fn remove_circle(&mut self, id: ObjectId) -> bool {
        self.store.remove_circle(&mut self.engine, id)
    }

    /// Clears the root (`None`) or one collection subtree.
    pub fn clear(&mut self, collection_id: Option<CollectionId>) -> OverlayResult<ClearReport> {
        let report = self.store.clear(&mut self.engine, collection_id)?;
        let purged = self.clusters.purge(&report);
        if report.root {
            self.tracker.forget_marker();
        }
        debug!(
            "event=clear_followup module=controller status=ok root={} purged_clusters={}",
            report.root, purged
        );
        Ok(report)
    }

    /// Enables clustering, falling back to configured defaults.
    pub fn cluster_placemarks(
        &mut self,
        collection_id: CollectionId,
        radius: Option<f64>,
        min_zoom: Option<u32>,
    ) -> OverlayResult<()> {
        let radius = radius.unwrap_or(self.config.default_cluster_radius);
        let min_zoom = min_zoom.unwrap_or(self.config.default_cluster_min_zoom);
        self.store
            .clusterize(&mut self.engine, collection_id, radius, min_zoom)
    }

    pub fn set_cluster_icon(&mut self, key: ClusterKey, icon: Option<&Icon>) -> StyleOutcome {
        self.clusters.apply_style(&mut self.engine, key, icon)
    }

    /// Records a formed cluster and returns its host payload.
    pub fn cluster_added(&mut self, cluster: &EngineCluster) -> Cluster {
        self.clusters.prune_superseded(&self.engine);
        self.clusters.on_cluster_added(&self.store, cluster)
    }

    pub fn cluster_tapped(&self, cluster: &EngineCluster) -> Cluster {
        self.clusters.on_cluster_tap(&self.store, cluster)
    }

    /// Translates an engine object handle into a caller id.
    pub fn object_for_handle(&self, handle: EngineHandle) -> Option<(ObjectKind, ObjectId)> {
        self.store.registry().lookup_handle(handle)
    }

    /// Follows a camera change; returns whether tracking is active.
    pub fn camera_changed(&mut self, position: &CameraPosition) -> bool {
        if !self.tracker.is_enabled() {
            return false;
        }
        self.tracker.on_camera_changed(&mut self.engine, position);
        true
    }

    pub fn move_camera(&mut self, position: CameraPosition, animation: Option<Animation>) {
        self.engine.move_camera(position, animation);
    }

    pub fn set_bounds(&mut self, bounds: &BoundingBox, animation: Option<Animation>) {
        let position = self.engine.camera_position_for_bounds(bounds);
        self.engine.move_camera(position, animation);
    }

    pub fn zoom_in(&mut self) {
        self.zoom_by(self.config.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_by(-self.config.zoom_step);
    }

    pub fn set_gesture_enabled(&mut self, gesture: Gesture, enabled: bool) {
        self.engine.set_gesture_enabled(gesture, enabled);
    }

    pub fn gesture_enabled(&self, gesture: Gesture) -> bool {
        self.engine.gesture_enabled(gesture)
    }

    pub fn set_night_mode(&mut self, enabled: bool) {
        self.engine.set_night_mode(enabled);
    }

    pub fn set_map_style(&mut self, style: &str) -> bool {
        self.engine.set_map_style(style)
    }

    pub fn set_logo_alignment(&mut self, alignment: LogoAlignment) {
        self.engine.set_logo_alignment(alignment);
    }

    pub fn set_focus_rect(&mut self, rect: Option<ScreenRect>) {
        self.engine.set_focus_rect(rect);
    }

    /// Shows the user layer; returns `false` without location permission.
    pub fn show_user_layer(&mut self, style: &UserLayerStyle) -> bool {
        if !self.engine.has_location_permission() {
            info!("event=user_layer_show module=controller status=noop reason=no_permission");
            return false;
        }
        self.engine.set_user_layer(Some(style));
        true
    }

    pub fn hide_user_layer(&mut self) -> bool {
        if !self.engine.has_location_permission() {
            info!("event=user_layer_hide module=controller status=noop reason=no_permission");
            return false;
        }
        self.engine.set_user_layer(None);
        true
    }

    pub fn enable_camera_tracking(&mut self, template: Option<TrackingTemplate>) -> Point {
        self.tracker.enable(&mut self.engine, template)
    }

    pub fn disable_camera_tracking(&mut self) {
        self.tracker.disable(&mut self.engine);
    }

    pub fn min_zoom(&self) -> f32 {
        self.engine.min_zoom()
    }

    pub fn max_zoom(&self) -> f32 {
        self.engine.max_zoom()
    }

    pub fn zoom(&self) -> f32 {
        self.engine.camera_position().zoom
    }

    pub fn target_point(&self) -> Point {
        self.engine.camera_position().target
    }

    pub fn visible_region(&self) -> VisibleRegion {
        self.engine.visible_region()
    }

    /// `None` without location permission or a visible user layer.
    pub fn user_target_point(&self) -> Option<Point> {
        if !self.engine.has_location_permission() {
            return None;
        }
        self.engine.user_target_point()
    }

    pub fn snapshot(&self) -> MapSnapshot {
        let markers = self
            .store
            .ids(ObjectKind::Marker)
            .into_iter()
            .filter_map(|id| {
                self.store.marker(id).map(|record| MarkerEntry {
                    id,
                    collection_id: record.collection_id,
                })
            })
            .collect();
        MapSnapshot {
            collections: self.store.tree().nodes().cloned().collect(),
            markers,
            polylines: self.store.ids(ObjectKind::Polyline),
            polygons: self.store.ids(ObjectKind::Polygon),
            circles: self.store.ids(ObjectKind::Circle),
            pending_clusters: self.clusters.pending_keys(),
            tracking: self.tracker.state(),
        }
    }

    fn zoom_by(&mut self, step: f32) {
        let position = self.engine.camera_position().zoomed_by(step);
        self.engine
            .move_camera(position, Some(self.config.zoom_animation));
    }
}

#[cfg(test)]
mod tests {
    use super::MapController;
    use crate::config::MapConfig;
    use crate::engine::{MemoryEngine, RenderEngine, Scope, Subscription};
    use crate::model::geometry::Point;
    use crate::model::style::{Icon, PlacemarkStyle, UserLayerStyle};
    use crate::tracking::TrackingTemplate;

    fn controller() -> MapController<MemoryEngine> {
        MapController::new(MemoryEngine::new(), MapConfig::default())
    }

    #[test]
    fn new_subscribes_input_and_size_listeners() {
        let controller = controller();
        assert!(controller.engine().is_subscribed(Subscription::MapInput));
        assert!(controller.engine().is_subscribed(Subscription::SizeChanged));
        assert!(!controller.engine().is_subscribed(Subscription::Camera));
    }

    #[test]
    fn zoom_steps_use_configured_delta() {
        let mut controller = controller();
        let start = controller.zoom();
        controller.zoom_in();
        controller.zoom_in();
        controller.zoom_out();
        assert_eq!(controller.zoom(), start + 1.0);
    }

    #[test]
    fn user_layer_requires_permission() {
        let mut controller = controller();
        let style = UserLayerStyle {
            icon_name: "user.png".to_string(),
            arrow_name: "arrow.png".to_string(),
            user_arrow_orientation: true,
            accuracy_circle_fill_color: crate::model::style::Color(0x2000_00FF),
        };
        controller
            .engine_mut()
            .set_user_location(Some(Point::new(3.0, 4.0)));

        assert!(!controller.show_user_layer(&style));
        assert_eq!(controller.user_target_point(), None);

        controller.engine_mut().set_location_permission(true);
        assert!(controller.show_user_layer(&style));
        assert_eq!(controller.user_target_point(), Some(Point::new(3.0, 4.0)));
        assert!(controller.hide_user_layer());
        assert_eq!(controller.user_target_point(), None);
    }

    #[test]
    fn root_clear_forgets_tracking_marker_and_purges_clusters() {
        let mut controller = controller();
        controller
            .add_collection(1, None, true)
            .expect("leaf collection");
        controller
            .add_placemarks(Some(1), &[Point::new(0.0, 0.0)], &[5], Icon::asset("pin.png"))
            .expect("batch");
        let leaf = controller.store().tree().node(1).expect("leaf").handle;
        let members = controller.engine().children(Scope::Clusterized(leaf));
        let formed = controller.engine_mut().form_cluster(leaf, &members);
        controller.cluster_added(&formed);
        controller.enable_camera_tracking(Some(TrackingTemplate {
            point: Point::new(1.0, 1.0),
            style: PlacemarkStyle::default(),
        }));

        controller.clear(None).expect("root clear");

        let snapshot = controller.snapshot();
        assert!(snapshot.collections.is_empty());
        assert!(snapshot.markers.is_empty());
        assert!(snapshot.pending_clusters.is_empty());
        assert!(snapshot.tracking.enabled);
        assert!(!snapshot.tracking.has_marker);
        assert_eq!(controller.engine().object_count(), 0);

        controller.disable_camera_tracking();
        assert_eq!(controller.engine().rejected_calls(), 0);
        assert!(!controller.engine().cluster_is_valid(formed.key));
    }
}
