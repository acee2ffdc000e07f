//! Overlay object store.
//!
//! # Responsibility
//! - Own per-kind object records and their collection membership.
//! - Drive add/remove/clear against the rendering engine with cascade
//!   semantics over the collection tree.
//!
//! # Invariants
//! - The store is the only writer of `IdentityRegistry` and `CollectionTree`.
//! - Validation runs before any engine call; a failed request mutates nothing.
//! - Every marker record has an owner entry in `members`.
//! - Polylines, polygons and circles always live under the root.
//! - Removing an unknown id is a no-op.
//!
//! # See also
//! - `tree` for hierarchy validation.
//! - `cluster` for pipeline cleanup after a clear.

use crate::engine::{EngineHandle, RenderEngine, Scope};
use crate::error::{OverlayError, OverlayResult};
use crate::model::geometry::Point;
use crate::model::overlay::{
    Circle, CircleRecord, CollectionId, CollectionKind, CollectionNode, MarkerRecord, ObjectId,
    ObjectKind, Polygon, PolygonRecord, Polyline, PolylineRecord,
};
use crate::model::style::{Icon, PlacemarkStyle, PolylineStyle, ShapeStyle};
use crate::registry::IdentityRegistry;
use crate::tree::CollectionTree;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Summary of one clear operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Whether the implicit root was cleared.
    pub root: bool,
    /// Cleared collection plus every collection dropped beneath it.
    pub collections: BTreeSet<CollectionId>,
    /// Number of overlay objects dropped.
    pub objects: usize,
}

impl ClearReport {
    /// Returns whether objects formed in `collection_id` were affected.
    pub fn covers(&self, collection_id: Option<CollectionId>) -> bool {
        if self.root {
            return true;
        }
        collection_id.is_some_and(|id| self.collections.contains(&id))
    }
}

/// Per-kind overlay records plus collection hierarchy.
#[derive(Debug, Default)]
pub struct OverlayStore {
    registry: IdentityRegistry,
    tree: CollectionTree,
    markers: BTreeMap<ObjectId, MarkerRecord>,
    /// Owner index: `None` key lists markers attached to the root.
    members: BTreeMap<Option<CollectionId>, BTreeSet<ObjectId>>,
    polylines: BTreeMap<ObjectId, PolylineRecord>,
    polygons: BTreeMap<ObjectId, PolygonRecord>,
    circles: BTreeMap<ObjectId, CircleRecord>,
}

impl OverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn tree(&self) -> &CollectionTree {
        &self.tree
    }

    /// Creates a plain or clusterized collection.
    pub fn create_collection<E: RenderEngine>(
        &mut self,
        engine: &mut E,
        id: CollectionId,
        parent_id: Option<CollectionId>,
        kind: CollectionKind,
    ) -> OverlayResult<CollectionNode> {
        self.tree.create_collection(engine, id, parent_id, kind)
    }

    /// Adds one styled marker to a collection (root when `None`).
    pub fn add_marker<E: RenderEngine>(
        &mut self,
        engine: &mut E,
        id: ObjectId,
        collection_id: Option<CollectionId>,
        point: Point,
        style: PlacemarkStyle,
    ) -> OverlayResult<()> {
        let scope = self.tree.resolve(collection_id)?;
        self.registry.ensure_available(ObjectKind::Marker, id)?;

        let handle = engine.add_marker(scope, point, &style);
        self.registry.register(ObjectKind::Marker, id, handle)?;
        self.attach_marker(MarkerRecord {
            id,
            collection_id,
            point,
            style,
        });
        debug!(
            "event=marker_add module=store status=ok marker_id={} collection_id={:?}",
            id, collection_id
        );
        Ok(())
    }

    /// Adds markers sharing one icon through a single engine call.
    ///
    /// `points[i]` receives `ids[i]`. Fails without adding anything when the
    /// lengths differ or any id is taken (or repeated within the batch).
    pub fn add_markers<E: RenderEngine>(
        &mut self,
        engine: &mut E,
        collection_id: Option<CollectionId>,
        points: &[Point],
        ids: &[ObjectId],
        icon: Icon,
    ) -> OverlayResult<()> {
        let scope = self.tree.resolve(collection_id)?;
        if points.len() != ids.len() {
            return Err(OverlayError::LengthMismatch {
                points: points.len(),
                ids: ids.len(),
            });
        }
        let mut seen = BTreeSet::new();
        for id in ids {
            self.registry.ensure_available(ObjectKind::Marker, *id)?;
            if !seen.insert(*id) {
                return Err(OverlayError::DuplicateId {
                    kind: ObjectKind::Marker,
                    id: *id,
                });
            }
        }

        let handles = engine.add_markers(scope, points, &icon);
        if handles.len() != points.len() {
            warn!(
                "event=marker_batch_add module=store status=error reason=handle_count expected={} actual={}",
                points.len(),
                handles.len()
            );
            for handle in &handles {
                engine.remove(scope, *handle);
            }
            return Err(OverlayError::EngineRejected {
                expected: points.len(),
                created: handles.len(),
            });
        }
        let style = PlacemarkStyle {
            icon: Some(icon),
            ..PlacemarkStyle::default()
        };
        for ((handle, point), id) in handles.into_iter().zip(points).zip(ids) {
            self.registry.register(ObjectKind::Marker, *id, handle)?;
            self.attach_marker(MarkerRecord {
                id: *id,
                collection_id,
                point: *point,
                style: style.clone(),
            });
        }
        debug!(
            "event=marker_batch_add module=store status=ok count={} collection_id={:?}",
            ids.len(),
            collection_id
        );
        Ok(())
    }

    /// Removes one marker through its owning collection's entry point.
    ///
    /// Returns `false` when the id is unknown.
    pub fn remove_marker<E: RenderEngine>(&mut self, engine: &mut E, id: ObjectId) -> bool {
        let Some(record) = self.detach_marker(id) else {
            debug!("event=marker_remove module=store status=noop marker_id={}", id);
            return false;
        };
        let Some(handle) = self.registry.unregister(ObjectKind::Marker, id) else {
            return false;
        };
        match self.tree.resolve(record.collection_id) {
            Ok(scope) => engine.remove(scope, handle),
            Err(err) => warn!(
                "event=marker_remove module=store status=error marker_id={} error={}",
                id, err
            ),
        }
        true
    }

    /// Looks up the live owner of a marker.
    pub fn marker_owner(&self, id: ObjectId) -> OverlayResult<Option<CollectionId>> {
        self.markers
            .get(&id)
            .map(|record| record.collection_id)
            .ok_or(OverlayError::ObjectNotFound {
                kind: ObjectKind::Marker,
                id,
            })
    }

    pub fn marker(&self, id: ObjectId) -> Option<&MarkerRecord> {
        self.markers.get(&id)
    }

    pub fn add_polyline<E: RenderEngine>(
        &mut self,
        engine: &mut E,
        id: ObjectId,
        polyline: Polyline,
        style: PolylineStyle,
    ) -> OverlayResult<()> {
        self.registry.ensure_available(ObjectKind::Polyline, id)?;
        let handle = engine.add_polyline(&polyline, &style);
        self.registry.register(ObjectKind::Polyline, id, handle)?;
        self.polylines.insert(
            id,
            PolylineRecord {
                id,
                polyline,
                style,
            },
        );
        Ok(())
    }

    pub fn remove_polyline<E: RenderEngine>(&mut self, engine: &mut E, id: ObjectId) -> bool {
        self.polylines.remove(&id);
        self.remove_root_object(engine, ObjectKind::Polyline, id)
    }

    pub fn add_polygon<E: RenderEngine>(
        &mut self,
        engine: &mut E,
        id: ObjectId,
        polygon: Polygon,
        style: ShapeStyle,
    ) -> OverlayResult<()> {
        self.registry.ensure_available(ObjectKind::Polygon, id)?;
        let handle = engine.add_polygon(&polygon, &style);
        self.registry.register(ObjectKind::Polygon, id, handle)?;
        self.polygons.insert(id, PolygonRecord { id, polygon, style });
        Ok(())
    }

    pub fn remove_polygon<E: RenderEngine>(&mut self, engine: &mut E, id: ObjectId) -> bool {
        self.polygons.remove(&id);
        self.remove_root_object(engine, ObjectKind::Polygon, id)
    }

    pub fn add_circle<E: RenderEngine>(
        &mut self,
        engine: &mut E,
        id: ObjectId,
        circle: Circle,
        style: ShapeStyle,
    ) -> OverlayResult<()> {
        self.registry.ensure_available(ObjectKind::Circle, id)?;
        let handle = engine.add_circle(&circle, &style);
        self.registry.register(ObjectKind::Circle, id, handle)?;
        self.circles.insert(id, CircleRecord { id, circle, style });
        Ok(())
    }

    pub fn remove_circle<E: RenderEngine>(&mut self, engine: &mut E, id: ObjectId) -> bool {
        self.circles.remove(&id);
        self.remove_root_object(engine, ObjectKind::Circle, id)
    }

    /// Enables clustering on a clusterized collection.
    ///
    /// Unknown ids and plain collections are reported as not found.
    pub fn clusterize<E: RenderEngine>(
        &mut self,
        engine: &mut E,
        collection_id: CollectionId,
        radius: f64,
        min_zoom: u32,
    ) -> OverlayResult<()> {
        match self.tree.resolve(Some(collection_id))? {
            Scope::Clusterized(handle) => {
                engine.clusterize(handle, radius, min_zoom);
                Ok(())
            }
            Scope::Root | Scope::Plain(_) => {
                Err(OverlayError::CollectionNotFound(collection_id))
            }
        }
    }

    /// Clears the root (`None`) or one collection subtree.
    ///
    /// A scoped clear keeps the target collection itself alive.
    pub fn clear<E: RenderEngine>(
        &mut self,
        engine: &mut E,
        collection_id: Option<CollectionId>,
    ) -> OverlayResult<ClearReport> {
        let Some(collection_id) = collection_id else {
            return Ok(self.clear_root(engine));
        };

        let scope = self.tree.resolve(Some(collection_id))?;
        let mut collections = self.tree.descendant_ids(Some(collection_id));
        collections.insert(collection_id);

        let mut objects = 0;
        for owner in &collections {
            let Some(ids) = self.members.remove(&Some(*owner)) else {
                continue;
            };
            for id in ids {
                self.markers.remove(&id);
                self.registry.unregister(ObjectKind::Marker, id);
                objects += 1;
            }
        }
        self.tree.detach_descendants(collection_id)?;
        engine.clear(scope);

        info!(
            "event=collection_clear module=store status=ok collection_id={} collections={} objects={}",
            collection_id,
            collections.len(),
            objects
        );
        Ok(ClearReport {
            root: false,
            collections,
            objects,
        })
    }

    /// Ids of one kind, ascending.
    pub fn ids(&self, kind: ObjectKind) -> Vec<ObjectId> {
        match kind {
            ObjectKind::Marker => self.markers.keys().copied().collect(),
            ObjectKind::Polyline => self.polylines.keys().copied().collect(),
            ObjectKind::Polygon => self.polygons.keys().copied().collect(),
            ObjectKind::Circle => self.circles.keys().copied().collect(),
        }
    }

    /// Markers owned directly by a collection (`None` is the root).
    pub fn markers_in(&self, collection_id: Option<CollectionId>) -> Vec<ObjectId> {
        self.members
            .get(&collection_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns whether every per-kind sequence and the tree are empty.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
            && self.polylines.is_empty()
            && self.polygons.is_empty()
            && self.circles.is_empty()
            && self.tree.is_empty()
    }

    /// Translates an engine handle to a caller marker id.
    pub fn marker_id_for_handle(&self, handle: EngineHandle) -> Option<ObjectId> {
        match self.registry.lookup_handle(handle) {
            Some((ObjectKind::Marker, id)) => Some(id),
            _ => None,
        }
    }

    fn clear_root<E: RenderEngine>(&mut self, engine: &mut E) -> ClearReport {
        let objects = self.registry.len();
        let collections = self
            .tree
            .clear()
            .into_iter()
            .map(|node| node.id)
            .collect::<BTreeSet<_>>();
        self.registry.clear();
        self.markers.clear();
        self.members.clear();
        self.polylines.clear();
        self.polygons.clear();
        self.circles.clear();
        engine.clear(Scope::Root);

        info!(
            "event=root_clear module=store status=ok collections={} objects={}",
            collections.len(),
            objects
        );
        ClearReport {
            root: true,
            collections,
            objects,
        }
    }

    fn remove_root_object<E: RenderEngine>(
        &mut self,
        engine: &mut E,
        kind: ObjectKind,
        id: ObjectId,
    ) -> bool {
        match self.registry.unregister(kind, id) {
            Some(handle) => {
                engine.remove(Scope::Root, handle);
                true
            }
            None => {
                debug!("event={}_remove module=store status=noop id={}", kind, id);
                false
            }
        }
    }

    fn attach_marker(&mut self, record: MarkerRecord) {
        self.members
            .entry(record.collection_id)
            .or_default()
            .insert(record.id);
        self.markers.insert(record.id, record);
    }

    fn detach_marker(&mut self, id: ObjectId) -> Option<MarkerRecord> {
        let record = self.markers.remove(&id)?;
        if let Some(ids) = self.members.get_mut(&record.collection_id) {
            ids.remove(&id);
            if ids.is_empty() {
                self.members.remove(&record.collection_id);
            }
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::OverlayStore;
    use crate::engine::{EngineCall, MemoryEngine, Scope};
    use crate::error::OverlayError;
    use crate::model::geometry::Point;
    use crate::model::overlay::{CollectionKind, ObjectKind};
    use crate::model::style::{Icon, PlacemarkStyle};

    fn point() -> Point {
        Point::new(55.75, 37.61)
    }

    #[test]
    fn add_marker_rejects_duplicate_before_engine_call() {
        let mut engine = MemoryEngine::new();
        let mut store = OverlayStore::new();
        store
            .add_marker(&mut engine, 1, None, point(), PlacemarkStyle::default())
            .expect("first marker");
        let calls = engine.calls().len();

        let err = store
            .add_marker(&mut engine, 1, None, point(), PlacemarkStyle::default())
            .expect_err("duplicate marker");
        assert_eq!(
            err,
            OverlayError::DuplicateId {
                kind: ObjectKind::Marker,
                id: 1
            }
        );
        assert_eq!(engine.calls().len(), calls);
    }

    #[test]
    fn add_marker_into_unknown_collection_is_not_found() {
        let mut engine = MemoryEngine::new();
        let mut store = OverlayStore::new();
        let err = store
            .add_marker(&mut engine, 1, Some(4), point(), PlacemarkStyle::default())
            .expect_err("unknown collection");
        assert!(err.is_not_found());
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn batch_rejects_repeated_id_within_batch() {
        let mut engine = MemoryEngine::new();
        let mut store = OverlayStore::new();
        let err = store
            .add_markers(
                &mut engine,
                None,
                &[point(), point()],
                &[3, 3],
                Icon::asset("pin.png"),
            )
            .expect_err("repeated id");
        assert!(matches!(err, OverlayError::DuplicateId { id: 3, .. }));
        assert!(store.ids(ObjectKind::Marker).is_empty());
        assert_eq!(engine.object_count(), 0);
    }

    #[test]
    fn remove_marker_routes_by_owner_kind() {
        let mut engine = MemoryEngine::new();
        let mut store = OverlayStore::new();
        let leaf = store
            .create_collection(&mut engine, 7, None, CollectionKind::Clusterized)
            .expect("leaf");
        store
            .add_marker(&mut engine, 1, Some(7), point(), PlacemarkStyle::default())
            .expect("marker");

        assert!(store.remove_marker(&mut engine, 1));
        assert!(matches!(
            engine.calls().last(),
            Some(EngineCall::Remove {
                scope: Scope::Clusterized(handle),
                ..
            }) if *handle == leaf.handle
        ));
        assert_eq!(engine.rejected_calls(), 0);
        assert!(!store.remove_marker(&mut engine, 1));
    }

    #[test]
    fn clusterize_plain_collection_is_not_found() {
        let mut engine = MemoryEngine::new();
        let mut store = OverlayStore::new();
        store
            .create_collection(&mut engine, 1, None, CollectionKind::Plain)
            .expect("plain");
        let err = store
            .clusterize(&mut engine, 1, 60.0, 15)
            .expect_err("plain collection");
        assert_eq!(err, OverlayError::CollectionNotFound(1));
    }

    #[test]
    fn root_clear_resets_everything() {
        let mut engine = MemoryEngine::new();
        let mut store = OverlayStore::new();
        store
            .create_collection(&mut engine, 1, None, CollectionKind::Plain)
            .expect("plain");
        store
            .add_marker(&mut engine, 1, Some(1), point(), PlacemarkStyle::default())
            .expect("marker");

        let report = store.clear(&mut engine, None).expect("root clear");
        assert!(report.root);
        assert_eq!(report.objects, 1);
        assert!(store.is_empty());
        assert!(store.registry().is_empty());
        assert_eq!(engine.object_count(), 0);
        assert!(engine.children(Scope::Root).is_empty());
    }
}
