use overlay_core::model::geometry::Point;
use overlay_core::model::style::Icon;
use overlay_core::{
    EngineEvent, EventRouter, MapConfig, MapController, MapNotification, MemoryEngine,
    RenderEngine, Scope,
};
use serde_json::{json, Value};

fn clustered_router() -> (EventRouter<MemoryEngine>, Scope) {
    let mut router = EventRouter::new(MapController::new(MemoryEngine::new(), MapConfig::default()));
    router
        .dispatch("addCollection", &json!({"id": 1, "isClusterized": true}))
        .unwrap();
    router
        .dispatch(
            "addPlacemarks",
            &json!({
                "collectionId": 1,
                "points": [
                    {"latitude": 55.0, "longitude": 37.0},
                    {"latitude": 55.1, "longitude": 37.1},
                    {"latitude": 55.2, "longitude": 37.2}
                ],
                "ids": [11, 12, 13],
                "icon": {"iconName": "pin.png"}
            }),
        )
        .unwrap();
    router
        .dispatch("clusterPlacemarks", &json!({"collectionId": 1, "clusterRadius": 40.0}))
        .unwrap();
    let scope = router.controller().store().tree().resolve(Some(1)).unwrap();
    (router, scope)
}

fn form_cluster(router: &mut EventRouter<MemoryEngine>, scope: Scope) -> i64 {
    let handle = scope.handle().unwrap();
    let members = router.controller().engine().children(scope);
    let cluster = router
        .controller_mut()
        .engine_mut()
        .form_cluster(handle, &members);
    let key = cluster.key;
    router.feed_engine_event(EngineEvent::ClusterAdded { cluster });
    key
}

#[test]
fn formation_emits_notification_with_member_ids() {
    let (mut router, scope) = clustered_router();
    let key = form_cluster(&mut router, scope);

    let notifications = router.take_notifications();
    assert_eq!(notifications.len(), 1);
    let MapNotification::ClusterAdded(cluster) = &notifications[0] else {
        panic!("expected cluster notification, got {:?}", notifications[0]);
    };
    assert_eq!(cluster.key, key);
    assert_eq!(cluster.member_ids, vec![11, 12, 13]);
    assert_eq!(cluster.size, 3);
    assert!((cluster.appearance.geometry.latitude - 55.1).abs() < 1e-9);
    assert_eq!(router.controller().clusters().pending_keys(), vec![key]);

    let engine = router.controller().engine();
    let handle = scope.handle().unwrap();
    assert_eq!(engine.clustering(handle), Some((40.0, 15)));
}

#[test]
fn styling_twice_applies_icon_once() {
    let (mut router, scope) = clustered_router();
    let key = form_cluster(&mut router, scope);
    let args = json!({"hashValue": key, "icon": {"iconName": "cluster.png"}});

    let first = router.dispatch("setClusterIcon", &args).unwrap();
    let second = router.dispatch("setClusterIcon", &args).unwrap();

    assert_eq!(first, json!("styled"));
    assert_eq!(second, Value::Null);
    assert_eq!(
        router.controller().engine().cluster_icons(key),
        &[Icon::asset("cluster.png")]
    );
    assert!(router.controller().clusters().is_empty());
}

#[test]
fn styling_after_zoom_change_may_legitimately_noop() {
    let (mut router, scope) = clustered_router();
    let key = form_cluster(&mut router, scope);

    let camera = router.controller().engine().camera_position();
    router.feed_engine_event(EngineEvent::CameraPositionChanged {
        position: camera.zoomed_by(1.0),
        finished: true,
    });

    let outcome = router
        .dispatch(
            "setClusterIcon",
            &json!({"hashValue": key, "icon": {"iconName": "cluster.png"}}),
        )
        .unwrap();
    assert_eq!(outcome, json!("superseded"));
    assert!(router.controller().engine().cluster_icons(key).is_empty());
    assert!(router.controller().clusters().is_empty());
}

#[test]
fn tap_repeats_payload_without_consuming_queue() {
    let (mut router, scope) = clustered_router();
    let key = form_cluster(&mut router, scope);
    router.take_notifications();

    let members = router.controller().engine().children(scope);
    let tapped = overlay_core::EngineCluster {
        key,
        collection: scope.handle().unwrap(),
        members,
        appearance: overlay_core::model::cluster::ClusterAppearance {
            opacity: 1.0,
            direction: 0.0,
            z_index: 0.0,
            geometry: Point::new(55.1, 37.1),
        },
        size: 3,
    };
    router.feed_engine_event(EngineEvent::ClusterTap { cluster: tapped });

    let notifications = router.take_notifications();
    assert!(matches!(
        &notifications[..],
        [MapNotification::ClusterTap(cluster)] if cluster.key == key && cluster.member_ids == vec![11, 12, 13]
    ));
    assert!(router.controller().clusters().is_pending(key));
}

#[test]
fn clearing_collection_purges_pending_clusters() {
    let (mut router, scope) = clustered_router();
    let key = form_cluster(&mut router, scope);

    router.dispatch("clear", &json!({"collectionId": 1})).unwrap();

    assert!(!router.controller().clusters().is_pending(key));
    assert!(!router.controller().engine().cluster_is_valid(key));
    assert!(router.controller().store().markers_in(Some(1)).is_empty());
    assert_eq!(router.controller().engine().rejected_calls(), 0);
}

#[test]
fn removed_members_are_skipped_in_formation_payload() {
    let (mut router, scope) = clustered_router();
    let members = router.controller().engine().children(scope);
    router
        .dispatch("removePlacemark", &json!({"id": 12}))
        .unwrap();

    let cluster = router
        .controller_mut()
        .engine_mut()
        .form_cluster(scope.handle().unwrap(), &members);
    router.feed_engine_event(EngineEvent::ClusterAdded { cluster });

    let notifications = router.take_notifications();
    assert!(matches!(
        &notifications[..],
        [MapNotification::ClusterAdded(cluster)] if cluster.member_ids == vec![11, 13]
    ));
}

#[test]
fn recomputed_clusters_leave_the_queue_on_next_formation() {
    let (mut router, scope) = clustered_router();
    for round in 0..30 {
        form_cluster(&mut router, scope);
        assert_eq!(router.controller().clusters().len(), 1);

        let camera = router.controller().engine().camera_position();
        let step = if round % 2 == 0 { 1.0 } else { -1.0 };
        router.feed_engine_event(EngineEvent::CameraPositionChanged {
            position: camera.zoomed_by(step),
            finished: true,
        });
    }

    let key = form_cluster(&mut router, scope);
    assert_eq!(router.controller().clusters().pending_keys(), vec![key]);
    let snapshot = router.dispatch("getSnapshot", &Value::Null).unwrap();
    assert_eq!(snapshot["pendingClusters"].as_array().map(Vec::len), Some(1));
}
