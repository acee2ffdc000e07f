//! Outbound notifications sent to the host over the map channel.

use crate::model::cluster::Cluster;
use crate::model::geometry::{CameraPosition, Point};
use crate::model::overlay::{ObjectId, ObjectKind};
use serde::Serialize;

/// Host-facing notification, serialized as `{"method": .., "arguments": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", content = "arguments")]
pub enum MapNotification {
    #[serde(rename = "onMapTap")]
    MapTap(Point),
    #[serde(rename = "onMapLongTap")]
    MapLongTap(Point),
    #[serde(rename = "onMapObjectTap")]
    ObjectTap {
        #[serde(rename = "hashCode")]
        id: ObjectId,
        kind: ObjectKind,
        latitude: f64,
        longitude: f64,
    },
    #[serde(rename = "onCameraPositionChanged")]
    CameraPositionChanged {
        latitude: f64,
        longitude: f64,
        zoom: f32,
        tilt: f32,
        azimuth: f32,
        #[serde(rename = "final")]
        finished: bool,
    },
    #[serde(rename = "onMapSizeChanged")]
    SizeChanged { width: u32, height: u32 },
    #[serde(rename = "onClusterAdded")]
    ClusterAdded(Cluster),
    #[serde(rename = "onClusterTap")]
    ClusterTap(Cluster),
}

impl MapNotification {
    pub fn camera_changed(position: &CameraPosition, finished: bool) -> Self {
        Self::CameraPositionChanged {
            latitude: position.target.latitude,
            longitude: position.target.longitude,
            zoom: position.zoom,
            tilt: position.tilt,
            azimuth: position.azimuth,
            finished,
        }
    }

    /// Host method name of this notification.
    pub fn method(&self) -> &'static str {
        match self {
            Self::MapTap(_) => "onMapTap",
            Self::MapLongTap(_) => "onMapLongTap",
            Self::ObjectTap { .. } => "onMapObjectTap",
            Self::CameraPositionChanged { .. } => "onCameraPositionChanged",
            Self::SizeChanged { .. } => "onMapSizeChanged",
            Self::ClusterAdded(_) => "onClusterAdded",
            Self::ClusterTap(_) => "onClusterTap",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MapNotification;
    use crate::model::cluster::{Cluster, ClusterAppearance};
    use crate::model::geometry::Point;
    use serde_json::json;

    #[test]
    fn cluster_notification_uses_host_keys() {
        let notification = MapNotification::ClusterAdded(Cluster {
            key: 42,
            size: 2,
            appearance: ClusterAppearance {
                opacity: 1.0,
                direction: 0.0,
                z_index: 3.0,
                geometry: Point::new(1.0, 2.0),
            },
            member_ids: vec![7, 8],
            collection_id: Some(1),
        });

        let value = serde_json::to_value(&notification).expect("serialize");
        assert_eq!(
            value,
            json!({
                "method": "onClusterAdded",
                "arguments": {
                    "hashValue": 42,
                    "size": 2,
                    "appearance": {
                        "opacity": 1.0,
                        "direction": 0.0,
                        "zIndex": 3.0,
                        "geometry": {"latitude": 1.0, "longitude": 2.0}
                    },
                    "placemarks": [7, 8]
                }
            })
        );
        assert_eq!(notification.method(), "onClusterAdded");
    }

    #[test]
    fn camera_notification_flags_final_position() {
        let value = serde_json::to_value(MapNotification::CameraPositionChanged {
            latitude: 1.0,
            longitude: 2.0,
            zoom: 10.0,
            tilt: 0.0,
            azimuth: 0.0,
            finished: true,
        })
        .expect("serialize");
        assert_eq!(value["method"], "onCameraPositionChanged");
        assert_eq!(value["arguments"]["final"], true);
    }
}
