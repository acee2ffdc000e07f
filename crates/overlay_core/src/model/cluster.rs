//! Engine-computed cluster records.
//!
//! A cluster's key is only meaningful until the engine recomputes clusters
//! (typically on zoom change). Holders must treat stale keys as not found.

use crate::model::geometry::Point;
use crate::model::overlay::{CollectionId, ObjectId};
use serde::{Deserialize, Serialize};

/// Engine-provided transient cluster identity.
pub type ClusterKey = i64;

/// Visual state the engine assigned to a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAppearance {
    pub opacity: f32,
    pub direction: f32,
    pub z_index: f32,
    /// Cluster centroid.
    pub geometry: Point,
}

/// Cluster with members resolved to caller ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(rename = "hashValue")]
    pub key: ClusterKey,
    pub size: u32,
    pub appearance: ClusterAppearance,
    #[serde(rename = "placemarks")]
    pub member_ids: Vec<ObjectId>,
    /// Clusterized collection the cluster was formed in, when known.
    #[serde(skip)]
    pub collection_id: Option<CollectionId>,
}
