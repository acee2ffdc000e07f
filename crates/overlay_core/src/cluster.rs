//! Cluster formation and styling pipeline.
//!
//! # Responsibility
//! - Turn engine cluster callbacks into caller-facing `Cluster` records.
//! - Hold formed clusters in a pending queue until the caller styles them.
//!
//! # Invariants
//! - Each pending entry leaves the queue exactly once: styled, superseded,
//!   or purged by a clear.
//! - Entries the engine has recomputed are pruned whenever a new cluster
//!   forms, so the queue only outlives live clusters until the next formation.
//! - At most one entry per cluster key is pending.
//! - Styling an unknown key never fails; clusters are recomputed by the
//!   engine at any time, so late commands are expected.

use crate::engine::{EngineCluster, RenderEngine};
use crate::model::cluster::{Cluster, ClusterKey};
use crate::model::style::Icon;
use crate::store::{ClearReport, OverlayStore};
use log::debug;
use serde::Serialize;

/// Result of one cluster styling command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleOutcome {
    /// Icon applied and entry consumed.
    Styled,
    /// Entry consumed but no icon was supplied or it could not be loaded.
    IconRejected,
    /// Entry consumed because the engine already recomputed the cluster.
    Superseded,
    /// No pending entry for the key.
    NotPending,
}

/// Pending-style queue of formed clusters.
#[derive(Debug, Default)]
pub struct ClusterPipeline {
    pending: Vec<Cluster>,
}

impl ClusterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly formed cluster and returns its caller-facing form.
    ///
    /// A pending entry with the same key is replaced.
    pub fn on_cluster_added(&mut self, store: &OverlayStore, cluster: &EngineCluster) -> Cluster {
        let record = describe(store, cluster);
        self.pending.retain(|entry| entry.key != record.key);
        self.pending.push(record.clone());
        debug!(
            "event=cluster_formed module=cluster status=ok key={} size={} members={}",
            record.key,
            record.size,
            record.member_ids.len()
        );
        record
    }

    /// Drops pending clusters the engine has already recomputed.
    pub fn prune_superseded<E: RenderEngine>(&mut self, engine: &E) -> usize {
        let before = self.pending.len();
        self.pending.retain(|entry| engine.cluster_is_valid(entry.key));
        let pruned = before - self.pending.len();
        if pruned > 0 {
            debug!(
                "event=cluster_prune module=cluster status=ok pruned={} pending={}",
                pruned,
                self.pending.len()
            );
        }
        pruned
    }

    /// Builds the tap payload for a cluster without touching the queue.
    pub fn on_cluster_tap(&self, store: &OverlayStore, cluster: &EngineCluster) -> Cluster {
        describe(store, cluster)
    }

    /// Applies `icon` to a pending cluster, consuming the entry.
    ///
    /// A missing icon still consumes the entry.
    pub fn apply_style<E: RenderEngine>(
        &mut self,
        engine: &mut E,
        key: ClusterKey,
        icon: Option<&Icon>,
    ) -> StyleOutcome {
        let Some(index) = self.pending.iter().position(|entry| entry.key == key) else {
            debug!("event=cluster_style module=cluster status=noop key={}", key);
            return StyleOutcome::NotPending;
        };
        self.pending.remove(index);

        let outcome = if !engine.cluster_is_valid(key) {
            StyleOutcome::Superseded
        } else if icon.is_some_and(|icon| engine.set_cluster_icon(key, icon)) {
            StyleOutcome::Styled
        } else {
            StyleOutcome::IconRejected
        };
        debug!(
            "event=cluster_style module=cluster status=ok key={} outcome={:?}",
            key, outcome
        );
        outcome
    }

    /// Drops pending clusters formed in collections removed by a clear.
    pub fn purge(&mut self, report: &ClearReport) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|entry| !report.covers(entry.collection_id));
        before - self.pending.len()
    }

    pub fn pending_keys(&self) -> Vec<ClusterKey> {
        self.pending.iter().map(|entry| entry.key).collect()
    }

    pub fn is_pending(&self, key: ClusterKey) -> bool {
        self.pending.iter().any(|entry| entry.key == key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Resolves member handles to marker ids, skipping unknown handles.
fn describe(store: &OverlayStore, cluster: &EngineCluster) -> Cluster {
    let member_ids = cluster
        .members
        .iter()
        .filter_map(|handle| store.marker_id_for_handle(*handle))
        .collect();
    Cluster {
        key: cluster.key,
        size: cluster.size,
        appearance: cluster.appearance,
        member_ids,
        collection_id: store.tree().id_for_handle(cluster.collection),
    }
}
