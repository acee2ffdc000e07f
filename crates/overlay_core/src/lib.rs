//! Overlay object hierarchy core for interactive maps.
//! This crate is the single source of truth for overlay identity and
//! collection-tree invariants.

pub mod cluster;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod notification;
pub mod registry;
pub mod router;
pub mod store;
pub mod tracking;
pub mod tree;

pub use cluster::{ClusterPipeline, StyleOutcome};
pub use config::{ConfigError, MapConfig};
pub use controller::{MapController, MapSnapshot, MarkerEntry};
pub use engine::{
    EngineCall, EngineCluster, EngineEvent, EngineHandle, MemoryEngine, RenderEngine, Scope,
    Subscription,
};
pub use error::{OverlayError, OverlayResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use notification::MapNotification;
pub use registry::IdentityRegistry;
pub use router::{DispatchError, EventRouter};
pub use store::{ClearReport, OverlayStore};
pub use tracking::{CameraTracker, TrackingState, TrackingTemplate};
pub use tree::CollectionTree;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
