//! Overlay domain model shared by every core component.
//!
//! # Responsibility
//! - Define geometry, styling, overlay-record and cluster shapes.
//! - Keep host-facing field naming (camelCase) in one place via serde.
//!
//! # Invariants
//! - Every overlay object is addressed by a caller-assigned `ObjectId`,
//!   unique within its `ObjectKind`.
//! - Every collection is addressed by a caller-assigned `CollectionId`,
//!   unique across plain and clusterized collections.
//! - Native engine handles never appear in host-facing payloads.

pub mod cluster;
pub mod geometry;
pub mod overlay;
pub mod style;
