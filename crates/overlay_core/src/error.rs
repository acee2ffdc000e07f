//! Core overlay error taxonomy.
//!
//! # Invariants
//! - `NotFound`-class errors describe expected races (late removal, stale
//!   cluster keys) and are absorbed by the router, never surfaced.
//! - Every other variant fails the request without leaving state behind:
//!   caller contract violations are caught before any engine call, and
//!   `EngineRejected` is raised only after the partial engine result is
//!   removed again.

use crate::model::overlay::{CollectionId, ObjectId, ObjectKind};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by core overlay operations.
pub type OverlayResult<T> = Result<T, OverlayError>;

/// Errors from registry, collection tree and overlay store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayError {
    /// Object id is not registered for its kind.
    ObjectNotFound { kind: ObjectKind, id: ObjectId },
    /// Collection id does not resolve to a live collection.
    CollectionNotFound(CollectionId),
    /// Requested parent is missing or is not a plain collection.
    InvalidParent {
        id: CollectionId,
        parent_id: CollectionId,
    },
    /// Object id already registered for its kind.
    DuplicateId { kind: ObjectKind, id: ObjectId },
    /// Collection id already used by a plain or clusterized collection.
    DuplicateCollectionId(CollectionId),
    /// Batch add received different numbers of points and ids.
    LengthMismatch { points: usize, ids: usize },
    /// Engine created a different number of objects than requested; the
    /// partial result was rolled back.
    EngineRejected { expected: usize, created: usize },
}

impl OverlayError {
    /// Returns whether this error belongs to the silently absorbed class.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ObjectNotFound { .. } | Self::CollectionNotFound(_)
        )
    }

    /// Stable machine-readable code for host responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ObjectNotFound { .. } | Self::CollectionNotFound(_) => "not_found",
            Self::InvalidParent { .. } => "invalid_parent",
            Self::DuplicateId { .. } | Self::DuplicateCollectionId(_) => "duplicate_id",
            Self::LengthMismatch { .. } => "length_mismatch",
            Self::EngineRejected { .. } => "engine_rejected",
        }
    }
}

impl Display for OverlayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ObjectNotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::CollectionNotFound(id) => write!(f, "collection not found: {id}"),
            Self::InvalidParent { id, parent_id } => write!(
                f,
                "collection {id} cannot be nested under {parent_id}: parent must be an existing plain collection"
            ),
            Self::DuplicateId { kind, id } => write!(f, "{kind} id already registered: {id}"),
            Self::DuplicateCollectionId(id) => write!(f, "collection id already registered: {id}"),
            Self::LengthMismatch { points, ids } => write!(
                f,
                "batch size mismatch: {points} point(s) but {ids} id(s)"
            ),
            Self::EngineRejected { expected, created } => write!(
                f,
                "engine created {created} of {expected} object(s); batch rolled back"
            ),
        }
    }
}

impl Error for OverlayError {}

#[cfg(test)]
mod tests {
    use super::OverlayError;
    use crate::model::overlay::ObjectKind;

    #[test]
    fn not_found_class_is_detected() {
        assert!(OverlayError::CollectionNotFound(3).is_not_found());
        assert!(OverlayError::ObjectNotFound {
            kind: ObjectKind::Circle,
            id: 1
        }
        .is_not_found());
        assert!(!OverlayError::LengthMismatch { points: 1, ids: 2 }.is_not_found());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            OverlayError::InvalidParent {
                id: 2,
                parent_id: 1
            }
            .code(),
            "invalid_parent"
        );
        assert_eq!(
            OverlayError::DuplicateCollectionId(7).code(),
            "duplicate_id"
        );
        let message = OverlayError::DuplicateId {
            kind: ObjectKind::Marker,
            id: 9,
        }
        .to_string();
        assert_eq!(message, "marker id already registered: 9");
    }
}
