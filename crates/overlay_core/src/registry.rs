//! Identity registry for overlay objects.
//!
//! # Responsibility
//! - Map caller-chosen ids to engine handles per object kind, and back.
//!
//! # Invariants
//! - An id is registered at most once per `ObjectKind`.
//! - Every forward entry has exactly one matching reverse entry.
//! - `unregister` of an absent id is a no-op.

use crate::engine::EngineHandle;
use crate::error::{OverlayError, OverlayResult};
use crate::model::overlay::{ObjectId, ObjectKind};
use std::collections::BTreeMap;

/// Bidirectional `(kind, id) <-> handle` map.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    by_id: BTreeMap<(ObjectKind, ObjectId), EngineHandle>,
    by_handle: BTreeMap<EngineHandle, (ObjectKind, ObjectId)>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `DuplicateId` when `id` is already taken for `kind`.
    pub fn ensure_available(&self, kind: ObjectKind, id: ObjectId) -> OverlayResult<()> {
        if self.by_id.contains_key(&(kind, id)) {
            return Err(OverlayError::DuplicateId { kind, id });
        }
        Ok(())
    }

    /// Registers one live object.
    pub fn register(
        &mut self,
        kind: ObjectKind,
        id: ObjectId,
        handle: EngineHandle,
    ) -> OverlayResult<()> {
        self.ensure_available(kind, id)?;
        self.by_id.insert((kind, id), handle);
        self.by_handle.insert(handle, (kind, id));
        Ok(())
    }

    /// Returns the engine handle for `(kind, id)`.
    pub fn resolve(&self, kind: ObjectKind, id: ObjectId) -> OverlayResult<EngineHandle> {
        self.by_id
            .get(&(kind, id))
            .copied()
            .ok_or(OverlayError::ObjectNotFound { kind, id })
    }

    /// Drops one entry and returns its handle, if it was registered.
    pub fn unregister(&mut self, kind: ObjectKind, id: ObjectId) -> Option<EngineHandle> {
        let handle = self.by_id.remove(&(kind, id))?;
        self.by_handle.remove(&handle);
        Some(handle)
    }

    /// Reverse lookup used to translate engine callbacks into caller ids.
    pub fn lookup_handle(&self, handle: EngineHandle) -> Option<(ObjectKind, ObjectId)> {
        self.by_handle.get(&handle).copied()
    }

    pub fn contains(&self, kind: ObjectKind, id: ObjectId) -> bool {
        self.by_id.contains_key(&(kind, id))
    }

    /// Registered ids of one kind, ascending.
    pub fn ids(&self, kind: ObjectKind) -> Vec<ObjectId> {
        self.by_id
            .keys()
            .filter(|(entry_kind, _)| *entry_kind == kind)
            .map(|(_, id)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.by_handle.clear();
    }
}
