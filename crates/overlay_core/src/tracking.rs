//! Camera tracking mode.
//!
//! # Invariants
//! - The camera listener is registered at most once while tracking.
//! - The tracking marker lives under the root and is never registered
//!   as an overlay object.
//! - `disable` is idempotent.

use crate::engine::{EngineHandle, RenderEngine, Scope, Subscription};
use crate::model::geometry::{CameraPosition, Point};
use crate::model::style::PlacemarkStyle;
use log::info;
use serde::Serialize;

/// Synthetic marker that follows the camera target.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingTemplate {
    pub point: Point,
    pub style: PlacemarkStyle,
}

/// Serializable view of tracking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingState {
    pub enabled: bool,
    pub has_marker: bool,
}

#[derive(Debug, Default)]
pub struct CameraTracker {
    listening: bool,
    marker: Option<EngineHandle>,
}

impl CameraTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking and returns the current camera target.
    ///
    /// Any previous tracking marker is replaced.
    pub fn enable<E: RenderEngine>(
        &mut self,
        engine: &mut E,
        template: Option<TrackingTemplate>,
    ) -> Point {
        if !self.listening {
            engine.subscribe(Subscription::Camera);
            self.listening = true;
        }
        if let Some(marker) = self.marker.take() {
            engine.remove(Scope::Root, marker);
        }
        if let Some(template) = template {
            self.marker = Some(engine.add_marker(Scope::Root, template.point, &template.style));
        }
        info!(
            "event=camera_tracking_enable module=tracking status=ok marker={}",
            self.marker.is_some()
        );
        engine.camera_position().target
    }

    /// Moves the tracking marker to the new camera target.
    pub fn on_camera_changed<E: RenderEngine>(&mut self, engine: &mut E, position: &CameraPosition) {
        if let Some(marker) = self.marker {
            engine.move_marker(marker, position.target);
        }
    }

    /// Stops tracking; a no-op when tracking is off.
    pub fn disable<E: RenderEngine>(&mut self, engine: &mut E) {
        if self.listening {
            engine.unsubscribe(Subscription::Camera);
            self.listening = false;
        }
        if let Some(marker) = self.marker.take() {
            engine.remove(Scope::Root, marker);
        }
    }

    /// Drops the marker handle after the engine removed it natively.
    pub fn forget_marker(&mut self) {
        self.marker = None;
    }

    pub fn is_enabled(&self) -> bool {
        self.listening
    }

    pub fn marker(&self) -> Option<EngineHandle> {
        self.marker
    }

    pub fn state(&self) -> TrackingState {
        TrackingState {
            enabled: self.listening,
            has_marker: self.marker.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraTracker, TrackingTemplate};
    use crate::engine::{MemoryEngine, RenderEngine, Subscription};
    use crate::model::geometry::Point;
    use crate::model::style::PlacemarkStyle;

    fn template() -> TrackingTemplate {
        TrackingTemplate {
            point: Point::new(1.0, 1.0),
            style: PlacemarkStyle::default(),
        }
    }

    #[test]
    fn enable_twice_replaces_marker_and_subscribes_once() {
        let mut engine = MemoryEngine::new();
        let mut tracker = CameraTracker::new();
        tracker.enable(&mut engine, Some(template()));
        let first = tracker.marker().expect("first marker");
        tracker.enable(&mut engine, Some(template()));
        let second = tracker.marker().expect("second marker");

        assert_ne!(first, second);
        assert!(!engine.contains(first));
        assert!(engine.contains(second));
        let subscribes = engine
            .calls()
            .iter()
            .filter(|call| matches!(call, crate::engine::EngineCall::Subscribe { .. }))
            .count();
        assert_eq!(subscribes, 1);
    }

    #[test]
    fn disable_is_idempotent() {
        let mut engine = MemoryEngine::new();
        let mut tracker = CameraTracker::new();
        tracker.disable(&mut engine);
        assert!(engine.calls().is_empty());

        let target = tracker.enable(&mut engine, Some(template()));
        assert_eq!(target, engine.camera_position().target);
        tracker.disable(&mut engine);
        tracker.disable(&mut engine);

        assert!(!tracker.is_enabled());
        assert!(!engine.is_subscribed(Subscription::Camera));
        assert_eq!(engine.object_count(), 0);
    }
}
