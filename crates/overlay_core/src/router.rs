//! Command and callback router for one map.
//!
//! # Responsibility
//! - Parse host commands (method name plus JSON arguments) into typed
//!   controller calls and format their results.
//! - Translate engine callbacks into outbound notifications.
//!
//! # Invariants
//! - Not-found errors are absorbed into a `null` response.
//! - Unknown method names fail with `UnsupportedOperation`.
//! - Argument parsing completes before any controller call.

use crate::cluster::StyleOutcome;
use crate::controller::MapController;
use crate::engine::{EngineEvent, MemoryEngine, RenderEngine};
use crate::error::OverlayError;
use crate::model::cluster::ClusterKey;
use crate::model::geometry::{
    Animation, AnimationKind, BoundingBox, CameraPosition, Gesture, LogoAlignment, Point,
    ScreenPoint, ScreenRect,
};
use crate::model::overlay::{Circle, CollectionId, ObjectId, Polygon, Polyline};
use crate::model::style::{Icon, PlacemarkStyle, PolylineStyle, ShapeStyle, UserLayerStyle};
use crate::notification::MapNotification;
use crate::tracking::TrackingTemplate;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Router-level failures returned to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// Method name is not handled by this map.
    UnsupportedOperation(String),
    /// Arguments could not be parsed for the method.
    InvalidArguments { method: String, message: String },
    /// Core overlay operation failed.
    Overlay(OverlayError),
}

impl DispatchError {
    /// Stable machine-readable code for host responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedOperation(_) => "unsupported_operation",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::Overlay(err) => err.code(),
        }
    }
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedOperation(method) => write!(f, "not implemented: {method}"),
            Self::InvalidArguments { method, message } => {
                write!(f, "invalid arguments for `{method}`: {message}")
            }
            Self::Overlay(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DispatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Overlay(err) => Some(err),
            _ => None,
        }
    }
}

impl From<OverlayError> for DispatchError {
    fn from(value: OverlayError) -> Self {
        Self::Overlay(value)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddCollectionArgs {
    id: CollectionId,
    parent_id: Option<CollectionId>,
    #[serde(default)]
    is_clusterized: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddPlacemarkArgs {
    id: ObjectId,
    collection_id: Option<CollectionId>,
    point: Point,
    #[serde(flatten)]
    style: PlacemarkStyle,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddPlacemarksArgs {
    collection_id: Option<CollectionId>,
    points: Vec<Point>,
    ids: Vec<ObjectId>,
    icon: Icon,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterPlacemarksArgs {
    collection_id: Option<CollectionId>,
    cluster_radius: Option<f64>,
    min_zoom: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetClusterIconArgs {
    hash_value: ClusterKey,
    icon: Option<Icon>,
}

#[derive(Deserialize)]
struct IdArgs {
    id: ObjectId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HashCodeArgs {
    hash_code: ObjectId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearArgs {
    collection_id: Option<CollectionId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddPolylineArgs {
    hash_code: ObjectId,
    #[serde(flatten)]
    polyline: Polyline,
    #[serde(default)]
    style: PolylineStyle,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddPolygonArgs {
    hash_code: ObjectId,
    #[serde(flatten)]
    polygon: Polygon,
    #[serde(default)]
    style: ShapeStyle,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddCircleArgs {
    hash_code: ObjectId,
    center: Point,
    radius: f32,
    #[serde(default)]
    style: ShapeStyle,
}

/// Host animation descriptor; `animate == false` means an instant move.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnimationArgs {
    animate: bool,
    #[serde(default)]
    smooth_animation: bool,
    #[serde(default)]
    animation_duration: f32,
}

impl AnimationArgs {
    fn into_animation(self) -> Option<Animation> {
        if !self.animate {
            return None;
        }
        let kind = if self.smooth_animation {
            AnimationKind::Smooth
        } else {
            AnimationKind::Linear
        };
        Some(Animation {
            kind,
            duration: self.animation_duration,
        })
    }
}

#[derive(Deserialize)]
struct MoveArgs {
    point: Point,
    zoom: f32,
    #[serde(default)]
    azimuth: f32,
    #[serde(default)]
    tilt: f32,
    animation: Option<AnimationArgs>,
}

#[derive(Deserialize)]
struct SetBoundsArgs {
    #[serde(flatten)]
    bounds: BoundingBox,
    animation: Option<AnimationArgs>,
}

#[derive(Deserialize)]
struct EnabledArgs {
    enabled: bool,
}

#[derive(Deserialize)]
struct MapStyleArgs {
    style: String,
}

#[derive(Deserialize)]
struct LogoArgs {
    x: u32,
    y: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FocusRectArgs {
    top_left_screen_point: ScreenPoint,
    bottom_right_screen_point: ScreenPoint,
}

#[derive(Deserialize)]
struct PlacemarkTemplateArgs {
    point: Point,
    #[serde(flatten)]
    style: PlacemarkStyle,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnableTrackingArgs {
    placemark_template: Option<PlacemarkTemplateArgs>,
}

/// Routes host commands and engine callbacks for one map.
pub struct EventRouter<E: RenderEngine> {
    controller: MapController<E>,
    outbox: Vec<MapNotification>,
}

impl<E: RenderEngine> EventRouter<E> {
    pub fn new(controller: MapController<E>) -> Self {
        Self {
            controller,
            outbox: Vec::new(),
        }
    }

    pub fn controller(&self) -> &MapController<E> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut MapController<E> {
        &mut self.controller
    }

    /// Handles one host command and returns its JSON result.
    pub fn dispatch(&mut self, method: &str, arguments: &Value) -> Result<Value, DispatchError> {
        match self.route(method, arguments) {
            Err(DispatchError::Overlay(err)) if err.is_not_found() => {
                debug!(
                    "event=command_dispatch module=router status=noop method={} reason={}",
                    method,
                    err.code()
                );
                Ok(Value::Null)
            }
            Err(err) => {
                warn!(
                    "event=command_dispatch module=router status=error method={} code={}",
                    method,
                    err.code()
                );
                Err(err)
            }
            Ok(value) => Ok(value),
        }
    }

    /// Translates one engine callback into queued notifications.
    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        let notification = match event {
            EngineEvent::MapTap { point } => Some(MapNotification::MapTap(point)),
            EngineEvent::MapLongTap { point } => Some(MapNotification::MapLongTap(point)),
            EngineEvent::ObjectTap { object, point } => self
                .controller
                .object_for_handle(object)
                .map(|(kind, id)| MapNotification::ObjectTap {
                    id,
                    kind,
                    latitude: point.latitude,
                    longitude: point.longitude,
                }),
            EngineEvent::CameraPositionChanged { position, finished } => self
                .controller
                .camera_changed(&position)
                .then(|| MapNotification::camera_changed(&position, finished)),
            EngineEvent::SizeChanged { width, height } => {
                Some(MapNotification::SizeChanged { width, height })
            }
            EngineEvent::ClusterAdded { cluster } => Some(MapNotification::ClusterAdded(
                self.controller.cluster_added(&cluster),
            )),
            EngineEvent::ClusterTap { cluster } => Some(MapNotification::ClusterTap(
                self.controller.cluster_tapped(&cluster),
            )),
        };

        match notification {
            Some(notification) => {
                debug!(
                    "event=engine_event module=router status=ok notify={}",
                    notification.method()
                );
                self.outbox.push(notification);
            }
            None => debug!("event=engine_event module=router status=noop"),
        }
    }

    /// Drains queued notifications in emission order.
    pub fn take_notifications(&mut self) -> Vec<MapNotification> {
        std::mem::take(&mut self.outbox)
    }

    fn route(&mut self, method: &str, arguments: &Value) -> Result<Value, DispatchError> {
        let controller = &mut self.controller;
        match method {
            "addCollection" => {
                let args: AddCollectionArgs = parse(method, arguments)?;
                controller.add_collection(args.id, args.parent_id, args.is_clusterized)?;
                Ok(Value::Null)
            }
            "addPlacemark" => {
                let args: AddPlacemarkArgs = parse(method, arguments)?;
                controller.add_placemark(args.id, args.collection_id, args.point, args.style)?;
                Ok(Value::Null)
            }
            "addPlacemarks" => {
                let args: AddPlacemarksArgs = parse(method, arguments)?;
                controller.add_placemarks(args.collection_id, &args.points, &args.ids, args.icon)?;
                Ok(Value::Null)
            }
            "removePlacemark" => {
                let args: IdArgs = parse(method, arguments)?;
                controller.remove_placemark(args.id);
                Ok(Value::Null)
            }
            "clusterPlacemarks" => {
                let args: ClusterPlacemarksArgs = parse(method, arguments)?;
                let Some(collection_id) = args.collection_id else {
                    debug!(
                        "event=command_dispatch module=router status=noop method={} reason=no_collection",
                        method
                    );
                    return Ok(Value::Null);
                };
                controller.cluster_placemarks(collection_id, args.cluster_radius, args.min_zoom)?;
                Ok(Value::Null)
            }
            "setClusterIcon" => {
                let args: SetClusterIconArgs = parse(method, arguments)?;
                let outcome = controller.set_cluster_icon(args.hash_value, args.icon.as_ref());
                if outcome == StyleOutcome::NotPending {
                    return Ok(Value::Null);
                }
                to_value(method, outcome)
            }
            "clear" => {
                let args: ClearArgs = parse(method, arguments)?;
                controller.clear(args.collection_id)?;
                Ok(Value::Null)
            }
            "addPolyline" => {
                let args: AddPolylineArgs = parse(method, arguments)?;
                controller.add_polyline(args.hash_code, args.polyline, args.style)?;
                Ok(Value::Null)
            }
            "removePolyline" => {
                let args: HashCodeArgs = parse(method, arguments)?;
                controller.remove_polyline(args.hash_code);
                Ok(Value::Null)
            }
            "addPolygon" => {
                let args: AddPolygonArgs = parse(method, arguments)?;
                controller.add_polygon(args.hash_code, args.polygon, args.style)?;
                Ok(Value::Null)
            }
            "removePolygon" => {
                let args: HashCodeArgs = parse(method, arguments)?;
                controller.remove_polygon(args.hash_code);
                Ok(Value::Null)
            }
            "addCircle" => {
                let args: AddCircleArgs = parse(method, arguments)?;
                let circle = Circle {
                    center: args.center,
                    radius: args.radius,
                };
                controller.add_circle(args.hash_code, circle, args.style)?;
                Ok(Value::Null)
            }
            "removeCircle" => {
                let args: HashCodeArgs = parse(method, arguments)?;
                controller.remove_circle(args.hash_code);
                Ok(Value::Null)
            }
            "move" => {
                let args: MoveArgs = parse(method, arguments)?;
                let position = CameraPosition {
                    target: args.point,
                    zoom: args.zoom,
                    azimuth: args.azimuth,
                    tilt: args.tilt,
                };
                controller.move_camera(position, args.animation.and_then(AnimationArgs::into_animation));
                Ok(Value::Null)
            }
            "setBounds" => {
                let args: SetBoundsArgs = parse(method, arguments)?;
                controller.set_bounds(
                    &args.bounds,
                    args.animation.and_then(AnimationArgs::into_animation),
                );
                Ok(Value::Null)
            }
            "zoomIn" => {
                controller.zoom_in();
                Ok(Value::Null)
            }
            "zoomOut" => {
                controller.zoom_out();
                Ok(Value::Null)
            }
            "toggleZoomGestures" => toggle(controller, method, arguments, Gesture::Zoom),
            "toggleTiltGestures" => toggle(controller, method, arguments, Gesture::Tilt),
            "toggleMapRotation" => toggle(controller, method, arguments, Gesture::Rotate),
            "isZoomGesturesEnabled" => Ok(Value::Bool(controller.gesture_enabled(Gesture::Zoom))),
            "isTiltGesturesEnabled" => Ok(Value::Bool(controller.gesture_enabled(Gesture::Tilt))),
            "toggleNightMode" => {
                let args: EnabledArgs = parse(method, arguments)?;
                controller.set_night_mode(args.enabled);
                Ok(Value::Null)
            }
            "setMapStyle" => {
                let args: MapStyleArgs = parse(method, arguments)?;
                Ok(Value::Bool(controller.set_map_style(&args.style)))
            }
            "logoAlignment" => {
                let args: LogoArgs = parse(method, arguments)?;
                let alignment = LogoAlignment::from_raw(args.x, args.y).ok_or_else(|| {
                    DispatchError::InvalidArguments {
                        method: method.to_string(),
                        message: format!("unknown logo alignment x={} y={}", args.x, args.y),
                    }
                })?;
                controller.set_logo_alignment(alignment);
                Ok(Value::Null)
            }
            "setFocusRect" => {
                let args: FocusRectArgs = parse(method, arguments)?;
                controller.set_focus_rect(Some(ScreenRect {
                    top_left: args.top_left_screen_point,
                    bottom_right: args.bottom_right_screen_point,
                }));
                Ok(Value::Null)
            }
            "clearFocusRect" => {
                controller.set_focus_rect(None);
                Ok(Value::Null)
            }
            "showUserLayer" => {
                let style: UserLayerStyle = parse(method, arguments)?;
                controller.show_user_layer(&style);
                Ok(Value::Null)
            }
            "hideUserLayer" => {
                controller.hide_user_layer();
                Ok(Value::Null)
            }
            "enableCameraTracking" => {
                let args: EnableTrackingArgs = parse(method, arguments)?;
                let template = args.placemark_template.map(|template| TrackingTemplate {
                    point: template.point,
                    style: template.style,
                });
                to_value(method, controller.enable_camera_tracking(template))
            }
            "disableCameraTracking" => {
                controller.disable_camera_tracking();
                Ok(Value::Null)
            }
            "getMinZoom" => to_value(method, controller.min_zoom()),
            "getMaxZoom" => to_value(method, controller.max_zoom()),
            "getZoom" => to_value(method, controller.zoom()),
            "getTargetPoint" => to_value(method, controller.target_point()),
            "getVisibleRegion" => to_value(method, controller.visible_region()),
            "getUserTargetPoint" => to_value(method, controller.user_target_point()),
            "getSnapshot" => to_value(method, controller.snapshot()),
            other => Err(DispatchError::UnsupportedOperation(other.to_string())),
        }
    }
}

impl EventRouter<MemoryEngine> {
    /// Applies native state carried by `event` to the in-memory engine, then
    /// routes it like any other callback.
    pub fn feed_engine_event(&mut self, event: EngineEvent) {
        self.controller.engine_mut().apply_event(&event);
        self.handle_engine_event(event);
    }
}

fn toggle<E: RenderEngine>(
    controller: &mut MapController<E>,
    method: &str,
    arguments: &Value,
    gesture: Gesture,
) -> Result<Value, DispatchError> {
    let args: EnabledArgs = parse(method, arguments)?;
    controller.set_gesture_enabled(gesture, args.enabled);
    Ok(Value::Null)
}

/// Parses arguments; `null` is treated as an empty object.
fn parse<T: DeserializeOwned>(method: &str, arguments: &Value) -> Result<T, DispatchError> {
    let empty = Value::Object(Map::new());
    let source = if arguments.is_null() { &empty } else { arguments };
    T::deserialize(source).map_err(|err| DispatchError::InvalidArguments {
        method: method.to_string(),
        message: err.to_string(),
    })
}

fn to_value<T: Serialize>(method: &str, value: T) -> Result<Value, DispatchError> {
    serde_json::to_value(value).map_err(|err| DispatchError::InvalidArguments {
        method: method.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{DispatchError, EventRouter};
    use crate::config::MapConfig;
    use crate::controller::MapController;
    use crate::engine::MemoryEngine;
    use serde_json::{json, Value};

    fn router() -> EventRouter<MemoryEngine> {
        EventRouter::new(MapController::new(MemoryEngine::new(), MapConfig::default()))
    }

    #[test]
    fn unknown_method_is_unsupported() {
        let mut router = router();
        let err = router
            .dispatch("rotateEarth", &Value::Null)
            .expect_err("unknown method");
        assert_eq!(err, DispatchError::UnsupportedOperation("rotateEarth".to_string()));
        assert_eq!(err.code(), "unsupported_operation");
    }

    #[test]
    fn missing_required_argument_is_invalid() {
        let mut router = router();
        let err = router
            .dispatch("addCollection", &json!({"parentId": 1}))
            .expect_err("missing id");
        assert_eq!(err.code(), "invalid_arguments");
        assert!(router.controller().snapshot().collections.is_empty());
    }

    #[test]
    fn not_found_is_absorbed() {
        let mut router = router();
        let value = router
            .dispatch(
                "addPlacemark",
                &json!({"id": 1, "collectionId": 99, "point": {"latitude": 0.0, "longitude": 0.0}}),
            )
            .expect("absorbed");
        assert_eq!(value, Value::Null);
        assert!(router.controller().snapshot().markers.is_empty());
    }

    #[test]
    fn logo_alignment_rejects_unknown_index() {
        let mut router = router();
        let err = router
            .dispatch("logoAlignment", &json!({"x": 5, "y": 0}))
            .expect_err("bad alignment");
        assert_eq!(err.code(), "invalid_arguments");
        router
            .dispatch("logoAlignment", &json!({"x": 1, "y": 1}))
            .expect("valid alignment");
        assert!(router.controller().engine().logo_alignment().is_some());
    }
}
