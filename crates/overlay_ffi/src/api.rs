//! FFI use-case API for Flutter map views.
//!
//! # Responsibility
//! - Expose per-map command, callback and drain functions to Dart via FRB.
//! - Own the session table keyed by platform view id.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Every session is mutated only while the table lock is held, so calls
//!   for one map are serialized.
//! - Payloads crossing the boundary are UTF-8 JSON strings.

use log::{info, warn};
use overlay_core::{
    core_version as core_version_inner, default_log_level as core_default_log_level,
    init_logging as init_logging_inner, EngineEvent, EventRouter, MapConfig, MapController,
    MemoryEngine,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, OnceLock};

const LOG_LEVEL_ENV: &str = "OVERLAY_LOG_LEVEL";

type MapSession = EventRouter<MemoryEngine>;

static MAP_SESSIONS: OnceLock<Mutex<BTreeMap<i64, MapSession>>> = OnceLock::new();

/// Response envelope for map calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapResponse {
    /// Whether the call succeeded.
    pub ok: bool,
    /// JSON-encoded result value on success.
    pub value_json: Option<String>,
    /// Stable error code on failure.
    pub error_code: Option<String>,
    /// Human-readable message for diagnostics.
    pub message: String,
}

impl MapResponse {
    fn success(value: &Value) -> Self {
        Self {
            ok: true,
            value_json: Some(value.to_string()),
            error_code: None,
            message: String::new(),
        }
    }

    fn failure(code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            value_json: None,
            error_code: Some(code.to_string()),
            message: message.into(),
        }
    }
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Default log level, honoring the `OVERLAY_LOG_LEVEL` override.
///
/// Unknown override values fall back to the build-mode default.
#[flutter_rust_bridge::frb(sync)]
pub fn default_log_level() -> String {
    match std::env::var(LOG_LEVEL_ENV) {
        Ok(raw) => {
            let normalized = raw.trim().to_ascii_lowercase();
            match normalized.as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => normalized,
                "warning" => "warn".to_string(),
                _ => core_default_log_level().to_string(),
            }
        }
        Err(_) => core_default_log_level().to_string(),
    }
}

/// Initializes Rust core logging once per process.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Idempotent for the same `level + log_dir`.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Creates a map session for `view_id`.
///
/// Returns the channel name as a JSON string value.
#[flutter_rust_bridge::frb(sync)]
pub fn map_create(view_id: i64, config_json: Option<String>) -> MapResponse {
    let config = match config_json.as_deref().map(MapConfig::from_json) {
        None => MapConfig::default(),
        Some(Ok(config)) => config,
        Some(Err(err)) => return MapResponse::failure("invalid_config", err.to_string()),
    };

    let mut sessions = lock_sessions();
    if sessions.contains_key(&view_id) {
        return MapResponse::failure(
            "duplicate_id",
            format!("map view already created: {view_id}"),
        );
    }
    let channel = config.channel_name(view_id);
    sessions.insert(
        view_id,
        EventRouter::new(MapController::new(MemoryEngine::new(), config)),
    );
    info!("event=map_create module=ffi status=ok view_id={}", view_id);
    MapResponse::success(&Value::String(channel))
}

/// Drops a map session. Disposing an unknown view is a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn map_dispose(view_id: i64) -> MapResponse {
    let removed = lock_sessions().remove(&view_id).is_some();
    info!(
        "event=map_dispose module=ffi status={} view_id={}",
        if removed { "ok" } else { "noop" },
        view_id
    );
    MapResponse::success(&Value::Bool(removed))
}

/// Dispatches one host command to a map.
///
/// `arguments_json` may be omitted for commands without arguments.
#[flutter_rust_bridge::frb(sync)]
pub fn map_invoke(view_id: i64, method: String, arguments_json: Option<String>) -> MapResponse {
    let arguments = match arguments_json.as_deref().map(serde_json::from_str::<Value>) {
        None => Value::Null,
        Some(Ok(value)) => value,
        Some(Err(err)) => {
            return MapResponse::failure(
                "invalid_arguments",
                format!("arguments for `{method}` are not valid JSON: {err}"),
            )
        }
    };

    with_session(view_id, |session| {
        match session.dispatch(method.as_str(), &arguments) {
            Ok(value) => MapResponse::success(&value),
            Err(err) => MapResponse::failure(err.code(), err.to_string()),
        }
    })
}

/// Feeds one native engine callback into a map.
#[flutter_rust_bridge::frb(sync)]
pub fn map_engine_event(view_id: i64, event_json: String) -> MapResponse {
    let event = match serde_json::from_str::<EngineEvent>(&event_json) {
        Ok(event) => event,
        Err(err) => {
            warn!("event=map_engine_event module=ffi status=error view_id={}", view_id);
            return MapResponse::failure("invalid_arguments", format!("invalid engine event: {err}"));
        }
    };
    with_session(view_id, |session| {
        session.feed_engine_event(event);
        MapResponse::success(&Value::Null)
    })
}

/// Drains queued host notifications, each encoded as one JSON string.
///
/// Unknown views yield an empty list.
#[flutter_rust_bridge::frb(sync)]
pub fn map_take_notifications(view_id: i64) -> Vec<String> {
    let mut sessions = lock_sessions();
    let Some(session) = sessions.get_mut(&view_id) else {
        return Vec::new();
    };
    session
        .take_notifications()
        .iter()
        .filter_map(|notification| serde_json::to_string(notification).ok())
        .collect()
}

/// Drains the engine call log for native replay, one JSON string per call.
///
/// Unknown views yield an empty list.
#[flutter_rust_bridge::frb(sync)]
pub fn map_take_engine_calls(view_id: i64) -> Vec<String> {
    let mut sessions = lock_sessions();
    let Some(session) = sessions.get_mut(&view_id) else {
        return Vec::new();
    };
    session
        .controller_mut()
        .engine_mut()
        .take_calls()
        .iter()
        .filter_map(|call| serde_json::to_string(call).ok())
        .collect()
}

fn lock_sessions() -> MutexGuard<'static, BTreeMap<i64, MapSession>> {
    MAP_SESSIONS
        .get_or_init(|| Mutex::new(BTreeMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn with_session(view_id: i64, f: impl FnOnce(&mut MapSession) -> MapResponse) -> MapResponse {
    let mut sessions = lock_sessions();
    match sessions.get_mut(&view_id) {
        Some(session) => f(session),
        None => MapResponse::failure("unknown_view", format!("map view not created: {view_id}")),
    }
}
