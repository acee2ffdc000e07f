//! CLI replay entry point.
//!
//! # Responsibility
//! - Replay a JSON-lines script against an in-memory map to verify `overlay_core` wiring.
//! - Keep output deterministic so transcripts can be diffed.
//!
//! Each input line is either a host command `{"method": .., "arguments": ..}`
//! or an engine callback `{"event": .., ...}`. For every line the CLI prints
//! the result, then any queued notifications and engine calls.

use overlay_core::{EngineEvent, EventRouter, MapConfig, MapController, MemoryEngine};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut router = EventRouter::new(MapController::new(MemoryEngine::new(), MapConfig::default()));
    router.controller_mut().engine_mut().take_calls();

    if writeln!(out, "overlay_core version={}", overlay_core::core_version()).is_err() {
        return ExitCode::FAILURE;
    }

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                eprintln!("read error: {err}");
                return ExitCode::FAILURE;
            }
        };
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let output = replay_line(&mut router, &line);
        if writeln!(out, "{}: {}", index + 1, output).is_err() {
            return ExitCode::FAILURE;
        }
        for notification in router.take_notifications() {
            let encoded = serde_json::to_string(&notification).unwrap_or_default();
            if writeln!(out, "  notify {encoded}").is_err() {
                return ExitCode::FAILURE;
            }
        }
        for call in router.controller_mut().engine_mut().take_calls() {
            let encoded = serde_json::to_string(&call).unwrap_or_default();
            if writeln!(out, "  engine {encoded}").is_err() {
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn replay_line(router: &mut EventRouter<MemoryEngine>, line: &str) -> Value {
    let input: Value = match serde_json::from_str(line) {
        Ok(input) => input,
        Err(err) => return json!({"error": "invalid_json", "message": err.to_string()}),
    };

    if input.get("event").is_some() {
        return match serde_json::from_value::<EngineEvent>(input) {
            Ok(event) => {
                router.feed_engine_event(event);
                json!({"ok": null})
            }
            Err(err) => json!({"error": "invalid_arguments", "message": err.to_string()}),
        };
    }

    let Some(method) = input.get("method").and_then(Value::as_str) else {
        return json!({"error": "invalid_arguments", "message": "missing `method` or `event`"});
    };
    let arguments = input.get("arguments").cloned().unwrap_or(Value::Null);
    match router.dispatch(method, &arguments) {
        Ok(value) => json!({ "ok": value }),
        Err(err) => json!({"error": err.code(), "message": err.to_string()}),
    }
}
