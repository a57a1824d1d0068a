//! Human-readable dumps of telemetry for debug runs.

use crate::model::{DeviceStatus, Field, LogEntry};
use chrono::TimeZone;
use chrono_tz::Europe::Amsterdam;
use serde_json::{Map, Value};

pub fn status_lines(status: &DeviceStatus) -> Vec<String> {
    let mut lines = Vec::with_capacity(status.data_points.len() + 3);
    lines.push("========== DEVICE STATUS ==========".to_string());
    if let Some(name) = &status.name {
        lines.push(format!("Name: {}", name));
    }
    lines.push(format!("Online: {}", status.online));
    for (code, value) in &status.data_points {
        lines.push(format!(
            "  {:<25} = {:<15} (type: {})",
            code,
            value.to_string(),
            value.type_name()
        ));
    }
    lines.push("===================================".to_string());
    lines
}

/// Pretty JSON of the history with an `event_time_readable` in the
/// device's home zone (Europe/Amsterdam) added
pub fn history_json(history: &[LogEntry]) -> String {
    let entries: Vec<Value> = history.iter().map(entry_json).collect();
    serde_json::to_string_pretty(&entries).unwrap_or_else(|e| format!("<unprintable: {}>", e))
}

fn entry_json(entry: &LogEntry) -> Value {
    let mut obj: Map<String, Value> = entry.extra.clone();
    if let Some(code) = &entry.code {
        obj.insert("code".to_string(), Value::from(code.as_str()));
    }
    match &entry.value {
        Field::Present(v) => {
            obj.insert("value".to_string(), Value::from(v.as_str()));
        }
        Field::WrongType(raw) => {
            obj.insert("value".to_string(), raw.clone());
        }
        Field::Absent => {}
    }
    if let Field::Present(ms) = &entry.event_time {
        obj.insert("event_time".to_string(), Value::from(*ms));
        if let Some(readable) = readable_time(*ms) {
            obj.insert("event_time_readable".to_string(), Value::from(readable));
        }
    }
    Value::Object(obj)
}

fn readable_time(epoch_ms: i64) -> Option<String> {
    Amsterdam
        .timestamp_millis_opt(epoch_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}
