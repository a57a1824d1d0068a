use crate::errors::{Error, Result};
use crate::model::{DeviceStatus, Envelope, LogEntry, RecentHistory};
use crate::transport::CloudTransport;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

/// Trailing window queried for history, in milliseconds
pub const HISTORY_WINDOW_MS: i64 = 10 * 60 * 1000;
/// Upper bound on entries handed to the classifier
pub const HISTORY_LIMIT: usize = 5;
/// Data point ids included in the history query
pub const HISTORY_DP_IDS: [&str; 9] = ["1", "2", "3", "4", "5", "6", "7", "8", "9"];

pub async fn fetch_status(
    transport: &dyn CloudTransport,
    device_id: &str,
) -> Result<DeviceStatus> {
    let envelope = transport.get(&format!("/v1.0/devices/{}", device_id), &[]).await?;

    let result = check_success(envelope)?;
    Ok(DeviceStatus::from_result(&result))
}

pub async fn fetch_recent_history(
    transport: &dyn CloudTransport,
    device_id: &str,
) -> Result<RecentHistory> {
    fetch_recent_history_at(transport, device_id, Utc::now()).await
}

/// Queries `[now - 10min, now]` and keeps at most the first five entries
/// as returned by the cloud. An empty window is reported as an API error.
pub async fn fetch_recent_history_at(
    transport: &dyn CloudTransport,
    device_id: &str,
    now: DateTime<Utc>,
) -> Result<RecentHistory> {
    let (start, end) = history_window(now);
    debug!("Querying device logs from {} to {}", start, end);

    let query = [
        ("query_type", "1".to_string()),
        ("type", HISTORY_DP_IDS.join(",")),
        ("start_time", start.to_string()),
        ("end_time", end.to_string()),
    ];

    let envelope = transport
        .get(&format!("/v2.0/cloud/thing/{}/logs", device_id), &query)
        .await?;

    let result = check_success(envelope)?;

    let history: RecentHistory = result
        .get("logs")
        .and_then(Value::as_array)
        .map(|logs| {
            logs.iter()
                .take(HISTORY_LIMIT)
                .map(LogEntry::from_value)
                .collect()
        })
        .unwrap_or_default();

    if history.is_empty() {
        return Err(Error::Api("no logs found".to_string()));
    }

    Ok(history)
}

/// Millisecond bounds of the history query for a call made at `now`
pub fn history_window(now: DateTime<Utc>) -> (i64, i64) {
    let end = now.timestamp_millis();
    (end - HISTORY_WINDOW_MS, end)
}

fn check_success(envelope: Envelope) -> Result<Value> {
    if !envelope.success {
        debug!("Request rejected with code {:?}", envelope.code);
        return Err(Error::Api(envelope.msg));
    }
    Ok(envelope.result)
}
