use crate::device::LitterBox;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

const TOKEN_LIFETIME_SECS: u64 = 7200;

#[derive(Clone)]
struct AppState {
    device: Arc<Mutex<LitterBox>>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    start_time: i64,
    end_time: i64,
    #[serde(default)]
    size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    commands: Vec<CommandItem>,
}

#[derive(Debug, Deserialize)]
pub struct CommandItem {
    code: String,
    value: Value,
}

pub fn create_router(device: LitterBox) -> Router {
    let state = AppState {
        device: Arc::new(Mutex::new(device)),
    };

    Router::new()
        .route("/v1.0/token", get(get_token))
        .route("/v1.0/devices/:device_id", get(get_device))
        .route("/v2.0/cloud/thing/:device_id/logs", get(get_logs))
        .route("/v1.0/devices/:device_id/commands", post(post_commands))
        .with_state(state)
}

fn success(result: Value) -> Json<Value> {
    Json(json!({
        "success": true,
        "result": result,
        "t": Utc::now().timestamp_millis(),
    }))
}

fn failure(code: i64, msg: &str) -> Json<Value> {
    Json(json!({
        "success": false,
        "code": code,
        "msg": msg,
        "t": Utc::now().timestamp_millis(),
    }))
}

/// Only checks that the signing headers are there; signatures are not verified
fn is_signed(headers: &HeaderMap) -> bool {
    ["client_id", "sign", "t", "nonce"]
        .iter()
        .all(|name| headers.get(*name).is_some_and(|v| !v.is_empty()))
}

async fn get_token(headers: HeaderMap) -> Json<Value> {
    if !is_signed(&headers) {
        return failure(1004, "sign invalid");
    }

    info!("Issued access token");
    success(json!({
        "access_token": uuid::Uuid::new_v4().simple().to_string(),
        "refresh_token": uuid::Uuid::new_v4().simple().to_string(),
        "expire_time": TOKEN_LIFETIME_SECS,
        "uid": "sim-user",
    }))
}

async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
) -> Json<Value> {
    if let Err(response) = authorize(&headers, &state, &device_id) {
        return response;
    }

    let device = lock(&state);
    success(device.status_result())
}

async fn get_logs(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(params): Query<LogsQuery>,
    headers: HeaderMap,
) -> Json<Value> {
    if let Err(response) = authorize(&headers, &state, &device_id) {
        return response;
    }

    let device = lock(&state);
    let mut logs = device.events_between(params.start_time, params.end_time);
    logs.truncate(params.size.unwrap_or(20));
    success(json!({
        "device_id": device_id,
        "logs": logs,
        "has_next": false,
    }))
}

async fn post_commands(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<CommandRequest>,
) -> Json<Value> {
    if let Err(response) = authorize(&headers, &state, &device_id) {
        return response;
    }

    let mut device = lock(&state);
    let now = Utc::now().timestamp_millis();
    for command in &request.commands {
        info!("Command {} = {}", command.code, command.value);
        if let Err(msg) = device.apply(&command.code, &command.value, now) {
            warn!("Rejected command {}: {}", command.code, msg);
            return failure(2008, &msg);
        }
    }

    success(json!(true))
}

fn authorize(headers: &HeaderMap, state: &AppState, device_id: &str) -> Result<(), Json<Value>> {
    if !is_signed(headers) || headers.get("access_token").is_none() {
        return Err(failure(1010, "token invalid"));
    }
    if lock(state).device_id != device_id {
        warn!("Request for unknown device {}", device_id);
        return Err(failure(1106, "permission deny"));
    }
    Ok(())
}

fn lock(state: &AppState) -> std::sync::MutexGuard<'_, LitterBox> {
    state.device.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn signed_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in [("client_id", "id"), ("sign", "ABC"), ("t", "1"), ("nonce", "n")] {
            headers.insert(name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn test_signing_headers_required() {
        assert!(is_signed(&signed_headers()));

        let mut missing = signed_headers();
        missing.remove("sign");
        assert!(!is_signed(&missing));
    }

    #[test]
    fn test_token_requires_signature() {
        tokio_test::block_on(async {
            let Json(body) = get_token(HeaderMap::new()).await;
            assert_eq!(body["success"], false);
            assert_eq!(body["msg"], "sign invalid");

            let Json(body) = get_token(signed_headers()).await;
            assert_eq!(body["success"], true);
            assert_eq!(body["result"]["expire_time"], 7200);
        });
    }
}
