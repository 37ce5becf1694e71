use log::{info, warn};
use serde_json::{json, Value};
use std::io::{Cursor, Read};
use std::sync::Arc;
use tiny_http::{Header, Method, Request, Response, Server};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::config::ReceiverConfig;
use crate::receiver::store::{compute_stats, ReadingStore, StoredReading};

type JsonResponse = Response<Cursor<Vec<u8>>>;

/// Serve requests until the server is unblocked from another task.
pub fn serve(server: Arc<Server>, store: Arc<dyn ReadingStore>, config: ReceiverConfig) {
    info!("Receiver listening on {}", config.socket_addr());
    info!(
        "Endpoints: POST {}, GET /data, GET /stats, POST /clear, GET /health",
        config.webhook_path
    );

    for mut request in server.incoming_requests() {
        let response = route(&mut request, store.as_ref(), &config.webhook_path);
        if let Err(e) = request.respond(response) {
            warn!("Failed to send response: {}", e);
        }
    }

    info!("Receiver loop stopped");
}

fn route(request: &mut Request, store: &dyn ReadingStore, webhook_path: &str) -> JsonResponse {
    let url = request.url().to_string();
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url.as_str(), ""),
    };

    match (request.method().clone(), path) {
        (Method::Post, path) if path == webhook_path => handle_webhook(request, store),
        (Method::Get, "/data") => handle_data(store, query),
        (Method::Get, "/stats") => handle_stats(store),
        (Method::Post, "/clear") => handle_clear(store),
        (Method::Get, "/health") => handle_health(store),
        (_, path) if is_known_path(path, webhook_path) => {
            error_response(405, "HTTP method not allowed")
        }
        _ => error_response(404, "endpoint not found"),
    }
}

fn is_known_path(path: &str, webhook_path: &str) -> bool {
    path == webhook_path || matches!(path, "/data" | "/stats" | "/clear" | "/health")
}

fn handle_webhook(request: &mut Request, store: &dyn ReadingStore) -> JsonResponse {
    let mut body = String::new();
    if request.as_reader().read_to_string(&mut body).is_err() {
        warn!("Unreadable request body");
        return error_response(400, "unreadable request body");
    }

    let value: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(_) => {
            warn!("Request body is not valid JSON");
            return error_response(400, "invalid JSON body");
        }
    };

    let (device_id, temperature) = match parse_payload(&value) {
        Ok(parsed) => parsed,
        Err(message) => {
            warn!("Rejected reading: {}", message);
            return error_response(400, &message);
        }
    };

    let received_at = now_rfc3339();
    store.append(StoredReading {
        device_id: device_id.clone(),
        temperature,
        unit: value.get("unit").and_then(Value::as_str).map(str::to_string),
        timestamp: value.get("timestamp").cloned().unwrap_or(Value::Null),
        metadata: value.get("metadata").cloned(),
        received_at: received_at.clone(),
    });

    info!("Received reading from {}: {:.2}°C", device_id, temperature);
    json_response(
        200,
        json!({
            "status": "success",
            "message": "reading accepted",
            "received_at": received_at,
            "data_count": store.len(),
        }),
    )
}

/// Validate the wire object: `device_id`, `temperature` and `timestamp`
/// must be present, the id non-empty, the temperature numeric (numeric
/// strings are tolerated). Everything else is passed through untouched.
fn parse_payload(value: &Value) -> Result<(String, f64), String> {
    let object = value
        .as_object()
        .ok_or_else(|| "payload must be a JSON object".to_string())?;

    for field in ["device_id", "temperature", "timestamp"] {
        if !object.contains_key(field) {
            return Err(format!("missing required field: {}", field));
        }
    }

    let device_id = object
        .get("device_id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| "device_id must be a non-empty string".to_string())?;

    let temperature = object
        .get("temperature")
        .and_then(temperature_of)
        .ok_or_else(|| "temperature must be a number".to_string())?;

    Ok((device_id.to_string(), temperature))
}

fn temperature_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn handle_data(store: &dyn ReadingStore, query: &str) -> JsonResponse {
    let mut device_filter: Option<String> = None;
    let mut limit: Option<usize> = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "device_id" => device_filter = Some(value.into_owned()),
            "limit" => limit = value.parse().ok(),
            _ => {}
        }
    }

    let snapshot = store.snapshot();
    let total_count = snapshot.len();
    let mut filtered: Vec<StoredReading> = snapshot
        .into_iter()
        .filter(|r| {
            device_filter
                .as_deref()
                .map_or(true, |id| r.device_id == id)
        })
        .collect();

    // Keep the most recent N records
    if let Some(limit) = limit.filter(|&n| n > 0) {
        if filtered.len() > limit {
            filtered = filtered.split_off(filtered.len() - limit);
        }
    }

    json_response(
        200,
        json!({
            "status": "success",
            "total_count": total_count,
            "filtered_count": filtered.len(),
            "data": filtered,
        }),
    )
}

fn handle_stats(store: &dyn ReadingStore) -> JsonResponse {
    match compute_stats(&store.snapshot()) {
        Some(stats) => json_response(200, json!({ "status": "success", "stats": stats })),
        None => json_response(
            200,
            json!({ "status": "success", "message": "no data", "stats": {} }),
        ),
    }
}

fn handle_clear(store: &dyn ReadingStore) -> JsonResponse {
    let count = store.clear();
    info!("Cleared {} stored records", count);
    json_response(
        200,
        json!({
            "status": "success",
            "message": format!("cleared {} records", count),
        }),
    )
}

fn handle_health(store: &dyn ReadingStore) -> JsonResponse {
    json_response(
        200,
        json!({
            "status": "healthy",
            "timestamp": now_rfc3339(),
            "records_count": store.len(),
        }),
    )
}

fn json_response(status: u16, body: Value) -> JsonResponse {
    let mut response = Response::from_string(body.to_string()).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response.add_header(header);
    }
    response
}

fn error_response(status: u16, message: &str) -> JsonResponse {
    json_response(status, json!({ "status": "error", "message": message }))
}

/// Current UTC time as RFC 3339, falling back to the default rendering
/// if formatting fails.
fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339).unwrap_or_else(|_| now.to_string())
}
