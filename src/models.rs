use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

/// Unit reported with every reading.
pub const UNIT_CELSIUS: &str = "celsius";

/// One generated temperature sample, constructed fresh each cycle and
/// immutable afterwards. Serializes to the webhook wire format:
/// `{"device_id", "temperature", "unit", "timestamp", "metadata"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: String,
    pub temperature: f64,
    pub unit: String,
    #[serde(rename = "timestamp", with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Tri-state result of a full delivery attempt sequence for one reading.
///
/// `RetryableFailure` signals exhaustion of the attempt budget and is
/// distinct from `PermanentFailure`, a single 4xx rejection where further
/// retries would not help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    RetryableFailure,
    PermanentFailure,
}
