use rand::Rng;
use std::collections::HashMap;
use time::OffsetDateTime;

use crate::config::DeviceConfig;
use crate::models::{Reading, UNIT_CELSIUS};

/// Produce one fresh reading: a uniform draw within the configured bounds,
/// rounded to 2 decimal places and stamped with the current UTC time.
///
/// Pure apart from the random source; it has no failure modes.
pub fn generate(config: &DeviceConfig) -> Reading {
    let mut rng = rand::thread_rng();
    let raw: f64 = rng.gen_range(config.min_temp..=config.max_temp);

    Reading {
        device_id: config.device_id.clone(),
        temperature: (raw * 100.0).round() / 100.0, // 2 decimal places
        unit: UNIT_CELSIUS.to_string(),
        captured_at: OffsetDateTime::now_utc(),
        metadata: default_metadata(),
    }
}

fn default_metadata() -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert("sensor_type".to_string(), "temperature".to_string());
    metadata.insert("location".to_string(), "room_1".to_string());
    metadata.insert("status".to_string(), "active".to_string());
    metadata
}
