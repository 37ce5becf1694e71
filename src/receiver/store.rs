use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One accepted webhook record plus the time it arrived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredReading {
    pub device_id: String,
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub timestamp: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub received_at: String,
}

/// Append-only record store behind an interface so handlers can be
/// exercised against any backing in tests. Read paths work on snapshots.
pub trait ReadingStore: Send + Sync {
    fn append(&self, reading: StoredReading);
    fn snapshot(&self) -> Vec<StoredReading>;
    fn clear(&self) -> usize;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store used by the receiver binary.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<StoredReading>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<StoredReading>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReadingStore for InMemoryStore {
    fn append(&self, reading: StoredReading) {
        self.guard().push(reading);
    }

    fn snapshot(&self) -> Vec<StoredReading> {
        self.guard().clone()
    }

    fn clear(&self) -> usize {
        let mut records = self.guard();
        let count = records.len();
        records.clear();
        count
    }

    fn len(&self) -> usize {
        self.guard().len()
    }
}

/// Aggregate temperature figures over a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub count: usize,
}

/// Summary served by the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_records: usize,
    pub unique_devices: usize,
    pub devices: Vec<String>,
    pub temperature_stats: TemperatureStats,
}

/// Pure query over a snapshot; `None` when nothing has been stored yet.
pub fn compute_stats(records: &[StoredReading]) -> Option<StoreStats> {
    if records.is_empty() {
        return None;
    }

    let devices: BTreeSet<&str> = records.iter().map(|r| r.device_id.as_str()).collect();
    let temperatures: Vec<f64> = records.iter().map(|r| r.temperature).collect();

    let min = temperatures.iter().copied().fold(f64::INFINITY, f64::min);
    let max = temperatures
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let avg = temperatures.iter().sum::<f64>() / temperatures.len() as f64;

    Some(StoreStats {
        total_records: records.len(),
        unique_devices: devices.len(),
        devices: devices.into_iter().map(str::to_string).collect(),
        temperature_stats: TemperatureStats {
            min,
            max,
            avg,
            count: temperatures.len(),
        },
    })
}
