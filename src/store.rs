use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
    std::collections::HashMap,
    tokio::sync::RwLock,
};

/// Latest aggregated state for one sensor.
///
/// Knock fields and the validation outcome merge independently: a new knock
/// submission overwrites `timestamp` and `knock_sequence` but keeps the last
/// validation, and vice versa. Fields a sensor has never reported are
/// omitted from serialized output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnockRecord {
    pub sensor_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knock_sequence: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Value>,
}

impl KnockRecord {
    fn empty(sensor_id: &str) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            timestamp: None,
            knock_sequence: None,
            validation: None,
        }
    }
}

/// Concurrent keyed store mapping sensor identity to its latest record.
///
/// Written by the ingestion task, read by the query surface. Records live
/// for the lifetime of the process; there is no deletion or expiry.
pub struct KnockStore {
    records: RwLock<HashMap<String, KnockRecord>>,
}

impl KnockStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite the knock fields for a sensor, preserving any
    /// previously stored validation outcome.
    pub async fn apply_knock(&self, sensor_id: &str, timestamp: i64, knock_sequence: Vec<u32>) {
        let mut records = self.records.write().await;
        let record = records
            .entry(sensor_id.to_string())
            .or_insert_with(|| KnockRecord::empty(sensor_id));
        record.timestamp = Some(timestamp);
        record.knock_sequence = Some(knock_sequence);
    }

    /// Overwrite only the validation outcome for a sensor. An unknown sensor
    /// gets a record holding nothing but the validation payload.
    pub async fn apply_validation(&self, sensor_id: &str, validation: Value) {
        let mut records = self.records.write().await;
        let record = records
            .entry(sensor_id.to_string())
            .or_insert_with(|| KnockRecord::empty(sensor_id));
        record.validation = Some(validation);
    }

    /// Point-in-time snapshot of every sensor record.
    pub async fn snapshot(&self) -> HashMap<String, KnockRecord> {
        self.records.read().await.clone()
    }

    /// Number of sensors tracked so far.
    pub async fn sensor_count(&self) -> usize {
        self.records.read().await.len()
    }
}

impl Default for KnockStore {
    fn default() -> Self {
        Self::new()
    }
}
