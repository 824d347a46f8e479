use {
    crate::store::KnockStore,
    serde::Deserialize,
    serde_json::Value,
    std::sync::Arc,
    tokio::sync::mpsc,
};

/// Raw message handed over by the transport subscriber.
#[derive(Debug, Clone)]
pub struct TransportMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Messages consumed by the ingestion task.
#[derive(Debug, Clone)]
pub enum IngestMessage {
    Event(TransportMessage),
    Shutdown,
}

#[derive(Debug)]
pub enum DecodeError {
    Malformed(serde_json::Error),
    MissingSensorId,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Malformed(e) => write!(f, "malformed event payload: {}", e),
            DecodeError::MissingSensorId => write!(f, "event payload has no sensor_id"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Malformed(e)
    }
}

/// Decoded sensor event before classification.
#[derive(Debug, Deserialize)]
struct SensorEvent {
    sensor_id: Option<String>,
    timestamp: Option<i64>,
    knock_sequence: Option<Vec<u32>>,
    validation: Option<Value>,
}

/// Decode one event payload and apply it to the store.
///
/// A payload that cannot be attributed to a sensor is an error; one that
/// decodes but carries neither a knock sequence nor a validation outcome is
/// dropped. Knock events without a timestamp are stamped with the receive
/// time.
pub async fn apply_message(store: &KnockStore, payload: &[u8]) -> Result<(), DecodeError> {
    let event: SensorEvent = serde_json::from_slice(payload)?;

    let sensor_id = match event.sensor_id {
        Some(id) if !id.is_empty() => id,
        _ => return Err(DecodeError::MissingSensorId),
    };

    if let Some(sequence) = event.knock_sequence {
        let timestamp = event.timestamp.unwrap_or_else(now_millis);
        log::debug!("Knock from {}: {} intervals", sensor_id, sequence.len());
        store.apply_knock(&sensor_id, timestamp, sequence).await;
    } else if let Some(validation) = event.validation {
        log::debug!("Validation for {}", sensor_id);
        store.apply_validation(&sensor_id, validation).await;
    } else {
        log::debug!("Ignoring message from {}: neither knock_sequence nor validation", sensor_id);
    }

    Ok(())
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Long-running ingestion task fed by the transport subscriber.
///
/// Processes one message at a time. Decode failures are logged and the
/// message dropped; the loop only stops on `Shutdown` or once every sender
/// is gone, finishing the message in hand first.
pub async fn ingestion_task(mut rx: mpsc::Receiver<IngestMessage>, store: Arc<KnockStore>) {
    log::info!("Ingestion task started");

    let mut applied = 0u64;
    let mut dropped = 0u64;

    while let Some(message) = rx.recv().await {
        match message {
            IngestMessage::Event(event) => match apply_message(&store, &event.payload).await {
                Ok(()) => applied += 1,
                Err(e) => {
                    dropped += 1;
                    log::warn!("Dropping message on {}: {}", event.topic, e);
                }
            },
            IngestMessage::Shutdown => {
                log::info!("Ingestion task received shutdown signal");
                break;
            }
        }
    }

    log::info!("Ingestion task stopped ({} applied, {} dropped)", applied, dropped);
}
