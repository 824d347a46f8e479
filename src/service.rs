use {
    crate::comparator::{compare_sequences, MatchResult},
    crate::patterns::{KnockPattern, PatternError, PatternStore},
    crate::settings::{SensorConfig, SensorConfigPatch, SettingsError, SettingsStore},
    crate::store::{KnockRecord, KnockStore},
    serde::{Deserialize, Serialize},
    std::{collections::HashMap, sync::Arc},
    tokio::sync::RwLock,
};

/// POST body for a direct knock submission from a sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnockSubmission {
    pub timeout: u32,
    pub knock_sequence: Vec<u32>,
}

/// Acknowledgement returned to the submitting sensor, carrying the current
/// configuration so the sensor can pick up tuning changes.
#[derive(Debug, Serialize)]
pub struct SubmissionAck {
    pub message: String,
    pub config: SensorConfig,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LatestKnock {
    Sequence { knock_sequence: Vec<u32> },
    Empty { message: String },
}

#[derive(Debug, Serialize)]
pub struct ConfigUpdated {
    pub message: String,
    pub config: SensorConfig,
}

#[derive(Debug, Serialize)]
pub struct PatternsList {
    pub patterns: Vec<KnockPattern>,
}

/// Result of an add-pattern request. A duplicate id is reported through the
/// same shape, message only.
#[derive(Debug, Serialize)]
pub struct PatternAdded {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<KnockPattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareRequest {
    pub knock1: Vec<u32>,
    pub knock2: Vec<u32>,
    pub deviation: f64,
}

/// Query surface handed to the external request layer.
///
/// Thin async facade over the shared stores; every method returns a
/// serializable response body, so the routing layer only maps them onto its
/// protocol.
#[derive(Clone)]
pub struct KnockService {
    store: Arc<KnockStore>,
    settings: Arc<SettingsStore>,
    patterns: Arc<PatternStore>,
    latest_submission: Arc<RwLock<Option<Vec<u32>>>>,
}

impl KnockService {
    pub fn new(
        store: Arc<KnockStore>,
        settings: Arc<SettingsStore>,
        patterns: Arc<PatternStore>,
    ) -> Self {
        Self {
            store,
            settings,
            patterns,
            latest_submission: Arc::new(RwLock::new(None)),
        }
    }

    /// Full snapshot of aggregated sensor records, keyed by sensor id.
    pub async fn knocks(&self) -> HashMap<String, KnockRecord> {
        self.store.snapshot().await
    }

    /// Record a direct knock submission and acknowledge it with the current
    /// sensor configuration.
    pub async fn submit_knock(&self, submission: KnockSubmission) -> SubmissionAck {
        log::info!(
            "Received knock submission: {:?} (timeout {}ms)",
            submission.knock_sequence,
            submission.timeout
        );
        *self.latest_submission.write().await = Some(submission.knock_sequence);

        SubmissionAck {
            message: "Knock data received".to_string(),
            config: self.settings.get().await,
        }
    }

    /// Most recent direct knock submission, across all sensors.
    pub async fn latest_knock(&self) -> LatestKnock {
        match self.latest_submission.read().await.clone() {
            Some(knock_sequence) => LatestKnock::Sequence { knock_sequence },
            None => LatestKnock::Empty {
                message: "No knock data available".to_string(),
            },
        }
    }

    pub async fn config(&self) -> SensorConfig {
        self.settings.get().await
    }

    /// Apply a partial configuration update. An invalid field rejects the
    /// whole patch and surfaces the error to the caller.
    pub async fn update_config(
        &self,
        patch: SensorConfigPatch,
    ) -> Result<ConfigUpdated, SettingsError> {
        let config = self.settings.update(patch).await?;
        Ok(ConfigUpdated {
            message: "Configuration updated".to_string(),
            config,
        })
    }

    /// Compare two knock sequences under a percentage deviation tolerance.
    pub fn compare(&self, request: CompareRequest) -> MatchResult {
        compare_sequences(&request.knock1, &request.knock2, request.deviation)
    }

    pub async fn patterns(&self) -> PatternsList {
        PatternsList {
            patterns: self.patterns.list().await,
        }
    }

    /// Store a new pattern. A duplicate id is a success-shaped response, not
    /// an error; only persistence failures propagate.
    pub async fn add_pattern(&self, pattern: KnockPattern) -> Result<PatternAdded, PatternError> {
        match self.patterns.add(pattern).await {
            Ok(stored) => Ok(PatternAdded {
                message: "Pattern added".to_string(),
                pattern: Some(stored),
            }),
            Err(PatternError::DuplicateId(id)) => {
                log::info!("Rejected duplicate pattern id {}", id);
                Ok(PatternAdded {
                    message: "Pattern ID already exists".to_string(),
                    pattern: None,
                })
            }
            Err(e) => Err(e),
        }
    }
}
