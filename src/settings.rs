use {
    serde::{Deserialize, Serialize},
    tokio::sync::RwLock,
};

/// Runtime sensor tuning, shared between the ingestion side and the query
/// surface. Field names follow the sensor wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorConfig {
    /// Minimum piezo reading that registers as a knock.
    pub knock_threshold: u32,
    /// Milliseconds to let a knock fade before listening again.
    pub knock_fade_time: u32,
    /// Milliseconds to wait for a knock sequence to complete.
    pub default_knock_timeout: u32,
    /// Whether sensors should record new patterns instead of validating.
    pub is_programming_mode: bool,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            knock_threshold: 100,
            knock_fade_time: 150,
            default_knock_timeout: 1200,
            is_programming_mode: false,
        }
    }
}

/// Partial configuration update. Absent fields leave the current value
/// untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorConfigPatch {
    pub knock_threshold: Option<i64>,
    pub knock_fade_time: Option<i64>,
    pub default_knock_timeout: Option<i64>,
    pub is_programming_mode: Option<bool>,
}

#[derive(Debug)]
pub enum SettingsError {
    InvalidField { field: &'static str, value: i64 },
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::InvalidField { field, value } => {
                write!(f, "invalid value for {}: {} (must be a non-negative integer)", field, value)
            }
        }
    }
}

impl std::error::Error for SettingsError {}

/// Process-wide configuration record with validated partial updates.
pub struct SettingsStore {
    config: RwLock<SensorConfig>,
}

impl SettingsStore {
    pub fn new(initial: SensorConfig) -> Self {
        Self {
            config: RwLock::new(initial),
        }
    }

    /// Current configuration snapshot.
    pub async fn get(&self) -> SensorConfig {
        self.config.read().await.clone()
    }

    /// Apply only the fields supplied in `patch`. Every supplied numeric
    /// field is validated first; one invalid field rejects the whole update
    /// and nothing changes.
    pub async fn update(&self, patch: SensorConfigPatch) -> Result<SensorConfig, SettingsError> {
        let knock_threshold = checked("knockThreshold", patch.knock_threshold)?;
        let knock_fade_time = checked("knockFadeTime", patch.knock_fade_time)?;
        let default_knock_timeout = checked("defaultKnockTimeout", patch.default_knock_timeout)?;

        let mut config = self.config.write().await;
        if let Some(value) = knock_threshold {
            config.knock_threshold = value;
        }
        if let Some(value) = knock_fade_time {
            config.knock_fade_time = value;
        }
        if let Some(value) = default_knock_timeout {
            config.default_knock_timeout = value;
        }
        if let Some(value) = patch.is_programming_mode {
            config.is_programming_mode = value;
        }

        log::info!("Configuration updated: {:?}", *config);
        Ok(config.clone())
    }
}

fn checked(field: &'static str, value: Option<i64>) -> Result<Option<u32>, SettingsError> {
    match value {
        None => Ok(None),
        Some(v) => u32::try_from(v)
            .map(Some)
            .map_err(|_| SettingsError::InvalidField { field, value: v }),
    }
}
