use {
    serde::{Deserialize, Serialize},
    std::{
        fs, io,
        path::{Path, PathBuf},
    },
    tokio::sync::RwLock,
};

/// A stored knock pattern: inter-tap intervals keyed by a unique id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnockPattern {
    pub id: i64,
    pub pattern: Vec<u32>,
}

#[derive(Debug)]
pub enum PatternError {
    DuplicateId(i64),
    Io(io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternError::DuplicateId(id) => write!(f, "pattern id {} already exists", id),
            PatternError::Io(e) => write!(f, "pattern storage error: {}", e),
            PatternError::Json(e) => write!(f, "stored patterns are not valid JSON: {}", e),
        }
    }
}

impl std::error::Error for PatternError {}

impl From<io::Error> for PatternError {
    fn from(e: io::Error) -> Self {
        PatternError::Io(e)
    }
}

impl From<serde_json::Error> for PatternError {
    fn from(e: serde_json::Error) -> Self {
        PatternError::Json(e)
    }
}

/// Storage medium for the pattern list.
///
/// The store rewrites the full list on every successful add; incremental
/// updates are not part of the contract.
pub trait PatternPersistence: Send + Sync {
    /// Stored pattern list, or `Ok(None)` when no storage exists yet.
    fn load(&self) -> Result<Option<Vec<KnockPattern>>, PatternError>;

    /// Replace the stored contents with the full pattern list.
    fn persist(&self, patterns: &[KnockPattern]) -> Result<(), PatternError>;

    /// Backend description for logging.
    fn backend_type(&self) -> String;
}

/// JSON file persistence. The rewrite goes through a sibling temp file and a
/// rename, so a crash mid-write leaves the previous contents intact.
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PatternPersistence for JsonFilePersistence {
    fn load(&self) -> Result<Option<Vec<KnockPattern>>, PatternError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn persist(&self, patterns: &[KnockPattern]) -> Result<(), PatternError> {
        let json = serde_json::to_string_pretty(patterns)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        log::debug!("Persisted {} knock patterns to {}", patterns.len(), self.path.display());
        Ok(())
    }

    fn backend_type(&self) -> String {
        self.path.display().to_string()
    }
}

/// Named knock patterns over a persistence backend.
///
/// Writers hold the write lock across the storage rewrite, so persistence
/// never interleaves.
pub struct PatternStore {
    persistence: Box<dyn PatternPersistence>,
    patterns: RwLock<Vec<KnockPattern>>,
}

impl PatternStore {
    /// Open a JSON-file-backed store at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PatternError> {
        Self::with_persistence(JsonFilePersistence::new(path.as_ref()))
    }

    /// Open the store over any persistence backend, seeding the default
    /// patterns when the backend holds nothing yet.
    pub fn with_persistence(
        persistence: impl PatternPersistence + 'static,
    ) -> Result<Self, PatternError> {
        let patterns = match persistence.load()? {
            Some(loaded) => {
                log::info!(
                    "Loaded {} knock patterns from {}",
                    loaded.len(),
                    persistence.backend_type()
                );
                loaded
            }
            None => {
                let defaults = Self::default_patterns();
                persistence.persist(&defaults)?;
                log::info!(
                    "No stored patterns at {}, seeded {} defaults",
                    persistence.backend_type(),
                    defaults.len()
                );
                defaults
            }
        };

        Ok(Self {
            persistence: Box::new(persistence),
            patterns: RwLock::new(patterns),
        })
    }

    fn default_patterns() -> Vec<KnockPattern> {
        vec![
            KnockPattern {
                id: 1,
                pattern: vec![50, 30, 450],
            },
            KnockPattern {
                id: 2,
                pattern: vec![60, 40, 500],
            },
        ]
    }

    /// Append a pattern and persist the full list. A pattern whose id is
    /// already present leaves both the store and the backend untouched.
    pub async fn add(&self, pattern: KnockPattern) -> Result<KnockPattern, PatternError> {
        let mut patterns = self.patterns.write().await;

        if patterns.iter().any(|p| p.id == pattern.id) {
            return Err(PatternError::DuplicateId(pattern.id));
        }

        let mut next = patterns.clone();
        next.push(pattern.clone());
        self.persistence.persist(&next)?;
        *patterns = next;

        log::info!("Added knock pattern {} ({} intervals)", pattern.id, pattern.pattern.len());
        Ok(pattern)
    }

    /// Snapshot of the stored patterns in insertion order.
    pub async fn list(&self) -> Vec<KnockPattern> {
        self.patterns.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_seeds_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.json");

        let store = PatternStore::load(&path).unwrap();
        let patterns = store.list().await;

        assert_eq!(
            patterns,
            vec![
                KnockPattern { id: 1, pattern: vec![50, 30, 450] },
                KnockPattern { id: 2, pattern: vec![60, 40, 500] },
            ]
        );
        // Seeding persists immediately
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_add_persists_and_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.json");

        let store = PatternStore::load(&path).unwrap();
        store
            .add(KnockPattern { id: 3, pattern: vec![100, 200] })
            .await
            .unwrap();

        let reloaded = PatternStore::load(&path).unwrap();
        let patterns = reloaded.list().await;
        assert_eq!(patterns.len(), 3);
        assert_eq!(patterns[2], KnockPattern { id: 3, pattern: vec![100, 200] });
    }

    #[tokio::test]
    async fn test_duplicate_id_leaves_store_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.json");

        let store = PatternStore::load(&path).unwrap();
        let before = store.list().await;

        let result = store
            .add(KnockPattern { id: 1, pattern: vec![9, 9, 9] })
            .await;
        assert!(matches!(result, Err(PatternError::DuplicateId(1))));

        // In-memory list and file contents are both untouched
        assert_eq!(store.list().await, before);
        let reloaded = PatternStore::load(&path).unwrap();
        assert_eq!(reloaded.list().await, before);
    }

    #[tokio::test]
    async fn test_load_reads_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.json");
        fs::write(&path, r#"[{"id": 7, "pattern": [10, 20, 30]}]"#).unwrap();

        let store = PatternStore::load(&path).unwrap();
        assert_eq!(
            store.list().await,
            vec![KnockPattern { id: 7, pattern: vec![10, 20, 30] }]
        );
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(PatternStore::load(&path), Err(PatternError::Json(_))));
    }

    /// In-memory backend, standing in for a different storage medium.
    struct MemoryPersistence {
        stored: Mutex<Option<Vec<KnockPattern>>>,
    }

    impl PatternPersistence for MemoryPersistence {
        fn load(&self) -> Result<Option<Vec<KnockPattern>>, PatternError> {
            Ok(self.stored.lock().unwrap().clone())
        }

        fn persist(&self, patterns: &[KnockPattern]) -> Result<(), PatternError> {
            *self.stored.lock().unwrap() = Some(patterns.to_vec());
            Ok(())
        }

        fn backend_type(&self) -> String {
            "memory".to_string()
        }
    }

    #[tokio::test]
    async fn test_backend_is_swappable() {
        let store = PatternStore::with_persistence(MemoryPersistence {
            stored: Mutex::new(None),
        })
        .unwrap();

        // Defaults are seeded through the backend like any other
        assert_eq!(store.list().await.len(), 2);
        store
            .add(KnockPattern { id: 5, pattern: vec![75] })
            .await
            .unwrap();
        assert_eq!(store.list().await.len(), 3);
    }
}
