use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const STATE_SLOT: &str = "firely_state";
pub const HISTORY_SLOT: &str = "firely_history_v1";

#[derive(Debug, Error)]
enum CacheError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// String-keyed JSON slots on local disk. Writes are best-effort and reads
/// degrade to "no cached value"; the engine must keep working when the
/// persistence layer is absent or corrupted.
#[derive(Clone, Debug)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}.json"))
    }

    /// Best-effort write: serialization or IO failure is logged at debug
    /// level and discarded, never surfaced to the caller.
    pub fn save<T: Serialize>(&self, slot: &str, value: &T) {
        if let Err(err) = self.try_save(slot, value) {
            tracing::debug!(slot, error=%err, "cache save failed; keeping in-memory state only");
        }
    }

    fn try_save<T: Serialize>(&self, slot: &str, value: &T) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;
        let bytes = serde_json::to_vec(value)?;
        write_atomic(&self.slot_path(slot), &bytes)?;
        Ok(())
    }

    /// Missing slot or unparseable contents both read as "nothing cached";
    /// the caller substitutes its empty default.
    pub fn load<T: DeserializeOwned>(&self, slot: &str) -> Option<T> {
        let path = self.slot_path(slot);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(slot, error=%err, "cache read failed; using empty default");
                }
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(slot, error=%err, "cache slot corrupted; using empty default");
                None
            }
        }
    }
}

// Write-then-rename so a crash mid-write never leaves a torn slot behind.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{LocalCache, HISTORY_SLOT, STATE_SLOT};
    use crate::reconcile::types::{CanonicalReading, HistoryPoint, PersistedState};

    #[test]
    fn round_trip_is_deep_equal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = LocalCache::new(dir.path());
        let state = PersistedState {
            sensor_data: CanonicalReading {
                temperature: Some(21.5),
                humidity: Some(40.0),
                fire_risk_probability: 0.7,
                alarm_on: true,
                timestamp_ms: 1_700_000_000_000,
                ..Default::default()
            },
            fire_risk: true,
            fire_risk_probability: 0.7,
            alarm_on: true,
        };
        cache.save(STATE_SLOT, &state);
        assert_eq!(cache.load::<PersistedState>(STATE_SLOT), Some(state));
    }

    #[test]
    fn missing_slot_loads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = LocalCache::new(dir.path());
        assert_eq!(cache.load::<PersistedState>(STATE_SLOT), None);
    }

    #[test]
    fn corrupted_slot_loads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = LocalCache::new(dir.path());
        std::fs::write(dir.path().join("firely_state.json"), b"{not json!").expect("write");
        assert_eq!(cache.load::<PersistedState>(STATE_SLOT), None);
    }

    #[test]
    fn slots_are_independent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = LocalCache::new(dir.path());
        let history = vec![HistoryPoint {
            timestamp_ms: 1,
            temperature: Some(20.0),
            humidity: None,
        }];
        cache.save(HISTORY_SLOT, &history);
        assert_eq!(cache.load::<Vec<HistoryPoint>>(HISTORY_SLOT), Some(history));
        assert_eq!(cache.load::<PersistedState>(STATE_SLOT), None);
    }

    #[test]
    fn save_into_unwritable_dir_is_swallowed() {
        let cache = LocalCache::new("/proc/firely-definitely-not-writable");
        cache.save(STATE_SLOT, &PersistedState::default());
    }
}
