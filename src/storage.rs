use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::CyclesState;

/// Versioned key of the single state blob.
pub const STATE_KEY: &str = "cycle-timer:cycles-state-1.0.0";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode state: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode state: {0}")]
    Decode(#[source] serde_json::Error),
}

/// A store for opaque byte blobs keyed by strings.
pub trait KeyValueStore {
    /// Read a value, `None` if the key was never written.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Create or overwrite a value.
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}

/// One file per key inside a base directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    base_dir: PathBuf,
}

impl DirStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                    ch
                } else {
                    '_'
                }
            })
            .collect();
        self.base_dir.join(format!("{file_name}.json"))
    }
}

impl KeyValueStore for DirStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        fs::create_dir_all(&self.base_dir).map_err(|source| StorageError::Io {
            path: self.base_dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        fs::write(&path, value).map_err(|source| StorageError::Io { path, source })
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: std::collections::HashMap<String, Vec<u8>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Everything mirrored to storage after each change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(flatten)]
    pub cycles_state: CyclesState,
    #[serde(default)]
    pub amount_seconds_passed: u64,
}

pub fn encode_state(state: &PersistedState) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(state).map_err(StorageError::Encode)
}

pub fn decode_state(raw: &[u8]) -> Result<PersistedState, StorageError> {
    serde_json::from_slice(raw).map_err(StorageError::Decode)
}

/// Best-effort hydration: anything unreadable starts from the empty state.
pub fn load_state<S: KeyValueStore>(kv: &S) -> PersistedState {
    let raw = match kv.get(STATE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key = STATE_KEY, "no persisted state, starting empty");
            return PersistedState::default();
        }
        Err(err) => {
            warn!(key = STATE_KEY, %err, "failed to read persisted state, starting empty");
            return PersistedState::default();
        }
    };

    match decode_state(&raw) {
        Ok(mut state) => {
            if state.cycles_state.repair() {
                warn!("persisted active cycle id was stale and has been cleared");
            }
            if state.cycles_state.active_cycle_id.is_none() {
                state.amount_seconds_passed = 0;
            }
            debug!(cycles = state.cycles_state.cycles.len(), "hydrated persisted state");
            state
        }
        Err(err) => {
            warn!(key = STATE_KEY, %err, "persisted state is unparseable, starting empty");
            PersistedState::default()
        }
    }
}

pub fn save_state<S: KeyValueStore>(
    kv: &mut S,
    state: &PersistedState,
) -> Result<(), StorageError> {
    let raw = encode_state(state)?;
    kv.put(STATE_KEY, &raw)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::domain::{Cycle, CyclesState};

    use super::{
        DirStore, KeyValueStore, MemoryStore, PersistedState, STATE_KEY, decode_state,
        load_state, save_state,
    };

    fn sample_state() -> PersistedState {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        PersistedState {
            cycles_state: CyclesState {
                cycles: vec![
                    Cycle {
                        id: "1767258000000".to_string(),
                        task: "Write report".to_string(),
                        minutes_amount: 25,
                        start_date: start,
                        interrupted_date: None,
                        finished_date: Some(Utc.with_ymd_and_hms(2026, 1, 1, 9, 25, 0).unwrap()),
                    },
                    Cycle {
                        id: "1767259800000".to_string(),
                        task: "Review".to_string(),
                        minutes_amount: 10,
                        start_date: Utc.with_ymd_and_hms(2026, 1, 1, 9, 30, 0).unwrap(),
                        interrupted_date: None,
                        finished_date: None,
                    },
                ],
                active_cycle_id: Some("1767259800000".to_string()),
            },
            amount_seconds_passed: 42,
        }
    }

    #[test]
    fn round_trips_state_with_timestamps() {
        let state = sample_state();
        let mut kv = MemoryStore::new();
        save_state(&mut kv, &state).expect("save should succeed");

        let loaded = load_state(&kv);
        assert_eq!(loaded, state);
        assert_eq!(
            loaded.cycles_state.cycles[0].finished_date,
            Some(Utc.with_ymd_and_hms(2026, 1, 1, 9, 25, 0).unwrap())
        );
        assert!(loaded.cycles_state.cycles[1].finished_date.is_none());
    }

    #[test]
    fn writes_camel_case_and_omits_absent_dates() {
        let mut kv = MemoryStore::new();
        save_state(&mut kv, &sample_state()).expect("save should succeed");
        let raw = kv.get(STATE_KEY).unwrap().expect("blob written");
        let text = String::from_utf8(raw).unwrap();

        assert!(text.contains("\"activeCycleId\":\"1767259800000\""));
        assert!(text.contains("\"amountSecondsPassed\":42"));
        assert!(text.contains("\"startDate\":\"2026-01-01T09:00:00Z\""));
        assert!(!text.contains("interruptedDate"));
    }

    #[test]
    fn missing_blob_starts_empty() {
        let kv = MemoryStore::new();
        assert_eq!(load_state(&kv), PersistedState::default());
    }

    #[test]
    fn garbage_blob_starts_empty() {
        let mut kv = MemoryStore::new();
        kv.put(STATE_KEY, b"{not json").unwrap();
        assert_eq!(load_state(&kv), PersistedState::default());
    }

    #[test]
    fn decodes_blob_without_optional_fields() {
        let raw = br#"{"cycles":[{"id":"1","task":"Read","minutesAmount":5,"startDate":"2026-01-01T09:00:00.000Z"}],"activeCycleId":"1"}"#;
        let state = decode_state(raw).expect("decode should succeed");
        assert_eq!(state.amount_seconds_passed, 0);
        assert_eq!(
            state.cycles_state.cycles[0].start_date,
            Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()
        );
        assert!(state.cycles_state.active_cycle().is_some());
    }

    #[test]
    fn stale_active_id_is_cleared_on_load() {
        let mut state = sample_state();
        state.cycles_state.active_cycle_id = Some("gone".to_string());
        let mut kv = MemoryStore::new();
        save_state(&mut kv, &state).unwrap();

        let loaded = load_state(&kv);
        assert!(loaded.cycles_state.active_cycle_id.is_none());
        assert_eq!(loaded.amount_seconds_passed, 0);
    }

    #[test]
    fn dir_store_overwrites_single_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut kv = DirStore::new(tmp.path().join("state"));

        assert!(kv.get(STATE_KEY).unwrap().is_none());
        kv.put(STATE_KEY, b"first").unwrap();
        kv.put(STATE_KEY, b"second").unwrap();

        assert_eq!(kv.get(STATE_KEY).unwrap().as_deref(), Some(&b"second"[..]));
        let file_name = kv.path_for(STATE_KEY);
        assert_eq!(
            file_name.file_name().unwrap().to_str().unwrap(),
            "cycle-timer_cycles-state-1.0.0.json"
        );
    }
}
