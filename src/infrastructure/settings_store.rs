use crate::infrastructure::error::InfraError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const USER_STATE_SCHEMA: u64 = 1;

/// Small persisted user state that outlives a single session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserState {
    pub schema: u64,
    pub growth_points: u32,
    pub last_growth_date: Option<NaiveDate>,
    pub has_attempted_review_request: bool,
}

impl Default for UserState {
    fn default() -> Self {
        Self {
            schema: USER_STATE_SCHEMA,
            growth_points: 0,
            last_growth_date: None,
            has_attempted_review_request: false,
        }
    }
}

pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<UserState, InfraError>;
    fn save(&self, state: &UserState) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<UserState, InfraError> {
        if !self.path.exists() {
            return Ok(UserState::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        let state: UserState = serde_json::from_str(&raw)?;
        if state.schema != USER_STATE_SCHEMA {
            return Err(InfraError::InvalidData(format!(
                "unsupported schema {} in {}",
                state.schema,
                self.path.display()
            )));
        }
        Ok(state)
    }

    fn save(&self, state: &UserState) -> Result<(), InfraError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let formatted = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, format!("{formatted}\n"))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    state: Mutex<UserState>,
}

impl InMemorySettingsStore {
    pub fn with_state(state: UserState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn load(&self) -> Result<UserState, InfraError> {
        let guard = self
            .state
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("settings lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn save(&self, state: &UserState) -> Result<(), InfraError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("settings lock poisoned: {error}")))?;
        *guard = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_defaults_when_missing_and_roundtrips() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FileSettingsStore::new(dir.path().join("state").join("user_state.json"));
        assert_eq!(store.load().expect("load default"), UserState::default());

        let state = UserState {
            growth_points: 4,
            last_growth_date: NaiveDate::from_ymd_opt(2026, 2, 16),
            has_attempted_review_request: true,
            ..UserState::default()
        };
        store.save(&state).expect("save");
        assert_eq!(store.load().expect("load saved"), state);
    }

    #[test]
    fn file_store_rejects_unknown_schema() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("user_state.json");
        fs::write(&path, r#"{"schema":7,"growthPoints":1}"#).expect("seed");

        let result = FileSettingsStore::new(&path).load();
        assert!(matches!(result, Err(InfraError::InvalidData(_))));
    }

    #[test]
    fn in_memory_store_keeps_latest_state() {
        let store = InMemorySettingsStore::default();
        let mut state = store.load().expect("load");
        state.growth_points = 2;
        store.save(&state).expect("save");
        assert_eq!(store.load().expect("reload").growth_points, 2);
    }
}
