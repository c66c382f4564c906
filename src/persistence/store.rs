//! Persisted engine state and the JSON file store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::cache::CacheEntry;
use crate::dlq::FailedRequest;
use crate::error::BookkeepingError;

pub const STATE_VERSION: u32 = 1;

/// Everything that survives a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub dlq_entries: Vec<FailedRequest>,
    #[serde(default)]
    pub cache_entries: Vec<CacheEntry>,
}

impl PersistedState {
    pub fn new(saved_at: DateTime<Utc>, dlq_entries: Vec<FailedRequest>, cache_entries: Vec<CacheEntry>) -> Self {
        Self {
            version: STATE_VERSION,
            saved_at,
            dlq_entries,
            cache_entries,
        }
    }

    pub fn empty(saved_at: DateTime<Utc>) -> Self {
        Self::new(saved_at, Vec::new(), Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.dlq_entries.is_empty() && self.cache_entries.is_empty()
    }
}

/// Where state is loaded from and saved to.
pub trait StateStore: Send + Sync + Debug {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<PersistedState>, BookkeepingError>;

    fn save(&self, state: &PersistedState) -> Result<(), BookkeepingError>;
}

/// Single JSON file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedState>, BookkeepingError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let state: PersistedState = serde_json::from_reader(reader)?;
        tracing::info!(
            path = %self.path.display(),
            dlq_entries = state.dlq_entries.len(),
            cache_entries = state.cache_entries.len(),
            "Loaded persisted state"
        );
        Ok(Some(state))
    }

    fn save(&self, state: &PersistedState) -> Result<(), BookkeepingError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, state)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            dlq_entries = state.dlq_entries.len(),
            cache_entries = state.cache_entries.len(),
            "Saved state"
        );
        Ok(())
    }
}
