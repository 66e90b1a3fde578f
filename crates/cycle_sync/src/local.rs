use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use uuid::Uuid;

use cycle_domain::{
    collaborators::CycleRepository,
    cycle::{CycleRecord, NewCycle},
    RepositoryError,
};

use crate::{records_for_user, StoredCycle};

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    cycles: Vec<StoredCycle>,
}

/// Cycles kept in a JSON file on disk. A missing file reads as an empty
/// history and is created on the first insert.
#[derive(Debug)]
pub struct LocalCycleRepository {
    path: PathBuf,
    write_guard: Mutex<()>,
}

impl LocalCycleRepository {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> Result<HistoryFile> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no history file yet");
                return Ok(HistoryFile::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        if raw.trim().is_empty() {
            return Ok(HistoryFile::default());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a valid history file", self.path.display()))
    }

    async fn write_file(&self, file: &HistoryFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let mut payload = serde_json::to_string_pretty(file)?;
        payload.push('\n');

        // the live file is only ever replaced whole
        let staging = self.staging_path();
        tokio::fs::write(&staging, payload)
            .await
            .with_context(|| format!("failed to write {}", staging.display()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "cycles.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn append(&self, cycle: NewCycle) -> Result<CycleRecord, RepositoryError> {
        let record = CycleRecord::new(Uuid::new_v4().to_string(), cycle.start_date, cycle.end_date)
            .map_err(|err| RepositoryError::Rejected(err.to_string()))?;

        let _guard = self.write_guard.lock().await;
        let mut file = self.read_file().await.map_err(unavailable)?;
        file.cycles.push(StoredCycle {
            id: record.id.clone(),
            user_id: cycle.user_id,
            start_date: record.start_date,
            end_date: record.end_date,
        });
        self.write_file(&file).await.map_err(unavailable)?;
        Ok(record)
    }
}

fn unavailable(err: anyhow::Error) -> RepositoryError {
    RepositoryError::Unavailable(format!("{err:#}"))
}

#[async_trait]
impl CycleRepository for LocalCycleRepository {
    #[instrument(skip(self, cycle), fields(path = %self.path.display()))]
    async fn insert_cycle(&self, cycle: NewCycle) -> Result<CycleRecord, RepositoryError> {
        let record = self.append(cycle).await?;
        debug!(id = %record.id, "cycle stored");
        Ok(record)
    }

    async fn list_cycles(&self, user_id: &str) -> Result<Vec<CycleRecord>, RepositoryError> {
        let file = self.read_file().await.map_err(unavailable)?;
        Ok(records_for_user(&file.cycles, user_id))
    }
}
