use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cycle_domain::{collaborators::CycleRepository, cycle::CycleRecord};

pub mod local;
pub mod memory;
pub mod reply;

pub use crate::local::LocalCycleRepository;
pub use crate::memory::MemoryCycleRepository;
pub use crate::reply::ReplyFilePredictor;

/// Where recorded cycles live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Local { path: PathBuf },
}

/// A cycle as it sits in storage, tagged with its owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredCycle {
    pub id: String,
    pub user_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl StoredCycle {
    fn to_record(&self) -> Option<CycleRecord> {
        match CycleRecord::new(self.id.clone(), self.start_date, self.end_date) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(id = %self.id, %err, "skipping invalid stored cycle");
                None
            }
        }
    }
}

/// The user's cycles, newest `start_date` first.
pub(crate) fn records_for_user(cycles: &[StoredCycle], user_id: &str) -> Vec<CycleRecord> {
    let mut records: Vec<CycleRecord> = cycles
        .iter()
        .filter(|cycle| cycle.user_id == user_id)
        .filter_map(StoredCycle::to_record)
        .collect();
    records.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    records
}

pub fn build_repository(backend: &StorageBackend) -> Arc<dyn CycleRepository> {
    match backend {
        StorageBackend::Memory => {
            debug!("using in-memory cycle storage");
            Arc::new(MemoryCycleRepository::new())
        }
        StorageBackend::Local { path } => {
            debug!(path = %path.display(), "using local cycle storage");
            Arc::new(LocalCycleRepository::new(path))
        }
    }
}
