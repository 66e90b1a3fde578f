use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use cycle_domain::{
    collaborators::CycleRepository,
    cycle::{CycleRecord, NewCycle},
    RepositoryError,
};

use crate::{records_for_user, StoredCycle};

/// Process-local storage; history is gone when the process exits.
#[derive(Debug, Default)]
pub struct MemoryCycleRepository {
    cycles: RwLock<Vec<StoredCycle>>,
}

impl MemoryCycleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cycles(cycles: Vec<StoredCycle>) -> Self {
        Self {
            cycles: RwLock::new(cycles),
        }
    }

    pub fn len(&self) -> usize {
        self.cycles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.read().is_empty()
    }
}

#[async_trait]
impl CycleRepository for MemoryCycleRepository {
    async fn insert_cycle(&self, cycle: NewCycle) -> Result<CycleRecord, RepositoryError> {
        let id = Uuid::new_v4().to_string();
        let record = CycleRecord::new(id, cycle.start_date, cycle.end_date)
            .map_err(|err| RepositoryError::Rejected(err.to_string()))?;
        self.cycles.write().push(StoredCycle {
            id: record.id.clone(),
            user_id: cycle.user_id,
            start_date: record.start_date,
            end_date: record.end_date,
        });
        Ok(record)
    }

    async fn list_cycles(&self, user_id: &str) -> Result<Vec<CycleRecord>, RepositoryError> {
        Ok(records_for_user(&self.cycles.read(), user_id))
    }
}
