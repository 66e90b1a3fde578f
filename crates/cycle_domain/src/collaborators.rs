use async_trait::async_trait;

use crate::{
    cycle::{CycleRecord, NewCycle},
    error::{PredictionError, RepositoryError},
    prediction::{PredictionRequest, PredictionResult},
};

/// Storage adapters for recorded cycles implement this trait.
#[async_trait]
pub trait CycleRepository: Send + Sync {
    /// Persists a new cycle and returns it with its assigned id.
    async fn insert_cycle(&self, cycle: NewCycle) -> Result<CycleRecord, RepositoryError>;

    /// Every cycle recorded for `user_id`, newest `start_date` first.
    async fn list_cycles(&self, user_id: &str) -> Result<Vec<CycleRecord>, RepositoryError>;
}

/// Forecasting backends implement this trait. Callers guarantee the request
/// carries at least [`PredictionRequest::MIN_CYCLES`] cycles.
#[async_trait]
pub trait CyclePredictor: Send + Sync {
    async fn predict(
        &self,
        request: PredictionRequest,
    ) -> Result<PredictionResult, PredictionError>;
}
