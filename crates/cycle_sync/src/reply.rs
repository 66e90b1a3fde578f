use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use cycle_domain::{
    collaborators::CyclePredictor,
    prediction::{parse_prediction_reply, PredictionRequest, PredictionResult},
    PredictionError,
};

/// Serves the reply a forecasting model produced earlier, stored verbatim on disk.
#[derive(Debug, Clone)]
pub struct ReplyFilePredictor {
    path: PathBuf,
}

impl ReplyFilePredictor {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CyclePredictor for ReplyFilePredictor {
    #[instrument(skip(self, request), fields(path = %self.path.display(), cycles = request.period_cycles.len()))]
    async fn predict(
        &self,
        request: PredictionRequest,
    ) -> Result<PredictionResult, PredictionError> {
        if request.period_cycles.len() < PredictionRequest::MIN_CYCLES {
            return Err(PredictionError::InsufficientHistory {
                have: request.period_cycles.len(),
            });
        }
        let reply = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            PredictionError::Unavailable(format!("cannot read {}: {err}", self.path.display()))
        })?;
        let prediction = parse_prediction_reply(&reply)?;
        debug!(next_start = %prediction.next_start, "prediction loaded");
        Ok(prediction)
    }
}
