use std::sync::Arc;

use chrono::{Local, NaiveDate};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    calendar::MonthView,
    collaborators::{CyclePredictor, CycleRepository},
    cycle::{CycleRecord, CycleState, SelectionSet},
    error::{CycleError, PredictionError, RepositoryError},
    prediction::{PredictionRequest, PredictionResult},
    window::{MonthWindow, ScrollMetrics, ScrollOutcome, DEFAULT_EDGE_THRESHOLD, DEFAULT_RADIUS},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionStatus {
    Loading,
    Ready,
    Failed(String),
}

/// What happened to the prediction during a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictionOutcome {
    Updated,
    /// Fewer than two cycles on record; any old prediction was cleared.
    InsufficientHistory,
    NoPredictor,
    /// History changed while the request was in flight.
    Discarded,
    /// The reply was unusable; the prediction was cleared.
    Malformed(PredictionError),
    /// The predictor failed; the previous prediction is kept.
    Failed(PredictionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub cycles: usize,
    pub prediction: PredictionOutcome,
}

/// One user's calendar session: in-memory state plus the collaborators it
/// synchronises with. Every collaborator call is awaited without holding a lock.
pub struct TrackerSession {
    user_id: String,
    state: RwLock<CycleState>,
    window: RwLock<MonthWindow>,
    status: RwLock<SessionStatus>,
    repository: Arc<dyn CycleRepository>,
    predictor: Option<Arc<dyn CyclePredictor>>,
}

pub struct TrackerSessionBuilder {
    user_id: String,
    today: Option<NaiveDate>,
    repository: Option<Arc<dyn CycleRepository>>,
    predictor: Option<Arc<dyn CyclePredictor>>,
    edge_threshold: f64,
    radius: u32,
}

impl TrackerSessionBuilder {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            today: None,
            repository: None,
            predictor: None,
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            radius: DEFAULT_RADIUS,
        }
    }

    pub fn today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_repository(mut self, repository: Arc<dyn CycleRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn CyclePredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn edge_threshold(mut self, threshold: f64) -> Self {
        self.edge_threshold = threshold;
        self
    }

    pub fn window_radius(mut self, radius: u32) -> Self {
        self.radius = radius;
        self
    }

    pub fn build(self) -> Result<TrackerSession, CycleError> {
        let repository = self.repository.ok_or_else(|| {
            RepositoryError::Unavailable("no cycle repository configured".to_string())
        })?;
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        let state = CycleState::new(today);
        let window =
            MonthWindow::with_radius(&state, self.radius).with_edge_threshold(self.edge_threshold);
        Ok(TrackerSession {
            user_id: self.user_id,
            state: RwLock::new(state),
            window: RwLock::new(window),
            status: RwLock::new(SessionStatus::Loading),
            repository,
            predictor: self.predictor,
        })
    }
}

impl TrackerSession {
    pub fn builder(user_id: impl Into<String>) -> TrackerSessionBuilder {
        TrackerSessionBuilder::new(user_id)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    pub fn today(&self) -> NaiveDate {
        self.state.read().today()
    }

    pub fn history(&self) -> Vec<CycleRecord> {
        self.state.read().history().to_vec()
    }

    pub fn selection(&self) -> SelectionSet {
        self.state.read().selection().clone()
    }

    pub fn prediction(&self) -> Option<PredictionResult> {
        self.state.read().prediction().cloned()
    }

    pub fn months(&self) -> Vec<MonthView> {
        self.window.read().months().cloned().collect()
    }

    pub fn anchors(&self) -> Vec<NaiveDate> {
        self.window.read().anchors()
    }

    /// Runs `f` against a consistent snapshot of the state.
    pub fn with_state<R>(&self, f: impl FnOnce(&CycleState) -> R) -> R {
        f(&self.state.read())
    }

    /// Initial fetch; the session reports `Loading` until it completes.
    pub async fn load(&self) -> Result<RefreshReport, CycleError> {
        self.set_status(SessionStatus::Loading);
        self.refresh().await
    }

    /// Flips a pick and redraws its month. Future dates are ignored.
    pub fn toggle_selected(&self, date: NaiveDate) -> bool {
        let mut state = self.state.write();
        let applied = state.toggle_selected(date);
        if applied {
            self.window.write().refresh_month(date, &state);
        }
        applied
    }

    pub fn clear_selection(&self) {
        let mut state = self.state.write();
        state.clear_selection();
        self.window.write().recompute(&state);
    }

    pub fn on_scroll(&self, metrics: ScrollMetrics) -> ScrollOutcome {
        let state = self.state.read();
        self.window.write().on_scroll(metrics, &state)
    }

    pub fn set_today(&self, today: NaiveDate) {
        let mut state = self.state.write();
        state.set_today(today);
        self.window.write().recompute(&state);
    }

    /// Saves the current picks as one cycle spanning their earliest and latest
    /// date, then refetches history and prediction. On a storage failure the
    /// picks stay as they were.
    #[instrument(skip(self), fields(user = %self.user_id))]
    pub async fn commit_selection(&self) -> Result<CycleRecord, CycleError> {
        let request = match self.state.read().prepare_commit(&self.user_id) {
            Ok(request) => request,
            Err(err) => {
                debug!("nothing selected, commit skipped");
                return Err(err);
            }
        };
        info!(start = %request.start_date, end = %request.end_date, "saving cycle");

        let record = match self.repository.insert_cycle(request).await {
            Ok(record) => record,
            Err(err) => {
                warn!(%err, "saving cycle failed, keeping selection");
                self.set_status(SessionStatus::Failed(err.to_string()));
                return Err(err.into());
            }
        };

        {
            let mut state = self.state.write();
            state.complete_commit(record.clone());
            self.window.write().recompute(&state);
        }

        if let Err(err) = self.refresh().await {
            warn!(%err, id = %record.id, "cycle saved but history refresh failed");
        }
        Ok(record)
    }

    /// Refetches history and, with enough of it, a fresh prediction. All
    /// loaded months are rebuilt afterwards.
    #[instrument(skip(self), fields(user = %self.user_id))]
    pub async fn refresh(&self) -> Result<RefreshReport, CycleError> {
        let records = match self.repository.list_cycles(&self.user_id).await {
            Ok(records) => records,
            Err(err) => {
                warn!(%err, "fetching cycle history failed");
                self.set_status(SessionStatus::Failed(err.to_string()));
                return Err(err.into());
            }
        };

        let (revision, request, cycles) = {
            let mut state = self.state.write();
            state.replace_history(records);
            (
                state.revision(),
                PredictionRequest::from_history(state.history()),
                state.history().len(),
            )
        };
        debug!(cycles, revision, "history replaced");

        let mut status = SessionStatus::Ready;
        let prediction = match (request, self.predictor.as_ref()) {
            (Err(_), _) => {
                self.state.write().apply_prediction(revision, None);
                PredictionOutcome::InsufficientHistory
            }
            (Ok(_), None) => PredictionOutcome::NoPredictor,
            (Ok(request), Some(predictor)) => match predictor.predict(request).await {
                Ok(result) => {
                    let applied = self.state.write().apply_prediction(revision, Some(result));
                    if applied {
                        PredictionOutcome::Updated
                    } else {
                        PredictionOutcome::Discarded
                    }
                }
                Err(err @ PredictionError::Malformed(_)) => {
                    warn!(%err, "ignoring unusable prediction");
                    self.state.write().apply_prediction(revision, None);
                    PredictionOutcome::Malformed(err)
                }
                Err(err) => {
                    warn!(%err, "prediction failed, keeping previous result");
                    status = SessionStatus::Failed(err.to_string());
                    PredictionOutcome::Failed(err)
                }
            },
        };

        {
            let state = self.state.read();
            self.window.write().recompute(&state);
        }
        self.set_status(status);

        Ok(RefreshReport { cycles, prediction })
    }

    fn set_status(&self, status: SessionStatus) {
        *self.status.write() = status;
    }
}
