use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    calendar::{DayClass, DayClassifier},
    error::CycleError,
    interval::is_within_interval,
    prediction::PredictionResult,
};

/// A recorded period. Immutable once the persistence collaborator has acknowledged it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleRecord {
    pub id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl CycleRecord {
    pub fn new(
        id: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, CycleError> {
        if start_date > end_date {
            return Err(CycleError::InvalidInterval {
                start: start_date,
                end: end_date,
            });
        }
        Ok(Self {
            id: id.into(),
            start_date,
            end_date,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        is_within_interval(date, self.start_date, self.end_date)
    }

    pub fn duration_days(&self) -> i64 {
        self.end_date.signed_duration_since(self.start_date).num_days() + 1
    }
}

/// Insert request handed to the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCycle {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub user_id: String,
}

/// Dates picked in the current, unsaved interaction. Never holds a date after `today`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectionSet {
    dates: BTreeSet<NaiveDate>,
}

impl SelectionSet {
    /// Flips membership of `date`. Returns `false` (and changes nothing) for future dates.
    pub fn toggle(&mut self, date: NaiveDate, today: NaiveDate) -> bool {
        if date > today {
            return false;
        }
        if !self.dates.remove(&date) {
            self.dates.insert(date);
        }
        true
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.iter().copied()
    }

    /// Chronological earliest and latest picks.
    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((*self.dates.first()?, *self.dates.last()?))
    }

    /// Whether any pick falls in the month containing `date`.
    pub fn any_in_month(&self, date: NaiveDate) -> bool {
        self.dates
            .iter()
            .any(|picked| picked.year() == date.year() && picked.month() == date.month())
    }

    pub fn clear(&mut self) {
        self.dates.clear();
    }

    fn retain_until(&mut self, today: NaiveDate) {
        self.dates.retain(|date| *date <= today);
    }
}

/// Everything the calendar needs to classify a day: today's date, the user's
/// picks, the recorded history and the latest prediction.
///
/// `revision` moves forward whenever history changes so that a prediction
/// requested against older history can be recognised and dropped.
#[derive(Debug, Clone)]
pub struct CycleState {
    today: NaiveDate,
    selection: SelectionSet,
    history: Vec<CycleRecord>,
    prediction: Option<PredictionResult>,
    revision: u64,
}

impl CycleState {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            selection: SelectionSet::default(),
            history: Vec::new(),
            prediction: None,
            revision: 0,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn set_today(&mut self, today: NaiveDate) {
        self.today = today;
        self.selection.retain_until(today);
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Recorded cycles, newest `start_date` first.
    pub fn history(&self) -> &[CycleRecord] {
        &self.history
    }

    pub fn prediction(&self) -> Option<&PredictionResult> {
        self.prediction.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn toggle_selected(&mut self, date: NaiveDate) -> bool {
        let applied = self.selection.toggle(date, self.today);
        if !applied {
            debug!(%date, "ignoring selection of a future date");
        }
        applied
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Builds the insert request for the current picks without touching them.
    pub fn prepare_commit(&self, user_id: &str) -> Result<NewCycle, CycleError> {
        let (start_date, end_date) = self.selection.bounds().ok_or(CycleError::EmptySelection)?;
        Ok(NewCycle {
            start_date,
            end_date,
            user_id: user_id.to_string(),
        })
    }

    /// Applies an acknowledged insert: picks are cleared, the record joins the
    /// history and the prediction is dropped until it is fetched again.
    pub fn complete_commit(&mut self, record: CycleRecord) {
        self.selection.clear();
        let mut history = std::mem::take(&mut self.history);
        history.retain(|existing| existing.id != record.id);
        history.push(record);
        self.replace_history(history);
        self.prediction = None;
    }

    pub fn replace_history(&mut self, mut records: Vec<CycleRecord>) {
        records.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        self.history = records;
        self.revision += 1;
    }

    /// Installs a prediction fetched against history `revision`. Returns `false`
    /// and keeps the current prediction when history has moved on since.
    pub fn apply_prediction(
        &mut self,
        revision: u64,
        prediction: Option<PredictionResult>,
    ) -> bool {
        if revision != self.revision {
            debug!(
                requested = revision,
                current = self.revision,
                "discarding prediction computed from stale history"
            );
            return false;
        }
        self.prediction = prediction;
        true
    }

    pub fn classify(&self, date: NaiveDate) -> DayClass {
        DayClassifier::new(self).classify(date)
    }
}
