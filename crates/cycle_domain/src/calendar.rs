use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    cycle::CycleState,
    interval::{first_of_month, month_length, weekday_offset, DayRange},
    prediction::PredictionResult,
};

pub const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Visual state of a single day. When several conditions hold, the earlier
/// variant wins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DayClass {
    Period,
    PredictedPeriod,
    Ovulation,
    Selected,
    FutureDisabled,
    Normal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub class: DayClass,
    /// Future days never accept clicks, whatever their class.
    pub clickable: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GridCell {
    Blank,
    Day(DayCell),
}

/// Classifies days against one snapshot of [`CycleState`]. The predicted
/// period is expanded once, so reuse a classifier across a whole month.
pub struct DayClassifier<'a> {
    state: &'a CycleState,
    prediction: Option<&'a PredictionResult>,
    predicted_period: Option<DayRange>,
}

impl<'a> DayClassifier<'a> {
    pub fn new(state: &'a CycleState) -> Self {
        let prediction = state.prediction();
        let predicted_period = prediction.and_then(|p| match p.predicted_period() {
            Ok(range) => Some(range),
            Err(err) => {
                warn!(%err, next_start = %p.next_start, "omitting predicted period overlay");
                None
            }
        });
        Self {
            state,
            prediction,
            predicted_period,
        }
    }

    pub fn classify(&self, date: NaiveDate) -> DayClass {
        if self.state.history().iter().any(|cycle| cycle.contains(date)) {
            DayClass::Period
        } else if self
            .predicted_period
            .is_some_and(|range| range.contains(date))
        {
            DayClass::PredictedPeriod
        } else if self.prediction.is_some_and(|p| p.is_ovulation(date)) {
            DayClass::Ovulation
        } else if self.state.selection().contains(date) {
            DayClass::Selected
        } else if date > self.state.today() {
            DayClass::FutureDisabled
        } else {
            DayClass::Normal
        }
    }

    pub fn cell(&self, date: NaiveDate) -> DayCell {
        DayCell {
            date,
            class: self.classify(date),
            clickable: date <= self.state.today(),
        }
    }
}

/// One calendar month laid out in Sunday-first week rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthView {
    anchor: NaiveDate,
    cells: Vec<GridCell>,
    has_selection: bool,
}

impl MonthView {
    /// First day of the month.
    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn title(&self) -> String {
        self.anchor.format("%B %Y").to_string()
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn leading_blanks(&self) -> usize {
        self.cells
            .iter()
            .take_while(|cell| matches!(cell, GridCell::Blank))
            .count()
    }

    pub fn days(&self) -> impl Iterator<Item = &DayCell> + '_ {
        self.cells.iter().filter_map(|cell| match cell {
            GridCell::Day(day) => Some(day),
            GridCell::Blank => None,
        })
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayCell> {
        self.days().find(|cell| cell.date == date)
    }

    pub fn weeks(&self) -> std::slice::Chunks<'_, GridCell> {
        self.cells.chunks(7)
    }

    /// True while any unsaved pick lies in this month.
    pub fn has_selection(&self) -> bool {
        self.has_selection
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.anchor.year() && date.month() == self.anchor.month()
    }
}

/// Lays out the month containing `month` and classifies every day in it.
pub fn build_month(month: NaiveDate, state: &CycleState) -> MonthView {
    let anchor = first_of_month(month);
    let classifier = DayClassifier::new(state);
    let offset = weekday_offset(anchor) as usize;
    let length = month_length(anchor) as usize;

    let mut cells = Vec::with_capacity(offset + length);
    cells.resize(offset, GridCell::Blank);
    cells.extend(
        anchor
            .iter_days()
            .take(length)
            .map(|date| GridCell::Day(classifier.cell(date))),
    );

    MonthView {
        anchor,
        cells,
        has_selection: state.selection().any_in_month(anchor),
    }
}
