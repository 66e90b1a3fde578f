use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    cycle::CycleRecord,
    error::{CycleError, PredictionError},
    interval::{days_in_range, DayRange},
};

/// One historical cycle as the predictor receives it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleSpan {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    pub period_cycles: Vec<CycleSpan>,
}

impl PredictionRequest {
    pub const MIN_CYCLES: usize = 2;

    /// Builds the predictor payload. Fewer than [`Self::MIN_CYCLES`] cycles is
    /// refused here so the request is never sent.
    pub fn from_history(history: &[CycleRecord]) -> Result<Self, PredictionError> {
        if history.len() < Self::MIN_CYCLES {
            return Err(PredictionError::InsufficientHistory {
                have: history.len(),
            });
        }
        Ok(Self {
            period_cycles: history
                .iter()
                .map(|cycle| CycleSpan {
                    start_date: cycle.start_date,
                    end_date: cycle.end_date,
                })
                .collect(),
        })
    }
}

/// Forecast for the next cycle. Replaced wholesale on every fetch.
///
/// Deserializing goes through [`PredictionResult::from_json`], so serde
/// input gets the same validation as a predictor reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "Value")]
pub struct PredictionResult {
    #[serde(rename = "nextPeriodStartDate")]
    pub next_start: NaiveDate,
    #[serde(rename = "nextPeriodDuration")]
    pub next_duration: i64,
    #[serde(rename = "ovulationWindow")]
    pub ovulation_window: Vec<NaiveDate>,
}

impl PredictionResult {
    pub fn predicted_period(&self) -> Result<DayRange, CycleError> {
        days_in_range(self.next_start, self.next_duration)
    }

    pub fn is_ovulation(&self, date: NaiveDate) -> bool {
        self.ovulation_window.contains(&date)
    }

    /// First and last listed fertile days, in the order the predictor sent them.
    pub fn fertile_window(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((*self.ovulation_window.first()?, *self.ovulation_window.last()?))
    }

    pub fn summary(&self) -> PredictionSummary {
        PredictionSummary {
            next_start: self.next_start,
            next_duration: self.next_duration,
            fertile_window: self.fertile_window(),
        }
    }

    /// Validates a decoded predictor reply. Anything missing or ill-typed is
    /// `Malformed`; an error payload is `Rejected`.
    pub fn from_json(value: &Value) -> Result<Self, PredictionError> {
        let object = value
            .as_object()
            .ok_or_else(|| malformed("reply is not a JSON object"))?;

        if !object.contains_key("nextPeriodStartDate") {
            if let Some(reason) = error_message(object) {
                return Err(PredictionError::Rejected(reason));
            }
        }

        let next_start = object
            .get("nextPeriodStartDate")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("nextPeriodStartDate missing or not a string"))
            .and_then(parse_iso_date)?;

        let next_duration = object
            .get("nextPeriodDuration")
            .and_then(whole_number)
            .ok_or_else(|| malformed("nextPeriodDuration missing or not an integer"))?;
        if next_duration < 1 {
            return Err(malformed(format!(
                "nextPeriodDuration must be positive, got {next_duration}"
            )));
        }

        let window = object
            .get("ovulationWindow")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("ovulationWindow missing or not an array"))?;
        if window.is_empty() {
            return Err(malformed("ovulationWindow is empty"));
        }
        let ovulation_window = window
            .iter()
            .map(|entry| {
                entry
                    .as_str()
                    .ok_or_else(|| malformed("ovulationWindow entry is not a string"))
                    .and_then(parse_iso_date)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            next_start,
            next_duration,
            ovulation_window,
        })
    }
}

impl TryFrom<Value> for PredictionResult {
    type Error = PredictionError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(&value)
    }
}

/// Parses the raw text a predictor model replied with. Surrounding Markdown
/// code fences are tolerated.
pub fn parse_prediction_reply(reply: &str) -> Result<PredictionResult, PredictionError> {
    let body = strip_code_fences(reply);
    let value: Value = serde_json::from_str(body)
        .map_err(|err| malformed(format!("reply is not valid JSON: {err}")))?;
    PredictionResult::from_json(&value)
}

fn strip_code_fences(reply: &str) -> &str {
    let mut body = reply.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = rest.strip_prefix("json").unwrap_or(rest);
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

fn error_message(object: &Map<String, Value>) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn whole_number(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|number| number.fract() == 0.0 && number.abs() < i64::MAX as f64)
            .map(|number| number as i64)
    })
}

fn parse_iso_date(raw: &str) -> Result<NaiveDate, PredictionError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| malformed(format!("`{raw}` is not a YYYY-MM-DD date")))
}

fn malformed(reason: impl Into<String>) -> PredictionError {
    PredictionError::Malformed(reason.into())
}

/// Human-facing digest of a prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionSummary {
    pub next_start: NaiveDate,
    pub next_duration: i64,
    pub fertile_window: Option<(NaiveDate, NaiveDate)>,
}

impl fmt::Display for PredictionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Next period expected around {} ({} day{})",
            month_day(self.next_start),
            self.next_duration,
            if self.next_duration == 1 { "" } else { "s" }
        )?;
        if let Some((first, last)) = self.fertile_window {
            write!(
                f,
                "\nFertile window: {} to {}",
                month_day(first),
                month_day(last)
            )?;
        }
        Ok(())
    }
}

fn month_day(date: NaiveDate) -> String {
    let day = date.day();
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{} {}{}", date.format("%B"), day, suffix)
}
