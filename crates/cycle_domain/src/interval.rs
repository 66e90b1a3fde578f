use chrono::{Datelike, Duration, Months, NaiveDate};

use crate::error::CycleError;

/// A run of consecutive calendar days. Cheap to copy; every call to
/// [`DayRange::iter`] starts again from the first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    start: NaiveDate,
    days: u32,
}

impl DayRange {
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn len(&self) -> usize {
        self.days as usize
    }

    pub fn is_empty(&self) -> bool {
        self.days == 0
    }

    /// Final day of the range, `None` when it would fall past chrono's calendar.
    pub fn end(&self) -> Option<NaiveDate> {
        self.start
            .checked_add_signed(Duration::days(i64::from(self.days) - 1))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        if date < self.start {
            return false;
        }
        date.signed_duration_since(self.start).num_days() < i64::from(self.days)
    }

    pub fn iter(&self) -> DayIter {
        DayIter {
            next: Some(self.start),
            remaining: self.days,
        }
    }
}

impl IntoIterator for DayRange {
    type Item = NaiveDate;
    type IntoIter = DayIter;

    fn into_iter(self) -> DayIter {
        self.iter()
    }
}

impl IntoIterator for &DayRange {
    type Item = NaiveDate;
    type IntoIter = DayIter;

    fn into_iter(self) -> DayIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct DayIter {
    next: Option<NaiveDate>,
    remaining: u32,
}

impl Iterator for DayIter {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next?;
        self.remaining -= 1;
        self.next = current.succ_opt();
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let upper = if self.next.is_some() {
            self.remaining as usize
        } else {
            0
        };
        (0, Some(upper))
    }
}

/// `duration_days` consecutive days beginning at `start`.
pub fn days_in_range(start: NaiveDate, duration_days: i64) -> Result<DayRange, CycleError> {
    if duration_days < 1 {
        return Err(CycleError::InvalidDuration(duration_days));
    }
    let days =
        u32::try_from(duration_days).map_err(|_| CycleError::InvalidDuration(duration_days))?;
    Ok(DayRange { start, days })
}

/// Inclusive on both ends.
pub fn is_within_interval(date: NaiveDate, start: NaiveDate, end: NaiveDate) -> bool {
    start <= date && date <= end
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Moves `date` by a signed number of months, clamping the day to the target month's length.
pub fn shift_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let step = Months::new(months.unsigned_abs());
    if months < 0 {
        date.checked_sub_months(step)
    } else {
        date.checked_add_months(step)
    }
}

/// Number of days in the month containing `date`.
pub fn month_length(date: NaiveDate) -> u32 {
    // only December of chrono's last year has no successor
    first_of_month(date)
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .map_or(31, |last| last.day())
}

/// Column of `date` in a Sunday-first week (0 = Sunday .. 6 = Saturday).
pub fn weekday_offset(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}
