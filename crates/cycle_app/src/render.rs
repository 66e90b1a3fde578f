use std::fmt::Write;

use chrono::Datelike;
use cycle_domain::{
    calendar::{DayClass, GridCell, MonthView, WEEKDAY_LABELS},
    cycle::CycleRecord,
    prediction::PredictionResult,
};

pub const LEGEND: &str =
    "P period  p predicted period  o fertile window  * selected  . future";

fn glyph(class: DayClass) -> char {
    match class {
        DayClass::Period => 'P',
        DayClass::PredictedPeriod => 'p',
        DayClass::Ovulation => 'o',
        DayClass::Selected => '*',
        DayClass::FutureDisabled => '.',
        DayClass::Normal => ' ',
    }
}

/// Title, weekday header and one line per week. Every column is four characters wide.
pub fn render_month(view: &MonthView) -> String {
    let mut out = String::new();
    out.push_str(&view.title());
    out.push('\n');

    let header: String = WEEKDAY_LABELS
        .iter()
        .map(|label| format!("{label:>3} "))
        .collect();
    out.push_str(header.trim_end());
    out.push('\n');

    for week in view.weeks() {
        let line: String = week
            .iter()
            .map(|cell| match cell {
                GridCell::Blank => "    ".to_string(),
                GridCell::Day(day) => format!("{:>2}{} ", day.date.day(), glyph(day.class)),
            })
            .collect();
        out.push_str(line.trim_end());
        out.push('\n');
    }

    if view.has_selection() {
        out.push_str("Unsaved picks in this month, run `mark` to record them\n");
    }
    out
}

pub fn render_window(months: &[MonthView]) -> String {
    let rendered: Vec<String> = months.iter().map(render_month).collect();
    let mut out = rendered.join("\n");
    out.push('\n');
    out.push_str(LEGEND);
    out.push('\n');
    out
}

pub fn render_prediction(prediction: Option<&PredictionResult>) -> String {
    match prediction {
        Some(prediction) => format!("{}\n", prediction.summary()),
        None => "No prediction yet (needs at least two recorded cycles)\n".to_string(),
    }
}

pub fn render_history(records: &[CycleRecord]) -> String {
    if records.is_empty() {
        return "No cycles recorded yet\n".to_string();
    }
    let mut out = String::new();
    for record in records {
        let days = record.duration_days();
        // writing to a String cannot fail
        let _ = writeln!(
            out,
            "{} to {} ({} day{})",
            record.start_date,
            record.end_date,
            days,
            if days == 1 { "" } else { "s" }
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cycle_domain::{calendar::build_month, cycle::CycleState};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn renders_week_rows_with_leading_blanks() {
        let state = CycleState::new(day(2025, 1, 20));
        let rendered = render_month(&build_month(day(2025, 2, 1), &state));
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "February 2025");
        assert_eq!(lines[1], "Sun Mon Tue Wed Thu Fri Sat");
        assert_eq!(lines[2], format!("{} 1.", " ".repeat(24)));
        assert_eq!(lines[3], " 2.  3.  4.  5.  6.  7.  8.");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn marks_period_and_selection() {
        let mut state = CycleState::new(day(2025, 1, 20));
        state.replace_history(vec![
            CycleRecord::new("a", day(2025, 1, 5), day(2025, 1, 6)).unwrap(),
        ]);
        state.toggle_selected(day(2025, 1, 8));
        let rendered = render_month(&build_month(day(2025, 1, 1), &state));
        assert!(rendered.contains(" 5P  6P  7   8* "));
        assert!(rendered.contains("Unsaved picks"));
    }

    #[test]
    fn history_lines_show_duration() {
        let records = vec![
            CycleRecord::new("b", day(2025, 1, 3), day(2025, 1, 7)).unwrap(),
            CycleRecord::new("a", day(2024, 12, 9), day(2024, 12, 9)).unwrap(),
        ];
        assert_eq!(
            render_history(&records),
            "2025-01-03 to 2025-01-07 (5 days)\n2024-12-09 to 2024-12-09 (1 day)\n"
        );
        assert_eq!(render_history(&[]), "No cycles recorded yet\n");
    }
}
