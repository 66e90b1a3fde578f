use std::collections::VecDeque;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    calendar::{build_month, MonthView},
    cycle::CycleState,
    interval::{first_of_month, shift_months},
};

/// Distance in pixels from either edge at which another month is loaded.
pub const DEFAULT_EDGE_THRESHOLD: f64 = 500.0;

/// Months seeded on each side of the current month.
pub const DEFAULT_RADIUS: u32 = 2;

/// Largest seed radius honoured; larger requests are clamped to it.
pub const MAX_RADIUS: u32 = 120;

/// Viewport geometry reported by the scroll container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn near_top(&self, threshold: f64) -> bool {
        self.scroll_top < threshold
    }

    pub fn near_bottom(&self, threshold: f64) -> bool {
        self.scroll_height - self.scroll_top - self.client_height < threshold
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollOutcome {
    pub prepended: bool,
    pub appended: bool,
}

impl ScrollOutcome {
    pub fn changed(&self) -> bool {
        self.prepended || self.appended
    }
}

/// Chronological run of rendered months that only ever grows, at either end.
#[derive(Debug, Clone)]
pub struct MonthWindow {
    months: VecDeque<MonthView>,
    edge_threshold: f64,
}

impl MonthWindow {
    /// Seeds the current month plus [`DEFAULT_RADIUS`] months either side.
    pub fn new(state: &CycleState) -> Self {
        Self::with_radius(state, DEFAULT_RADIUS)
    }

    /// Seeds `radius` months either side of the current month, at most [`MAX_RADIUS`].
    pub fn with_radius(state: &CycleState, radius: u32) -> Self {
        let current = first_of_month(state.today());
        if radius > MAX_RADIUS {
            warn!(radius, max = MAX_RADIUS, "clamping month window radius");
        }
        let radius = i32::try_from(radius.min(MAX_RADIUS)).unwrap_or(0);
        let months = (-radius..=radius)
            .filter_map(|offset| shift_months(current, offset))
            .map(|anchor| build_month(anchor, state))
            .collect();
        Self {
            months,
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
        }
    }

    pub fn with_edge_threshold(mut self, threshold: f64) -> Self {
        self.edge_threshold = threshold;
        self
    }

    pub fn edge_threshold(&self) -> f64 {
        self.edge_threshold
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn months(&self) -> impl Iterator<Item = &MonthView> + '_ {
        self.months.iter()
    }

    pub fn anchors(&self) -> Vec<NaiveDate> {
        self.months.iter().map(MonthView::anchor).collect()
    }

    pub fn month(&self, date: NaiveDate) -> Option<&MonthView> {
        self.months.iter().find(|view| view.contains(date))
    }

    /// Adds the month before the first one. Returns `false` only at the edge of chrono's calendar.
    pub fn prepend(&mut self, state: &CycleState) -> bool {
        let Some(first) = self.months.front().map(MonthView::anchor) else {
            self.seed(state);
            return true;
        };
        let Some(anchor) = shift_months(first, -1) else {
            warn!(%first, "cannot extend month window further back");
            return false;
        };
        debug!(%anchor, "prepending month");
        self.months.push_front(build_month(anchor, state));
        true
    }

    /// Adds the month after the last one.
    pub fn append(&mut self, state: &CycleState) -> bool {
        let Some(last) = self.months.back().map(MonthView::anchor) else {
            self.seed(state);
            return true;
        };
        let Some(anchor) = shift_months(last, 1) else {
            warn!(%last, "cannot extend month window further forward");
            return false;
        };
        debug!(%anchor, "appending month");
        self.months.push_back(build_month(anchor, state));
        true
    }

    /// Applies both edge triggers for one scroll event; either, both or neither may fire.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics, state: &CycleState) -> ScrollOutcome {
        let mut outcome = ScrollOutcome::default();
        if metrics.near_top(self.edge_threshold) {
            outcome.prepended = self.prepend(state);
        }
        if metrics.near_bottom(self.edge_threshold) {
            outcome.appended = self.append(state);
        }
        outcome
    }

    /// Rebuilds every month against `state`. Months are not refreshed on their own.
    pub fn recompute(&mut self, state: &CycleState) {
        for view in self.months.iter_mut() {
            *view = build_month(view.anchor(), state);
        }
    }

    /// Rebuilds the single month containing `date`, if it is loaded.
    pub fn refresh_month(&mut self, date: NaiveDate, state: &CycleState) -> bool {
        match self.months.iter_mut().find(|view| view.contains(date)) {
            Some(view) => {
                *view = build_month(view.anchor(), state);
                true
            }
            None => false,
        }
    }

    fn seed(&mut self, state: &CycleState) {
        self.months
            .push_back(build_month(first_of_month(state.today()), state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::DayClass;
    use crate::cycle::CycleRecord;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn january_state() -> CycleState {
        CycleState::new(day(2025, 1, 15))
    }

    fn idle_metrics() -> ScrollMetrics {
        ScrollMetrics {
            scroll_top: 2_000.0,
            scroll_height: 6_000.0,
            client_height: 800.0,
        }
    }

    #[test]
    fn seeds_two_months_either_side() {
        let window = MonthWindow::new(&january_state());
        assert_eq!(
            window.anchors(),
            vec![
                day(2024, 11, 1),
                day(2024, 12, 1),
                day(2025, 1, 1),
                day(2025, 2, 1),
                day(2025, 3, 1),
            ]
        );
    }

    #[test]
    fn oversized_radius_is_clamped_around_today() {
        let state = january_state();
        for radius in [1u32 << 31, u32::MAX] {
            let window = MonthWindow::with_radius(&state, radius);
            let anchors = window.anchors();
            assert_eq!(anchors.len(), 2 * MAX_RADIUS as usize + 1);
            assert_eq!(anchors[MAX_RADIUS as usize], day(2025, 1, 1));
            assert_eq!(anchors.first(), Some(&day(2015, 1, 1)));
            assert_eq!(anchors.last(), Some(&day(2035, 1, 1)));
        }
    }

    #[test]
    fn near_top_prepends_previous_month() {
        let state = january_state();
        let mut window = MonthWindow::new(&state);
        let outcome = window.on_scroll(
            ScrollMetrics {
                scroll_top: 120.0,
                ..idle_metrics()
            },
            &state,
        );
        assert_eq!(
            outcome,
            ScrollOutcome {
                prepended: true,
                appended: false
            }
        );
        assert_eq!(window.anchors()[0], day(2024, 10, 1));
        assert_eq!(window.len(), 6);
    }

    #[test]
    fn repeated_triggers_never_duplicate_anchors() {
        let state = january_state();
        let mut window = MonthWindow::new(&state);
        for _ in 0..14 {
            window.on_scroll(
                ScrollMetrics {
                    scroll_top: 0.0,
                    scroll_height: 900.0,
                    client_height: 800.0,
                },
                &state,
            );
        }
        let anchors = window.anchors();
        assert_eq!(anchors.len(), 5 + 28);
        assert!(anchors.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(anchors.first(), Some(&day(2023, 9, 1)));
        assert_eq!(anchors.last(), Some(&day(2026, 5, 1)));
    }

    #[test]
    fn idle_scroll_changes_nothing() {
        let state = january_state();
        let mut window = MonthWindow::new(&state);
        assert!(!window.on_scroll(idle_metrics(), &state).changed());
        assert_eq!(window.len(), 5);
    }

    #[test]
    fn new_months_use_current_state_but_old_ones_wait_for_recompute() {
        let mut state = january_state();
        let mut window = MonthWindow::new(&state);
        state.replace_history(vec![CycleRecord::new(
            "rec",
            day(2024, 10, 30),
            day(2024, 11, 2),
        )
        .unwrap()]);

        window.prepend(&state);
        let october = window.month(day(2024, 10, 1)).unwrap();
        assert_eq!(october.day(day(2024, 10, 30)).unwrap().class, DayClass::Period);

        let november = window.month(day(2024, 11, 1)).unwrap();
        assert_eq!(november.day(day(2024, 11, 1)).unwrap().class, DayClass::Normal);

        window.recompute(&state);
        let november = window.month(day(2024, 11, 1)).unwrap();
        assert_eq!(november.day(day(2024, 11, 1)).unwrap().class, DayClass::Period);
    }

    #[test]
    fn refresh_month_rebuilds_only_the_target() {
        let mut state = january_state();
        let mut window = MonthWindow::new(&state);
        state.toggle_selected(day(2025, 1, 3));
        assert!(window.refresh_month(day(2025, 1, 3), &state));
        assert!(window.month(day(2025, 1, 1)).unwrap().has_selection());
        assert!(!window.refresh_month(day(2030, 1, 1), &state));
    }
}
