use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::datekey::DateKey;
use crate::grid::{first_day_of_month, shift_months};

/// Navigation input from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    PrevMonth,
    NextMonth,
    Today(NaiveDate),
    SelectDay(DateKey),
}

/// The displayed month and the highlighted day. The selected day always lies
/// inside the displayed month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    month: NaiveDate,
    selected: DateKey,
}

impl Selection {
    pub fn new(today: NaiveDate) -> Self {
        Self::on(DateKey::new(today))
    }

    fn on(key: DateKey) -> Self {
        let date = key.date();
        Self {
            month: first_day_of_month(date.year(), date.month()),
            selected: key,
        }
    }

    pub fn month(&self) -> NaiveDate {
        self.month
    }

    pub fn selected(&self) -> DateKey {
        self.selected
    }

    #[must_use]
    pub fn apply(self, action: NavAction) -> Self {
        match action {
            NavAction::PrevMonth => self.shift(-1),
            NavAction::NextMonth => self.shift(1),
            NavAction::Today(today) => Self::new(today),
            NavAction::SelectDay(key) => Self::on(key),
        }
    }

    /// Restores the month/day invariant on state read back from disk.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self::on(self.selected)
    }

    fn shift(self, months: i32) -> Self {
        Self::on(DateKey::new(shift_months(self.selected.date(), months)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn starts_on_today() {
        let selection = Selection::new(date(2025, 12, 17));
        assert_eq!(selection.month(), date(2025, 12, 1));
        assert_eq!(selection.selected().to_string(), "2025-12-17");
    }

    #[test]
    fn month_navigation_keeps_day_in_range() {
        let selection = Selection::new(date(2025, 1, 31));
        let next = selection.apply(NavAction::NextMonth);
        assert_eq!(next.month(), date(2025, 2, 1));
        assert_eq!(next.selected().date(), date(2025, 2, 28));

        let back = next.apply(NavAction::PrevMonth);
        assert_eq!(back.month(), date(2025, 1, 1));
        assert_eq!(back.selected().date(), date(2025, 1, 28));

        let wrapped = Selection::new(date(2025, 1, 10)).apply(NavAction::PrevMonth);
        assert_eq!(wrapped.month(), date(2024, 12, 1));
    }

    #[test]
    fn select_day_follows_into_its_month() {
        let selection = Selection::new(date(2025, 12, 17))
            .apply(NavAction::SelectDay(DateKey::new(date(2026, 3, 2))));
        assert_eq!(selection.month(), date(2026, 3, 1));
        assert_eq!(selection.selected().date(), date(2026, 3, 2));

        let today = selection.apply(NavAction::Today(date(2025, 12, 17)));
        assert_eq!(today, Selection::new(date(2025, 12, 17)));
    }

    #[test]
    fn serializes_month_and_selected_day() {
        let selection = Selection::new(date(2025, 12, 17));
        let json = serde_json::to_value(selection).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"month": "2025-12-01", "selected": "2025-12-17"})
        );
        let back: Selection = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, selection);
    }

    #[test]
    fn normalizing_repairs_a_mismatched_month() {
        let raw = serde_json::json!({"month": "2020-01-01", "selected": "2025-12-17"});
        let loaded: Selection = serde_json::from_value(raw).expect("deserialize");
        assert_eq!(loaded.normalized().month(), date(2025, 12, 1));
    }
}
