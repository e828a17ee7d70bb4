use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

use crate::datekey::DateKey;
use crate::grouping::{ActivityIndex, DayCounts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayCell {
    pub day: u32,
    pub key: DateKey,
    pub counts: DayCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CalendarCell {
    Blank,
    Day(DayCell),
}

impl CalendarCell {
    pub fn as_day(&self) -> Option<&DayCell> {
        match self {
            CalendarCell::Blank => None,
            CalendarCell::Day(cell) => Some(cell),
        }
    }
}

/// One month laid out as complete weeks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub week_start: Weekday,
    pub cells: Vec<CalendarCell>,
}

/// Lays out the month containing `reference`: blanks up to the first day's
/// column, one cell per day, then blanks to finish the last week.
pub fn build_month_grid(reference: NaiveDate, week_start: Weekday) -> MonthGrid {
    let first = first_day_of_month(reference.year(), reference.month());
    let leading = days_after_week_start(first.weekday(), week_start);
    let day_count = days_in_month(reference.year(), reference.month());

    let mut cells = Vec::with_capacity(42);
    cells.extend(std::iter::repeat_n(CalendarCell::Blank, leading));
    cells.extend((1..=day_count).filter_map(|day| {
        first.with_day(day).map(|date| {
            CalendarCell::Day(DayCell {
                day,
                key: DateKey::new(date),
                counts: DayCounts::default(),
            })
        })
    }));
    while cells.len() % 7 != 0 {
        cells.push(CalendarCell::Blank);
    }

    MonthGrid {
        year: first.year(),
        month: first.month(),
        week_start,
        cells,
    }
}

impl MonthGrid {
    /// Fills in per-day activity counts from `index`.
    pub fn with_counts(mut self, index: &ActivityIndex) -> Self {
        for cell in &mut self.cells {
            if let CalendarCell::Day(day) = cell {
                day.counts = index.counts(day.key);
            }
        }
        self
    }

    pub fn weeks(&self) -> std::slice::Chunks<'_, CalendarCell> {
        self.cells.chunks(7)
    }

    pub fn day_cells(&self) -> impl Iterator<Item = &DayCell> {
        self.cells.iter().filter_map(CalendarCell::as_day)
    }

    pub fn leading_blanks(&self) -> usize {
        self.cells
            .iter()
            .take_while(|cell| matches!(cell, CalendarCell::Blank))
            .count()
    }

    pub fn first_day(&self) -> NaiveDate {
        first_day_of_month(self.year, self.month)
    }

    pub fn title(&self) -> String {
        self.first_day().format("%B %Y").to_string()
    }

    pub fn weekday_labels(&self) -> [&'static str; 7] {
        weekday_labels(self.week_start)
    }
}

pub fn weekday_labels(week_start: Weekday) -> [&'static str; 7] {
    let mut labels = [""; 7];
    let mut day = week_start;
    for label in &mut labels {
        *label = weekday_short_name(day);
        day = day.succ();
    }
    labels
}

fn weekday_short_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

fn days_after_week_start(day: Weekday, week_start: Weekday) -> usize {
    let day_idx = day.num_days_from_monday() as usize;
    let start_idx = week_start.num_days_from_monday() as usize;
    (7 + day_idx - start_idx) % 7
}

pub fn first_day_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month >= 12 {
        (year.saturating_add(1), 1_u32)
    } else {
        (year, month + 1)
    };
    let next_first = first_day_of_month(next_year, next_month);
    next_first
        .checked_sub_signed(Duration::days(1))
        .unwrap_or(next_first)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    last_day_of_month(year, month).day()
}

/// Moves `date` by whole months, clamping the day to the target month.
pub fn shift_months(date: NaiveDate, months: i32) -> NaiveDate {
    let mut year = date.year();
    let mut month = date.month() as i32 + months;

    while month < 1 {
        month += 12;
        year = year.saturating_sub(1);
    }
    while month > 12 {
        month -= 12;
        year = year.saturating_add(1);
    }

    let month = month as u32;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{Activity, ActivityKind};
    use crate::datekey::DateInput;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn december_2025_has_one_leading_blank() {
        let grid = build_month_grid(date(2025, 12, 17), Weekday::Sun);
        assert_eq!(grid.leading_blanks(), 1);
        assert_eq!(grid.day_cells().count(), 31);
        assert_eq!(grid.cells.len(), 35);
        assert_eq!(grid.title(), "December 2025");
        let first = grid.cells[1].as_day().expect("day cell");
        assert_eq!(first.day, 1);
        assert_eq!(first.key.to_string(), "2025-12-01");
    }

    #[test]
    fn thirty_day_month_starting_sunday_has_no_leading_blanks() {
        // November 2026 starts on a Sunday.
        let grid = build_month_grid(date(2026, 11, 1), Weekday::Sun);
        assert_eq!(grid.leading_blanks(), 0);
        assert_eq!(grid.day_cells().count(), 30);
        assert_eq!(grid.cells.len(), 35);
    }

    #[test]
    fn four_and_six_row_months() {
        // February 2026 starts on a Sunday and has 28 days.
        let february = build_month_grid(date(2026, 2, 10), Weekday::Sun);
        assert_eq!(february.cells.len(), 28);
        assert_eq!(february.weeks().count(), 4);

        // August 2026 starts on a Saturday and has 31 days.
        let august = build_month_grid(date(2026, 8, 31), Weekday::Sun);
        assert_eq!(august.leading_blanks(), 6);
        assert_eq!(august.cells.len(), 42);
    }

    #[test]
    fn every_month_pads_to_whole_weeks() {
        for year in [1999, 2000, 2024, 2025, 2100] {
            for month in 1..=12 {
                for week_start in [Weekday::Sun, Weekday::Mon] {
                    let grid = build_month_grid(date(year, month, 1), week_start);
                    assert_eq!(grid.cells.len() % 7, 0, "{year}-{month}");
                    assert_eq!(
                        grid.day_cells().count() as u32,
                        days_in_month(year, month),
                        "{year}-{month}"
                    );
                    assert!(grid.leading_blanks() < 7);
                }
            }
        }
    }

    #[test]
    fn monday_week_start_shifts_columns() {
        let grid = build_month_grid(date(2025, 12, 1), Weekday::Mon);
        assert_eq!(grid.leading_blanks(), 0);
        assert_eq!(
            grid.weekday_labels(),
            ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
        );
    }

    #[test]
    fn counts_attach_to_matching_days() {
        let tasks = vec![
            Activity::new(ActivityKind::Task, "a", Some(DateInput::from("2025-12-03"))),
            Activity::new(ActivityKind::Task, "b", Some(DateInput::from("2026-01-03"))),
        ];
        let calls = vec![Activity::new(
            ActivityKind::Call,
            "c",
            Some(DateInput::from("2025-12-03T16:00:00")),
        )];
        let index = ActivityIndex::build(&tasks, &[], &calls, chrono_tz::UTC);
        let grid = build_month_grid(date(2025, 12, 1), Weekday::Sun).with_counts(&index);

        let third = grid
            .day_cells()
            .find(|cell| cell.day == 3)
            .expect("third of month");
        assert_eq!(third.counts.tasks, 1);
        assert_eq!(third.counts.calls, 1);
        let total: usize = grid.day_cells().map(|cell| cell.counts.total()).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn shift_months_clamps_day() {
        assert_eq!(shift_months(date(2025, 1, 31), 1), date(2025, 2, 28));
        assert_eq!(shift_months(date(2024, 3, 31), -1), date(2024, 2, 29));
        assert_eq!(shift_months(date(2025, 12, 15), 1), date(2026, 1, 15));
        assert_eq!(shift_months(date(2025, 1, 15), -1), date(2024, 12, 15));
    }
}
