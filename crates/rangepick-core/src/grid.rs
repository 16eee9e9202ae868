//! Month grid generation.
//!
//! A [`MonthGrid`] is derived from a `(year, month)` pair and is never stored:
//! callers regenerate it whenever the visible month changes.

use chrono::{Datelike, Month, NaiveDate};
use serde::Serialize;

use crate::datetime::{days_in_month, first_day_of_month};

/// Columns per week row, Sunday first.
pub const DAYS_PER_WEEK: usize = 7;

/// One in-month day in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarCell {
    pub day: u32,
    /// Weekend days are not clickable under the default policy.
    pub disabled: bool,
}

/// Sunday..Saturday; `None` pads days outside the month.
pub type WeekRow = [Option<CalendarCell>; DAYS_PER_WEEK];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGrid {
    pub year: i32,
    #[serde(serialize_with = "serialize_month")]
    pub month: Month,
    pub weeks: Vec<WeekRow>,
}

impl MonthGrid {
    /// Cell for `day`, or `None` when the month has no such day.
    pub fn cell(&self, day: u32) -> Option<CalendarCell> {
        self.cells().find(|cell| cell.day == day)
    }

    pub fn cell_at(&self, row: usize, col: usize) -> Option<CalendarCell> {
        self.weeks.get(row).and_then(|week| week.get(col).copied().flatten())
    }

    pub fn cells(&self) -> impl Iterator<Item = CalendarCell> + '_ {
        self.weeks.iter().flat_map(|week| week.iter().flatten().copied())
    }

    pub fn days(&self) -> u32 {
        self.cells().count() as u32
    }

    /// Resolves a cell of this grid to its calendar date.
    pub fn date_of(&self, cell: &CalendarCell) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month.number_from_month(), cell.day)
    }
}

fn serialize_month<S>(month: &Month, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u32(month.number_from_month())
}

/// Builds the week-partitioned grid for `month` of `year`.
///
/// Each day lands in the column of its weekday (0 = Sunday). Saturday and
/// Sunday cells are marked disabled. A row is closed on Saturday or on the
/// last day of the month, so partial leading and trailing weeks are padded
/// with `None`. Years chrono cannot represent produce a grid with no weeks.
pub fn generate(year: i32, month: Month) -> MonthGrid {
    let total_days = days_in_month(year, month);
    let mut weeks = Vec::with_capacity(6);

    if let Some(first) = first_day_of_month(year, month) {
        let mut current_week: WeekRow = [None; DAYS_PER_WEEK];

        for (offset, date) in first.iter_days().take(total_days as usize).enumerate() {
            let day = offset as u32 + 1;
            let day_index = date.weekday().num_days_from_sunday() as usize;

            current_week[day_index] = Some(CalendarCell {
                day,
                disabled: day_index == 0 || day_index == 6,
            });

            if day_index == 6 || day == total_days {
                weeks.push(current_week);
                current_week = [None; DAYS_PER_WEEK];
            }
        }
    }

    MonthGrid { year, month, weeks }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Month, NaiveDate};

    use super::{DAYS_PER_WEEK, generate};
    use crate::datetime::month_from_number;

    #[test]
    fn leap_february_starts_on_thursday() {
        let grid = generate(2024, Month::February);

        assert_eq!(grid.days(), 29);
        assert_eq!(grid.weeks.len(), 5);
        // 2024-02-01 is a Thursday.
        assert_eq!(grid.weeks[0][..4], [None, None, None, None]);
        assert_eq!(grid.cell_at(0, 4).map(|cell| cell.day), Some(1));
        assert_eq!(grid.cell_at(4, 4).map(|cell| cell.day), Some(29));
        assert_eq!(grid.cell_at(4, 5), None);
    }

    #[test]
    fn month_starting_on_sunday_has_no_leading_padding() {
        // September 2024 starts on a Sunday and ends on a Monday.
        let grid = generate(2024, Month::September);

        assert_eq!(grid.cell_at(0, 0).map(|cell| cell.day), Some(1));
        let last = grid.weeks.last().expect("at least one week");
        assert_eq!(last[1].map(|cell| cell.day), Some(30));
        assert!(last[2..].iter().all(Option::is_none));
    }

    #[test]
    fn weekends_are_disabled() {
        let grid = generate(2024, Month::March);

        for week in &grid.weeks {
            for (col, slot) in week.iter().enumerate() {
                if let Some(cell) = slot {
                    assert_eq!(cell.disabled, col == 0 || col == 6, "day {}", cell.day);
                }
            }
        }
    }

    #[test]
    fn every_day_appears_once_in_its_weekday_column() {
        for year in [1900, 1999, 2000, 2023, 2024, 2100] {
            for number in 1..=12 {
                let month = month_from_number(number).expect("month");
                let grid = generate(year, month);
                let mut seen = Vec::new();

                for week in &grid.weeks {
                    assert_eq!(week.len(), DAYS_PER_WEEK);
                    for (col, slot) in week.iter().enumerate() {
                        let Some(cell) = slot else { continue };
                        let date = NaiveDate::from_ymd_opt(year, number, cell.day).expect("date");
                        assert_eq!(date.weekday().num_days_from_sunday() as usize, col);
                        seen.push(cell.day);
                    }
                }

                let expected: Vec<u32> = (1..=grid.days()).collect();
                assert_eq!(seen, expected, "{year}-{number}");
                assert!(seen.len() >= 28);
            }
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let first = generate(2031, Month::June);
        let second = generate(2031, Month::June);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).expect("serialize"),
            serde_json::to_string(&second).expect("serialize")
        );
    }

    #[test]
    fn unrepresentable_year_yields_empty_grid() {
        let grid = generate(i32::MAX, Month::January);
        assert!(grid.weeks.is_empty());
        assert_eq!(grid.cell(1), None);
    }
}
