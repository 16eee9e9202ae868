//! Range selection state machine.
//!
//! A [`RangeSelector`] owns one [`SelectionState`] and moves it between three
//! phases: nothing selected, start only, and a full `[start, end]` range. A
//! full range is transient: the next eligible click restarts the selection.
//! Whenever a click or a prefill completes a range, every registered
//! [`RangeObserver`] is notified synchronously with the derived
//! [`RangeChange`].

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{Datelike, Month, NaiveDate};
use serde::{Serialize, Serializer};
use tracing::{debug, info, instrument};

use crate::datetime::{first_day_of_month, format_iso, format_trigger_date, shift_month, weekends_between};
use crate::grid::{CalendarCell, MonthGrid, generate};

const DATE_PLACEHOLDER: &str = "dd/mm/yy";
pub const DEFAULT_YEARS_BEFORE: i32 = 5;
pub const DEFAULT_YEAR_COUNT: usize = 30;
/// Upper bound for the year dropdown length.
pub const MAX_YEAR_COUNT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prev" | "previous" | "back" => Ok(Self::Prev),
            "next" | "forward" => Ok(Self::Next),
            other => Err(anyhow!("unknown direction: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    Empty,
    StartOnly,
    FullRange,
}

/// The selector's view and selection. Mutated only through [`RangeSelector`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionState {
    pub view_year: i32,
    #[serde(serialize_with = "serialize_month")]
    pub view_month: Month,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub is_open: bool,
}

fn serialize_month<S>(month: &Month, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u32(month.number_from_month())
}

impl SelectionState {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            view_year: today.year(),
            view_month: month_of(today),
            start: None,
            end: None,
            is_open: false,
        }
    }

    pub fn phase(&self) -> SelectionPhase {
        match (self.start, self.end) {
            (None, _) => SelectionPhase::Empty,
            (Some(_), None) => SelectionPhase::StartOnly,
            (Some(_), Some(_)) => SelectionPhase::FullRange,
        }
    }

    /// Resolves a cell of the visible month to a date.
    pub fn cell_date(&self, cell: Option<&CalendarCell>) -> Option<NaiveDate> {
        let cell = cell?;
        NaiveDate::from_ymd_opt(self.view_year, self.view_month.number_from_month(), cell.day)
    }

    pub fn is_start(&self, cell: Option<&CalendarCell>) -> bool {
        matches!((self.start, self.cell_date(cell)), (Some(start), Some(date)) if start == date)
    }

    pub fn is_end(&self, cell: Option<&CalendarCell>) -> bool {
        matches!((self.end, self.cell_date(cell)), (Some(end), Some(date)) if end == date)
    }

    /// True only with both ends set and the cell inside `[start, end]`.
    pub fn is_in_range(&self, cell: Option<&CalendarCell>) -> bool {
        match (self.start, self.end, self.cell_date(cell)) {
            (Some(start), Some(end), Some(date)) => start <= date && date <= end,
            _ => false,
        }
    }

    /// A cell is not clickable when it is an empty slot, lies before `today`,
    /// lies before a chosen start, or was marked disabled by the grid.
    pub fn is_date_disabled(&self, cell: Option<&CalendarCell>, today: NaiveDate) -> bool {
        let Some(date) = self.cell_date(cell) else {
            return true;
        };

        if date < today {
            return true;
        }

        if self.start.is_some_and(|start| date < start) {
            return true;
        }

        cell.is_some_and(|cell| cell.disabled)
    }
}

/// A committed range and the weekend dates inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeChange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub weekends: Vec<NaiveDate>,
}

impl RangeChange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            weekends: weekends_between(start, end),
        }
    }

    pub fn selected_range(&self) -> [String; 2] {
        [format_iso(self.start), format_iso(self.end)]
    }

    pub fn weekend_strings(&self) -> Vec<String> {
        self.weekends.iter().copied().map(format_iso).collect()
    }

    /// `[["start","end"],["weekend",...]]` on a single line.
    pub fn to_json_line(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for RangeChange {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (self.selected_range(), self.weekend_strings()).serialize(serializer)
    }
}

/// Receives every committed range.
pub trait RangeObserver {
    fn on_change(&mut self, change: &RangeChange);
}

impl<F> RangeObserver for F
where
    F: FnMut(&RangeChange),
{
    fn on_change(&mut self, change: &RangeChange) {
        (*self)(change)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptySlot,
    Disabled,
    NotAfterStart,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::EmptySlot => "empty slot",
            Self::Disabled => "date is disabled",
            Self::NotAfterStart => "date is not after start",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// A new start was chosen. `restarted` is set when a full range was dropped.
    Started { start: NaiveDate, restarted: bool },
    Completed(RangeChange),
    Ignored(IgnoreReason),
}

pub struct RangeSelector {
    state: SelectionState,
    today: NaiveDate,
    years_before: i32,
    year_count: usize,
    observers: Vec<Box<dyn RangeObserver>>,
}

impl fmt::Debug for RangeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeSelector")
            .field("state", &self.state)
            .field("today", &self.today)
            .field("years_before", &self.years_before)
            .field("year_count", &self.year_count)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl RangeSelector {
    /// `today` drives eligibility and is not re-read from the clock. Long-lived
    /// hosts should call [`RangeSelector::set_today`] when the date rolls over.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            state: SelectionState::new(today),
            today,
            years_before: DEFAULT_YEARS_BEFORE,
            year_count: DEFAULT_YEAR_COUNT,
            observers: Vec::new(),
        }
    }

    /// Sets the span offered by [`RangeSelector::year_options`]. Counts above
    /// [`MAX_YEAR_COUNT`] are clamped.
    pub fn with_year_window(mut self, years_before: i32, year_count: usize) -> Self {
        self.years_before = years_before;
        self.year_count = year_count.min(MAX_YEAR_COUNT);
        self
    }

    pub fn on_change<O>(&mut self, observer: O)
    where
        O: RangeObserver + 'static,
    {
        self.observers.push(Box::new(observer));
        debug!(observers = self.observers.len(), "registered change observer");
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Moves the eligibility cutoff. The view and the selection stay put.
    pub fn set_today(&mut self, today: NaiveDate) {
        debug!(%today, "today updated");
        self.today = today;
    }

    /// Grid of the visible month.
    pub fn grid(&self) -> MonthGrid {
        generate(self.state.view_year, self.state.view_month)
    }

    pub fn is_date_disabled(&self, cell: Option<&CalendarCell>) -> bool {
        self.state.is_date_disabled(cell, self.today)
    }

    #[instrument(skip(self), fields(view_year = self.state.view_year, view_month = ?self.state.view_month))]
    pub fn click(&mut self, cell: Option<CalendarCell>) -> ClickOutcome {
        let outcome = self.apply_click(cell.as_ref());
        match &outcome {
            ClickOutcome::Ignored(reason) => debug!(%reason, "click ignored"),
            ClickOutcome::Started { start, restarted } => {
                debug!(start = %start, restarted, "selection started")
            }
            ClickOutcome::Completed(change) => {
                debug!(start = %change.start, end = %change.end, "selection completed")
            }
        }
        outcome
    }

    /// Clicks `day` of the visible month. Days the month lacks are empty slots.
    pub fn click_day(&mut self, day: u32) -> ClickOutcome {
        let cell = self.grid().cell(day);
        self.click(cell)
    }

    pub fn click_at(&mut self, row: usize, col: usize) -> ClickOutcome {
        let cell = self.grid().cell_at(row, col);
        self.click(cell)
    }

    fn apply_click(&mut self, cell: Option<&CalendarCell>) -> ClickOutcome {
        let Some(selected) = self.state.cell_date(cell) else {
            return ClickOutcome::Ignored(IgnoreReason::EmptySlot);
        };

        if self.is_date_disabled(cell) {
            return ClickOutcome::Ignored(IgnoreReason::Disabled);
        }

        match (self.state.start, self.state.end) {
            (None, _) | (Some(_), Some(_)) => {
                let restarted = self.state.end.is_some();
                self.state.start = Some(selected);
                self.state.end = None;
                ClickOutcome::Started {
                    start: selected,
                    restarted,
                }
            }
            (Some(start), None) if selected > start => {
                self.state.end = Some(selected);
                ClickOutcome::Completed(self.emit(start, selected))
            }
            (Some(_), None) => ClickOutcome::Ignored(IgnoreReason::NotAfterStart),
        }
    }

    /// Moves the view one month, carrying into the year. Selection is kept.
    #[instrument(skip(self))]
    pub fn change_month(&mut self, direction: Direction) {
        let step = match direction {
            Direction::Prev => -1,
            Direction::Next => 1,
        };
        let (year, month) = shift_month(self.state.view_year, self.state.view_month, step);
        self.state.view_year = year;
        self.state.view_month = month;
        debug!(year, ?month, "changed month");
    }

    pub fn set_year(&mut self, year: i32) -> anyhow::Result<()> {
        self.show_month(year, self.state.view_month)
    }

    #[instrument(skip(self))]
    pub fn show_month(&mut self, year: i32, month: Month) -> anyhow::Result<()> {
        if first_day_of_month(year, month).is_none() {
            return Err(anyhow!("year out of calendar range: {year}"));
        }
        self.state.view_year = year;
        self.state.view_month = month;
        Ok(())
    }

    /// Years offered by the year dropdown, relative to the view year.
    pub fn year_options(&self) -> Vec<i32> {
        let first = self.state.view_year.saturating_sub(self.years_before);
        (0..self.year_count)
            .map_while(|offset| i32::try_from(offset).ok().and_then(|offset| first.checked_add(offset)))
            .collect()
    }

    /// Drops start and end. No change is emitted and the panel stays as is.
    pub fn clear(&mut self) {
        self.state.start = None;
        self.state.end = None;
        debug!("selection cleared");
    }

    /// Pre-populates the selection before first render.
    ///
    /// `end` is kept only when it falls after `start`. The view follows
    /// `start`, and a full range is emitted like a click would.
    #[instrument(skip(self))]
    pub fn prefill(&mut self, start: NaiveDate, end: Option<NaiveDate>) -> Option<RangeChange> {
        self.state.start = Some(start);
        self.state.end = end.filter(|end| *end > start);
        self.state.view_year = start.year();
        self.state.view_month = month_of(start);
        let end = self.state.end;
        end.map(|end| self.emit(start, end))
    }

    pub fn toggle(&mut self) {
        self.state.is_open = !self.state.is_open;
    }

    pub fn open(&mut self) {
        self.state.is_open = true;
    }

    pub fn close(&mut self) {
        self.state.is_open = false;
    }

    /// `Fri Mar 08 2024 - dd/mm/yy` style label for the trigger button.
    pub fn trigger_label(&self) -> String {
        let side = |date: Option<NaiveDate>| {
            date.map(format_trigger_date)
                .unwrap_or_else(|| DATE_PLACEHOLDER.to_string())
        };
        format!("{} - {}", side(self.state.start), side(self.state.end))
    }

    fn emit(&mut self, start: NaiveDate, end: NaiveDate) -> RangeChange {
        let change = RangeChange::new(start, end);
        info!(
            start = %start,
            end = %end,
            weekends = change.weekends.len(),
            observers = self.observers.len(),
            "range committed"
        );
        for observer in &mut self.observers {
            observer.on_change(&change);
        }
        change
    }
}

fn month_of(date: NaiveDate) -> Month {
    crate::datetime::month_from_number(date.month()).unwrap_or(Month::January)
}
