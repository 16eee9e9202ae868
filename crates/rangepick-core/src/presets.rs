use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::datetime::{add_days, first_day_of_month, last_day_of_month, month_from_number, shift_month, start_of_week};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedPreset {
    Today,
    ThisWeek,
    NextWeek,
    ThisMonth,
    NextMonth,
}

impl NamedPreset {
    pub const ALL: [NamedPreset; 5] = [
        NamedPreset::Today,
        NamedPreset::ThisWeek,
        NamedPreset::NextWeek,
        NamedPreset::ThisMonth,
        NamedPreset::NextMonth,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::ThisWeek => "this week",
            Self::NextWeek => "next week",
            Self::ThisMonth => "this month",
            Self::NextMonth => "next month",
        }
    }

    /// Weeks run Sunday..Saturday, matching the grid columns.
    pub fn resolve(self, today: NaiveDate) -> PresetRange {
        match self {
            Self::Today => PresetRange {
                start: today,
                end: None,
            },
            Self::ThisWeek => week_range(start_of_week(today, Weekday::Sun)),
            Self::NextWeek => week_range(add_days(start_of_week(today, Weekday::Sun), 7)),
            Self::ThisMonth => month_range(today, 0),
            Self::NextMonth => month_range(today, 1),
        }
    }
}

impl FromStr for NamedPreset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .to_ascii_lowercase()
            .replace(['-', '_'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        NamedPreset::ALL
            .into_iter()
            .find(|preset| preset.label() == normalized)
            .ok_or_else(|| anyhow!("unknown named preset: {s}"))
    }
}

fn week_range(sunday: NaiveDate) -> PresetRange {
    PresetRange {
        start: sunday,
        end: Some(add_days(sunday, 6)),
    }
}

fn month_range(today: NaiveDate, step: i32) -> PresetRange {
    let current = month_from_number(today.month()).unwrap_or(chrono::Month::January);
    let (year, month) = shift_month(today.year(), current, step);
    let start = first_day_of_month(year, month).unwrap_or(today);
    PresetRange {
        start,
        end: last_day_of_month(year, month),
    }
}

/// A quick-select entry: `value` days away from today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetPreset {
    pub label: String,
    pub value: i64,
}

impl OffsetPreset {
    pub fn new(label: impl Into<String>, value: i64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }

    /// Positive offsets select `[today, today + n]`, negative ones
    /// `[today + n, today]`. Zero selects only a start.
    pub fn resolve(&self, today: NaiveDate) -> PresetRange {
        let other = add_days(today, self.value);
        match self.value.signum() {
            1 => PresetRange {
                start: today,
                end: Some(other),
            },
            -1 => PresetRange {
                start: other,
                end: Some(today),
            },
            _ => PresetRange {
                start: today,
                end: None,
            },
        }
    }
}

/// What a preset pre-populates before first render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetRange {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preset {
    Named(NamedPreset),
    Offset(OffsetPreset),
}

impl Preset {
    pub fn label(&self) -> &str {
        match self {
            Self::Named(named) => named.label(),
            Self::Offset(offset) => &offset.label,
        }
    }

    pub fn resolve(&self, today: NaiveDate) -> PresetRange {
        match self {
            Self::Named(named) => named.resolve(today),
            Self::Offset(offset) => offset.resolve(today),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Deserialize)]
struct PresetFile {
    #[serde(default)]
    preset: Vec<OffsetPreset>,
}

/// Named presets plus the configured offset presets.
#[derive(Debug, Clone)]
pub struct PresetCatalog {
    offsets: Vec<OffsetPreset>,
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self {
            offsets: vec![
                OffsetPreset::new("Next 7 days", 7),
                OffsetPreset::new("Next 14 days", 14),
                OffsetPreset::new("Next 30 days", 30),
                OffsetPreset::new("Last 7 days", -7),
            ],
        }
    }
}

impl PresetCatalog {
    pub fn with_offsets(offsets: Vec<OffsetPreset>) -> Self {
        Self { offsets }
    }

    #[tracing::instrument(skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("failed to read presets file {}", path.display()))?;
        let catalog = Self::from_toml(&raw).with_context(|| format!("failed to parse presets file {}", path.display()))?;
        info!(count = catalog.offsets.len(), "loaded offset presets");
        Ok(catalog)
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let parsed: PresetFile = toml::from_str(raw)?;
        for entry in &parsed.preset {
            if entry.label.trim().is_empty() {
                return Err(anyhow!("preset label cannot be empty"));
            }
        }
        Ok(Self::with_offsets(parsed.preset))
    }

    pub fn offsets(&self) -> &[OffsetPreset] {
        &self.offsets
    }

    /// Every preset in listing order: named ones first.
    pub fn entries(&self) -> Vec<Preset> {
        NamedPreset::ALL
            .into_iter()
            .map(Preset::Named)
            .chain(self.offsets.iter().cloned().map(Preset::Offset))
            .collect()
    }

    /// Looks up a preset by label, case-insensitively. Named presets win.
    pub fn find(&self, label: &str) -> Option<Preset> {
        if let Ok(named) = label.parse::<NamedPreset>() {
            return Some(Preset::Named(named));
        }

        let wanted = label.trim();
        let found = self
            .offsets
            .iter()
            .find(|offset| offset.label.eq_ignore_ascii_case(wanted))
            .cloned()
            .map(Preset::Offset);
        debug!(label = wanted, found = found.is_some(), "looked up offset preset");
        found
    }
}
