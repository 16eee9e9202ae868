//! Scripted interaction with a [`RangeSelector`].
//!
//! The terminal front end has no pointer, so clicks, navigation and panel
//! buttons arrive as textual actions, either as command-line tokens
//! (`click 8 next click 11`) or one per line on stdin.

use std::fmt;

use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, instrument};

use crate::datetime::{month_from_number, parse_month_expr};
use crate::presets::PresetCatalog;
use crate::selector::{ClickOutcome, Direction, RangeSelector};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// A day of the visible month.
    Click(u32),
    /// Jumps the view to the date's month, then clicks it.
    ClickDate(NaiveDate),
    Navigate(Direction),
    Year(i32),
    Goto(String),
    Clear,
    Open,
    Close,
    Toggle,
    Preset(String),
    Show,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click(day) => write!(f, "click {day}"),
            Self::ClickDate(date) => write!(f, "click {}", date.format("%Y-%m-%d")),
            Self::Navigate(Direction::Prev) => f.write_str("prev"),
            Self::Navigate(Direction::Next) => f.write_str("next"),
            Self::Year(year) => write!(f, "year {year}"),
            Self::Goto(target) => write!(f, "goto {target}"),
            Self::Clear => f.write_str("clear"),
            Self::Open => f.write_str("open"),
            Self::Close => f.write_str("close"),
            Self::Toggle => f.write_str("toggle"),
            Self::Preset(label) => write!(f, "preset {label}"),
            Self::Show => f.write_str("show"),
        }
    }
}

fn takes_operand(keyword: &str) -> bool {
    matches!(keyword, "click" | "year" | "goto" | "preset")
}

fn is_keyword(token: &str) -> bool {
    matches!(
        token.trim().to_ascii_lowercase().as_str(),
        "click" | "year" | "goto" | "preset" | "next" | "prev" | "clear" | "open" | "close" | "done" | "toggle" | "show"
    )
}

fn build_action(keyword: &str, operand: Option<&str>) -> anyhow::Result<Action> {
    let need = |name: &str| {
        operand
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow!("action '{name}' needs an argument"))
    };

    let action = match keyword {
        "click" => {
            let raw = need("click")?;
            match raw.parse::<u32>() {
                Ok(day) => Action::Click(day),
                Err(_) => Action::ClickDate(
                    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                        .with_context(|| format!("click expects a day number or YYYY-MM-DD, got: {raw}"))?,
                ),
            }
        }
        "next" | "prev" => Action::Navigate(keyword.parse()?),
        "year" => {
            let raw = need("year")?;
            Action::Year(raw.parse().with_context(|| format!("invalid year: {raw}"))?)
        }
        "goto" => Action::Goto(need("goto")?.to_string()),
        "preset" => Action::Preset(need("preset")?.to_string()),
        "clear" => Action::Clear,
        "open" => Action::Open,
        "close" | "done" => Action::Close,
        "toggle" => Action::Toggle,
        "show" => Action::Show,
        other => return Err(anyhow!("unknown action: {other}")),
    };
    Ok(action)
}

/// Parses command-line tokens; operand-taking actions consume the next token.
///
/// `preset` labels may span several tokens (`preset next 7 days`): the first
/// token is always taken, later ones up to the next action keyword.
pub fn parse_tokens(tokens: &[String]) -> anyhow::Result<Vec<Action>> {
    let mut actions = Vec::new();
    let mut iter = tokens.iter().peekable();

    while let Some(token) = iter.next() {
        let keyword = token.trim().to_ascii_lowercase();
        if !takes_operand(&keyword) {
            actions.push(build_action(&keyword, None)?);
            continue;
        }

        let mut operand = iter.next().cloned().unwrap_or_default();
        if keyword == "preset" {
            while let Some(word) = iter.next_if(|word| !is_keyword(word)) {
                operand.push(' ');
                operand.push_str(word);
            }
        }
        actions.push(build_action(&keyword, Some(&operand))?);
    }

    Ok(actions)
}

/// Drops a trailing comment. `#` opens a comment at the start of the line or
/// when it stands alone between whitespace, so `preset Sprint #2` keeps its `#2`.
fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    for (idx, _) in line.match_indices('#') {
        let before = line[..idx].chars().next_back();
        let after = line[idx + 1..].chars().next();
        if before.is_some_and(char::is_whitespace) && after.is_none_or(char::is_whitespace) {
            return &line[..idx];
        }
    }
    line
}

/// Parses one script line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> anyhow::Result<Option<Action>> {
    let line = strip_comment(line).trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (keyword, operand) = match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, Some(rest)),
        None => (line, None),
    };
    let keyword = keyword.to_ascii_lowercase();
    if !takes_operand(&keyword) && operand.is_some_and(|rest| !rest.trim().is_empty()) {
        return Err(anyhow!("action '{keyword}' takes no argument"));
    }

    build_action(&keyword, operand).map(Some)
}

pub fn parse_script(text: &str) -> anyhow::Result<Vec<Action>> {
    let mut actions = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some(action) = parse_line(line).with_context(|| format!("script line {}", idx + 1))? {
            actions.push(action);
        }
    }
    Ok(actions)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Clicked(ClickOutcome),
    Updated,
    ShowRequested,
}

#[derive(Debug)]
pub struct Session {
    selector: RangeSelector,
    presets: PresetCatalog,
}

impl Session {
    pub fn new(selector: RangeSelector, presets: PresetCatalog) -> Self {
        Self { selector, presets }
    }

    pub fn selector(&self) -> &RangeSelector {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut RangeSelector {
        &mut self.selector
    }

    pub fn presets(&self) -> &PresetCatalog {
        &self.presets
    }

    /// Resolves `label` against the catalog and pre-populates the selection.
    pub fn apply_preset(&mut self, label: &str) -> anyhow::Result<()> {
        let preset = self
            .presets
            .find(label)
            .ok_or_else(|| anyhow!("unknown preset: {label}"))?;
        let range = preset.resolve(self.selector.today());
        debug!(preset = %preset, start = %range.start, end = ?range.end, "applying preset");
        self.selector.prefill(range.start, range.end);
        Ok(())
    }

    #[instrument(skip(self, action), fields(action = %action))]
    pub fn apply(&mut self, action: &Action) -> anyhow::Result<ActionResult> {
        let result = match action {
            Action::Click(day) => ActionResult::Clicked(self.selector.click_day(*day)),
            Action::ClickDate(date) => {
                let month = month_from_number(date.month()).ok_or_else(|| anyhow!("invalid month in {date}"))?;
                self.selector.show_month(date.year(), month)?;
                ActionResult::Clicked(self.selector.click_day(date.day()))
            }
            Action::Navigate(direction) => {
                self.selector.change_month(*direction);
                ActionResult::Updated
            }
            Action::Year(year) => {
                self.selector.set_year(*year)?;
                ActionResult::Updated
            }
            Action::Goto(target) => {
                let (year, month) = parse_month_expr(target, self.selector.today())?;
                self.selector.show_month(year, month)?;
                ActionResult::Updated
            }
            Action::Clear => {
                self.selector.clear();
                ActionResult::Updated
            }
            Action::Open => {
                self.selector.open();
                ActionResult::Updated
            }
            Action::Close => {
                self.selector.close();
                ActionResult::Updated
            }
            Action::Toggle => {
                self.selector.toggle();
                ActionResult::Updated
            }
            Action::Preset(label) => {
                self.apply_preset(label)?;
                ActionResult::Updated
            }
            Action::Show => ActionResult::ShowRequested,
        };
        Ok(result)
    }
}
