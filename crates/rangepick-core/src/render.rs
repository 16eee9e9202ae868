use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{Month, NaiveDate};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_iso;
use crate::grid::{CalendarCell, DAYS_PER_WEEK, MonthGrid};
use crate::presets::Preset;
use crate::selector::RangeSelector;

const WEEKDAY_LABELS: [&str; DAYS_PER_WEEK] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const CELL_WIDTH: usize = 4;
const GRID_WIDTH: usize = DAYS_PER_WEEK * (CELL_WIDTH + 1) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellMark {
    Enabled,
    Disabled,
    Endpoint,
    InRange,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    month_names: Vec<String>,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        let month_names = match cfg.get("picker.months") {
            Some(raw) => parse_month_names(&raw)?,
            None => default_month_names(),
        };

        Ok(Self { color, month_names })
    }

    /// No color, English month names.
    pub fn plain() -> Self {
        Self {
            color: false,
            month_names: default_month_names(),
        }
    }

    pub fn month_name(&self, month: Month) -> &str {
        let idx = month.number_from_month() as usize - 1;
        self.month_names.get(idx).map(String::as_str).unwrap_or_else(|| month.name())
    }

    pub fn month_title(&self, year: i32, month: Month) -> String {
        format!("{} {year}", self.month_name(month))
    }

    /// The bare generator output: weekends marked, nothing selected.
    #[tracing::instrument(skip(self, grid), fields(year = grid.year, month = ?grid.month))]
    pub fn print_grid(&self, grid: &MonthGrid) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_grid(&mut out, grid)
    }

    pub fn write_grid<W: Write>(&self, mut writer: W, grid: &MonthGrid) -> anyhow::Result<()> {
        self.write_month(&mut writer, grid, |cell| {
            if cell.disabled {
                CellMark::Disabled
            } else {
                CellMark::Enabled
            }
        })
    }

    #[tracing::instrument(skip_all)]
    pub fn print_panel(&self, selector: &RangeSelector) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_panel(&mut out, selector)
    }

    /// Trigger label, then the open panel: title, year span and the grid
    /// with selection highlighting.
    pub fn write_panel<W: Write>(&self, mut writer: W, selector: &RangeSelector) -> anyhow::Result<()> {
        let state = selector.state();
        writeln!(writer, "{}", selector.trigger_label())?;
        if !state.is_open {
            return Ok(());
        }

        let years = selector.year_options();
        if let (Some(first), Some(last)) = (years.first(), years.last()) {
            writeln!(writer, "years {first}..{last}")?;
        }

        let grid = selector.grid();
        self.write_month(&mut writer, &grid, |cell| {
            let slot = Some(cell);
            let disabled = selector.is_date_disabled(slot);
            if state.is_start(slot) || state.is_end(slot) {
                CellMark::Endpoint
            } else if state.is_in_range(slot) && !disabled {
                CellMark::InRange
            } else if disabled {
                CellMark::Disabled
            } else {
                CellMark::Enabled
            }
        })
    }

    #[tracing::instrument(skip(self, presets, today))]
    pub fn print_presets(&self, presets: &[Preset], today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_presets(&mut out, presets, today)
    }

    pub fn write_presets<W: Write>(&self, writer: W, presets: &[Preset], today: NaiveDate) -> anyhow::Result<()> {
        let headers = vec!["Preset".to_string(), "Start".to_string(), "End".to_string()];
        let rows = presets
            .iter()
            .map(|preset| {
                let range = preset.resolve(today);
                vec![
                    self.paint(preset.label(), "33"),
                    format_iso(range.start),
                    range.end.map(format_iso).unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect();

        write_table(writer, headers, rows)
    }

    fn write_month<W, F>(&self, writer: &mut W, grid: &MonthGrid, classify: F) -> anyhow::Result<()>
    where
        W: Write,
        F: Fn(&CalendarCell) -> CellMark,
    {
        let title = self.month_title(grid.year, grid.month);
        writeln!(writer, "{}", center(&title, GRID_WIDTH))?;

        let header = WEEKDAY_LABELS
            .iter()
            .map(|label| format!("{label:<width$}", width = CELL_WIDTH))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{}", header.trim_end())?;

        for week in &grid.weeks {
            let line = week
                .iter()
                .map(|slot| match slot {
                    Some(cell) => self.format_cell(cell, classify(cell)),
                    None => " ".repeat(CELL_WIDTH),
                })
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(writer, "{}", line.trim_end())?;
        }

        Ok(())
    }

    fn format_cell(&self, cell: &CalendarCell, mark: CellMark) -> String {
        let day = cell.day;
        match mark {
            CellMark::Endpoint => self.paint(&format!("[{day:>2}]"), "44;97"),
            CellMark::InRange => self.paint(&format!("({day:>2})"), "34"),
            CellMark::Disabled => self.paint(&format!(" {day:>2}-"), "90"),
            CellMark::Enabled => format!(" {day:>2} "),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn default_month_names() -> Vec<String> {
    (1..=12u8)
        .filter_map(|n| Month::try_from(n).ok())
        .map(|month| month.name().to_string())
        .collect()
}

/// `picker.months` holds twelve comma-separated names, January first.
fn parse_month_names(raw: &str) -> anyhow::Result<Vec<String>> {
    let names: Vec<String> = raw.split(',').map(|name| name.trim().to_string()).collect();
    if names.len() != 12 || names.iter().any(String::is_empty) {
        return Err(anyhow!(
            "picker.months needs 12 non-empty comma-separated names, got {}",
            names.len()
        ));
    }
    Ok(names)
}

fn center(text: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(text);
    let left = width.saturating_sub(visible) / 2;
    format!("{}{text}", " ".repeat(left))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{Month, NaiveDate};

    use super::{Renderer, strip_ansi};
    use crate::config::Config;
    use crate::grid::generate;
    use crate::presets::PresetCatalog;
    use crate::selector::RangeSelector;

    fn render_to_string(f: impl FnOnce(&mut Vec<u8>) -> anyhow::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn grid_marks_weekends_and_pads_leading_days() {
        let renderer = Renderer::plain();
        let text = render_to_string(|buf| renderer.write_grid(buf, &generate(2024, Month::February)));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0].trim(), "February 2024");
        assert_eq!(lines[1], "Sun  Mon  Tue  Wed  Thu  Fri  Sat");
        assert_eq!(lines[2], "                      1    2    3-");
        assert_eq!(lines[3], "  4-   5    6    7    8    9   10-");
        assert_eq!(lines.len(), 2 + 5);
    }

    #[test]
    fn panel_highlights_selection() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).expect("today");
        let mut selector = RangeSelector::new(today);
        selector.open();
        selector.click_day(8);
        selector.click_day(13);

        let renderer = Renderer::plain();
        let text = render_to_string(|buf| renderer.write_panel(buf, &selector));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Fri Mar 08 2024 - Wed Mar 13 2024");
        assert_eq!(lines[1], "years 2019..2048");
        assert_eq!(lines[2].trim(), "March 2024");
        // Week of 3..9: 8 is the start, 9 is a weekend inside the range.
        assert_eq!(lines[5], "  3-   4-   5-   6-   7- [ 8]   9-");
        assert_eq!(lines[6], " 10- (11) (12) [13]  14   15   16-");
    }

    #[test]
    fn closed_panel_prints_only_trigger() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).expect("today");
        let selector = RangeSelector::new(today);
        let text = render_to_string(|buf| Renderer::plain().write_panel(buf, &selector));
        assert_eq!(text, "dd/mm/yy - dd/mm/yy\n");
    }

    #[test]
    fn month_names_come_from_config() {
        let mut cfg = Config::defaults();
        cfg.apply_overrides([(
            "picker.months".to_string(),
            "enero,febrero,marzo,abril,mayo,junio,julio,agosto,septiembre,octubre,noviembre,diciembre".to_string(),
        )]);
        let renderer = Renderer::new(&cfg).expect("renderer");
        assert_eq!(renderer.month_title(2024, Month::March), "marzo 2024");

        cfg.apply_overrides([("picker.months".to_string(), "uno,dos".to_string())]);
        assert!(Renderer::new(&cfg).is_err());
    }

    #[test]
    fn presets_table_lists_resolved_ranges() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 13).expect("today");
        let catalog = PresetCatalog::default();
        let text = render_to_string(|buf| Renderer::plain().write_presets(buf, &catalog.entries(), today));

        assert!(text.starts_with("Preset"));
        assert!(text.contains("this week    2024-03-10 2024-03-16"));
        assert!(text.contains("today        2024-03-13 -"));
        assert_eq!(strip_ansi("\x1b[33mtoday\x1b[0m"), "today");
    }
}
