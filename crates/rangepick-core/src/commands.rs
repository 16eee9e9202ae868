use std::io::{self, Read};

use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::{month_from_number, parse_date_expr, parse_month_expr, today};
use crate::grid::generate;
use crate::hooks::{HookObserver, HookRunner};
use crate::presets::PresetCatalog;
use crate::render::Renderer;
use crate::selector::{ClickOutcome, DEFAULT_YEAR_COUNT, DEFAULT_YEARS_BEFORE, MAX_YEAR_COUNT, RangeChange, RangeSelector};
use crate::session::{self, ActionResult, Session};

pub fn known_command_names() -> Vec<&'static str> {
    vec!["grid", "pick", "presets", "help", "version"]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// "today" for this run: `--today`, then `picker.today`, then the clock.
pub fn resolve_today(cfg: &Config, cli_today: Option<&str>) -> anyhow::Result<NaiveDate> {
    let clock = today();
    let expr = cli_today.map(str::to_string).or_else(|| cfg.get("picker.today"));
    match expr {
        Some(expr) => parse_date_expr(&expr, clock).with_context(|| format!("invalid today override: {expr}")),
        None => Ok(clock),
    }
}

#[instrument(skip(cfg, renderer, inv))]
pub fn dispatch(cfg: &Config, renderer: &Renderer, inv: Invocation, today: NaiveDate) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, "dispatching command");

    match command {
        "grid" => cmd_grid(renderer, &inv.command_args, today),
        "pick" => cmd_pick(cfg, renderer, &inv.command_args, today),
        "presets" => cmd_presets(cfg, renderer, today),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(renderer, args))]
fn cmd_grid(renderer: &Renderer, args: &[String], today: NaiveDate) -> anyhow::Result<()> {
    info!("command grid");

    let json = args.iter().any(|arg| arg == "--json");
    let positional: Vec<&str> = args.iter().map(String::as_str).filter(|arg| *arg != "--json").collect();

    let (year, month) = match positional.as_slice() {
        [] => (
            today.year(),
            month_from_number(today.month()).ok_or_else(|| anyhow!("invalid month in {today}"))?,
        ),
        [target] => parse_month_expr(target, today)?,
        [year, month] => {
            let year: i32 = year.parse().with_context(|| format!("invalid year: {year}"))?;
            let number: u32 = month.parse().with_context(|| format!("invalid month: {month}"))?;
            let month = month_from_number(number).ok_or_else(|| anyhow!("month out of range 1-12: {number}"))?;
            parse_month_expr(&format!("{year}-{}", month.number_from_month()), today)?
        }
        _ => return Err(anyhow!("usage: rangepick grid [YYYY-MM | MONTH | YEAR MONTH] [--json]")),
    };

    let grid = generate(year, month);
    if json {
        println!("{}", serde_json::to_string(&grid)?);
    } else {
        renderer.print_grid(&grid)?;
    }
    Ok(())
}

/// Selector wired to stdout and hooks, with the configured preset applied.
#[instrument(skip(cfg))]
pub fn build_session(cfg: &Config, today: NaiveDate) -> anyhow::Result<Session> {
    let years_before = cfg
        .get_parsed::<i32>("picker.years.before")?
        .unwrap_or(DEFAULT_YEARS_BEFORE);
    let year_count = cfg
        .get_parsed::<usize>("picker.years.count")?
        .unwrap_or(DEFAULT_YEAR_COUNT);
    if year_count > MAX_YEAR_COUNT {
        return Err(anyhow!("picker.years.count must be at most {MAX_YEAR_COUNT}, got {year_count}"));
    }

    let mut selector = RangeSelector::new(today).with_year_window(years_before, year_count);
    selector.on_change(|change: &RangeChange| match change.to_json_line() {
        Ok(line) => println!("{line}"),
        Err(err) => warn!(error = %err, "failed to encode range change"),
    });
    selector.on_change(HookObserver::new(HookRunner::new(cfg)));

    let mut session = Session::new(selector, load_presets(cfg)?);
    if let Some(label) = cfg.get("picker.preset") {
        session
            .apply_preset(&label)
            .with_context(|| format!("failed to apply picker.preset '{label}'"))?;
    }
    Ok(session)
}

fn load_presets(cfg: &Config) -> anyhow::Result<PresetCatalog> {
    match cfg.get_path("picker.presets.file") {
        Some(path) => PresetCatalog::load(&path),
        None => Ok(PresetCatalog::default()),
    }
}

#[instrument(skip(cfg, renderer, args))]
fn cmd_pick(cfg: &Config, renderer: &Renderer, args: &[String], today: NaiveDate) -> anyhow::Result<()> {
    info!("command pick");

    let actions = if args.is_empty() {
        let mut script = String::new();
        io::stdin()
            .read_to_string(&mut script)
            .context("failed to read actions from stdin")?;
        session::parse_script(&script)?
    } else {
        session::parse_tokens(args)?
    };

    let mut session = build_session(cfg, today)?;
    debug!(count = actions.len(), "running actions");

    for action in &actions {
        match session.apply(action)? {
            ActionResult::Clicked(ClickOutcome::Ignored(reason)) => {
                debug!(%action, %reason, "action had no effect");
            }
            ActionResult::ShowRequested => renderer.print_panel(session.selector())?,
            ActionResult::Clicked(_) | ActionResult::Updated => {}
        }
    }

    if session.selector().state().is_open {
        renderer.print_panel(session.selector())?;
    }
    Ok(())
}

#[instrument(skip(cfg, renderer))]
fn cmd_presets(cfg: &Config, renderer: &Renderer, today: NaiveDate) -> anyhow::Result<()> {
    info!("command presets");
    let catalog = load_presets(cfg)?;
    renderer.print_presets(&catalog.entries(), today)
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "\
usage: rangepick [-v|-q] [--rcfile PATH] [--rc KEY=VALUE] [--today DATE] <command> [args]

commands:
  grid [YYYY-MM | MONTH | YEAR MONTH] [--json]
      print a month grid; weekends are marked as disabled
  pick [ACTION ...]
      run picker actions (from arguments, or one per line on stdin)
      and print every committed range as a JSON line
  presets
      list quick-select presets and the ranges they resolve to today
  help | version

actions:
  click DAY | click YYYY-MM-DD   next | prev   year YYYY   goto YYYY-MM|MONTH
  clear   open   close | done   toggle   preset LABEL   show

cells:
  [dd] start/end   (dd) in range   dd- disabled"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{build_session, expand_command_abbrev, known_command_names, resolve_today};
    use crate::config::Config;

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("g", &known), Some("grid"));
        assert_eq!(expand_command_abbrev("pr", &known), Some("presets"));
        assert_eq!(expand_command_abbrev("p", &known), None);
        assert_eq!(expand_command_abbrev("version", &known), Some("version"));
    }

    #[test]
    fn today_override_comes_from_config() {
        let mut cfg = Config::defaults();
        cfg.apply_overrides([("picker.today".to_string(), "2024-03-08".to_string())]);
        assert_eq!(
            resolve_today(&cfg, None).expect("today"),
            NaiveDate::from_ymd_opt(2024, 3, 8).expect("date")
        );
        assert_eq!(
            resolve_today(&cfg, Some("2025-01-02")).expect("today"),
            NaiveDate::from_ymd_opt(2025, 1, 2).expect("date")
        );
        assert!(resolve_today(&cfg, Some("whenever")).is_err());
    }

    #[test]
    fn configured_preset_prefills_the_session() {
        let mut cfg = Config::defaults();
        cfg.apply_overrides([
            ("hooks".to_string(), "off".to_string()),
            ("picker.preset".to_string(), "this week".to_string()),
            ("picker.years.count".to_string(), "3".to_string()),
        ]);
        let today = NaiveDate::from_ymd_opt(2024, 3, 13).expect("date");
        let session = build_session(&cfg, today).expect("session");
        let state = session.selector().state();

        assert_eq!(state.start, NaiveDate::from_ymd_opt(2024, 3, 10));
        assert_eq!(state.end, NaiveDate::from_ymd_opt(2024, 3, 16));
        assert_eq!(session.selector().year_options().len(), 3);
    }

    #[test]
    fn unknown_configured_preset_is_an_error() {
        let mut cfg = Config::defaults();
        cfg.apply_overrides([
            ("hooks".to_string(), "off".to_string()),
            ("picker.preset".to_string(), "fortnight".to_string()),
        ]);
        let today = NaiveDate::from_ymd_opt(2024, 3, 13).expect("date");
        assert!(build_session(&cfg, today).is_err());
    }

    #[test]
    fn oversized_year_count_is_rejected() {
        let mut cfg = Config::defaults();
        cfg.apply_overrides([
            ("hooks".to_string(), "off".to_string()),
            ("picker.years.count".to_string(), "4000000000".to_string()),
        ]);
        let today = NaiveDate::from_ymd_opt(2024, 3, 13).expect("date");
        let err = build_session(&cfg, today).expect_err("count too large");
        assert!(err.to_string().contains("picker.years.count"));
    }
}
