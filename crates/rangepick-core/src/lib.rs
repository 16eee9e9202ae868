pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod grid;
pub mod hooks;
pub mod presets;
pub mod render;
pub mod selector;
pub mod session;

use std::ffi::OsString;

use clap::Parser;
use tracing::{
  debug,
  info
};

pub use grid::{
  CalendarCell,
  MonthGrid,
  WeekRow,
  generate
};
pub use selector::{
  ClickOutcome,
  Direction,
  RangeChange,
  RangeObserver,
  RangeSelector,
  SelectionState
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting rangepick"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rcfile.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let today = commands::resolve_today(
    &cfg,
    cli.today.as_deref()
  )?;
  debug!(%today, "resolved today");

  let renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  commands::dispatch(
    &cfg, &renderer, inv, today
  )?;

  info!("done");
  Ok(())
}
