use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, resolve_hooks_dir};
use crate::selector::{RangeChange, RangeObserver};

const ON_CHANGE_EVENT: &str = "on-change";

/// Runs `on-change.*` scripts from the hooks directory with each committed
/// range as one JSON line on stdin.
#[derive(Debug, Clone)]
pub struct HookRunner {
    hooks_dir: Option<PathBuf>,
}

impl HookRunner {
    pub fn new(cfg: &Config) -> Self {
        let hooks_dir = resolve_hooks_dir(cfg);
        debug!(
            enabled = hooks_dir.is_some(),
            hooks_dir = ?hooks_dir,
            "initialized hook runner"
        );
        Self { hooks_dir }
    }

    pub fn with_dir(hooks_dir: impl Into<PathBuf>) -> Self {
        Self {
            hooks_dir: Some(hooks_dir.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { hooks_dir: None }
    }

    #[instrument(skip(self, change), fields(start = %change.start, end = %change.end))]
    pub fn run_on_change(&self, change: &RangeChange) -> anyhow::Result<usize> {
        let Some(dir) = self.hooks_dir.as_deref() else {
            debug!("hooks disabled; skipping on-change");
            return Ok(0);
        };

        let scripts = list_scripts(dir, ON_CHANGE_EVENT)?;
        debug!(count = scripts.len(), "running on-change hooks");
        let payload = change.to_json_line()?;
        for script in &scripts {
            run_hook_with_json_line(script, &payload)?;
        }
        Ok(scripts.len())
    }
}

/// Adapts a [`HookRunner`] to the selector's observer seam. Failures are
/// logged; a broken hook never undoes a selection.
#[derive(Debug, Clone)]
pub struct HookObserver {
    runner: HookRunner,
}

impl HookObserver {
    pub fn new(runner: HookRunner) -> Self {
        Self { runner }
    }
}

impl RangeObserver for HookObserver {
    fn on_change(&mut self, change: &RangeChange) {
        if let Err(err) = self.runner.run_on_change(change) {
            warn!(error = %format!("{err:#}"), "on-change hook failed");
        }
    }
}

#[instrument]
fn list_scripts(hooks_dir: &Path, event: &str) -> anyhow::Result<Vec<PathBuf>> {
    if !hooks_dir.exists() {
        return Ok(Vec::new());
    }

    let mut scripts = Vec::new();
    for entry in fs::read_dir(hooks_dir)
        .with_context(|| format!("failed to read hooks dir {}", hooks_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !name.starts_with(&format!("{event}.")) {
            continue;
        }

        if !is_executable(&path)? {
            debug!(path = %path.display(), "skipping non-executable hook");
            continue;
        }

        debug!(event, path = %path.display(), "selected hook script");
        scripts.push(path);
    }

    scripts.sort();
    Ok(scripts)
}

fn run_hook_with_json_line(path: &Path, line: &str) -> anyhow::Result<()> {
    info!(hook = %path.display(), "running hook");
    let mut child = Command::new(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to run hook {}", path.display()))?;

    if let Some(mut stdin) = child.stdin.take() {
        writeln!(stdin, "{line}")?;
    }

    let output = child
        .wait_with_output()
        .with_context(|| format!("failed to wait for hook {}", path.display()))?;

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !output.status.success() {
        if !stderr.is_empty() {
            warn!(hook = %path.display(), stderr = %stderr, "hook failed");
        }
        return Err(anyhow!(
            "Hook Error: script {} failed with status {}",
            path.display(),
            output
                .status
                .code()
                .map(|code| code.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        ));
    }

    if !stderr.is_empty() {
        warn!(hook = %path.display(), stderr = %stderr, "hook wrote stderr");
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines().map(str::trim).filter(|line| !line.is_empty()) {
        debug!(hook = %path.display(), output = %line, "hook output");
    }

    Ok(())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> anyhow::Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(path)?.permissions().mode();
    Ok(mode & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> anyhow::Result<bool> {
    Ok(path.is_file())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use super::{HookObserver, HookRunner};
    use crate::selector::{ClickOutcome, RangeChange, RangeSelector};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn change() -> RangeChange {
        RangeChange::new(date(2024, 3, 8), date(2024, 3, 11))
    }

    #[test]
    fn disabled_runner_runs_nothing() {
        assert_eq!(HookRunner::disabled().run_on_change(&change()).expect("run"), 0);
    }

    #[test]
    fn missing_dir_is_not_an_error() {
        let temp = tempdir().expect("tempdir");
        let runner = HookRunner::with_dir(temp.path().join("absent"));
        assert_eq!(runner.run_on_change(&change()).expect("run"), 0);
    }

    #[cfg(unix)]
    #[test]
    fn on_change_scripts_receive_the_json_line() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().expect("tempdir");
        let hooks = temp.path().join("hooks");
        fs::create_dir_all(&hooks).expect("hooks dir");
        let out = temp.path().join("received.json");

        let script = hooks.join("on-change.record");
        fs::write(&script, format!("#!/bin/sh\ncat > '{}'\n", out.display())).expect("write hook");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");

        let ignored = hooks.join("on-launch.noop");
        fs::write(&ignored, "#!/bin/sh\nexit 1\n").expect("write other hook");
        fs::set_permissions(&ignored, fs::Permissions::from_mode(0o755)).expect("chmod");

        let runner = HookRunner::with_dir(&hooks);
        assert_eq!(runner.run_on_change(&change()).expect("run"), 1);

        let received = fs::read_to_string(&out).expect("hook output");
        assert_eq!(
            received.trim(),
            r#"[["2024-03-08","2024-03-11"],["2024-03-09","2024-03-10"]]"#
        );
    }

    #[cfg(unix)]
    #[test]
    fn failing_script_reports_hook_error() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().expect("tempdir");
        let script = temp.path().join("on-change.fail");
        fs::write(&script, "#!/bin/sh\ncat >/dev/null\necho nope >&2\nexit 3\n").expect("write hook");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");

        let err = HookRunner::with_dir(temp.path())
            .run_on_change(&change())
            .expect_err("hook should fail");
        assert!(err.to_string().contains("Hook Error"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_hook_does_not_block_the_selection() {
        use std::cell::RefCell;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::rc::Rc;

        let temp = tempdir().expect("tempdir");
        let script = temp.path().join("on-change.fail");
        fs::write(&script, "#!/bin/sh\ncat >/dev/null\nexit 3\n").expect("write hook");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut selector = RangeSelector::new(date(2024, 3, 1));
        selector.on_change(HookObserver::new(HookRunner::with_dir(temp.path())));
        selector.on_change(move |change: &RangeChange| sink.borrow_mut().push(change.clone()));

        assert!(matches!(selector.click_day(8), ClickOutcome::Started { .. }));
        let outcome = selector.click_day(11);
        assert_eq!(outcome, ClickOutcome::Completed(change()));
        assert_eq!(seen.borrow().as_slice(), &[change()]);
        assert_eq!(selector.state().end, Some(date(2024, 3, 11)));
    }
}
