// src/lib.rs

//! shrun: a declarative, YAML-driven shell-task orchestrator.
//!
//! A run description enumerates a sequence of tasks; each is either a leaf
//! shell command or a group whose children execute concurrently under a
//! bounded parallelism budget. The pipeline: assemble `$include` directives,
//! compile the description (defaults, `for-each` replicas, argument
//! substitution, tag filtering), download referenced assets, then execute
//! the plan while streaming per-process output, exfiltrating the child
//! shell's environment between serial tasks, and fanning lifecycle events
//! out to pluggable handlers.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

pub mod cli;
pub mod config;
pub mod download;
pub mod errors;
pub mod fs;
pub mod handler;
pub mod logging;
pub mod runtime;
pub mod types;

use cli::CliArgs;
use config::{assemble_includes, compile, CachePaths};
use download::{download_assets, HttpFetcher, LogProgress};
use errors::{Result, ShrunError};
use fs::{FileSystem, RealFileSystem};
use handler::TaskLogger;
use runtime::{Executor, FailureSummary, RuntimeContext};

/// Execute a run description end to end. Returns the process exit code:
/// zero when every task succeeded or failed with `ignore-failure`.
pub async fn run(args: CliArgs) -> Result<i32> {
    let selection = args.tag_selection()?;

    let filesystem = RealFileSystem;
    let source = filesystem.read(Path::new(&args.run_yaml)).map_err(|_| {
        ShrunError::ConfigError(format!("Unable to read yaml file: {}", args.run_yaml))
    })?;
    let assembled = assemble_includes(&source, &filesystem)?;
    let mut runbook = compile(&assembled, &args.args, &selection)?;

    let cache = CachePaths::new(&args.cache_dir);
    cache.ensure()?;

    let fetcher = HttpFetcher::new();
    download_assets(&mut runbook, &cache, &fetcher, &LogProgress).await?;

    if selection.is_empty() {
        info!("running all tasks");
    } else {
        let mode = if selection.only_tagged {
            "only matching tags"
        } else {
            "non-tagged and matching tags"
        };
        info!("running {}: {}", mode, selection.tags.join(", "));
    }

    let options = runbook.options.clone();

    let requires_sudo = runbook
        .tasks
        .iter()
        .any(|task| task.sudo || task.children.iter().any(|child| child.sudo));
    let sudo_password = if requires_sudo {
        capture_sudo_password()?
    } else {
        None
    };

    let log_path = options
        .log_path
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| cache.logs.join("run.log"));

    let context = Arc::new(RuntimeContext::new(sudo_password));
    let mut executor = Executor::new(runbook, cache, context);
    executor.estimate_runtime()?;
    executor.add_event_handler(Box::new(TaskLogger::new(&log_path)?));

    let statistics = executor.statistics();
    executor.run().await?;

    let stats = statistics.lock().unwrap_or_else(|e| e.into_inner());
    if !stats.failed.is_empty() {
        let report = failure_report(&stats.failed);
        info!("{}", report);
        if options.show_failure_report {
            print!("{}", report);
        }
    }

    Ok(if stats.fatal_failures() > 0 { 1 } else { 0 })
}

/// Render the post-run report of every failed task.
pub fn failure_report(failures: &[FailureSummary]) -> String {
    let mut report = String::from("Some tasks failed, see below for details.\n");
    for failure in failures {
        report.push('\n');
        report.push_str(&format!("• Failed task: {}\n", failure.name));
        report.push_str(&format!("  ├─ command: {}\n", failure.cmd));
        report.push_str(&format!("  ├─ return code: {}\n", failure.return_code));
        report.push_str(&format!("  └─ stderr: {}\n", failure.stderr));
    }
    report
}

/// Capture the sudo password once, before the first runner that needs it.
///
/// Probes `sudo -Sn` first; when passwordless sudo is available no prompt is
/// shown. A supplied password is verified before it is accepted.
fn capture_sudo_password() -> Result<Option<String>> {
    let probe = std::process::Command::new("sh")
        .arg("-c")
        .arg("sudo -Sn true")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .context("probing sudo access")?;
    if probe.success() {
        return Ok(None);
    }

    eprint!("sudo password required: ");
    let mut password = String::new();
    std::io::stdin()
        .read_line(&mut password)
        .context("reading sudo password")?;
    let password = password.trim_end_matches(['\n', '\r']).to_string();

    let mut verify = std::process::Command::new("sh")
        .arg("-c")
        .arg("sudo -S true")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("verifying sudo password")?;
    if let Some(mut stdin) = verify.stdin.take() {
        let _ = stdin.write_all(format!("{}\n", password).as_bytes());
    }
    let verified = verify.wait().context("verifying sudo password")?;
    if !verified.success() {
        return Err(ShrunError::ConfigError(
            "Given sudo password did not work.".to_string(),
        ));
    }

    Ok(Some(password))
}
