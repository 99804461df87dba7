// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::errors::{Result, ShrunError};
use crate::types::TagSelection;

/// Command-line arguments for `shrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "shrun",
    version,
    about = "Execute a YAML-described list of shell tasks.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the run description (YAML).
    #[arg(value_name = "RUN_YAML")]
    pub run_yaml: String,

    /// Positional arguments substituted into task commands as $1..$N and $*.
    #[arg(value_name = "ARGS", trailing_var_arg = true)]
    pub args: Vec<String>,

    /// A comma delimited list of matching task tags. If a task's tag matches
    /// *or if it is not tagged* then it will be executed (also see --only-tags).
    #[arg(long, value_name = "TAGS")]
    pub tags: Option<String>,

    /// A comma delimited list of matching task tags. A task will only be
    /// executed if it has a matching tag.
    #[arg(long, value_name = "TAGS")]
    pub only_tags: Option<String>,

    /// Directory for downloaded assets, run logs, and the ETA cache.
    #[arg(long, value_name = "PATH", default_value = ".shrun")]
    pub cache_dir: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SHRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl CliArgs {
    /// Turn the `--tags` / `--only-tags` flags into a tag selection.
    ///
    /// The two flags are mutually exclusive; `--only-tags` additionally
    /// excludes untagged tasks.
    pub fn tag_selection(&self) -> Result<TagSelection> {
        if self.tags.is_some() && self.only_tags.is_some() {
            return Err(ShrunError::ConfigError(
                "Options 'tags' and 'only-tags' are mutually exclusive.".to_string(),
            ));
        }

        let (raw, only_tagged) = match (&self.tags, &self.only_tags) {
            (Some(t), None) => (t.as_str(), false),
            (None, Some(t)) => (t.as_str(), true),
            _ => ("", false),
        };

        let tags: Vec<String> = raw
            .split(',')
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string())
            .collect();

        Ok(TagSelection { tags, only_tagged })
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
