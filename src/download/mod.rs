// src/download/mod.rs

//! Remote asset resolution.
//!
//! Before execution, every task carrying a `url` has the referenced asset
//! materialized under the download cache, made executable, optionally
//! MD5-verified, and bound into the task's command string through the exec
//! placeholder. URLs are deduplicated so each asset is fetched at most once.

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use futures::stream::{self, StreamExt};
use md5::{Digest, Md5};
use tracing::{debug, error};

use crate::config::{CachePaths, Runbook, TaskConfig};
use crate::errors::{Result, ShrunError};

pub mod fetcher;
pub mod progress;

pub use fetcher::{AssetFetcher, HttpFetcher};
pub use progress::{DownloadProgress, LogProgress};

/// Resolve every asset referenced by the plan and rewrite the bound tasks.
///
/// Fetches run concurrently up to the plan's parallelism cap. Any transport
/// failure, bad HTTP status, or checksum mismatch is fatal; failures across
/// the batch are aggregated so every broken URL is reported.
pub async fn download_assets(
    runbook: &mut Runbook,
    paths: &CachePaths,
    fetcher: &dyn AssetFetcher,
    progress: &dyn DownloadProgress,
) -> Result<()> {
    // url -> (destination, declared md5 digests)
    let mut assets: BTreeMap<String, (PathBuf, Vec<String>)> = BTreeMap::new();
    for task in tasks_with_urls(&runbook.tasks) {
        let url = task.url.clone().unwrap_or_default();
        let dest = paths.downloads.join(url_filename(&url)?);
        let entry = assets.entry(url).or_insert_with(|| (dest, Vec::new()));
        if let Some(md5) = &task.md5 {
            entry.1.push(md5.clone());
        }
    }

    if assets.is_empty() {
        return Ok(());
    }

    let mut seen_filenames: Vec<&Path> = Vec::new();
    for (dest, _) in assets.values() {
        if seen_filenames.contains(&dest.as_path()) {
            return Err(ShrunError::ConfigError(
                "Two different urls map to the same filename".to_string(),
            ));
        }
        seen_filenames.push(dest);
    }

    let mut pending = Vec::new();
    for (url, (dest, digests)) in &assets {
        if dest.exists() {
            // cache hit, but never trust a stale or tampered asset
            verify_digests(dest, digests)?;
            debug!(url, "asset already cached");
        } else {
            pending.push((url.as_str(), dest.as_path()));
        }
    }

    let failures: Vec<String> = stream::iter(pending)
        .map(|(url, dest)| async move {
            progress.started(url);
            match fetcher.fetch(url, dest).await {
                Ok(()) => {
                    progress.finished(url);
                    None
                }
                Err(err) => {
                    let message = format!("Failed to download '{}': {}", url, err);
                    progress.failed(url, &message);
                    Some(message)
                }
            }
        })
        .buffer_unordered(runbook.options.max_parallel_commands.max(1))
        .filter_map(|failure| async move { failure })
        .collect()
        .await;

    if !failures.is_empty() {
        for failure in &failures {
            error!("{}", failure);
        }
        return Err(ShrunError::AssetError("Asset download failed".to_string()));
    }

    for (dest, digests) in assets.values() {
        make_executable(dest)?;
        verify_digests(dest, digests)?;
    }

    let pattern = runbook.options.exec_replace_pattern.clone();
    let bind = |task: &mut TaskConfig| {
        let url = task.url.clone().unwrap_or_default();
        if let Some((dest, _)) = assets.get(&url) {
            bind_exec(task, &pattern, &dest.to_string_lossy());
        }
    };
    for task in &mut runbook.tasks {
        for child in &mut task.children {
            if child.url.is_some() {
                bind(child);
            }
        }
        if task.url.is_some() {
            bind(task);
        }
    }

    Ok(())
}

/// Substitute the exec placeholder in `task`'s command with the local asset
/// path. An empty command becomes the placeholder first, so the downloaded
/// artifact is itself executed.
pub fn bind_exec(task: &mut TaskConfig, pattern: &str, exec_path: &str) {
    if task.cmd.is_empty() {
        task.cmd = pattern.to_string();
    }
    task.cmd = task.cmd.replace(pattern, exec_path);
    task.url = task.url.as_ref().map(|url| url.replace(pattern, exec_path));
}

/// The last path segment of the URL names the cached file.
fn url_filename(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|err| ShrunError::ConfigError(format!("Unable to parse url '{}': {}", url, err)))?;
    let name = parsed
        .path_segments()
        .and_then(|segments| segments.last().map(str::to_string))
        .unwrap_or_default();
    if name.is_empty() {
        return Err(ShrunError::ConfigError(format!(
            "Url '{}' has no filename component",
            url,
        )));
    }
    Ok(name)
}

fn verify_digests(path: &Path, digests: &[String]) -> Result<()> {
    if digests.is_empty() {
        return Ok(());
    }
    let actual = md5_of_file(path)?;
    for expected in digests {
        if expected != &actual {
            return Err(ShrunError::AssetError(format!(
                "Asset '{}' checksum failed. Expected: {} Got: {}",
                path.display(),
                expected,
                actual,
            )));
        }
    }
    Ok(())
}

fn md5_of_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("reading asset {:?}", path))?;
    let mut hasher = Md5::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn make_executable(path: &Path) -> Result<()> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .with_context(|| format!("marking asset executable {:?}", path))?;
    Ok(())
}

fn tasks_with_urls(tasks: &[TaskConfig]) -> impl Iterator<Item = &TaskConfig> {
    tasks
        .iter()
        .flat_map(|task| std::iter::once(task).chain(task.children.iter()))
        .filter(|task| task.url.is_some())
}
