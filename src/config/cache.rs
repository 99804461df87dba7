// src/config/cache.rs

//! Cache root layout and the persisted ETA cache.
//!
//! The cache root (default `./.shrun`) holds `downloads/` for fetched assets,
//! `logs/` for run transcripts, and an `eta` file with the serialized
//! command-to-duration mapping. Missing directories are created on demand.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use tracing::warn;

use crate::errors::Result;

/// Locations derived from the cache root.
#[derive(Debug, Clone)]
pub struct CachePaths {
    pub root: PathBuf,
    pub downloads: PathBuf,
    pub logs: PathBuf,
    pub eta: PathBuf,
}

impl CachePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            downloads: root.join("downloads"),
            logs: root.join("logs"),
            eta: root.join("eta"),
            root,
        }
    }

    /// Create the cache directories if they do not already exist.
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.root, &self.downloads, &self.logs] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating cache directory {:?}", dir))?;
        }
        Ok(())
    }
}

/// Mapping from command string to its last observed wall-clock duration.
#[derive(Debug, Clone, Default)]
pub struct EtaCache {
    entries: HashMap<String, Duration>,
}

impl EtaCache {
    /// Load the cache from `path`. A missing file yields an empty cache;
    /// an unreadable or corrupt file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(path).with_context(|| format!("reading eta cache {:?}", path))?;
        let entries: HashMap<String, Duration> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing eta cache {:?}", path))?;
        Ok(Self { entries })
    }

    /// Persist the cache to `path`. Best-effort; failure is logged.
    pub fn save(&self, path: &Path) {
        let result = serde_json::to_vec(&self.entries)
            .context("serializing eta cache")
            .and_then(|bytes| {
                fs::write(path, bytes).with_context(|| format!("writing eta cache {:?}", path))
            });
        if let Err(error) = result {
            warn!("unable to persist eta cache: {:#}", error);
        }
    }

    pub fn get(&self, cmd: &str) -> Option<Duration> {
        self.entries.get(cmd).copied()
    }

    pub fn set(&mut self, cmd: &str, duration: Duration) {
        self.entries.insert(cmd.to_string(), duration);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
