// src/download/progress.rs

//! Progress reporting for concurrent asset downloads.

use tracing::{info, warn};

/// Observer for download lifecycle. The UI layer provides its own
/// implementation; the default logs through `tracing`.
pub trait DownloadProgress: Send + Sync {
    fn started(&self, url: &str);
    fn finished(&self, url: &str);
    fn failed(&self, url: &str, message: &str);
}

/// Progress reporter that writes to the log.
#[derive(Debug, Default)]
pub struct LogProgress;

impl DownloadProgress for LogProgress {
    fn started(&self, url: &str) {
        info!(url, "downloading asset");
    }

    fn finished(&self, url: &str) {
        info!(url, "asset download complete");
    }

    fn failed(&self, url: &str, message: &str) {
        warn!(url, message, "asset download failed");
    }
}
