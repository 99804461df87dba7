use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use shrun::download::AssetFetcher;
use shrun::errors::{Result, ShrunError};

/// An in-memory fetcher that serves assets from a map and records every
/// fetched URL, so tests can assert on deduplication.
#[derive(Default)]
pub struct MemoryFetcher {
    assets: HashMap<String, Vec<u8>>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.assets.insert(url.to_string(), body.into());
        self
    }

    /// URLs fetched so far, in request order.
    pub fn fetched(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.fetched)
    }
}

impl AssetFetcher for MemoryFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        dest: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.fetched.lock().unwrap().push(url.to_string());
            let body = self.assets.get(url).ok_or_else(|| {
                ShrunError::AssetError(format!(
                    "Failed to download '{}': bad HTTP response code (404)",
                    url,
                ))
            })?;
            std::fs::write(dest, body).map_err(ShrunError::from)
        })
    }
}
