// src/download/fetcher.rs

//! HTTP transfer of a single asset.
//!
//! The downloader talks to an [`AssetFetcher`] instead of a raw HTTP client
//! so tests can serve assets from memory without a network.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use anyhow::Context;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::errors::{Result, ShrunError};

/// Trait abstracting how a URL's bytes reach a local file.
pub trait AssetFetcher: Send + Sync {
    /// Fetch `url` and write its body to `dest`.
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        dest: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Fetcher backed by a shared `reqwest` client.
#[derive(Debug, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    async fn fetch_inner(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("requesting {}", url))?;

        let status = response.status().as_u16();
        if !(200..400).contains(&status) {
            return Err(ShrunError::AssetError(format!(
                "Failed to download '{}': bad HTTP response code ({})",
                url, status,
            )));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("creating {:?}", dest))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("reading body of {}", url))?;
            file.write_all(&chunk)
                .await
                .with_context(|| format!("writing {:?}", dest))?;
        }
        file.flush().await.with_context(|| format!("flushing {:?}", dest))?;
        Ok(())
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        dest: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.fetch_inner(url, dest))
    }
}
