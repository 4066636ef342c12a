use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Retrieves a URL into a local file.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<()>;
}

pub struct Downloader {
    client: Client,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub async fn download_file(&self, url: &str, destination: &Path) -> Result<()> {
        tracing::info!("Downloading {} to {}", url, destination.display());

        // 确保目标目录存在
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut response = self.client.get(url).send().await?.error_for_status()?;
        if response.url().as_str() != url {
            tracing::debug!("Redirected to {}", response.url());
        }

        let progress = match response.content_length() {
            Some(len) => ProgressBar::new(len).with_style(
                ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} ({eta})")
                    .map_err(|e| Error::Execution(e.to_string()))?,
            ),
            None => ProgressBar::new_spinner(),
        };

        let mut file = File::create(destination).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            progress.inc(chunk.len() as u64);
        }
        file.flush().await?;
        progress.finish_and_clear();

        tracing::debug!("Download completed successfully");
        Ok(())
    }
}

impl Fetch for Downloader {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<()> {
        self.download_file(url, destination).await
    }
}
