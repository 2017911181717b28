//! Streaming a finished asset to local storage.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

use crate::transport::TransportError;
use crate::{Error, ErrorContext, Result};

/// Write buffer size; the body is never held in memory as a whole.
pub const CHUNK_SIZE: usize = 256 * 1024;

pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Where an asset ended up and how large it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedAsset {
    pub path: PathBuf,
    pub bytes: u64,
}

pub async fn download_asset(url: &str, target: impl AsRef<Path>) -> Result<DownloadedAsset> {
    download_asset_with_timeout(url, target, DEFAULT_DOWNLOAD_TIMEOUT).await
}

/// Stream `url` into `target`, creating parent directories as needed.
///
/// Bytes go to a `.part` sibling first and are renamed into place once the
/// body is complete, so `target` only ever holds a whole asset.
pub async fn download_asset_with_timeout(
    url: &str,
    target: impl AsRef<Path>,
    timeout: Duration,
) -> Result<DownloadedAsset> {
    let target = target.as_ref();
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| {
            Error::configuration_with_context(
                format!("failed to create download client: {}", e),
                ErrorContext::new().with_source("downloader"),
            )
        })?;

    info!(url, target = %target.display(), "downloading asset");
    let fail = |source: TransportError| Error::Download {
        url: url.to_string(),
        source,
    };

    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| fail(e.into()))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(fail(TransportError::Status {
            status: status.as_u16(),
            body: body.chars().take(512).collect(),
        }));
    }

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let partial = partial_path(target);
    let written = match write_body(resp, &partial, target).await {
        Ok(written) => written,
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(match e {
                BodyError::Stream(source) => fail(source),
                BodyError::Io(e) => e.into(),
            });
        }
    };

    info!(path = %target.display(), bytes = written, "asset saved");
    Ok(DownloadedAsset {
        path: target.to_path_buf(),
        bytes: written,
    })
}

enum BodyError {
    Stream(TransportError),
    Io(std::io::Error),
}

impl From<std::io::Error> for BodyError {
    fn from(e: std::io::Error) -> Self {
        BodyError::Io(e)
    }
}

/// Stream the body into `partial`, then move it onto `target`.
async fn write_body(
    resp: reqwest::Response,
    partial: &Path,
    target: &Path,
) -> std::result::Result<u64, BodyError> {
    let file = tokio::fs::File::create(partial).await?;
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
    let mut written: u64 = 0;
    let mut stream = resp.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| BodyError::Stream(e.into()))?;
        if chunk.is_empty() {
            continue;
        }
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;
    writer.into_inner().sync_all().await?;
    tokio::fs::rename(partial, target).await?;
    Ok(written)
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    target.with_file_name(name)
}
