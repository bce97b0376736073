use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::DeliveryError;

/// Sent with every fetch; some image hosts reject unknown clients.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Reserve a uniquely named file in `dir` with the given extension.
/// The file is created empty and survives until explicitly removed.
pub fn reserve_temp_path(dir: &Path, prefix: &str, extension: &str) -> Result<PathBuf, DeliveryError> {
    let path = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(&format!(".{}", extension))
        .tempfile_in(dir)?
        .into_temp_path()
        .keep()
        .map_err(|e| DeliveryError::Disk(e.error))?;
    Ok(path)
}

/// Path for a `file://` URL, `None` for anything else.
pub fn local_path(url: &str) -> Option<PathBuf> {
    let parsed = url::Url::parse(url).ok()?;
    if parsed.scheme() != "file" {
        return None;
    }
    parsed.to_file_path().ok()
}

/// Stream `url` into a new temp file in `dir`.
pub async fn fetch_to_temp(
    client: &Client,
    url: &str,
    dir: &Path,
    extension: &str,
) -> Result<PathBuf, DeliveryError> {
    fs::create_dir_all(dir).await?;
    let path = reserve_temp_path(dir, "framefeed-", extension)?;
    match stream_to(client, url, &path).await {
        Ok(bytes) => {
            tracing::debug!(url, bytes, path = %path.display(), "Fetched image");
            Ok(path)
        }
        Err(e) => {
            let _ = fs::remove_file(&path).await;
            Err(e)
        }
    }
}

async fn stream_to(client: &Client, url: &str, path: &Path) -> Result<u64, DeliveryError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| DeliveryError::Http {
            source: e,
            url: url.to_string(),
            bytes_written: 0,
        })?;

    if !response.status().is_success() {
        return Err(DeliveryError::HttpStatus {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }

    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .await?;

    let mut bytes_written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DeliveryError::Http {
            source: e,
            url: url.to_string(),
            bytes_written,
        })?;
        file.write_all(&chunk).await?;
        bytes_written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(bytes_written)
}
