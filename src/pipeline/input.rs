//! Input resolution: turn a user-supplied path or URL into an HTML string.
//!
//! HTML is small enough to hold in memory, so URLs are downloaded straight
//! into a `String`. Bytes that are not valid UTF-8 are decoded lossily; the
//! model tolerates the odd replacement character far better than a failed
//! conversion.

use crate::error::Html2MdError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the HTML named by `input`: a local file or an HTTP/HTTPS URL.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<String, Html2MdError> {
    if input.trim().is_empty() {
        return Err(Html2MdError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<String, Html2MdError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Html2MdError::PermissionDenied { path });
        }
        Err(_) => return Err(Html2MdError::FileNotFound { path }),
    };

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<String, Html2MdError> {
    info!("Downloading HTML from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Html2MdError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let timeout_or_failure = |e: reqwest::Error| {
        if e.is_timeout() {
            Html2MdError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Html2MdError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(timeout_or_failure)?;

    if !response.status().is_success() {
        return Err(Html2MdError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(timeout_or_failure)?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
