use futures_util::StreamExt;
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::error::JobError;

/// Streams `url` into `dest`, creating parent directories. Returns the number
/// of bytes written.
pub async fn download_source(
    http: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<u64, JobError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            JobError::Acquisition(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }

    let response = http
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| JobError::Acquisition(e.without_url().to_string()))?;

    let mut file = File::create(dest)
        .await
        .map_err(|e| JobError::Acquisition(format!("cannot create {}: {}", dest.display(), e)))?;

    let mut written = 0u64;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| JobError::Acquisition(e.without_url().to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| JobError::Acquisition(format!("write to {} failed: {}", dest.display(), e)))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| JobError::Acquisition(format!("flush of {} failed: {}", dest.display(), e)))?;

    info!("⬇️ Downloaded {} bytes to {}", written, dest.display());
    Ok(written)
}
