//! Model downloader for MusicGen ONNX models.
//!
//! Fetches missing files from HuggingFace before the sessions are loaded.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{ComposerError, Result};

use super::loader::{missing_model_files, model_url, OPTIONAL_MODEL_FILES};

/// Per-request timeout. The decoder weights are several hundred megabytes.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(3600);

const CHUNK_SIZE: usize = 64 * 1024;

/// Downloads every required model file that is not present.
///
/// Optional files are fetched too, but failing to get one is only logged.
pub fn ensure_models(model_dir: &Path) -> Result<()> {
    fs::create_dir_all(model_dir).map_err(|e| {
        ComposerError::model_download_failed(format!(
            "Failed to create model directory {}: {}",
            model_dir.display(),
            e
        ))
    })?;

    let missing = missing_model_files(model_dir);
    if missing.is_empty() {
        debug!(dir = %model_dir.display(), "all model files present");
        return Ok(());
    }

    info!(count = missing.len(), dir = %model_dir.display(), "downloading model files");

    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|e| {
            ComposerError::model_download_failed(format!("Failed to create HTTP client: {}", e))
        })?;

    for file in missing {
        let url = model_url(file).ok_or_else(|| {
            ComposerError::model_download_failed(format!("No download URL for {}", file))
        })?;
        download_file(&client, url, &model_dir.join(file))?;
    }

    for file in OPTIONAL_MODEL_FILES {
        let dest = model_dir.join(file);
        if dest.exists() {
            continue;
        }
        if let Some(url) = model_url(file) {
            if let Err(e) = download_file(&client, url, &dest) {
                warn!(file, error = %e, "optional model file not downloaded");
            }
        }
    }

    info!("model download complete");
    Ok(())
}

/// Streams `url` into `dest` through a `.part` file renamed on completion.
fn download_file(client: &reqwest::blocking::Client, url: &str, dest: &Path) -> Result<()> {
    let partial = dest.with_extension("part");
    let result = stream_to(client, url, &partial).and_then(|bytes| {
        fs::rename(&partial, dest).map_err(|e| {
            ComposerError::model_download_failed(format!(
                "Failed to move {} into place: {}",
                dest.display(),
                e
            ))
        })?;
        Ok(bytes)
    });

    match result {
        Ok(bytes) => {
            info!(
                file = %dest.display(),
                size_mb = bytes as f64 / (1024.0 * 1024.0),
                "downloaded"
            );
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}

fn stream_to(client: &reqwest::blocking::Client, url: &str, path: &Path) -> Result<u64> {
    let mut response = client.get(url).send().map_err(|e| {
        ComposerError::model_download_failed(format!("Failed to download {}: {}", url, e))
    })?;

    if !response.status().is_success() {
        return Err(ComposerError::model_download_failed(format!(
            "HTTP {} for {}",
            response.status(),
            url
        )));
    }

    let total = response.content_length().unwrap_or(0);
    let mut file = fs::File::create(path).map_err(|e| {
        ComposerError::model_download_failed(format!(
            "Failed to create file {}: {}",
            path.display(),
            e
        ))
    })?;

    let mut downloaded: u64 = 0;
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut last_logged = 0;

    loop {
        let n = response.read(&mut buffer).map_err(|e| {
            ComposerError::model_download_failed(format!("Failed to read response: {}", e))
        })?;
        if n == 0 {
            break;
        }

        file.write_all(&buffer[..n]).map_err(|e| {
            ComposerError::model_download_failed(format!("Failed to write file: {}", e))
        })?;
        downloaded += n as u64;

        if total > 0 {
            let percent = downloaded * 100 / total;
            if percent >= last_logged + 10 {
                debug!(url, percent, "download progress");
                last_logged = percent;
            }
        }
    }

    file.flush().map_err(|e| {
        ComposerError::model_download_failed(format!("Failed to flush file: {}", e))
    })?;
    Ok(downloaded)
}
