//! JSON output for finished crawl runs.
//!
//! # Output Structure
//!
//! ```text
//! results_dir/
//! ├── video_info.json            # shared cache, reused across runs
//! └── {query}_{root}/
//!     ├── video_info.json
//!     ├── search_info.json
//!     └── params.json
//! ```
//!
//! A run directory is never overwritten. Its existence means the
//! exploration for that query/root pair already happened.

use crate::models::{RunResult, VideoInfo};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, instrument, warn};

pub const VIDEO_INFO_FILE: &str = "video_info.json";
pub const SEARCH_INFO_FILE: &str = "search_info.json";
pub const PARAMS_FILE: &str = "params.json";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("output directory {0} already exists")]
    AlreadyExists(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), OutputError> {
    let json = serde_json::to_string(value)?;
    fs::write(path, json).await?;
    info!(path = %path.display(), "Wrote JSON");
    Ok(())
}

/// Write the three run artifacts into a freshly created `out_dir`.
///
/// Parent directories are created as needed, but `out_dir` itself must not
/// exist yet.
///
/// # Arguments
///
/// * `result` - Video info, search tree and parameters of one finished run
/// * `out_dir` - Run directory, usually `{results_dir}/{query}_{root}`
///
/// # Returns
///
/// `Ok(())` when all three files are written, [`OutputError::AlreadyExists`]
/// when `out_dir` is already there, or the I/O or serialization error that
/// stopped the write.
///
/// # Output Path
///
/// `{out_dir}/video_info.json`, `{out_dir}/search_info.json` and `{out_dir}/params.json`
#[instrument(level = "info", skip_all, fields(out_dir = %out_dir.display()))]
pub async fn write_results(result: &RunResult, out_dir: &Path) -> Result<(), OutputError> {
    if let Some(parent) = out_dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    // Non-recursive create so an existing run directory is detected atomically.
    match fs::create_dir(out_dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            warn!("Run directory already exists; refusing to overwrite");
            return Err(OutputError::AlreadyExists(out_dir.to_path_buf()));
        }
        Err(e) => {
            error!(error = %e, "Failed to create run directory");
            return Err(e.into());
        }
    }

    write_json(&out_dir.join(VIDEO_INFO_FILE), &result.video_info).await?;
    write_json(&out_dir.join(SEARCH_INFO_FILE), &result.search_info).await?;
    write_json(&out_dir.join(PARAMS_FILE), &result.params).await?;
    Ok(())
}

/// Load the cross-run video-info cache. Missing or unparsable caches load as empty.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_video_cache(path: &Path) -> Result<VideoInfo, OutputError> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No video info cache yet");
            return Ok(VideoInfo::new());
        }
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str::<VideoInfo>(&contents) {
        Ok(cache) => {
            info!(videos = cache.len(), "Loaded video info cache");
            Ok(cache)
        }
        Err(e) => {
            warn!(error = %e, "Video info cache is not valid JSON; starting empty");
            Ok(VideoInfo::new())
        }
    }
}

/// Persist the cross-run cache, replacing the previous file in one rename.
#[instrument(level = "info", skip_all, fields(path = %path.display(), videos = cache.len()))]
pub async fn save_video_cache(path: &Path, cache: &VideoInfo) -> Result<(), OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    write_json(&tmp, cache).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
