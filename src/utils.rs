//! Helpers for naming run directories, log output and filesystem checks.

use std::error::Error;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Truncate a string for logging purposes.
///
/// Long strings are cut at a character boundary near `max` bytes and get a
/// `"…(+N bytes)"` suffix.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Directory name for one exploration: `{query}_{root_video_id}`.
///
/// Path separators in the query are replaced so the run stays a single
/// directory under the results root.
pub fn run_dir_name(query: &str, root: &str) -> String {
    let query = query
        .trim()
        .replace(|c: char| c == '/' || c == '\\' || c == '\0', "_");
    format!("{query}_{root}")
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    fs::write(&probe_path, b"").await?;
    if let Err(e) = fs::remove_file(&probe_path).await {
        warn!(probe = %probe_path, error = %e, "Could not remove write probe");
    }
    info!("Output directory is writable");
    Ok(())
}
