//! Caption download and cleanup.
//!
//! Subtitle tracks are fetched with the `yt-dlp` executable as WebVTT files
//! named `<video_id>.<lang>.vtt`. The cleaner later turns each of them into a
//! single lowercase line of text:
//!
//! - files whose header declares another language are ignored
//! - timestamp lines (`-->`) and blank lines are dropped
//! - a file containing inline timing tags (`<c>`) is treated as corrupted
//!   and produces no output at all
//! - a file that is not valid UTF-8 is skipped without aborting the batch

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

use crate::fetcher::watch_url;

static TIMESTAMP_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-->").expect("static regex"));
static CORRUPTED_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<c>").expect("static regex"));
static LANGUAGE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Language:\s*(\S+)").expect("static regex"));

/// Lines before the first cue text (`WEBVTT`, `Kind`, `Language`, blank, first timestamp).
const HEADER_LINES: usize = 5;

/// Index of the `Language: xx` header line.
const LANGUAGE_LINE_INDEX: usize = 2;

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yt-dlp failed for {video_id} ({status}): {stderr}")]
    Download {
        video_id: String,
        status: String,
        stderr: String,
    },
}

/// What happened to a single caption file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionOutcome {
    Written(PathBuf),
    /// Dotfiles are never captions.
    Hidden,
    /// Not valid UTF-8.
    Unreadable,
    WrongLanguage(Option<String>),
    Corrupted,
}

/// Counters for one directory pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanSummary {
    pub written: usize,
    pub hidden: usize,
    pub unreadable: usize,
    pub wrong_language: usize,
    pub corrupted: usize,
    pub failed: usize,
}

/// Downloads subtitle tracks through `yt-dlp`.
#[derive(Debug, Clone)]
pub struct CaptionDownloader {
    program: PathBuf,
    captions_dir: PathBuf,
    lang: String,
}

impl CaptionDownloader {
    pub fn new(program: impl Into<PathBuf>, captions_dir: impl Into<PathBuf>, lang: &str) -> Self {
        Self {
            program: program.into(),
            captions_dir: captions_dir.into(),
            lang: lang.to_string(),
        }
    }

    /// Save the subtitle track of `video_id` under the captions directory.
    #[instrument(level = "info", skip(self))]
    pub async fn download(&self, video_id: &str) -> Result<(), CaptionError> {
        fs::create_dir_all(&self.captions_dir).await?;
        let template = self.captions_dir.join("%(id)s.%(ext)s");

        let output = Command::new(&self.program)
            .arg("--skip-download")
            .arg("--write-subs")
            .arg("--sub-langs")
            .arg(&self.lang)
            .arg("--sub-format")
            .arg("vtt")
            .arg("--no-warnings")
            .arg("--quiet")
            .arg("--output")
            .arg(template.to_string_lossy().to_string())
            .arg(watch_url(video_id, None))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(CaptionError::Download {
                video_id: video_id.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        debug!("Subtitles saved");
        Ok(())
    }
}

fn declared_language(lines: &[&str]) -> Option<String> {
    let line = lines.get(LANGUAGE_LINE_INDEX)?;
    LANGUAGE_LINE
        .captures(line)
        .map(|caps| caps[1].to_string())
}

/// Clean one `.vtt` file into `<out_dir>/<video_id>.txt`.
#[instrument(level = "debug", skip(out_dir), fields(path = %path.display()))]
pub async fn clean_caption_file(
    path: &Path,
    out_dir: &Path,
    lang: &str,
) -> Result<CaptionOutcome, CaptionError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if file_name.is_empty() || file_name.starts_with('.') {
        return Ok(CaptionOutcome::Hidden);
    }

    let bytes = fs::read(path).await?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => {
            warn!("Couldn't convert caption file, not valid UTF-8");
            return Ok(CaptionOutcome::Unreadable);
        }
    };

    let lines: Vec<&str> = text.lines().collect();
    let language = declared_language(&lines);
    if language.as_deref() != Some(lang) {
        debug!(?language, "Skipping caption file in another language");
        return Ok(CaptionOutcome::WrongLanguage(language));
    }

    let mut kept = Vec::new();
    for line in lines.iter().skip(HEADER_LINES) {
        if TIMESTAMP_LINE.is_match(line) || line.trim().is_empty() {
            continue;
        }
        if CORRUPTED_LINE.is_match(line) {
            debug!("Caption file contains inline timing tags; dropping it");
            return Ok(CaptionOutcome::Corrupted);
        }
        kept.push(line.trim().to_lowercase());
    }

    let video_id = file_name.split('.').next().unwrap_or_default();
    fs::create_dir_all(out_dir).await?;
    let out_path = out_dir.join(format!("{video_id}.txt"));
    fs::write(&out_path, kept.iter().join(" ")).await?;
    debug!(out = %out_path.display(), lines = kept.len(), "Wrote clean captions");
    Ok(CaptionOutcome::Written(out_path))
}

/// Clean every caption file in `in_dir`. Per-file failures are logged and counted.
#[instrument(level = "info", skip_all, fields(in_dir = %in_dir.display(), out_dir = %out_dir.display()))]
pub async fn clean_caption_dir(
    in_dir: &Path,
    out_dir: &Path,
    lang: &str,
) -> Result<CleanSummary, CaptionError> {
    let mut paths = Vec::new();
    let mut entries = fs::read_dir(in_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut summary = CleanSummary::default();
    for path in paths {
        match clean_caption_file(&path, out_dir, lang).await {
            Ok(CaptionOutcome::Written(out)) => {
                debug!(out = %out.display(), "Cleaned");
                summary.written += 1;
            }
            Ok(CaptionOutcome::Hidden) => summary.hidden += 1,
            Ok(CaptionOutcome::Unreadable) => summary.unreadable += 1,
            Ok(CaptionOutcome::WrongLanguage(language)) => {
                debug!(path = %path.display(), ?language, "Not in the requested language");
                summary.wrong_language += 1;
            }
            Ok(CaptionOutcome::Corrupted) => summary.corrupted += 1,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to clean caption file");
                summary.failed += 1;
            }
        }
    }

    info!(
        written = summary.written,
        wrong_language = summary.wrong_language,
        corrupted = summary.corrupted,
        unreadable = summary.unreadable,
        hidden = summary.hidden,
        failed = summary.failed,
        "Caption cleanup finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vtt(language: &str, cues: &[&str]) -> String {
        let mut out = format!("WEBVTT\nKind: captions\nLanguage: {language}\n\n");
        for (i, cue) in cues.iter().enumerate() {
            out.push_str(&format!(
                "00:00:0{i}.000 --> 00:00:0{}.000 align:start position:0%\n{cue}\n\n",
                i + 1
            ));
        }
        out
    }

    async fn write(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_clean_english_file() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let path = write(
            &input,
            "abc123.en.vtt",
            vtt("en", &["Hello World", "  This IS a Test  "]).as_bytes(),
        )
        .await;

        let outcome = clean_caption_file(&path, output.path(), "en").await.unwrap();
        let expected = output.path().join("abc123.txt");
        assert_eq!(outcome, CaptionOutcome::Written(expected.clone()));
        let text = fs::read_to_string(expected).await.unwrap();
        assert_eq!(text, "hello world this is a test");
    }

    #[tokio::test]
    async fn test_french_file_produces_nothing() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let path = write(&input, "abc.fr.vtt", vtt("fr", &["Bonjour"]).as_bytes()).await;

        let outcome = clean_caption_file(&path, output.path(), "en").await.unwrap();
        assert_eq!(outcome, CaptionOutcome::WrongLanguage(Some("fr".to_string())));
        assert!(!output.path().join("abc.txt").exists());
    }

    #[tokio::test]
    async fn test_corrupted_file_produces_nothing() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let cues = ["fine line", "bad<00:00:01.500><c> line</c>"];
        let path = write(&input, "xyz.en.vtt", vtt("en", &cues).as_bytes()).await;

        let outcome = clean_caption_file(&path, output.path(), "en").await.unwrap();
        assert_eq!(outcome, CaptionOutcome::Corrupted);
        assert!(!output.path().join("xyz.txt").exists());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_skipped() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let path = write(&input, "bin.en.vtt", &[0xff, 0xfe, 0x00, 0x41]).await;

        let outcome = clean_caption_file(&path, output.path(), "en").await.unwrap();
        assert_eq!(outcome, CaptionOutcome::Unreadable);
    }

    #[tokio::test]
    async fn test_dir_pass_counts_each_outcome() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write(&input, "a.en.vtt", vtt("en", &["One"]).as_bytes()).await;
        write(&input, "b.en.vtt", vtt("en", &["<c>x</c>"]).as_bytes()).await;
        write(&input, "c.de.vtt", vtt("de", &["Eins"]).as_bytes()).await;
        write(&input, ".DS_Store", b"junk").await;
        write(&input, "d.en.vtt", &[0xc3, 0x28]).await;

        let summary = clean_caption_dir(input.path(), output.path(), "en")
            .await
            .unwrap();
        assert_eq!(
            summary,
            CleanSummary {
                written: 1,
                hidden: 1,
                unreadable: 1,
                wrong_language: 1,
                corrupted: 1,
                failed: 0,
            }
        );
        assert!(output.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_downloader_reports_failure() {
        let dir = TempDir::new().unwrap();
        let downloader = CaptionDownloader::new("false", dir.path(), "en");
        let err = downloader.download("abc").await.unwrap_err();
        assert!(matches!(err, CaptionError::Download { .. }));
    }

    #[tokio::test]
    async fn test_downloader_success() {
        let dir = TempDir::new().unwrap();
        let downloader = CaptionDownloader::new("true", dir.path().join("captions"), "en");
        downloader.download("abc").await.unwrap();
        assert!(dir.path().join("captions").is_dir());
    }
}
