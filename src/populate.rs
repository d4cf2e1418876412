//! Per-video info collection.
//!
//! For each visited video the crawler asks a [`VideoInfoSource`] for
//! metadata and comments, and downloads captions when the video has them.
//! Population never fails: any collaborator error degrades the record
//! (sentinel fields, `comments: None`) instead of stopping the crawl.

use crate::captions::{CaptionDownloader, CaptionError};
use crate::models::{VideoMetadata, VideoRecord};
use crate::youtube::{ApiError, YouTubeApi};
use tracing::{info, instrument, warn};

/// Upstream collaborators needed to build a [`VideoRecord`].
pub trait VideoInfoSource {
    /// Metadata for one video, `None` when the API does not know it.
    async fn metadata(&self, video_id: &str) -> Result<Option<VideoMetadata>, ApiError>;

    /// Top comments for one video.
    async fn comments(&self, video_id: &str, max_results: usize) -> Result<Vec<String>, ApiError>;

    /// Save the subtitle track of one video.
    async fn download_captions(&self, video_id: &str) -> Result<(), CaptionError>;
}

/// Production source: the Data API plus `yt-dlp`.
#[derive(Debug, Clone)]
pub struct YouTubeInfoSource {
    api: YouTubeApi,
    captions: CaptionDownloader,
}

impl YouTubeInfoSource {
    pub fn new(api: YouTubeApi, captions: CaptionDownloader) -> Self {
        Self { api, captions }
    }
}

impl VideoInfoSource for YouTubeInfoSource {
    async fn metadata(&self, video_id: &str) -> Result<Option<VideoMetadata>, ApiError> {
        let mut metadata = self.api.get_metadata(&[video_id.to_string()]).await?;
        Ok(metadata.remove(video_id))
    }

    async fn comments(&self, video_id: &str, max_results: usize) -> Result<Vec<String>, ApiError> {
        self.api.get_comments(video_id, max_results).await
    }

    async fn download_captions(&self, video_id: &str) -> Result<(), CaptionError> {
        self.captions.download(video_id).await
    }
}

/// Collect everything about `video_id`. Re-invoking re-fetches.
#[instrument(level = "info", skip(source))]
pub async fn populate<S: VideoInfoSource>(
    source: &S,
    video_id: &str,
    max_comments: usize,
) -> VideoRecord {
    info!("Logging info");

    let metadata = match source.metadata(video_id).await {
        Ok(Some(metadata)) => metadata,
        Ok(None) => {
            warn!("No metadata returned; using sentinels");
            VideoMetadata::default()
        }
        Err(e) => {
            warn!(error = %e, "Metadata request failed; using sentinels");
            VideoMetadata::default()
        }
    };

    let comments = match source.comments(video_id, max_comments).await {
        Ok(comments) => Some(comments),
        Err(e) => {
            warn!(error = %e, "No comments available");
            None
        }
    };

    if metadata.has_captions == Some(true) {
        if let Err(e) = source.download_captions(video_id).await {
            warn!(error = %e, "Caption download failed");
        }
    }

    VideoRecord::new(video_id, metadata, comments)
}
