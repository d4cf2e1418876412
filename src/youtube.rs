//! YouTube Data API v3 client.
//!
//! Thin wrapper over the three read endpoints the crawler needs:
//!
//! | Operation | Endpoint | Notes |
//! |-----------|----------|-------|
//! | [`YouTubeApi::search`] | `search.list` | Root videos for a query |
//! | [`YouTubeApi::get_metadata`] | `videos.list` | Batched 50 ids per request |
//! | [`YouTubeApi::get_comments`] | `commentThreads.list` | Top comments by relevance |
//!
//! Every response field is optional on the wire. Missing values are turned
//! into the sentinels defined in [`crate::models`] instead of errors.

use crate::models::{MISSING_COUNT, VideoId, VideoMetadata};
use itertools::Itertools;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

pub const API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// `videos.list` accepts at most this many ids per call.
const METADATA_BATCH: usize = 50;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("invalid response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no API key given and none readable at {0}")]
    MissingKey(String),
}

/// A search result usable as a crawl root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub video_id: VideoId,
    pub title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListResponse<T> {
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    published_at: Option<String>,
    description: Option<String>,
    category_id: Option<String>,
    channel_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Snippet,
    content_details: ContentDetails,
    statistics: Statistics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContentDetails {
    caption: Option<String>,
    duration: Option<String>,
}

// Counts arrive as decimal strings.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
    like_count: Option<String>,
    dislike_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CommentThread {
    snippet: CommentThreadSnippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CommentThreadSnippet {
    top_level_comment: TopLevelComment,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TopLevelComment {
    snippet: CommentSnippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CommentSnippet {
    text_original: Option<String>,
}

fn parse_count(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(MISSING_COUNT)
}

fn parse_flag(raw: Option<&str>) -> Option<bool> {
    match raw {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

impl From<VideoItem> for VideoMetadata {
    fn from(item: VideoItem) -> Self {
        let stats = &item.statistics;
        VideoMetadata {
            views: parse_count(stats.view_count.as_deref()),
            likes: parse_count(stats.like_count.as_deref()),
            dislikes: parse_count(stats.dislike_count.as_deref()),
            n_comments: parse_count(stats.comment_count.as_deref()),
            has_captions: parse_flag(item.content_details.caption.as_deref()),
            duration: item.content_details.duration,
            title: item.snippet.title,
            postdate: item.snippet.published_at,
            description: item.snippet.description,
            category: item.snippet.category_id,
            channel: item.snippet.channel_title,
        }
    }
}

fn parse_search(body: &str) -> Result<Vec<SearchHit>, serde_json::Error> {
    let response: ListResponse<SearchItem> = serde_json::from_str(body)?;
    Ok(response
        .items
        .into_iter()
        .filter_map(|item| {
            item.id.video_id.map(|video_id| SearchHit {
                video_id,
                title: item.snippet.title.unwrap_or_default(),
            })
        })
        .collect())
}

fn parse_videos(body: &str) -> Result<HashMap<VideoId, VideoMetadata>, serde_json::Error> {
    let response: ListResponse<VideoItem> = serde_json::from_str(body)?;
    Ok(response
        .items
        .into_iter()
        .filter(|item| !item.id.is_empty())
        .map(|item| (item.id.clone(), VideoMetadata::from(item)))
        .collect())
}

fn parse_comments(body: &str) -> Result<Vec<String>, serde_json::Error> {
    let response: ListResponse<CommentThread> = serde_json::from_str(body)?;
    Ok(response
        .items
        .into_iter()
        .filter_map(|thread| thread.snippet.top_level_comment.snippet.text_original)
        .collect())
}

/// Resolve the API key from an explicit value, falling back to a key file.
pub fn resolve_api_key(explicit: Option<&str>, key_file: &Path) -> Result<String, ApiError> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    match std::fs::read_to_string(key_file) {
        Ok(contents) if !contents.trim().is_empty() => Ok(contents.trim().to_string()),
        _ => Err(ApiError::MissingKey(key_file.display().to_string())),
    }
}

/// Client for the YouTube Data API.
#[derive(Debug, Clone)]
pub struct YouTubeApi {
    client: Client,
    api_key: String,
    base_url: String,
}

impl YouTubeApi {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: API_BASE_URL.to_string(),
        })
    }

    async fn get_text(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String, ApiError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    /// Search for videos matching `query`.
    ///
    /// # Arguments
    ///
    /// * `query` - Free-text search query
    /// * `max_results` - Upper bound on returned hits (the API caps it at 50)
    /// * `loc` - Optional region code, e.g. `US` or `FR`
    /// * `lang` - Optional relevance language, e.g. `en`
    ///
    /// # Returns
    ///
    /// The video hits in the order the API ranked them. Channel and playlist
    /// results are dropped.
    #[instrument(level = "info", skip(self))]
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
        loc: Option<&str>,
        lang: Option<&str>,
    ) -> Result<Vec<SearchHit>, ApiError> {
        let mut params = vec![
            ("q", query.to_string()),
            ("part", "id,snippet".to_string()),
            ("maxResults", max_results.to_string()),
            ("type", "video".to_string()),
        ];
        if let Some(loc) = loc {
            params.push(("regionCode", loc.to_string()));
        }
        if let Some(lang) = lang {
            params.push(("relevanceLanguage", lang.to_string()));
        }

        let body = self.get_text("search", &params).await?;
        let hits = parse_search(&body)?;
        info!(count = hits.len(), "Search returned root videos");
        Ok(hits)
    }

    /// Fetch snippet, content details and statistics for `ids`.
    ///
    /// Ids the API does not return are simply absent from the map.
    #[instrument(level = "info", skip_all, fields(count = ids.len()))]
    pub async fn get_metadata(
        &self,
        ids: &[VideoId],
    ) -> Result<HashMap<VideoId, VideoMetadata>, ApiError> {
        let mut result = HashMap::new();
        for batch in ids.chunks(METADATA_BATCH) {
            let params = [
                ("id", batch.iter().join(",")),
                ("part", "snippet,contentDetails,statistics".to_string()),
            ];
            let body = self.get_text("videos", &params).await?;
            let parsed = parse_videos(&body)?;
            debug!(requested = batch.len(), returned = parsed.len(), "Fetched metadata batch");
            result.extend(parsed);
        }
        Ok(result)
    }

    /// Fetch up to `max_results` top-level comments ordered by relevance.
    #[instrument(level = "info", skip(self))]
    pub async fn get_comments(
        &self,
        video_id: &str,
        max_results: usize,
    ) -> Result<Vec<String>, ApiError> {
        let params = [
            ("videoId", video_id.to_string()),
            ("maxResults", max_results.to_string()),
            ("textFormat", "plainText".to_string()),
            ("part", "snippet".to_string()),
            ("order", "relevance".to_string()),
        ];
        let body = match self.get_text("commentThreads", &params).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Comment request failed");
                return Err(e);
            }
        };
        Ok(parse_comments(&body)?)
    }
}
