//! Data models for the recommendation crawl.
//!
//! This module defines the records produced by a crawl run:
//! - [`SearchRecord`]: one node of the recommendation tree (its outgoing edges and depth)
//! - [`VideoRecord`]: metadata, comments and caption availability for one video
//! - [`VideoMetadata`]: normalized upstream metadata before comments are attached
//! - [`RunParams`] and [`RunResult`]: what gets written out once a run ends
//!
//! Upstream fields that are absent never cause a failure. Counts fall back to
//! [`MISSING_COUNT`] and text fields to `None`, which serializes as `null`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque YouTube video identifier (e.g. `dQw4w9WgXcQ`).
pub type VideoId = String;

/// Sentinel stored in count fields the upstream response did not carry.
pub const MISSING_COUNT: i64 = -1;

fn missing_count() -> i64 {
    MISSING_COUNT
}

/// A visited node of the recommendation tree.
///
/// Created exactly once per visited video, at the moment its recommendations
/// are fetched (or, for leaves, at the moment it is dequeued).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SearchRecord {
    /// Recommended video ids in page order, truncated to the branching factor.
    pub recommendations: Vec<VideoId>,
    /// BFS level at which the video was visited (the root is at 0).
    pub depth: u32,
}

impl SearchRecord {
    /// Record for a node at the depth limit. Leaves are never expanded.
    pub fn leaf(depth: u32) -> Self {
        Self {
            recommendations: Vec::new(),
            depth,
        }
    }
}

/// Normalized metadata for a single video as returned by the Data API.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub postdate: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub channel: Option<String>,
    pub has_captions: Option<bool>,
    pub duration: Option<String>,
    pub views: i64,
    pub likes: i64,
    pub dislikes: i64,
    pub n_comments: i64,
}

impl Default for VideoMetadata {
    fn default() -> Self {
        Self {
            title: None,
            postdate: None,
            description: None,
            category: None,
            channel: None,
            has_captions: None,
            duration: None,
            views: MISSING_COUNT,
            likes: MISSING_COUNT,
            dislikes: MISSING_COUNT,
            n_comments: MISSING_COUNT,
        }
    }
}

/// Everything collected about one visited video.
///
/// `comments` is `None` when the comment endpoint failed (for instance when
/// comments are disabled on the video), and `Some(vec![])` when it succeeded
/// with no results.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoRecord {
    pub video_id: VideoId,
    #[serde(default = "missing_count")]
    pub views: i64,
    #[serde(default = "missing_count")]
    pub likes: i64,
    #[serde(default = "missing_count")]
    pub dislikes: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub postdate: Option<String>,
    #[serde(default = "missing_count")]
    pub n_comments: i64,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub has_captions: Option<bool>,
    #[serde(default)]
    pub comments: Option<Vec<String>>,
}

impl VideoRecord {
    /// Build a record from upstream metadata plus the top comments.
    pub fn new(video_id: &str, metadata: VideoMetadata, comments: Option<Vec<String>>) -> Self {
        Self {
            video_id: video_id.to_string(),
            views: metadata.views,
            likes: metadata.likes,
            dislikes: metadata.dislikes,
            description: metadata.description,
            category: metadata.category,
            postdate: metadata.postdate,
            n_comments: metadata.n_comments,
            channel: metadata.channel,
            title: metadata.title,
            duration: metadata.duration,
            has_captions: metadata.has_captions,
            comments,
        }
    }

    /// A record where every field holds its sentinel.
    pub fn missing(video_id: &str) -> Self {
        Self::new(video_id, VideoMetadata::default(), None)
    }
}

/// Parameters of one exploration, written to `params.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RunParams {
    pub n_splits: usize,
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<VideoId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl RunParams {
    pub fn new(n_splits: usize, depth: u32) -> Self {
        Self {
            n_splits,
            depth,
            query: None,
            root: None,
            started_at: None,
            finished_at: None,
        }
    }
}

/// Mapping from video id to its collected info.
pub type VideoInfo = BTreeMap<VideoId, VideoRecord>;

/// Mapping from video id to its node in the recommendation tree.
pub type SearchInfo = BTreeMap<VideoId, SearchRecord>;

/// Everything a finished crawl hands to the result writer.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub video_info: VideoInfo,
    pub search_info: SearchInfo,
    pub params: RunParams,
}
