//! One crawl session: a query and the root videos its search returned.
//!
//! Every root gets its own run directory `{query}_{root}` under the results
//! directory. A root whose directory already exists was explored by an
//! earlier session and is skipped untouched. Video info collected along the
//! way is shared between roots and persisted to the results-level cache
//! after each root, so an interrupted session loses at most one root.

use chrono::Utc;
use std::path::Path;
use tracing::{error, info, instrument, warn};

use crate::crawler::{CrawlConfig, Crawler};
use crate::fetcher::PageFetcher;
use crate::output::{OutputError, VIDEO_INFO_FILE, load_video_cache, save_video_cache, write_results};
use crate::populate::VideoInfoSource;
use crate::utils::{run_dir_name, truncate_for_log};
use crate::youtube::SearchHit;

/// Outcome counters for a session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub completed: usize,
    /// Roots whose run directory was already present.
    pub skipped: usize,
    /// Roots that were explored but whose results could not be written.
    pub failed: usize,
    pub cached_videos: usize,
}

/// Explore every root in turn and write one run directory per root.
///
/// # Arguments
///
/// * `fetcher` - Source of watch pages
/// * `source` - Source of per-video metadata, comments and captions
/// * `config` - Branching factor, depth limit and politeness settings
/// * `query` - The search query the roots came from; names the run directories
/// * `roots` - Search hits to explore, in order
/// * `results_dir` - Parent of the run directories and home of the shared cache
///
/// # Returns
///
/// A [`SessionSummary`] of the session. Only a failure to read the shared
/// cache is returned as an error; per-root write failures are logged and the
/// session moves on to the next root.
///
/// # Example
///
/// ```ignore
/// let roots = api.search("flat earth", 5, None, Some("en")).await?;
/// let summary = crawl_roots(&fetcher, &source, &config, "flat earth", &roots, results_dir).await?;
/// ```
#[instrument(level = "info", skip(fetcher, source, config, roots), fields(roots = roots.len()))]
pub async fn crawl_roots<F, S>(
    fetcher: &F,
    source: &S,
    config: &CrawlConfig,
    query: &str,
    roots: &[SearchHit],
    results_dir: &Path,
) -> Result<SessionSummary, OutputError>
where
    F: PageFetcher,
    S: VideoInfoSource,
{
    let cache_path = results_dir.join(VIDEO_INFO_FILE);
    let mut video_cache = load_video_cache(&cache_path).await?;
    let mut summary = SessionSummary::default();

    for root in roots {
        info!(
            root = %root.video_id,
            title = %truncate_for_log(&root.title, 80),
            "Starting search"
        );
        let out_dir = results_dir.join(run_dir_name(query, &root.video_id));
        if out_dir.exists() {
            info!(out_dir = %out_dir.display(), "Search already done; skipping");
            summary.skipped += 1;
            continue;
        }

        let started_at = Utc::now().to_rfc3339();
        let mut crawler = Crawler::new(fetcher, source, config.clone(), video_cache);
        crawler.search(&root.video_id).await;
        info!(
            visited = crawler.visited().len(),
            tree_size = crawler.search_info().len(),
            fetch_failures = crawler.stats().fetch_failures,
            "Exploration finished"
        );

        let mut result = crawler.into_result();
        result.params.query = Some(query.to_string());
        result.params.root = Some(root.video_id.clone());
        result.params.started_at = Some(started_at);
        result.params.finished_at = Some(Utc::now().to_rfc3339());

        if let Err(e) = save_video_cache(&cache_path, &result.video_info).await {
            error!(path = %cache_path.display(), error = %e, "Failed to update video info cache");
        }

        match write_results(&result, &out_dir).await {
            Ok(()) => summary.completed += 1,
            Err(OutputError::AlreadyExists(path)) => {
                warn!(out_dir = %path.display(), "Exploration was already performed; skipping");
                summary.skipped += 1;
            }
            Err(e) => {
                error!(out_dir = %out_dir.display(), error = %e, "Failed to write run results; continuing");
                summary.failed += 1;
            }
        }
        video_cache = result.video_info;
    }

    summary.cached_videos = video_cache.len();
    info!(
        completed = summary.completed,
        skipped = summary.skipped,
        failed = summary.failed,
        cached_videos = summary.cached_videos,
        "Crawl complete"
    );
    Ok(summary)
}
