//! Breadth-first crawl of the recommendation graph.
//!
//! Starting from a root video, the crawler walks the "recommended next"
//! edges level by level up to a fixed depth, expanding at most `n_splits`
//! recommendations per video. Two FIFO queues drive the traversal: `active`
//! holds the current level and `next` collects the level below. When
//! `active` runs dry the queues are swapped and the depth counter advances.
//!
//! Videos at the depth limit are recorded as leaves and never fetched.
//! Every visited video gets its info populated before it is expanded, and
//! info already present in the video-info map (from an earlier run) is
//! reused as is.

use crate::extract::{Extraction, extract_recommendations};
use crate::fetcher::{PageFetcher, watch_url};
use crate::models::{RunParams, RunResult, SearchInfo, SearchRecord, VideoId, VideoInfo};
use crate::populate::{VideoInfoSource, populate};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Knobs for one exploration.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Branching factor: recommendations expanded per video.
    pub n_splits: usize,
    /// Depth limit; videos at this level are leaves.
    pub depth: u32,
    /// Locale passed to the watch page as `gl`.
    pub loc: Option<String>,
    pub max_comments: usize,
    /// Pause after every successful page fetch.
    pub request_delay: Duration,
}

impl CrawlConfig {
    pub fn new(n_splits: usize, depth: u32) -> Self {
        Self {
            n_splits,
            depth,
            loc: None,
            max_comments: 20,
            request_delay: Duration::ZERO,
        }
    }
}

/// How a single visited video was expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// At the depth limit; not fetched.
    Leaf,
    Extracted(Extraction),
    /// The page could not be fetched even after retries.
    FetchFailed(String),
}

/// Counters reported at the end of a crawl.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub nodes: usize,
    pub leaves: usize,
    pub expanded: usize,
    pub partial_pages: usize,
    pub skipped_entries: usize,
    pub fetch_failures: usize,
    pub duplicates_skipped: usize,
    pub info_populated: usize,
    pub info_reused: usize,
}

#[derive(Debug, Default)]
struct Frontier {
    active: VecDeque<VideoId>,
    next: VecDeque<VideoId>,
}

impl Frontier {
    fn new(seed: &str) -> Self {
        Self {
            active: VecDeque::from([seed.to_string()]),
            next: VecDeque::new(),
        }
    }

    /// Promote the next level once the current one is exhausted.
    fn advance(&mut self) {
        std::mem::swap(&mut self.active, &mut self.next);
        self.next.clear();
    }
}

/// One crawl run. Build a fresh crawler per root video.
pub struct Crawler<'a, F, S> {
    fetcher: &'a F,
    source: &'a S,
    config: CrawlConfig,
    video_info: VideoInfo,
    search_info: SearchInfo,
    visited: HashSet<VideoId>,
    /// Every id ever placed in the frontier, so nothing is enqueued twice.
    discovered: HashSet<VideoId>,
    stats: CrawlStats,
}

impl<'a, F, S> Crawler<'a, F, S>
where
    F: PageFetcher,
    S: VideoInfoSource,
{
    /// Create a crawler for a single root.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Downloads watch pages (usually a [`crate::fetcher::RetryFetch`])
    /// * `source` - Supplies metadata, comments and captions for visited videos
    /// * `config` - Branching factor, depth limit, locale and politeness delay
    /// * `video_info` - Records collected earlier; videos found here are not re-populated
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut crawler = Crawler::new(&fetcher, &source, CrawlConfig::new(3, 5), cache);
    /// crawler.search("dQw4w9WgXcQ").await;
    /// let result = crawler.into_result();
    /// ```
    pub fn new(fetcher: &'a F, source: &'a S, config: CrawlConfig, video_info: VideoInfo) -> Self {
        Self {
            fetcher,
            source,
            config,
            video_info,
            search_info: SearchInfo::new(),
            visited: HashSet::new(),
            discovered: HashSet::new(),
            stats: CrawlStats::default(),
        }
    }

    pub fn visited(&self) -> &HashSet<VideoId> {
        &self.visited
    }

    pub fn search_info(&self) -> &SearchInfo {
        &self.search_info
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    /// Run the BFS from `root` until both queues are empty or the depth limit is passed.
    #[instrument(level = "info", skip(self), fields(n_splits = self.config.n_splits, depth_limit = self.config.depth))]
    pub async fn search(&mut self, root: &str) {
        let mut frontier = Frontier::new(root);
        self.discovered.insert(root.to_string());
        let mut depth = 0u32;

        loop {
            if frontier.active.is_empty() {
                if frontier.next.is_empty() {
                    break;
                }
                frontier.advance();
                depth += 1;
                if depth > self.config.depth {
                    break;
                }
                debug!(depth, level_size = frontier.active.len(), "Advancing to next level");
            }

            let Some(video_id) = frontier.active.pop_front() else {
                break;
            };
            self.visit(&video_id, depth, &mut frontier.next).await;
        }

        info!(
            nodes = self.stats.nodes,
            leaves = self.stats.leaves,
            expanded = self.stats.expanded,
            fetch_failures = self.stats.fetch_failures,
            partial_pages = self.stats.partial_pages,
            skipped_entries = self.stats.skipped_entries,
            duplicates_skipped = self.stats.duplicates_skipped,
            info_populated = self.stats.info_populated,
            info_reused = self.stats.info_reused,
            "Search finished"
        );
    }

    async fn visit(&mut self, video_id: &str, depth: u32, next: &mut VecDeque<VideoId>) {
        self.stats.nodes += 1;
        self.ensure_info(video_id).await;

        let expansion = if depth == self.config.depth {
            Expansion::Leaf
        } else {
            self.expand(video_id).await
        };

        let recommendations = match expansion {
            Expansion::Leaf => {
                self.stats.leaves += 1;
                Vec::new()
            }
            Expansion::Extracted(extraction) => {
                self.stats.expanded += 1;
                if extraction.ids().is_empty() {
                    debug!(video_id, "Page listed no recommendations");
                }
                if extraction.skipped() > 0 {
                    self.stats.partial_pages += 1;
                    self.stats.skipped_entries += extraction.skipped();
                }
                extraction.into_ids()
            }
            Expansion::FetchFailed(reason) => {
                warn!(video_id, %reason, "Recording no recommendations");
                self.stats.fetch_failures += 1;
                Vec::new()
            }
        };
        info!(video_id, depth, ?recommendations, "Recommendations");

        for rec in &recommendations {
            if self.discovered.contains(rec) {
                debug!(video_id = %rec, "Video has already been visited");
                self.stats.duplicates_skipped += 1;
                continue;
            }
            self.discovered.insert(rec.clone());
            next.push_back(rec.clone());
        }

        self.search_info.insert(
            video_id.to_string(),
            SearchRecord {
                recommendations,
                depth,
            },
        );
        self.visited.insert(video_id.to_string());
    }

    async fn expand(&self, video_id: &str) -> Expansion {
        let url = watch_url(video_id, self.config.loc.as_deref());
        match self.fetcher.fetch(&url).await {
            Ok(html) => {
                if !self.config.request_delay.is_zero() {
                    sleep(self.config.request_delay).await;
                }
                Expansion::Extracted(extract_recommendations(&html, self.config.n_splits))
            }
            Err(e) => {
                error!(video_id, error = %e, "Could not fetch watch page");
                Expansion::FetchFailed(e.to_string())
            }
        }
    }

    async fn ensure_info(&mut self, video_id: &str) {
        if self.video_info.contains_key(video_id) {
            debug!(video_id, "Reusing collected info");
            self.stats.info_reused += 1;
            return;
        }
        let record = populate(self.source, video_id, self.config.max_comments).await;
        self.video_info.insert(video_id.to_string(), record);
        self.stats.info_populated += 1;
    }

    /// Hand the accumulated records to the result writer.
    pub fn into_result(self) -> RunResult {
        RunResult {
            video_info: self.video_info,
            search_info: self.search_info,
            params: RunParams::new(self.config.n_splits, self.config.depth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::CaptionError;
    use crate::fetcher::FetchError;
    use crate::models::{VideoMetadata, VideoRecord};
    use crate::youtube::ApiError;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Serves a synthetic watch page per video from an adjacency list.
    #[derive(Default)]
    struct GraphFetcher {
        graph: HashMap<String, Vec<String>>,
        broken: HashSet<String>,
        fetched: RefCell<Vec<String>>,
    }

    impl GraphFetcher {
        fn new(edges: &[(&str, &[&str])]) -> Self {
            Self {
                graph: edges
                    .iter()
                    .map(|(from, to)| {
                        (from.to_string(), to.iter().map(|s| s.to_string()).collect())
                    })
                    .collect(),
                ..Self::default()
            }
        }
    }

    fn entry(id: &str) -> String {
        format!(r#"<li><div><a href="/watch?v={id}">{id}</a></div></li>"#)
    }

    fn watch_page(recs: &[String]) -> String {
        let up_next = recs.first().map(|id| entry(id)).unwrap_or_default();
        let related: String = recs.iter().skip(1).map(|id| entry(id)).collect();
        format!(
            r#"<html><body><ul class="video-list">{up_next}</ul><ul class="video-list">{related}</ul></body></html>"#
        )
    }

    impl PageFetcher for GraphFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            let id = url
                .split("v=")
                .nth(1)
                .and_then(|rest| rest.split('&').next())
                .unwrap_or_default()
                .to_string();
            self.fetched.borrow_mut().push(id.clone());
            if self.broken.contains(&id) {
                return Err(FetchError::Exhausted {
                    attempts: 6,
                    last: "connection refused".into(),
                });
            }
            let recs = self.graph.get(&id).cloned().unwrap_or_default();
            Ok(watch_page(&recs))
        }
    }

    #[derive(Default)]
    struct CountingSource {
        populated: RefCell<Vec<String>>,
    }

    impl VideoInfoSource for CountingSource {
        async fn metadata(&self, video_id: &str) -> Result<Option<VideoMetadata>, ApiError> {
            self.populated.borrow_mut().push(video_id.to_string());
            Ok(Some(VideoMetadata::default()))
        }

        async fn comments(&self, _video_id: &str, _max: usize) -> Result<Vec<String>, ApiError> {
            Ok(Vec::new())
        }

        async fn download_captions(&self, _video_id: &str) -> Result<(), CaptionError> {
            Ok(())
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_root_with_two_leaves() {
        let fetcher = GraphFetcher::new(&[("root", &["a", "b"])]);
        let source = CountingSource::default();
        let mut crawler = Crawler::new(&fetcher, &source, CrawlConfig::new(2, 1), VideoInfo::new());
        crawler.search("root").await;

        let expected: SearchInfo = [
            ("root".to_string(), SearchRecord { recommendations: ids(&["a", "b"]), depth: 0 }),
            ("a".to_string(), SearchRecord::leaf(1)),
            ("b".to_string(), SearchRecord::leaf(1)),
        ]
        .into_iter()
        .collect();
        assert_eq!(crawler.search_info(), &expected);

        let visited: HashSet<String> = ids(&["root", "a", "b"]).into_iter().collect();
        assert_eq!(crawler.visited(), &visited);

        // Leaves are never fetched.
        assert_eq!(*fetcher.fetched.borrow(), ids(&["root"]));
        assert_eq!(crawler.stats().leaves, 2);
    }

    #[tokio::test]
    async fn test_depth_zero_records_only_the_root() {
        let fetcher = GraphFetcher::new(&[("root", &["a", "b"])]);
        let source = CountingSource::default();
        let mut crawler = Crawler::new(&fetcher, &source, CrawlConfig::new(3, 0), VideoInfo::new());
        crawler.search("root").await;

        assert_eq!(crawler.search_info().len(), 1);
        assert_eq!(crawler.search_info()["root"], SearchRecord::leaf(0));
        assert!(fetcher.fetched.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_shared_recommendations_are_enqueued_once() {
        let fetcher = GraphFetcher::new(&[
            ("root", &["a", "b"]),
            ("a", &["b", "c"]),
            ("b", &["a", "d"]),
        ]);
        let source = CountingSource::default();
        let mut crawler = Crawler::new(&fetcher, &source, CrawlConfig::new(2, 2), VideoInfo::new());
        crawler.search("root").await;

        let info = crawler.search_info();
        assert_eq!(info.len(), 5);
        assert_eq!(info["a"].recommendations, ids(&["b", "c"]));
        assert_eq!(info["a"].depth, 1);
        assert_eq!(info["b"].depth, 1);
        assert_eq!(info["c"], SearchRecord::leaf(2));
        assert_eq!(info["d"], SearchRecord::leaf(2));
        assert_eq!(crawler.stats().duplicates_skipped, 2);
        assert_eq!(*fetcher.fetched.borrow(), ids(&["root", "a", "b"]));
    }

    #[tokio::test]
    async fn test_invariants_on_cyclic_graph() {
        // Dense graph with cycles: node i recommends the next five nodes modulo 12.
        let names: Vec<String> = (0..12).map(|i| format!("v{i}")).collect();
        let fetcher = GraphFetcher {
            graph: (0..12)
                .map(|i| {
                    let recs = (1..=5).map(|k| names[(i + k) % 12].clone()).collect();
                    (names[i].clone(), recs)
                })
                .collect(),
            ..GraphFetcher::default()
        };
        let source = CountingSource::default();
        let n_splits = 3;
        let depth_limit = 3;
        let mut crawler = Crawler::new(
            &fetcher,
            &source,
            CrawlConfig::new(n_splits, depth_limit),
            VideoInfo::new(),
        );
        crawler.search("v0").await;

        for (id, record) in crawler.search_info() {
            assert!(record.depth <= depth_limit, "{id} beyond depth limit");
            assert!(record.recommendations.len() <= n_splits, "{id} over branching factor");
            if record.depth == depth_limit {
                assert!(record.recommendations.is_empty(), "{id} is a leaf with edges");
            }
        }
        // Each fetch is a distinct visit; nothing is fetched twice.
        let fetched = fetcher.fetched.borrow();
        let unique: HashSet<&String> = fetched.iter().collect();
        assert_eq!(unique.len(), fetched.len());
        assert_eq!(crawler.visited().len(), crawler.search_info().len());
        // Info is populated exactly once per visited video.
        assert_eq!(source.populated.borrow().len(), crawler.visited().len());
    }

    #[tokio::test]
    async fn test_existing_info_is_not_refetched() {
        let fetcher = GraphFetcher::new(&[("root", &["a", "b"])]);
        let source = CountingSource::default();
        let mut preloaded = VideoInfo::new();
        preloaded.insert("root".into(), VideoRecord::missing("root"));
        preloaded.insert("a".into(), VideoRecord::missing("a"));

        let mut crawler = Crawler::new(&fetcher, &source, CrawlConfig::new(2, 1), preloaded);
        crawler.search("root").await;
        assert_eq!(*source.populated.borrow(), ids(&["b"]));
        assert_eq!(crawler.stats().info_reused, 2);
        let result = crawler.into_result();
        assert_eq!(result.video_info.len(), 3);

        // A second run over the same seed reuses everything.
        let second_source = CountingSource::default();
        let mut again = Crawler::new(&fetcher, &second_source, CrawlConfig::new(2, 1), result.video_info);
        again.search("root").await;
        assert!(second_source.populated.borrow().is_empty());
        assert_eq!(again.search_info().len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_failure_records_empty_node_and_continues() {
        let mut fetcher = GraphFetcher::new(&[
            ("root", &["a", "b"]),
            ("a", &["x", "y"]),
            ("b", &["c", "d"]),
        ]);
        fetcher.broken.insert("a".to_string());
        let source = CountingSource::default();
        let mut crawler = Crawler::new(&fetcher, &source, CrawlConfig::new(2, 2), VideoInfo::new());
        crawler.search("root").await;

        let info = crawler.search_info();
        assert_eq!(info["a"], SearchRecord { recommendations: vec![], depth: 1 });
        assert_eq!(info["b"].recommendations, ids(&["c", "d"]));
        assert!(info.contains_key("c"));
        assert!(!info.contains_key("x"));
        assert_eq!(crawler.stats().fetch_failures, 1);
    }

    #[tokio::test]
    async fn test_into_result_carries_params() {
        let fetcher = GraphFetcher::new(&[]);
        let source = CountingSource::default();
        let mut crawler = Crawler::new(&fetcher, &source, CrawlConfig::new(4, 2), VideoInfo::new());
        crawler.search("lonely").await;

        let result = crawler.into_result();
        assert_eq!(result.params, RunParams::new(4, 2));
        assert_eq!(result.search_info["lonely"].recommendations.len(), 0);
        assert!(result.video_info.contains_key("lonely"));
    }
}
