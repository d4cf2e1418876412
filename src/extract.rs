//! Recommendation extraction from watch-page HTML.
//!
//! Watch pages list related videos inside `ul.video-list` containers. The
//! first container holds the "up next" video; every later container holds
//! general recommendations. Each entry is expected to look like:
//!
//! ```text
//! <li>
//!   <div>
//!     <a href="/watch?v=VIDEO_ID">…</a>
//!   </div>
//! </li>
//! ```
//!
//! Entries that do not follow this shape are logged and skipped. Extraction
//! never fails; it degrades to a shorter (possibly empty) list and reports
//! how many entries it had to skip.

use crate::models::VideoId;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};

static VIDEO_LIST: Lazy<Selector> =
    Lazy::new(|| Selector::parse("ul.video-list").expect("static selector is valid"));

/// Result of parsing one watch page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Every inspected entry yielded a video id.
    Complete(Vec<VideoId>),
    /// Some entries were malformed and dropped.
    Partial { ids: Vec<VideoId>, skipped: usize },
}

impl Extraction {
    pub fn ids(&self) -> &[VideoId] {
        match self {
            Extraction::Complete(ids) => ids,
            Extraction::Partial { ids, .. } => ids,
        }
    }

    pub fn into_ids(self) -> Vec<VideoId> {
        match self {
            Extraction::Complete(ids) => ids,
            Extraction::Partial { ids, .. } => ids,
        }
    }

    /// Number of malformed entries that were dropped.
    pub fn skipped(&self) -> usize {
        match self {
            Extraction::Complete(_) => 0,
            Extraction::Partial { skipped, .. } => *skipped,
        }
    }
}

/// Parse up to `max_recs` recommended video ids out of a watch page, in document order.
#[instrument(level = "debug", skip(html), fields(bytes = html.len()))]
pub fn extract_recommendations(html: &str, max_recs: usize) -> Extraction {
    let document = Html::parse_document(html);
    let mut blocks = document.select(&VIDEO_LIST);
    let mut ids = Vec::new();
    let mut skipped = 0usize;

    match blocks.next() {
        Some(up_next) => match element_children(up_next).next().and_then(entry_video_id) {
            Some(id) => ids.push(id),
            None => {
                warn!("Could not get an up-next recommendation because of malformed content");
                skipped += 1;
            }
        },
        None => {
            warn!("No video-list blocks found on page");
        }
    }

    // The up-next video takes one slot of the branching factor.
    let per_block = max_recs.saturating_sub(1);
    for block in blocks {
        let mut seen = 0usize;
        for (index, entry) in element_children(block).take(per_block).enumerate() {
            seen += 1;
            match entry_video_id(entry) {
                Some(id) => ids.push(id),
                None => {
                    warn!(index, "Malformed content, could not get recommendation");
                    skipped += 1;
                }
            }
        }
        if seen < per_block {
            debug!(found = seen, wanted = per_block, "There are not enough recommendations");
        }
    }

    ids.truncate(max_recs);
    debug!(count = ids.len(), skipped, "Extracted recommendations");

    if skipped == 0 {
        Extraction::Complete(ids)
    } else {
        Extraction::Partial { ids, skipped }
    }
}

fn element_children(element: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    element.children().filter_map(ElementRef::wrap)
}

/// `entry > first element > first element[href]`, the link to the recommended video.
fn entry_video_id(entry: ElementRef<'_>) -> Option<VideoId> {
    let wrapper = element_children(entry).next()?;
    let link = element_children(wrapper).next()?;
    let href = link.value().attr("href")?;
    video_id_from_href(href)
}

/// Pull the id out of `/watch?v=ID` (relative or absolute), dropping any further parameters.
pub fn video_id_from_href(href: &str) -> Option<VideoId> {
    let (_, rest) = href.split_once("watch?v=")?;
    let id = rest.split('&').next().unwrap_or_default().trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> String {
        format!(
            r#"<li class="video-list-item"><div class="content-wrapper"><a href="/watch?v={id}" class="content-link"><span class="title">{id}</span></a></div></li>"#
        )
    }

    fn page(up_next: &str, related: &[&str]) -> String {
        let related: String = related.iter().map(|id| entry(id)).collect();
        format!(
            r#"<html><body>
            <ul class="video-list">{up_next}</ul>
            <ul class="video-list" id="watch-related">{related}</ul>
            </body></html>"#
        )
    }

    #[test]
    fn test_up_next_then_related_in_document_order() {
        let html = page(&entry("up"), &["r1", "r2", "r3"]);
        let extraction = extract_recommendations(&html, 3);
        assert_eq!(
            extraction,
            Extraction::Complete(vec!["up".into(), "r1".into(), "r2".into()])
        );
    }

    #[test]
    fn test_truncates_to_max_recs() {
        let related = ["r1", "r2", "r3", "r4", "r5", "r6", "r7"];
        let html = page(&entry("up"), &related);
        for n in 1..=5 {
            let extraction = extract_recommendations(&html, n);
            assert_eq!(extraction.ids().len(), n);
            assert_eq!(extraction.ids()[0], "up");
        }
    }

    #[test]
    fn test_truncation_across_several_blocks() {
        let html = format!(
            r#"<ul class="video-list">{}</ul><ul class="video-list">{}{}</ul><ul class="video-list">{}{}</ul>"#,
            entry("up"),
            entry("a1"),
            entry("a2"),
            entry("b1"),
            entry("b2")
        );
        let extraction = extract_recommendations(&html, 3);
        assert_eq!(extraction.ids(), ["up", "a1", "a2"]);
    }

    #[test]
    fn test_missing_up_next_structure_is_skipped() {
        let malformed = r#"<li class="video-list-item"><span>no link here</span></li>"#;
        let html = page(malformed, &["r1", "r2"]);
        let extraction = extract_recommendations(&html, 3);
        assert_eq!(
            extraction,
            Extraction::Partial {
                ids: vec!["r1".into(), "r2".into()],
                skipped: 1
            }
        );
    }

    #[test]
    fn test_malformed_related_entry_is_skipped() {
        let related = format!(
            r#"{}<li><div>broken</div></li>{}"#,
            entry("r1"),
            entry("r2")
        );
        let html = format!(
            r#"<ul class="video-list">{}</ul><ul class="video-list">{}</ul>"#,
            entry("up"),
            related
        );
        let extraction = extract_recommendations(&html, 4);
        assert_eq!(extraction.ids(), ["up", "r1", "r2"]);
        assert_eq!(extraction.skipped(), 1);
    }

    #[test]
    fn test_page_without_lists_is_empty() {
        let extraction = extract_recommendations("<html><body><p>hi</p></body></html>", 3);
        assert_eq!(extraction, Extraction::Complete(vec![]));
    }

    #[test]
    fn test_zero_max_recs() {
        let html = page(&entry("up"), &["r1"]);
        assert!(extract_recommendations(&html, 0).ids().is_empty());
    }

    #[test]
    fn test_video_id_from_href() {
        assert_eq!(video_id_from_href("/watch?v=abc"), Some("abc".to_string()));
        assert_eq!(
            video_id_from_href("https://www.youtube.com/watch?v=abc&list=PL1"),
            Some("abc".to_string())
        );
        assert_eq!(video_id_from_href("/channel/UC123"), None);
        assert_eq!(video_id_from_href("/watch?v="), None);
    }
}
