//! AllSides media-bias ratings scraper.
//!
//! The ratings listing is spread over three pages. Each table row links the
//! outlet in its first cell and the bias rating in its second cell; the last
//! path segment of each link is the identifier we keep:
//!
//! ```text
//! <tr class="even">
//!   <td class="views-field-title"><a href="/news-source/cnn-media-bias">CNN</a></td>
//!   <td class="views-field-field-bias-image"><a href="/media-bias/left">…</a></td>
//! </tr>
//! ```

use crate::fetcher::{FetchError, PageFetcher};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

pub const RATINGS_URL: &str =
    "https://www.allsides.com/media-bias/media-bias-ratings?field_featured_bias_rating_value=All";

/// Query suffixes of the three listing pages.
pub const PAGE_SUFFIXES: [&str; 3] = ["", "&page=1", "&page=2"];

static RATING_ROW: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr.even, tr.odd").expect("static selector is valid"));
static LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static selector is valid"));

/// Site identifier to bias-leaning identifier.
pub type Leanings = BTreeMap<String, String>;

fn last_segment(cell: ElementRef<'_>) -> Option<String> {
    let href = cell.select(&LINK).next()?.value().attr("href")?;
    let segment = href.trim_end_matches('/').rsplit('/').next()?;
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

/// Parse `(site, leaning)` pairs from one listing page. Incomplete rows are skipped.
pub fn parse_ratings(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let mut pairs = Vec::new();
    for row in document.select(&RATING_ROW) {
        let mut cells = row.children().filter_map(ElementRef::wrap);
        let site = cells.next().and_then(last_segment);
        let leaning = cells.next().and_then(last_segment);
        match (site, leaning) {
            (Some(site), Some(leaning)) => pairs.push((site, leaning)),
            _ => debug!("Skipping incomplete rating row"),
        }
    }
    pairs
}

/// Fetch all listing pages and merge their rows. Later pages win on duplicate sites.
#[instrument(level = "info", skip_all)]
pub async fn scrape_leanings<F: PageFetcher>(fetcher: &F) -> Result<Leanings, FetchError> {
    let mut leanings = Leanings::new();
    for suffix in PAGE_SUFFIXES {
        let url = format!("{RATINGS_URL}{suffix}");
        let html = fetcher.fetch(&url).await?;
        let pairs = parse_ratings(&html);
        info!(%url, rows = pairs.len(), "Parsed ratings page");
        leanings.extend(pairs);
    }
    info!(sites = leanings.len(), "Collected media bias ratings");
    Ok(leanings)
}

#[derive(Debug, Error)]
pub enum BiasError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Write the table as `site,leaning` CSV, creating parent directories.
///
/// # Arguments
///
/// * `path` - Destination file; missing parent directories are created
/// * `leanings` - Site to leaning map, written in key order
///
/// # Returns
///
/// `Ok(())` once the whole file is written, or the I/O or CSV error that stopped it.
#[instrument(level = "info", skip(leanings), fields(path = %path.display()))]
pub async fn write_leanings_csv(path: &Path, leanings: &Leanings) -> Result<(), BiasError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["site", "leaning"])?;
    for (site, leaning) in leanings {
        writer.write_record([site, leaning])?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    fs::write(path, bytes).await?;
    info!(rows = leanings.len(), "Wrote bias table");
    Ok(())
}
