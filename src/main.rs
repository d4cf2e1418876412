//! # Tube Follower
//!
//! Explores the YouTube recommendation graph breadth-first from the top
//! search results of a query, collecting metadata, top comments and caption
//! tracks for every video it visits.
//!
//! ## Usage
//!
//! ```sh
//! tube_follower crawl --query "flat earth" --n_roots 5 --n_splits 3 --depth 5
//! tube_follower clean-captions
//! tube_follower scrape-bias
//! ```
//!
//! ## Architecture
//!
//! The `crawl` pipeline:
//! 1. **Search**: Find root videos for the query through the Data API
//! 2. **Explore**: BFS over each root's recommendations, bounded by depth and branching factor
//! 3. **Populate**: Collect metadata, comments and captions for every visited video
//! 4. **Output**: Write `video_info.json`, `search_info.json` and `params.json` per root
//!
//! A root whose output directory already exists is skipped, and video info
//! gathered by earlier runs is reused from the shared cache.

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod bias;
mod captions;
mod cli;
mod crawler;
mod extract;
mod fetcher;
mod models;
mod output;
mod populate;
mod session;
mod utils;
mod youtube;

use captions::{CaptionDownloader, clean_caption_dir};
use cli::{CleanCaptionsArgs, Cli, Command, CrawlArgs, ScrapeBiasArgs};
use crawler::CrawlConfig;
use fetcher::{HttpFetcher, RetryFetch};
use populate::YouTubeInfoSource;
use session::crawl_roots;
use utils::ensure_writable_dir;
use youtube::{YouTubeApi, resolve_api_key};

/// Delay before the first retry of a failed page fetch.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let cli = Cli::parse();
    debug!(?cli.command, "Parsed CLI arguments");

    match cli.command {
        Command::Crawl(args) => run_crawl(args).await?,
        Command::CleanCaptions(args) => run_clean_captions(args).await?,
        Command::ScrapeBias(args) => run_scrape_bias(args).await?,
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");
    Ok(())
}

#[instrument(level = "info", skip_all, fields(query = %args.query))]
async fn run_crawl(args: CrawlArgs) -> Result<(), Box<dyn Error>> {
    if let Err(e) = ensure_writable_dir(&args.results_dir).await {
        error!(
            path = %args.results_dir,
            error = %e,
            "Results directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let timeout = Duration::from_secs(args.timeout_secs);
    let api_key = resolve_api_key(args.api_key.as_deref(), Path::new(&args.api_key_file))?;
    let api = YouTubeApi::new(api_key, timeout)?;
    let downloader = CaptionDownloader::new(&args.yt_dlp, &args.captions_dir, &args.lang);
    let source = YouTubeInfoSource::new(api.clone(), downloader);
    let fetcher = RetryFetch::new(
        HttpFetcher::new(&args.lang, timeout)?,
        args.max_retries,
        RETRY_BASE_DELAY,
    );

    let config = CrawlConfig {
        loc: args.loc.clone(),
        max_comments: args.max_comments,
        request_delay: Duration::from_millis(args.request_delay_ms),
        ..CrawlConfig::new(args.n_splits, args.depth)
    };

    let roots = api
        .search(&args.query, args.n_roots, args.loc.as_deref(), Some(args.lang.as_str()))
        .await?;

    let summary = crawl_roots(
        &fetcher,
        &source,
        &config,
        &args.query,
        &roots,
        Path::new(&args.results_dir),
    )
    .await?;
    debug!(?summary, "Session summary");
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_clean_captions(args: CleanCaptionsArgs) -> Result<(), Box<dyn Error>> {
    let summary = clean_caption_dir(
        Path::new(&args.input_dir),
        Path::new(&args.output_dir),
        &args.lang,
    )
    .await?;
    info!(?summary, "Captions cleaned");
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_scrape_bias(args: ScrapeBiasArgs) -> Result<(), Box<dyn Error>> {
    let fetcher = RetryFetch::new(
        HttpFetcher::new("en", Duration::from_secs(30))?,
        args.max_retries,
        RETRY_BASE_DELAY,
    );
    let leanings = bias::scrape_leanings(&fetcher).await?;
    bias::write_leanings_csv(Path::new(&args.output), &leanings).await?;
    Ok(())
}
