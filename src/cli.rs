//! Command-line interface definitions.
//!
//! One binary, three subcommands:
//!
//! - `crawl`: search a query and explore the recommendation tree of each result
//! - `clean-captions`: turn downloaded `.vtt` subtitle files into plain text
//! - `scrape-bias`: download the AllSides media-bias table as CSV
//!
//! Options that carry secrets can also be supplied via environment variables.

use clap::{Args, Parser, Subcommand};

/// Command-line arguments for the recommendation crawler.
///
/// # Examples
///
/// ```sh
/// tube_follower crawl --query "flat earth" --n_roots 5 --n_splits 3 --depth 5
/// tube_follower clean-captions --input-dir scrape_results/captions
/// tube_follower scrape-bias --output derived_data/media_classification/allsides_raw.csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Explore the recommendation graph from the top search results of a query
    Crawl(CrawlArgs),
    /// Convert downloaded subtitle files into lowercase plain text
    CleanCaptions(CleanCaptionsArgs),
    /// Scrape the media bias ratings table into a CSV file
    ScrapeBias(ScrapeBiasArgs),
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// The start search query
    #[arg(long)]
    pub query: String,

    /// The number of search results to start the exploration
    #[arg(long = "n_roots", default_value_t = 5)]
    pub n_roots: usize,

    /// The branching factor of the exploration tree
    #[arg(long = "n_splits", default_value_t = 3)]
    pub n_splits: usize,

    /// The depth of the exploration
    #[arg(long, default_value_t = 5)]
    pub depth: u32,

    /// Location passed to YouTube, e.g. US, FR, GB, DE
    #[arg(long)]
    pub loc: Option<String>,

    /// Language passed in the HTTP headers and to the API: en, fr, en-US, ...
    #[arg(long, default_value = "en")]
    pub lang: String,

    /// Directory holding run directories and the shared video info cache
    #[arg(long, default_value = "scrape_results")]
    pub results_dir: String,

    /// Directory where subtitle tracks are saved
    #[arg(long, default_value = "scrape_results/captions")]
    pub captions_dir: String,

    /// Number of top comments stored per video
    #[arg(long, default_value_t = 20)]
    pub max_comments: usize,

    /// Retries for a failing watch page fetch before giving up on it
    #[arg(long, default_value_t = 5)]
    pub max_retries: usize,

    /// Pause after every successful watch page fetch, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub request_delay_ms: u64,

    /// Per-request timeout, in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// YouTube Data API key
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// File to read the API key from when none is given
    #[arg(long, default_value = "credentials/api_key.txt")]
    pub api_key_file: String,

    /// yt-dlp executable used for subtitle downloads
    #[arg(long, default_value = "yt-dlp")]
    pub yt_dlp: String,
}

#[derive(Args, Debug)]
pub struct CleanCaptionsArgs {
    /// Directory with raw `.vtt` files
    #[arg(long, default_value = "scrape_results/captions")]
    pub input_dir: String,

    /// Directory for the cleaned `.txt` files
    #[arg(long, default_value = "derived_data/captions_clean")]
    pub output_dir: String,

    /// Only files declaring this language are kept
    #[arg(long, default_value = "en")]
    pub lang: String,
}

#[derive(Args, Debug)]
pub struct ScrapeBiasArgs {
    /// Output CSV path
    #[arg(long, default_value = "derived_data/media_classification/allsides_raw.csv")]
    pub output: String,

    /// Retries per listing page
    #[arg(long, default_value_t = 5)]
    pub max_retries: usize,
}
