//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Download every .mp4 linked from collection landing pages.
///
/// Each source page is fetched, its dropdown menus are scanned for video
/// links, and every video is saved under a cleaned title with size
/// verification. Several pages may be given as separate arguments or as one
/// `;`-separated list.
#[derive(Parser, Debug)]
#[command(name = "reelfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Source page URLs (each may hold several URLs separated by `;`)
    pub urls: Vec<String>,

    /// Directory receiving the videos [default: mediafiles]
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Concurrent downloads per page (1-16) [default: 1]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub concurrency: Option<u8>,

    /// Attempts per page fetch and per video (1-10) [default: 3]
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_retries: Option<u8>,

    /// Page fetch and size check timeout in seconds [default: 30]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub page_timeout: Option<u64>,

    /// Idle timeout while streaming a video, in seconds [default: 60]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub download_timeout: Option<u64>,

    /// Override the browser User-Agent header
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Read defaults from this config file instead of the standard location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Also write the final report as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub summary_json: Option<PathBuf>,

    /// Disable the terminal progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
