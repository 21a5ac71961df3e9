// vinyl: headless driver for the media shell core.
// Usage: vinyl browse <dir> | lyrics <file.lrc> | config | monitor

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vinyl_lib::cli::{self, BrowseArgs, LyricsArgs};
use vinyl_lib::config::{self, Config};
use vinyl_lib::scanner::SortMethod;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

#[derive(Parser, Debug)]
#[command(name = "vinyl", version = VERSION, about = "Vinyl: media shell core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List one directory level and print the visible window
    Browse {
        dir: PathBuf,
        /// Include dot-prefixed entries
        #[arg(long)]
        hidden: bool,
        #[arg(long, value_enum)]
        sort: Option<SortMethod>,
        /// First row scrolled to
        #[arg(long, default_value_t = 0)]
        scroll: usize,
        /// Viewport height in rows
        #[arg(long)]
        rows: Option<usize>,
        /// Delegate the scan to a path walk (adds size and modified time)
        #[arg(long)]
        delegated: bool,
        /// Keep running and re-list on changes
        #[arg(long)]
        watch: bool,
    },
    /// Parse a time-tagged lyric file
    Lyrics {
        file: PathBuf,
        /// Print the line active at this many seconds
        #[arg(long)]
        at: Option<f64>,
        /// Sync offset in seconds (positive shows lines earlier)
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        offset: f64,
        /// Simulate playback for this many seconds
        #[arg(long)]
        play: Option<f64>,
    },
    /// Show config path and effective settings
    Config,
    /// Run a synthetic frame loop through the frame budget monitor
    Monitor {
        #[arg(long, default_value_t = 5)]
        seconds: u64,
        #[arg(long, default_value_t = 60)]
        fps: u32,
    },
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("VINYL_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let args = Cli::parse();
    let cfg = Config::load();

    match args.command {
        Commands::Browse {
            dir,
            hidden,
            sort,
            scroll,
            rows,
            delegated,
            watch,
        } => cli::browse(
            &cfg,
            &dir,
            &BrowseArgs {
                hidden,
                sort,
                scroll,
                rows,
                delegated,
                watch,
            },
        ),
        Commands::Lyrics {
            file,
            at,
            offset,
            play,
        } => cli::lyrics(&cfg, &file, &LyricsArgs { at, offset, play }),
        Commands::Config => cli::show_config(&cfg, &config::default_path()),
        Commands::Monitor { seconds, fps } => cli::monitor(&cfg, seconds, fps),
    }
}
