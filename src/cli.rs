//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use feedsync_core::PipelineConfig;
use feedsync_core::config::DEFAULT_CONFIG_FILE;

/// Mirror a video feed into a local directory.
///
/// Feedsync discovers the feed's items, resolves direct media URLs and
/// downloads whatever is not yet on disk. Phases are chosen in the config
/// file and can be forced on from the command line.
#[derive(Parser, Debug)]
#[command(name = "feedsync")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to the JSON configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run the discovery phase (scroll the feed, catalog new items)
    #[arg(long)]
    pub discover: bool,

    /// Run the resolution phase (fill direct media URLs)
    #[arg(long)]
    pub resolve: bool,

    /// Run the download phase (fetch items missing from the download directory)
    #[arg(long)]
    pub download: bool,

    /// Feed page to discover from
    #[arg(long, value_name = "URL")]
    pub target_url: Option<String>,

    /// Directory downloads are published into
    #[arg(long, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Catalog database file
    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Show the browser window instead of rendering headless
    #[arg(long)]
    pub show_browser: bool,
}

impl Args {
    /// Config file to read, and whether it was named explicitly.
    pub fn config_path(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        }
    }

    /// Applies command-line overrides on top of the file configuration.
    ///
    /// Phase flags only switch phases on; a phase enabled in the file stays on.
    pub fn apply_to(&self, config: &mut PipelineConfig) {
        config.get_url |= self.discover;
        config.fill_url |= self.resolve;
        config.download |= self.download;
        config.show_browser |= self.show_browser;
        if let Some(url) = &self.target_url {
            config.target_url = Some(url.clone());
        }
        if let Some(dir) = &self.download_dir {
            config.download_path = Some(dir.clone());
        }
        if let Some(db) = &self.db {
            config.store.path.clone_from(db);
        }
    }
}
