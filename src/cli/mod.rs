pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "tributary")]
#[command(about = "A self-hosted RSS/Atom reader with a JSON API", long_about = None)]
pub struct Cli {
    /// SQLite database path (overrides the config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Number of parallel workers for crawling feeds
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Interface to bind
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,

        /// Don't start the background crawl worker
        #[arg(long)]
        no_worker: bool,
    },
    /// Crawl every subscription once
    Crawl,
    /// Subscribe to a feed or a page that links to one
    Add {
        /// URL of the feed or page
        url: String,

        /// Category to subscribe in, e.g. "-Tech/-Rust"
        #[arg(short, long, default_value = "", allow_hyphen_values = true)]
        category: String,
    },
    /// Import subscriptions from an OPML file
    Import {
        /// Path to the OPML file
        path: PathBuf,
    },
    /// Print the subscription tree with unread counts
    List,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(db) = &self.db {
            config.database = Some(db.clone());
        }
        if let Some(workers) = self.workers {
            config.crawler.workers = workers.max(1);
        }
        if let Commands::Serve {
            host,
            port,
            no_worker,
        } = &self.command
        {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
            if *no_worker {
                config.crawler.enabled = false;
            }
        }
    }
}
