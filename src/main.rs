use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tributary::app::AppContext;
use tributary::cli::{commands, Cli, Commands};
use tributary::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Config::default()
    });
    cli.apply(&mut config);

    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Serve { .. } => {
            commands::serve(&ctx).await?;
        }
        Commands::Crawl => {
            commands::crawl(&ctx).await?;
        }
        Commands::Add { url, category } => {
            commands::add_feed(&ctx, &url, &category).await?;
        }
        Commands::Import { path } => {
            commands::import_opml(&ctx, &path).await?;
        }
        Commands::List => {
            commands::list(&ctx)?;
        }
    }

    Ok(())
}
