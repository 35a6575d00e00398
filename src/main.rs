use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xfeed::config::Config;
use xfeed::db::{Database, FeedKind};
use xfeed::lifecycle;
use xfeed::refresher::Refresher;
use xfeed::routes::{self, AppState};

#[derive(Parser)]
#[command(name = "xfeed", version, about = "Twitter and RSS feed aggregator")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "xfeed.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the feed detail pages over HTTP
    Serve,
    /// Refresh all active feeds, or a single feed by uuid
    Refresh { uuid: Option<String> },
    /// Remove items published before a date (YYYY-MM-DD)
    CleanUp {
        uuid: String,
        date: NaiveDate,
        #[arg(long, value_parser = parse_kind)]
        kind: Option<FeedKind>,
    },
    /// Remove all items of a feed
    Flush {
        uuid: String,
        #[arg(long, value_parser = parse_kind)]
        kind: Option<FeedKind>,
    },
    /// Include or exclude a feed from refreshes
    SetActive {
        uuid: String,
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },
}

/// Parses the `--kind` scope of clean-up and flush.
fn parse_kind(value: &str) -> Result<FeedKind, String> {
    match value.to_ascii_lowercase().as_str() {
        "twitter" => Ok(FeedKind::Twitter),
        "rss" => Ok(FeedKind::Rss),
        other => Err(format!("unknown feed kind '{}', expected twitter or rss", other)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xfeed=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config)?;
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database_url = url;
    }
    info!("Loaded {} feeds from configuration", config.feeds.len());

    // Initialize database
    let db = Database::new(&config.database_url).await?;
    db.initialize().await?;
    db.sync_feeds(&config.feeds).await?;
    let db = Arc::new(db);

    match cli.command {
        Command::Serve => {
            let app = routes::router(Arc::new(AppState { db: db.clone() }));
            let listener = tokio::net::TcpListener::bind(&config.listen).await?;
            info!("Server starting on http://{}", config.listen);
            axum::serve(listener, app).await?;
        }
        Command::Refresh { uuid: Some(uuid) } => {
            let refresher = Refresher::new(db.clone(), &config)?;
            let report = refresher.refresh_by_uuid(&uuid).await?;
            println!(
                "Refreshed feed {}: {} new items, {} already stored.",
                report.feed, report.inserted, report.skipped
            );
        }
        Command::Refresh { uuid: None } => {
            let refresher = Refresher::new(db.clone(), &config)?;
            if let Some(summary) = refresher.refresh_all_active().await? {
                println!(
                    "Refreshed {} feeds, {} failed, {} new items.",
                    summary.refreshed, summary.failed, summary.inserted
                );
                if summary.failed > 0 {
                    anyhow::bail!("{} feeds failed to refresh", summary.failed);
                }
            }
        }
        Command::CleanUp { uuid, date, kind } => {
            let (feed, counts) =
                lifecycle::clean_up(&db, &uuid, date, &config.offset(), kind).await?;
            println!(
                "Successfully cleaned up {}-feed {}. {} tweets and {} RSS items were removed.",
                feed.kind.display_name(),
                feed.name,
                counts.tweets,
                counts.rss_items
            );
        }
        Command::Flush { uuid, kind } => {
            let (feed, counts) = lifecycle::flush(&db, &uuid, kind).await?;
            println!(
                "Successfully flushed {}-feed {}. {} tweets and {} RSS items were removed.",
                feed.kind.display_name(),
                feed.name,
                counts.tweets,
                counts.rss_items
            );
        }
        Command::SetActive { uuid, active } => {
            let feed = lifecycle::set_active(&db, &uuid, active).await?;
            println!(
                "Successfully set {}-feed {} is_active to {}",
                feed.kind.as_str(),
                feed.uuid,
                feed.is_active
            );
        }
    }

    Ok(())
}
