use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use playlog_core::{Config, EventStore, Poller, Tracker};
use playlog_spotify::{SpotifySession, SpotifySource};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "playlog",
    version,
    about = "Track and summarize your Spotify listening history"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the playback poller until interrupted
    Track,
    /// Record the currently playing track immediately
    Now(IdentityArgs),
    /// Show listening history, newest first
    History {
        #[command(flatten)]
        identity: IdentityArgs,
        /// Rows to skip (pagination offset)
        #[arg(long, default_value_t = 0)]
        skip: u32,
        /// Maximum rows to return
        #[arg(long, default_value_t = 50)]
        limit: u32,
        /// Only include plays at or after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<DateTime<Utc>>,
    },
    /// Show most-played rollups
    Top {
        #[command(subcommand)]
        by: TopBy,
    },
}

#[derive(Subcommand)]
enum TopBy {
    /// Most-played tracks
    Tracks(TopArgs),
    /// Most-played artists
    Artists(TopArgs),
    /// Most-played albums
    Albums(TopArgs),
}

#[derive(Args)]
struct IdentityArgs {
    /// Spotify user id; defaults to the authenticated account
    #[arg(long)]
    user: Option<String>,
}

#[derive(Args)]
struct TopArgs {
    #[command(flatten)]
    identity: IdentityArgs,
    /// Maximum groups to return
    #[arg(long, default_value_t = 10)]
    limit: u32,
    /// Only count plays at or after this RFC 3339 timestamp
    #[arg(long)]
    since: Option<DateTime<Utc>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_create()?;

    let session = Arc::new(SpotifySession::new(
        &config.spotify.client_id,
        &config.spotify.client_secret,
        &config.spotify.redirect_uri,
    ));
    let source = Arc::new(SpotifySource::new(session));
    let store = EventStore::open(&config.storage.db_path()).await?;
    let tracker = Tracker::new(source.clone(), store.clone());

    match cli.command {
        Command::Track => run_poller(source, store, &config).await,
        Command::Now(identity) => {
            let user_id = resolve_user(&tracker, identity).await?;
            let event = tracker.record_if_playing(&user_id).await?;
            print_json(&event)
        }
        Command::History {
            identity,
            skip,
            limit,
            since,
        } => {
            let user_id = resolve_user(&tracker, identity).await?;
            let rows = tracker.history(&user_id, skip, limit, since).await?;
            print_json(&rows)
        }
        Command::Top { by } => match by {
            TopBy::Tracks(args) => {
                let user_id = resolve_user(&tracker, args.identity).await?;
                let rows = tracker.top_tracks(&user_id, args.limit, args.since).await?;
                print_json(&rows)
            }
            TopBy::Artists(args) => {
                let user_id = resolve_user(&tracker, args.identity).await?;
                let rows = tracker.top_artists(&user_id, args.limit, args.since).await?;
                print_json(&rows)
            }
            TopBy::Albums(args) => {
                let user_id = resolve_user(&tracker, args.identity).await?;
                let rows = tracker.top_albums(&user_id, args.limit, args.since).await?;
                print_json(&rows)
            }
        },
    }
}

/// Run the ingestion loop until Ctrl+C, then checkpoint the store.
async fn run_poller(source: Arc<SpotifySource>, store: EventStore, config: &Config) -> Result<()> {
    let cancel_token = CancellationToken::new();

    let ctrlc_token = cancel_token.clone();
    ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    })?;

    let poller = Poller::new(source, store.clone(), &config.tracker, Some(cancel_token));
    poller.start().await?;

    store.checkpoint().await?;
    Ok(())
}

async fn resolve_user(tracker: &Tracker, identity: IdentityArgs) -> Result<String> {
    match identity.user {
        Some(user) => Ok(user),
        None => Ok(tracker.default_identity().await?),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
