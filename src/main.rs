// Main entry point for the YouTube queue bot
// Wires the resolver, recommendations, audio engine and queue manager
// together, then serves chat commands from stdin until it closes.

mod chat;
mod config;
mod error;
mod player;
mod youtube;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat::app::ChatApp;
use config::Config;
use player::audio::{AudioPlayer, PlaybackEngine};
use player::manager::QueueManager;
use youtube::extractor::{YouTubeExtractor, YtDlp};
use youtube::recommendations::YouTubeMix;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout is the chat channel
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tube_queue_bot=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Suppress ALSA buffer warnings on Linux
    std::env::set_var("ALSA_PCM_NO_MMAP", "1");

    let config = Config::parse();
    let volume = config
        .initial_volume()
        .context("Invalid initial volume")?;

    let ytdlp = YtDlp::new(
        config.ytdlp.clone(),
        config.cookies_path(),
        config.resolve_timeout(),
    );
    info!("Using {} for track resolution", config.ytdlp.display());

    let resolver = Arc::new(YouTubeExtractor::new(ytdlp.clone()));
    let recommender = Arc::new(YouTubeMix::new(
        ytdlp.with_timeout(config.recommend_timeout()),
        config.recommendation_limit,
    ));

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let engine = Arc::new(AudioPlayer::new(volume, events_tx));
    info!("Audio engine ready at {}% volume", engine.volume().percent());

    let queue = QueueManager::spawn(engine, resolver, recommender, events_rx);
    info!("Queue ready; reading commands from stdin");

    let app = ChatApp::new(queue);
    app.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("Chat transport failed")?;

    Ok(())
}
