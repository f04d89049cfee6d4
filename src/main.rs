//! Daily Drill - Telegram bot sending daily language exercises
//!
//! Users subscribe to drills through multi-step inline-keyboard dialogues;
//! a per-subscription timer delivers each drill at the chosen local time.

mod bot;
mod config;
mod conversations;
mod drill;
mod runtime;
mod scheduler;
mod state_machine;
mod store;
mod telegram;

use bot::{Bot, COMMANDS};
use config::BotConfig;
use drill::Exercises;
use scheduler::Scheduler;
use std::sync::Arc;
use std::time::Duration;
use store::SubscriptionStore;
use telegram::TelegramClient;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const REAP_INTERVAL: Duration = Duration::from_secs(60);
const EVENT_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daily_drill=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = BotConfig::from_env()?;
    tracing::info!(?config, "Starting daily drill bot");

    tracing::info!(path = %config.data_dir.display(), "Opening subscription storage");
    let store = Arc::new(SubscriptionStore::open(&config.data_dir)?);

    let client = Arc::new(TelegramClient::new(
        config.token.clone(),
        config.poll_timeout,
    )?);
    let exercises = Arc::new(Exercises::new());

    // Resume every stored subscription
    let scheduler = Scheduler::new(
        Arc::clone(&client),
        Arc::clone(&exercises),
        config.data_dir.clone(),
    );
    let restored = scheduler.restore(&store)?;
    tracing::info!(restored, "Subscriptions scheduled");

    let bot = Bot::new(
        Arc::clone(&client),
        store,
        scheduler.clone(),
        exercises,
        config.conversation_timeout,
    )?;

    if let Err(e) = client.set_commands(COMMANDS).await {
        tracing::warn!(error = %e, "Failed to publish command menu");
    }

    let cancel = CancellationToken::new();
    let reaper = runtime::spawn_reaper(bot.engines(), REAP_INTERVAL, cancel.clone());

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Shutdown requested");
        }
        () = bot.run(rx) => {}
        () = client.listen(tx) => {}
    }

    scheduler.shutdown();
    cancel.cancel();
    reaper.await?;
    tracing::info!("Daily drill bot stopped");

    Ok(())
}
