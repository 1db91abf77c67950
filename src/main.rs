use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;

use stonks_tracker::chat::helix::LivenessPoller;
use stonks_tracker::chat::irc::ChatListener;
use stonks_tracker::config::Config;
use stonks_tracker::engine::PriceParams;
use stonks_tracker::hub::BroadcastHub;
use stonks_tracker::scheduler::TickScheduler;
use stonks_tracker::server::{self, AppContext};
use stonks_tracker::status::StatusTracker;
use stonks_tracker::store::HistoryStore;
use stonks_tracker::tally::KeywordTally;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Make sure .env exists with TWITCH_BOT_USERNAME, TWITCH_OAUTH_TOKEN and TWITCH_CHANNEL");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                config
                    .log_level
                    .parse()
                    .unwrap_or_else(|_| "info".parse().unwrap())
            }),
        )
        .init();

    tracing::info!(
        channel = %config.twitch.channel,
        up_keyword = %config.market.up_keyword,
        down_keyword = %config.market.down_keyword,
        tick_interval_secs = config.market.tick_interval.as_secs(),
        "Starting stonks-tracker"
    );

    // Shared state
    let tally = Arc::new(KeywordTally::new());
    let status = Arc::new(StatusTracker::new(
        &config.market.up_keyword,
        &config.market.down_keyword,
        config.market.tick_interval,
    ));
    let hub = Arc::new(BroadcastHub::new());
    let store = HistoryStore::new(&config.server.database_path);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Chat listener
    let listener = ChatListener::new(
        &config.twitch.bot_username,
        &config.twitch.oauth_token,
        &config.twitch.channel,
        &config.market.up_keyword,
        &config.market.down_keyword,
        Arc::clone(&tally),
        Arc::clone(&status),
        Arc::clone(&hub),
    );
    let listener_shutdown = shutdown_rx.clone();
    let listener_handle = tokio::spawn(async move {
        if let Err(e) = listener.connect_and_run(listener_shutdown).await {
            tracing::error!(error = %e, "Chat listener failed");
        }
    });

    // Stream liveness poller
    let poller = LivenessPoller::new(
        &config.twitch.client_id,
        &config.twitch.client_secret,
        &config.twitch.channel,
        std::time::Duration::from_secs(config.twitch.liveness_poll_secs),
        Arc::clone(&status),
        Arc::clone(&hub),
    );
    let poller_handle = tokio::spawn(poller.run(shutdown_rx.clone()));

    // Tick scheduler
    let scheduler = TickScheduler::new(
        config.market.tick_interval,
        PriceParams {
            volatility: config.market.volatility_factor,
            floor_price: config.market.floor_price,
        },
        config.market.initial_price,
        Arc::clone(&tally),
        Arc::clone(&status),
        Arc::clone(&hub),
        store.clone(),
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx.clone()));

    // HTTP/WS server
    let ctx = AppContext {
        status: Arc::clone(&status),
        hub: Arc::clone(&hub),
        store,
        channel: config.twitch.channel.clone(),
        initial_price: config.market.initial_price,
    };
    let app = server::router(ctx, &config.server.allowed_origins);
    let listener_addr = &config.server.listen_addr;
    let tcp = tokio::net::TcpListener::bind(listener_addr.as_str())
        .await
        .with_context(|| format!("failed to bind {}", listener_addr))?;
    tracing::info!(addr = %listener_addr, "Listening");

    let mut server_shutdown = shutdown_rx.clone();
    let server_handle = tokio::spawn(async move {
        let shutdown = async move {
            let _ = server_shutdown.changed().await;
        };
        if let Err(e) = axum::serve(tcp, app).with_graceful_shutdown(shutdown).await {
            tracing::error!(error = %e, "Server failed");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    tracing::info!("Ctrl+C received");

    let _ = shutdown_tx.send(true);
    hub.close_all();

    let _ = listener_handle.await;
    let _ = poller_handle.await;
    let _ = scheduler_handle.await;
    let _ = server_handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
