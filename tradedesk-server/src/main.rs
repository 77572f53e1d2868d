use anyhow::Result;
use axum::{http::StatusCode, response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};

use tradedesk_core::{Bot, Store, StorePaths};
use tradedesk_server::commands::command_definitions;
use tradedesk_server::config::Config;
use tradedesk_server::sweeper::trade_sweep_loop;
use tradedesk_server::webhook::interactions_router;
use tradedesk_server::{AppState, DiscordClient};

async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "tradedesk",
        "version": tradedesk_server::get_bot_version()
    })))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!(
        "Starting tradedesk bot ({})",
        tradedesk_server::get_bot_version()
    );

    let config =
        Config::from_env().expect("Failed to load configuration from environment variables");

    let discord = DiscordClient::new(
        config.bot_token.clone(),
        config.application_id,
        config.guild_id,
    )?;

    if let Err(e) = discord.register_commands(&command_definitions()).await {
        error!("Failed to register slash commands: {:#}", e);
    }

    let paths = StorePaths::in_dir(&config.state_dir);
    info!(
        "Using state files {} and {}",
        paths.vouches.display(),
        paths.tickets.display()
    );
    let store = Store::load(paths).await;

    let bot = Arc::new(Bot::new(config.guild, store, Arc::new(discord)));

    let app_state = Arc::new(AppState {
        bot: bot.clone(),
        public_key: config.public_key,
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(interactions_router(app_state.clone()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state);

    tokio::spawn(async move {
        trade_sweep_loop(bot).await;
    });

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
