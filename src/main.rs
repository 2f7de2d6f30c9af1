// src/main.rs
use crate::config::AppConfig;
use crate::connectors::kucoin::KucoinFuturesClient;
use crate::connectors::traits::ExchangeGateway;
use crate::core::engine::ControlLoop;
use crate::feeds::{KlineIndicatorFeed, NeutralSentimentFeed};
use crate::notify::LogNotifier;
use crate::strategies::scoring::ScorePolicy;
use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod connectors;
mod core;
mod error;
mod feeds;
mod notify;
mod strategies;
mod types;
mod utils;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Audit trail: everything significant goes to stdout and a daily file.
    let file_appender = tracing_appender::rolling::daily("logs", "sentinel.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    // A broken configuration is the one error that may kill the process:
    // it exits non-zero here, before any order can be placed.
    let config = AppConfig::new().context("failed to load configuration")?;
    config.validate()?;

    println!("========================================");
    println!("       THE SENTINEL - v0.1.0");
    println!("========================================");
    println!("Instrument: {}", config.symbol);
    println!("Venue:      {}", config.base_url);
    println!(
        "Risk:       -{}% stop / +{}% take-profit",
        config.risk.loss_threshold_pct,
        config.risk.take_profit_pct * rust_decimal::Decimal::ONE_HUNDRED
    );
    println!("========================================");

    let gateway = Arc::new(KucoinFuturesClient::new(
        &config.base_url,
        config.api_key.clone(),
        config.api_secret.clone(),
        &config.api_passphrase,
    )?);

    // Exercise the credentials once before the loop; an auth failure is
    // fatal now rather than a surprise mid-trade.
    gateway
        .get_balance(&config.quote_currency)
        .await
        .context("startup credential check failed")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let indicator_feed = Box::new(KlineIndicatorFeed::new(gateway.clone()));
    let mut control = ControlLoop::new(
        config,
        gateway,
        Box::new(ScorePolicy),
        indicator_feed,
        Box::new(NeutralSentimentFeed),
        Arc::new(LogNotifier),
        shutdown_rx,
    );

    if let Err(e) = control.run().await {
        eprintln!("Fatal Engine Error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
