// src/core/engine.rs
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::connectors::traits::ExchangeGateway;
use crate::core::executor::{ExecutionOutcome, ExecutorSettings, OrderExecutor};
use crate::core::monitor::{MonitorSettings, PositionMonitor};
use crate::core::sizer::size_order;
use crate::error::{Result, SentinelError};
use crate::feeds::{IndicatorFeed, SentimentFeed};
use crate::notify::{Cooldown, Notifier};
use crate::strategies::traits::SignalPolicy;
use crate::types::{Side, Signal};

/// Top-level scheduler. One tick runs serially: balance -> position truth
/// -> either manage the open position or look for a new entry -> sleep.
/// Network failures inside a tick degrade to a short backoff; the loop
/// itself only ends on the shutdown signal.
pub struct ControlLoop<G> {
    config: AppConfig,
    gateway: Arc<G>,
    policy: Box<dyn SignalPolicy>,
    indicator_feed: Box<dyn IndicatorFeed>,
    sentiment_feed: Box<dyn SentimentFeed>,
    notifier: Arc<dyn Notifier>,
    monitor: PositionMonitor<G>,
    executor: OrderExecutor<G>,
    low_balance_warn: Cooldown,
    shutdown: watch::Receiver<bool>,
}

impl<G: ExchangeGateway> ControlLoop<G> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AppConfig,
        gateway: Arc<G>,
        policy: Box<dyn SignalPolicy>,
        indicator_feed: Box<dyn IndicatorFeed>,
        sentiment_feed: Box<dyn SentimentFeed>,
        notifier: Arc<dyn Notifier>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let monitor = PositionMonitor::new(
            gateway.clone(),
            notifier.clone(),
            MonitorSettings::from_config(&config),
        );
        let executor = OrderExecutor::new(
            gateway.clone(),
            notifier.clone(),
            ExecutorSettings::from_config(&config.executor, &config.risk),
        );
        let low_balance_warn =
            Cooldown::new(Duration::from_secs(config.notify_cooldown_secs));

        Self {
            config,
            gateway,
            policy,
            indicator_feed,
            sentiment_feed,
            notifier,
            monitor,
            executor,
            low_balance_warn,
            shutdown,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        info!(
            symbol = %self.config.symbol,
            policy = self.policy.name(),
            "control loop starting"
        );

        loop {
            // Shutdown is honored between ticks, never mid-tick, so an
            // in-flight order state machine is not abandoned halfway.
            if *self.shutdown.borrow() {
                break;
            }

            let pause = match self.tick().await {
                Ok(pause) => pause,
                Err(e) => {
                    if e.is_retryable() {
                        warn!("tick failed, backing off: {e}");
                    } else {
                        error!("tick failed: {e}");
                        self.notifier
                            .notify(&format!("{}: tick error: {e}", self.config.symbol))
                            .await;
                    }
                    Duration::from_secs(self.config.error_backoff_secs)
                }
            };

            tokio::select! {
                _ = sleep(pause) => {}
                _ = self.shutdown.changed() => {}
            }
        }

        info!("control loop stopped");
        Ok(())
    }

    /// One tick; returns how long to sleep before the next.
    async fn tick(&mut self) -> Result<Duration> {
        let tick_pause = Duration::from_secs(self.config.tick_interval_secs);

        let balance = self
            .gateway
            .get_balance(&self.config.quote_currency)
            .await?;
        let positions = self
            .gateway
            .get_open_positions(&self.config.symbol)
            .await?;
        debug!(
            available = %balance.available,
            committed = %balance.committed_margin,
            open_positions = positions.len(),
            "tick"
        );

        // The monitor sees every tick so open->flat transitions get
        // reported; while a position is open it is the whole tick. A new
        // entry is never attempted against a non-empty position list,
        // whatever the signal would have said.
        let has_open = positions.iter().any(|p| p.is_open());
        self.monitor.tick(&positions).await?;
        if has_open {
            return Ok(tick_pause);
        }

        if balance.available < self.config.risk.min_balance {
            if self.low_balance_warn.allow() {
                warn!(
                    available = %balance.available,
                    min = %self.config.risk.min_balance,
                    "balance below minimum, not trading"
                );
                self.notifier
                    .notify(&format!(
                        "{}: available balance {} below minimum {}, holding off",
                        self.config.symbol, balance.available, self.config.risk.min_balance
                    ))
                    .await;
            }
            return Ok(Duration::from_secs(self.config.low_balance_interval_secs));
        }
        self.low_balance_warn.reset();

        let indicators = self.indicator_feed.compute(&self.config.symbol).await;
        let sentiment = self.sentiment_feed.compute().await;
        let signal = self.policy.evaluate(indicators.as_ref(), sentiment);
        info!(?signal, ?sentiment, "signal computed");

        let side = match signal {
            Signal::Hold => return Ok(tick_pause),
            Signal::Buy => Side::Buy,
            Signal::Sell => Side::Sell,
        };

        let price = self.gateway.get_price(&self.config.symbol).await?;
        let contract = self
            .gateway
            .get_contract_spec(&self.config.symbol)
            .await?;

        let sizing = match size_order(
            &balance,
            price,
            &contract,
            self.config.risk.preferred_leverage,
            self.config.risk.fallback_leverage,
        ) {
            Ok(sizing) => sizing,
            Err(SentinelError::InsufficientFunds {
                required,
                available,
            }) => {
                warn!(%required, %available, "cannot size an order, skipping signal");
                return Ok(tick_pause);
            }
            Err(e) => return Err(e),
        };

        match self
            .executor
            .open_position(side, &sizing, &contract)
            .await?
        {
            ExecutionOutcome::Protected { position, .. } => {
                self.notifier
                    .notify(&format!(
                        "{}: opened {} {} @ {} ({}x)",
                        self.config.symbol,
                        side.as_str(),
                        position.quantity,
                        position.entry_price,
                        sizing.leverage
                    ))
                    .await;
            }
            ExecutionOutcome::Aborted(reason) => {
                warn!(?reason, "entry attempt aborted");
            }
        }

        Ok(tick_pause)
    }
}
