// src/core/monitor.rs
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::connectors::traits::ExchangeGateway;
use crate::error::Result;
use crate::notify::Notifier;
use crate::types::{OrderSpec, Position, Side};

/// What the monitor concluded for this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorOutcome {
    Flat,
    Holding { pnl_pct: Decimal },
    EmergencyClosed { pnl_pct: Decimal },
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Positive percentage; a pnl of -loss_threshold_pct or worse closes.
    pub loss_threshold_pct: Decimal,
    /// Freshness window for the cached price read.
    pub price_ttl: Duration,
    pub close_attempts: u32,
    pub retry_delay: Duration,
}

impl MonitorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            loss_threshold_pct: config.risk.loss_threshold_pct,
            price_ttl: Duration::from_secs(5),
            close_attempts: config.executor.submit_attempts.max(1),
            retry_delay: Duration::from_secs(config.executor.retry_delay_secs),
        }
    }
}

/// Watches the open position each tick and pulls the emergency brake when
/// the loss threshold is breached. This polling check is the authoritative
/// stop-loss; any venue-side protective order is extra, not load-bearing.
///
/// Carries the only cross-tick state in the system: a short-lived price
/// cache and the previous tick's position, both plain fields scoped to
/// this instance.
pub struct PositionMonitor<G> {
    gateway: Arc<G>,
    notifier: Arc<dyn Notifier>,
    settings: MonitorSettings,
    cached_price: Option<(Instant, Decimal)>,
    last_position: Option<Position>,
}

impl<G: ExchangeGateway> PositionMonitor<G> {
    pub fn new(gateway: Arc<G>, notifier: Arc<dyn Notifier>, settings: MonitorSettings) -> Self {
        Self {
            gateway,
            notifier,
            settings,
            cached_price: None,
            last_position: None,
        }
    }

    /// One monitoring pass over the venue-reported positions for the tick.
    pub async fn tick(&mut self, positions: &[Position]) -> Result<MonitorOutcome> {
        let open = positions.iter().find(|p| p.is_open());

        let position = match open {
            Some(p) => p.clone(),
            None => {
                if let Some(closed) = self.last_position.take() {
                    self.report_closure(&closed).await;
                }
                return Ok(MonitorOutcome::Flat);
            }
        };

        if positions.iter().filter(|p| p.is_open()).count() > 1 {
            warn!(
                symbol = %position.symbol,
                "venue reports more than one open position; managing the first"
            );
        }

        let price = self.fresh_price(&position.symbol).await?;
        let pnl_pct = pnl_percent(&position, price);
        info!(
            symbol = %position.symbol,
            side = position.side().as_str(),
            entry = %position.entry_price,
            current = %price,
            pnl_pct = %pnl_pct,
            margin = %position.margin,
            venue_pnl = %position.unrealized_pnl,
            "position check"
        );

        if pnl_pct <= -self.settings.loss_threshold_pct {
            self.emergency_close(&position, price, pnl_pct).await?;
            self.last_position = None;
            return Ok(MonitorOutcome::EmergencyClosed { pnl_pct });
        }

        self.last_position = Some(position);
        Ok(MonitorOutcome::Holding { pnl_pct })
    }

    /// Price read bounded by the freshness window, so monitoring does not
    /// multiply API volume while still catching fast moves.
    async fn fresh_price(&mut self, symbol: &str) -> Result<Decimal> {
        if let Some((at, price)) = self.cached_price {
            if at.elapsed() < self.settings.price_ttl {
                return Ok(price);
            }
        }
        let price = self.gateway.get_price(symbol).await?;
        self.cached_price = Some((Instant::now(), price));
        Ok(price)
    }

    /// Reduce-only market close of the full signed quantity, bounded
    /// retries with a stable clientOid, then cancellation of whatever
    /// protective orders are now orphaned.
    async fn emergency_close(
        &self,
        position: &Position,
        price: Decimal,
        pnl_pct: Decimal,
    ) -> Result<()> {
        error!(
            symbol = %position.symbol,
            pnl_pct = %pnl_pct,
            "loss threshold breached, closing position"
        );

        let close_spec = OrderSpec::closing(
            &position.symbol,
            position.side().opposite(),
            position.quantity.abs(),
            1,
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.gateway.submit_order(&close_spec).await {
                Ok(ack) => {
                    info!(order_id = %ack.order_id, "emergency close submitted");
                    break;
                }
                Err(e) if attempt < self.settings.close_attempts => {
                    warn!(attempt, "emergency close failed, retrying: {e}");
                    sleep(self.settings.retry_delay).await;
                }
                Err(e) => {
                    self.notifier
                        .notify(&format!(
                            "{}: EMERGENCY CLOSE FAILED after {} attempts: {}",
                            position.symbol, attempt, e
                        ))
                        .await;
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.gateway.cancel_all_orders(&position.symbol).await {
            warn!("failed to cancel orphaned orders: {e}");
        }

        self.notifier
            .notify(&format!(
                "{}: position closed at {} ({}% unrealized), loss threshold {}%",
                position.symbol, price, pnl_pct, self.settings.loss_threshold_pct
            ))
            .await;
        Ok(())
    }

    /// The position disappeared between ticks (take-profit fired, manual
    /// close, liquidation). Best-effort fill lookup for the report; a
    /// failure here must not disturb the loop.
    async fn report_closure(&self, closed: &Position) {
        let detail = match self.gateway.get_recent_fills(&closed.symbol).await {
            Ok(fills) => fills
                .into_iter()
                .filter(|f| f.symbol == closed.symbol && f.side == closed.side().opposite())
                .max_by_key(|f| f.trade_time_ms)
                .map(|f| format!("closing fill: {} {} @ {}", f.side.as_str(), f.size, f.price))
                .unwrap_or_else(|| "no closing fill found".to_string()),
            Err(e) => {
                warn!("fill lookup after closure failed: {e}");
                "fill history unavailable".to_string()
            }
        };

        info!(symbol = %closed.symbol, %detail, "position closed since last tick");
        self.notifier
            .notify(&format!(
                "{}: position closed since last tick ({})",
                closed.symbol, detail
            ))
            .await;
    }
}

/// Unrealized move from entry in percent, signed so that losses are
/// negative for both sides.
pub fn pnl_percent(position: &Position, current: Decimal) -> Decimal {
    if position.entry_price.is_zero() {
        return Decimal::ZERO;
    }
    let hundred = Decimal::ONE_HUNDRED;
    match position.side() {
        Side::Buy => (current - position.entry_price) / position.entry_price * hundred,
        Side::Sell => (position.entry_price - current) / position.entry_price * hundred,
    }
}
