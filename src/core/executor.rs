// src/core/executor.rs
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use tracing::{error, info, warn};

use crate::config::{ExecutorConfig, RiskConfig};
use crate::connectors::traits::ExchangeGateway;
use crate::error::{Result, SentinelError};
use crate::notify::Notifier;
use crate::types::{
    ContractSpec, OrderAck, OrderKind, OrderSpec, OrderStatus, PendingOrder, Position,
    ProtectiveSpec, Side, Sizing, StopDirection,
};
use crate::utils::precision::round_to_tick;

/// Why an entry attempt ended without a protected position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The venue canceled the entry order before it filled.
    EntryCanceled,
    /// The fill wait deadline passed.
    EntryTimeout,
    /// Status poll said filled but the position endpoint shows flat.
    PositionNotConfirmed,
    /// Protective order retries exhausted. The position stays open; the
    /// monitor's stop-loss check is the safety net.
    ProtectiveFailed,
    /// Computed trigger price failed local validation.
    InvalidPrice,
}

#[derive(Debug)]
pub enum ExecutionOutcome {
    /// Entry filled, position confirmed, protective order accepted.
    Protected {
        position: Position,
        protective_order_id: String,
    },
    Aborted(AbortReason),
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub entry_wait: Duration,
    pub poll_interval: Duration,
    pub submit_attempts: u32,
    pub protective_attempts: u32,
    pub retry_delay: Duration,
    pub cancel_entry_on_timeout: bool,
    pub take_profit_pct: Decimal,
}

impl ExecutorSettings {
    pub fn from_config(executor: &ExecutorConfig, risk: &RiskConfig) -> Self {
        Self {
            entry_wait: Duration::from_secs(executor.entry_wait_secs),
            poll_interval: Duration::from_secs(executor.poll_interval_secs),
            submit_attempts: executor.submit_attempts.max(1),
            protective_attempts: executor.protective_attempts.max(1),
            retry_delay: Duration::from_secs(executor.retry_delay_secs),
            cancel_entry_on_timeout: executor.cancel_entry_on_timeout,
            take_profit_pct: risk.take_profit_pct,
        }
    }
}

/// Two-phase open protocol: submit entry, poll to fill, corroborate the
/// position against exchange truth, then place the reduce-only take-profit.
/// Every phase has bounded retries; every write reuses its clientOid so a
/// retransmission after a timeout cannot double an order.
pub struct OrderExecutor<G> {
    gateway: Arc<G>,
    notifier: Arc<dyn Notifier>,
    settings: ExecutorSettings,
}

impl<G: ExchangeGateway> OrderExecutor<G> {
    pub fn new(gateway: Arc<G>, notifier: Arc<dyn Notifier>, settings: ExecutorSettings) -> Self {
        Self {
            gateway,
            notifier,
            settings,
        }
    }

    /// Runs the full state machine for one entry intent.
    ///
    /// Returns Err only when the entry submission itself could not get an
    /// answer out of the venue (retries exhausted or a semantic rejection);
    /// everything past that point resolves to an ExecutionOutcome.
    pub async fn open_position(
        &self,
        side: Side,
        sizing: &Sizing,
        contract: &ContractSpec,
    ) -> Result<ExecutionOutcome> {
        // Idle -> EntrySubmitted
        let entry_spec =
            OrderSpec::market(&contract.symbol, side, sizing.size, sizing.leverage);
        let ack = self.submit_entry(&entry_spec).await?;
        let pending = PendingOrder {
            client_oid: entry_spec.client_oid.clone(),
            order_id: ack.order_id,
            submitted_at: Instant::now(),
            kind: OrderKind::Entry,
        };
        info!(
            order_id = %pending.order_id,
            client_oid = %pending.client_oid,
            kind = ?pending.kind,
            side = side.as_str(),
            size = %sizing.size,
            leverage = sizing.leverage,
            "entry order submitted"
        );

        // EntrySubmitted -> EntryFilled | Aborted
        match self.wait_for_fill(&pending).await {
            FillWait::Filled => {}
            FillWait::Canceled => {
                warn!(order_id = %pending.order_id, "entry order canceled by venue");
                return Ok(ExecutionOutcome::Aborted(AbortReason::EntryCanceled));
            }
            FillWait::TimedOut => {
                warn!(
                    order_id = %pending.order_id,
                    cancel = self.settings.cancel_entry_on_timeout,
                    "entry order not filled within deadline"
                );
                if self.settings.cancel_entry_on_timeout {
                    if let Err(e) = self.gateway.cancel_order(&pending.order_id).await {
                        warn!("failed to cancel timed-out entry: {e}");
                    }
                }
                return Ok(ExecutionOutcome::Aborted(AbortReason::EntryTimeout));
            }
        }

        // EntryFilled -> ProtectivePending: corroborate against position truth
        let positions = self.gateway.get_open_positions(&contract.symbol).await?;
        let position = match positions.into_iter().find(|p| p.is_open()) {
            Some(p) => p,
            None => {
                error!(
                    order_id = %pending.order_id,
                    "fill reported but position endpoint shows flat"
                );
                self.notifier
                    .notify(&format!(
                        "{}: entry fill not corroborated by position query, aborting before protective order",
                        contract.symbol
                    ))
                    .await;
                return Ok(ExecutionOutcome::Aborted(AbortReason::PositionNotConfirmed));
            }
        };

        // ProtectivePending -> ProtectiveConfirmed | Aborted
        let trigger = protective_trigger(
            side,
            position.entry_price,
            self.settings.take_profit_pct,
            contract.tick_size,
        );
        if trigger <= Decimal::ZERO {
            error!(%trigger, "computed protective trigger is not positive");
            return Ok(ExecutionOutcome::Aborted(AbortReason::InvalidPrice));
        }

        let stop = match side {
            Side::Buy => StopDirection::Up,
            Side::Sell => StopDirection::Down,
        };
        let protective_spec = ProtectiveSpec::new(
            &contract.symbol,
            side.opposite(),
            stop,
            trigger,
            position.quantity.abs(),
            sizing.leverage,
        );

        match self.submit_protective(&protective_spec).await {
            Some(order_id) => {
                info!(
                    %order_id,
                    %trigger,
                    "take-profit accepted, position protected"
                );
                Ok(ExecutionOutcome::Protected {
                    position,
                    protective_order_id: order_id,
                })
            }
            None => {
                self.notifier
                    .notify(&format!(
                        "{}: LIVE POSITION WITHOUT PROTECTIVE ORDER ({} @ {}), relying on monitor stop-loss",
                        contract.symbol,
                        side.as_str(),
                        position.entry_price
                    ))
                    .await;
                Ok(ExecutionOutcome::Aborted(AbortReason::ProtectiveFailed))
            }
        }
    }

    /// Entry submission with bounded retries on retryable failures. The
    /// OrderSpec (and its clientOid) is fixed across attempts.
    async fn submit_entry(&self, spec: &OrderSpec) -> Result<OrderAck> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.gateway.submit_order(spec).await {
                Ok(ack) if ack.accepted => return Ok(ack),
                Ok(_) => {
                    return Err(SentinelError::StateInconsistency(
                        "venue acknowledged the entry order without accepting it".to_string(),
                    ))
                }
                Err(e) if e.is_retryable() && attempt < self.settings.submit_attempts => {
                    warn!(attempt, client_oid = %spec.client_oid, "entry submit failed, retrying: {e}");
                    sleep(self.settings.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Polls order status until filled, canceled, or the deadline passes.
    /// Read errors during the wait are transient by definition here — the
    /// deadline bounds them.
    async fn wait_for_fill(&self, pending: &PendingOrder) -> FillWait {
        let deadline = pending.submitted_at + self.settings.entry_wait;
        loop {
            sleep(self.settings.poll_interval).await;

            match self.gateway.get_order_status(&pending.order_id).await {
                Ok(OrderStatus::Filled) => return FillWait::Filled,
                Ok(OrderStatus::Canceled) => return FillWait::Canceled,
                Ok(OrderStatus::Pending) | Ok(OrderStatus::Unknown) => {}
                Err(e) => {
                    warn!(order_id = %pending.order_id, "status poll failed: {e}");
                }
            }

            if Instant::now() >= deadline {
                return FillWait::TimedOut;
            }
        }
    }

    /// Fixed-backoff retries for the protective order; venue rejections and
    /// network errors both count against the budget. Same clientOid across
    /// attempts.
    async fn submit_protective(&self, spec: &ProtectiveSpec) -> Option<String> {
        for attempt in 1..=self.settings.protective_attempts {
            match self.gateway.submit_protective_order(spec).await {
                Ok(ack) if ack.accepted => {
                    let pending = PendingOrder {
                        client_oid: spec.client_oid.clone(),
                        order_id: ack.order_id,
                        submitted_at: Instant::now(),
                        kind: OrderKind::Protective,
                    };
                    info!(
                        order_id = %pending.order_id,
                        kind = ?pending.kind,
                        "protective order accepted"
                    );
                    return Some(pending.order_id);
                }
                Ok(_) => {
                    warn!(attempt, client_oid = %spec.client_oid, "protective order not accepted");
                    if attempt < self.settings.protective_attempts {
                        sleep(self.settings.retry_delay).await;
                    }
                }
                Err(e) => {
                    warn!(
                        attempt,
                        client_oid = %spec.client_oid,
                        "protective submit failed: {e}"
                    );
                    if attempt < self.settings.protective_attempts {
                        sleep(self.settings.retry_delay).await;
                    }
                }
            }
        }
        None
    }
}

enum FillWait {
    Filled,
    Canceled,
    TimedOut,
}

/// Take-profit trigger: entry shifted by the configured fraction in the
/// profitable direction, rounded to the nearest tick.
pub fn protective_trigger(
    side: Side,
    entry_price: Decimal,
    take_profit_pct: Decimal,
    tick_size: Decimal,
) -> Decimal {
    let raw = match side {
        Side::Buy => entry_price * (Decimal::ONE + take_profit_pct),
        Side::Sell => entry_price * (Decimal::ONE - take_profit_pct),
    };
    round_to_tick(raw, tick_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::traits::MockExchangeGateway;
    use crate::notify::MockNotifier;
    use crate::types::OrderAck;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn contract() -> ContractSpec {
        ContractSpec {
            symbol: "ETHUSDTM".to_string(),
            multiplier: dec!(0.001),
            lot_size: dec!(1),
            max_leverage: 20,
            tick_size: dec!(0.01),
        }
    }

    fn sizing() -> Sizing {
        Sizing {
            leverage: 5,
            size: dec!(125),
            notional: dec!(250),
            required_margin: dec!(50),
        }
    }

    fn settings() -> ExecutorSettings {
        ExecutorSettings {
            entry_wait: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            submit_attempts: 3,
            protective_attempts: 3,
            retry_delay: Duration::from_secs(2),
            cancel_entry_on_timeout: false,
            take_profit_pct: dec!(0.01),
        }
    }

    fn open_long() -> Position {
        Position {
            symbol: "ETHUSDTM".to_string(),
            quantity: dec!(125),
            entry_price: dec!(2000),
            margin: dec!(50),
            unrealized_pnl: Decimal::ZERO,
        }
    }

    fn quiet_notifier() -> Arc<MockNotifier> {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().return_const(());
        Arc::new(notifier)
    }

    #[test]
    fn trigger_prices_round_to_tick() {
        assert_eq!(
            protective_trigger(Side::Buy, dec!(2000), dec!(0.01), dec!(0.01)),
            dec!(2020.00)
        );
        assert_eq!(
            protective_trigger(Side::Sell, dec!(2000), dec!(0.01), dec!(0.01)),
            dec!(1980.00)
        );
        // nearest, not truncated
        assert_eq!(
            protective_trigger(Side::Buy, dec!(1999.99), dec!(0.01), dec!(0.1)),
            dec!(2020.0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retried_entry_submissions_reuse_one_token() {
        let mut gateway = MockExchangeGateway::new();
        let seen: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

        let seen_clone = seen.clone();
        let calls = Arc::new(Mutex::new(0u32));
        let calls_clone = calls.clone();
        gateway.expect_submit_order().returning(move |spec| {
            seen_clone.lock().unwrap().insert(spec.client_oid.clone());
            let mut n = calls_clone.lock().unwrap();
            *n += 1;
            if *n < 3 {
                Err(SentinelError::Network("timeout".to_string()))
            } else {
                Ok(OrderAck {
                    order_id: "oid-1".to_string(),
                    accepted: true,
                })
            }
        });
        gateway
            .expect_get_order_status()
            .returning(|_| Ok(OrderStatus::Filled));
        gateway
            .expect_get_open_positions()
            .returning(|_| Ok(vec![open_long()]));
        gateway.expect_submit_protective_order().returning(|_| {
            Ok(OrderAck {
                order_id: "tp-1".to_string(),
                accepted: true,
            })
        });

        let executor = OrderExecutor::new(Arc::new(gateway), quiet_notifier(), settings());
        let outcome = executor
            .open_position(Side::Buy, &sizing(), &contract())
            .await
            .unwrap();

        // Three physical submissions, one logical order: the venue
        // deduplicates by clientOid and we sent exactly one.
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(matches!(outcome, ExecutionOutcome::Protected { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn fill_timeout_aborts_without_protective_order() {
        let mut gateway = MockExchangeGateway::new();
        gateway.expect_submit_order().returning(|_| {
            Ok(OrderAck {
                order_id: "oid-2".to_string(),
                accepted: true,
            })
        });
        gateway
            .expect_get_order_status()
            .returning(|_| Ok(OrderStatus::Pending));
        gateway.expect_submit_protective_order().times(0);
        gateway.expect_cancel_order().times(0);

        let executor = OrderExecutor::new(Arc::new(gateway), quiet_notifier(), settings());
        let outcome = executor
            .open_position(Side::Buy, &sizing(), &contract())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ExecutionOutcome::Aborted(AbortReason::EntryTimeout)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_entry_is_canceled_when_configured() {
        let mut gateway = MockExchangeGateway::new();
        gateway.expect_submit_order().returning(|_| {
            Ok(OrderAck {
                order_id: "oid-3".to_string(),
                accepted: true,
            })
        });
        gateway
            .expect_get_order_status()
            .returning(|_| Ok(OrderStatus::Pending));
        gateway
            .expect_cancel_order()
            .times(1)
            .returning(|_| Ok(()));

        let mut cfg = settings();
        cfg.cancel_entry_on_timeout = true;
        let executor = OrderExecutor::new(Arc::new(gateway), quiet_notifier(), cfg);
        let outcome = executor
            .open_position(Side::Sell, &sizing(), &contract())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ExecutionOutcome::Aborted(AbortReason::EntryTimeout)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn canceled_entry_aborts() {
        let mut gateway = MockExchangeGateway::new();
        gateway.expect_submit_order().returning(|_| {
            Ok(OrderAck {
                order_id: "oid-4".to_string(),
                accepted: true,
            })
        });
        gateway
            .expect_get_order_status()
            .returning(|_| Ok(OrderStatus::Canceled));
        gateway.expect_submit_protective_order().times(0);

        let executor = OrderExecutor::new(Arc::new(gateway), quiet_notifier(), settings());
        let outcome = executor
            .open_position(Side::Buy, &sizing(), &contract())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ExecutionOutcome::Aborted(AbortReason::EntryCanceled)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn phantom_fill_never_reaches_protective_phase() {
        let mut gateway = MockExchangeGateway::new();
        gateway.expect_submit_order().returning(|_| {
            Ok(OrderAck {
                order_id: "oid-5".to_string(),
                accepted: true,
            })
        });
        gateway
            .expect_get_order_status()
            .returning(|_| Ok(OrderStatus::Filled));
        gateway
            .expect_get_open_positions()
            .returning(|_| Ok(vec![]));
        gateway.expect_submit_protective_order().times(0);

        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).return_const(());

        let executor = OrderExecutor::new(Arc::new(gateway), Arc::new(notifier), settings());
        let outcome = executor
            .open_position(Side::Buy, &sizing(), &contract())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ExecutionOutcome::Aborted(AbortReason::PositionNotConfirmed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn protective_exhaustion_leaves_position_and_notifies() {
        let mut gateway = MockExchangeGateway::new();
        gateway.expect_submit_order().returning(|_| {
            Ok(OrderAck {
                order_id: "oid-6".to_string(),
                accepted: true,
            })
        });
        gateway
            .expect_get_order_status()
            .returning(|_| Ok(OrderStatus::Filled));
        gateway
            .expect_get_open_positions()
            .returning(|_| Ok(vec![open_long()]));
        gateway
            .expect_submit_protective_order()
            .times(3)
            .returning(|_| {
                Err(SentinelError::Venue {
                    code: "100002".to_string(),
                    message: "rejected".to_string(),
                })
            });
        // No auto-close of the live position.
        gateway.expect_cancel_all_orders().times(0);

        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).return_const(());

        let executor = OrderExecutor::new(Arc::new(gateway), Arc::new(notifier), settings());
        let outcome = executor
            .open_position(Side::Buy, &sizing(), &contract())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ExecutionOutcome::Aborted(AbortReason::ProtectiveFailed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn venue_rejection_of_entry_propagates() {
        let mut gateway = MockExchangeGateway::new();
        gateway.expect_submit_order().times(1).returning(|_| {
            Err(SentinelError::Venue {
                code: "300003".to_string(),
                message: "insufficient margin".to_string(),
            })
        });
        gateway.expect_get_order_status().times(0);

        let executor = OrderExecutor::new(Arc::new(gateway), quiet_notifier(), settings());
        let err = executor
            .open_position(Side::Buy, &sizing(), &contract())
            .await
            .unwrap_err();

        assert!(matches!(err, SentinelError::Venue { .. }));
    }
}
