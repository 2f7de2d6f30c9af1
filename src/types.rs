// src/types.rs
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Trade decision for one tick. Ephemeral, recomputed from fresh inputs
/// every tick and never retried once stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

/// Indicator feature set for a single timeframe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub fast_ma: f64,
    pub slow_ma: f64,
    pub price: f64,
}

/// Indicator snapshots keyed by timeframe label ("15m", "1h", ...).
pub type IndicatorSet = BTreeMap<String, IndicatorSnapshot>;

/// Venue-reported position. Ground truth, fetched fresh every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Signed contract quantity: positive = long, negative = short.
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub margin: Decimal,
    pub unrealized_pnl: Decimal,
}

impl Position {
    pub fn is_open(&self) -> bool {
        !self.quantity.is_zero()
    }

    /// Side that opened the position (long = Buy, short = Sell).
    pub fn side(&self) -> Side {
        if self.quantity.is_sign_negative() {
            Side::Sell
        } else {
            Side::Buy
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Balance {
    pub available: Decimal,
    pub committed_margin: Decimal,
}

/// Static-ish contract metadata. Cached per tick, never persisted.
#[derive(Debug, Clone)]
pub struct ContractSpec {
    pub symbol: String,
    /// Quote value of one contract per unit price.
    pub multiplier: Decimal,
    /// Minimum order size in contracts.
    pub lot_size: Decimal,
    pub max_leverage: u32,
    pub tick_size: Decimal,
}

/// Entry order request. `client_oid` is the idempotency token: a retry of
/// the same spec after a network timeout cannot create a second order.
#[derive(Debug, Clone)]
pub struct OrderSpec {
    pub client_oid: String,
    pub symbol: String,
    pub side: Side,
    /// Contracts.
    pub size: Decimal,
    pub leverage: u32,
    /// None = market order.
    pub price: Option<Decimal>,
    pub reduce_only: bool,
}

impl OrderSpec {
    pub fn market(symbol: &str, side: Side, size: Decimal, leverage: u32) -> Self {
        Self {
            client_oid: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            size,
            leverage,
            price: None,
            reduce_only: false,
        }
    }

    /// Reduce-only market order used to flatten an existing position.
    pub fn closing(symbol: &str, side: Side, size: Decimal, leverage: u32) -> Self {
        Self {
            reduce_only: true,
            ..Self::market(symbol, side, size, leverage)
        }
    }
}

/// Trigger direction for a stop order (KuCoin: "up" / "down").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDirection {
    Up,
    Down,
}

impl StopDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopDirection::Up => "up",
            StopDirection::Down => "down",
        }
    }
}

/// Protective (take-profit) trigger order. Always reduce-only.
#[derive(Debug, Clone)]
pub struct ProtectiveSpec {
    pub client_oid: String,
    pub symbol: String,
    /// Closing side (a long's take-profit sells).
    pub side: Side,
    pub stop: StopDirection,
    pub stop_price: Decimal,
    pub size: Decimal,
    pub leverage: u32,
}

impl ProtectiveSpec {
    pub fn new(
        symbol: &str,
        side: Side,
        stop: StopDirection,
        stop_price: Decimal,
        size: Decimal,
        leverage: u32,
    ) -> Self {
        Self {
            client_oid: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            stop,
            stop_price,
            size,
            leverage,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderAck {
    pub order_id: String,
    pub accepted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Filled,
    Canceled,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Entry,
    Protective,
}

/// Local record of a submitted-but-unconfirmed order. Lives for the
/// duration of one executor run; after a restart the exchange's position
/// endpoint is the source of truth, not this.
#[derive(Debug, Clone)]
pub struct PendingOrder {
    pub client_oid: String,
    pub order_id: String,
    pub submitted_at: Instant,
    pub kind: OrderKind,
}

/// Output of the position sizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Sizing {
    pub leverage: u32,
    /// Contracts.
    pub size: Decimal,
    pub notional: Decimal,
    pub required_margin: Decimal,
}

/// One executed trade from the venue's fill history.
#[derive(Debug, Clone)]
pub struct Fill {
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub trade_time_ms: i64,
}

/// Closing bar used by the indicator feed.
#[derive(Debug, Clone, Copy)]
pub struct Kline {
    pub time_ms: i64,
    pub close: f64,
}
