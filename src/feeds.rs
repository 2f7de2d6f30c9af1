// src/feeds.rs
//
// External collaborators of the control loop: indicator features and a
// news-sentiment label. Both are best-effort — a feed that cannot produce
// a value returns None and the policy holds.

use async_trait::async_trait;
use std::sync::Arc;
use ta::indicators::{RelativeStrengthIndex, SimpleMovingAverage};
use ta::Next;
use tracing::warn;

use crate::connectors::traits::ExchangeGateway;
use crate::types::{IndicatorSet, IndicatorSnapshot, Sentiment};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndicatorFeed: Send + Sync {
    async fn compute(&self, symbol: &str) -> Option<IndicatorSet>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SentimentFeed: Send + Sync {
    async fn compute(&self) -> Option<Sentiment>;
}

const RSI_PERIOD: usize = 14;
const FAST_MA_PERIOD: usize = 7;
const SLOW_MA_PERIOD: usize = 25;
const KLINE_LIMIT: usize = 60;
const TIMEFRAMES: &[(&str, u32)] = &[("15m", 15), ("1h", 60)];

/// RSI-14 and SMA-7/25 over venue klines, per timeframe. A timeframe that
/// fails to fetch or has too little history is skipped rather than erroring.
pub struct KlineIndicatorFeed<G> {
    gateway: Arc<G>,
}

impl<G: ExchangeGateway> KlineIndicatorFeed<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl<G: ExchangeGateway> IndicatorFeed for KlineIndicatorFeed<G> {
    async fn compute(&self, symbol: &str) -> Option<IndicatorSet> {
        let mut set = IndicatorSet::new();

        for &(label, minutes) in TIMEFRAMES {
            let mut klines = match self.gateway.get_klines(symbol, minutes, KLINE_LIMIT).await {
                Ok(k) => k,
                Err(e) => {
                    warn!(timeframe = label, "kline fetch failed: {e}");
                    continue;
                }
            };
            // Venue ordering is not guaranteed; indicators need oldest-first.
            klines.sort_by_key(|k| k.time_ms);
            let closes: Vec<f64> = klines.iter().map(|k| k.close).collect();
            if let Some(snapshot) = snapshot_from_closes(&closes) {
                set.insert(label.to_string(), snapshot);
            }
        }

        if set.is_empty() {
            None
        } else {
            Some(set)
        }
    }
}

fn snapshot_from_closes(closes: &[f64]) -> Option<IndicatorSnapshot> {
    if closes.len() < SLOW_MA_PERIOD {
        return None;
    }

    let mut rsi = RelativeStrengthIndex::new(RSI_PERIOD).ok()?;
    let mut fast = SimpleMovingAverage::new(FAST_MA_PERIOD).ok()?;
    let mut slow = SimpleMovingAverage::new(SLOW_MA_PERIOD).ok()?;

    let mut last = IndicatorSnapshot {
        rsi: 50.0,
        fast_ma: 0.0,
        slow_ma: 0.0,
        price: 0.0,
    };
    for &close in closes {
        last = IndicatorSnapshot {
            rsi: rsi.next(close),
            fast_ma: fast.next(close),
            slow_ma: slow.next(close),
            price: close,
        };
    }
    Some(last)
}

/// Placeholder sentiment source. News scoring lives outside this system;
/// until a real feed is wired in, the label is always Neutral, which adds
/// nothing to the score.
pub struct NeutralSentimentFeed;

#[async_trait]
impl SentimentFeed for NeutralSentimentFeed {
    async fn compute(&self) -> Option<Sentiment> {
        Some(Sentiment::Neutral)
    }
}
