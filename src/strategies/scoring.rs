// src/strategies/scoring.rs
use tracing::debug;

use crate::strategies::traits::SignalPolicy;
use crate::types::{IndicatorSet, Sentiment, Signal};

const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_WEIGHT: f64 = 0.2;
const MA_CROSS_WEIGHT: f64 = 0.1;
const SENTIMENT_WEIGHT: f64 = 0.3;
const DECISION_THRESHOLD: f64 = 0.3;

/// Additive multi-timeframe score.
///
/// Per timeframe: +0.2 oversold RSI, -0.2 overbought, +0.1 fast MA above
/// slow. Sentiment adds +/-0.3. |score| >= 0.3 decides; anything absent
/// contributes nothing, and with no sentiment or no indicators at all the
/// engine never guesses — it holds.
pub struct ScorePolicy;

impl SignalPolicy for ScorePolicy {
    fn name(&self) -> &str {
        "score"
    }

    fn evaluate(
        &self,
        indicators: Option<&IndicatorSet>,
        sentiment: Option<Sentiment>,
    ) -> Signal {
        let (indicators, sentiment) = match (indicators, sentiment) {
            (Some(i), Some(s)) if !i.is_empty() => (i, s),
            _ => return Signal::Hold,
        };

        let mut score = 0.0;
        for (timeframe, snap) in indicators {
            if snap.rsi < RSI_OVERSOLD {
                score += RSI_WEIGHT;
            } else if snap.rsi > RSI_OVERBOUGHT {
                score -= RSI_WEIGHT;
            }
            if snap.fast_ma > snap.slow_ma {
                score += MA_CROSS_WEIGHT;
            }
            debug!(timeframe, rsi = snap.rsi, score, "scored timeframe");
        }

        score += match sentiment {
            Sentiment::Bullish => SENTIMENT_WEIGHT,
            Sentiment::Bearish => -SENTIMENT_WEIGHT,
            Sentiment::Neutral => 0.0,
        };

        if score >= DECISION_THRESHOLD {
            Signal::Buy
        } else if score <= -DECISION_THRESHOLD {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}
