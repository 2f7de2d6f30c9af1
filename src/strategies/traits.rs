// src/strategies/traits.rs
use crate::types::{IndicatorSet, Sentiment, Signal};

/// Scoring seam: indicators + sentiment in, discrete decision out.
///
/// Implementations must be pure — same inputs, same Signal, no clocks or
/// randomness — so a tick can be replayed in tests. This is the one place
/// domain tuning happens; everything downstream treats the Signal as given.
pub trait SignalPolicy: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, indicators: Option<&IndicatorSet>, sentiment: Option<Sentiment>)
        -> Signal;
}
