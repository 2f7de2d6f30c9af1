// src/config.rs

use config::{Config, ConfigError, File};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::SentinelError;

#[derive(Debug, Deserialize, Clone)]
pub struct RiskConfig {
    /// Unrealized loss (in percent, positive number) that triggers the
    /// emergency close.
    #[serde(default = "default_loss_threshold")]
    pub loss_threshold_pct: Decimal,
    /// Take-profit distance from entry, as a fraction (0.01 = 1%).
    #[serde(default = "default_take_profit")]
    pub take_profit_pct: Decimal,
    /// New entries are blocked below this available balance.
    #[serde(default = "default_min_balance")]
    pub min_balance: Decimal,
    #[serde(default = "default_preferred_leverage")]
    pub preferred_leverage: u32,
    #[serde(default = "default_fallback_leverage")]
    pub fallback_leverage: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExecutorConfig {
    /// Total wait for an entry fill before aborting.
    #[serde(default = "default_entry_wait")]
    pub entry_wait_secs: u64,
    /// Interval between order-status polls while waiting for a fill.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Attempts for an order submission hit by network errors.
    #[serde(default = "default_attempts")]
    pub submit_attempts: u32,
    /// Attempts for the protective order before giving up.
    #[serde(default = "default_attempts")]
    pub protective_attempts: u32,
    /// Fixed delay between retry attempts.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    /// Whether an entry that timed out waiting for a fill is actively
    /// canceled or left resting on the book. Deployment policy.
    #[serde(default)]
    pub cancel_entry_on_timeout: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub api_secret: String,
    pub api_passphrase: String,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_quote_currency")]
    pub quote_currency: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Standard sleep between ticks, applied whether or not work was done.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Longer sleep while balance is below the minimum.
    #[serde(default = "default_low_balance_interval")]
    pub low_balance_interval_secs: u64,
    /// Sleep after a tick fails on a network error.
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,
    /// Minimum gap between repeated notifications of the same condition.
    #[serde(default = "default_notify_cooldown")]
    pub notify_cooldown_secs: u64,
    #[serde(default = "default_risk")]
    pub risk: RiskConfig,
    #[serde(default = "default_executor")]
    pub executor: ExecutorConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("Settings").required(false))
            .add_source(config::Environment::with_prefix("SENTINEL"));

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Credentials are the only settings with no usable default; a blank
    /// key must stop the process before the loop starts.
    pub fn validate(&self) -> Result<(), SentinelError> {
        if self.api_key.is_empty() || self.api_secret.is_empty() || self.api_passphrase.is_empty()
        {
            return Err(SentinelError::Config(
                "missing API credentials (SENTINEL_API_KEY / SENTINEL_API_SECRET / SENTINEL_API_PASSPHRASE)"
                    .to_string(),
            ));
        }
        if self.risk.fallback_leverage == 0 || self.risk.preferred_leverage == 0 {
            return Err(SentinelError::Config(
                "leverage settings must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_symbol() -> String {
    "ETHUSDTM".to_string()
}

fn default_quote_currency() -> String {
    "USDT".to_string()
}

fn default_base_url() -> String {
    "https://api-futures.kucoin.com".to_string()
}

fn default_tick_interval() -> u64 {
    60
}

fn default_low_balance_interval() -> u64 {
    300
}

fn default_error_backoff() -> u64 {
    15
}

fn default_notify_cooldown() -> u64 {
    3600
}

fn default_loss_threshold() -> Decimal {
    Decimal::new(2, 0) // 2%
}

fn default_take_profit() -> Decimal {
    Decimal::new(1, 2) // 0.01 = 1%
}

fn default_min_balance() -> Decimal {
    Decimal::new(10, 0)
}

fn default_preferred_leverage() -> u32 {
    10
}

fn default_fallback_leverage() -> u32 {
    5
}

fn default_entry_wait() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    2
}

fn default_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    2
}

fn default_risk() -> RiskConfig {
    RiskConfig {
        loss_threshold_pct: default_loss_threshold(),
        take_profit_pct: default_take_profit(),
        min_balance: default_min_balance(),
        preferred_leverage: default_preferred_leverage(),
        fallback_leverage: default_fallback_leverage(),
    }
}

fn default_executor() -> ExecutorConfig {
    ExecutorConfig {
        entry_wait_secs: default_entry_wait(),
        poll_interval_secs: default_poll_interval(),
        submit_attempts: default_attempts(),
        protective_attempts: default_attempts(),
        retry_delay_secs: default_retry_delay(),
        cancel_entry_on_timeout: false,
    }
}
