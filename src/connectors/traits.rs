// src/connectors/traits.rs
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::types::{
    Balance, ContractSpec, Fill, Kline, OrderAck, OrderSpec, OrderStatus, Position,
    ProtectiveSpec,
};

/// Authenticated venue access. Pure request/response, no caching; every
/// call is one network round-trip with a bounded timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn get_price(&self, symbol: &str) -> Result<Decimal>;

    async fn get_balance(&self, currency: &str) -> Result<Balance>;

    async fn get_contract_spec(&self, symbol: &str) -> Result<ContractSpec>;

    /// Empty list = flat.
    async fn get_open_positions(&self, symbol: &str) -> Result<Vec<Position>>;

    async fn submit_order(&self, spec: &OrderSpec) -> Result<OrderAck>;

    async fn get_order_status(&self, order_id: &str) -> Result<OrderStatus>;

    /// Stop/trigger order with reduce-only semantics: it may shrink the
    /// position, never reverse it.
    async fn submit_protective_order(&self, spec: &ProtectiveSpec) -> Result<OrderAck>;

    async fn cancel_order(&self, order_id: &str) -> Result<()>;

    /// Returns the ids of the orders that were canceled.
    async fn cancel_all_orders(&self, symbol: &str) -> Result<Vec<String>>;

    /// Most recent executions first.
    async fn get_recent_fills(&self, symbol: &str) -> Result<Vec<Fill>>;

    async fn get_klines(&self, symbol: &str, granularity_mins: u32, limit: usize)
        -> Result<Vec<Kline>>;
}
