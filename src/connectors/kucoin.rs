// src/connectors/kucoin.rs
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Response, StatusCode};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;
use tracing::info;

use crate::connectors::messages::*;
use crate::connectors::traits::ExchangeGateway;
use crate::error::{Result, SentinelError};
use crate::types::{
    Balance, ContractSpec, Fill, Kline, OrderAck, OrderSpec, OrderStatus, Position,
    ProtectiveSpec, Side,
};

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// KuCoin Futures REST client (KC-API v2 signing).
///
/// Decodes the `{code, data}` envelope once at this boundary; callers only
/// ever see typed structs. Transport failures, 429 and 5xx map to
/// `Network`; a non-success envelope code maps to `Venue`.
pub struct KucoinFuturesClient {
    api_key: String,
    api_secret: String,
    /// The v2 scheme requires the passphrase itself to be HMAC-signed once.
    signed_passphrase: String,
    http_client: Client,
    base_url: String,
}

impl KucoinFuturesClient {
    pub fn new(
        base_url: &str,
        api_key: String,
        api_secret: String,
        api_passphrase: &str,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SentinelError::Config(format!("http client: {e}")))?;

        let signed_passphrase = sign_b64(api_secret.as_bytes(), api_passphrase.as_bytes())?;

        Ok(Self {
            api_key,
            api_secret,
            signed_passphrase,
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// KC-API headers for one request. The signature covers
    /// `timestamp + METHOD + endpoint(+query) + body`.
    fn auth_headers(
        &self,
        method: &str,
        path_with_query: &str,
        body: &str,
    ) -> Result<Vec<(&'static str, String)>> {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let payload = format!("{timestamp}{method}{path_with_query}{body}");
        let signature = sign_b64(self.api_secret.as_bytes(), payload.as_bytes())?;

        Ok(vec![
            ("KC-API-KEY", self.api_key.clone()),
            ("KC-API-PASSPHRASE", self.signed_passphrase.clone()),
            ("KC-API-TIMESTAMP", timestamp),
            ("KC-API-SIGN", signature),
            ("KC-API-KEY-VERSION", "2".to_string()),
        ])
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let path_with_query = join_query(path, query)?;
        let url = format!("{}{}", self.base_url, path_with_query);

        let mut req = self.http_client.get(&url);
        for (name, value) in self.auth_headers("GET", &path_with_query, "")? {
            req = req.header(name, value);
        }
        decode(req.send().await?).await
    }

    async fn post_data<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let body_str = body.to_string();
        let url = format!("{}{}", self.base_url, path);

        let mut req = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body_str.clone());
        for (name, value) in self.auth_headers("POST", path, &body_str)? {
            req = req.header(name, value);
        }
        decode(req.send().await?).await
    }

    async fn delete_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let path_with_query = join_query(path, query)?;
        let url = format!("{}{}", self.base_url, path_with_query);

        let mut req = self.http_client.delete(&url);
        for (name, value) in self.auth_headers("DELETE", &path_with_query, "")? {
            req = req.header(name, value);
        }
        decode(req.send().await?).await
    }
}

fn sign_b64(key: &[u8], payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| SentinelError::Config("invalid API secret".to_string()))?;
    mac.update(payload);
    Ok(B64.encode(mac.finalize().into_bytes()))
}

fn join_query(path: &str, query: &[(&str, String)]) -> Result<String> {
    if query.is_empty() {
        return Ok(path.to_string());
    }
    let qs = serde_urlencoded::to_string(query)
        .map_err(|e| SentinelError::InvalidResponse(format!("query encode: {e}")))?;
    Ok(format!("{path}?{qs}"))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(SentinelError::Network(format!("venue returned {status}")));
    }

    let text = response.text().await?;
    let envelope: Envelope<T> = serde_json::from_str(&text)?;

    if envelope.code != "200000" {
        return Err(SentinelError::Venue {
            code: envelope.code,
            message: envelope.msg.unwrap_or_default(),
        });
    }
    envelope
        .data
        .ok_or_else(|| SentinelError::InvalidResponse("missing data field".to_string()))
}

fn to_decimal(value: f64, what: &str) -> Result<Decimal> {
    Decimal::from_f64(value)
        .ok_or_else(|| SentinelError::InvalidResponse(format!("bad {what}: {value}")))
}

fn parse_decimal(value: &str, what: &str) -> Result<Decimal> {
    Decimal::from_str(value)
        .map_err(|_| SentinelError::InvalidResponse(format!("bad {what}: {value}")))
}

#[async_trait]
impl ExchangeGateway for KucoinFuturesClient {
    async fn get_price(&self, symbol: &str) -> Result<Decimal> {
        let data: TickerData = self
            .get_data("/api/v1/ticker", &[("symbol", symbol.to_string())])
            .await?;
        parse_decimal(&data.price, "ticker price")
    }

    async fn get_balance(&self, currency: &str) -> Result<Balance> {
        let data: AccountOverviewData = self
            .get_data(
                "/api/v1/account-overview",
                &[("currency", currency.to_string())],
            )
            .await?;
        Ok(Balance {
            available: to_decimal(data.available_balance, "available balance")?,
            committed_margin: to_decimal(data.position_margin, "position margin")?,
        })
    }

    async fn get_contract_spec(&self, symbol: &str) -> Result<ContractSpec> {
        let data: ContractData = self
            .get_data(&format!("/api/v1/contracts/{symbol}"), &[])
            .await?;
        Ok(ContractSpec {
            symbol: data.symbol,
            multiplier: to_decimal(data.multiplier, "multiplier")?,
            lot_size: to_decimal(data.lot_size, "lot size")?,
            max_leverage: data.max_leverage as u32,
            tick_size: to_decimal(data.tick_size, "tick size")?,
        })
    }

    async fn get_open_positions(&self, symbol: &str) -> Result<Vec<Position>> {
        let data: PositionData = self
            .get_data("/api/v1/position", &[("symbol", symbol.to_string())])
            .await?;
        if !data.is_open || data.current_qty == 0.0 {
            return Ok(vec![]);
        }
        Ok(vec![Position {
            symbol: data.symbol,
            quantity: to_decimal(data.current_qty, "position qty")?,
            entry_price: to_decimal(data.avg_entry_price, "entry price")?,
            margin: to_decimal(data.pos_margin, "position margin")?,
            unrealized_pnl: to_decimal(data.unrealised_pnl, "unrealized pnl")?,
        }])
    }

    async fn submit_order(&self, spec: &OrderSpec) -> Result<OrderAck> {
        let mut body = json!({
            "clientOid": spec.client_oid,
            "symbol": spec.symbol,
            "side": spec.side.as_str(),
            "leverage": spec.leverage.to_string(),
            "size": spec.size.normalize().to_string(),
            "reduceOnly": spec.reduce_only,
        });
        match spec.price {
            Some(price) => {
                body["type"] = json!("limit");
                body["price"] = json!(price.normalize().to_string());
            }
            None => {
                body["type"] = json!("market");
            }
        }

        info!(
            client_oid = %spec.client_oid,
            side = spec.side.as_str(),
            size = %spec.size,
            reduce_only = spec.reduce_only,
            "submitting order"
        );
        let data: OrderIdData = self.post_data("/api/v1/orders", body).await?;
        Ok(OrderAck {
            order_id: data.order_id,
            accepted: true,
        })
    }

    async fn get_order_status(&self, order_id: &str) -> Result<OrderStatus> {
        let data: OrderDetailData = self
            .get_data(&format!("/api/v1/orders/{order_id}"), &[])
            .await?;
        let status = if data.cancel_exist {
            OrderStatus::Canceled
        } else {
            match data.status.as_str() {
                "done" => OrderStatus::Filled,
                "open" | "match" => OrderStatus::Pending,
                _ => OrderStatus::Unknown,
            }
        };
        Ok(status)
    }

    async fn submit_protective_order(&self, spec: &ProtectiveSpec) -> Result<OrderAck> {
        let body = json!({
            "clientOid": spec.client_oid,
            "symbol": spec.symbol,
            "side": spec.side.as_str(),
            "leverage": spec.leverage.to_string(),
            "type": "market",
            "stop": spec.stop.as_str(),
            "stopPrice": spec.stop_price.normalize().to_string(),
            "stopPriceType": "TP",
            "size": spec.size.normalize().to_string(),
            "reduceOnly": true,
        });

        info!(
            client_oid = %spec.client_oid,
            stop = spec.stop.as_str(),
            stop_price = %spec.stop_price,
            "submitting protective order"
        );
        let data: OrderIdData = self.post_data("/api/v1/orders", body).await?;
        Ok(OrderAck {
            order_id: data.order_id,
            accepted: true,
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let _: CancelledOrdersData = self
            .delete_data(&format!("/api/v1/orders/{order_id}"), &[])
            .await?;
        Ok(())
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<Vec<String>> {
        let data: CancelledOrdersData = self
            .delete_data("/api/v1/orders", &[("symbol", symbol.to_string())])
            .await?;
        Ok(data.cancelled_order_ids)
    }

    async fn get_recent_fills(&self, symbol: &str) -> Result<Vec<Fill>> {
        let data: FillsPageData = self
            .get_data(
                "/api/v1/fills",
                &[
                    ("symbol", symbol.to_string()),
                    ("pageSize", "20".to_string()),
                ],
            )
            .await?;

        let mut fills = Vec::with_capacity(data.items.len());
        for item in data.items {
            let side = match item.side.as_str() {
                "buy" => Side::Buy,
                "sell" => Side::Sell,
                other => {
                    return Err(SentinelError::InvalidResponse(format!(
                        "unknown fill side: {other}"
                    )))
                }
            };
            fills.push(Fill {
                symbol: item.symbol,
                side,
                price: parse_decimal(&item.price, "fill price")?,
                size: to_decimal(item.size, "fill size")?,
                trade_time_ms: item.trade_time,
            });
        }
        Ok(fills)
    }

    async fn get_klines(
        &self,
        symbol: &str,
        granularity_mins: u32,
        limit: usize,
    ) -> Result<Vec<Kline>> {
        let span_ms = (granularity_mins as i64) * 60_000 * (limit as i64);
        let from = Utc::now().timestamp_millis() - span_ms;
        let rows: Vec<KlineRow> = self
            .get_data(
                "/api/v1/kline/query",
                &[
                    ("symbol", symbol.to_string()),
                    ("granularity", granularity_mins.to_string()),
                    ("from", from.to_string()),
                ],
            )
            .await?;

        let mut klines = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() < 5 {
                return Err(SentinelError::InvalidResponse(
                    "short kline row".to_string(),
                ));
            }
            klines.push(Kline {
                time_ms: row[0] as i64,
                close: row[4],
            });
        }
        Ok(klines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_is_deterministic() {
        let a = sign_b64(b"secret", b"payload").unwrap();
        let b = sign_b64(b"secret", b"payload").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, sign_b64(b"secret", b"other").unwrap());
    }

    #[test]
    fn passphrase_is_pre_signed() {
        let client = KucoinFuturesClient::new(
            "https://api-futures.kucoin.com/",
            "key".to_string(),
            "secret".to_string(),
            "passphrase",
        )
        .unwrap();
        assert_ne!(client.signed_passphrase, "passphrase");
        assert_eq!(client.base_url, "https://api-futures.kucoin.com");
    }

    #[test]
    fn query_joining() {
        let plain = join_query("/api/v1/position", &[]).unwrap();
        assert_eq!(plain, "/api/v1/position");
        let with = join_query("/api/v1/position", &[("symbol", "ETHUSDTM".to_string())]).unwrap();
        assert_eq!(with, "/api/v1/position?symbol=ETHUSDTM");
    }
}
