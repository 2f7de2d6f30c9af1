// src/connectors/messages.rs
use serde::Deserialize;

/// Every KuCoin futures REST response is wrapped in this envelope.
/// `code` "200000" means success; anything else carries `msg`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: String,
    #[serde(default)]
    pub msg: Option<String>,
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct TickerData {
    /// Last traded price, sent as a string.
    pub price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOverviewData {
    pub available_balance: f64,
    pub position_margin: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractData {
    pub symbol: String,
    pub multiplier: f64,
    pub lot_size: f64,
    pub max_leverage: f64,
    pub tick_size: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub symbol: String,
    pub is_open: bool,
    pub current_qty: f64,
    pub avg_entry_price: f64,
    pub pos_margin: f64,
    pub unrealised_pnl: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderIdData {
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetailData {
    /// "open" while resting, "done" once filled or canceled.
    pub status: String,
    pub cancel_exist: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledOrdersData {
    pub cancelled_order_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FillsPageData {
    pub items: Vec<FillData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillData {
    pub symbol: String,
    pub side: String,
    pub price: String,
    pub size: f64,
    pub trade_time: i64,
}

/// Kline rows arrive as positional arrays:
/// [time, open, high, low, close, volume].
pub type KlineRow = Vec<f64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_success_envelope() {
        let raw = r#"{"code":"200000","data":{"symbol":"ETHUSDTM","price":"2001.5"}}"#;
        let env: Envelope<TickerData> = serde_json::from_str(raw).unwrap();
        assert_eq!(env.code, "200000");
        assert_eq!(env.data.unwrap().price, "2001.5");
    }

    #[test]
    fn decodes_error_envelope_without_data() {
        let raw = r#"{"code":"300003","msg":"Balance insufficient"}"#;
        let env: Envelope<TickerData> = serde_json::from_str(raw).unwrap();
        assert_eq!(env.code, "300003");
        assert_eq!(env.msg.as_deref(), Some("Balance insufficient"));
        assert!(env.data.is_none());
    }

    #[test]
    fn decodes_position_row() {
        let raw = r#"{
            "symbol": "ETHUSDTM",
            "isOpen": true,
            "currentQty": -12,
            "avgEntryPrice": 1998.25,
            "posMargin": 24.4,
            "unrealisedPnl": -0.8
        }"#;
        let pos: PositionData = serde_json::from_str(raw).unwrap();
        assert!(pos.is_open);
        assert_eq!(pos.current_qty, -12.0);
    }
}
