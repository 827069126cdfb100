// ===============================
// src/domain.rs
// ===============================
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side { Buy, Sell }
impl Side {
    pub fn sign(&self) -> i64 { match self { Side::Buy => 1, Side::Sell => -1 } }
    pub fn as_str(&self) -> &'static str { match self { Side::Buy => "BUY", Side::Sell => "SELL" } }
    pub fn parse_one(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy"  | "long"  => Some(Side::Buy),
            "sell" | "short" => Some(Side::Sell),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType { Market, Limit }
impl OrderType {
    pub fn as_str(&self) -> &'static str { match self { OrderType::Market => "MARKET", OrderType::Limit => "LIMIT" } }
    pub fn parse_one(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" | "mkt" => Some(OrderType::Market),
            "limit"  | "lmt" => Some(OrderType::Limit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide { Long, Short }
impl PositionSide {
    pub fn as_str(&self) -> &'static str { match self { PositionSide::Long => "LONG", PositionSide::Short => "SHORT" } }
    pub fn parse_one(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long"  => Some(PositionSide::Long),
            "short" => Some(PositionSide::Short),
            _ => None,
        }
    }
    /// Default hedge-mode: BUY buka LONG, SELL buka SHORT.
    pub fn from_side(side: Side) -> Self {
        match side { Side::Buy => PositionSide::Long, Side::Sell => PositionSide::Short }
    }
}

/// Payload webhook mentah dari TradingView. Angka bisa datang sebagai
/// number atau string (template TV seperti "{{close}}" menghasilkan string).
#[derive(Debug, Clone, Deserialize)]
pub struct Alert {
    pub id: Option<String>,
    pub symbol: String,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: Option<String>,
    #[serde(default, deserialize_with = "de_flex_num")]
    pub price: Option<f64>,
    #[serde(default, alias = "size", deserialize_with = "de_flex_num")]
    pub qty: Option<f64>,
    #[serde(default, alias = "usdt", deserialize_with = "de_flex_num")]
    pub usd: Option<f64>,
    #[serde(rename = "positionSide")]
    pub position_side: Option<String>,
    #[serde(rename = "reduceOnly", default)]
    pub reduce_only: bool,
    pub passphrase: Option<String>,
    pub token: Option<String>,
}

fn de_flex_num<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    let v = Option::<serde_json::Value>::deserialize(de)?;
    Ok(match v {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    })
}

/// Alert yang sudah divalidasi di boundary; satu pass pemrosesan per Signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<f64>,
    pub qty: Option<f64>,
    pub usd: Option<f64>,
    pub position_side: PositionSide,
    pub reduce_only: bool,
}

/// Hasil sizing engine: qty final (lot-floored), harga final (LIMIT saja),
/// dan ambang min-notional efektif yang dipakai.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizingResult {
    pub qty: f64,
    pub price: Option<f64>,
    pub min_notional: f64,
}

/// Posisi simulasi per simbol: qty bertanda (+long/-short), avg entry
/// (berarti hanya saat qty != 0), akumulasi realized PnL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub qty: f64,
    pub avg_price: f64,
    pub realized_pnl: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedOrder {
    pub id: String,
    pub ts_ms: u64,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub qty: f64,
    pub pnl: f64,
}

/// Parameter order live; dibangun fresh per dispatch, tidak pernah dipakai ulang.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub position_side: PositionSide,
    pub qty: f64,
    pub price: Option<f64>,
    pub reduce_only: bool,
}

// ---- Recorder events ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord { pub trace_id: String, pub duplicate: bool, pub signal: Signal }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectRecord { pub trace_id: String, pub reason: String }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRecord { pub trace_id: String, pub status: u16, pub body: String }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Alert(AlertRecord),
    Sim(SimulatedOrder),
    Dispatch(DispatchRecord),
    Reject(RejectRecord),
    Note(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_accepts_string_numbers_and_aliases() {
        let a: Alert = serde_json::from_str(
            r#"{"symbol":"BTC-USDT","side":"BUY","price":"50000.5","size":"0.01","usdt":100}"#,
        )
        .unwrap();
        assert_eq!(a.price, Some(50000.5));
        assert_eq!(a.qty, Some(0.01));
        assert_eq!(a.usd, Some(100.0));
        assert!(!a.reduce_only);
    }

    #[test]
    fn alert_tolerates_missing_optionals() {
        let a: Alert = serde_json::from_str(r#"{"symbol":"ETHUSDT","side":"sell"}"#).unwrap();
        assert!(a.price.is_none() && a.qty.is_none() && a.usd.is_none());
        assert!(a.order_type.is_none());
        let a: Alert =
            serde_json::from_str(r#"{"symbol":"ETHUSDT","side":"sell","price":"n/a"}"#).unwrap();
        assert!(a.price.is_none());
    }

    #[test]
    fn side_and_type_parsing() {
        assert_eq!(Side::parse_one("BUY"), Some(Side::Buy));
        assert_eq!(Side::parse_one(" short "), Some(Side::Sell));
        assert_eq!(Side::parse_one("hold"), None);
        assert_eq!(OrderType::parse_one("LIMIT"), Some(OrderType::Limit));
        assert_eq!(OrderType::parse_one("mkt"), Some(OrderType::Market));
        assert_eq!(OrderType::parse_one("stop"), None);
    }

    #[test]
    fn position_side_defaults_from_side() {
        assert_eq!(PositionSide::from_side(Side::Buy), PositionSide::Long);
        assert_eq!(PositionSide::from_side(Side::Sell), PositionSide::Short);
    }
}
