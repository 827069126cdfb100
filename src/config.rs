// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : tv_bingx_relay — TradingView webhook → BingX order relay in Rust
Module  : <module_name>.rs
Version : 0.4.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Receives TradingView alert webhooks, dedupes and normalizes them,
          sizes orders (lot/tick rounding, min-qty/min-notional guards,
          per-symbol overrides), then simulates fills on a paper ledger or
          dispatches signed orders to BingX perpetual swap. Prometheus
          metrics + optional JSONL event recording.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
use ahash::AHashMap as HashMap;
use dotenvy::dotenv;
use std::env;

/// Mode eksekusi order: simulasi paper, dry-run log saja, atau live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderMode {
    Paper,
    Test,
    Live,
}

impl OrderMode {
    pub fn from_env(key: &str, default_mode: OrderMode) -> OrderMode {
        match env::var(key).unwrap_or_default().to_ascii_lowercase().as_str() {
            "paper" => OrderMode::Paper,
            "test"  => OrderMode::Test,
            "live"  => OrderMode::Live,
            _ => default_mode,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderMode::Paper => "paper",
            OrderMode::Test  => "test",
            OrderMode::Live  => "live",
        }
    }

    // Endpoint default per mode (VST = demo/simulasi BingX)
    pub fn default_base_url(&self) -> &'static str {
        match self {
            OrderMode::Paper => "https://open-api-vst.bingx.com", // tidak dipakai saat paper
            OrderMode::Test  => "https://open-api-vst.bingx.com",
            OrderMode::Live  => "https://open-api.bingx.com",
        }
    }
}

/// Override per-simbol; field kosong jatuh ke default global.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymbolRule {
    pub lot: Option<f64>,
    pub tick: Option<f64>,
    pub min_notional: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct SizingCfg {
    pub default_qty: f64,
    pub lot_step: f64,
    pub lot_step_usd: f64,
    pub min_qty: f64,
    pub min_notional: f64,
    pub price_tick: f64,
    pub overrides_before_guards: bool,
    pub rules: HashMap<String, SymbolRule>,
}

impl Default for SizingCfg {
    fn default() -> Self {
        Self {
            default_qty: 0.001,
            lot_step: 0.0,
            lot_step_usd: 0.0,
            min_qty: 0.0,
            min_notional: 0.0,
            price_tick: 0.0,
            overrides_before_guards: true,
            rules: HashMap::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Args {
    // HTTP
    pub port: u16,
    pub metrics_port: u16,
    pub webhook_secret: String,

    // mode & exchange
    pub mode: OrderMode,
    pub bingx_base_url: String,
    pub bingx_api_key: String,
    pub bingx_api_secret: String,
    pub bingx_source_key: Option<String>,
    pub recv_window: u64,

    // dedup & ledger
    pub dedup_bucket_secs: u64,
    pub dedup_max: usize,
    pub sim_log_max: usize,

    // files
    pub record_file: Option<String>,
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key).unwrap_or_default().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => true,
        "0" | "false" | "no" => false,
        _ => default,
    }
}

/// Parse `SYMBOL_RULES`, format: `SYM:lot:tick:minNotional` dipisah koma,
/// slot boleh kosong. Contoh:
///   SYMBOL_RULES=BTC-USDT:0.001:0.1:5,ETH-USDT:0.01::2
pub fn parse_symbol_rules(raw: &str) -> HashMap<String, SymbolRule> {
    let mut out = HashMap::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let mut parts = entry.split(':');
        let sym = parts.next().unwrap_or("").trim().to_ascii_uppercase();
        if sym.is_empty() {
            continue;
        }
        let mut slot = || parts.next().and_then(|p| p.trim().parse::<f64>().ok()).filter(|v| *v > 0.0);
        let rule = SymbolRule { lot: slot(), tick: slot(), min_notional: slot() };
        out.insert(sym, rule);
    }
    out
}

pub fn load() -> (Args, SizingCfg) {
    // Pastikan .env dibaca (WEBHOOK_SECRET, BINGX_API_KEY, dll)
    let _ = dotenv();

    // ===== Mode =====
    let mode = OrderMode::from_env("ORDER_MODE", OrderMode::Test);
    let bingx_base_url = env::var("BINGX_BASE_URL")
        .unwrap_or_else(|_| mode.default_base_url().to_string());

    // ===== HTTP =====
    let port = env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(3000);
    let metrics_port = env::var("METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9898);
    let webhook_secret = env::var("WEBHOOK_SECRET").unwrap_or_default();

    // ===== Exchange credentials =====
    let bingx_api_key = env::var("BINGX_API_KEY").unwrap_or_default();
    let bingx_api_secret = env::var("BINGX_API_SECRET").unwrap_or_default();
    let bingx_source_key = env::var("BINGX_SOURCE_KEY").ok().filter(|s| !s.is_empty());
    let recv_window = env::var("BINGX_RECV_WINDOW")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5000);

    // ===== Dedup / paper ledger =====
    let dedup_bucket_secs = env::var("DEDUP_BUCKET_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);
    let dedup_max = env::var("DEDUP_MAX").ok().and_then(|s| s.parse().ok()).unwrap_or(5000);
    let sim_log_max = env::var("SIM_LOG_MAX").ok().and_then(|s| s.parse().ok()).unwrap_or(5000);

    let record_file = env::var("RECORD_FILE").ok();

    let args = Args {
        port,
        metrics_port,
        webhook_secret,
        mode,
        bingx_base_url,
        bingx_api_key,
        bingx_api_secret,
        bingx_source_key,
        recv_window,
        dedup_bucket_secs,
        dedup_max,
        sim_log_max,
        record_file,
    };

    // ===== Sizing =====
    let sizing = SizingCfg {
        default_qty: env_f64("DEFAULT_QTY", 0.001),
        lot_step: env_f64("LOT_STEP", 0.0),
        lot_step_usd: env_f64("LOT_STEP_USD", 0.0),
        min_qty: env_f64("MIN_QTY", 0.0),
        min_notional: env_f64("MIN_NOTIONAL", 0.0),
        price_tick: env_f64("PRICE_TICK", 0.0),
        overrides_before_guards: env_bool("OVERRIDES_BEFORE_GUARDS", true),
        rules: parse_symbol_rules(&env::var("SYMBOL_RULES").unwrap_or_default()),
    };

    (args, sizing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_symbol_rules_with_empty_slots() {
        let rules = parse_symbol_rules("BTC-USDT:0.001:0.1:5, eth-usdt:0.01::2 ,SOLUSDT");
        assert_eq!(rules.len(), 3);
        let btc = &rules["BTC-USDT"];
        assert_eq!(btc.lot, Some(0.001));
        assert_eq!(btc.tick, Some(0.1));
        assert_eq!(btc.min_notional, Some(5.0));
        let eth = &rules["ETH-USDT"];
        assert_eq!(eth.lot, Some(0.01));
        assert_eq!(eth.tick, None);
        assert_eq!(eth.min_notional, Some(2.0));
        assert_eq!(rules["SOLUSDT"], SymbolRule::default());
    }

    #[test]
    fn ignores_garbage_entries() {
        let rules = parse_symbol_rules(",,:0.1:, BTCUSDT:abc:0.5");
        assert_eq!(rules.len(), 1);
        let btc = &rules["BTCUSDT"];
        assert_eq!(btc.lot, None);
        assert_eq!(btc.tick, Some(0.5));
        assert_eq!(btc.min_notional, None);
    }
}
