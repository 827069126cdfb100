// ===============================
// src/symbols.rs
// ===============================
//
// Ticker TradingView -> simbol kanonik exchange.
// Contoh: "BINANCE:BTCUSDT.P" -> "BTCUSDT", "bingx:btc-usdt.p" -> "BTC-USDT".

/// Normalisasi ticker: buang prefix "EXCHANGE:" (sampai kolon pertama),
/// buang suffix kontrak perpetual ".P" (case-insensitive), lalu uppercase.
/// Fungsi total: string kosong masuk, string kosong keluar, tidak pernah panic.
pub fn normalize(raw: &str) -> String {
    let s = raw.trim();
    let s = match s.find(':') {
        Some(i) => &s[i + 1..],
        None => s,
    };
    let mut s = s.to_ascii_uppercase();
    if s.ends_with(".P") {
        s.truncate(s.len() - 2);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_exchange_prefix_and_perp_suffix() {
        assert_eq!(normalize("BINANCE:BTCUSDT.P"), "BTCUSDT");
        assert_eq!(normalize("bingx:btc-usdt.p"), "BTC-USDT");
        assert_eq!(normalize("BYBIT:ETHUSDT"), "ETHUSDT");
    }

    #[test]
    fn uppercases_bare_symbols() {
        assert_eq!(normalize("ethusdt"), "ETHUSDT");
        assert_eq!(normalize(" btc-usdt "), "BTC-USDT");
    }

    #[test]
    fn idempotent_and_total() {
        for raw in ["BINANCE:BTCUSDT.P", "ethusdt", "", ":", "SOL-USDT.p"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
        }
        assert_eq!(normalize(""), "");
    }
}
