// ===============================
// src/bingx.rs
// ===============================
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Query string kanonik untuk signing BingX: buang field kosong, sort key
/// leksikografis, percent-encode value, gabung dengan '&'. String ini yang
/// ditandatangani byte-per-byte — urutan dan encoding tidak boleh berubah.
pub fn canonical_query(params: &[(String, String)]) -> String {
    let mut kept: Vec<&(String, String)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    kept.sort_by(|a, b| a.0.cmp(&b.0));
    kept.iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn sign_query(secret: &str, query: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC key");
    mac.update(query.as_bytes());
    let sig = mac.finalize().into_bytes();
    hex::encode(sig)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn canonical_query_filters_sorts_and_encodes() {
        let params = vec![
            p("symbol", "BTC-USDT"),
            p("note", ""),           // kosong -> dibuang
            p("side", "BUY"),
            p("clientId", "a b+c"),  // spasi/plus harus ter-encode
        ];
        assert_eq!(
            canonical_query(&params),
            "clientId=a%20b%2Bc&side=BUY&symbol=BTC-USDT"
        );
    }

    #[test]
    fn signature_is_byte_stable() {
        let q = "side=BUY&symbol=BTC-USDT&timestamp=1700000000000";
        let a = sign_query("secret", q);
        let b = sign_query("secret", q);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, sign_query("other-secret", q));
    }

    #[test]
    fn hmac_sha256_known_vector() {
        // RFC 4231 test case 2
        let sig = sign_query("Jefe", "what do ya want for nothing?");
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
