// ===============================
// src/dedup.rs (anti duplikat alert)
// ===============================
//
// Set fingerprint tanpa expiry per-entry. Saat ukuran melewati plafon,
// seluruh set di-clear sekaligus (aproksimasi murah dari cache berjendela
// waktu; setelah clear, duplikat lama bisa lolos lagi dan itu tradeoff
// yang disengaja). State in-memory saja, hilang saat restart.

use ahash::AHashSet;

use crate::domain::Signal;
use crate::quant;
use crate::symbols::normalize;

pub struct DedupCache {
    seen: AHashSet<String>,
    max: usize,
    bucket_secs: u64,
}

impl DedupCache {
    pub fn new(max: usize, bucket_secs: u64) -> Self {
        Self { seen: AHashSet::new(), max, bucket_secs: bucket_secs.max(1) }
    }

    /// Identitas dedup sebuah signal: pakai id klien kalau ada, kalau tidak
    /// komposit simbol|side|harga|bucket-waktu. Dalam satu bucket, signal
    /// yang hanya beda sub-detik sengaja bertabrakan.
    pub fn fingerprint(&self, sig: &Signal, now_ms: u64) -> String {
        if let Some(id) = sig.id.as_deref() {
            if !id.is_empty() {
                return id.to_string();
            }
        }
        let price = sig.price.map(quant::fmt_amount).unwrap_or_default();
        let bucket = now_ms / 1000 / self.bucket_secs;
        format!("{}|{}|{}|{}", normalize(&sig.symbol), sig.side.as_str(), price, bucket)
    }

    pub fn is_duplicate(&self, fp: &str) -> bool {
        self.seen.contains(fp)
    }

    pub fn remember(&mut self, fp: &str) {
        self.seen.insert(fp.to_string());
        self.prune();
    }

    /// Cek + catat dalam satu langkah (dipanggil di bawah satu lock supaya
    /// jaminan at-most-once per fingerprint tetap berlaku di runtime paralel).
    pub fn check_and_remember(&mut self, fp: &str) -> bool {
        let dup = self.seen.contains(fp);
        if !dup {
            self.seen.insert(fp.to_string());
            self.prune();
        }
        dup
    }

    fn prune(&mut self) {
        if self.seen.len() > self.max {
            self.seen.clear();
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderType, PositionSide, Side};

    fn sig(id: Option<&str>, symbol: &str, side: Side, price: Option<f64>) -> Signal {
        Signal {
            id: id.map(str::to_string),
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            price,
            qty: Some(0.01),
            usd: None,
            position_side: PositionSide::from_side(side),
            reduce_only: false,
        }
    }

    #[test]
    fn first_seen_is_never_duplicate_repeat_always_is() {
        let mut c = DedupCache::new(5000, 5);
        let fp = c.fingerprint(&sig(Some("alert-1"), "BTCUSDT", Side::Buy, None), 0);
        assert!(!c.check_and_remember(&fp));
        assert!(c.check_and_remember(&fp));
        assert!(c.is_duplicate(&fp));
    }

    #[test]
    fn explicit_id_wins_over_composite() {
        let c = DedupCache::new(5000, 5);
        let s = sig(Some("my-id"), "BINANCE:BTCUSDT.P", Side::Buy, Some(50000.0));
        assert_eq!(c.fingerprint(&s, 123_456), "my-id");
        // id kosong dianggap tidak ada
        let s = sig(Some(""), "BINANCE:BTCUSDT.P", Side::Buy, Some(50000.0));
        assert_eq!(c.fingerprint(&s, 0), "BTCUSDT|BUY|50000|0");
    }

    #[test]
    fn composite_collides_within_bucket_not_across() {
        let c = DedupCache::new(5000, 5);
        let s = sig(None, "ethusdt", Side::Sell, Some(3000.5));
        let a = c.fingerprint(&s, 1_000);   // detik 1 -> bucket 0
        let b = c.fingerprint(&s, 4_999);   // detik 4 -> bucket 0
        let d = c.fingerprint(&s, 5_000);   // detik 5 -> bucket 1
        assert_eq!(a, b);
        assert_ne!(a, d);
    }

    #[test]
    fn clears_everything_past_ceiling() {
        let mut c = DedupCache::new(3, 5);
        for i in 0..3 {
            assert!(!c.check_and_remember(&format!("fp-{i}")));
        }
        assert_eq!(c.len(), 3);
        // entry ke-4 melewati plafon -> set di-clear total
        assert!(!c.check_and_remember("fp-3"));
        assert_eq!(c.len(), 0);
        // duplikat lama lolos lagi setelah clear (false negative yang disengaja)
        assert!(!c.check_and_remember("fp-0"));
    }
}
