// ===============================
// src/sizing.rs
// ===============================
//
// Pre-trade sizing: konversi field alert (qty / notional USD) menjadi qty
// order final. Gagal secara "soft" (Result dengan alasan), tidak pernah
// menghasilkan order invalid. Urutan langkah:
//
//   1) floor notional ke kelipatan LOT_STEP_USD (floor, jangan ke atas)
//   2) qty = notional / price (butuh harga finite positif)
//   3) fallback ke DEFAULT_QTY kalau qty masih kosong
//   4) floor qty ke kelipatan lot step + presisi 8 desimal
//   5) override per-simbol (lot/tick/minNotional) menggantikan default global
//   6) guard MIN_QTY
//   7) guard min-notional (kalau harga diketahui)
//   8) LIMIT: round harga ke tick terdekat (nearest, bukan floor)

use thiserror::Error;

use crate::config::SizingCfg;
use crate::domain::{OrderType, Signal, SizingResult};
use crate::quant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SizingError {
    #[error("notional sizing requires a positive price")]
    MissingPriceForNotional,
    #[error("quantity below minimum")]
    BelowMinQty,
    #[error("notional below minimum")]
    BelowMinNotional,
    #[error("limit order requires a price")]
    MissingLimitPrice,
}

impl SizingError {
    /// Label stabil untuk metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SizingError::MissingPriceForNotional => "missing_price_for_notional",
            SizingError::BelowMinQty => "below_min_qty",
            SizingError::BelowMinNotional => "below_min_notional",
            SizingError::MissingLimitPrice => "missing_limit_price",
        }
    }
}

fn positive_price(p: Option<f64>) -> Option<f64> {
    p.filter(|x| x.is_finite() && *x > 0.0)
}

/// `sig.symbol` diharapkan sudah dinormalisasi (lookup rule per-simbol
/// memakai simbol kanonik).
pub fn size(sig: &Signal, cfg: &SizingCfg) -> Result<SizingResult, SizingError> {
    let rule = cfg.rules.get(&sig.symbol);
    let eff_lot = rule.and_then(|r| r.lot).unwrap_or(cfg.lot_step);
    let eff_tick = rule.and_then(|r| r.tick).unwrap_or(cfg.price_tick);
    // Revisi sumber tidak konsisten soal urutan override vs guard; default
    // di sini: override dulu, guard membaca nilai efektif. Flag config
    // membalik guard min-notional ke default global.
    let eff_min_notional = if cfg.overrides_before_guards {
        rule.and_then(|r| r.min_notional).unwrap_or(cfg.min_notional)
    } else {
        cfg.min_notional
    };

    // 1) floor notional ke lot USD
    let mut usd = sig.usd.filter(|u| u.is_finite() && *u > 0.0);
    if let Some(u) = usd {
        if cfg.lot_step_usd > 0.0 {
            usd = Some(quant::floor_to_step(u, cfg.lot_step_usd));
        }
    }

    // 2) qty dari notional
    let mut qty = sig.qty.filter(|q| q.is_finite() && *q > 0.0).unwrap_or(0.0);
    if qty <= 0.0 {
        if let Some(u) = usd {
            let px = positive_price(sig.price).ok_or(SizingError::MissingPriceForNotional)?;
            qty = u / px;
        }
    }

    // 3) fallback default
    if qty <= 0.0 {
        qty = cfg.default_qty;
    }

    // 4) lot floor + snap 8 desimal
    if eff_lot > 0.0 {
        qty = quant::floor_to_step(qty, eff_lot);
    }
    qty = quant::dp8(qty);

    // 6) guard qty minimum (qty nol juga ditolak di sini)
    if qty <= 0.0 || (cfg.min_qty > 0.0 && qty < cfg.min_qty) {
        return Err(SizingError::BelowMinQty);
    }

    // 7) guard notional minimum, hanya kalau harga diketahui
    if let Some(px) = positive_price(sig.price) {
        if eff_min_notional > 0.0 && qty * px < eff_min_notional {
            return Err(SizingError::BelowMinNotional);
        }
    }

    // 8) harga LIMIT: round ke tick terdekat
    let price = match sig.order_type {
        OrderType::Limit => {
            let px = positive_price(sig.price).ok_or(SizingError::MissingLimitPrice)?;
            Some(quant::round_to_step(px, eff_tick))
        }
        OrderType::Market => None,
    };

    Ok(SizingResult { qty, price, min_notional: eff_min_notional })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SizingCfg, SymbolRule};
    use crate::domain::{PositionSide, Side};

    fn sig(symbol: &str) -> Signal {
        Signal {
            id: None,
            symbol: symbol.to_string(),
            side: Side::Buy,
            order_type: OrderType::Market,
            price: None,
            qty: None,
            usd: None,
            position_side: PositionSide::Long,
            reduce_only: false,
        }
    }

    fn cfg() -> SizingCfg {
        SizingCfg::default()
    }

    #[test]
    fn notional_floors_then_divides_by_price() {
        let mut s = sig("BTCUSDT");
        s.usd = Some(100.0);
        s.price = Some(50_000.0);
        let mut c = cfg();
        c.lot_step_usd = 10.0;
        let r = size(&s, &c).unwrap();
        assert_eq!(r.qty, 0.002);

        // notional 105 -> floor ke 100, tidak pernah ke atas
        s.usd = Some(105.0);
        let r = size(&s, &c).unwrap();
        assert_eq!(r.qty, 0.002);
    }

    #[test]
    fn notional_without_price_is_rejected() {
        let mut s = sig("BTCUSDT");
        s.usd = Some(100.0);
        assert_eq!(size(&s, &cfg()), Err(SizingError::MissingPriceForNotional));
    }

    #[test]
    fn falls_back_to_default_qty() {
        let mut c = cfg();
        c.default_qty = 0.05;
        let r = size(&sig("ETHUSDT"), &c).unwrap();
        assert_eq!(r.qty, 0.05);
    }

    #[test]
    fn lot_step_floors_quantity() {
        let mut s = sig("BTCUSDT");
        s.qty = Some(0.0029);
        let mut c = cfg();
        c.lot_step = 0.001;
        let r = size(&s, &c).unwrap();
        assert_eq!(r.qty, 0.002);
    }

    #[test]
    fn below_min_qty_is_rejected() {
        let mut s = sig("BTCUSDT");
        s.qty = Some(0.0001);
        let mut c = cfg();
        c.min_qty = 0.001;
        assert_eq!(size(&s, &c), Err(SizingError::BelowMinQty));
    }

    #[test]
    fn below_min_notional_is_rejected_only_with_known_price() {
        let mut s = sig("BTCUSDT");
        s.qty = Some(0.001);
        s.price = Some(1_000.0); // notional 1.0
        let mut c = cfg();
        c.min_notional = 5.0;
        assert_eq!(size(&s, &c), Err(SizingError::BelowMinNotional));

        // tanpa harga, guard notional dilewati
        s.price = None;
        assert!(size(&s, &c).is_ok());
    }

    #[test]
    fn limit_price_rounds_to_nearest_tick() {
        let mut s = sig("BTCUSDT");
        s.order_type = OrderType::Limit;
        s.qty = Some(0.01);
        s.price = Some(50_000.07);
        let mut c = cfg();
        c.price_tick = 0.1;
        let r = size(&s, &c).unwrap();
        assert_eq!(r.price, Some(50_000.1));

        s.price = None;
        assert_eq!(size(&s, &c), Err(SizingError::MissingLimitPrice));
    }

    #[test]
    fn symbol_override_beats_global_defaults() {
        let mut s = sig("BTCUSDT");
        s.qty = Some(0.0029);
        s.price = Some(50_000.0);
        let mut c = cfg();
        c.lot_step = 0.0001;
        c.min_notional = 1.0;
        c.rules.insert(
            "BTCUSDT".to_string(),
            SymbolRule { lot: Some(0.001), tick: None, min_notional: Some(500.0) },
        );
        // lot override 0.001 -> qty 0.002; min-notional override 500 > 100 -> reject
        assert_eq!(size(&s, &c), Err(SizingError::BelowMinNotional));

        // guard membaca default global saat urutan dibalik
        c.overrides_before_guards = false;
        let r = size(&s, &c).unwrap();
        assert_eq!(r.qty, 0.002);
        assert_eq!(r.min_notional, 1.0);
    }

    #[test]
    fn zero_quantity_never_becomes_an_order() {
        let mut s = sig("BTCUSDT");
        s.qty = Some(0.0004);
        let mut c = cfg();
        c.lot_step = 0.001; // floor -> 0
        assert_eq!(size(&s, &c), Err(SizingError::BelowMinQty));
    }
}
