// ===============================
// src/ledger.rs (paper positions & PnL)
// ===============================
//
// Ledger simulasi in-memory: posisi per simbol + log order simulasi
// (append-only, dibatasi N entry terakhir). Transisi state murni dan
// deterministik: tidak ada clock/random di aritmetikanya, replay urutan
// trade yang sama selalu menghasilkan posisi & PnL akhir yang sama.
// Realized PnL hanya berubah saat trade MENGURANGI |posisi| (close/flip),
// tidak pernah saat menambah exposure searah.

use std::collections::VecDeque;

use ahash::AHashMap as HashMap;
use serde::Serialize;

use crate::domain::{Position, Side, SimulatedOrder};
use crate::quant;

pub struct PaperLedger {
    positions: HashMap<String, Position>,
    orders: VecDeque<SimulatedOrder>,
    next_id: u64,
    log_max: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerSnapshot {
    pub positions: HashMap<String, Position>,
    pub orders: Vec<SimulatedOrder>,
}

impl PaperLedger {
    pub fn new(log_max: usize) -> Self {
        Self {
            positions: HashMap::new(),
            orders: VecDeque::new(),
            next_id: 0,
            log_max: log_max.max(1),
        }
    }

    /// Terapkan satu fill simulasi. Qty diambil absolut, tanda dari side
    /// (BUY = +, SELL = -).
    pub fn trade(&mut self, symbol: &str, side: Side, price: f64, qty: f64) -> (SimulatedOrder, Position) {
        let qty = quant::dp8(qty.abs());
        let signed = side.sign() as f64 * qty;
        let pos = self.positions.entry(symbol.to_string()).or_default();

        let mut pnl = 0.0;
        let prev_qty = pos.qty;
        if qty > 0.0 {
            if prev_qty == 0.0 || (prev_qty > 0.0) == (signed > 0.0) {
                // akumulasi searah -> avg = rata-rata tertimbang, PnL tidak berubah
                let prev_abs = prev_qty.abs();
                pos.avg_price = if prev_abs == 0.0 {
                    price
                } else {
                    (pos.avg_price * prev_abs + price * qty) / (prev_abs + qty)
                };
                pos.qty = quant::dp8(prev_qty + signed);
            } else {
                // arah berlawanan -> realize sebanyak qty yang menutup
                let closing = prev_qty.abs().min(qty);
                pnl = if prev_qty > 0.0 {
                    (price - pos.avg_price) * closing
                } else {
                    (pos.avg_price - price) * closing
                };
                pos.realized_pnl += pnl;
                pos.qty = quant::dp8(prev_qty + signed);
                if qty > prev_qty.abs() {
                    pos.avg_price = price; // flip: sisa qty buka posisi baru di harga trade
                } else if pos.qty == 0.0 {
                    pos.avg_price = 0.0; // exact close
                }
                // partial close: avg tidak berubah
            }
        }

        let position = pos.clone();
        self.next_id += 1;
        let order = SimulatedOrder {
            id: format!("SIM-{}", self.next_id),
            ts_ms: chrono::Utc::now().timestamp_millis() as u64,
            symbol: symbol.to_string(),
            side,
            price,
            qty,
            pnl,
        };
        self.orders.push_back(order.clone());
        while self.orders.len() > self.log_max {
            self.orders.pop_front();
        }
        (order, position)
    }

    pub fn position(&self, symbol: &str) -> Position {
        self.positions.get(symbol).cloned().unwrap_or_default()
    }

    pub fn realized_total(&self) -> f64 {
        self.positions.values().map(|p| p.realized_pnl).sum()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            positions: self.positions.clone(),
            orders: self.orders.iter().cloned().collect(),
        }
    }

    /// Reset eksplisit; satu-satunya cara posisi dihapus.
    pub fn reset(&mut self) {
        self.positions.clear();
        self.orders.clear();
        self.next_id = 0;
    }
}
