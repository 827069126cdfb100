// ===============================
// src/processor.rs (orchestrator)
// ===============================
//
// Task pemroses signal: konsumsi antrian mpsc dari webhook (ack sudah
// terkirim), jalankan normalize -> sizing -> cabang mode:
//   paper -> ledger simulasi | test -> dry-run log | live -> dispatch BingX
// Duplikat sudah dipotong di boundary sebelum masuk antrian. Kegagalan di
// sini hanya terlihat lewat log/metrics — respon HTTP sudah lama selesai.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::{OrderMode, SizingCfg};
use crate::dedup::DedupCache;
use crate::domain::{
    DispatchRecord, Event, OrderRequest, RejectRecord, Signal,
};
use crate::gateway_bingx::{BingxGateway, GatewayError};
use crate::ledger::PaperLedger;
use crate::metrics::{
    EXCHANGE_ORDERS, ORDERS_BY_MODE, PAPER_POS_QTY, PAPER_REALIZED, PAPER_TRADES, SIZING_REJECTS,
};
use crate::quant::fmt_amount;
use crate::sizing;
use crate::symbols::normalize;

/// Context eksplisit untuk seluruh state mutable bersama. Dibuat sekali di
/// startup, di-reset hanya lewat operasi reset ledger; di-inject ke task,
/// bukan diakses sebagai global — core bisa dites tanpa proses hidup.
pub struct Ctx {
    pub mode: OrderMode,
    pub sizing: SizingCfg,
    pub secret: String,
    pub dedup: Mutex<DedupCache>,
    pub ledger: Mutex<PaperLedger>,
    pub gateway: BingxGateway,
}

/// Satu signal yang sudah di-ack dan lolos dedup, menunggu diproses.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub trace_id: String,
    pub signal: Signal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Simulated,
    DryRun,
    Dispatched,
    Rejected,
    Skipped,
    Failed,
}

pub async fn run(mut rx: mpsc::Receiver<Inbound>, ctx: Arc<Ctx>, rec_tx: mpsc::Sender<Event>) {
    while let Some(inbound) = rx.recv().await {
        process_one(&ctx, inbound, &rec_tx).await;
    }
}

pub async fn process_one(ctx: &Ctx, inbound: Inbound, rec_tx: &mpsc::Sender<Event>) -> Outcome {
    let Inbound { trace_id, mut signal } = inbound;
    signal.symbol = normalize(&signal.symbol);

    let sized = match sizing::size(&signal, &ctx.sizing) {
        Ok(s) => s,
        Err(e) => {
            warn!(%trace_id, symbol = %signal.symbol, reason = %e, "sizing rejected");
            SIZING_REJECTS.with_label_values(&[e.label()]).inc();
            let _ = rec_tx.try_send(Event::Reject(RejectRecord {
                trace_id,
                reason: e.to_string(),
            }));
            return Outcome::Rejected;
        }
    };

    ORDERS_BY_MODE.with_label_values(&[ctx.mode.as_str()]).inc();

    match ctx.mode {
        OrderMode::Paper => {
            // Fill simulasi butuh harga: pakai harga LIMIT hasil sizing,
            // kalau market pakai harga dari alert.
            let fill_px = sized
                .price
                .or_else(|| signal.price.filter(|p| p.is_finite() && *p > 0.0));
            let Some(px) = fill_px else {
                warn!(%trace_id, symbol = %signal.symbol, "paper trade skipped: no price");
                let _ = rec_tx.try_send(Event::Reject(RejectRecord {
                    trace_id,
                    reason: "paper trade requires a price".to_string(),
                }));
                return Outcome::Skipped;
            };

            let (order, position, realized_total) = {
                let mut ledger = ctx.ledger.lock().unwrap();
                let (order, position) = ledger.trade(&signal.symbol, signal.side, px, sized.qty);
                (order, position, ledger.realized_total())
            };

            PAPER_TRADES.with_label_values(&[&signal.symbol]).inc();
            PAPER_POS_QTY.with_label_values(&[&signal.symbol]).set(position.qty);
            PAPER_REALIZED.set(realized_total);

            info!(
                %trace_id,
                order_id = %order.id,
                symbol = %signal.symbol,
                side = signal.side.as_str(),
                px = %fmt_amount(px),
                qty = %fmt_amount(order.qty),
                pos_qty = %fmt_amount(position.qty),
                avg = %fmt_amount(position.avg_price),
                realized = %fmt_amount(position.realized_pnl),
                "paper fill"
            );
            let _ = rec_tx.try_send(Event::Sim(order));
            Outcome::Simulated
        }

        OrderMode::Test => {
            info!(
                %trace_id,
                symbol = %signal.symbol,
                side = signal.side.as_str(),
                order_type = signal.order_type.as_str(),
                qty = %fmt_amount(sized.qty),
                price = ?sized.price.map(fmt_amount),
                "dry-run order (test mode), not sent"
            );
            Outcome::DryRun
        }

        OrderMode::Live => {
            let req = OrderRequest {
                symbol: signal.symbol.clone(),
                side: signal.side,
                order_type: signal.order_type,
                position_side: signal.position_side,
                qty: sized.qty,
                price: sized.price,
                reduce_only: signal.reduce_only,
            };
            match ctx.gateway.place_order(&req).await {
                Ok((status, body)) => {
                    if (200..300).contains(&status) {
                        info!(%trace_id, symbol = %req.symbol, status, %body, "order sent OK");
                        EXCHANGE_ORDERS.with_label_values(&["sent"]).inc();
                    } else {
                        error!(%trace_id, symbol = %req.symbol, status, %body, "order send failed");
                        EXCHANGE_ORDERS.with_label_values(&["http_error"]).inc();
                    }
                    let _ = rec_tx.try_send(Event::Dispatch(DispatchRecord {
                        trace_id,
                        status,
                        body,
                    }));
                    Outcome::Dispatched
                }
                Err(GatewayError::MissingCredentials) => {
                    error!(%trace_id, "live mode without API credentials, order not sent");
                    EXCHANGE_ORDERS.with_label_values(&["no_credentials"]).inc();
                    let _ = rec_tx.try_send(Event::Reject(RejectRecord {
                        trace_id,
                        reason: "missing credentials".to_string(),
                    }));
                    Outcome::Failed
                }
                Err(e) => {
                    error!(%trace_id, ?e, "order send err");
                    EXCHANGE_ORDERS.with_label_values(&["error"]).inc();
                    let _ = rec_tx.try_send(Event::Reject(RejectRecord {
                        trace_id,
                        reason: e.to_string(),
                    }));
                    Outcome::Failed
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderType, PositionSide, Side};

    fn test_ctx(mode: OrderMode) -> Ctx {
        Ctx {
            mode,
            sizing: SizingCfg::default(),
            secret: String::new(),
            dedup: Mutex::new(DedupCache::new(5000, 5)),
            ledger: Mutex::new(PaperLedger::new(5000)),
            gateway: BingxGateway::new(
                "http://127.0.0.1:0".to_string(),
                String::new(),
                String::new(),
                None,
                5000,
            ),
        }
    }

    fn inbound(symbol: &str, side: Side, price: Option<f64>, qty: Option<f64>) -> Inbound {
        Inbound {
            trace_id: "TV-test-1".to_string(),
            signal: Signal {
                id: None,
                symbol: symbol.to_string(),
                side,
                order_type: OrderType::Market,
                price,
                qty,
                usd: None,
                position_side: PositionSide::from_side(side),
                reduce_only: false,
            },
        }
    }

    #[tokio::test]
    async fn paper_signal_lands_in_the_ledger() {
        let ctx = test_ctx(OrderMode::Paper);
        let (tx, mut rx) = mpsc::channel(16);
        let out = process_one(
            &ctx,
            inbound("BINANCE:BTCUSDT.P", Side::Buy, Some(100.0), Some(1.0)),
            &tx,
        )
        .await;
        assert_eq!(out, Outcome::Simulated);
        // simbol dinormalisasi sebelum masuk ledger
        let pos = ctx.ledger.lock().unwrap().position("BTCUSDT");
        assert_eq!(pos.qty, 1.0);
        assert_eq!(pos.avg_price, 100.0);
        // fill simulasi terekam ke recorder
        assert!(matches!(rx.try_recv(), Ok(Event::Sim(_))));
    }

    #[tokio::test]
    async fn paper_without_price_is_skipped() {
        let ctx = test_ctx(OrderMode::Paper);
        let (tx, _rx) = mpsc::channel(16);
        let out = process_one(&ctx, inbound("BTCUSDT", Side::Buy, None, Some(1.0)), &tx).await;
        assert_eq!(out, Outcome::Skipped);
        assert_eq!(ctx.ledger.lock().unwrap().position("BTCUSDT").qty, 0.0);
    }

    #[tokio::test]
    async fn sizing_rejection_stops_processing() {
        let mut ctx = test_ctx(OrderMode::Paper);
        ctx.sizing.min_qty = 1.0;
        let (tx, mut rx) = mpsc::channel(16);
        let out = process_one(
            &ctx,
            inbound("BTCUSDT", Side::Buy, Some(100.0), Some(0.5)),
            &tx,
        )
        .await;
        assert_eq!(out, Outcome::Rejected);
        assert_eq!(ctx.ledger.lock().unwrap().position("BTCUSDT").qty, 0.0);
        assert!(matches!(rx.try_recv(), Ok(Event::Reject(_))));
    }

    #[tokio::test]
    async fn test_mode_has_no_side_effects() {
        let ctx = test_ctx(OrderMode::Test);
        let (tx, _rx) = mpsc::channel(16);
        let out = process_one(
            &ctx,
            inbound("BTCUSDT", Side::Sell, Some(100.0), Some(1.0)),
            &tx,
        )
        .await;
        assert_eq!(out, Outcome::DryRun);
        assert!(ctx.ledger.lock().unwrap().snapshot().orders.is_empty());
    }

    #[tokio::test]
    async fn live_without_credentials_fails_without_call() {
        let ctx = test_ctx(OrderMode::Live);
        let (tx, _rx) = mpsc::channel(16);
        let out = process_one(
            &ctx,
            inbound("BTCUSDT", Side::Buy, Some(100.0), Some(1.0)),
            &tx,
        )
        .await;
        assert_eq!(out, Outcome::Failed);
    }
}
