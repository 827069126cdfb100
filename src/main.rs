// ===============================
// src/main.rs
// ===============================
/*
 cd /home/kukuhtw/rust/tv_bingx_relay

 # liveness + mode aktif
curl -s localhost:3000/health

# kirim alert contoh (paper mode)
curl -s -X POST localhost:3000/webhook \
  -H 'Content-Type: application/json' \
  -d '{"symbol":"BTC-USDT","side":"BUY","type":"MARKET","qty":0.01,"price":50000}'

# posisi & order simulasi
curl -s localhost:3000/paper
curl -s localhost:9898/metrics | grep '^paper_'

*/
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
mod bingx; // helper (signer/canonical query) for BingX
mod config;
mod dedup;
mod domain;
mod gateway_bingx; // real BingX swap order dispatch (REST)
mod ledger;
mod metrics;
mod processor;
mod quant;
mod recorder;
mod server;
mod sizing;
mod symbols;

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::info;

use crate::dedup::DedupCache;
use crate::domain::Event;
use crate::gateway_bingx::BingxGateway;
use crate::ledger::PaperLedger;

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt().with_env_filter("info").init();

    // ---- Load config & sizing rules ----
    let (args, sizing) = config::load();

    // ---- Metrics ----
    metrics::init();
    tokio::spawn(metrics::serve_metrics(args.metrics_port));

    // ---- Human-friendly startup info + export config to metrics ----
    info!(
        mode = args.mode.as_str(),
        port = args.port,
        base_url = %args.bingx_base_url,
        secret_set = !args.webhook_secret.is_empty(),
        credentials_set = !args.bingx_api_key.is_empty(),
        default_qty = sizing.default_qty,
        symbol_rules = sizing.rules.len(),
        dedup_bucket_secs = args.dedup_bucket_secs,
        "startup config"
    );

    metrics::CONFIG_ORDER_MODE
        .with_label_values(&[args.mode.as_str()])
        .set(1);
    for sym in sizing.rules.keys() {
        metrics::CONFIG_SYMBOL_RULE.with_label_values(&[sym]).set(1);
    }

    // ---- Recorder (optional) ----
    let (rec_tx, rec_rx) = mpsc::channel::<Event>(8192);
    if let Some(path) = args.record_file.clone() {
        tokio::spawn(recorder::run(rec_rx, path));
    }

    // ---- Shared context: dedup + paper ledger + gateway ----
    let ctx = Arc::new(processor::Ctx {
        mode: args.mode.clone(),
        sizing,
        secret: args.webhook_secret.clone(),
        dedup: Mutex::new(DedupCache::new(args.dedup_max, args.dedup_bucket_secs)),
        ledger: Mutex::new(PaperLedger::new(args.sim_log_max)),
        gateway: BingxGateway::new(
            args.bingx_base_url.clone(),
            args.bingx_api_key.clone(),
            args.bingx_api_secret.clone(),
            args.bingx_source_key.clone(),
            args.recv_window,
        ),
    });

    // ---- Signal queue: webhook ack dulu, proses belakangan ----
    let (sig_tx, sig_rx) = mpsc::channel::<processor::Inbound>(2048);
    tokio::spawn(processor::run(sig_rx, ctx.clone(), rec_tx.clone()));

    // ---- Webhook server (main task) ----
    server::serve(args.port, ctx, sig_tx, rec_tx).await;
}
