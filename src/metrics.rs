// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Webhook boundary --------
pub static ALERTS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("webhook_alerts_total", "alerts accepted at the webhook").unwrap());

pub static DUPLICATES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("webhook_duplicates_total", "alerts suppressed by the dedup cache").unwrap()
});

pub static HTTP_REJECTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "webhook_rejected_total",
            "requests rejected at the boundary (label: reason)",
        ),
        &["reason"],
    )
    .unwrap()
});

// -------- Signal pipeline --------
pub static SIZING_REJECTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sizing_rejects_total", "signals dropped by the sizing engine"),
        &["reason"],
    )
    .unwrap()
});

pub static ORDERS_BY_MODE: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("orders_total", "sized orders routed per mode"),
        &["mode"],
    )
    .unwrap()
});

pub static EXCHANGE_ORDERS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("exchange_orders_total", "live dispatch outcomes"),
        &["status"],
    )
    .unwrap()
});

// -------- Paper ledger --------
pub static PAPER_TRADES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("paper_trades_total", "simulated fills per symbol"),
        &["symbol"],
    )
    .unwrap()
});

pub static PAPER_POS_QTY: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("paper_position_qty", "signed simulated position per symbol"),
        &["symbol"],
    )
    .unwrap()
});

pub static PAPER_REALIZED: Lazy<Gauge> = Lazy::new(|| {
    Gauge::new("paper_realized_pnl", "cumulative simulated realized PnL").unwrap()
});

// ---- Config visibility (mode / symbol rules) ----
pub static CONFIG_ORDER_MODE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_order_mode", "order mode (label: mode)"),
        &["mode"],
    )
    .unwrap()
});

pub static CONFIG_SYMBOL_RULE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_symbol_rule", "symbols with sizing overrides (label: symbol)"),
        &["symbol"],
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(ALERTS.clone())),
        REGISTRY.register(Box::new(DUPLICATES.clone())),
        REGISTRY.register(Box::new(HTTP_REJECTS.clone())),
        REGISTRY.register(Box::new(SIZING_REJECTS.clone())),
        REGISTRY.register(Box::new(ORDERS_BY_MODE.clone())),
        REGISTRY.register(Box::new(EXCHANGE_ORDERS.clone())),
        REGISTRY.register(Box::new(PAPER_TRADES.clone())),
        REGISTRY.register(Box::new(PAPER_POS_QTY.clone())),
        REGISTRY.register(Box::new(PAPER_REALIZED.clone())),
        REGISTRY.register(Box::new(CONFIG_ORDER_MODE.clone())),
        REGISTRY.register(Box::new(CONFIG_SYMBOL_RULE.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics) — tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    // Read a bit to consume headers (no full parse)
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

// Run the metrics server in a dedicated OS thread (keeps Tokio runtime clean)
pub async fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = TcpListener::bind(&addr)
            .unwrap_or_else(|e| panic!("metrics bind {} failed: {}", addr, e));
        eprintln!("metrics listening on http://{addr}/ (and /metrics)");

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => eprintln!("metrics accept error: {}", e),
            }
        }
    });
}
