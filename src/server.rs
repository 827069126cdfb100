// ===============================
// src/server.rs (webhook listener)
// ===============================
//
// Boundary HTTP untuk alert TradingView:
// - POST /webhook (+ trailing slash) : validasi secret, dedup, ack cepat
// - GET  /, /health                  : liveness check
// - GET  /webhook                    : 405 hint biar tidak dikira 404
// - GET  /paper, POST /paper/reset   : hanya saat ORDER_MODE=paper
//
// Prinsip: balas 200 dulu (ack + flag duplicate), order logic jalan di task
// terpisah lewat antrian mpsc — latency delivery alert tidak ikut latency
// exchange. Error setelah ack hanya kelihatan di log/metrics.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use rand::Rng;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bingx::timestamp_ms;
use crate::config::OrderMode;
use crate::domain::{Alert, AlertRecord, Event, OrderType, PositionSide, Side, Signal};
use crate::metrics::{ALERTS, DUPLICATES, HTTP_REJECTS};
use crate::processor::{Ctx, Inbound};

const MAX_BODY_BYTES: usize = 1 << 20; // 1 MiB, sama dengan limit body parser lama

const SERVICE_NAME: &str = "tv-bingx-relay";

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

fn reject(status: StatusCode, reason: &'static str, body: serde_json::Value) -> Response<Body> {
    HTTP_REJECTS.with_label_values(&[reason]).inc();
    json_response(status, body)
}

pub async fn serve(
    port: u16,
    ctx: Arc<Ctx>,
    sig_tx: mpsc::Sender<Inbound>,
    rec_tx: mpsc::Sender<Event>,
) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let make_svc = make_service_fn(move |_conn| {
        let ctx = ctx.clone();
        let sig_tx = sig_tx.clone();
        let rec_tx = rec_tx.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                handle(req, ctx.clone(), sig_tx.clone(), rec_tx.clone())
            }))
        }
    });

    info!(%addr, "webhook listening");
    if let Err(e) = Server::bind(&addr).serve(make_svc).await {
        error!(?e, "webhook server error");
    }
}

async fn handle(
    req: Request<Body>,
    ctx: Arc<Ctx>,
    sig_tx: mpsc::Sender<Inbound>,
    rec_tx: mpsc::Sender<Event>,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    // dukung ada/tanpa trailing slash
    let path = {
        let p = req.uri().path();
        if p.len() > 1 { p.trim_end_matches('/').to_string() } else { p.to_string() }
    };

    let rsp = match (method.as_str(), path.as_str()) {
        ("GET", "/") | ("GET", "/health") => json_response(
            StatusCode::OK,
            json!({ "ok": true, "service": SERVICE_NAME, "orderMode": ctx.mode.as_str() }),
        ),
        ("POST", "/webhook") => webhook(req, &ctx, &sig_tx, &rec_tx).await,
        ("GET", "/webhook") => {
            json_response(StatusCode::METHOD_NOT_ALLOWED, json!({ "hint": "use POST /webhook" }))
        }
        ("GET", "/paper") if ctx.mode == OrderMode::Paper => {
            let snap = ctx.ledger.lock().unwrap().snapshot();
            json_response(
                StatusCode::OK,
                json!({ "ok": true, "positions": snap.positions, "orders": snap.orders }),
            )
        }
        ("POST", "/paper/reset") if ctx.mode == OrderMode::Paper => {
            ctx.ledger.lock().unwrap().reset();
            info!("paper ledger reset");
            let _ = rec_tx.try_send(Event::Note("paper ledger reset".to_string()));
            json_response(StatusCode::OK, json!({ "ok": true }))
        }
        _ => json_response(StatusCode::NOT_FOUND, json!({ "error": "not_found" })),
    };
    Ok(rsp)
}

async fn webhook(
    req: Request<Body>,
    ctx: &Ctx,
    sig_tx: &mpsc::Sender<Inbound>,
    rec_tx: &mpsc::Sender<Event>,
) -> Response<Body> {
    let bytes = match hyper::body::to_bytes(req.into_body()).await {
        Ok(b) => b,
        Err(e) => {
            warn!(?e, "failed to read webhook body");
            return reject(StatusCode::BAD_REQUEST, "invalid_json", json!({ "error": "invalid_json" }));
        }
    };
    if bytes.len() > MAX_BODY_BYTES {
        return reject(
            StatusCode::PAYLOAD_TOO_LARGE,
            "too_large",
            json!({ "error": "payload_too_large" }),
        );
    }

    let payload: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(_) => {
            return reject(StatusCode::BAD_REQUEST, "invalid_json", json!({ "error": "invalid_json" }))
        }
    };
    let alert: Alert = match serde_json::from_value(payload.clone()) {
        Ok(a) => a,
        Err(e) => {
            debug!(?e, "webhook payload missing required fields");
            return reject(StatusCode::BAD_REQUEST, "bad_payload", json!({ "error": "bad_payload" }));
        }
    };

    // Validasi secret (field passphrase atau token)
    if !ctx.secret.is_empty() {
        let got = alert
            .passphrase
            .as_deref()
            .or(alert.token.as_deref())
            .unwrap_or("")
            .trim();
        if got.is_empty() {
            return reject(
                StatusCode::UNAUTHORIZED,
                "bad_token",
                json!({ "error": "missing passphrase" }),
            );
        }
        if got != ctx.secret {
            return reject(
                StatusCode::UNAUTHORIZED,
                "bad_token",
                json!({ "error": "bad passphrase" }),
            );
        }
    }

    let Some(side) = Side::parse_one(&alert.side) else {
        return reject(StatusCode::BAD_REQUEST, "bad_side", json!({ "error": "bad_side" }));
    };
    let order_type = match alert.order_type.as_deref() {
        None => OrderType::Market,
        Some(t) => match OrderType::parse_one(t) {
            Some(ot) => ot,
            None => {
                return reject(StatusCode::BAD_REQUEST, "bad_type", json!({ "error": "bad_type" }))
            }
        },
    };
    let position_side = alert
        .position_side
        .as_deref()
        .and_then(PositionSide::parse_one)
        .unwrap_or_else(|| PositionSide::from_side(side));

    let signal = Signal {
        id: alert.id.clone(),
        symbol: alert.symbol.clone(),
        side,
        order_type,
        price: alert.price,
        qty: alert.qty,
        usd: alert.usd,
        position_side,
        reduce_only: alert.reduce_only,
    };

    ALERTS.inc();
    let now_ms = timestamp_ms();

    // Cek + catat fingerprint di bawah satu lock: tidak ada suspension
    // antara check dan insert, jaminan at-most-once tetap utuh.
    let duplicate = {
        let mut dedup = ctx.dedup.lock().unwrap();
        let fp = dedup.fingerprint(&signal, now_ms);
        dedup.check_and_remember(&fp)
    };
    if duplicate {
        DUPLICATES.inc();
    }

    let trace_id = format!("TV-{}-{}", now_ms, rand::thread_rng().gen::<u32>());
    debug!(%trace_id, payload = %payload, duplicate, "webhook alert");
    let _ = rec_tx.try_send(Event::Alert(AlertRecord {
        trace_id: trace_id.clone(),
        duplicate,
        signal: signal.clone(),
    }));

    if !duplicate {
        // Antrian bounded: kalau penuh, send menunggu (backpressure), bukan drop.
        if sig_tx.send(Inbound { trace_id: trace_id.clone(), signal }).await.is_err() {
            error!(%trace_id, "signal queue closed, alert dropped");
        }
    }

    json_response(StatusCode::OK, json!({ "ok": true, "duplicate": duplicate, "echo": payload }))
}
