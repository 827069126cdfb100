// ===============================
// src/gateway_bingx.rs
// ===============================
//
// Dispatcher order live ke BingX perpetual swap (REST, form-encoded POST,
// endpoint private yang ditandatangani HMAC-SHA256). Satu kali kirim per
// order: tanpa retry, tanpa backoff — respon gagal/error dikembalikan ke
// caller untuk dilog, bukan diulang.

use thiserror::Error;

use crate::bingx::{canonical_query, sign_query, timestamp_ms};
use crate::domain::OrderRequest;
use crate::quant::fmt_amount;

const ORDER_PATH: &str = "/openApi/swap/v2/trade/order";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("BINGX_API_KEY / BINGX_API_SECRET not configured")]
    MissingCredentials,
    #[error("exchange call failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct BingxGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    source_key: Option<String>,
    recv_window: u64,
}

impl BingxGateway {
    pub fn new(
        base_url: String,
        api_key: String,
        api_secret: String,
        source_key: Option<String>,
        recv_window: u64,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            api_secret,
            source_key,
            recv_window,
        }
    }

    /// Susun parameter order. `reduceOnly` dikirim sebagai literal "true"
    /// hanya saat aktif; exchange membaca ketiadaan field sebagai "bukan
    /// reduce-only" (bukan "false"). Harga hanya untuk LIMIT.
    pub fn build_params(req: &OrderRequest, timestamp: u64, recv_window: u64) -> Vec<(String, String)> {
        let mut params = vec![
            ("symbol".to_string(), req.symbol.clone()),
            ("side".to_string(), req.side.as_str().to_string()),
            ("positionSide".to_string(), req.position_side.as_str().to_string()),
            ("type".to_string(), req.order_type.as_str().to_string()),
            ("quantity".to_string(), fmt_amount(req.qty)),
            ("timestamp".to_string(), timestamp.to_string()),
            ("recvWindow".to_string(), recv_window.to_string()),
        ];
        if let Some(px) = req.price {
            params.push(("price".to_string(), fmt_amount(px)));
        }
        if req.reduce_only {
            params.push(("reduceOnly".to_string(), "true".to_string()));
        }
        params
    }

    /// Kirim order (sekali saja). Mengembalikan status HTTP + body mentah;
    /// non-2xx bukan Err di level ini — caller yang memutuskan log-nya.
    pub async fn place_order(&self, req: &OrderRequest) -> Result<(u16, String), GatewayError> {
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            return Err(GatewayError::MissingCredentials);
        }

        let params = Self::build_params(req, timestamp_ms(), self.recv_window);
        let query = canonical_query(&params);
        let signature = sign_query(&self.api_secret, &query);
        let url = format!("{}{}", self.base_url, ORDER_PATH);
        let body = format!("{}&signature={}", query, signature);

        let mut builder = self
            .http
            .post(&url)
            .header("X-BX-APIKEY", &self.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body);
        if let Some(src) = &self.source_key {
            builder = builder.header("X-SOURCE-KEY", src);
        }

        let rsp = builder.send().await?;
        let status = rsp.status().as_u16();
        let text = rsp.text().await.unwrap_or_default();
        Ok((status, text))
    }
}
