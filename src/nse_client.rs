use crate::config;
use crate::decoder::decode_response;
use crate::error::{Codec, NSEError};
use crate::models::{ContractInfo, RawResponse};
use async_trait::async_trait;
use rand::{seq::SliceRandom, thread_rng};
use reqwest::{header, Client};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

// -----------------------------------------------
// UPSTREAM SEAM
// -----------------------------------------------

/// What the cache and the request handler need from NSE.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn contract_info(&self, symbol: &str) -> Result<ContractInfo, NSEError>;

    async fn option_chain(&self, symbol: &str, expiry: &str) -> Result<Value, NSEError>;
}

// -----------------------------------------------
// CLIENT
// -----------------------------------------------

/// NSE client. Every operation runs on a freshly warmed session so the
/// anti-bot cookies are never older than the call that needs them.
#[derive(Debug, Clone, Default)]
pub struct NSEClient;

impl NSEClient {
    pub fn new() -> Self {
        Self
    }

    /// Build a browser-like session and warm it up against the option-chain page.
    /// A failed warm-up is logged and ignored.
    pub async fn open_session(&self) -> Result<NSESession, NSEError> {
        let session = NSESession {
            client: build_client()?,
        };
        session.warm_up().await;
        Ok(session)
    }
}

#[async_trait]
impl Upstream for NSEClient {
    async fn contract_info(&self, symbol: &str) -> Result<ContractInfo, NSEError> {
        let session = self.open_session().await?;
        let value = session.fetch_json(&config::nse_contract_info_url(symbol)).await?;
        let info: ContractInfo = serde_json::from_value(value)?;
        Ok(info)
    }

    async fn option_chain(&self, symbol: &str, expiry: &str) -> Result<Value, NSEError> {
        let session = self.open_session().await?;
        session
            .fetch_json(&config::nse_option_chain_url(symbol, expiry))
            .await
    }
}

// -----------------------------------------------
// SESSION
// -----------------------------------------------
pub struct NSESession {
    client: Client,
}

impl NSESession {
    async fn warm_up(&self) {
        match self
            .fetch(config::NSE_OPTION_CHAIN_PAGE, config::WARMUP_TIMEOUT)
            .await
        {
            Ok(raw) => debug!(status = raw.status, "NSE session warmed up"),
            Err(e) => warn!(error = %e, "NSE warm-up request failed, continuing without cookies"),
        }
    }

    /// Single GET with a fixed timeout. No retries.
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<RawResponse, NSEError> {
        let res = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| NSEError::transport(url, e))?;

        let status = res.status().as_u16();
        let headers = res.headers().clone();
        // reqwest inflates gzip itself, so a corrupt gzip body fails here.
        let body = res.bytes().await.map_err(|e| body_error(url, e))?.to_vec();

        Ok(RawResponse { status, headers, body })
    }

    /// Fetch a data endpoint and decode it, rejecting non-success statuses.
    pub async fn fetch_json(&self, url: &str) -> Result<Value, NSEError> {
        let raw = self.fetch(url, config::DATA_TIMEOUT).await?;
        debug!(url, status = raw.status, bytes = raw.body.len(), "NSE response received");
        ensure_success(url, &raw)?;
        decode_response(&raw).await
    }
}

fn body_error(url: &str, e: reqwest::Error) -> NSEError {
    if e.is_decode() {
        NSEError::Decompress {
            codec: Codec::Gzip,
            message: e.to_string(),
        }
    } else {
        NSEError::transport(url, e)
    }
}

pub fn ensure_success(url: &str, raw: &RawResponse) -> Result<(), NSEError> {
    if raw.is_success() {
        return Ok(());
    }
    Err(NSEError::HttpStatus {
        url: url.to_string(),
        status: raw.status,
        preview: raw.body_preview(config::STATUS_PREVIEW_CHARS),
    })
}

// -----------------------------------------------
// HTTP CLIENT BUILDER
// -----------------------------------------------
fn build_client() -> Result<Client, NSEError> {
    let mut headers = header::HeaderMap::new();

    let lang = config::ACCEPT_LANGUAGES
        .choose(&mut thread_rng())
        .copied()
        .unwrap_or("en-US,en;q=0.9");
    headers.insert(header::ACCEPT_LANGUAGE, header::HeaderValue::from_static(lang));
    headers.insert(header::ACCEPT, header::HeaderValue::from_static(config::HEADER_ACCEPT));
    headers.insert(
        header::ACCEPT_ENCODING,
        header::HeaderValue::from_static(config::HEADER_ACCEPT_ENCODING),
    );
    headers.insert(header::REFERER, header::HeaderValue::from_static(config::HEADER_REFERER));

    Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .user_agent(config::USER_AGENT)
        .build()
        .map_err(|e| NSEError::Client(e.to_string()))
}
