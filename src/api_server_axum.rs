use crate::config::AppConfig;
use crate::expiry_cache::ExpiryCache;
use crate::models::ExpiryDate;
use crate::option_chain::{OptionChainOutcome, OptionChainService};
use anyhow::Result;
use axum::{
    extract::{rejection::PathRejection, Path, Query, State},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

// -----------------------------------------------
// API REQUEST/RESPONSE MODELS
// -----------------------------------------------

#[derive(Debug, Deserialize)]
pub struct OptionChainQuery {
    pub expiry: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub error_kind: Option<&'static str>,
    pub processing_time_ms: Option<u64>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T, start_time: Instant) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            processing_time_ms: Some(start_time.elapsed().as_millis() as u64),
        }
    }

    fn failed(kind: &'static str, error: String, start_time: Instant) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            error_kind: Some(kind),
            processing_time_ms: Some(start_time.elapsed().as_millis() as u64),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExpiriesResponse {
    pub refreshed_at: Option<DateTime<Utc>>,
    pub expiries: BTreeMap<String, Vec<ExpiryDate>>,
}

#[derive(Debug, Serialize)]
pub struct OptionChainResponse {
    pub symbol: String,
    pub expiry: String,
    pub chain: Value,
}

// -----------------------------------------------
// APPLICATION STATE
// -----------------------------------------------

#[derive(Clone)]
pub struct AppState {
    service: OptionChainService,
}

impl AppState {
    pub fn new(service: OptionChainService) -> Self {
        Self { service }
    }

    fn cache(&self) -> &Arc<ExpiryCache> {
        self.service.cache()
    }
}

// -----------------------------------------------
// API HANDLERS
// -----------------------------------------------

/// GET / - Liveness
async fn root() -> Json<Value> {
    Json(json!({ "message": "NSE option chain proxy is running" }))
}

/// GET /expiries - Current expiry cache contents
async fn get_expiries(State(app_state): State<AppState>) -> Json<ApiResponse<ExpiriesResponse>> {
    let start_time = Instant::now();
    let snapshot = app_state.cache().snapshot().await;

    let expiries = snapshot
        .iter()
        .map(|(symbol, dates)| (symbol.clone(), dates.clone()))
        .collect();

    Json(ApiResponse::ok(
        ExpiriesResponse {
            refreshed_at: app_state.cache().refreshed_at().await,
            expiries,
        },
        start_time,
    ))
}

/// GET /option-chain/{symbol}?expiry=25-Sep-2025
async fn get_option_chain(
    Path(symbol): Path<String>,
    Query(query): Query<OptionChainQuery>,
    State(app_state): State<AppState>,
) -> Json<ApiResponse<OptionChainResponse>> {
    option_chain_response(&app_state, &symbol, query.expiry.as_deref()).await
}

/// GET /option-chain/{symbol}/{expiry}
async fn get_option_chain_for_expiry(
    Path((symbol, expiry)): Path<(String, String)>,
    State(app_state): State<AppState>,
) -> Json<ApiResponse<OptionChainResponse>> {
    option_chain_response(&app_state, &symbol, Some(&expiry)).await
}

/// GET /items/{item_id}?q=
async fn get_item(
    item_id: Result<Path<i64>, PathRejection>,
    Query(query): Query<ItemQuery>,
) -> Response {
    match item_id {
        Ok(Path(item_id)) => Json(json!({ "item_id": item_id, "q": query.q })).into_response(),
        Err(rejection) => Json(ApiResponse::<Value>::failed(
            "invalid_request",
            rejection.body_text(),
            Instant::now(),
        ))
        .into_response(),
    }
}

// -----------------------------------------------
// HELPER FUNCTIONS
// -----------------------------------------------

async fn option_chain_response(
    app_state: &AppState,
    symbol: &str,
    expiry: Option<&str>,
) -> Json<ApiResponse<OptionChainResponse>> {
    let start_time = Instant::now();

    let response = match app_state.service.fetch(symbol, expiry).await {
        OptionChainOutcome::Chain { symbol, expiry, document } => ApiResponse::ok(
            OptionChainResponse { symbol, expiry, chain: document },
            start_time,
        ),
        OptionChainOutcome::NoExpiry { symbol } => ApiResponse::failed(
            "no_expiry_found",
            format!("No expiry found for {}", symbol),
            start_time,
        ),
        OptionChainOutcome::Failed { symbol, expiry, error } => ApiResponse::failed(
            error.kind(),
            format!("{} ({} {})", error, symbol, expiry),
            start_time,
        ),
    };

    Json(response)
}

// -----------------------------------------------
// SERVER SETUP
// -----------------------------------------------

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/expiries", get(get_expiries))
        .route("/option-chain/{symbol}", get(get_option_chain))
        .route("/option-chain/{symbol}/{expiry}", get(get_option_chain_for_expiry))
        .route("/items/{item_id}", get(get_item))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Serve until `shutdown` is cancelled.
pub async fn start_server(
    config: &AppConfig,
    app_state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = build_router(app_state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("🚀 NSE option chain proxy running on http://{}", addr.as_str().green());
    println!("{}", "Available endpoints:".cyan());
    println!("   GET  /");
    println!("   GET  /expiries");
    println!("   GET  /option-chain/NIFTY");
    println!("   GET  /option-chain/NIFTY?expiry=25-Sep-2025");
    println!("   GET  /option-chain/NIFTY/25-Sep-2025");
    println!("   GET  /items/1?q=hello");
    println!();
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
