use crate::config::normalize_symbol;
use crate::error::NSEError;
use crate::expiry_cache::{select_nearest, ExpiryCache};
use crate::nse_client::Upstream;
use chrono::{Local, NaiveDate};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

pub type TodayFn = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Result of one option-chain request. Every variant is a valid answer to the caller.
#[derive(Debug)]
pub enum OptionChainOutcome {
    Chain {
        symbol: String,
        expiry: String,
        document: Value,
    },
    /// Nothing cached for the symbol, even after a forced refresh.
    NoExpiry { symbol: String },
    Failed {
        symbol: String,
        expiry: String,
        error: NSEError,
    },
}

/// Resolves the expiry for a request and fetches the chain from NSE.
#[derive(Clone)]
pub struct OptionChainService {
    cache: Arc<ExpiryCache>,
    upstream: Arc<dyn Upstream>,
    today: TodayFn,
}

impl OptionChainService {
    pub fn new(cache: Arc<ExpiryCache>, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            cache,
            upstream,
            today: Arc::new(|| Local::now().date_naive()),
        }
    }

    /// Replace the clock used to decide which expiries have passed.
    pub fn with_today<F>(mut self, today: F) -> Self
    where
        F: Fn() -> NaiveDate + Send + Sync + 'static,
    {
        self.today = Arc::new(today);
        self
    }

    pub fn cache(&self) -> &Arc<ExpiryCache> {
        &self.cache
    }

    /// A supplied expiry is used verbatim. Otherwise the nearest cached
    /// expiry, refreshing the symbol once on a miss.
    pub async fn resolve_expiry(&self, symbol: &str, expiry: Option<&str>) -> Option<String> {
        if let Some(expiry) = expiry.map(str::trim).filter(|e| !e.is_empty()) {
            return Some(expiry.to_string());
        }

        let symbol = normalize_symbol(symbol);
        let today = (self.today)();

        if let Some(nearest) = self.cache.nearest_expiry(&symbol, today).await {
            return Some(nearest.to_string());
        }

        info!(symbol = %symbol, "No cached expiry, forcing refresh");
        let dates = self.cache.refresh_symbol(self.upstream.as_ref(), &symbol).await;

        select_nearest(&dates, today).map(|nearest| nearest.to_string())
    }

    pub async fn fetch(&self, symbol: &str, expiry: Option<&str>) -> OptionChainOutcome {
        let symbol = normalize_symbol(symbol);

        let Some(expiry) = self.resolve_expiry(&symbol, expiry).await else {
            warn!(symbol = %symbol, "No expiry found");
            return OptionChainOutcome::NoExpiry { symbol };
        };

        info!(symbol = %symbol, expiry = %expiry, "Fetching option chain");
        match self.upstream.option_chain(&symbol, &expiry).await {
            Ok(document) => OptionChainOutcome::Chain { symbol, expiry, document },
            Err(error) => {
                warn!(symbol = %symbol, expiry = %expiry, kind = error.kind(), error = %error, "Option chain fetch failed");
                OptionChainOutcome::Failed { symbol, expiry, error }
            }
        }
    }
}
