use crate::config::normalize_symbol;
use crate::models::ExpiryDate;
use crate::nse_client::Upstream;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub type ExpiryMap = HashMap<String, Vec<ExpiryDate>>;

/// Day distance given to expiries that have already passed. Keeps them
/// selectable, behind every live expiry, when nothing better is cached.
pub const STALE_EXPIRY_DISTANCE: i64 = 99_999;

#[derive(Debug, Clone, Copy)]
struct RefreshStamp {
    at: Instant,
    wall: DateTime<Utc>,
}

/// Outcome of one full refresh, for logging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
}

// -----------------------------------------------
// EXPIRY CACHE
// -----------------------------------------------

/// Symbol → expiry dates, as last reported by NSE.
///
/// Readers clone the current `Arc` snapshot and never see a partially
/// written map: refreshes build a new map on the side and swap the pointer.
/// `refresh_lock` keeps at most one refresh in flight.
pub struct ExpiryCache {
    symbols: Vec<String>,
    snapshot: RwLock<Arc<ExpiryMap>>,
    refreshed_at: RwLock<Option<RefreshStamp>>,
    refresh_lock: Mutex<()>,
}

impl ExpiryCache {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tracked: Vec<String> = Vec::new();
        for symbol in symbols {
            let symbol = normalize_symbol(symbol.as_ref());
            if !symbol.is_empty() && !tracked.contains(&symbol) {
                tracked.push(symbol);
            }
        }

        Self {
            symbols: tracked,
            snapshot: RwLock::new(Arc::new(ExpiryMap::new())),
            refreshed_at: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn tracked_symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Current published map.
    pub async fn snapshot(&self) -> Arc<ExpiryMap> {
        Arc::clone(&*self.snapshot.read().await)
    }

    pub async fn expiries(&self, symbol: &str) -> Option<Vec<ExpiryDate>> {
        self.snapshot().await.get(&normalize_symbol(symbol)).cloned()
    }

    /// Wall-clock time of the last completed full refresh.
    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at.read().await.map(|stamp| stamp.wall)
    }

    /// True when no full refresh has completed yet, or the last one is older than `threshold`.
    pub async fn is_stale(&self, threshold: Duration) -> bool {
        match *self.refreshed_at.read().await {
            Some(stamp) => stamp.at.elapsed() > threshold,
            None => true,
        }
    }

    pub async fn nearest_expiry(&self, symbol: &str, today: NaiveDate) -> Option<ExpiryDate> {
        let snapshot = self.snapshot().await;
        let dates = snapshot.get(&normalize_symbol(symbol))?;
        select_nearest(dates, today)
    }

    /// Re-fetch every tracked symbol and publish the result as one new map.
    ///
    /// A symbol that fails to fetch is stored with an empty list; the
    /// remaining symbols are unaffected. Never fails.
    pub async fn refresh_all(&self, upstream: &dyn Upstream) -> RefreshReport {
        let _guard = self.refresh_lock.lock().await;

        let mut working = ExpiryMap::with_capacity(self.symbols.len());
        let mut report = RefreshReport::default();

        for symbol in &self.symbols {
            match fetch_expiries(upstream, symbol).await {
                Some(dates) => {
                    report.refreshed.push(symbol.clone());
                    working.insert(symbol.clone(), dates);
                }
                None => {
                    report.failed.push(symbol.clone());
                    working.insert(symbol.clone(), Vec::new());
                }
            }
        }

        self.publish(working).await;
        // A refresh where every symbol failed leaves the cache stale so the
        // next timer wake retries it.
        if !report.refreshed.is_empty() {
            *self.refreshed_at.write().await = Some(RefreshStamp {
                at: Instant::now(),
                wall: Utc::now(),
            });
        }

        info!(
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            "Expiry cache refreshed"
        );
        report
    }

    /// Miss-path refresh for one symbol, returning the dates it resolved to.
    ///
    /// A tracked symbol is fetched under the refresh lock and its entry is
    /// replaced, with an empty list on failure. An untracked symbol is fetched
    /// without the lock and stored only when the fetch yields dates. Neither
    /// counts as a full refresh for staleness.
    pub async fn refresh_symbol(&self, upstream: &dyn Upstream, symbol: &str) -> Vec<ExpiryDate> {
        let symbol = normalize_symbol(symbol);

        if !self.symbols.contains(&symbol) {
            let dates = fetch_expiries(upstream, &symbol).await.unwrap_or_default();
            if !dates.is_empty() {
                let _guard = self.refresh_lock.lock().await;
                self.patch(symbol, dates.clone()).await;
            }
            return dates;
        }

        let _guard = self.refresh_lock.lock().await;

        // Whoever held the lock before us may already have filled it.
        if let Some(dates) = self.expiries(&symbol).await.filter(|dates| !dates.is_empty()) {
            debug!(symbol = %symbol, "Expiry entry filled by a concurrent refresh");
            return dates;
        }

        let dates = fetch_expiries(upstream, &symbol).await.unwrap_or_default();
        self.patch(symbol, dates.clone()).await;
        dates
    }

    /// Publish a copy of the current map with one entry replaced.
    async fn patch(&self, symbol: String, dates: Vec<ExpiryDate>) {
        let mut working = ExpiryMap::clone(&*self.snapshot().await);
        working.insert(symbol, dates);
        self.publish(working).await;
    }

    async fn publish(&self, map: ExpiryMap) {
        *self.snapshot.write().await = Arc::new(map);
    }
}

async fn fetch_expiries(upstream: &dyn Upstream, symbol: &str) -> Option<Vec<ExpiryDate>> {
    match upstream.contract_info(symbol).await {
        Ok(info) => Some(parse_expiries(symbol, &info.expiry_dates)),
        Err(e) => {
            warn!(symbol, error = %e, kind = e.kind(), "Failed to fetch contract info");
            None
        }
    }
}

/// Parse upstream expiry strings, keeping upstream order and skipping malformed ones.
pub fn parse_expiries(symbol: &str, raw: &[String]) -> Vec<ExpiryDate> {
    raw.iter()
        .filter_map(|s| match s.parse::<ExpiryDate>() {
            Ok(date) => Some(date),
            Err(e) => {
                warn!(symbol, value = %s, error = %e, "Skipping unparseable expiry date");
                None
            }
        })
        .collect()
}

/// Pick the expiry with the fewest days to go, counting from `today`.
///
/// Past expiries are weighted at [`STALE_EXPIRY_DISTANCE`], so a list with
/// no live expiry still yields its first entry instead of nothing.
pub fn select_nearest(dates: &[ExpiryDate], today: NaiveDate) -> Option<ExpiryDate> {
    dates
        .iter()
        .min_by_key(|date| {
            let days = date.days_from(today);
            if days >= 0 { days } else { STALE_EXPIRY_DISTANCE }
        })
        .copied()
}
