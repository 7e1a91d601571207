use crate::expiry_cache::ExpiryCache;
use crate::nse_client::Upstream;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy)]
pub struct RefresherConfig {
    /// How often the loop wakes up to look at the cache.
    pub check_interval: Duration,
    /// Age after which a wake-up triggers a refresh.
    pub stale_after: Duration,
}

/// Handle to the background task that keeps an [`ExpiryCache`] warm.
pub struct ExpiryRefresher {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ExpiryRefresher {
    /// Start the loop. The first staleness check happens immediately.
    pub fn spawn(
        cache: Arc<ExpiryCache>,
        upstream: Arc<dyn Upstream>,
        config: RefresherConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(cache, upstream, config, cancel.clone()));
        Self { cancel, handle }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the loop and wait for it to exit. An in-flight refresh runs to completion first.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!(error = %e, "Expiry refresher task failed");
        }
    }
}

async fn run(
    cache: Arc<ExpiryCache>,
    upstream: Arc<dyn Upstream>,
    config: RefresherConfig,
    cancel: CancellationToken,
) {
    info!(
        check_interval_secs = config.check_interval.as_secs(),
        stale_after_secs = config.stale_after.as_secs(),
        "Expiry refresher starting"
    );

    while !cancel.is_cancelled() {
        if cache.is_stale(config.stale_after).await {
            let report = cache.refresh_all(upstream.as_ref()).await;
            if !report.failed.is_empty() {
                info!(failed = ?report.failed, "Some symbols kept empty expiry lists");
            }
        } else {
            debug!("Expiry cache still fresh, skipping refresh");
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(config.check_interval) => {}
        }
    }

    info!("Expiry refresher exiting");
}
