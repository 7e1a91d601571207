use anyhow::Result;
use colored::Colorize;
use nse_option_proxy::{
    logging, start_server, AppConfig, AppState, ExpiryCache, ExpiryRefresher, NSEClient,
    OptionChainService, RefresherConfig, Upstream,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env();
    config.validate()?;
    logging::init_logging(&config.log_dir)?;

    println!("{}", "=".repeat(60).blue());
    println!("{}", "NSE Option Chain Proxy".green().bold());
    println!("{}", "=".repeat(60).blue());
    println!("{} Tracked symbols: {}", "→".cyan(), config.symbols.join(", ").yellow());
    println!(
        "{} Refresh when older than {}h, checked every {}m",
        "→".cyan(),
        config.stale_after.as_secs() / 3600,
        config.check_interval.as_secs() / 60
    );
    println!();

    let upstream: Arc<dyn Upstream> = Arc::new(NSEClient::new());
    let cache = Arc::new(ExpiryCache::new(&config.symbols));

    let refresher = ExpiryRefresher::spawn(
        Arc::clone(&cache),
        Arc::clone(&upstream),
        RefresherConfig {
            check_interval: config.check_interval,
            stale_after: config.stale_after,
        },
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_ctrl_c(shutdown.clone()));

    let app_state = AppState::new(OptionChainService::new(cache, upstream));
    let served = start_server(&config, app_state, shutdown).await;

    refresher.shutdown().await;
    info!("Shutdown complete");
    served
}

async fn wait_for_ctrl_c(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C, graceful shutdown disabled");
        return;
    }
    info!("Ctrl-C received, shutting down");
    shutdown.cancel();
}
