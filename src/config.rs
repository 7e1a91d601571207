use anyhow::{bail, Result};
use std::time::Duration;

// -----------------------------------------------
// NSE API ENDPOINTS
// -----------------------------------------------
pub const NSE_BASE_URL: &str = "https://www.nseindia.com";
pub const NSE_OPTION_CHAIN_PAGE: &str = "https://www.nseindia.com/option-chain";

pub fn nse_contract_info_url(symbol: &str) -> String {
    format!(
        "{}/api/option-chain-contract-info?symbol={}",
        NSE_BASE_URL,
        urlencoding::encode(symbol)
    )
}

pub fn nse_option_chain_url(symbol: &str, expiry: &str) -> String {
    format!(
        "{}/api/option-chain-v3?type=Indices&symbol={}&expiry={}",
        NSE_BASE_URL,
        urlencoding::encode(symbol),
        urlencoding::encode(expiry)
    )
}

// -----------------------------------------------
// TRACKED INDICES
// -----------------------------------------------
pub const NSE_INDICES: &[&str] = &["NIFTY", "BANKNIFTY", "FINNIFTY", "MIDCPNIFTY"];

// -----------------------------------------------
// HTTP CLIENT CONFIG
// -----------------------------------------------
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                               AppleWebKit/537.36 (KHTML, like Gecko) \
                               Chrome/118.0.0.0 Safari/537.36";

pub const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.8",
    "en-IN,en;q=0.9",
];

pub const HEADER_ACCEPT: &str = "application/json, text/plain, */*";
pub const HEADER_ACCEPT_ENCODING: &str = "gzip, deflate, br";
pub const HEADER_REFERER: &str = NSE_OPTION_CHAIN_PAGE;

pub const WARMUP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DATA_TIMEOUT: Duration = Duration::from_secs(15);

// -----------------------------------------------
// EXPIRY CACHE
// -----------------------------------------------
pub const EXPIRY_DATE_FORMAT: &str = "%d-%b-%Y";
pub const DEFAULT_STALE_AFTER_HOURS: u64 = 12;
pub const DEFAULT_CHECK_INTERVAL_MINUTES: u64 = 60;

// -----------------------------------------------
// DIAGNOSTICS
// -----------------------------------------------
pub const STATUS_PREVIEW_CHARS: usize = 100;
pub const BLOCKED_PREVIEW_CHARS: usize = 120;

// -----------------------------------------------
// SERVER DEFAULTS
// -----------------------------------------------
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_LOG_DIR: &str = "./logs";

// -----------------------------------------------
// RUNTIME CONFIGURATION
// -----------------------------------------------

/// Application configuration, read from `NSE_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub symbols: Vec<String>,
    pub stale_after: Duration,
    pub check_interval: Duration,
    pub log_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            symbols: NSE_INDICES.iter().map(|s| s.to_string()).collect(),
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_HOURS * 3600),
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_MINUTES * 60),
            log_dir: DEFAULT_LOG_DIR.to_string(),
        }
    }
}

impl AppConfig {
    /// Create new configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let symbols = lookup("NSE_SYMBOLS")
            .map(|raw| parse_symbols(&raw))
            .unwrap_or(defaults.symbols);

        let stale_after = lookup("NSE_REFRESH_STALE_HOURS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|hours| Duration::from_secs(hours * 3600))
            .unwrap_or(defaults.stale_after);

        let check_interval = lookup("NSE_REFRESH_CHECK_MINUTES")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|minutes| Duration::from_secs(minutes * 60))
            .unwrap_or(defaults.check_interval);

        Self {
            host: lookup("NSE_HOST").unwrap_or(defaults.host),
            port: lookup("NSE_PORT")
                .and_then(|v| v.trim().parse::<u16>().ok())
                .unwrap_or(defaults.port),
            symbols,
            stale_after,
            check_interval,
            log_dir: lookup("NSE_LOG_DIR").unwrap_or(defaults.log_dir),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            bail!("NSE_SYMBOLS must name at least one symbol");
        }
        if self.check_interval.is_zero() {
            bail!("NSE_REFRESH_CHECK_MINUTES must be greater than zero");
        }
        if self.stale_after.is_zero() {
            bail!("NSE_REFRESH_STALE_HOURS must be greater than zero");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split a comma separated symbol list, uppercasing and dropping blanks and repeats.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(normalize_symbol) {
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
