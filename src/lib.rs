pub mod api_server_axum;
pub mod config;
pub mod decoder;
pub mod error;
pub mod expiry_cache;
pub mod logging;
pub mod models;
pub mod nse_client;
pub mod option_chain;
pub mod refresher;

// Re-exports for convenience
pub use api_server_axum::{build_router, start_server, AppState};
pub use config::AppConfig;
pub use decoder::decode_response;
pub use error::{Codec, NSEError};
pub use expiry_cache::{ExpiryCache, ExpiryMap, RefreshReport};
pub use models::{ContractInfo, ExpiryDate, RawResponse};
pub use nse_client::{NSEClient, NSESession, Upstream};
pub use option_chain::{OptionChainOutcome, OptionChainService};
pub use refresher::{ExpiryRefresher, RefresherConfig};
