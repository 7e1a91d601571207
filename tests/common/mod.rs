#![allow(dead_code)]
#![allow(clippy::type_complexity)]

use async_trait::async_trait;
use nse_option_proxy::{ContractInfo, NSEError, Upstream};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory stand-in for NSE. Behaviour comes from closures; every call is recorded.
pub struct MockUpstream {
    pub contract_fn: Arc<dyn Fn(&str) -> Result<ContractInfo, NSEError> + Send + Sync>,
    pub chain_fn: Arc<dyn Fn(&str, &str) -> Result<Value, NSEError> + Send + Sync>,
    pub delay_ms: u64,
    pub contract_calls: Mutex<Vec<String>>,
    pub chain_calls: Mutex<Vec<(String, String)>>,
}

impl MockUpstream {
    /// Contract info served from a fixed table; symbols not in it fail with a transport error.
    pub fn with_expiries(table: &[(&str, &[&str])]) -> Self {
        let table: HashMap<String, Vec<String>> = table
            .iter()
            .map(|(symbol, dates)| {
                (symbol.to_string(), dates.iter().map(|d| d.to_string()).collect())
            })
            .collect();

        Self::from_fn(move |symbol| match table.get(symbol) {
            Some(dates) => Ok(ContractInfo {
                expiry_dates: dates.clone(),
                strike_prices: Vec::new(),
            }),
            None => Err(transport_error(symbol)),
        })
    }

    pub fn from_fn<F>(contract_fn: F) -> Self
    where
        F: Fn(&str) -> Result<ContractInfo, NSEError> + Send + Sync + 'static,
    {
        Self {
            contract_fn: Arc::new(contract_fn),
            chain_fn: Arc::new(default_chain),
            delay_ms: 0,
            contract_calls: Mutex::new(Vec::new()),
            chain_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_chain_fn<F>(mut self, chain_fn: F) -> Self
    where
        F: Fn(&str, &str) -> Result<Value, NSEError> + Send + Sync + 'static,
    {
        self.chain_fn = Arc::new(chain_fn);
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn contract_calls(&self) -> Vec<String> {
        self.contract_calls.lock().unwrap().clone()
    }

    pub fn chain_calls(&self) -> Vec<(String, String)> {
        self.chain_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn contract_info(&self, symbol: &str) -> Result<ContractInfo, NSEError> {
        self.contract_calls.lock().unwrap().push(symbol.to_string());
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        (self.contract_fn)(symbol)
    }

    async fn option_chain(&self, symbol: &str, expiry: &str) -> Result<Value, NSEError> {
        self.chain_calls
            .lock()
            .unwrap()
            .push((symbol.to_string(), expiry.to_string()));
        (self.chain_fn)(symbol, expiry)
    }
}

pub fn transport_error(symbol: &str) -> NSEError {
    NSEError::transport(
        &format!("https://www.nseindia.com/api/option-chain-contract-info?symbol={}", symbol),
        "connection reset by peer",
    )
}

fn default_chain(symbol: &str, expiry: &str) -> Result<Value, NSEError> {
    Ok(chain_document(symbol, expiry))
}

pub fn chain_document(symbol: &str, expiry: &str) -> Value {
    json!({
        "records": {
            "timestamp": "10-Sep-2025 15:30:00",
            "underlyingValue": 24973.1,
            "symbol": symbol,
            "expiry": expiry,
        },
        "filtered": { "data": [] }
    })
}
