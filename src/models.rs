use crate::config::EXPIRY_DATE_FORMAT;
use chrono::NaiveDate;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Contract info payload from `option-chain-contract-info`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractInfo {
    #[serde(rename = "expiryDates")]
    pub expiry_dates: Vec<String>,

    #[serde(rename = "strikePrice", default)]
    pub strike_prices: Vec<String>,
}

impl ContractInfo {
    pub fn with_expiries(expiry_dates: &[&str]) -> Self {
        Self {
            expiry_dates: expiry_dates.iter().map(|d| d.to_string()).collect(),
            strike_prices: Vec::new(),
        }
    }
}

/// Contract expiry date, written as `DD-Mon-YYYY` on the wire (e.g. `16-Sep-2025`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExpiryDate(NaiveDate);

impl ExpiryDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Whole days from `today` until this expiry; negative once it has passed.
    pub fn days_from(&self, today: NaiveDate) -> i64 {
        (self.0 - today).num_days()
    }
}

impl From<NaiveDate> for ExpiryDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for ExpiryDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.format(EXPIRY_DATE_FORMAT))
    }
}

impl FromStr for ExpiryDate {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), EXPIRY_DATE_FORMAT).map(Self)
    }
}

impl Serialize for ExpiryDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExpiryDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Undecoded upstream response.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First `chars` characters of the body, decoded lossily.
    pub fn body_preview(&self, chars: usize) -> String {
        String::from_utf8_lossy(&self.body).chars().take(chars).collect()
    }
}
