use std::fmt;
use thiserror::Error;

/// Compression codec a response declared via `Content-Encoding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Brotli,
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Codec::Gzip => write!(f, "gzip"),
            Codec::Brotli => write!(f, "brotli"),
        }
    }
}

/// Failures on the path from NSE to a decoded document.
///
/// Decompression failures point at codec problems; `Blocked` and
/// `UnknownFormat` point at NSE refusing to serve data.
#[derive(Debug, Error)]
pub enum NSEError {
    /// Connection failure or timeout reaching NSE.
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// NSE answered with a non-success status.
    #[error("HTTP {status} from {url}. Response starts with: {preview}")]
    HttpStatus {
        url: String,
        status: u16,
        preview: String,
    },

    #[error("Failed to decompress {codec} response: {message}")]
    Decompress { codec: Codec, message: String },

    /// An HTML page (usually a bot challenge) came back instead of JSON.
    #[error("NSE returned HTML instead of JSON. Probably blocked or throttled. Response: {preview}")]
    Blocked { preview: String },

    #[error("Unknown response format. Headers: {headers}")]
    UnknownFormat { headers: String },

    /// JSON decoded but did not have the expected shape.
    #[error("Unexpected payload: {0}")]
    Payload(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl NSEError {
    /// Stable machine-readable classification, used as `error_kind` in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            NSEError::Transport { .. } => "transport",
            NSEError::HttpStatus { .. } => "http_status",
            NSEError::Decompress { codec: Codec::Gzip, .. } => "decompress_gzip",
            NSEError::Decompress { codec: Codec::Brotli, .. } => "decompress_brotli",
            NSEError::Blocked { .. } => "blocked",
            NSEError::UnknownFormat { .. } => "unknown_format",
            NSEError::Payload(_) => "payload",
            NSEError::Client(_) => "client",
        }
    }

    pub fn transport(url: &str, err: impl fmt::Display) -> Self {
        NSEError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for NSEError {
    fn from(err: serde_json::Error) -> Self {
        NSEError::Payload(err.to_string())
    }
}
