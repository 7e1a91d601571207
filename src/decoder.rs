use crate::config::BLOCKED_PREVIEW_CHARS;
use crate::error::{Codec, NSEError};
use crate::models::RawResponse;
use async_compression::tokio::bufread::{BrotliDecoder, GzipDecoder};
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use serde_json::Value;
use tokio::io::AsyncReadExt;

/// Turn an upstream response into JSON.
///
/// NSE may or may not honour the declared `Accept-Encoding`, and the HTTP
/// layer may already have inflated the body, so a plain parse is tried first.
/// After that the declared `Content-Encoding` decides the codec, and an HTML
/// content type is reported as a block page.
pub async fn decode_response(raw: &RawResponse) -> Result<Value, NSEError> {
    if let Ok(value) = serde_json::from_slice::<Value>(&raw.body) {
        return Ok(value);
    }

    match declared_codec(raw) {
        Some(codec) => decode_compressed(codec, &raw.body).await,
        None => Err(classify_undecodable(raw)),
    }
}

fn declared_codec(raw: &RawResponse) -> Option<Codec> {
    let encoding = raw.header(CONTENT_ENCODING.as_str())?.trim();
    if encoding.eq_ignore_ascii_case("gzip") {
        Some(Codec::Gzip)
    } else if encoding.eq_ignore_ascii_case("br") {
        Some(Codec::Brotli)
    } else {
        None
    }
}

async fn decode_compressed(codec: Codec, body: &[u8]) -> Result<Value, NSEError> {
    let inflated = decompress(codec, body)
        .await
        .map_err(|e| NSEError::Decompress { codec, message: e.to_string() })?;

    serde_json::from_slice(&inflated).map_err(|e| NSEError::Decompress {
        codec,
        message: format!("decompressed body is not JSON: {}", e),
    })
}

pub async fn decompress(codec: Codec, body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    match codec {
        Codec::Gzip => {
            GzipDecoder::new(body).read_to_end(&mut out).await?;
        }
        Codec::Brotli => {
            BrotliDecoder::new(body).read_to_end(&mut out).await?;
        }
    }
    Ok(out)
}

fn classify_undecodable(raw: &RawResponse) -> NSEError {
    let is_html = raw
        .header(CONTENT_TYPE.as_str())
        .map(|ct| ct.to_lowercase().contains("html"))
        .unwrap_or(false);

    if is_html {
        NSEError::Blocked {
            preview: raw.body_preview(BLOCKED_PREVIEW_CHARS),
        }
    } else {
        NSEError::UnknownFormat {
            headers: format!("{:?}", raw.headers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::bufread::{BrotliEncoder, GzipEncoder};
    use reqwest::header::{HeaderMap, HeaderValue};
    use serde_json::json;

    const CHAIN: &str = r#"{"records":{"timestamp":"10-Sep-2025 15:30:00","underlyingValue":24973.1},"filtered":{"data":[]}}"#;

    fn response(headers: &[(&'static str, &'static str)], body: Vec<u8>) -> RawResponse {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        RawResponse { status: 200, headers: map, body }
    }

    async fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzipEncoder::new(bytes).read_to_end(&mut out).await.unwrap();
        out
    }

    async fn brotli(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        BrotliEncoder::new(bytes).read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_plain_json_wins_whatever_the_declared_encoding() {
        for encoding in ["gzip", "br", "identity"] {
            let raw = response(&[("content-encoding", encoding)], CHAIN.as_bytes().to_vec());
            let value = decode_response(&raw).await.unwrap();
            assert_eq!(value["records"]["underlyingValue"], json!(24973.1));
        }
    }

    #[tokio::test]
    async fn test_gzip_body_matches_plain_parse() {
        let raw = response(&[("content-encoding", "gzip")], gzip(CHAIN.as_bytes()).await);
        let expected: Value = serde_json::from_str(CHAIN).unwrap();
        assert_eq!(decode_response(&raw).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_brotli_body_matches_plain_parse() {
        let raw = response(&[("content-encoding", "br")], brotli(CHAIN.as_bytes()).await);
        let expected: Value = serde_json::from_str(CHAIN).unwrap();
        assert_eq!(decode_response(&raw).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_encoding_header_is_case_insensitive() {
        let raw = response(&[("content-encoding", " GZIP ")], gzip(CHAIN.as_bytes()).await);
        assert!(decode_response(&raw).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_gzip_is_a_gzip_failure() {
        let raw = response(
            &[("content-encoding", "gzip"), ("content-type", "text/html")],
            b"definitely not gzip".to_vec(),
        );
        let err = decode_response(&raw).await.unwrap_err();
        assert!(matches!(err, NSEError::Decompress { codec: Codec::Gzip, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_invalid_brotli_is_a_brotli_failure() {
        let raw = response(&[("content-encoding", "br")], vec![0xff; 32]);
        let err = decode_response(&raw).await.unwrap_err();
        assert_eq!(err.kind(), "decompress_brotli");
    }

    #[tokio::test]
    async fn test_gzip_wrapping_non_json_is_a_gzip_failure() {
        let raw = response(&[("content-encoding", "gzip")], gzip(b"<html></html>").await);
        let err = decode_response(&raw).await.unwrap_err();
        assert_eq!(err.kind(), "decompress_gzip");
    }

    #[tokio::test]
    async fn test_html_is_blocked_with_120_char_preview() {
        let body = format!("<html><head><title>Access Denied</title></head><body>{}</body></html>", "x".repeat(300));
        let raw = response(&[("content-type", "text/html; charset=UTF-8")], body.clone().into_bytes());

        match decode_response(&raw).await.unwrap_err() {
            NSEError::Blocked { preview } => {
                assert_eq!(preview.chars().count(), 120);
                assert_eq!(preview, body.chars().take(120).collect::<String>());
            }
            other => panic!("expected Blocked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_short_html_preview_is_whole_body() {
        let raw = response(&[("content-type", "TEXT/HTML")], b"<html>denied</html>".to_vec());
        match decode_response(&raw).await.unwrap_err() {
            NSEError::Blocked { preview } => assert_eq!(preview, "<html>denied</html>"),
            other => panic!("expected Blocked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_format_dumps_headers() {
        let raw = response(
            &[("content-type", "application/octet-stream"), ("x-cache", "MISS")],
            vec![0x00, 0x01, 0x02],
        );
        match decode_response(&raw).await.unwrap_err() {
            NSEError::UnknownFormat { headers } => {
                assert!(headers.contains("application/octet-stream"));
                assert!(headers.contains("x-cache"));
            }
            other => panic!("expected UnknownFormat, got {other:?}"),
        }
    }
}
