use crate::config::Config;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode};
use url::Url;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

/// Failure of a single status request. The poller never retries these.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {}", redact(&.0.to_string()))]
    Transport(#[from] reqwest::Error),
    #[error("http {code}: {body}")]
    Status { code: StatusCode, body: String },
    #[error("response is not valid json: {0}")]
    Decode(#[from] serde_json::Error),
}

/// HTTP client for the polled endpoint: one GET per call, JSON body out.
#[derive(Clone)]
pub struct StatusClient {
    http: Client,
}

impl StatusClient {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = cfg.token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let ua = format!("repoll/{} {}", env!("CARGO_PKG_VERSION"), std::env::consts::OS);
        headers.insert(USER_AGENT, HeaderValue::from_str(&ua)?);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self { http })
    }

    pub async fn fetch_json(&self, url: &Url) -> Result<JsonValue, FetchError> {
        debug!(%url, "GET");
        let resp = self.http.get(url.clone()).send().await?;
        let code = resp.status();
        let bytes = resp.bytes().await?;
        decode_body(code, &bytes)
    }
}

/// A JSON body is handed to the predicate whatever the status code; only an
/// undecodable body is a failure, reported as `Status` when the code was non-2xx.
pub fn decode_body(code: StatusCode, bytes: &[u8]) -> Result<JsonValue, FetchError> {
    match serde_json::from_slice(bytes) {
        Ok(v) => Ok(v),
        Err(e) if code.is_success() => Err(FetchError::Decode(e)),
        Err(_) => {
            let body = String::from_utf8_lossy(bytes).trim().to_string();
            let body = if body.is_empty() {
                code.canonical_reason().unwrap_or("error").to_string()
            } else {
                body
            };
            Err(FetchError::Status { code, body })
        }
    }
}

// Strip query strings from urls in transport errors; they may carry credentials.
// Closing brackets and colons that wrap the url are kept.
fn redact(s: &str) -> String {
    s.split(' ')
        .map(|w| match w.split_once('?') {
            Some((head, query)) if head.contains("://") => {
                let tail = query.len() - query.trim_end_matches([')', ']', '>', ':', ',']).len();
                format!("{head}?***{}", &query[query.len() - tail..])
            }
            _ => w.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
