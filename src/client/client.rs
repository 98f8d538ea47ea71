//! # Client Core
//!
//! The raw HTTP transport: build a request against the configured API, send it,
//! hand back the status and parsed JSON body.
//!
//! ## Responsibility
//!
//! [`ClientCore`] knows how to talk HTTP and nothing about sessions:
//! - Join endpoint paths onto the base URL
//! - Send `Accept: application/json` and the configured `Origin` on every request
//! - Keep a cookie store so server-set cookies are passed back (credential passthrough)
//! - Attach a bearer token when one is handed in
//! - Encode JSON or form bodies
//!
//! Status interpretation, the token lifecycle and unauthorized handling belong
//! to the [`ClientMiddleware`](super::middleware::ClientMiddleware).

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::common::config::ApiConfig;
use crate::common::messages::error_detail;
use crate::error::ApiError;

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Json(Value),
    /// `application/x-www-form-urlencoded` pairs
    Form(Vec<(String, String)>),
}

/// Status and parsed body of an HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: StatusCode,
    /// `None` for an empty body, or a non-JSON body on an error status
    pub body: Option<Value>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The server's `detail` message, if the body carries one.
    pub fn detail(&self) -> Option<String> {
        error_detail(self.body.as_ref())
    }
}

/// HTTP transport for the dating API.
pub struct ClientCore {
    http: reqwest::Client,
    base_url: String,
}

impl ClientCore {
    /// Creates a transport for the API described by `config`.
    ///
    /// # Errors
    /// `Url` for an unparsable base URL, `Config` for an unusable origin header,
    /// `Transport` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        Url::parse(&config.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let origin = HeaderValue::from_str(&config.origin)
            .map_err(|e| ApiError::Config(format!("origin {:?}: {}", config.origin, e)))?;
        headers.insert(ORIGIN, origin);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an endpoint path such as `/profiles/me`.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, ApiError> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        Ok(Url::parse(&url)?)
    }

    /// Sends one request and reads the whole response.
    ///
    /// # Errors
    /// - `Transport` when the request cannot be sent or the body cannot be read
    /// - `InvalidResponse` when a 2xx body is not JSON
    pub async fn send(
        &self,
        method: Method,
        endpoint: &str,
        token: Option<&str>,
        payload: Payload,
    ) -> Result<RawResponse, ApiError> {
        let url = self.endpoint_url(endpoint)?;
        debug!("→ {} {}", method, url);

        let mut request = self.http.request(method.clone(), url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request = match payload {
            Payload::Empty => request,
            Payload::Json(body) => request.json(&body),
            Payload::Form(pairs) => request.form(&pairs),
        };

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        debug!("← {} {} ({} bytes)", status.as_u16(), endpoint, bytes.len());

        let body = if bytes.is_empty() {
            None
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => Some(value),
                Err(e) if status.is_success() => {
                    return Err(ApiError::InvalidResponse(format!(
                        "{} {} returned a non-JSON body: {}",
                        method, endpoint, e
                    )))
                }
                Err(_) => None,
            }
        };

        Ok(RawResponse { status, body })
    }
}
