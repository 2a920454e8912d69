//! HTTP request execution
//!
//! Sends one resolved request and returns the raw response. Redirects are
//! never followed, so tests can assert on 3xx statuses directly.

use std::time::{Duration, Instant};
use indexmap::IndexMap;
use reqwest::{Client, Method, header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE}, redirect::Policy};
use serde_json::Value as JsonValue;
use tracing::debug;

use super::compare::canonical_string;
use crate::errors::ApitestError;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How a request body is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    #[default]
    Json,
    Form,
}

impl BodyEncoding {
    /// Interpret a test set's `contentType` hint
    pub fn from_hint(hint: Option<&str>) -> Self {
        match hint.map(|h| h.trim().to_ascii_lowercase()).as_deref() {
            Some("urlencoded")
            | Some("x-www-form-urlencoded")
            | Some("application/x-www-form-urlencoded") => BodyEncoding::Form,
            _ => BodyEncoding::Json,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            BodyEncoding::Json => "application/json",
            BodyEncoding::Form => "application/x-www-form-urlencoded",
        }
    }
}

/// A request with every placeholder already expanded
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub method: String,
    pub url: String,
    pub headers: IndexMap<String, String>,
    pub body: Option<IndexMap<String, JsonValue>>,
    pub encoding: BodyEncoding,
}

/// Status, headers and body of a response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub duration: Duration,
}

impl RawResponse {
    /// The Content-Type header, if any
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends requests with a shared client
#[derive(Debug, Clone)]
pub struct Executor {
    client: Client,
    timeout: Duration,
}

impl Executor {
    /// Create an executor whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, ApitestError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| ApitestError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Perform the HTTP call and record its wall-clock duration
    pub async fn execute(&self, request: &ResolvedRequest) -> Result<RawResponse, ApitestError> {
        let method: Method = request.method.to_uppercase().parse()
            .map_err(|_| ApitestError::Transport(format!("Invalid HTTP method '{}'", request.method)))?;
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| ApitestError::Transport(format!("Invalid URL '{}': {}", request.url, e)))?;

        let mut headers = HeaderMap::new();
        for (key, value) in &request.headers {
            let name = HeaderName::try_from(key.as_str())
                .map_err(|e| ApitestError::Transport(format!("Invalid header name '{}': {}", key, e)))?;
            let val = HeaderValue::from_str(value)
                .map_err(|e| ApitestError::Transport(format!("Invalid value for header '{}': {}", key, e)))?;
            headers.insert(name, val);
        }

        // The body encoding decides the Content-Type, replacing any configured one
        if request.body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(request.encoding.content_type()));
        }

        let mut builder = self.client.request(method, url)
            .timeout(self.timeout)
            .headers(headers);

        if let Some(ref body) = request.body {
            builder = match request.encoding {
                BodyEncoding::Json => builder.body(serde_json::to_vec(body)?),
                BodyEncoding::Form => {
                    let form: Vec<(&str, String)> = body.iter()
                        .map(|(k, v)| (k.as_str(), canonical_string(v)))
                        .collect();
                    builder.form(&form)
                }
            };
        }

        debug!(method = %request.method, url = %request.url, "sending request");

        let start = Instant::now();
        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let duration = start.elapsed();

        debug!(status, bytes = body.len(), elapsed_ms = duration.as_millis() as u64, "response received");

        Ok(RawResponse {
            status,
            headers,
            body: body.to_vec(),
            duration,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> ApitestError {
        if err.is_timeout() {
            ApitestError::Timeout(self.timeout.as_secs_f64())
        } else {
            ApitestError::from(err)
        }
    }
}
