//! HTTP transport layer for posting batches to the collection endpoint

use crate::config::{Config, TransportKind};
use crate::errors::{LoggerError, Result};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper::body::Bytes;
use hyper_util::rt::TokioIo;
use reqwest::header::{CONNECTION, CONTENT_LENGTH, HOST, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// A POST request ready to be executed
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Normalized response of the endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    /// Parsed JSON, or the raw text when the body is not JSON
    pub data: Value,
}

impl TransportResponse {
    /// Build a response, parsing `body` as JSON when possible
    pub fn new(status: u16, status_text: impl Into<String>, headers: HashMap<String, String>, body: &str) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers,
            data: parse_body(body),
        }
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Parse a response body as JSON, falling back to the raw text
pub fn parse_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

/// Executes POST requests for the scheduler.
///
/// Only transport-level failures are errors; any HTTP status is a response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `request.body` to `request.url`
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// Convert request headers, rejecting names or values that are not legal on the wire
fn header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| LoggerError::Transport(format!("invalid header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| LoggerError::Transport(format!("invalid header value for {}: {}", name.as_str(), e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Build the built-in transport selected by the configuration
pub fn transport_for(config: &Config) -> Result<Arc<dyn Transport>> {
    match config.transport {
        TransportKind::Http => Ok(Arc::new(HttpTransport::new(config.http_timeout)?)),
        TransportKind::Socket => Ok(Arc::new(SocketTransport::new(config.http_timeout))),
    }
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Build the reqwest client; every send is bounded by `http_timeout`
    pub fn new(http_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(http_timeout)
            .user_agent(format!("sumo_logger/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(LoggerError::Http)?;

        Ok(Self {
            client,
            timeout: http_timeout,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let headers = header_map(&request.headers)?;

        debug!(url = %request.url, bytes = request.body.len(), "Posting batch");

        let response = timeout(
            self.timeout,
            self.client
                .post(&request.url)
                .headers(headers)
                .body(request.body)
                .send(),
        )
        .await
        .map_err(|_| LoggerError::Timeout)?
        .map_err(LoggerError::Http)?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.text().await.map_err(LoggerError::Http)?;

        Ok(TransportResponse::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            headers,
            &body,
        ))
    }
}

/// HTTP/1.1 POST over a single hyper client connection per batch.
///
/// Plain `http://` endpoints only.
#[derive(Debug, Clone)]
pub struct SocketTransport {
    timeout: Duration,
}

impl SocketTransport {
    /// Every send, connect included, is bounded by `http_timeout`
    pub fn new(http_timeout: Duration) -> Self {
        Self {
            timeout: http_timeout,
        }
    }

    async fn post(&self, request: TransportRequest) -> Result<TransportResponse> {
        let url = Url::parse(&request.url)
            .map_err(|e| LoggerError::Transport(format!("invalid endpoint {}: {}", request.url, e)))?;

        if url.scheme() != "http" {
            return Err(LoggerError::Transport(format!(
                "socket transport cannot reach {} endpoints",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| LoggerError::Transport(format!("endpoint {} has no host", request.url)))?;
        let port = url.port_or_known_default().unwrap_or(80);

        let outgoing = build_request(&url, host, request)?;

        let connect_host = host.trim_start_matches('[').trim_end_matches(']');
        let stream = TcpStream::connect((connect_host, port)).await?;
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("Socket connection closed with error: {}", e);
            }
        });

        let response = sender.send_request(outgoing).await?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.into_body().collect().await?.to_bytes();

        Ok(TransportResponse::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            headers,
            &String::from_utf8_lossy(&body),
        ))
    }
}

#[async_trait]
impl Transport for SocketTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        debug!(url = %request.url, bytes = request.body.len(), "Posting batch over socket");

        timeout(self.timeout, self.post(request))
            .await
            .map_err(|_| LoggerError::Timeout)?
    }
}

/// Origin-form POST carrying the batch, with validated headers
fn build_request(url: &Url, host: &str, request: TransportRequest) -> Result<Request<Full<Bytes>>> {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let host_header = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let mut headers = header_map(&request.headers)?;
    headers.insert(
        HOST,
        HeaderValue::from_str(&host_header)
            .map_err(|e| LoggerError::Transport(format!("invalid host {}: {}", host_header, e)))?,
    );
    headers.insert(CONNECTION, HeaderValue::from_static("close"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(request.body.len()));

    let mut outgoing = Request::post(target)
        .body(Full::new(Bytes::from(request.body)))
        .map_err(|e| LoggerError::Transport(format!("invalid request: {}", e)))?;
    *outgoing.headers_mut() = headers;

    Ok(outgoing)
}
