//! Minimal HTTP listener serving `GET /metrics`

use std::net::SocketAddr;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::errors::ApitestError;

/// Path the metrics are served on
pub const METRICS_PATH: &str = "/metrics";

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Serves the Prometheus text exposition of a recorder
pub struct MetricsServer {
    listener: TcpListener,
    handle: PrometheusHandle,
}

impl MetricsServer {
    /// Bind the listener; port 0 picks a free port
    pub async fn bind(addr: SocketAddr, handle: PrometheusHandle) -> Result<Self, ApitestError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            ApitestError::Metrics(format!("Cannot listen on {}: {}", addr, e))
        })?;
        Ok(Self { listener, handle })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ApitestError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is dropped
    pub async fn run(self) -> Result<(), ApitestError> {
        info!(addr = %self.local_addr()?, "metrics listener started");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let handle = self.handle.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &handle).await {
                            debug!(peer = %peer_addr, error = %e, "metrics connection error");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "accept error");
                }
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, handle: &PrometheusHandle) -> Result<(), ApitestError> {
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buf[..n]);
    let (status, content_type, body) = match parse_request_line(&request) {
        Some(("GET", path)) if path == METRICS_PATH => (200, PROMETHEUS_CONTENT_TYPE, handle.render()),
        Some(("GET", _)) => (404, "text/plain", "Not Found\n".to_string()),
        Some(_) => (405, "text/plain", "Method Not Allowed\n".to_string()),
        None => (400, "text/plain", "Bad Request\n".to_string()),
    };

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        status_text(status),
        content_type,
        body.len()
    );

    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body.as_bytes()).await?;
    stream.flush().await?;

    Ok(())
}

/// Method and path (query stripped) from the first request line
fn parse_request_line(request: &str) -> Option<(&str, &str)> {
    let line = request.lines().next()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    let path = target.split_once('?').map(|(p, _)| p).unwrap_or(target);
    Some((method, path))
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_parse_request_line() {
        assert_eq!(parse_request_line("GET /metrics HTTP/1.1\r\nHost: x\r\n\r\n"), Some(("GET", "/metrics")));
        assert_eq!(parse_request_line("GET /metrics?x=1 HTTP/1.1\r\n"), Some(("GET", "/metrics")));
        assert_eq!(parse_request_line(""), None);
        assert_eq!(parse_request_line("GET"), None);
    }

    #[tokio::test]
    async fn test_serves_metrics() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("apitest_requests_total", "name" => "probe").increment(3);
        });

        let server = MetricsServer::bind("127.0.0.1:0".parse().unwrap(), handle).await.unwrap();
        let addr = server.local_addr().unwrap();
        let task = tokio::spawn(server.run());

        let client = reqwest::Client::new();
        let response = client.get(format!("http://{}/metrics", addr)).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert!(response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .starts_with("text/plain"));
        let body = response.text().await.unwrap();
        assert!(body.contains(r#"apitest_requests_total{name="probe"} 3"#));

        let response = client.get(format!("http://{}/other", addr)).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 404);

        let response = client.post(format!("http://{}/metrics", addr)).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 405);

        task.abort();
    }
}
