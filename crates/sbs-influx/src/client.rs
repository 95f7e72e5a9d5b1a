// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP writer for the InfluxDB line protocol endpoint.

use crate::config::InfluxConfig;
use crate::error::InfluxError;
use std::time::Duration;

/// Default request timeout for write calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Async InfluxDB write client.
///
/// Posts newline-joined line protocol to `{url}/api/v2/write` with
/// `Authorization: Token <token>`, nanosecond precision and the configured
/// database as bucket.
#[derive(Debug, Clone)]
pub struct InfluxClient {
    client: reqwest::Client,
    write_url: String,
    token: String,
    database: String,
}

impl InfluxClient {
    /// Build a client with the default request timeout.
    pub fn new(config: &InfluxConfig) -> Result<Self, InfluxError> {
        Self::with_timeout(config, DEFAULT_HTTP_TIMEOUT)
    }

    /// Build a client with an explicit request timeout.
    pub fn with_timeout(config: &InfluxConfig, timeout: Duration) -> Result<Self, InfluxError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(InfluxError::Client)?;

        Ok(Self {
            client,
            write_url: config.write_url(),
            token: config.token.clone(),
            database: config.database.clone(),
        })
    }

    /// Target database.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Write endpoint URL.
    pub fn write_url(&self) -> &str {
        &self.write_url
    }

    /// Send already-encoded lines in a single request.
    ///
    /// An empty slice is a no-op. Any non-2xx answer is returned as
    /// [`InfluxError::Status`] with the response body.
    pub async fn write_lines(&self, lines: &[String]) -> Result<(), InfluxError> {
        if lines.is_empty() {
            return Ok(());
        }

        let body = lines.join("\n");
        let response = self
            .client
            .post(&self.write_url)
            .query(&[("bucket", self.database.as_str()), ("precision", "ns")])
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InfluxError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("wrote {} lines to {}", lines.len(), self.database);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Accept one HTTP request, capture it, answer with `response`.
    async fn fake_server(response: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if request_complete(&buf) {
                    break;
                }
            }
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });

        (format!("http://{}", addr), rx)
    }

    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        buf.len() >= header_end + 4 + content_length
    }

    #[tokio::test]
    async fn test_write_lines_posts_line_protocol() {
        let (url, captured) =
            fake_server("HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
        let client = InfluxClient::new(&InfluxConfig::new(url, "secret", "adsb")).unwrap();

        let lines = vec!["m a=1i 1".to_string(), "m a=2i 2".to_string()];
        client.write_lines(&lines).await.unwrap();

        let request = captured.await.unwrap();
        assert!(request.starts_with("POST /api/v2/write?"));
        assert!(request.contains("bucket=adsb"));
        assert!(request.contains("precision=ns"));
        assert!(request
            .to_ascii_lowercase()
            .contains("authorization: token secret"));
        assert!(request.ends_with("m a=1i 1\nm a=2i 2"));
    }

    #[tokio::test]
    async fn test_write_lines_reports_rejection() {
        let (url, _captured) = fake_server(
            "HTTP/1.1 401 Unauthorized\r\nContent-Length: 12\r\nConnection: close\r\n\r\nbad token!!!",
        )
        .await;
        let client = InfluxClient::new(&InfluxConfig::new(url, "wrong", "adsb")).unwrap();

        let err = client
            .write_lines(&["m a=1i 1".to_string()])
            .await
            .unwrap_err();
        match err {
            InfluxError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad token!!!");
            }
            other => panic!("expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_empty_is_noop() {
        let client =
            InfluxClient::new(&InfluxConfig::new("http://127.0.0.1:1", "t", "adsb")).unwrap();
        client.write_lines(&[]).await.unwrap();
    }

    #[test]
    fn test_new_rejects_incomplete_config() {
        let err = InfluxClient::new(&InfluxConfig::new("http://x", "", "adsb")).unwrap_err();
        assert!(matches!(err, InfluxError::Config(_)));
    }
}
