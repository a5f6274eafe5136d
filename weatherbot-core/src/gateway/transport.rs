use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use std::fmt::Debug;

/// Single-shot HTTP GET used by the weather gateway.
///
/// Implementations return the body of a successful (2xx) response and an error
/// for everything else.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn get(&self, url: &str) -> Result<String>;
}

/// `reqwest`-backed transport with the client's default (unbounded) timeout.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String> {
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("Failed to send request to weather provider")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read weather provider response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Weather provider request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        Ok(body)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_bodies_are_kept() {
        assert_eq!(truncate_body("city not found"), "city not found");
    }

    #[test]
    fn long_bodies_are_cut_on_char_boundary() {
        let body = "ж".repeat(300);
        let cut = truncate_body(&body);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let err = HttpTransport::new().get("http://127.0.0.1:1/").await.unwrap_err();
        assert!(err.to_string().contains("Failed to send request"));
    }
}
