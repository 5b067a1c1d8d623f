//! HTTP client for the upstream surveillance feeds.
//!
//! Each request is made once; failures are reported to the caller, who
//! decides whether to try again later.

use crate::{
    jurisdiction::{parse_jurisdiction_payload, RawJurisdictionRecord},
    nextstrain::{parse_nextstrain_payload, NextstrainData},
    wastewater::{parse_wastewater_payload, RawWastewaterRecord},
};
use log::{info, warn};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// CDC respiratory hospitalization feed (RESP-NET, dataset `mpgq-jmmr`).
pub const HOSPITAL_URL: &str = "https://data.cdc.gov/resource/mpgq-jmmr.json";

/// NWSS wastewater viral concentration feed (dataset `ymmh-divb`).
pub const WASTEWATER_URL: &str = "https://data.cdc.gov/resource/ymmh-divb.json";

/// Nextstrain global SARS-CoV-2 build.
pub const NEXTSTRAIN_URL: &str = "https://data.nextstrain.org/ncov_global.json";

/// PCR target code for influenza A in the wastewater feed.
pub const INFLUENZA_A_TARGET: &str = "fluav";

const REQUEST_TIMEOUT_SECS: u64 = 60;

const USER_AGENT: &str = concat!("flu-cli/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur when fetching a feed.
#[derive(Error, Debug)]
pub enum FeedError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Bad response status from {url}: {status}")]
    BadStatus { url: String, status: StatusCode },

    /// Upstream answered with an empty body
    #[error("Empty response from {0}")]
    EmptyResponse(String),

    /// Body was not the expected JSON
    #[error("Failed to parse response from {url}: {message}")]
    ResponseParse { url: String, message: String },
}

/// Type alias for Results using FeedError
pub type Result<T> = std::result::Result<T, FeedError>;

/// Feed URLs a client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub hospital: String,
    pub wastewater: String,
    pub nextstrain: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            hospital: HOSPITAL_URL.to_string(),
            wastewater: WASTEWATER_URL.to_string(),
            nextstrain: NEXTSTRAIN_URL.to_string(),
        }
    }
}

/// Thin wrapper over a `reqwest::Client` that knows the feed endpoints.
#[derive(Clone)]
pub struct FeedClient {
    client: Client,
    endpoints: Endpoints,
}

impl FeedClient {
    /// Client with a 60 s timeout and a `flu-cli` user agent.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            endpoints: Endpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    async fn fetch_text(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        info!("Fetching {} {:?}", url, query);
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Bad response status from {}: {}", url, status);
            return Err(FeedError::BadStatus {
                url: url.to_string(),
                status,
            });
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            warn!("Empty response from {}", url);
            return Err(FeedError::EmptyResponse(url.to_string()));
        }
        Ok(body)
    }

    /// Latest hospital records, newest week first, optionally for one jurisdiction.
    pub async fn fetch_hospital_text(
        &self,
        limit: u32,
        jurisdiction: Option<&str>,
    ) -> Result<String> {
        let mut query = vec![
            ("$limit", limit.to_string()),
            ("$order", "weekendingdate DESC".to_string()),
        ];
        if let Some(jurisdiction) = jurisdiction {
            query.push(("jurisdiction", jurisdiction.to_uppercase()));
        }
        self.fetch_text(&self.endpoints.hospital, &query).await
    }

    pub async fn fetch_hospital(
        &self,
        limit: u32,
        jurisdiction: Option<&str>,
    ) -> Result<Vec<RawJurisdictionRecord>> {
        let body = self.fetch_hospital_text(limit, jurisdiction).await?;
        parse_jurisdiction_payload(&body).map_err(|e| FeedError::ResponseParse {
            url: self.endpoints.hospital.clone(),
            message: e.to_string(),
        })
    }

    /// Latest influenza A wastewater samples, newest first, optionally for one state.
    pub async fn fetch_wastewater_text(&self, limit: u32, state: Option<&str>) -> Result<String> {
        let mut query = vec![
            ("$limit", limit.to_string()),
            ("$order", "sample_collect_date DESC".to_string()),
            ("pcr_target", INFLUENZA_A_TARGET.to_string()),
        ];
        if let Some(state) = state {
            query.push(("wwtp_jurisdiction", state.to_lowercase()));
        }
        self.fetch_text(&self.endpoints.wastewater, &query).await
    }

    pub async fn fetch_wastewater(
        &self,
        limit: u32,
        state: Option<&str>,
    ) -> Result<Vec<RawWastewaterRecord>> {
        let body = self.fetch_wastewater_text(limit, state).await?;
        parse_wastewater_payload(&body).map_err(|e| FeedError::ResponseParse {
            url: self.endpoints.wastewater.clone(),
            message: e.to_string(),
        })
    }

    pub async fn fetch_nextstrain_text(&self) -> Result<String> {
        self.fetch_text(&self.endpoints.nextstrain, &[]).await
    }

    pub async fn fetch_nextstrain(&self) -> Result<NextstrainData> {
        let body = self.fetch_nextstrain_text().await?;
        parse_nextstrain_payload(&body).map_err(|e| FeedError::ResponseParse {
            url: self.endpoints.nextstrain.clone(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    /// Serve `body` with `status` to a single request on a local port.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}/feed.json", addr)
    }

    fn local_client(url: &str) -> FeedClient {
        FeedClient::new().unwrap().with_endpoints(Endpoints {
            hospital: url.to_string(),
            wastewater: url.to_string(),
            nextstrain: url.to_string(),
        })
    }

    #[test]
    fn test_error_messages() {
        let err = FeedError::EmptyResponse(WASTEWATER_URL.to_string());
        assert_eq!(
            err.to_string(),
            "Empty response from https://data.cdc.gov/resource/ymmh-divb.json"
        );
        let err = FeedError::BadStatus {
            url: HOSPITAL_URL.to_string(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_client_builds() {
        let client = FeedClient::new().unwrap();
        assert_eq!(client.endpoints, Endpoints::default());
    }

    #[tokio::test]
    async fn test_empty_array_is_a_valid_reply() {
        let url = serve_once("200 OK", "[]").await;
        let records = local_client(&url).fetch_wastewater(10, Some("XX")).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_blank_body_is_empty_response() {
        let url = serve_once("200 OK", "  \n").await;
        let err = local_client(&url).fetch_nextstrain_text().await.unwrap_err();
        assert!(matches!(err, FeedError::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn test_fetch_hospital_decodes_rows() {
        let url = serve_once(
            "200 OK",
            r#"[{"jurisdiction": "USA", "weekendingdate": "2024-01-06T00:00:00.000", "totalconfflunewadm": "1200"}]"#,
        )
        .await;
        let records = local_client(&url).fetch_hospital(1, Some("usa")).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_status() {
        let url = serve_once("503 Service Unavailable", "").await;
        let err = local_client(&url).fetch_hospital(1, None).await.unwrap_err();
        assert!(matches!(
            err,
            FeedError::BadStatus { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
        ));
    }

    #[tokio::test]
    async fn test_fetch_nextstrain_rejects_html() {
        let url = serve_once("200 OK", "<html>maintenance</html>").await;
        let err = local_client(&url).fetch_nextstrain().await.unwrap_err();
        assert!(matches!(err, FeedError::ResponseParse { .. }));
    }
}
