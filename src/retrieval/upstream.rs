//! HTTP client shared by the three tier sources.
//!
//! # Responsibilities
//! - Issue GET requests under a per-call [`Deadline`]
//! - Map transport, status and body failures onto [`UpstreamError`]
//! - Record per-tier request metrics

use std::time::Instant;

use serde::de::DeserializeOwned;
use url::Url;

use crate::config::RetrievalConfig;
use crate::observability::metrics;
use crate::resilience::Deadline;
use crate::retrieval::types::{RetrievalTier, UpstreamError};

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    deadline: Deadline,
}

impl UpstreamClient {
    pub fn new(config: &RetrievalConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder().user_agent(concat!("tx-explorer/", env!("CARGO_PKG_VERSION")));
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        Ok(Self {
            http: builder.build()?,
            deadline: Deadline::from_secs(config.timeout_secs),
        })
    }

    /// GET `url` and decode a JSON body. Non-2xx answers are `Status` errors.
    pub async fn get_json<T: DeserializeOwned>(&self, tier: RetrievalTier, url: Url) -> Result<T, UpstreamError> {
        let endpoint = url.to_string();
        let (status, body) = self.get_text(tier, url).await?;
        if !(200..300).contains(&status) {
            return Err(UpstreamError::Status { endpoint, status });
        }
        serde_json::from_str(&body).map_err(|e| UpstreamError::Parse {
            endpoint,
            message: e.to_string(),
        })
    }

    /// GET `url` and return status and body for any HTTP answer.
    pub async fn get_text(&self, tier: RetrievalTier, url: Url) -> Result<(u16, String), UpstreamError> {
        let endpoint = url.to_string();
        let started = Instant::now();
        let result = self
            .deadline
            .run(
                async {
                    let response = self.http.get(url).send().await.map_err(|e| UpstreamError::Transport {
                        endpoint: endpoint.clone(),
                        message: e.to_string(),
                    })?;
                    let status = response.status().as_u16();
                    let body = response.text().await.map_err(|e| UpstreamError::Transport {
                        endpoint: endpoint.clone(),
                        message: e.to_string(),
                    })?;
                    Ok((status, body))
                },
                |budget| UpstreamError::Timeout {
                    endpoint: endpoint.clone(),
                    budget,
                },
            )
            .await;

        let outcome = match &result {
            Ok((status, _)) if (200..300).contains(status) => "success",
            Ok(_) => "status",
            Err(e) => e.outcome(),
        };
        metrics::record_upstream(tier.as_str(), outcome, started);
        if let Err(e) = &result {
            tracing::debug!(tier = %tier, error = %e, "Upstream call failed");
        }
        result
    }

    /// GET `url` and return the HTTP status without reading the body.
    pub async fn probe(&self, tier: RetrievalTier, url: Url) -> Result<u16, UpstreamError> {
        let endpoint = url.to_string();
        let started = Instant::now();
        let result = self
            .deadline
            .run(
                async {
                    self.http
                        .get(url)
                        .send()
                        .await
                        .map(|response| response.status().as_u16())
                        .map_err(|e| UpstreamError::Transport {
                            endpoint: endpoint.clone(),
                            message: e.to_string(),
                        })
                },
                |budget| UpstreamError::Timeout {
                    endpoint: endpoint.clone(),
                    budget,
                },
            )
            .await;
        let outcome = match &result {
            Ok(status) if *status < 500 => "reachable",
            Ok(_) => "status",
            Err(e) => e.outcome(),
        };
        metrics::record_upstream(tier.as_str(), outcome, started);
        result
    }
}

/// Parse a configured base URL, rejecting URLs that cannot carry a path.
pub fn parse_base(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid upstream URL '{}': {}", raw, e))?;
    if url.cannot_be_a_base() {
        return Err(format!("upstream URL '{}' cannot carry a path", raw));
    }
    Ok(url)
}

/// `base` with `segments` appended to its path.
pub fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
