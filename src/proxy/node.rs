//! Same-origin node RPC proxy.
//!
//! # Responsibilities
//! - Forward `GET /rpc/{endpoint}` to the real node RPC
//! - Normalize the `hash` parameter to exactly one `0x` prefix
//! - Map upstream timeouts to 504 and transport failures to 502
//!
//! Only the endpoints the retrieval core needs are forwarded.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use url::{form_urlencoded, Url};

use crate::resilience::Deadline;

/// Node RPC endpoints reachable through the proxy.
pub const ALLOWED_ENDPOINTS: [&str; 4] = ["status", "block", "blockchain", "tx"];

#[derive(Debug)]
pub enum ForwardError {
    NotAllowed(String),
    BadTarget(String),
    Timeout(Duration),
    Upstream(String),
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        match self {
            ForwardError::NotAllowed(path) => {
                (StatusCode::NOT_FOUND, format!("endpoint '{}' is not proxied", path)).into_response()
            }
            ForwardError::BadTarget(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            ForwardError::Timeout(budget) => (
                StatusCode::GATEWAY_TIMEOUT,
                format!("node did not answer within {}s", budget.as_secs()),
            )
                .into_response(),
            ForwardError::Upstream(reason) => {
                (StatusCode::BAD_GATEWAY, format!("node request failed: {}", reason)).into_response()
            }
        }
    }
}

/// Rewrite a query string so `hash` carries exactly one `0x` prefix.
/// Other parameters pass through unchanged.
pub fn normalize_hash_query(query: &str) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if key == "hash" {
            let mut bare = value.trim();
            while let Some(rest) = bare.strip_prefix("0x").or_else(|| bare.strip_prefix("0X")) {
                bare = rest;
            }
            serializer.append_pair(&key, &format!("0x{}", bare));
        } else {
            serializer.append_pair(&key, &value);
        }
    }
    serializer.finish()
}

#[derive(Clone)]
pub struct NodeProxy {
    client: Client<HttpConnector, Body>,
    upstream: Url,
    deadline: Deadline,
}

impl NodeProxy {
    pub fn new(upstream: Url, deadline: Deadline) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            upstream,
            deadline,
        }
    }

    /// Upstream URL for `path` and the inbound query.
    pub fn target(&self, path: &str, query: Option<&str>) -> Result<Url, ForwardError> {
        let endpoint = path.trim_matches('/');
        if !ALLOWED_ENDPOINTS.contains(&endpoint) {
            return Err(ForwardError::NotAllowed(endpoint.to_string()));
        }
        let mut url = self.upstream.clone();
        url.path_segments_mut()
            .map_err(|_| ForwardError::BadTarget("node upstream cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(endpoint);
        match query.filter(|q| !q.is_empty()) {
            Some(query) if endpoint == "tx" => url.set_query(Some(&normalize_hash_query(query))),
            Some(query) => url.set_query(Some(query)),
            None => url.set_query(None),
        }
        Ok(url)
    }

    pub async fn forward(&self, path: &str, query: Option<&str>, request_id: &str) -> Result<Response, ForwardError> {
        let target = self.target(path, query)?;
        let request = Request::builder()
            .method(Method::GET)
            .uri(target.as_str())
            .header(header::ACCEPT, "application/json")
            .header("x-request-id", request_id)
            .body(Body::empty())
            .map_err(|e| ForwardError::BadTarget(e.to_string()))?;

        tracing::debug!(request_id, target = %target, "Forwarding node RPC request");
        let response: hyper::Response<hyper::body::Incoming> = self
            .deadline
            .run(
                async {
                    self.client
                        .request(request)
                        .await
                        .map_err(|e| ForwardError::Upstream(e.to_string()))
                },
                ForwardError::Timeout,
            )
            .await?;
        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
