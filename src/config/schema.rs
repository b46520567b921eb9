//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the explorer core.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the explorer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Upstream data source locations, one per retrieval tier.
    pub upstreams: UpstreamConfig,

    /// Retrieval timeouts and pagination bounds.
    pub retrieval: RetrievalConfig,

    /// Decoder settings.
    pub decoding: DecodingConfig,

    /// JSON API and node proxy listener.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Upstream endpoints. An absent URL disables that tier.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Primary indexed API base URL.
    pub indexed_api_url: Option<String>,

    /// Chain REST (LCD) base URL.
    pub chain_rest_url: Option<String>,

    /// Node RPC base URL as seen by the retrieval core (normally the
    /// same-origin proxy, e.g. "http://127.0.0.1:8080/rpc").
    pub node_rpc_url: Option<String>,

    /// Real node RPC endpoint the proxy forwards to.
    pub node_rpc_upstream: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            indexed_api_url: None,
            chain_rest_url: Some("http://localhost:1317".to_string()),
            node_rpc_url: Some("http://127.0.0.1:8080/rpc".to_string()),
            node_rpc_upstream: "http://localhost:26657".to_string(),
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Per-call timeout budget in seconds.
    pub timeout_secs: u64,

    /// Upper bound on blocks walked by the node RPC fallback.
    pub max_blocks_to_scan: u64,

    /// Page size used when the caller does not supply one.
    pub default_page_size: u32,

    /// Largest page size a caller may request.
    pub max_page_size: u32,

    /// Largest number of records fetched per facet before merging.
    pub max_facet_window: u32,

    /// Honor HTTP_PROXY / HTTPS_PROXY for upstream calls.
    pub use_system_proxy: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_blocks_to_scan: 50,
            default_page_size: 20,
            max_page_size: 100,
            max_facet_window: 500,
            use_system_proxy: false,
        }
    }
}

/// Decoder settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DecodingConfig {
    /// Bech32 human-readable prefix of the chain's account addresses.
    pub address_prefix: String,

    /// Number of decoded bytes rendered as text for address sniffing.
    pub heuristic_text_window: usize,
}

impl Default for DecodingConfig {
    fn default() -> Self {
        Self {
            address_prefix: "cosmos".to_string(),
            heuristic_text_window: 1000,
        }
    }
}

/// Listener configuration for the JSON API and node proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time allowed for one inbound request in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
