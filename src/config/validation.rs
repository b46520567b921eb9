//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check upstream URLs parse and use an HTTP scheme
//! - Validate value ranges (timeouts > 0, page sizes consistent)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ExplorerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ExplorerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid URL '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("retrieval.default_page_size ({default}) exceeds retrieval.max_page_size ({max})")]
    PageSizeOrder { default: u32, max: u32 },

    #[error("decoding.address_prefix must not be empty")]
    EmptyAddressPrefix,

    #[error("{field}: invalid socket address '{value}'")]
    InvalidBindAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ExplorerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let upstreams = &config.upstreams;
    let optional_urls = [
        ("upstreams.indexed_api_url", &upstreams.indexed_api_url),
        ("upstreams.chain_rest_url", &upstreams.chain_rest_url),
        ("upstreams.node_rpc_url", &upstreams.node_rpc_url),
    ];
    for (field, value) in optional_urls {
        if let Some(value) = value {
            check_url(field, value, &mut errors);
        }
    }
    check_url("upstreams.node_rpc_upstream", &upstreams.node_rpc_upstream, &mut errors);

    let retrieval = &config.retrieval;
    let positive = [
        ("retrieval.timeout_secs", retrieval.timeout_secs),
        ("retrieval.max_blocks_to_scan", retrieval.max_blocks_to_scan),
        ("retrieval.default_page_size", retrieval.default_page_size as u64),
        ("retrieval.max_page_size", retrieval.max_page_size as u64),
        ("retrieval.max_facet_window", retrieval.max_facet_window as u64),
        ("server.request_timeout_secs", config.server.request_timeout_secs),
        ("decoding.heuristic_text_window", config.decoding.heuristic_text_window as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if retrieval.default_page_size > retrieval.max_page_size {
        errors.push(ValidationError::PageSizeOrder {
            default: retrieval.default_page_size,
            max: retrieval.max_page_size,
        });
    }

    if config.decoding.address_prefix.trim().is_empty() {
        errors.push(ValidationError::EmptyAddressPrefix);
    }

    let sockets = [
        ("server.bind_address", &config.server.bind_address),
        ("observability.metrics_address", &config.observability.metrics_address),
    ];
    for (field, value) in sockets {
        if value.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidBindAddress {
                field,
                value: value.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        }),
    }
}
