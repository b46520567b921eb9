//! Retrieval tiers, facets, pages and error definitions.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transaction::TransactionRecord;

/// Upstream data source, in standard fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalTier {
    PrimaryIndexedApi,
    ChainRestApi,
    NodeRpcProxy,
}

impl RetrievalTier {
    pub const ALL: [RetrievalTier; 3] = [
        RetrievalTier::PrimaryIndexedApi,
        RetrievalTier::ChainRestApi,
        RetrievalTier::NodeRpcProxy,
    ];

    /// 1-based position in the standard order.
    pub fn rank(self) -> u8 {
        match self {
            RetrievalTier::PrimaryIndexedApi => 1,
            RetrievalTier::ChainRestApi => 2,
            RetrievalTier::NodeRpcProxy => 3,
        }
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| tier.rank() == rank)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RetrievalTier::PrimaryIndexedApi => "indexed_api",
            RetrievalTier::ChainRestApi => "chain_rest",
            RetrievalTier::NodeRpcProxy => "node_rpc",
        }
    }
}

impl fmt::Display for RetrievalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three address queries whose results are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    /// Address is the transfer sender.
    Sent,
    /// Address is the transfer recipient.
    Received,
    /// Address signed a message.
    Message,
}

impl Facet {
    pub const ALL: [Facet; 3] = [Facet::Sent, Facet::Received, Facet::Message];

    /// Event attribute the chain indexes this facet under.
    pub fn event_key(self) -> &'static str {
        match self {
            Facet::Sent => "transfer.sender",
            Facet::Received => "transfer.recipient",
            Facet::Message => "message.sender",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Facet::Sent => "sent",
            Facet::Received => "received",
            Facet::Message => "message",
        }
    }
}

/// Records returned by one facet query, with its own total if reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetBatch {
    pub facet: Facet,
    pub records: Vec<TransactionRecord>,
    pub total: Option<u64>,
}

impl FacetBatch {
    pub fn new(facet: Facet, records: Vec<TransactionRecord>, total: Option<u64>) -> Self {
        Self { facet, records, total }
    }

    /// Reported total, or the number of records when none was reported.
    pub fn total_or_len(&self) -> u64 {
        self.total.unwrap_or(self.records.len() as u64)
    }
}

/// Pagination metadata for one returned page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationWindow {
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
    /// Best-effort estimate of the number of matching transactions.
    #[serde(rename = "total")]
    pub total_estimate: u64,
    pub pages: u64,
    pub has_more: bool,
}

impl PaginationWindow {
    pub fn new(page: u32, page_size: u32, total_estimate: u64) -> Self {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let pages = total_estimate.div_ceil(page_size as u64).max(1);
        Self {
            page,
            page_size,
            total_estimate,
            pages,
            has_more: (page as u64) < pages,
        }
    }
}

/// One page of an address history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPage {
    pub records: Vec<TransactionRecord>,
    pub pagination: PaginationWindow,
}

impl TransactionPage {
    /// The page returned when no tier could answer.
    pub fn empty(page: u32, page_size: u32) -> Self {
        Self {
            records: Vec::new(),
            pagination: PaginationWindow::new(page, page_size, 0),
        }
    }
}

/// Errors from a single upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("{endpoint}: timed out after {}s", budget.as_secs_f64())]
    Timeout { endpoint: String, budget: Duration },

    #[error("{endpoint}: HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("{endpoint}: transport error: {message}")]
    Transport { endpoint: String, message: String },

    #[error("{endpoint}: unexpected response: {message}")]
    Parse { endpoint: String, message: String },

    /// A successful answer that does not contain the requested object.
    #[error("{endpoint}: not found")]
    NotFound { endpoint: String },
}

impl UpstreamError {
    pub fn endpoint(&self) -> &str {
        match self {
            UpstreamError::Timeout { endpoint, .. }
            | UpstreamError::Status { endpoint, .. }
            | UpstreamError::Transport { endpoint, .. }
            | UpstreamError::Parse { endpoint, .. }
            | UpstreamError::NotFound { endpoint } => endpoint,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            UpstreamError::NotFound { .. } | UpstreamError::Status { status: 404, .. }
        )
    }

    /// Timeouts and transport failures mean the tier is down, not merely
    /// unhelpful for this request.
    pub fn demotes_tier(&self) -> bool {
        matches!(self, UpstreamError::Timeout { .. } | UpstreamError::Transport { .. })
    }

    /// Metric label for this failure.
    pub fn outcome(&self) -> &'static str {
        match self {
            UpstreamError::Timeout { .. } => "timeout",
            UpstreamError::Status { .. } => "status",
            UpstreamError::Transport { .. } => "transport",
            UpstreamError::Parse { .. } => "parse",
            UpstreamError::NotFound { .. } => "not_found",
        }
    }
}

/// One tier's failure within a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierFailure {
    pub tier: RetrievalTier,
    pub error: UpstreamError,
}

impl fmt::Display for TierFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tier, self.error)
    }
}

fn describe_attempts(attempts: &[TierFailure]) -> String {
    if attempts.is_empty() {
        return "no retrieval tier configured".to_string();
    }
    attempts
        .iter()
        .map(TierFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors surfaced by the orchestrator.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("invalid transaction hash '{0}'")]
    InvalidHash(String),

    /// Every tier answered and none had the transaction.
    #[error("transaction {hash} not found")]
    NotFound { hash: String },

    /// At least one tier failed for a reason other than "not found".
    #[error("transaction {hash} unreachable: {}", describe_attempts(attempts))]
    Unreachable { hash: String, attempts: Vec<TierFailure> },

    #[error("retrieval setup failed: {0}")]
    Setup(String),
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;
