//! Transaction retrieval across unreliable upstreams.
//!
//! # Data Flow
//! ```text
//! orchestrator.rs
//!     → preference.rs (which tier first)
//!     → indexed.rs | rest.rs | node_rpc.rs (one tier attempt)
//!         → upstream.rs (HTTP GET under a deadline)
//!         → transaction::TransactionAssembler (normalize)
//!     → merge.rs (dedup, sort, paginate)
//! ```
//!
//! # Design Decisions
//! - Tiers are concrete types held as `Option`s; an absent URL disables a tier
//! - No caching of records; every call goes upstream
//! - No retries; fallthrough to the next tier replaces them

pub mod indexed;
pub mod merge;
pub mod node_rpc;
pub mod orchestrator;
pub mod preference;
pub mod rest;
pub mod types;
pub mod upstream;

pub use orchestrator::RetrievalOrchestrator;
pub use preference::TierPreference;
pub use types::{
    Facet, FacetBatch, PaginationWindow, RetrievalError, RetrievalResult, RetrievalTier, TierFailure,
    TransactionPage, UpstreamError,
};
pub use upstream::UpstreamClient;
