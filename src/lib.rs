//! Transaction decoding and retrieval core for a Cosmos-SDK chain explorer.
//!
//! # Architecture Overview
//!
//! ```text
//!   collaborator (UI, CLI, live feed)
//!        │
//!        ▼
//!   ┌──────────────┐   ┌───────────────────────────────────────────────┐
//!   │    proxy     │──▶│                 retrieval                     │
//!   │ axum server  │   │ orchestrator ─▶ indexed │ rest │ node_rpc     │
//!   │ /api  /rpc   │   │      │            └──── upstream (reqwest) ──┼──▶ upstreams
//!   └──────────────┘   │      ▼                                        │
//!                      │    merge (dedup, sort, paginate)              │
//!                      └──────────────────────┬────────────────────────┘
//!                                             ▼
//!                      ┌───────────────────────────────────────────────┐
//!                      │ transaction: assembler ◀── decoding pipeline  │
//!                      │   hash · envelope · wire · heuristic · events │
//!                      └───────────────────────────────────────────────┘
//!
//!   cross-cutting: config · observability · resilience · lifecycle
//! ```

// Core subsystems
pub mod config;
pub mod decoding;
pub mod lenient;
pub mod retrieval;
pub mod transaction;

// Surfaces
pub mod proxy;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ExplorerConfig;
pub use decoding::{DecodedMessage, TxHash};
pub use lifecycle::Shutdown;
pub use retrieval::{RetrievalError, RetrievalOrchestrator, TransactionPage};
pub use transaction::{TransactionAssembler, TransactionRecord};
