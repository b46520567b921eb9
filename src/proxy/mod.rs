//! HTTP surface: JSON API over the retrieval core plus the same-origin
//! node RPC proxy.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request ID, trace, timeout)
//!     → api.rs   /api/... → RetrievalOrchestrator
//!                /rpc/... → node.rs (forward with 0x rewrite)
//!                /health
//! ```

pub mod api;
pub mod node;
pub mod request_id;
pub mod server;

pub use node::NodeProxy;
pub use server::{AppState, ExplorerServer};
