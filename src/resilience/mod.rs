//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream call:
//!     → timeouts.rs (per-call deadline)
//!     → on timeout: caller-supplied error, tier falls through
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - No retries: a failed or slow tier is abandoned for the next one
//! - Facet calls each get their own deadline so one stall cannot hold the others

pub mod timeouts;

pub use timeouts::Deadline;
