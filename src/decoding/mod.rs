//! Transaction decoding subsystem.
//!
//! # Data Flow
//! ```text
//! raw bytes / text
//!     → hash.rs (canonical SHA-256 hash)
//!     → pipeline.rs (TxRaw envelope unwrap)
//!     → wire.rs (Any envelope → closed MessageKind table)
//!     → heuristic.rs (ordered fallback probes)
//! execution events
//!     → events.rs (first transfer event)
//! ```
//!
//! # Design Decisions
//! - Every stage is a pure function; nothing here holds shared state
//! - Decoding never fails outward: the weakest result is an `Unknown`
//!   message labelled "Decode Error" or "Unknown Transaction"
//! - Only the first message of a transaction is decoded

pub mod error;
pub mod events;
pub mod hash;
pub mod heuristic;
pub mod message;
pub mod pipeline;
pub mod proto;
pub mod wire;

pub use error::{DecodeFailure, DecodeStage};
pub use events::{extract_transfer, EventAttribute, TransferSummary, TxEvent};
pub use hash::{compute_hash, TxHash};
pub use heuristic::{HeuristicDecoder, HeuristicOutcome, ProbeKind};
pub use message::{DecodedMessage, MessageKind};
pub use pipeline::{DecodeOutcome, DecodePath, Encoding, EnvelopeInfo, MessageDecoder, RawTransaction};
pub use wire::WireDecoder;
