//! Transaction records and their assembly.
//!
//! # Responsibilities
//! - Normalize whatever an upstream returns into one [`TransactionRecord`]
//! - Resolve hash, status, fee and summary fields by fixed precedence
//! - Adapt live-feed Tx events through the same assembler

pub mod assembler;
pub mod live;
pub mod record;

pub use assembler::{AssemblyError, AssemblyInput, ExecutionResult, MessageSource, Placeholders, TransactionAssembler};
pub use live::record_from_event;
pub use record::{TransactionRecord, TxStatus};
