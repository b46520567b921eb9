//! The normalized transaction record every retrieval tier produces.

use serde::{Deserialize, Serialize};

use crate::decoding::{DecodedMessage, TxHash};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Failed,
}

impl TxStatus {
    pub fn from_code(code: u64) -> Self {
        if code == 0 {
            TxStatus::Success
        } else {
            TxStatus::Failed
        }
    }

    /// Parse an explicit status string reported by an indexer.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "success" | "successful" | "succeeded" | "ok" => Some(TxStatus::Success),
            "failed" | "failure" | "fail" | "error" => Some(TxStatus::Failed),
            _ => None,
        }
    }
}

/// One transaction, normalized across upstream shapes.
///
/// Built once by the assembler and never mutated afterwards. Summary
/// fields are empty strings when nothing could be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub hash: TxHash,
    pub height: u64,
    /// Block time as reported upstream (RFC 3339), empty if unknown.
    pub time: String,
    pub status: TxStatus,
    pub gas_used: u64,
    pub gas_wanted: u64,
    pub fee: String,
    pub messages: Vec<DecodedMessage>,
    pub sender_summary: String,
    pub recipient_summary: String,
    pub amount_summary: String,
    pub memo: String,
    pub raw_encoded: String,
}

impl TransactionRecord {
    pub fn primary_message(&self) -> Option<&DecodedMessage> {
        self.messages.first()
    }

    /// Label of the first message, or "Unknown" for an empty record.
    pub fn label(&self) -> &str {
        self.primary_message()
            .map(DecodedMessage::label)
            .unwrap_or("Unknown")
    }

    pub fn is_sent_by(&self, address: &str) -> bool {
        !address.is_empty() && self.sender_summary == address
    }

    pub fn is_received_by(&self, address: &str) -> bool {
        !address.is_empty() && self.recipient_summary == address
    }
}
