//! Transaction assembly: merge decoded message, execution result and
//! upstream metadata into one [`TransactionRecord`].
//!
//! # Resolution Rules
//! - hash: supplied hash if well-formed, else SHA-256 of the decoded bytes;
//!   with neither, assembly fails instead of hashing nothing
//! - status: explicit label, then execution code, then legacy code, then success
//! - fee: supplied fee, then envelope fee, then "<gas_used> gas", then "Unknown"
//! - sender / recipient / amount: message field, then first transfer event,
//!   then caller placeholder, then empty

use serde::Deserialize;
use serde_json::Value;

use crate::config::DecodingConfig;
use crate::decoding::heuristic::{decode_json_message, UNKNOWN_TRANSACTION_LABEL};
use crate::decoding::{extract_transfer, DecodedMessage, MessageDecoder, RawTransaction, TxEvent, TxHash};
use crate::lenient;
use crate::transaction::record::{TransactionRecord, TxStatus};

/// Placeholder for a fee nobody reported.
pub const UNKNOWN_FEE: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssemblyError {
    /// No usable hash was supplied and there are no bytes to hash.
    #[error("transaction has no hash and no bytes to derive one from")]
    MissingHash,
}

/// Where the transaction's message comes from.
#[derive(Debug, Clone, Default)]
pub enum MessageSource {
    /// Encoded transaction bytes.
    Encoded(RawTransaction),
    /// Transaction already rendered as JSON by the upstream.
    Json(Value),
    #[default]
    Missing,
}

/// Execution result as reported by the node (`tx_result`) or REST.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExecutionResult {
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub code: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub gas_used: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub gas_wanted: Option<u64>,
    #[serde(default)]
    pub log: Option<String>,
    #[serde(default)]
    pub events: Vec<TxEvent>,
}

/// Caller-supplied fallbacks for the summary fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub amount: Option<String>,
}

/// Everything an upstream knows about one transaction.
#[derive(Debug, Clone, Default)]
pub struct AssemblyInput {
    pub source: MessageSource,
    pub hash: Option<String>,
    pub height: Option<u64>,
    pub time: Option<String>,
    pub execution: ExecutionResult,
    pub status: Option<String>,
    pub legacy_code: Option<u64>,
    pub fee: Option<String>,
    pub memo: Option<String>,
    pub placeholders: Placeholders,
}

impl AssemblyInput {
    pub fn new(source: MessageSource) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }
}

/// Assembles records. Cheap to clone; holds only decoder settings.
#[derive(Debug, Clone)]
pub struct TransactionAssembler {
    decoder: MessageDecoder,
}

impl TransactionAssembler {
    pub fn new(decoder: MessageDecoder) -> Self {
        Self { decoder }
    }

    pub fn from_config(config: &DecodingConfig) -> Self {
        Self::new(MessageDecoder::from_config(config))
    }

    pub fn assemble(&self, input: AssemblyInput) -> Result<TransactionRecord, AssemblyError> {
        let decoded = self.decode_source(&input.source);

        let hash = resolve_hash(input.hash.as_deref(), &decoded.hash_bytes).ok_or(AssemblyError::MissingHash)?;
        let execution = &input.execution;
        let status = resolve_status(input.status.as_deref(), execution.code, input.legacy_code);
        let fee = resolve_fee(
            [input.fee.as_deref(), decoded.fee.as_deref()],
            execution.gas_used,
        );

        let transfer = extract_transfer(&execution.events);
        let placeholders = &input.placeholders;
        let sender_summary = first_non_empty([
            decoded.message.sender(),
            transfer.sender.as_deref(),
            placeholders.sender.as_deref(),
        ]);
        let recipient_summary = first_non_empty([
            decoded.message.recipient(),
            transfer.recipient.as_deref(),
            placeholders.recipient.as_deref(),
        ]);
        let message_amount = decoded.message.amount_summary();
        let amount_summary = first_non_empty([
            message_amount.as_deref(),
            transfer.amount.as_deref(),
            placeholders.amount.as_deref(),
        ]);
        let memo = first_non_empty([input.memo.as_deref(), decoded.memo.as_deref()]);

        Ok(TransactionRecord {
            hash,
            height: input.height.or(decoded.height).unwrap_or(0),
            time: input.time.or(decoded.time).unwrap_or_default(),
            status,
            gas_used: execution.gas_used.unwrap_or(0),
            gas_wanted: execution.gas_wanted.or(decoded.gas_limit).unwrap_or(0),
            fee,
            messages: vec![decoded.message],
            sender_summary,
            recipient_summary,
            amount_summary,
            memo,
            raw_encoded: decoded.raw_encoded,
        })
    }

    /// Assemble a list page, dropping entries that cannot be identified.
    pub fn assemble_all(&self, inputs: impl IntoIterator<Item = AssemblyInput>) -> Vec<TransactionRecord> {
        inputs
            .into_iter()
            .filter_map(|input| {
                let height = input.height;
                match self.assemble(input) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(height, error = %e, "Skipping unidentifiable transaction");
                        None
                    }
                }
            })
            .collect()
    }

    fn decode_source(&self, source: &MessageSource) -> DecodedSource {
        match source {
            MessageSource::Encoded(raw) => {
                let outcome = self.decoder.decode_raw(raw);
                let envelope = outcome.envelope.clone().unwrap_or_default();
                DecodedSource {
                    hash_bytes: outcome.hash_input().to_vec(),
                    raw_encoded: outcome.raw_data,
                    message: outcome.message,
                    fee: envelope.fee,
                    memo: Some(envelope.memo),
                    gas_limit: envelope.gas_limit,
                    height: raw.height,
                    time: raw.time.clone(),
                }
            }
            MessageSource::Json(value) => {
                let raw_encoded = value.to_string();
                DecodedSource {
                    hash_bytes: raw_encoded.as_bytes().to_vec(),
                    message: decode_json_message(value)
                        .unwrap_or_else(|| DecodedMessage::unknown(UNKNOWN_TRANSACTION_LABEL)),
                    fee: json_fee(value),
                    memo: json_str(value, &["/body/memo", "/tx/body/memo", "/value/memo", "/memo"]),
                    gas_limit: json_gas_limit(value),
                    raw_encoded,
                    height: None,
                    time: None,
                }
            }
            MessageSource::Missing => DecodedSource {
                hash_bytes: Vec::new(),
                raw_encoded: String::new(),
                message: DecodedMessage::unknown(UNKNOWN_TRANSACTION_LABEL),
                fee: None,
                memo: None,
                gas_limit: None,
                height: None,
                time: None,
            },
        }
    }
}

struct DecodedSource {
    message: DecodedMessage,
    hash_bytes: Vec<u8>,
    raw_encoded: String,
    fee: Option<String>,
    memo: Option<String>,
    gas_limit: Option<u64>,
    height: Option<u64>,
    time: Option<String>,
}

fn resolve_hash(supplied: Option<&str>, bytes: &[u8]) -> Option<TxHash> {
    match supplied.and_then(TxHash::parse) {
        Some(hash) => {
            if !bytes.is_empty() && !hash.matches(bytes) {
                tracing::debug!(hash = %hash, "Supplied hash differs from computed hash");
            }
            Some(hash)
        }
        None if bytes.is_empty() => None,
        None => Some(TxHash::compute(bytes)),
    }
}

pub fn resolve_status(explicit: Option<&str>, code: Option<u64>, legacy_code: Option<u64>) -> TxStatus {
    if let Some(status) = explicit.and_then(TxStatus::from_label) {
        return status;
    }
    code.or(legacy_code)
        .map(TxStatus::from_code)
        .unwrap_or(TxStatus::Success)
}

pub fn resolve_fee<const N: usize>(explicit: [Option<&str>; N], gas_used: Option<u64>) -> String {
    explicit
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|fee| !fee.is_empty())
        .map(str::to_string)
        .or_else(|| gas_used.filter(|gas| *gas > 0).map(|gas| format!("{} gas", gas)))
        .unwrap_or_else(|| UNKNOWN_FEE.to_string())
}

fn first_non_empty<const N: usize>(candidates: [Option<&str>; N]) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn json_str(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .find_map(|pointer| value.pointer(pointer).and_then(Value::as_str))
        .map(str::to_string)
}

/// Fee coins of a JSON transaction (`auth_info.fee.amount` or amino `fee.amount`).
pub fn json_fee(value: &Value) -> Option<String> {
    let coins = ["/auth_info/fee/amount", "/tx/auth_info/fee/amount", "/value/fee/amount", "/fee/amount"]
        .iter()
        .find_map(|pointer| value.pointer(pointer).and_then(Value::as_array))?;
    let rendered: Vec<String> = coins
        .iter()
        .filter_map(|coin| {
            let amount = match coin.get("amount")? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let denom = coin.get("denom").and_then(Value::as_str).unwrap_or_default();
            Some(format!("{}{}", amount, denom))
        })
        .collect();
    if rendered.is_empty() {
        None
    } else {
        Some(rendered.join(","))
    }
}

fn json_gas_limit(value: &Value) -> Option<u64> {
    ["/auth_info/fee/gas_limit", "/tx/auth_info/fee/gas_limit", "/value/fee/gas", "/fee/gas"]
        .iter()
        .find_map(|pointer| value.pointer(pointer).and_then(lenient::value_to_u64))
}
