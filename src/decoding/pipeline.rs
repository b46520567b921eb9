//! Decoding pipeline: transaction envelope → wire decoder → heuristics.
//!
//! ```text
//! RawTransaction ──normalize──▶ base64 text
//!     base64 ok?  ── no ──▶ HeuristicDecoder (decoded = None)
//!         │ yes
//!     TxRaw/TxBody with a first message? ── yes ──▶ WireDecoder::decode_any
//!         │ no
//!     bare Any envelope? ── no ──▶ HeuristicDecoder (decoded = Some)
//!         │ yes
//!     Unknown on textual bytes? ── yes ──▶ HeuristicDecoder, keep wire result
//!                                          unless a probe matched
//! ```
//!
//! The pipeline is total: every input yields a [`DecodeOutcome`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use prost::Message;
use serde::{Deserialize, Serialize};

use crate::config::DecodingConfig;
use crate::decoding::heuristic::{HeuristicDecoder, HeuristicOutcome, ProbeKind};
use crate::decoding::message::DecodedMessage;
use crate::decoding::proto::{Any, AuthInfo, Coin, TxBody, TxRaw};
use crate::decoding::wire::{decode_base64, is_plausible_type_url, WireDecoder};
use crate::observability::metrics;

/// Share of printable bytes above which decoded bytes count as text.
const TEXTUAL_RATIO: f64 = 0.9;

/// How the raw transaction text is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Base64,
    Hex,
    Text,
}

/// Opaque transaction blob as received from an upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub data: String,
    pub encoding: Encoding,
    pub height: Option<u64>,
    pub time: Option<String>,
}

impl RawTransaction {
    pub fn new(data: impl Into<String>, encoding: Encoding) -> Self {
        Self {
            data: data.into(),
            encoding,
            height: None,
            time: None,
        }
    }

    pub fn base64(data: impl Into<String>) -> Self {
        Self::new(data, Encoding::Base64)
    }

    pub fn with_height(mut self, height: u64) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    /// Input for the base64 pipeline. Hex is re-encoded; text passes through.
    fn pipeline_input(&self) -> String {
        match self.encoding {
            Encoding::Base64 | Encoding::Text => self.data.clone(),
            Encoding::Hex => {
                let trimmed = self.data.trim();
                let bare = trimmed.strip_prefix("0x").unwrap_or(trimmed);
                match hex::decode(bare) {
                    Ok(bytes) => STANDARD.encode(bytes),
                    Err(_) => self.data.clone(),
                }
            }
        }
    }
}

/// Which stage produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePath {
    /// First message of a full `TxRaw` envelope.
    Envelope,
    /// Bare Any envelope.
    Wire,
    Heuristic(ProbeKind),
    /// Terminal fallback label.
    Fallback,
}

impl DecodePath {
    pub fn as_str(self) -> &'static str {
        match self {
            DecodePath::Envelope => "envelope",
            DecodePath::Wire => "wire",
            DecodePath::Heuristic(probe) => probe.as_str(),
            DecodePath::Fallback => "fallback",
        }
    }
}

/// Transaction-level data found next to the first message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvelopeInfo {
    pub memo: String,
    /// Fee coins in coin notation, comma separated.
    pub fee: Option<String>,
    pub gas_limit: Option<u64>,
    pub message_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOutcome {
    pub message: DecodedMessage,
    pub path: DecodePath,
    pub envelope: Option<EnvelopeInfo>,
    /// Original input text.
    pub raw_data: String,
    /// Decoded bytes when base64 decoding succeeded.
    pub bytes: Option<Vec<u8>>,
}

impl DecodeOutcome {
    /// Bytes that identify this transaction for hashing.
    pub fn hash_input(&self) -> &[u8] {
        self.bytes.as_deref().unwrap_or(self.raw_data.as_bytes())
    }
}

/// Composed decoder used by the transaction assembler.
#[derive(Debug, Clone)]
pub struct MessageDecoder {
    wire: WireDecoder,
    heuristic: HeuristicDecoder,
}

impl MessageDecoder {
    pub fn new(address_prefix: impl Into<String>, text_window: usize) -> Self {
        Self {
            wire: WireDecoder::new(),
            heuristic: HeuristicDecoder::new(address_prefix, text_window),
        }
    }

    pub fn from_config(config: &DecodingConfig) -> Self {
        Self::new(config.address_prefix.clone(), config.heuristic_text_window)
    }

    pub fn decode_raw(&self, raw: &RawTransaction) -> DecodeOutcome {
        self.decode(&raw.pipeline_input())
    }

    /// Decode base64 text. Never fails.
    pub fn decode(&self, input: &str) -> DecodeOutcome {
        let outcome = self.decode_inner(input);
        metrics::record_decode(outcome.path.as_str());
        outcome
    }

    fn decode_inner(&self, input: &str) -> DecodeOutcome {
        let bytes = match decode_base64(input) {
            Ok(bytes) => bytes,
            Err(failure) => {
                tracing::debug!(error = %failure, "Structured decode failed, running heuristics");
                let heuristic = self.heuristic.decode(input, None);
                return from_heuristic(heuristic, None);
            }
        };

        if let Some((any, envelope)) = unwrap_transaction(&bytes) {
            return DecodeOutcome {
                message: self.wire.decode_any(&any),
                path: DecodePath::Envelope,
                envelope: Some(envelope),
                raw_data: input.to_string(),
                bytes: Some(bytes),
            };
        }

        match self.wire.decode_bytes(&bytes) {
            Ok(message) if message.is_unknown() && looks_textual(&bytes) => {
                let heuristic = self.heuristic.decode(input, Some(&bytes));
                if heuristic.probe.is_some() {
                    from_heuristic(heuristic, Some(bytes))
                } else {
                    wire_outcome(message, input, bytes)
                }
            }
            Ok(message) => wire_outcome(message, input, bytes),
            Err(failure) => {
                tracing::debug!(error = %failure, "Structured decode failed, running heuristics");
                let heuristic = self.heuristic.decode(input, Some(&bytes));
                from_heuristic(heuristic, Some(bytes))
            }
        }
    }
}

fn wire_outcome(message: DecodedMessage, input: &str, bytes: Vec<u8>) -> DecodeOutcome {
    DecodeOutcome {
        message,
        path: DecodePath::Wire,
        envelope: None,
        raw_data: input.to_string(),
        bytes: Some(bytes),
    }
}

fn from_heuristic(outcome: HeuristicOutcome, bytes: Option<Vec<u8>>) -> DecodeOutcome {
    let path = outcome
        .probe
        .map(DecodePath::Heuristic)
        .unwrap_or(DecodePath::Fallback);
    DecodeOutcome {
        message: outcome.message,
        path,
        envelope: None,
        raw_data: outcome.raw_data,
        bytes,
    }
}

/// Parse `TxRaw → TxBody` and return the first message with envelope data.
pub fn unwrap_transaction(bytes: &[u8]) -> Option<(Any, EnvelopeInfo)> {
    let raw = TxRaw::decode(bytes).ok()?;
    let body = TxBody::decode(raw.body_bytes.as_slice()).ok()?;
    let message_count = body.messages.len();
    let first = body.messages.into_iter().next()?;
    if !is_plausible_type_url(&first.type_url) {
        return None;
    }

    let fee = AuthInfo::decode(raw.auth_info_bytes.as_slice())
        .ok()
        .and_then(|auth| auth.fee);
    let envelope = EnvelopeInfo {
        memo: body.memo,
        fee: fee.as_ref().and_then(|fee| format_coins(&fee.amount)),
        gas_limit: fee.map(|fee| fee.gas_limit).filter(|gas| *gas > 0),
        message_count,
    };
    Some((first, envelope))
}

fn format_coins(coins: &[Coin]) -> Option<String> {
    if coins.is_empty() {
        return None;
    }
    let rendered: Vec<String> = coins
        .iter()
        .map(|coin| format!("{}{}", coin.amount, coin.denom))
        .collect();
    Some(rendered.join(","))
}

fn looks_textual(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }
    let printable = bytes
        .iter()
        .filter(|b| b.is_ascii_graphic() || b.is_ascii_whitespace())
        .count();
    printable as f64 / bytes.len() as f64 >= TEXTUAL_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoding::heuristic::{DECODE_ERROR_LABEL, UNKNOWN_TRANSACTION_LABEL};
    use crate::decoding::proto::{Fee, MsgSend};
    use proptest::prelude::*;

    fn decoder() -> MessageDecoder {
        MessageDecoder::new("cosmos", 1000)
    }

    fn send_any() -> Any {
        Any {
            type_url: "/cosmos.bank.v1beta1.MsgSend".into(),
            value: MsgSend {
                from_address: "cosmos1from".into(),
                to_address: "cosmos1to".into(),
                amount: vec![Coin { denom: "uatom".into(), amount: "3".into() }],
            }
            .encode_to_vec(),
        }
    }

    fn tx_raw_bytes() -> Vec<u8> {
        let body = TxBody {
            messages: vec![send_any(), send_any()],
            memo: "thanks".into(),
            timeout_height: 0,
        };
        let auth = AuthInfo {
            fee: Some(Fee {
                amount: vec![Coin { denom: "uatom".into(), amount: "500".into() }],
                gas_limit: 200_000,
                payer: String::new(),
                granter: String::new(),
            }),
        };
        TxRaw {
            body_bytes: body.encode_to_vec(),
            auth_info_bytes: auth.encode_to_vec(),
            signatures: vec![vec![1; 64]],
        }
        .encode_to_vec()
    }

    #[test]
    fn test_full_transaction_envelope() {
        let input = STANDARD.encode(tx_raw_bytes());
        let outcome = decoder().decode(&input);
        assert_eq!(outcome.path, DecodePath::Envelope);
        assert_eq!(outcome.message.label(), "Send");
        let envelope = outcome.envelope.unwrap();
        assert_eq!(envelope.memo, "thanks");
        assert_eq!(envelope.fee.as_deref(), Some("500uatom"));
        assert_eq!(envelope.gas_limit, Some(200_000));
        assert_eq!(envelope.message_count, 2);
    }

    #[test]
    fn test_bare_any_envelope() {
        let input = STANDARD.encode(send_any().encode_to_vec());
        let outcome = decoder().decode(&input);
        assert_eq!(outcome.path, DecodePath::Wire);
        assert_eq!(outcome.message.sender(), Some("cosmos1from"));
    }

    #[test]
    fn test_hex_encoding_hint() {
        let raw = RawTransaction::new(hex::encode(tx_raw_bytes()), Encoding::Hex);
        let outcome = decoder().decode_raw(&raw);
        assert_eq!(outcome.path, DecodePath::Envelope);
        assert_eq!(outcome.bytes.as_deref(), Some(tx_raw_bytes().as_slice()));
    }

    #[test]
    fn test_json_text_input() {
        let raw = RawTransaction::new(
            r#"{"@type":"/cosmos.gov.v1beta1.MsgVote","voter":"cosmos1voter"}"#,
            Encoding::Text,
        );
        let outcome = decoder().decode_raw(&raw);
        assert_eq!(outcome.path, DecodePath::Heuristic(ProbeKind::JsonSniff));
        assert_eq!(outcome.message, DecodedMessage::Vote { voter: "cosmos1voter".into() });
    }

    #[test]
    fn test_garbage_inputs() {
        let outcome = decoder().decode("definitely not base64 ~~~");
        assert_eq!(outcome.message, DecodedMessage::unknown(DECODE_ERROR_LABEL));
        assert_eq!(outcome.path, DecodePath::Fallback);
        assert_eq!(outcome.hash_input(), "definitely not base64 ~~~".as_bytes());

        let outcome = decoder().decode(&STANDARD.encode([0xff, 0xff, 0xff]));
        assert_eq!(outcome.message, DecodedMessage::unknown(UNKNOWN_TRANSACTION_LABEL));
    }

    #[test]
    fn test_idempotent() {
        let input = STANDARD.encode(tx_raw_bytes());
        assert_eq!(decoder().decode(&input), decoder().decode(&input));
    }

    proptest! {
        #[test]
        fn prop_total_over_strings(input in ".{0,300}") {
            let outcome = decoder().decode(&input);
            prop_assert!(!outcome.message.label().is_empty());
        }

        #[test]
        fn prop_total_over_base64_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..300)) {
            let outcome = decoder().decode(&STANDARD.encode(&bytes));
            prop_assert_eq!(outcome.bytes.as_deref(), Some(bytes.as_slice()));
        }
    }
}
