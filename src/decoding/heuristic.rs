//! Ordered fallback probes for input the wire decoder cannot handle.
//!
//! Probes run in a fixed order and the first one that recognises the input
//! wins:
//!
//! ```text
//! json sniff → address sniff (decoded text) → hex keyword sniff
//!            → address sniff (original text) → terminal fallback
//! ```
//!
//! Every probe is a pure function of [`ProbeInput`]; none of them can fail
//! outward. The terminal fallback always produces a message.

use std::borrow::Cow;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;

use crate::decoding::message::{unknown_label, DecodedMessage, MessageKind};

pub const DECODE_ERROR_LABEL: &str = "Decode Error";
pub const UNKNOWN_TRANSACTION_LABEL: &str = "Unknown Transaction";
pub const VALIDATOR_OPERATION_LABEL: &str = "Validator Operation";

/// Address payload length bounds after the human-readable prefix.
const ADDRESS_MIN_TAIL: usize = 38;
const ADDRESS_MAX_TAIL: usize = 44;

/// How far past the recipient address an amount is looked for.
const COIN_SEARCH_WINDOW: usize = 128;

/// ASCII keywords searched for in the hex rendering of decoded bytes,
/// with the category label each one implies.
const HEX_KEYWORDS: [(&str, &str); 5] = [
    ("bank", "Bank Operation"),
    ("staking", "Staking Operation"),
    ("governance", "Governance Operation"),
    ("factory", "Token Factory Operation"),
    ("distributi", "Distribution Operation"),
];

/// Everything a probe may look at.
#[derive(Debug, Clone, Copy)]
pub struct ProbeInput<'a> {
    /// Input exactly as received.
    pub original: &'a str,
    /// Base64-decoded bytes, absent when base64 decoding failed.
    pub decoded: Option<&'a [u8]>,
    pub address_prefix: &'a str,
    /// Decoded bytes rendered as text for the address sniff.
    pub text_window: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    JsonSniff,
    AddressSniff,
    HexKeyword,
    RawAddressSniff,
}

impl ProbeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeKind::JsonSniff => "json_sniff",
            ProbeKind::AddressSniff => "address_sniff",
            ProbeKind::HexKeyword => "hex_keyword",
            ProbeKind::RawAddressSniff => "raw_address_sniff",
        }
    }
}

pub type Probe = fn(&ProbeInput<'_>) -> Option<DecodedMessage>;

/// The probe chain, in evaluation order.
pub const PROBES: [(ProbeKind, Probe); 4] = [
    (ProbeKind::JsonSniff, json_sniff),
    (ProbeKind::AddressSniff, address_sniff),
    (ProbeKind::HexKeyword, hex_keyword_sniff),
    (ProbeKind::RawAddressSniff, raw_address_sniff),
];

/// Result of the heuristic chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeuristicOutcome {
    pub message: DecodedMessage,
    /// Probe that matched; `None` for the terminal fallback.
    pub probe: Option<ProbeKind>,
    /// The original input, retained verbatim.
    pub raw_data: String,
}

/// Fallback decoder configured for one chain.
#[derive(Debug, Clone)]
pub struct HeuristicDecoder {
    address_prefix: String,
    text_window: usize,
}

impl HeuristicDecoder {
    pub fn new(address_prefix: impl Into<String>, text_window: usize) -> Self {
        Self {
            address_prefix: address_prefix.into(),
            text_window,
        }
    }

    /// Run the probe chain. Never fails.
    pub fn decode(&self, original: &str, decoded: Option<&[u8]>) -> HeuristicOutcome {
        let input = ProbeInput {
            original,
            decoded,
            address_prefix: &self.address_prefix,
            text_window: self.text_window,
        };

        for (kind, probe) in PROBES {
            if let Some(message) = probe(&input) {
                tracing::debug!(probe = kind.as_str(), label = message.label(), "Heuristic probe matched");
                return HeuristicOutcome {
                    message,
                    probe: Some(kind),
                    raw_data: original.to_string(),
                };
            }
        }

        let label = if decoded.is_none() {
            DECODE_ERROR_LABEL
        } else {
            UNKNOWN_TRANSACTION_LABEL
        };
        HeuristicOutcome {
            message: DecodedMessage::unknown(label),
            probe: None,
            raw_data: original.to_string(),
        }
    }
}

/// Probe (a): JSON documents, either the original text or base64-wrapped.
pub fn json_sniff(input: &ProbeInput<'_>) -> Option<DecodedMessage> {
    let decoded_text = input.decoded.map(String::from_utf8_lossy);
    let candidates = std::iter::once(input.original).chain(decoded_text.as_deref());

    for text in candidates {
        if !(text.contains('{') && text.contains('}')) {
            continue;
        }
        if let Some(value) = parse_json_lenient(text) {
            if let Some(message) = decode_json_message(&value) {
                return Some(message);
            }
        }
    }
    None
}

fn parse_json_lenient(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return Some(value);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Decode a JSON message, a JSON transaction, or an amino `StdTx`.
///
/// A `type` or `@type` field containing `/` routes through the same type
/// table as the wire decoder; otherwise a `from_address` key is enough to
/// synthesize a `Send`.
pub fn decode_json_message(value: &Value) -> Option<DecodedMessage> {
    // Embedded messages first, so a transaction wrapper with its own type
    // field does not shadow the message it carries.
    let candidates = [
        value.pointer("/tx/body/messages/0"),
        value.pointer("/body/messages/0"),
        value.pointer("/messages/0"),
        value.pointer("/value/msg/0"),
        value.pointer("/msg/0"),
        Some(value),
    ];
    let candidates: Vec<&Value> = candidates.into_iter().flatten().collect();

    for candidate in &candidates {
        if let Some(type_name) = type_field(candidate) {
            if type_name.contains('/') {
                return Some(route_json(type_name, candidate));
            }
        }
    }

    candidates
        .iter()
        .map(|candidate| message_fields(candidate))
        .find(|fields| fields.get("from_address").is_some())
        .map(|fields| json_send(fields))
}

fn type_field(value: &Value) -> Option<&str> {
    value
        .get("@type")
        .or_else(|| value.get("type"))
        .and_then(Value::as_str)
}

/// Amino messages nest their fields under `value`.
fn message_fields(value: &Value) -> &Value {
    match value.get("value") {
        Some(inner) if inner.is_object() => inner,
        _ => value,
    }
}

fn route_json(type_name: &str, message: &Value) -> DecodedMessage {
    let kind = MessageKind::from_type_url(type_name).or_else(|| MessageKind::from_amino_type(type_name));
    let fields = message_fields(message);

    let Some(kind) = kind else {
        return DecodedMessage::unknown(unknown_label(type_name));
    };

    match kind {
        MessageKind::Send => json_send(fields),
        MessageKind::Delegate | MessageKind::Undelegate => {
            let (amount, denom) = json_coin(fields.get("amount"));
            let delegator = json_str(fields, "delegator_address");
            let validators = vec![json_str(fields, "validator_address")];
            if kind == MessageKind::Delegate {
                DecodedMessage::Delegate { delegator, validators, amount, denom }
            } else {
                DecodedMessage::Undelegate { delegator, validators, amount, denom }
            }
        }
        MessageKind::Redelegate => {
            let (amount, denom) = json_coin(fields.get("amount"));
            DecodedMessage::Redelegate {
                delegator: json_str(fields, "delegator_address"),
                validators: vec![
                    json_str(fields, "validator_src_address"),
                    json_str(fields, "validator_dst_address"),
                ],
                amount,
                denom,
            }
        }
        MessageKind::Vote => DecodedMessage::Vote {
            voter: json_str(fields, "voter"),
        },
        MessageKind::WithdrawReward => DecodedMessage::WithdrawReward {
            delegator: json_str(fields, "delegator_address"),
            validators: vec![json_str(fields, "validator_address")],
        },
        MessageKind::PubKey => {
            let encoded = message
                .get("key")
                .or_else(|| message.get("value"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            let key_hex = STANDARD.decode(encoded).map(hex::encode).unwrap_or_default();
            DecodedMessage::PubKey { key_hex }
        }
    }
}

fn json_send(fields: &Value) -> DecodedMessage {
    let (amount, denom) = json_coin(fields.get("amount"));
    DecodedMessage::Send {
        sender: json_str(fields, "from_address"),
        recipient: json_str(fields, "to_address"),
        amount,
        denom,
    }
}

fn json_str(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Amount from a coin list, a single coin object, or `"<digits><denom>"`.
fn json_coin(value: Option<&Value>) -> (String, String) {
    match value {
        Some(Value::Array(coins)) => json_coin(coins.first()),
        Some(coin @ Value::Object(_)) => {
            let amount = match coin.get("amount") {
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::String(s)) => s.clone(),
                _ => String::new(),
            };
            (amount, json_str(coin, "denom"))
        }
        Some(Value::String(text)) => split_coin(text).unwrap_or_default(),
        _ => (String::new(), String::new()),
    }
}

/// Split `"1500uatom"` into `("1500", "uatom")`.
pub fn split_coin(text: &str) -> Option<(String, String)> {
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits == text.len() {
        return None;
    }
    let (amount, denom) = text.split_at(digits);
    Some((amount.to_string(), denom.to_string()))
}

/// Probe (b): account addresses inside the decoded bytes rendered as text.
pub fn address_sniff(input: &ProbeInput<'_>) -> Option<DecodedMessage> {
    let decoded = input.decoded?;
    let window = &decoded[..decoded.len().min(input.text_window)];
    let text = String::from_utf8_lossy(window);
    sniff_addresses(&text, input.address_prefix)
}

/// Probe (c): coarse category from ASCII keywords in the hex rendering.
pub fn hex_keyword_sniff(input: &ProbeInput<'_>) -> Option<DecodedMessage> {
    let rendered = hex::encode(input.decoded?);
    HEX_KEYWORDS
        .iter()
        .find(|(keyword, _)| rendered.contains(&hex::encode(keyword)))
        .map(|(_, label)| DecodedMessage::unknown(*label))
}

/// Probe (d): address sniff over the original, possibly non-base64, text.
pub fn raw_address_sniff(input: &ProbeInput<'_>) -> Option<DecodedMessage> {
    sniff_addresses(input.original, input.address_prefix)
}

fn sniff_addresses(text: &str, prefix: &str) -> Option<DecodedMessage> {
    let matches = find_addresses(text, prefix);
    match matches.as_slice() {
        [] => None,
        [_single] => Some(DecodedMessage::unknown(VALIDATOR_OPERATION_LABEL)),
        [first, second, ..] => {
            let (amount, denom) = find_coin(&text.as_bytes()[second.end..]).unwrap_or_default();
            Some(DecodedMessage::Send {
                sender: text[first.clone()].to_string(),
                recipient: text[second.clone()].to_string(),
                amount,
                denom,
            })
        }
    }
}

/// Byte ranges of `<prefix><38..=44 alphanumerics>` in `text`, scanning left
/// to right without overlap.
pub fn find_addresses(text: &str, prefix: &str) -> Vec<std::ops::Range<usize>> {
    let bytes = text.as_bytes();
    let prefix = prefix.as_bytes();
    let mut found = Vec::new();
    if prefix.is_empty() {
        return found;
    }

    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(prefix) {
            let tail_start = i + prefix.len();
            let tail = bytes[tail_start..]
                .iter()
                .take_while(|b| b.is_ascii_alphanumeric())
                .count();
            if tail >= ADDRESS_MIN_TAIL {
                let end = tail_start + tail.min(ADDRESS_MAX_TAIL);
                found.push(i..end);
                i = end;
                continue;
            }
        }
        i += 1;
    }
    found
}

/// First `<digits><letters>` run within the search window.
fn find_coin(bytes: &[u8]) -> Option<(String, String)> {
    let window = &bytes[..bytes.len().min(COIN_SEARCH_WINDOW)];
    let mut i = 0;
    while i < window.len() {
        if window[i].is_ascii_digit() && (i == 0 || !window[i - 1].is_ascii_digit()) {
            let digits = window[i..].iter().take_while(|b| b.is_ascii_digit()).count();
            let letters_start = i + digits;
            let letters = window[letters_start..]
                .iter()
                .take_while(|b| b.is_ascii_alphabetic())
                .count();
            if letters > 0 {
                let amount = to_text(&window[i..letters_start]);
                let denom = to_text(&window[letters_start..letters_start + letters]);
                return Some((amount.into_owned(), denom.into_owned()));
            }
            i = letters_start;
            continue;
        }
        i += 1;
    }
    None
}

fn to_text(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}
