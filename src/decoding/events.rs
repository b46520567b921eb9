//! Sender / recipient / amount extraction from execution events.
//!
//! Only the first `transfer` event is read. Transactions with several
//! transfers are summarized by their first one.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

pub const TRANSFER_EVENT: &str = "transfer";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventAttribute {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl EventAttribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value.into()),
        }
    }

    /// Value if this attribute is `name`, matching either the plain key or a
    /// base64-encoded key as emitted by older nodes.
    fn value_for(&self, name: &str) -> Option<String> {
        let key = self.key.as_deref()?;
        let value = self.value.as_deref().unwrap_or_default();
        if key == name {
            return Some(value.to_string());
        }
        let decoded_key = STANDARD.decode(key).ok()?;
        if decoded_key != name.as_bytes() {
            return None;
        }
        let decoded_value = STANDARD
            .decode(value)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_else(|_| value.to_string());
        Some(decoded_value)
    }
}

/// One execution event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

impl TxEvent {
    pub fn new(kind: impl Into<String>, attributes: Vec<EventAttribute>) -> Self {
        Self {
            kind: kind.into(),
            attributes,
        }
    }

    /// First value recorded under `name`.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.iter().find_map(|attr| attr.value_for(name))
    }

    /// Whether any attribute value equals `needle`, plain or base64-encoded.
    pub fn mentions(&self, needle: &str) -> bool {
        self.attributes
            .iter()
            .filter_map(|attr| attr.value.as_deref())
            .any(|value| {
                value == needle
                    || STANDARD
                        .decode(value)
                        .is_ok_and(|bytes| bytes == needle.as_bytes())
            })
    }
}

/// Fields read from the first transfer event. Missing attributes are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransferSummary {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub amount: Option<String>,
}

/// Read sender, recipient and amount from the first `transfer` event.
pub fn extract_transfer(events: &[TxEvent]) -> TransferSummary {
    let Some(event) = events.iter().find(|event| event.kind == TRANSFER_EVENT) else {
        return TransferSummary::default();
    };
    TransferSummary {
        sender: event.attribute("sender"),
        recipient: event.attribute("recipient"),
        amount: event.attribute("amount"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_transfer_event_only() {
        let events = vec![
            TxEvent::new("message", vec![EventAttribute::new("sender", "cosmos1fee")]),
            TxEvent::new(
                "transfer",
                vec![
                    EventAttribute::new("recipient", "cosmos1to"),
                    EventAttribute::new("sender", "cosmos1from"),
                    EventAttribute::new("amount", "10uatom"),
                ],
            ),
            TxEvent::new(
                "transfer",
                vec![EventAttribute::new("recipient", "cosmos1second")],
            ),
        ];
        let summary = extract_transfer(&events);
        assert_eq!(summary.sender.as_deref(), Some("cosmos1from"));
        assert_eq!(summary.recipient.as_deref(), Some("cosmos1to"));
        assert_eq!(summary.amount.as_deref(), Some("10uatom"));
    }

    #[test]
    fn test_missing_attributes_are_none() {
        let events = vec![TxEvent::new("transfer", vec![EventAttribute::new("sender", "a")])];
        let summary = extract_transfer(&events);
        assert_eq!(summary.sender.as_deref(), Some("a"));
        assert!(summary.recipient.is_none());
        assert!(summary.amount.is_none());

        assert_eq!(extract_transfer(&[]), TransferSummary::default());
    }

    #[test]
    fn test_base64_attributes() {
        // "sender" / "cosmos1b64"
        let events = vec![TxEvent::new(
            "transfer",
            vec![EventAttribute::new("c2VuZGVy", "Y29zbW9zMWI2NA==")],
        )];
        let summary = extract_transfer(&events);
        assert_eq!(summary.sender.as_deref(), Some("cosmos1b64"));
    }

    #[test]
    fn test_null_fields_deserialize() {
        let event: TxEvent =
            serde_json::from_str(r#"{"type":"transfer","attributes":[{"key":"sender","value":null}]}"#).unwrap();
        assert_eq!(event.attribute("sender").as_deref(), Some(""));
    }

    #[test]
    fn test_mentions() {
        let event = TxEvent::new("coin_received", vec![EventAttribute::new("receiver", "cosmos1me")]);
        assert!(event.mentions("cosmos1me"));
        assert!(!event.mentions("cosmos1other"));
    }
}
