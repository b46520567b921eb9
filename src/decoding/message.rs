//! Decoded message model.
//!
//! The set of message kinds with extractable fields is closed: every
//! type URL either maps to a [`MessageKind`] or falls into
//! [`DecodedMessage::Unknown`], so a new upstream message type shows up as
//! an explicit gap rather than a silent miss.

use serde::{Deserialize, Serialize};

/// Message kinds the decoders extract fields from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Send,
    Delegate,
    Undelegate,
    Redelegate,
    Vote,
    WithdrawReward,
    PubKey,
}

impl MessageKind {
    /// Resolve a protobuf type URL such as `/cosmos.bank.v1beta1.MsgSend`.
    ///
    /// Matching is on the module segment plus the final message name, so
    /// any package version (`v1beta1`, `v1`) resolves to the same kind.
    pub fn from_type_url(type_url: &str) -> Option<Self> {
        let path = type_url.rsplit('/').next().unwrap_or(type_url);
        let name = path.rsplit('.').next().unwrap_or(path);
        let in_module = |module: &str| path.split('.').any(|segment| segment == module);

        match name {
            "MsgSend" if in_module("bank") => Some(MessageKind::Send),
            "MsgDelegate" if in_module("staking") => Some(MessageKind::Delegate),
            "MsgUndelegate" if in_module("staking") => Some(MessageKind::Undelegate),
            "MsgBeginRedelegate" if in_module("staking") => Some(MessageKind::Redelegate),
            "MsgVote" if in_module("gov") => Some(MessageKind::Vote),
            "MsgWithdrawDelegatorReward" if in_module("distribution") => {
                Some(MessageKind::WithdrawReward)
            }
            "PubKey" if in_module("crypto") && in_module("secp256k1") => Some(MessageKind::PubKey),
            _ => None,
        }
    }

    /// Resolve a legacy amino JSON type name such as `cosmos-sdk/MsgSend`.
    pub fn from_amino_type(name: &str) -> Option<Self> {
        match name {
            "cosmos-sdk/MsgSend" => Some(MessageKind::Send),
            "cosmos-sdk/MsgDelegate" => Some(MessageKind::Delegate),
            "cosmos-sdk/MsgUndelegate" => Some(MessageKind::Undelegate),
            "cosmos-sdk/MsgBeginRedelegate" => Some(MessageKind::Redelegate),
            "cosmos-sdk/MsgVote" => Some(MessageKind::Vote),
            "cosmos-sdk/MsgWithdrawDelegationReward" => Some(MessageKind::WithdrawReward),
            "tendermint/PubKeySecp256k1" => Some(MessageKind::PubKey),
            _ => None,
        }
    }

    /// Human label shown for this kind.
    pub fn label(self) -> &'static str {
        match self {
            MessageKind::Send => "Send",
            MessageKind::Delegate => "Delegate",
            MessageKind::Undelegate => "Undelegate",
            MessageKind::Redelegate => "Redelegate",
            MessageKind::Vote => "Vote",
            MessageKind::WithdrawReward => "Claim Rewards",
            MessageKind::PubKey => "Public Key",
        }
    }
}

/// Label for a type URL outside the closed table: the last path segment
/// with a literal `Msg` prefix removed.
pub fn unknown_label(type_url: &str) -> String {
    let path = type_url.rsplit('/').next().unwrap_or(type_url);
    let name = path.rsplit('.').next().unwrap_or(path);
    let label = name.strip_prefix("Msg").unwrap_or(name);
    if label.is_empty() {
        "Unknown".to_string()
    } else {
        label.to_string()
    }
}

/// One decoded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum DecodedMessage {
    Send {
        sender: String,
        recipient: String,
        amount: String,
        denom: String,
    },
    Delegate {
        delegator: String,
        validators: Vec<String>,
        amount: String,
        denom: String,
    },
    Undelegate {
        delegator: String,
        validators: Vec<String>,
        amount: String,
        denom: String,
    },
    /// `validators` is `[source, destination]`.
    Redelegate {
        delegator: String,
        validators: Vec<String>,
        amount: String,
        denom: String,
    },
    Vote {
        voter: String,
    },
    #[serde(rename = "Claim Rewards")]
    WithdrawReward {
        delegator: String,
        validators: Vec<String>,
    },
    #[serde(rename = "Public Key")]
    PubKey {
        key_hex: String,
    },
    Unknown {
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        type_url: Option<String>,
    },
}

impl DecodedMessage {
    /// Unknown message carrying only a label.
    pub fn unknown(label: impl Into<String>) -> Self {
        DecodedMessage::Unknown {
            label: label.into(),
            type_url: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DecodedMessage::Unknown { .. })
    }

    /// Display label ("Send", "Claim Rewards", or the unknown label).
    pub fn label(&self) -> &str {
        match self {
            DecodedMessage::Send { .. } => MessageKind::Send.label(),
            DecodedMessage::Delegate { .. } => MessageKind::Delegate.label(),
            DecodedMessage::Undelegate { .. } => MessageKind::Undelegate.label(),
            DecodedMessage::Redelegate { .. } => MessageKind::Redelegate.label(),
            DecodedMessage::Vote { .. } => MessageKind::Vote.label(),
            DecodedMessage::WithdrawReward { .. } => MessageKind::WithdrawReward.label(),
            DecodedMessage::PubKey { .. } => MessageKind::PubKey.label(),
            DecodedMessage::Unknown { label, .. } => label,
        }
    }

    /// Account that initiated the message.
    pub fn sender(&self) -> Option<&str> {
        let sender = match self {
            DecodedMessage::Send { sender, .. } => sender,
            DecodedMessage::Delegate { delegator, .. }
            | DecodedMessage::Undelegate { delegator, .. }
            | DecodedMessage::Redelegate { delegator, .. }
            | DecodedMessage::WithdrawReward { delegator, .. } => delegator,
            DecodedMessage::Vote { voter } => voter,
            DecodedMessage::PubKey { .. } | DecodedMessage::Unknown { .. } => return None,
        };
        non_empty(sender)
    }

    /// Counterparty: the recipient of a send, the validator of a
    /// delegation, or the destination validator of a redelegation.
    pub fn recipient(&self) -> Option<&str> {
        match self {
            DecodedMessage::Send { recipient, .. } => non_empty(recipient),
            DecodedMessage::Delegate { validators, .. }
            | DecodedMessage::Undelegate { validators, .. }
            | DecodedMessage::WithdrawReward { validators, .. } => {
                validators.first().and_then(|v| non_empty(v))
            }
            DecodedMessage::Redelegate { validators, .. } => {
                validators.get(1).and_then(|v| non_empty(v))
            }
            _ => None,
        }
    }

    /// Amount in coin notation, e.g. `1000000uatom`.
    pub fn amount_summary(&self) -> Option<String> {
        match self {
            DecodedMessage::Send { amount, denom, .. }
            | DecodedMessage::Delegate { amount, denom, .. }
            | DecodedMessage::Undelegate { amount, denom, .. }
            | DecodedMessage::Redelegate { amount, denom, .. } => {
                if amount.is_empty() {
                    None
                } else {
                    Some(format!("{}{}", amount, denom))
                }
            }
            _ => None,
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
