//! Structured decoding of Any-wrapped messages.
//!
//! # Contract
//! 1. Base64-decode the input (`DecodeStage::Base64` on failure)
//! 2. Parse the Any envelope (`DecodeStage::Envelope` on failure)
//! 3. Dispatch the type URL against the closed [`MessageKind`] table
//! 4. Unknown type URL → `Unknown` labelled from the last path segment
//! 5. Payload extraction failure for a known type URL → `Unknown` carrying
//!    the type URL

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use prost::Message;

use crate::decoding::error::{snippet, DecodeFailure, DecodeStage};
use crate::decoding::message::{unknown_label, DecodedMessage, MessageKind};
use crate::decoding::proto::{
    Any, Coin, MsgBeginRedelegate, MsgDelegate, MsgSend, MsgVote, MsgWithdrawDelegatorReward,
    PubKey,
};

/// Decode base64 text, accepting standard and URL-safe alphabets with or
/// without padding. Surrounding whitespace is ignored.
pub fn decode_base64(input: &str) -> Result<Vec<u8>, DecodeFailure> {
    let trimmed = input.trim();
    let engines = [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD];
    let mut last_error = None;
    for engine in engines {
        match engine.decode(trimmed) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => last_error = Some(e),
        }
    }
    let reason = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "not base64".to_string());
    Err(DecodeFailure::new(DecodeStage::Base64, reason, input))
}

/// Stateless structured decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireDecoder;

impl WireDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode base64 text holding an Any envelope.
    pub fn decode(&self, input: &str) -> Result<DecodedMessage, DecodeFailure> {
        let bytes = decode_base64(input)?;
        self.decode_bytes(&bytes).map_err(|failure| DecodeFailure {
            snippet: snippet(input),
            ..failure
        })
    }

    /// Decode raw Any envelope bytes.
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<DecodedMessage, DecodeFailure> {
        let any = Any::decode(bytes).map_err(|e| {
            DecodeFailure::new(DecodeStage::Envelope, e, &hex::encode(bytes))
        })?;
        if !is_plausible_type_url(&any.type_url) {
            return Err(DecodeFailure::new(
                DecodeStage::Envelope,
                "missing or malformed type URL",
                &hex::encode(bytes),
            ));
        }
        Ok(self.decode_any(&any))
    }

    /// Dispatch an already-parsed envelope. Never fails.
    pub fn decode_any(&self, any: &Any) -> DecodedMessage {
        match self.decode_payload(any) {
            Ok(message) => message,
            Err(failure) => {
                tracing::debug!(
                    type_url = %any.type_url,
                    error = %failure,
                    "Payload extraction failed for known type URL"
                );
                DecodedMessage::Unknown {
                    label: unknown_label(&any.type_url),
                    type_url: Some(any.type_url.clone()),
                }
            }
        }
    }

    /// Like [`decode_any`](Self::decode_any) but reports a malformed
    /// payload of a known type as a `Payload` stage failure.
    pub fn decode_payload(&self, any: &Any) -> Result<DecodedMessage, DecodeFailure> {
        match MessageKind::from_type_url(&any.type_url) {
            Some(kind) => extract(kind, &any.value)
                .map_err(|e| DecodeFailure::new(DecodeStage::Payload, e, &hex::encode(&any.value))),
            None => Ok(DecodedMessage::unknown(unknown_label(&any.type_url))),
        }
    }
}

/// Type URLs are printable, slash-led paths such as `/cosmos.bank.v1beta1.MsgSend`.
pub(crate) fn is_plausible_type_url(type_url: &str) -> bool {
    type_url.len() > 1
        && type_url.contains('/')
        && type_url.bytes().all(|b| b.is_ascii_graphic())
}

fn extract(kind: MessageKind, payload: &[u8]) -> Result<DecodedMessage, prost::DecodeError> {
    let message = match kind {
        MessageKind::Send => {
            let msg = MsgSend::decode(payload)?;
            let (amount, denom) = coin_parts(msg.amount.first());
            DecodedMessage::Send {
                sender: msg.from_address,
                recipient: msg.to_address,
                amount,
                denom,
            }
        }
        MessageKind::Delegate | MessageKind::Undelegate => {
            let msg = MsgDelegate::decode(payload)?;
            let (amount, denom) = coin_parts(msg.amount.as_ref());
            let delegator = msg.delegator_address;
            let validators = vec![msg.validator_address];
            if kind == MessageKind::Delegate {
                DecodedMessage::Delegate { delegator, validators, amount, denom }
            } else {
                DecodedMessage::Undelegate { delegator, validators, amount, denom }
            }
        }
        MessageKind::Redelegate => {
            let msg = MsgBeginRedelegate::decode(payload)?;
            let (amount, denom) = coin_parts(msg.amount.as_ref());
            DecodedMessage::Redelegate {
                delegator: msg.delegator_address,
                validators: vec![msg.validator_src_address, msg.validator_dst_address],
                amount,
                denom,
            }
        }
        MessageKind::Vote => {
            let msg = MsgVote::decode(payload)?;
            DecodedMessage::Vote { voter: msg.voter }
        }
        MessageKind::WithdrawReward => {
            let msg = MsgWithdrawDelegatorReward::decode(payload)?;
            DecodedMessage::WithdrawReward {
                delegator: msg.delegator_address,
                validators: vec![msg.validator_address],
            }
        }
        MessageKind::PubKey => {
            let msg = PubKey::decode(payload)?;
            DecodedMessage::PubKey {
                key_hex: hex::encode(msg.key),
            }
        }
    };
    Ok(message)
}

fn coin_parts(coin: Option<&Coin>) -> (String, String) {
    coin.map(|c| (c.amount.clone(), c.denom.clone()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_any(type_url: &str, value: Vec<u8>) -> String {
        let any = Any {
            type_url: type_url.to_string(),
            value,
        };
        STANDARD.encode(any.encode_to_vec())
    }

    fn coin(amount: &str, denom: &str) -> Coin {
        Coin {
            denom: denom.to_string(),
            amount: amount.to_string(),
        }
    }

    #[test]
    fn test_known_vector_send() {
        let payload = MsgSend {
            from_address: "cosmos1sender".into(),
            to_address: "cosmos1recipient".into(),
            amount: vec![coin("1500", "uatom"), coin("7", "ibc/ABC")],
        };
        let input = encode_any("/cosmos.bank.v1beta1.MsgSend", payload.encode_to_vec());

        let decoded = WireDecoder::new().decode(&input).unwrap();
        assert_eq!(
            decoded,
            DecodedMessage::Send {
                sender: "cosmos1sender".into(),
                recipient: "cosmos1recipient".into(),
                amount: "1500".into(),
                denom: "uatom".into(),
            }
        );
    }

    #[test]
    fn test_delegate_and_undelegate_share_layout() {
        let payload = MsgDelegate {
            delegator_address: "cosmos1del".into(),
            validator_address: "cosmosvaloper1val".into(),
            amount: Some(coin("42", "uatom")),
        }
        .encode_to_vec();

        let delegate = WireDecoder::new()
            .decode(&encode_any("/cosmos.staking.v1beta1.MsgDelegate", payload.clone()))
            .unwrap();
        let undelegate = WireDecoder::new()
            .decode(&encode_any("/cosmos.staking.v1beta1.MsgUndelegate", payload))
            .unwrap();

        assert_eq!(delegate.label(), "Delegate");
        assert_eq!(undelegate.label(), "Undelegate");
        assert_eq!(undelegate.recipient(), Some("cosmosvaloper1val"));
        assert_eq!(undelegate.amount_summary().as_deref(), Some("42uatom"));
    }

    #[test]
    fn test_redelegate_validators_order() {
        let payload = MsgBeginRedelegate {
            delegator_address: "cosmos1del".into(),
            validator_src_address: "src".into(),
            validator_dst_address: "dst".into(),
            amount: None,
        }
        .encode_to_vec();
        let decoded = WireDecoder::new()
            .decode(&encode_any("/cosmos.staking.v1beta1.MsgBeginRedelegate", payload))
            .unwrap();
        match decoded {
            DecodedMessage::Redelegate { validators, amount, .. } => {
                assert_eq!(validators, vec!["src".to_string(), "dst".to_string()]);
                assert!(amount.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_vote_claim_and_pubkey() {
        let decoder = WireDecoder::new();

        let vote = MsgVote { proposal_id: 7, voter: "cosmos1voter".into(), option: 1 };
        let decoded = decoder
            .decode(&encode_any("/cosmos.gov.v1beta1.MsgVote", vote.encode_to_vec()))
            .unwrap();
        assert_eq!(decoded, DecodedMessage::Vote { voter: "cosmos1voter".into() });

        let claim = MsgWithdrawDelegatorReward {
            delegator_address: "cosmos1del".into(),
            validator_address: "cosmosvaloper1val".into(),
        };
        let decoded = decoder
            .decode(&encode_any(
                "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward",
                claim.encode_to_vec(),
            ))
            .unwrap();
        assert_eq!(decoded.label(), "Claim Rewards");

        let key = PubKey { key: vec![0x02, 0xab, 0xcd] };
        let decoded = decoder
            .decode(&encode_any("/cosmos.crypto.secp256k1.PubKey", key.encode_to_vec()))
            .unwrap();
        assert_eq!(decoded, DecodedMessage::PubKey { key_hex: "02abcd".into() });
    }

    #[test]
    fn test_unknown_type_url_is_not_an_error() {
        let decoded = WireDecoder::new()
            .decode(&encode_any("/cosmos.gov.v1beta1.MsgDeposit", vec![0x08, 0x01]))
            .unwrap();
        assert_eq!(decoded, DecodedMessage::unknown("Deposit"));
    }

    #[test]
    fn test_malformed_payload_for_known_type() {
        // Field 1 declared as a 16-byte string with only 2 bytes present.
        let decoded = WireDecoder::new()
            .decode(&encode_any("/cosmos.bank.v1beta1.MsgSend", vec![0x0a, 0x10, 0x61, 0x62]))
            .unwrap();
        assert_eq!(
            decoded,
            DecodedMessage::Unknown {
                label: "Send".into(),
                type_url: Some("/cosmos.bank.v1beta1.MsgSend".into()),
            }
        );
    }

    #[test]
    fn test_failure_stages() {
        let decoder = WireDecoder::new();
        let err = decoder.decode("!!! not base64 !!!").unwrap_err();
        assert_eq!(err.stage, DecodeStage::Base64);

        let err = decoder.decode("").unwrap_err();
        assert_eq!(err.stage, DecodeStage::Envelope);

        // Valid base64 of a truncated length-delimited field.
        let err = decoder.decode(&STANDARD.encode([0x0a, 0x40, 0x2f])).unwrap_err();
        assert_eq!(err.stage, DecodeStage::Envelope);

        let truncated = Any {
            type_url: "/cosmos.bank.v1beta1.MsgSend".into(),
            value: vec![0x0a, 0x10, 0x61, 0x62],
        };
        let err = decoder.decode_payload(&truncated).unwrap_err();
        assert_eq!(err.stage, DecodeStage::Payload);
        assert_eq!(err.snippet, "0a106162");
    }

    #[test]
    fn test_url_safe_alphabet_accepted() {
        let payload = MsgVote { proposal_id: 1, voter: "cosmos1v".into(), option: 1 };
        let any = Any {
            type_url: "/cosmos.gov.v1beta1.MsgVote".into(),
            value: payload.encode_to_vec(),
        };
        let input = URL_SAFE_NO_PAD.encode(any.encode_to_vec());
        assert!(WireDecoder::new().decode(&input).is_ok());
    }
}
