//! Decoder failure signal.
//!
//! A [`DecodeFailure`] never leaves the decoding pipeline: it only tells the
//! pipeline which fallback to run next.

use std::fmt;

use thiserror::Error;

/// Maximum characters of offending input kept for diagnosis.
const SNIPPET_LEN: usize = 64;

/// Stage of structured decoding that rejected the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    Base64,
    Envelope,
    Payload,
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            DecodeStage::Base64 => "base64",
            DecodeStage::Envelope => "envelope",
            DecodeStage::Payload => "payload",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("decode failed at {stage} stage: {reason} (input: {snippet:?})")]
pub struct DecodeFailure {
    pub stage: DecodeStage,
    pub reason: String,
    pub snippet: String,
}

impl DecodeFailure {
    pub fn new(stage: DecodeStage, reason: impl fmt::Display, input: &str) -> Self {
        Self {
            stage,
            reason: reason.to_string(),
            snippet: snippet(input),
        }
    }
}

/// First characters of `input`, cut on a char boundary.
pub fn snippet(input: &str) -> String {
    input.chars().take(SNIPPET_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_stage_and_snippet() {
        let failure = DecodeFailure::new(DecodeStage::Base64, "invalid byte", &"é".repeat(100));
        assert_eq!(failure.snippet.chars().count(), SNIPPET_LEN);
        let text = failure.to_string();
        assert!(text.starts_with("decode failed at base64 stage: invalid byte"));
    }
}
