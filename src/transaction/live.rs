//! Adapter for `tm.event='Tx'` subscription payloads.
//!
//! The live-feed collaborator owns the WebSocket; it hands each JSON frame
//! here and receives a [`TransactionRecord`] for frames that carry a
//! transaction result. Block time is not part of the event, so `time` is
//! left empty.

use serde::Deserialize;
use serde_json::Value;

use crate::decoding::RawTransaction;
use crate::lenient;
use crate::transaction::assembler::{AssemblyInput, ExecutionResult, MessageSource, TransactionAssembler};
use crate::transaction::record::TransactionRecord;

/// `TxResult` as found under `data.value` of a Tx event.
#[derive(Debug, Deserialize)]
struct EventTxResult {
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    height: u64,
    #[serde(default)]
    tx: Option<String>,
    #[serde(default)]
    result: ExecutionResult,
}

const TX_RESULT_POINTERS: [&str; 3] = [
    "/result/data/value/TxResult",
    "/data/value/TxResult",
    "/value/TxResult",
];

const TX_HASH_POINTERS: [&str; 2] = ["/result/events/tx.hash/0", "/events/tx.hash/0"];

/// Convert one subscription frame; `None` for frames without a transaction
/// (subscription acks, new-block events, malformed payloads).
pub fn record_from_event(assembler: &TransactionAssembler, frame: &Value) -> Option<TransactionRecord> {
    let payload = TX_RESULT_POINTERS
        .iter()
        .find_map(|pointer| frame.pointer(pointer))?;
    let tx_result: EventTxResult = match serde_json::from_value(payload.clone()) {
        Ok(result) => result,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed Tx event");
            return None;
        }
    };
    let data = tx_result.tx.filter(|tx| !tx.is_empty())?;

    let mut input = AssemblyInput::new(MessageSource::Encoded(
        RawTransaction::base64(data).with_height(tx_result.height),
    ));
    input.hash = TX_HASH_POINTERS
        .iter()
        .find_map(|pointer| frame.pointer(pointer).and_then(Value::as_str))
        .map(str::to_string);
    input.execution = tx_result.result;
    match assembler.assemble(input) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unidentifiable Tx event");
            None
        }
    }
}
