//! Tier 1: primary indexed API.
//!
//! `GET /transactions/{hash}` and
//! `GET /accounts/{address}/transactions?page=&limit=`. The indexer
//! paginates server-side, so its pages are returned as-is.

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::decoding::{Encoding, RawTransaction, TxEvent, TxHash};
use crate::lenient;
use crate::retrieval::types::{RetrievalTier, UpstreamError};
use crate::retrieval::upstream::{endpoint, UpstreamClient};
use crate::transaction::{AssemblyInput, ExecutionResult, MessageSource, Placeholders, TransactionAssembler, TransactionRecord};

const TIER: RetrievalTier = RetrievalTier::PrimaryIndexedApi;

/// Indexer transaction. Field names vary between indexer versions, hence
/// the aliases.
#[derive(Debug, Default, Deserialize)]
struct IndexedTx {
    #[serde(
        default,
        alias = "txhash",
        alias = "tx_hash",
        alias = "txHash",
        alias = "transactionHash"
    )]
    hash: Option<String>,
    #[serde(default, deserialize_with = "lenient::u64_or_zero", alias = "block_height")]
    height: u64,
    #[serde(default, alias = "timestamp", alias = "block_time")]
    time: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    code: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    gas_used: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    gas_wanted: Option<u64>,
    #[serde(default)]
    fee: Option<Value>,
    #[serde(default)]
    memo: Option<String>,
    /// Base64 transaction bytes.
    #[serde(default, alias = "raw", alias = "tx_raw", alias = "raw_tx")]
    tx: Option<Value>,
    #[serde(default)]
    messages: Vec<Value>,
    #[serde(default)]
    tx_result: Option<ExecutionResult>,
    #[serde(default)]
    events: Vec<TxEvent>,
    #[serde(default, alias = "from", alias = "from_address")]
    sender: Option<String>,
    #[serde(default, alias = "to", alias = "to_address")]
    recipient: Option<String>,
    #[serde(default)]
    amount: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct IndexedPagination {
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct IndexedHistory {
    #[serde(default, alias = "data", alias = "items", alias = "txs")]
    transactions: Vec<IndexedTx>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    total: Option<u64>,
    #[serde(default)]
    pagination: Option<IndexedPagination>,
}

/// Records for one server-side page plus the indexer's total, if any.
#[derive(Debug)]
pub struct IndexedPage {
    pub records: Vec<TransactionRecord>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct IndexedApiSource {
    client: UpstreamClient,
    base: Url,
}

impl IndexedApiSource {
    pub fn new(client: UpstreamClient, base: Url) -> Self {
        Self { client, base }
    }

    pub async fn transaction(
        &self,
        hash: &TxHash,
        assembler: &TransactionAssembler,
    ) -> Result<TransactionRecord, UpstreamError> {
        let url = endpoint(&self.base, &["transactions", hash.as_str()]);
        let body: Value = self.client.get_json(TIER, url.clone()).await?;
        let payload = ["transaction", "tx", "data"]
            .iter()
            .find_map(|key| body.get(*key).filter(|v| v.is_object()))
            .unwrap_or(&body);
        if !payload.is_object() || payload.as_object().is_some_and(|o| o.is_empty()) {
            return Err(UpstreamError::NotFound {
                endpoint: url.to_string(),
            });
        }
        let tx: IndexedTx = serde_json::from_value(payload.clone()).map_err(|e| UpstreamError::Parse {
            endpoint: url.to_string(),
            message: e.to_string(),
        })?;
        let mut input = to_input(tx);
        if input.hash.is_none() {
            input.hash = Some(hash.as_str().to_string());
        }
        assembler.assemble(input).map_err(|e| UpstreamError::Parse {
            endpoint: url.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn history(
        &self,
        address: &str,
        page: u32,
        page_size: u32,
        assembler: &TransactionAssembler,
    ) -> Result<IndexedPage, UpstreamError> {
        let mut url = endpoint(&self.base, &["accounts", address, "transactions"]);
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("limit", &page_size.to_string());
        let body: IndexedHistory = self.client.get_json(TIER, url).await?;
        let total = body.pagination.and_then(|p| p.total).or(body.total);
        let records = assembler.assemble_all(body.transactions.into_iter().map(to_input));
        Ok(IndexedPage { records, total })
    }

    /// Any answer below 500 means the indexer is up.
    pub async fn probe(&self) -> bool {
        let url = endpoint(&self.base, &["transactions", &"0".repeat(64)]);
        matches!(self.client.probe(TIER, url).await, Ok(status) if status < 500)
    }
}

fn to_input(tx: IndexedTx) -> AssemblyInput {
    let source = match (&tx.tx, tx.messages.first()) {
        (Some(Value::String(data)), _) if !data.is_empty() => {
            MessageSource::Encoded(RawTransaction::new(data.clone(), Encoding::Base64))
        }
        (Some(json @ Value::Object(_)), _) => MessageSource::Json(json.clone()),
        (_, Some(message)) => MessageSource::Json(message.clone()),
        _ => MessageSource::Missing,
    };
    let mut execution = tx.tx_result.unwrap_or_default();
    execution.gas_used = execution.gas_used.or(tx.gas_used);
    execution.gas_wanted = execution.gas_wanted.or(tx.gas_wanted);
    if execution.events.is_empty() {
        execution.events = tx.events;
    }

    AssemblyInput {
        source,
        hash: tx.hash,
        height: Some(tx.height).filter(|h| *h > 0),
        time: tx.time,
        execution,
        status: tx.status,
        legacy_code: tx.code,
        fee: tx.fee.as_ref().and_then(render_amount),
        memo: tx.memo,
        placeholders: Placeholders {
            sender: tx.sender,
            recipient: tx.recipient,
            amount: tx.amount.as_ref().and_then(render_amount),
        },
    }
}

/// Render a fee or amount given as a string, a coin or a list of coins.
fn render_amount(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => {
            if let Some(inner) = map.get("amount").filter(|v| v.is_array()) {
                return render_amount(inner);
            }
            let amount = map.get("amount").and_then(|a| match a {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })?;
            let denom = map.get("denom").and_then(Value::as_str).unwrap_or_default();
            Some(format!("{}{}", amount, denom))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(render_amount).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(","))
            }
        }
        _ => None,
    }
}
