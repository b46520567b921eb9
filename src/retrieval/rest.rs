//! Tier 2: chain REST API (`/cosmos/tx/v1beta1`).
//!
//! # Data Flow
//! ```text
//! address history:
//!     join3(sent, received, message)   each under its own deadline
//!         → FacetBatch per answering facet
//!         → tier fails only when all three facets fail
//! ```

use futures_util::future::join3;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::decoding::{TxEvent, TxHash};
use crate::lenient;
use crate::retrieval::types::{Facet, FacetBatch, RetrievalTier, UpstreamError};
use crate::retrieval::upstream::{endpoint, UpstreamClient};
use crate::transaction::assembler::json_fee;
use crate::transaction::{AssemblyInput, ExecutionResult, MessageSource, TransactionAssembler, TransactionRecord};

const TIER: RetrievalTier = RetrievalTier::ChainRestApi;
const TXS_PATH: [&str; 4] = ["cosmos", "tx", "v1beta1", "txs"];

/// `TxResponse` from the cosmos tx service.
#[derive(Debug, Deserialize)]
struct RestTxResponse {
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    height: u64,
    #[serde(default)]
    txhash: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    code: Option<u64>,
    #[serde(default)]
    raw_log: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    gas_wanted: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    gas_used: Option<u64>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    tx: Option<Value>,
    #[serde(default)]
    events: Vec<TxEvent>,
}

#[derive(Debug, Deserialize)]
struct RestTxEnvelope {
    #[serde(default)]
    tx_response: Option<RestTxResponse>,
    #[serde(default)]
    tx: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RestPagination {
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RestSearch {
    #[serde(default)]
    tx_responses: Vec<RestTxResponse>,
    #[serde(default)]
    pagination: Option<RestPagination>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    total: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ChainRestSource {
    client: UpstreamClient,
    base: Url,
}

impl ChainRestSource {
    pub fn new(client: UpstreamClient, base: Url) -> Self {
        Self { client, base }
    }

    pub async fn transaction(
        &self,
        hash: &TxHash,
        assembler: &TransactionAssembler,
    ) -> Result<TransactionRecord, UpstreamError> {
        let mut segments = TXS_PATH.to_vec();
        segments.push(hash.as_str());
        let url = endpoint(&self.base, &segments);
        let body: RestTxEnvelope = self.client.get_json(TIER, url.clone()).await?;
        let Some(response) = body.tx_response else {
            return Err(UpstreamError::NotFound {
                endpoint: url.to_string(),
            });
        };
        let mut input = to_input(response, body.tx);
        if input.hash.is_none() {
            input.hash = Some(hash.as_str().to_string());
        }
        assembler.assemble(input).map_err(|e| UpstreamError::Parse {
            endpoint: url.to_string(),
            message: e.to_string(),
        })
    }

    /// One facet query, newest first, offset 0.
    pub async fn facet(
        &self,
        address: &str,
        facet: Facet,
        limit: u32,
        assembler: &TransactionAssembler,
    ) -> Result<FacetBatch, UpstreamError> {
        let mut url = endpoint(&self.base, &TXS_PATH);
        url.query_pairs_mut()
            .append_pair("query", &format!("{}='{}'", facet.event_key(), address))
            .append_pair("pagination.limit", &limit.to_string())
            .append_pair("pagination.offset", "0")
            .append_pair("pagination.count_total", "true")
            .append_pair("order_by", "ORDER_BY_DESC");
        let body: RestSearch = self.client.get_json(TIER, url).await?;
        let total = body.pagination.and_then(|p| p.total).or(body.total);
        let records = assembler.assemble_all(
            body.tx_responses
                .into_iter()
                .map(|response| to_input(response, None)),
        );
        Ok(FacetBatch::new(facet, records, total))
    }

    /// All three facets concurrently. Facets that fail are logged and left
    /// out; the call fails only if none answered.
    pub async fn history(
        &self,
        address: &str,
        limit: u32,
        assembler: &TransactionAssembler,
    ) -> Result<Vec<FacetBatch>, UpstreamError> {
        let (sent, received, message) = join3(
            self.facet(address, Facet::Sent, limit, assembler),
            self.facet(address, Facet::Received, limit, assembler),
            self.facet(address, Facet::Message, limit, assembler),
        )
        .await;

        let mut batches = Vec::with_capacity(Facet::ALL.len());
        let mut first_error = None;
        for (facet, result) in Facet::ALL.into_iter().zip([sent, received, message]) {
            match result {
                Ok(batch) => batches.push(batch),
                Err(e) => {
                    tracing::warn!(facet = facet.as_str(), error = %e, "Facet query failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) if batches.is_empty() => Err(e),
            _ => Ok(batches),
        }
    }

    pub async fn probe(&self) -> bool {
        let url = endpoint(&self.base, &["cosmos", "base", "tendermint", "v1beta1", "node_info"]);
        matches!(self.client.probe(TIER, url).await, Ok(status) if status < 500)
    }
}

fn to_input(response: RestTxResponse, tx: Option<Value>) -> AssemblyInput {
    let tx = tx.or(response.tx);
    let fee = tx.as_ref().and_then(json_fee);
    let source = match tx {
        Some(tx) => MessageSource::Json(tx),
        None => MessageSource::Missing,
    };
    AssemblyInput {
        source,
        hash: response.txhash,
        height: Some(response.height).filter(|h| *h > 0),
        time: response.timestamp,
        execution: ExecutionResult {
            code: response.code,
            gas_used: response.gas_used,
            gas_wanted: response.gas_wanted,
            log: response.raw_log,
            events: response.events,
        },
        fee,
        ..AssemblyInput::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoding::MessageDecoder;
    use crate::transaction::TxStatus;
    use serde_json::json;

    #[test]
    fn test_rest_search_body() {
        let body: RestSearch = serde_json::from_value(json!({
            "txs": [],
            "tx_responses": [{
                "height": "15",
                "txhash": "CD".repeat(32),
                "code": 3,
                "gas_wanted": "200000",
                "gas_used": "80000",
                "timestamp": "2024-05-01T10:00:00Z",
                "tx": {
                    "@type": "/cosmos.tx.v1beta1.Tx",
                    "body": {"messages": [{
                        "@type": "/cosmos.bank.v1beta1.MsgSend",
                        "from_address": "cosmos1a",
                        "to_address": "cosmos1b",
                        "amount": [{"denom": "uatom", "amount": "5"}]
                    }], "memo": "rent"},
                    "auth_info": {"fee": {"amount": [{"denom": "uatom", "amount": "2"}], "gas_limit": "200000"}}
                },
                "events": []
            }],
            "pagination": null,
            "total": "41"
        }))
        .unwrap();
        assert_eq!(body.total, Some(41));

        let assembler = TransactionAssembler::new(MessageDecoder::new("cosmos", 1000));
        let response = body.tx_responses.into_iter().next().unwrap();
        let record = assembler.assemble(to_input(response, None)).unwrap();
        assert_eq!(record.height, 15);
        assert_eq!(record.status, TxStatus::Failed);
        assert_eq!(record.fee, "2uatom");
        assert_eq!(record.memo, "rent");
        assert_eq!(record.amount_summary, "5uatom");
        assert_eq!(record.hash.as_str(), "CD".repeat(32));
    }
}
