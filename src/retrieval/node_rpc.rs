//! Tier 3: raw node RPC through the same-origin proxy.
//!
//! # Responsibilities
//! - Point lookups via `/tx?hash=0x<HASH>`
//! - Address history by scanning recent blocks, newest first
//!
//! # Data Flow
//! ```text
//! /status ─▶ latest height
//!     └─▶ blocks(): lazy stream, windows of 20 heights
//!             /blockchain?minHeight=&maxHeight=   skip metas with num_txs = 0
//!             /block?height=                      tx list
//!     └─▶ per tx: SHA-256 → /tx?hash=0x.. → assemble → classify facets
//! ```
//!
//! # Design Decisions
//! - The scan is sequential and stops as soon as enough matches are found
//! - Dropping the history future abandons the scan between any two calls
//! - A transaction whose `/tx` lookup fails is skipped, not guessed at

use std::collections::VecDeque;
use std::pin::pin;

use futures_util::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::decoding::wire::decode_base64;
use crate::decoding::{RawTransaction, TxHash};
use crate::lenient;
use crate::retrieval::types::{Facet, FacetBatch, RetrievalTier, UpstreamError};
use crate::retrieval::upstream::{endpoint, UpstreamClient};
use crate::transaction::{AssemblyInput, ExecutionResult, MessageSource, TransactionAssembler, TransactionRecord};

const TIER: RetrievalTier = RetrievalTier::NodeRpcProxy;

/// Block metas returned per `/blockchain` call by the node.
pub const META_WINDOW: u64 = 20;

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    #[serde(deserialize_with = "lenient::u64_or_zero")]
    latest_block_height: u64,
}

#[derive(Debug, Default, Deserialize)]
struct Header {
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    height: u64,
    #[serde(default)]
    time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockMeta {
    #[serde(default)]
    header: Header,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    num_txs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BlockchainResult {
    #[serde(default)]
    block_metas: Vec<BlockMeta>,
}

#[derive(Debug, Deserialize)]
struct BlockResult {
    block: Block,
}

#[derive(Debug, Deserialize)]
struct Block {
    #[serde(default)]
    header: Header,
    #[serde(default)]
    data: BlockData,
}

#[derive(Debug, Default, Deserialize)]
struct BlockData {
    #[serde(default)]
    txs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    hash: Option<String>,
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    height: u64,
    #[serde(default)]
    tx: Option<String>,
    #[serde(default)]
    tx_result: ExecutionResult,
}

/// A block with its raw transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedBlock {
    pub height: u64,
    pub time: Option<String>,
    pub txs: Vec<String>,
}

struct ScanState {
    next_high: u64,
    lowest: u64,
    pending: VecDeque<u64>,
}

#[derive(Debug, Clone)]
pub struct NodeRpcSource {
    client: UpstreamClient,
    base: Url,
}

impl NodeRpcSource {
    pub fn new(client: UpstreamClient, base: Url) -> Self {
        Self { client, base }
    }

    async fn call<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, UpstreamError> {
        let mut url = endpoint(&self.base, &[path]);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        let endpoint = url.to_string();
        let (status, body) = self.client.get_text(TIER, url).await?;
        let http_ok = (200..300).contains(&status);

        let envelope: RpcEnvelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !http_ok => return Err(UpstreamError::Status { endpoint, status }),
            Err(e) => {
                return Err(UpstreamError::Parse {
                    endpoint,
                    message: e.to_string(),
                })
            }
        };
        if let Some(error) = envelope.error {
            let detail = format!("{} {}", error.message, error.data.unwrap_or_default());
            if detail.to_ascii_lowercase().contains("not found") {
                return Err(UpstreamError::NotFound { endpoint });
            }
            if !http_ok {
                return Err(UpstreamError::Status { endpoint, status });
            }
            return Err(UpstreamError::Parse {
                endpoint,
                message: format!("rpc error {}: {}", error.code, detail.trim()),
            });
        }
        match envelope.result {
            Some(result) => Ok(result),
            None if !http_ok => Err(UpstreamError::Status { endpoint, status }),
            None => Err(UpstreamError::Parse {
                endpoint,
                message: "response carries neither result nor error".to_string(),
            }),
        }
    }

    pub async fn latest_height(&self) -> Result<u64, UpstreamError> {
        let status: StatusResult = self.call("status", &[]).await?;
        Ok(status.sync_info.latest_block_height)
    }

    async fn block_metas(&self, min: u64, max: u64) -> Result<Vec<BlockMeta>, UpstreamError> {
        let result: BlockchainResult = self
            .call("blockchain", &[("minHeight", min.to_string()), ("maxHeight", max.to_string())])
            .await?;
        Ok(result.block_metas)
    }

    pub async fn block(&self, height: u64) -> Result<ScannedBlock, UpstreamError> {
        let result: BlockResult = self.call("block", &[("height", height.to_string())]).await?;
        let header = result.block.header;
        Ok(ScannedBlock {
            height: if header.height > 0 { header.height } else { height },
            time: header.time,
            txs: result.block.data.txs.unwrap_or_default(),
        })
    }

    async fn tx(&self, hash: &TxHash) -> Result<TxResult, UpstreamError> {
        self.call("tx", &[("hash", format!("0x{}", hash))]).await
    }

    /// Blocks from `latest` down, at most `max_blocks` heights, skipping
    /// blocks the node reports as empty. If `/blockchain` is unavailable
    /// every height in the window is fetched.
    pub fn blocks(&self, latest: u64, max_blocks: u64) -> impl Stream<Item = Result<ScannedBlock, UpstreamError>> + '_ {
        let lowest = latest.saturating_sub(max_blocks.saturating_sub(1)).max(1);
        let state = ScanState {
            next_high: if max_blocks == 0 { 0 } else { latest },
            lowest,
            pending: VecDeque::new(),
        };
        stream::unfold(state, move |mut state| async move {
            loop {
                if let Some(height) = state.pending.pop_front() {
                    let block = self.block(height).await;
                    return Some((block, state));
                }
                if state.next_high < state.lowest {
                    return None;
                }
                let high = state.next_high;
                let low = high.saturating_sub(META_WINDOW - 1).max(state.lowest);
                state.next_high = low - 1;

                match self.block_metas(low, high).await {
                    Ok(metas) => {
                        let mut heights: Vec<u64> = metas
                            .into_iter()
                            .filter(|meta| meta.num_txs != Some(0))
                            .map(|meta| meta.header.height)
                            .filter(|height| (low..=high).contains(height))
                            .collect();
                        heights.sort_unstable_by(|a, b| b.cmp(a));
                        heights.dedup();
                        tracing::debug!(low, high, non_empty = heights.len(), "Scanned block metas");
                        state.pending.extend(heights);
                    }
                    Err(e) => {
                        tracing::debug!(low, high, error = %e, "Block metas unavailable, fetching every height");
                        state.pending.extend((low..=high).rev());
                    }
                }
            }
        })
    }

    pub async fn transaction(
        &self,
        hash: &TxHash,
        assembler: &TransactionAssembler,
    ) -> Result<TransactionRecord, UpstreamError> {
        let result = self.tx(hash).await?;
        let time = match self.block_metas(result.height, result.height).await {
            Ok(metas) => metas
                .into_iter()
                .find(|meta| meta.header.height == result.height)
                .and_then(|meta| meta.header.time),
            Err(e) => {
                tracing::debug!(height = result.height, error = %e, "Block time unavailable");
                None
            }
        };
        let mut input = to_input(result, time);
        if input.hash.is_none() {
            input.hash = Some(hash.as_str().to_string());
        }
        assembler.assemble(input).map_err(|e| UpstreamError::Parse {
            endpoint: endpoint(&self.base, &["tx"]).to_string(),
            message: e.to_string(),
        })
    }

    /// Scan recent blocks for transactions involving `address` until
    /// `wanted` matches are found or `max_blocks` heights were covered.
    pub async fn history(
        &self,
        address: &str,
        wanted: usize,
        max_blocks: u64,
        assembler: &TransactionAssembler,
    ) -> Result<Vec<FacetBatch>, UpstreamError> {
        let latest = self.latest_height().await?;
        let mut sent = Vec::new();
        let mut received = Vec::new();
        let mut message = Vec::new();
        let mut matched = 0usize;

        let mut blocks = pin!(self.blocks(latest, max_blocks));
        while let Some(block) = blocks.next().await {
            let block = match block {
                Ok(block) => block,
                Err(e @ (UpstreamError::Timeout { .. } | UpstreamError::Transport { .. })) => {
                    tracing::warn!(error = %e, "Node unreachable, ending block scan");
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable block");
                    continue;
                }
            };

            for raw in &block.txs {
                let Ok(bytes) = decode_base64(raw) else {
                    continue;
                };
                let hash = TxHash::compute(&bytes);
                let result = match self.tx(&hash).await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::debug!(hash = %hash, error = %e, "Skipping transaction without result");
                        continue;
                    }
                };
                let mentioned = result
                    .tx_result
                    .events
                    .iter()
                    .any(|event| event.mentions(address));
                let mut input = to_input(result, block.time.clone());
                input.hash = Some(hash.into_string());
                input.height = Some(block.height);
                let record = match assembler.assemble(input) {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::debug!(error = %e, "Skipping unassemblable transaction");
                        continue;
                    }
                };

                let is_sent = record.is_sent_by(address);
                let is_received = record.is_received_by(address);
                if !(is_sent || is_received || mentioned) {
                    continue;
                }
                matched += 1;
                if is_sent {
                    sent.push(record.clone());
                }
                if is_received {
                    received.push(record.clone());
                }
                if mentioned {
                    message.push(record);
                }
            }

            if matched >= wanted {
                tracing::debug!(height = block.height, matched, "Block scan satisfied");
                break;
            }
        }

        Ok(vec![
            FacetBatch::new(Facet::Sent, sent, None),
            FacetBatch::new(Facet::Received, received, None),
            FacetBatch::new(Facet::Message, message, None),
        ])
    }

    pub async fn probe(&self) -> bool {
        let url = endpoint(&self.base, &["status"]);
        matches!(self.client.probe(TIER, url).await, Ok(status) if status < 500)
    }
}

fn to_input(result: TxResult, time: Option<String>) -> AssemblyInput {
    let source = match result.tx {
        Some(data) if !data.is_empty() => {
            MessageSource::Encoded(RawTransaction::base64(data).with_height(result.height))
        }
        _ => MessageSource::Missing,
    };
    AssemblyInput {
        source,
        hash: result.hash,
        height: Some(result.height).filter(|h| *h > 0),
        time,
        execution: result.tx_result,
        ..AssemblyInput::default()
    }
}
