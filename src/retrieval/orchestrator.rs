//! Retrieval orchestrator: tiered fallback over the three sources.
//!
//! # Responsibilities
//! - Point lookup by hash with a typed not-found / unreachable error
//! - Address history that degrades to an empty page, never an error
//! - Advisory tier preference, seeded by a startup probe
//!
//! # Data Flow
//! ```text
//! call ─▶ preference.order() ─▶ [preferred, rest in standard order]
//!     for each configured tier:
//!         Ok  ─▶ settle preference, return
//!         Err ─▶ log, record failure, next tier
//!     exhausted ─▶ settle preference ─▶ NotFound | Unreachable | empty page
//!
//! settle: a preferred tier that timed out or was unreachable hands over
//! to the serving tier (or, after exhaustion, the next configured one).
//! ```

use std::sync::Arc;

use crate::config::{ExplorerConfig, RetrievalConfig};
use crate::decoding::TxHash;
use crate::observability::metrics;
use crate::retrieval::indexed::IndexedApiSource;
use crate::retrieval::merge;
use crate::retrieval::node_rpc::NodeRpcSource;
use crate::retrieval::preference::TierPreference;
use crate::retrieval::rest::ChainRestSource;
use crate::retrieval::types::{
    RetrievalError, RetrievalResult, RetrievalTier, TierFailure, TransactionPage, UpstreamError,
};
use crate::retrieval::upstream::{parse_base, UpstreamClient};
use crate::transaction::{TransactionAssembler, TransactionRecord};

pub struct RetrievalOrchestrator {
    indexed: Option<IndexedApiSource>,
    rest: Option<ChainRestSource>,
    node: Option<NodeRpcSource>,
    assembler: TransactionAssembler,
    preference: Arc<TierPreference>,
    settings: RetrievalConfig,
}

impl RetrievalOrchestrator {
    pub fn from_config(config: &ExplorerConfig) -> RetrievalResult<Self> {
        let client = UpstreamClient::new(&config.retrieval).map_err(|e| RetrievalError::Setup(e.to_string()))?;
        let base = |raw: &Option<String>| -> RetrievalResult<Option<url::Url>> {
            raw.as_deref()
                .map(|raw| parse_base(raw).map_err(RetrievalError::Setup))
                .transpose()
        };
        let upstreams = &config.upstreams;
        let orchestrator = Self {
            indexed: base(&upstreams.indexed_api_url)?.map(|url| IndexedApiSource::new(client.clone(), url)),
            rest: base(&upstreams.chain_rest_url)?.map(|url| ChainRestSource::new(client.clone(), url)),
            node: base(&upstreams.node_rpc_url)?.map(|url| NodeRpcSource::new(client.clone(), url)),
            assembler: TransactionAssembler::from_config(&config.decoding),
            preference: Arc::new(TierPreference::default()),
            settings: config.retrieval.clone(),
        };
        tracing::info!(tiers = ?orchestrator.configured_tiers(), "Retrieval orchestrator ready");
        Ok(orchestrator)
    }

    pub fn preference(&self) -> Arc<TierPreference> {
        Arc::clone(&self.preference)
    }

    pub fn configured_tiers(&self) -> Vec<RetrievalTier> {
        RetrievalTier::ALL
            .into_iter()
            .filter(|tier| self.is_configured(*tier))
            .collect()
    }

    fn is_configured(&self, tier: RetrievalTier) -> bool {
        match tier {
            RetrievalTier::PrimaryIndexedApi => self.indexed.is_some(),
            RetrievalTier::ChainRestApi => self.rest.is_some(),
            RetrievalTier::NodeRpcProxy => self.node.is_some(),
        }
    }

    /// Probe tiers in standard order and prefer the first reachable one.
    pub async fn probe_tiers(&self) -> Option<RetrievalTier> {
        for tier in self.configured_tiers() {
            let up = match tier {
                RetrievalTier::PrimaryIndexedApi => match &self.indexed {
                    Some(source) => source.probe().await,
                    None => false,
                },
                RetrievalTier::ChainRestApi => match &self.rest {
                    Some(source) => source.probe().await,
                    None => false,
                },
                RetrievalTier::NodeRpcProxy => match &self.node {
                    Some(source) => source.probe().await,
                    None => false,
                },
            };
            if up {
                tracing::info!(tier = %tier, "Tier probe succeeded");
                self.preference.set(tier);
                return Some(tier);
            }
            tracing::warn!(tier = %tier, "Tier probe failed");
        }
        tracing::warn!("No retrieval tier reachable at startup");
        None
    }

    /// Look up one transaction by hash (with or without `0x`).
    pub async fn transaction(&self, hash: &str) -> RetrievalResult<TransactionRecord> {
        let Some(hash) = TxHash::parse(hash) else {
            return Err(RetrievalError::InvalidHash(hash.to_string()));
        };

        let (observed, order) = self.preference.order();
        let mut attempts = Vec::new();
        for tier in order {
            let result = match tier {
                RetrievalTier::PrimaryIndexedApi => match &self.indexed {
                    Some(source) => source.transaction(&hash, &self.assembler).await,
                    None => continue,
                },
                RetrievalTier::ChainRestApi => match &self.rest {
                    Some(source) => source.transaction(&hash, &self.assembler).await,
                    None => continue,
                },
                RetrievalTier::NodeRpcProxy => match &self.node {
                    Some(source) => source.transaction(&hash, &self.assembler).await,
                    None => continue,
                },
            };
            match result {
                Ok(record) => {
                    self.settle(observed, Some(tier), &attempts);
                    return Ok(record);
                }
                Err(error) => {
                    log_fallthrough("transaction", tier, &error);
                    attempts.push(TierFailure { tier, error });
                }
            }
        }

        self.settle(observed, None, &attempts);
        metrics::record_tier_exhausted("transaction");
        let hash = hash.into_string();
        if !attempts.is_empty() && attempts.iter().all(|a| a.error.is_not_found()) {
            Err(RetrievalError::NotFound { hash })
        } else {
            Err(RetrievalError::Unreachable { hash, attempts })
        }
    }

    /// One page of an address's history. `page` is 1-based; `None` or 0
    /// means the first page. An exhausted tier list yields an empty page.
    pub async fn address_history(&self, address: &str, page: Option<u32>, page_size: Option<u32>) -> TransactionPage {
        let page = page.unwrap_or(1).max(1);
        let page_size = page_size
            .unwrap_or(self.settings.default_page_size)
            .clamp(1, self.settings.max_page_size.max(1));
        let address = address.trim();
        if address.is_empty() {
            return TransactionPage::empty(page, page_size);
        }

        let window = self.settings.max_facet_window.max(1);
        let wanted = (page as u64 * page_size as u64).min(window as u64) as u32;

        let (observed, order) = self.preference.order();
        let mut attempts = Vec::new();
        for tier in order {
            let result = match tier {
                RetrievalTier::PrimaryIndexedApi => match &self.indexed {
                    Some(source) => source
                        .history(address, page, page_size, &self.assembler)
                        .await
                        .map(|p| merge::server_page(p.records, p.total, page, page_size)),
                    None => continue,
                },
                RetrievalTier::ChainRestApi => match &self.rest {
                    Some(source) => source
                        .history(address, wanted, &self.assembler)
                        .await
                        .map(|batches| merge::merge_facets(batches, page, page_size, window)),
                    None => continue,
                },
                RetrievalTier::NodeRpcProxy => match &self.node {
                    Some(source) => source
                        .history(address, wanted as usize, self.settings.max_blocks_to_scan, &self.assembler)
                        .await
                        .map(|batches| merge::merge_facets(batches, page, page_size, window)),
                    None => continue,
                },
            };
            match result {
                Ok(result) => {
                    self.settle(observed, Some(tier), &attempts);
                    tracing::debug!(
                        tier = %tier,
                        records = result.records.len(),
                        total = result.pagination.total_estimate,
                        "Address history served"
                    );
                    return result;
                }
                Err(error) => {
                    log_fallthrough("address_history", tier, &error);
                    attempts.push(TierFailure { tier, error });
                }
            }
        }

        self.settle(observed, None, &attempts);
        metrics::record_tier_exhausted("address_history");
        tracing::warn!(address, attempts = attempts.len(), "All tiers failed, returning empty history");
        TransactionPage::empty(page, page_size)
    }

    /// Demote the preferred tier when it is unconfigured or timed out or
    /// was unreachable during this call. The tier that served the call
    /// takes over; after total exhaustion the next configured tier does.
    /// Status and parse failures leave the preference alone.
    fn settle(&self, observed: RetrievalTier, served: Option<RetrievalTier>, attempts: &[TierFailure]) {
        let preferred_down = !self.is_configured(observed)
            || attempts.iter().any(|a| a.tier == observed && a.error.demotes_tier());
        if !preferred_down {
            return;
        }
        if let Some(tier) = served.or_else(|| self.successor(observed)) {
            self.preference.promote(observed, tier);
        }
    }

    /// Next configured tier after `tier` in standard order, wrapping around.
    fn successor(&self, tier: RetrievalTier) -> Option<RetrievalTier> {
        RetrievalTier::ALL
            .into_iter()
            .cycle()
            .skip(tier.rank() as usize)
            .take(RetrievalTier::ALL.len() - 1)
            .find(|candidate| self.is_configured(*candidate))
    }
}

fn log_fallthrough(operation: &'static str, tier: RetrievalTier, error: &UpstreamError) {
    if error.is_not_found() {
        tracing::debug!(operation, tier = %tier, error = %error, "Tier has no result, trying next tier");
    } else {
        tracing::warn!(operation, tier = %tier, error = %error, "Tier failed, trying next tier");
    }
}
