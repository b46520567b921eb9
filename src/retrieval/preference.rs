//! Advisory tier preference.
//!
//! The preferred tier is tried first on every call. It is a hint only:
//! each call still falls through the remaining tiers in standard order.
//! Updates use compare-and-swap so two calls that observed the same
//! preference cannot overwrite each other's correction.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::observability::metrics;
use crate::retrieval::types::RetrievalTier;

#[derive(Debug)]
pub struct TierPreference {
    rank: AtomicU8,
}

impl Default for TierPreference {
    fn default() -> Self {
        Self::new(RetrievalTier::PrimaryIndexedApi)
    }
}

impl TierPreference {
    pub fn new(tier: RetrievalTier) -> Self {
        Self {
            rank: AtomicU8::new(tier.rank()),
        }
    }

    pub fn current(&self) -> RetrievalTier {
        RetrievalTier::from_rank(self.rank.load(Ordering::Acquire)).unwrap_or(RetrievalTier::PrimaryIndexedApi)
    }

    /// Call order: the preferred tier, then the others in standard order.
    pub fn order(&self) -> (RetrievalTier, Vec<RetrievalTier>) {
        let preferred = self.current();
        let mut order = Vec::with_capacity(RetrievalTier::ALL.len());
        order.push(preferred);
        order.extend(RetrievalTier::ALL.into_iter().filter(|tier| *tier != preferred));
        (preferred, order)
    }

    /// Move the preference from `observed` to `tier`. Returns false if
    /// another call changed it since `observed` was read.
    pub fn promote(&self, observed: RetrievalTier, tier: RetrievalTier) -> bool {
        if observed == tier {
            return false;
        }
        let swapped = self
            .rank
            .compare_exchange(observed.rank(), tier.rank(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if swapped {
            tracing::info!(from = %observed, to = %tier, "Tier preference updated");
            metrics::record_preferred_tier(tier.rank());
        }
        swapped
    }

    /// Unconditional set, used by the startup probe.
    pub fn set(&self, tier: RetrievalTier) {
        self.rank.store(tier.rank(), Ordering::Release);
        metrics::record_preferred_tier(tier.rank());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_order_puts_preferred_first() {
        let preference = TierPreference::new(RetrievalTier::NodeRpcProxy);
        let (preferred, order) = preference.order();
        assert_eq!(preferred, RetrievalTier::NodeRpcProxy);
        assert_eq!(
            order,
            vec![
                RetrievalTier::NodeRpcProxy,
                RetrievalTier::PrimaryIndexedApi,
                RetrievalTier::ChainRestApi
            ]
        );
    }

    #[test]
    fn test_stale_promote_is_rejected() {
        let preference = TierPreference::default();
        assert!(preference.promote(RetrievalTier::PrimaryIndexedApi, RetrievalTier::ChainRestApi));
        assert!(!preference.promote(RetrievalTier::PrimaryIndexedApi, RetrievalTier::NodeRpcProxy));
        assert_eq!(preference.current(), RetrievalTier::ChainRestApi);
    }

    #[test]
    fn test_concurrent_promotes_have_one_winner() {
        let preference = Arc::new(TierPreference::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let preference = Arc::clone(&preference);
                std::thread::spawn(move || {
                    let target = if i % 2 == 0 {
                        RetrievalTier::ChainRestApi
                    } else {
                        RetrievalTier::NodeRpcProxy
                    };
                    preference.promote(RetrievalTier::PrimaryIndexedApi, target)
                })
            })
            .collect();
        let winners = handles.into_iter().filter_map(|h| h.join().ok()).filter(|won| *won).count();
        assert_eq!(winners, 1);
        assert_ne!(preference.current(), RetrievalTier::PrimaryIndexedApi);
    }
}
