//! Tier fallthrough, facet merge and exhaustion semantics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use prost::Message;
use serde_json::json;

use tx_explorer::decoding::compute_hash;
use tx_explorer::decoding::proto::{Any, Coin, MsgSend, TxBody, TxRaw};
use tx_explorer::retrieval::{RetrievalError, RetrievalOrchestrator, RetrievalTier};
use tx_explorer::transaction::TxStatus;

mod common;

const ME: &str = "cosmos1me";

#[tokio::test]
async fn test_all_tiers_failing() {
    let addr = common::start_static_upstream(|_| (500, "{}".to_string())).await;
    let orchestrator = RetrievalOrchestrator::from_config(&common::config_for(addr, true, true, true)).unwrap();

    let page = orchestrator.address_history(ME, None, None).await;
    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["records"], json!([]));
    assert_eq!(json["pagination"]["total"], 0);
    assert_eq!(json["pagination"]["pages"], 1);

    let err = orchestrator.transaction(&common::hash_for(1)).await.unwrap_err();
    match err {
        RetrievalError::Unreachable { hash, attempts } => {
            assert_eq!(hash, common::hash_for(1));
            assert_eq!(attempts.len(), 3);
        }
        other => panic!("expected Unreachable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_hash_rejected_before_any_call() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let addr = common::start_static_upstream(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        (500, "{}".to_string())
    })
    .await;
    let orchestrator = RetrievalOrchestrator::from_config(&common::config_for(addr, true, true, true)).unwrap();

    let err = orchestrator.transaction("0x1234").await.unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidHash(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_not_found_on_every_tier() {
    let addr = common::start_static_upstream(|target| {
        if target.starts_with("/rpc/tx") {
            let hash = common::query_param(target, "hash").unwrap_or_default();
            (500, common::rpc_not_found(&hash))
        } else {
            (404, r#"{"code":5,"message":"tx not found"}"#.to_string())
        }
    })
    .await;
    let orchestrator = RetrievalOrchestrator::from_config(&common::config_for(addr, true, true, true)).unwrap();

    let err = orchestrator.transaction(&format!("0x{}", common::hash_for(9).to_lowercase())).await.unwrap_err();
    match err {
        RetrievalError::NotFound { hash } => assert_eq!(hash, common::hash_for(9)),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rest_facets_merge_after_indexed_failure() {
    let addr = common::start_static_upstream(|target| {
        if target.starts_with("/indexed") {
            return (503, "{}".to_string());
        }
        if !target.starts_with("/rest/cosmos/tx/v1beta1/txs?") {
            return (404, "{}".to_string());
        }
        let query = common::query_param(target, "query").unwrap_or_default();
        let responses: Vec<_> = if query == format!("transfer.sender='{}'", ME) {
            (0..5).map(|i| common::rest_tx(i, 100 + i as u64, ME, "cosmos1other")).collect()
        } else if query == format!("transfer.recipient='{}'", ME) {
            // Ids 3 and 4 overlap with the sent facet.
            (3..8).map(|i| common::rest_tx(i, 100 + i as u64, ME, "cosmos1other")).collect()
        } else {
            Vec::new()
        };
        let total = responses.len().to_string();
        (200, json!({"tx_responses": responses, "pagination": {"total": total}}).to_string())
    })
    .await;
    let orchestrator = RetrievalOrchestrator::from_config(&common::config_for(addr, true, true, false)).unwrap();

    let page = orchestrator.address_history(ME, Some(1), Some(20)).await;
    assert_eq!(page.records.len(), 8);
    assert!(page.pagination.total_estimate >= 8);
    let heights: Vec<u64> = page.records.iter().map(|r| r.height).collect();
    assert_eq!(heights, vec![107, 106, 105, 104, 103, 102, 101, 100]);
    // A 503 is a per-call failure; the indexer stays preferred.
    assert_eq!(orchestrator.preference().current(), RetrievalTier::PrimaryIndexedApi);

    let second = orchestrator.address_history(ME, Some(2), Some(5)).await;
    assert_eq!(second.records.len(), 3);
    assert_eq!(second.pagination.page, 2);

    let beyond = orchestrator.address_history(ME, Some(9), Some(5)).await;
    assert!(beyond.records.is_empty());
}

#[tokio::test]
async fn test_one_failing_facet_does_not_fail_tier() {
    let addr = common::start_static_upstream(|target| {
        let query = common::query_param(target, "query").unwrap_or_default();
        if query.starts_with("message.sender") {
            return (500, "{}".to_string());
        }
        let responses = vec![common::rest_tx(1, 10, ME, "cosmos1x")];
        (200, json!({"tx_responses": responses, "total": "1"}).to_string())
    })
    .await;
    let orchestrator = RetrievalOrchestrator::from_config(&common::config_for(addr, false, true, false)).unwrap();

    let page = orchestrator.address_history(ME, None, None).await;
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].sender_summary, ME);
}

#[tokio::test]
async fn test_indexed_tier_serves_page_directly() {
    let addr = common::start_static_upstream(|target| {
        if target.starts_with(&format!("/indexed/accounts/{}/transactions?", ME)) {
            assert_eq!(common::query_param(target, "page").as_deref(), Some("2"));
            assert_eq!(common::query_param(target, "limit").as_deref(), Some("10"));
            let txs = json!([
                {"hash": common::hash_for(1), "height": 50, "status": "success", "messages": [
                    {"@type": "/cosmos.bank.v1beta1.MsgSend", "from_address": ME, "to_address": "cosmos1b",
                     "amount": [{"denom": "uatom", "amount": "3"}]}
                ]},
                {"hash": common::hash_for(2), "height": 60, "code": 7}
            ]);
            return (200, json!({"transactions": txs, "pagination": {"total": 42}}).to_string());
        }
        (500, "{}".to_string())
    })
    .await;
    let orchestrator = RetrievalOrchestrator::from_config(&common::config_for(addr, true, true, true)).unwrap();

    let page = orchestrator.address_history(ME, Some(2), Some(10)).await;
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[0].height, 60);
    assert_eq!(page.records[0].status, TxStatus::Failed);
    assert_eq!(page.records[1].amount_summary, "3uatom");
    assert_eq!(page.pagination.total_estimate, 42);
    assert_eq!(page.pagination.pages, 5);
    assert_eq!(orchestrator.preference().current(), RetrievalTier::PrimaryIndexedApi);
}

#[tokio::test]
async fn test_timeout_falls_through_to_next_tier() {
    let hash = common::hash_for(4);
    let expected = hash.clone();
    let addr = common::start_upstream(move |target| {
        let hash = expected.clone();
        async move {
            if target.starts_with("/indexed") {
                tokio::time::sleep(Duration::from_secs(5)).await;
                return (200, "{}".to_string());
            }
            if target == format!("/rest/cosmos/tx/v1beta1/txs/{}", hash) {
                return (200, json!({"tx_response": common::rest_tx(4, 77, ME, "cosmos1b")}).to_string());
            }
            (404, "{}".to_string())
        }
    })
    .await;
    let mut config = common::config_for(addr, true, true, false);
    config.retrieval.timeout_secs = 1;
    let orchestrator = RetrievalOrchestrator::from_config(&config).unwrap();

    let record = orchestrator.transaction(&hash).await.unwrap();
    assert_eq!(record.hash.as_str(), hash);
    assert_eq!(record.height, 77);
    assert_eq!(record.fee, "500uatom");
    assert_eq!(record.memo, "tx-4");
    assert_eq!(orchestrator.preference().current(), RetrievalTier::ChainRestApi);
}

#[tokio::test]
async fn test_unreachable_preferred_tier_is_demoted() {
    let addr = common::start_static_upstream(|target| {
        let responses = vec![common::rest_tx(1, 10, ME, "cosmos1x")];
        if target.starts_with("/rest/cosmos/tx/v1beta1/txs?") {
            return (200, json!({"tx_responses": responses}).to_string());
        }
        (404, "{}".to_string())
    })
    .await;
    let down = common::closed_port().await;
    let mut config = common::config_for(addr, true, true, false);
    config.upstreams.indexed_api_url = Some(format!("http://{}/indexed", down));
    let orchestrator = RetrievalOrchestrator::from_config(&config).unwrap();

    let page = orchestrator.address_history(ME, None, None).await;
    assert_eq!(page.records.len(), 1);
    assert_eq!(orchestrator.preference().current(), RetrievalTier::ChainRestApi);
}

#[tokio::test]
async fn test_exhaustion_demotes_unreachable_preferred_tier() {
    let down = common::closed_port().await;
    let orchestrator = RetrievalOrchestrator::from_config(&common::config_for(down, true, true, true)).unwrap();

    let page = orchestrator.address_history(ME, None, None).await;
    assert!(page.records.is_empty());
    assert_eq!(orchestrator.preference().current(), RetrievalTier::ChainRestApi);

    let err = orchestrator.transaction(&common::hash_for(3)).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Unreachable { .. }));
    assert_eq!(orchestrator.preference().current(), RetrievalTier::NodeRpcProxy);
}

#[tokio::test]
async fn test_exhaustion_by_status_keeps_preference() {
    let addr = common::start_static_upstream(|_| (502, "{}".to_string())).await;
    let orchestrator = RetrievalOrchestrator::from_config(&common::config_for(addr, true, true, true)).unwrap();

    let page = orchestrator.address_history(ME, None, None).await;
    assert!(page.records.is_empty());
    assert_eq!(orchestrator.preference().current(), RetrievalTier::PrimaryIndexedApi);
}

fn send_tx_bytes(from: &str, to: &str, amount: &str) -> Vec<u8> {
    let send = MsgSend {
        from_address: from.into(),
        to_address: to.into(),
        amount: vec![Coin {
            denom: "uatom".into(),
            amount: amount.into(),
        }],
    };
    let body = TxBody {
        messages: vec![Any {
            type_url: "/cosmos.bank.v1beta1.MsgSend".into(),
            value: send.encode_to_vec(),
        }],
        ..Default::default()
    };
    TxRaw {
        body_bytes: body.encode_to_vec(),
        auth_info_bytes: Vec::new(),
        signatures: vec![vec![7; 64]],
    }
    .encode_to_vec()
}

#[tokio::test]
async fn test_node_rpc_block_scan() {
    let mine = send_tx_bytes(ME, "cosmos1friend", "11");
    let other = send_tx_bytes("cosmos1stranger", "cosmos1friend", "99");
    let mine_hash = compute_hash(&mine);
    let other_hash = compute_hash(&other);

    let blocks: HashMap<u64, Vec<String>> = HashMap::from([
        (3, vec![STANDARD.encode(&mine)]),
        (1, vec![STANDARD.encode(&other)]),
    ]);
    let txs: HashMap<String, (u64, String)> = HashMap::from([
        (mine_hash.clone(), (3, STANDARD.encode(&mine))),
        (other_hash.clone(), (1, STANDARD.encode(&other))),
    ]);
    let block_fetches = Arc::new(AtomicU32::new(0));
    let fetches = block_fetches.clone();

    let addr = common::start_static_upstream(move |target| {
        if target == "/rpc/status" {
            return (200, common::rpc_result(json!({"sync_info": {"latest_block_height": "3"}})));
        }
        if target.starts_with("/rpc/blockchain?") {
            let metas: Vec<_> = (1..=3u64)
                .rev()
                .map(|h| {
                    let n = blocks.get(&h).map_or(0, Vec::len);
                    json!({"header": {"height": h.to_string(), "time": format!("2024-01-0{}T00:00:00Z", h)}, "num_txs": n.to_string()})
                })
                .collect();
            return (200, common::rpc_result(json!({"last_height": "3", "block_metas": metas})));
        }
        if target.starts_with("/rpc/block?") {
            fetches.fetch_add(1, Ordering::SeqCst);
            let height: u64 = common::query_param(target, "height").and_then(|h| h.parse().ok()).unwrap_or(0);
            let list = blocks.get(&height).cloned().unwrap_or_default();
            return (
                200,
                common::rpc_result(json!({"block": {
                    "header": {"height": height.to_string(), "time": format!("2024-01-0{}T00:00:00Z", height)},
                    "data": {"txs": list}
                }})),
            );
        }
        if target.starts_with("/rpc/tx?") {
            let raw = common::query_param(target, "hash").unwrap_or_default();
            let hash = raw.trim_start_matches("0x").to_string();
            return match txs.get(&hash) {
                Some((height, tx)) => (
                    200,
                    common::rpc_result(json!({
                        "hash": hash,
                        "height": height.to_string(),
                        "tx": tx,
                        "tx_result": {"code": 0, "gas_used": "500", "gas_wanted": "1000", "events": []}
                    })),
                ),
                None => (500, common::rpc_not_found(&hash)),
            };
        }
        (404, "{}".to_string())
    })
    .await;
    let orchestrator = RetrievalOrchestrator::from_config(&common::config_for(addr, false, false, true)).unwrap();

    let page = orchestrator.address_history(ME, None, None).await;
    assert_eq!(page.records.len(), 1);
    let record = &page.records[0];
    assert_eq!(record.hash.as_str(), mine_hash);
    assert_eq!(record.height, 3);
    assert_eq!(record.time, "2024-01-03T00:00:00Z");
    assert_eq!(record.amount_summary, "11uatom");
    assert_eq!(record.fee, "500 gas");
    // Height 2 has no transactions and is never fetched.
    assert_eq!(block_fetches.load(Ordering::SeqCst), 2);

    let looked_up = orchestrator.transaction(&format!("0x{}", other_hash)).await.unwrap();
    assert_eq!(looked_up.sender_summary, "cosmos1stranger");
    assert_eq!(looked_up.time, "2024-01-01T00:00:00Z");
}

/// A node at height `latest` whose blocks are all non-empty but hold nothing
/// for [`ME`]. Records every `/block` height and every `/blockchain` range.
async fn scan_node(latest: u64, metas_available: bool) -> (std::net::SocketAddr, Arc<Mutex<Vec<u64>>>, Arc<Mutex<Vec<(u64, u64)>>>) {
    let fetched = Arc::new(Mutex::new(Vec::new()));
    let ranges = Arc::new(Mutex::new(Vec::new()));
    let (fetched_log, range_log) = (fetched.clone(), ranges.clone());

    let addr = common::start_static_upstream(move |target| {
        if target == "/rpc/status" {
            return (200, common::rpc_result(json!({"sync_info": {"latest_block_height": latest.to_string()}})));
        }
        if target.starts_with("/rpc/blockchain?") {
            if !metas_available {
                return (500, "{}".to_string());
            }
            let bound = |key: &str| common::query_param(target, key).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
            let (min, max) = (bound("minHeight"), bound("maxHeight"));
            range_log.lock().unwrap().push((min, max));
            let metas: Vec<_> = (min..=max)
                .rev()
                .map(|h| json!({"header": {"height": h.to_string()}, "num_txs": "1"}))
                .collect();
            return (200, common::rpc_result(json!({"last_height": latest.to_string(), "block_metas": metas})));
        }
        if target.starts_with("/rpc/block?") {
            let height: u64 = common::query_param(target, "height").and_then(|h| h.parse().ok()).unwrap_or(0);
            fetched_log.lock().unwrap().push(height);
            return (
                200,
                common::rpc_result(json!({"block": {"header": {"height": height.to_string()}, "data": {"txs": []}}})),
            );
        }
        (404, "{}".to_string())
    })
    .await;
    (addr, fetched, ranges)
}

#[tokio::test]
async fn test_block_scan_respects_bound_without_metas() {
    let (addr, fetched, _) = scan_node(100, false).await;
    let mut config = common::config_for(addr, false, false, true);
    config.retrieval.max_blocks_to_scan = 5;
    let orchestrator = RetrievalOrchestrator::from_config(&config).unwrap();

    let page = orchestrator.address_history(ME, None, None).await;
    assert!(page.records.is_empty());
    assert_eq!(*fetched.lock().unwrap(), vec![100, 99, 98, 97, 96]);
}

#[tokio::test]
async fn test_block_scan_respects_bound_across_meta_windows() {
    let (addr, fetched, ranges) = scan_node(100, true).await;
    let mut config = common::config_for(addr, false, false, true);
    config.retrieval.max_blocks_to_scan = 30;
    let orchestrator = RetrievalOrchestrator::from_config(&config).unwrap();

    orchestrator.address_history(ME, None, None).await;
    let fetched = fetched.lock().unwrap().clone();
    assert_eq!(fetched.len(), 30);
    assert_eq!(fetched.first(), Some(&100));
    assert_eq!(fetched.last(), Some(&71));
    assert_eq!(*ranges.lock().unwrap(), vec![(81, 100), (71, 80)]);
}

#[tokio::test]
async fn test_zero_scan_bound_fetches_no_blocks() {
    let (addr, fetched, ranges) = scan_node(100, true).await;
    let mut config = common::config_for(addr, false, false, true);
    config.retrieval.max_blocks_to_scan = 0;
    let orchestrator = RetrievalOrchestrator::from_config(&config).unwrap();

    let page = orchestrator.address_history(ME, None, None).await;
    assert!(page.records.is_empty());
    assert_eq!(page.pagination.pages, 1);
    assert!(fetched.lock().unwrap().is_empty());
    assert!(ranges.lock().unwrap().is_empty());
}
