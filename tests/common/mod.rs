//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tx_explorer::config::ExplorerConfig;

/// Start a programmable mock upstream on an ephemeral port.
///
/// The handler receives the request target (path and query) and returns
/// status and JSON body.
pub async fn start_upstream<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let Some(target) = read_request_target(&mut socket).await else {
                            return;
                        };
                        let (status, body) = handler(target).await;
                        let response = format!(
                            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            reason(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Synchronous-handler variant of [`start_upstream`].
pub async fn start_static_upstream<F>(handler: F) -> SocketAddr
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    start_upstream(move |target| {
        let response = handler(&target);
        async move { response }
    })
    .await
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn read_request_target(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() > 16 * 1024 {
            break;
        }
    }
    let text = String::from_utf8_lossy(&buf);
    let line = text.lines().next()?;
    line.split_whitespace().nth(1).map(str::to_string)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

/// Config whose tiers all live on one mock under `/indexed`, `/rest`, `/rpc`.
/// Pass `false` to leave a tier unconfigured.
pub fn config_for(addr: SocketAddr, indexed: bool, rest: bool, node: bool) -> ExplorerConfig {
    let mut config = ExplorerConfig::default();
    config.upstreams.indexed_api_url = indexed.then(|| format!("http://{}/indexed", addr));
    config.upstreams.chain_rest_url = rest.then(|| format!("http://{}/rest", addr));
    config.upstreams.node_rpc_url = node.then(|| format!("http://{}/rpc", addr));
    config.upstreams.node_rpc_upstream = format!("http://{}/node", addr);
    config.retrieval.timeout_secs = 2;
    config.retrieval.max_blocks_to_scan = 10;
    config
}

/// Value of query parameter `key` in a request target.
pub fn query_param(target: &str, key: &str) -> Option<String> {
    let query = target.split_once('?')?.1;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// A deterministic uppercase hash for fixture `id`.
pub fn hash_for(id: u8) -> String {
    format!("{:02X}", id).repeat(32)
}

/// A chain REST `tx_response` carrying one MsgSend.
pub fn rest_tx(id: u8, height: u64, from: &str, to: &str) -> Value {
    json!({
        "height": height.to_string(),
        "txhash": hash_for(id),
        "code": 0,
        "gas_wanted": "200000",
        "gas_used": "80000",
        "timestamp": "2024-05-01T10:00:00Z",
        "tx": {
            "@type": "/cosmos.tx.v1beta1.Tx",
            "body": {
                "messages": [{
                    "@type": "/cosmos.bank.v1beta1.MsgSend",
                    "from_address": from,
                    "to_address": to,
                    "amount": [{"denom": "uatom", "amount": id.to_string()}]
                }],
                "memo": format!("tx-{}", id)
            },
            "auth_info": {"fee": {"amount": [{"denom": "uatom", "amount": "500"}], "gas_limit": "200000"}}
        },
        "events": []
    })
}

/// JSON-RPC success envelope.
pub fn rpc_result(result: Value) -> String {
    json!({"jsonrpc": "2.0", "id": -1, "result": result}).to_string()
}

/// JSON-RPC error envelope as the node sends it for a missing transaction.
pub fn rpc_not_found(hash: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": -1,
        "error": {"code": -32603, "message": "Internal error", "data": format!("tx ({}) not found", hash)}
    })
    .to_string()
}
