use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bridge_event_relayer::blockchain::{ContractBinding, EventSource, RpcClient, TOKENS_LOCKED};
use bridge_event_relayer::error::RpcError;

const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result
    }))
}

async fn mount_method(server: &MockServer, rpc_method: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_latest_block_parses_hex_height() {
    let mock_server = MockServer::start().await;
    mount_method(&mock_server, "eth_blockNumber", rpc_result(json!("0x3e8"))).await;

    let client = RpcClient::new(mock_server.uri(), 5).unwrap();
    assert_eq!(client.latest_block().await.unwrap(), 1000);
}

#[tokio::test]
async fn test_fetch_logs_sends_filter_and_parses_logs() {
    let mock_server = MockServer::start().await;
    let binding = ContractBinding::bind(CONTRACT, &TOKENS_LOCKED).unwrap();

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_getLogs",
            "params": [{
                "fromBlock": "0x384",
                "toBlock": "0x3e8",
                "address": CONTRACT,
                "topics": [binding.topic0.clone()]
            }]
        })))
        .respond_with(rpc_result(json!([{
            "address": CONTRACT,
            "topics": [binding.topic0.clone()],
            "data": "0x",
            "blockNumber": "0x3b6",
            "transactionHash": format!("0x{}", "cd".repeat(32)),
            "logIndex": "0x2",
            "removed": false
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = RpcClient::new(mock_server.uri(), 5).unwrap();
    let logs = client.fetch_logs(&binding, 900, 1000).await.unwrap();

    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].block_number, 950);
    assert_eq!(logs[0].log_index, 2);
    assert!(!logs[0].removed);
}

#[tokio::test]
async fn test_json_rpc_error_is_reported() {
    let mock_server = MockServer::start().await;
    mount_method(
        &mock_server,
        "eth_getLogs",
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32005, "message": "query returned more than 10000 results" }
        })),
    )
    .await;

    let client = RpcClient::new(mock_server.uri(), 5).unwrap();
    let binding = ContractBinding::bind(CONTRACT, &TOKENS_LOCKED).unwrap();

    match client.fetch_logs(&binding, 0, 100_000).await {
        Err(RpcError::Method { code, message }) => {
            assert_eq!(code, -32005);
            assert!(message.contains("10000"));
        }
        other => panic!("expected method error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_is_a_connection_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let client = RpcClient::new(mock_server.uri(), 5).unwrap();
    let result = client.latest_block().await;

    assert!(matches!(result, Err(RpcError::Connection(ref msg)) if msg.contains("502")));
}

#[tokio::test]
async fn test_liveness_and_reconnect() {
    let mock_server = MockServer::start().await;
    mount_method(&mock_server, "web3_clientVersion", rpc_result(json!("Geth/v1.13.0"))).await;
    mount_method(&mock_server, "eth_chainId", rpc_result(json!("0x1"))).await;

    let mut client = RpcClient::new(mock_server.uri(), 5).unwrap();
    assert!(client.is_connected().await);
    client.reconnect().await.expect("reconnect should succeed");
    assert_eq!(client.chain_id().await.unwrap(), 1);

    mock_server.reset().await;
    assert!(!client.is_connected().await);
    assert!(client.reconnect().await.is_err());
}

#[tokio::test]
async fn test_unreachable_node_is_not_connected() {
    // port 9 (discard) is closed on test machines
    let client = RpcClient::new("http://127.0.0.1:9".to_string(), 2).unwrap();
    assert!(!client.is_connected().await);
    assert!(client.latest_block().await.is_err());
}
