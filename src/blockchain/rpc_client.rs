use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blockchain::event_source::{ContractBinding, EventSource};
use crate::error::RpcError;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::RawLog;

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    result: Option<Value>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogFilter {
    #[serde(rename = "fromBlock")]
    pub from_block: String,
    #[serde(rename = "toBlock")]
    pub to_block: String,
    pub address: Option<String>,
    pub topics: Option<Vec<Option<String>>>,
}

impl LogFilter {
    pub fn for_contract(contract: &ContractBinding, from: u64, to: u64) -> Self {
        Self {
            from_block: format!("0x{:x}", from),
            to_block: format!("0x{:x}", to),
            address: Some(contract.address.clone()),
            topics: Some(vec![Some(contract.topic0.clone())]),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EthLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    #[serde(default)]
    pub removed: Option<bool>,
}

/// JSON-RPC client for the source chain node
pub struct RpcClient {
    client: Client,
    endpoint: String,
    timeout_seconds: u64,
}

impl RpcClient {
    pub fn new(endpoint: String, timeout_seconds: u64) -> Result<Self, RpcError> {
        let context = LogContext::new("rpc_client", "initialization")
            .with_metadata("endpoint", serde_json::json!(endpoint))
            .with_metadata("timeout_seconds", serde_json::json!(timeout_seconds));
        context.info("Initializing RPC client");

        Ok(Self {
            client: build_http_client(timeout_seconds)?,
            endpoint,
            timeout_seconds,
        })
    }

    async fn make_request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let monitor = PerformanceMonitor::new(&format!("rpc_{}", method));
        let result = self.send_request(method, params).await;
        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_rpc_call(method, duration, result.is_ok());
        result
    }

    async fn send_request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout { seconds: self.timeout_seconds }
                } else if e.is_connect() {
                    RpcError::Connection(e.to_string())
                } else {
                    RpcError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Connection(format!(
                "HTTP error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let rpc_response: JsonRpcResponse = response.json().await?;

        if let Some(error) = rpc_response.error {
            return Err(RpcError::Method {
                code: error.code,
                message: error.message,
            });
        }

        rpc_response
            .result
            .ok_or_else(|| RpcError::InvalidResponse("No result in response".to_string()))
    }

    pub async fn client_version(&self) -> Result<String, RpcError> {
        let result = self.make_request("web3_clientVersion", vec![]).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcError::InvalidResponse("Client version is not a string".to_string()))
    }

    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        let result = self.make_request("eth_chainId", vec![]).await?;
        let hex_string = result
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("Chain id is not a string".to_string()))?;
        parse_hex_to_u64(hex_string)
    }

    pub async fn get_latest_block_number(&self) -> Result<u64, RpcError> {
        let result = self.make_request("eth_blockNumber", vec![]).await?;
        let hex_string = result
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("Block number is not a string".to_string()))?;

        let block_number = parse_hex_to_u64(hex_string)?;
        LogContext::new("rpc_client", "get_latest_block_number")
            .with_block_number(block_number)
            .debug(&format!("Retrieved latest block number: {}", block_number));
        Ok(block_number)
    }

    pub async fn get_logs(&self, filter: LogFilter) -> Result<Vec<RawLog>, RpcError> {
        let params = vec![serde_json::to_value(&filter)?];
        let result = self.make_request("eth_getLogs", params).await?;

        let eth_logs: Vec<EthLog> = serde_json::from_value(result)?;

        let mut raw_logs = Vec::with_capacity(eth_logs.len());
        for eth_log in eth_logs {
            raw_logs.push(RawLog {
                block_number: parse_hex_to_u64(&eth_log.block_number)?,
                log_index: parse_hex_to_u32(&eth_log.log_index)?,
                address: eth_log.address,
                topics: eth_log.topics,
                data: eth_log.data,
                transaction_hash: eth_log.transaction_hash,
                removed: eth_log.removed.unwrap_or(false),
            });
        }

        LogContext::new("rpc_client", "get_logs")
            .with_metadata("log_count", serde_json::json!(raw_logs.len()))
            .with_metadata("from_block", serde_json::json!(filter.from_block))
            .with_metadata("to_block", serde_json::json!(filter.to_block))
            .debug(&format!("Retrieved {} logs", raw_logs.len()));

        Ok(raw_logs)
    }
}

#[async_trait]
impl EventSource for RpcClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn is_connected(&self) -> bool {
        self.client_version().await.is_ok()
    }

    async fn reconnect(&mut self) -> Result<(), RpcError> {
        self.client = build_http_client(self.timeout_seconds)?;
        let chain_id = self.chain_id().await?;

        LogContext::new("rpc_client", "reconnect")
            .with_metadata("endpoint", serde_json::json!(self.endpoint))
            .with_metadata("chain_id", serde_json::json!(chain_id))
            .info(&format!("Connected to blockchain node at {}. Chain ID: {}", self.endpoint, chain_id));
        Ok(())
    }

    async fn latest_block(&self) -> Result<u64, RpcError> {
        self.get_latest_block_number().await
    }

    async fn fetch_logs(&self, contract: &ContractBinding, from: u64, to: u64) -> Result<Vec<RawLog>, RpcError> {
        self.get_logs(LogFilter::for_contract(contract, from, to)).await
    }
}

fn build_http_client(timeout_seconds: u64) -> Result<Client, RpcError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()?)
}

fn parse_hex_to_u64(hex_str: &str) -> Result<u64, RpcError> {
    let hex_without_prefix = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    u64::from_str_radix(hex_without_prefix, 16)
        .map_err(|e| RpcError::InvalidResponse(format!("Failed to parse hex '{}' to u64: {}", hex_str, e)))
}

fn parse_hex_to_u32(hex_str: &str) -> Result<u32, RpcError> {
    let hex_without_prefix = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    u32::from_str_radix(hex_without_prefix, 16)
        .map_err(|e| RpcError::InvalidResponse(format!("Failed to parse hex '{}' to u32: {}", hex_str, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::event_schema::TOKENS_LOCKED;
    use serde_json::json;

    #[test]
    fn test_json_rpc_request_serialization() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: "eth_blockNumber".to_string(),
            params: vec![],
            id: 1,
        };

        let serialized = serde_json::to_string(&request).unwrap();
        assert_eq!(serialized, r#"{"jsonrpc":"2.0","method":"eth_blockNumber","params":[],"id":1}"#);
    }

    #[test]
    fn test_json_rpc_response_deserialization_error() {
        let response_json = r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":1}"#;
        let response: JsonRpcResponse = serde_json::from_str(response_json).unwrap();

        assert!(response.result.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found");
    }

    #[test]
    fn test_parse_hex_helpers() {
        assert_eq!(parse_hex_to_u64("0x1234").unwrap(), 0x1234u64);
        assert_eq!(parse_hex_to_u64("1234").unwrap(), 0x1234u64);
        assert_eq!(parse_hex_to_u64("0x0").unwrap(), 0u64);
        assert!(parse_hex_to_u64("invalid").is_err());

        assert_eq!(parse_hex_to_u32("0x1f").unwrap(), 31u32);
        assert!(parse_hex_to_u32("0x1ffffffff").is_err());
    }

    #[test]
    fn test_log_filter_for_contract() {
        let binding = ContractBinding::bind("0x5fbdb2315678afecb367f032d93f642f64180aa3", &TOKENS_LOCKED).unwrap();
        let filter = LogFilter::for_contract(&binding, 100, 255);

        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["fromBlock"], "0x64");
        assert_eq!(json["toBlock"], "0xff");
        assert_eq!(json["address"], "0x5fbdb2315678afecb367f032d93f642f64180aa3");
        assert_eq!(json["topics"], json!([TOKENS_LOCKED.topic0()]));
    }

    #[test]
    fn test_eth_log_removed_is_optional() {
        let log: EthLog = serde_json::from_value(json!({
            "address": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "topics": [],
            "data": "0x",
            "blockNumber": "0x10",
            "transactionHash": "0xabc",
            "logIndex": "0x0"
        }))
        .unwrap();
        assert_eq!(log.removed, None);
    }
}
