//! JSON-RPC adapter for EVM nodes
//!
//! Implements only the handful of `eth_*` methods the client needs. Writes go
//! through `eth_sendTransaction`, so the node (or the wallet behind it) holds
//! the keys and signs.

use std::time::Duration;

use async_trait::async_trait;
use otter_types::{decode_hex, encode_hex, Address, OtterError, OtterResult, PoolRecord, RoleId, TxHash, U256};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::abi::{decode_pool_record, encode_call, selectors, Decoder, Token};
use crate::client::{ChainReader, ChainWriter, LogEntry, LogFilter, Receipt};
use crate::contracts::ContractAddresses;
use crate::intent::ContractCall;

/// EIP-1193 "user rejected request"
const USER_REJECTED_CODE: i64 = 4001;

/// JSON-RPC client bound to one node and one contract deployment
pub struct RpcChainClient {
    url: String,
    http: reqwest::Client,
    contracts: ContractAddresses,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    block_number: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: String,
    topics: Vec<String>,
    data: String,
    block_number: Option<String>,
    transaction_hash: Option<String>,
}

impl RpcChainClient {
    pub fn new(url: impl Into<String>, contracts: ContractAddresses) -> OtterResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| OtterError::rpc_error(&format!("Failed to build HTTP client: {}", e), None))?;

        Ok(Self {
            url: url.into(),
            http,
            contracts,
        })
    }

    pub fn contracts(&self) -> &ContractAddresses {
        &self.contracts
    }

    /// Make a JSON-RPC call; `Ok(None)` for a `null` result
    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> OtterResult<Option<T>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        debug!("RPC call: {} with params: {}", method, params);

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| OtterError::rpc_error(&format!("{} request failed: {}", method, e), None))?;

        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| OtterError::rpc_error(&format!("{} returned an invalid response: {}", method, e), None))?;

        if let Some(error) = parsed.error {
            return Err(OtterError::rpc_error(&error.message, Some(error.code)));
        }
        Ok(parsed.result)
    }

    async fn required<T: DeserializeOwned>(&self, method: &str, params: Value) -> OtterResult<T> {
        self.request(method, params)
            .await?
            .ok_or_else(|| OtterError::rpc_error(&format!("No result in {} response", method), None))
    }

    /// `eth_call` against `to`, returning the raw return data
    async fn call(&self, to: Address, data: Vec<u8>) -> OtterResult<Vec<u8>> {
        let params = json!([
            { "to": to.to_string(), "data": encode_hex(&data) },
            "latest"
        ]);
        let result: String = self.required("eth_call", params).await?;
        decode_hex("call result", &result)
    }

    async fn call_uint(&self, to: Address, data: Vec<u8>, context: &'static str) -> OtterResult<U256> {
        let output = self.call(to, data).await?;
        Decoder::new(&output, context).uint(0)
    }

    async fn call_bool(&self, to: Address, data: Vec<u8>, context: &'static str) -> OtterResult<bool> {
        let output = self.call(to, data).await?;
        Decoder::new(&output, context).bool(0)
    }
}

fn parse_quantity(field: &str, text: &str) -> OtterResult<u64> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    u64::from_str_radix(digits, 16).map_err(|e| OtterError::decode(field, &e.to_string()))
}

fn parse_topic(text: &str) -> OtterResult<[u8; 32]> {
    let bytes = decode_hex("topic", text)?;
    bytes
        .try_into()
        .map_err(|_| OtterError::decode("topic", "expected 32 bytes"))
}

fn to_log_entry(log: RpcLog) -> OtterResult<LogEntry> {
    Ok(LogEntry {
        address: log.address.parse()?,
        topics: log.topics.iter().map(|t| parse_topic(t)).collect::<OtterResult<_>>()?,
        data: decode_hex("log data", &log.data)?,
        block_number: match log.block_number {
            Some(n) => parse_quantity("blockNumber", &n)?,
            None => 0,
        },
        tx_hash: match log.transaction_hash {
            Some(hash) => Some(hash.parse()?),
            None => None,
        },
    })
}

fn pair(pool_id: u64, epoch: u64) -> [Token; 2] {
    [Token::uint(pool_id), Token::uint(epoch)]
}

#[async_trait]
impl ChainReader for RpcChainClient {
    async fn pool_count(&self) -> OtterResult<u64> {
        let count = self
            .call_uint(self.contracts.asset_registry, encode_call(selectors::POOL_COUNT, &[]), "poolCount")
            .await?;
        if count > U256::new(u64::MAX as u128) {
            return Err(OtterError::decode("poolCount", "count exceeds u64"));
        }
        Ok(count.into_words().1 as u64)
    }

    async fn get_pool(&self, pool_id: u64) -> OtterResult<PoolRecord> {
        let data = encode_call(selectors::GET_POOL, &[Token::uint(pool_id)]);
        let output = self.call(self.contracts.asset_registry, data).await?;
        decode_pool_record(&output)
    }

    async fn has_role(&self, role: RoleId, account: Address) -> OtterResult<bool> {
        let data = encode_call(selectors::HAS_ROLE, &[Token::role(role), Token::Address(account)]);
        self.call_bool(self.contracts.access_manager, data, "hasRole").await
    }

    async fn vault_shares(&self, vault: Address, account: Address) -> OtterResult<U256> {
        let data = encode_call(selectors::BALANCE_OF, &[Token::Address(account)]);
        self.call_uint(vault, data, "balanceOf").await
    }

    async fn vault_pending_rewards(&self, vault: Address, account: Address) -> OtterResult<U256> {
        let data = encode_call(selectors::PENDING_REWARDS, &[Token::Address(account)]);
        self.call_uint(vault, data, "pendingRewards").await
    }

    async fn vault_total_assets(&self, vault: Address) -> OtterResult<U256> {
        self.call_uint(vault, encode_call(selectors::TOTAL_ASSETS, &[]), "totalAssets")
            .await
    }

    async fn token_balance(&self, account: Address) -> OtterResult<U256> {
        let data = encode_call(selectors::BALANCE_OF, &[Token::Address(account)]);
        self.call_uint(self.contracts.settlement_token, data, "balanceOf").await
    }

    async fn token_allowance(&self, owner: Address, spender: Address) -> OtterResult<U256> {
        let data = encode_call(selectors::ALLOWANCE, &[Token::Address(owner), Token::Address(spender)]);
        self.call_uint(self.contracts.settlement_token, data, "allowance").await
    }

    async fn posted_revenue(&self, pool_id: u64, epoch: u64) -> OtterResult<U256> {
        let data = encode_call(selectors::GET_REVENUE, &pair(pool_id, epoch));
        self.call_uint(self.contracts.revenue_oracle, data, "getRevenue").await
    }

    async fn escrowed_amount(&self, pool_id: u64, epoch: u64) -> OtterResult<U256> {
        let data = encode_call(selectors::GET_ESCROWED_AMOUNT, &pair(pool_id, epoch));
        self.call_uint(self.contracts.revenue_escrow, data, "getEscrowedAmount").await
    }

    async fn is_distributed(&self, pool_id: u64, epoch: u64) -> OtterResult<bool> {
        let data = encode_call(selectors::IS_DISTRIBUTED, &pair(pool_id, epoch));
        self.call_bool(self.contracts.yield_distributor, data, "isDistributed").await
    }

    async fn block_number(&self) -> OtterResult<u64> {
        let result: String = self.required("eth_blockNumber", json!([])).await?;
        parse_quantity("eth_blockNumber", &result)
    }

    async fn logs(&self, filter: &LogFilter) -> OtterResult<Vec<LogEntry>> {
        let addresses: Vec<String> = filter.addresses.iter().map(|a| a.to_string()).collect();
        let params = json!([{
            "address": addresses,
            "fromBlock": format!("0x{:x}", filter.from_block),
            "toBlock": format!("0x{:x}", filter.to_block),
        }]);
        let logs: Vec<RpcLog> = self.required("eth_getLogs", params).await?;
        logs.into_iter().map(to_log_entry).collect()
    }
}

#[async_trait]
impl ChainWriter for RpcChainClient {
    async fn submit(&self, from: Address, call: &ContractCall) -> OtterResult<TxHash> {
        let params = json!([{
            "from": from.to_string(),
            "to": call.target(&self.contracts).to_string(),
            "data": encode_hex(&call.calldata()),
        }]);

        let hash: String = match self.required("eth_sendTransaction", params).await {
            Ok(hash) => hash,
            Err(OtterError::RpcError { message, code }) => {
                if code == Some(USER_REJECTED_CODE) {
                    warn!("Wallet rejected {}", call.label());
                }
                return Err(OtterError::wallet_rejected(call.label(), &message));
            }
            Err(other) => return Err(other),
        };
        hash.parse()
    }

    async fn receipt(&self, tx_hash: TxHash) -> OtterResult<Option<Receipt>> {
        let receipt: Option<RpcReceipt> = self
            .request("eth_getTransactionReceipt", json!([tx_hash.to_string()]))
            .await?;

        let Some(receipt) = receipt else {
            return Ok(None);
        };
        // Some nodes return a receipt shell for pending transactions
        let Some(block) = receipt.block_number else {
            return Ok(None);
        };

        // Pre-Byzantium receipts carry no status field
        let success = match receipt.status.as_deref() {
            Some(status) => parse_quantity("status", status)? == 1,
            None => true,
        };

        Ok(Some(Receipt {
            tx_hash: receipt.transaction_hash.parse()?,
            block_number: parse_quantity("blockNumber", &block)?,
            success,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("n", "0x0").unwrap(), 0);
        assert_eq!(parse_quantity("n", "0x1b4").unwrap(), 436);
        assert!(parse_quantity("n", "0xzz").is_err());
    }

    #[test]
    fn test_log_conversion() {
        let log = RpcLog {
            address: "0x5fc8d32690cc91d4c39d9d3abcbd16989f875707".to_string(),
            topics: vec![format!("0x{}", "00".repeat(31) + "07")],
            data: "0x".to_string(),
            block_number: Some("0x10".to_string()),
            transaction_hash: None,
        };
        let entry = to_log_entry(log).unwrap();
        assert_eq!(entry.block_number, 16);
        assert_eq!(entry.topics[0][31], 7);
        assert!(entry.data.is_empty());
    }

    #[test]
    fn test_receipt_shape() {
        let json = r#"{"transactionHash":"0x0000000000000000000000000000000000000000000000000000000000000001","blockNumber":"0x2","status":"0x0"}"#;
        let receipt: RpcReceipt = serde_json::from_str(json).unwrap();
        assert_eq!(receipt.status.as_deref(), Some("0x0"));
    }
}
