//! JSON-RPC ledger backend.
//!
//! Talks to a node exposing four methods:
//!
//! | Method                         | Purpose                              |
//! |--------------------------------|--------------------------------------|
//! | `ledger_call`                  | read-only contract function          |
//! | `ledger_simulate`              | dry-run a write as `from`            |
//! | `ledger_sendTransaction`       | submit a base64 signed envelope      |
//! | `ledger_getTransactionReceipt` | `null` while pending, else status    |
//!
//! ## Resilience
//!
//! This backend never retries on its own. Rate-limit responses and soft RPC
//! errors surface as transient [`TenderError`]s and the gateway decides
//! whether a single retry is allowed.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::{Result, TenderError};
use crate::ledger::calls::{Simulation, TxStatus, WriteCall};
use crate::ledger::decode;
use crate::ledger::LedgerBackend;
use crate::session::SignedCall;
use crate::types::{Address, NetworkId, TxHash};

/// JSON-RPC error code nodes use for a reverted `eth_call`-style dry run.
pub const EXECUTION_REVERTED: i64 = 3;

// ─────────────────────────────────────────────────────────
// JSON-RPC response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    pub result: Option<Value>,
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct SimulateResult {
    ok: bool,
    #[serde(default)]
    request: Value,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReceiptResult {
    status: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(rename = "blockNumber", default)]
    block_number: Option<Value>,
}

pub struct JsonRpcLedger {
    client: Client,
    rpc_url: String,
    /// Deployed contract address per network.
    contracts: HashMap<NetworkId, String>,
}

impl JsonRpcLedger {
    pub fn new(client: Client, rpc_url: String, contracts: HashMap<NetworkId, String>) -> Self {
        Self {
            client,
            rpc_url,
            contracts,
        }
    }

    fn contract(&self, network: NetworkId) -> Result<&str> {
        self.contracts
            .get(&network)
            .map(String::as_str)
            .ok_or_else(|| TenderError::Config(format!("contract not deployed on network {network}")))
    }

    async fn post(&self, method: &str, params: Value) -> Result<Value> {
        let resp = self
            .client
            .post(&self.rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate-limited by RPC on {method}");
            return Err(TenderError::Unavailable("rate limited by ledger RPC".to_string()));
        }

        let body: RpcResponse = resp.json().await?;
        if let Some(err) = body.error {
            return Err(TenderError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(body.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl LedgerBackend for JsonRpcLedger {
    async fn call(&self, network: NetworkId, function: &str, args: Vec<Value>) -> Result<Value> {
        let params = build_call_params(network, self.contract(network)?, function, &args);
        let result = self.post("ledger_call", params).await?;
        debug!("ledger_call {function} -> {result}");
        Ok(result)
    }

    async fn simulate(
        &self,
        network: NetworkId,
        from: &Address,
        call: &WriteCall,
    ) -> Result<Simulation> {
        let params = build_simulate_params(network, self.contract(network)?, from, call);
        match self.post("ledger_simulate", params).await {
            Ok(result) => parse_simulation(result),
            Err(TenderError::Rpc { code, message }) if code == EXECUTION_REVERTED => {
                Ok(Simulation::Refused {
                    reason: strip_revert_prefix(&message),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn send(&self, network: NetworkId, signed: &SignedCall) -> Result<TxHash> {
        let envelope = base64::engine::general_purpose::STANDARD.encode(&signed.envelope);
        let result = self
            .post(
                "ledger_sendTransaction",
                json!({ "network": network.0, "transaction": envelope }),
            )
            .await?;
        result
            .as_str()
            .map(|h| TxHash(h.to_string()))
            .ok_or_else(|| TenderError::Decode(format!("sendTransaction returned {result}")))
    }

    async fn receipt(&self, network: NetworkId, tx: &TxHash) -> Result<Option<TxStatus>> {
        let result = self
            .post(
                "ledger_getTransactionReceipt",
                json!({ "network": network.0, "hash": tx.0 }),
            )
            .await?;
        parse_receipt(result)
    }
}

fn build_call_params(network: NetworkId, contract: &str, function: &str, args: &[Value]) -> Value {
    json!({
        "network": network.0,
        "contract": contract,
        "function": function,
        "args": args,
    })
}

fn build_simulate_params(
    network: NetworkId,
    contract: &str,
    from: &Address,
    call: &WriteCall,
) -> Value {
    let mut params = json!({
        "network": network.0,
        "contract": contract,
        "from": from.as_str(),
        "function": call.function(),
        "args": call.args(),
    });
    if let Some(value) = call.value() {
        params["value"] = json!(value.to_string());
    }
    params
}

fn parse_simulation(result: Value) -> Result<Simulation> {
    let sim: SimulateResult = serde_json::from_value(result)?;
    if sim.ok {
        Ok(Simulation::Ok {
            request: sim.request,
        })
    } else {
        Ok(Simulation::Refused {
            reason: sim.reason.unwrap_or_else(|| "unknown reason".to_string()),
        })
    }
}

fn parse_receipt(result: Value) -> Result<Option<TxStatus>> {
    if result.is_null() {
        return Ok(None);
    }
    let receipt: ReceiptResult = serde_json::from_value(result)?;
    match receipt.status.as_str() {
        "success" => Ok(Some(TxStatus::Success {
            block_number: receipt
                .block_number
                .as_ref()
                .map(decode::as_u64)
                .transpose()?,
        })),
        "reverted" => Ok(Some(TxStatus::Reverted {
            reason: receipt.reason.unwrap_or_else(|| "reverted".to_string()),
        })),
        other => Err(TenderError::Decode(format!("unknown receipt status {other:?}"))),
    }
}

/// `"execution reverted: Deadline passed"` → `"Deadline passed"`.
pub(crate) fn strip_revert_prefix(message: &str) -> String {
    message
        .strip_prefix("execution reverted:")
        .map(str::trim)
        .unwrap_or(message)
        .to_string()
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
