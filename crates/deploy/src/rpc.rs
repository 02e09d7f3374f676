//! JSON-RPC deploy capability.
//!
//! Deploys through a node-managed (unlocked) account: submit
//! `eth_sendTransaction` with the unit's init code, then poll
//! `eth_getTransactionReceipt` until the transaction is mined.

use std::str::FromStr;
use std::time::Duration;

use alloy_core::primitives::Address;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use crate::sequencer::DeployCapability;
use crate::unit::ContractUnit;

/// Default timeout for a single RPC request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default interval between receipt polling attempts.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default overall timeout waiting for a deployment to be mined.
const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Transaction receipt fields the deployer inspects.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxReceipt {
    status: Option<String>,
    contract_address: Option<String>,
}

/// Deploy capability backed by an Ethereum JSON-RPC endpoint.
///
/// Performs no retries of its own beyond receipt polling; a failed
/// submission surfaces immediately to the sequencer.
pub struct RpcDeployer {
    client: reqwest::Client,
    rpc_url: Url,
    sender: Option<String>,
    poll_interval: Duration,
    confirmation_timeout: Duration,
}

impl RpcDeployer {
    pub fn new(rpc_url: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            rpc_url,
            sender: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        })
    }

    /// Use a specific sender account instead of the node's first unlocked
    /// account.
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Override the overall confirmation timeout.
    pub fn confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Override the receipt polling interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Make a JSON-RPC call and deserialize the `result` field.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        let response = self
            .client
            .post(self.rpc_url.clone())
            .json(&json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .with_context(|| format!("Failed to send {method} request"))?;

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {method} response"))?;

        if let Some(error) = body.get("error") {
            bail!(
                "RPC error from {method}: {}",
                error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown")
            );
        }

        let result = body
            .get("result")
            .with_context(|| format!("No result in {method} response"))?
            .clone();

        serde_json::from_value(result)
            .with_context(|| format!("Failed to deserialize {method} result"))
    }

    /// The account deployments are sent from.
    async fn resolve_sender(&self) -> Result<String> {
        if let Some(sender) = &self.sender {
            return Ok(sender.clone());
        }

        let accounts: Vec<String> = self.call("eth_accounts", vec![]).await?;
        accounts
            .into_iter()
            .next()
            .context("Node reports no unlocked accounts; configure a sender")
    }

    /// Poll for the transaction receipt until mined or timed out.
    async fn await_receipt(&self, tx_hash: &str) -> Result<TxReceipt> {
        let start = std::time::Instant::now();

        loop {
            if start.elapsed() > self.confirmation_timeout {
                bail!(
                    "Timed out after {}s waiting for transaction {tx_hash} to be mined",
                    self.confirmation_timeout.as_secs()
                );
            }

            let receipt: Option<TxReceipt> = self
                .call("eth_getTransactionReceipt", vec![json!(tx_hash)])
                .await?;

            match receipt {
                Some(receipt) => return Ok(receipt),
                None => {
                    tracing::trace!(tx_hash, "Transaction not yet mined, polling...");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

impl DeployCapability for RpcDeployer {
    async fn deploy(&self, unit: &ContractUnit) -> Result<String> {
        let from = self.resolve_sender().await?;
        let data = unit.deploy_data();

        let tx_hash: String = self
            .call("eth_sendTransaction", vec![json!({"from": from, "data": data})])
            .await
            .with_context(|| format!("Failed to submit deployment of `{}`", unit.name))?;

        tracing::debug!(unit = %unit.name, tx_hash, "Deployment transaction submitted");

        let receipt = self.await_receipt(&tx_hash).await?;
        extract_contract_address(&receipt, &tx_hash)
    }
}

/// Check the receipt outcome and pull out a well-formed contract address.
fn extract_contract_address(receipt: &TxReceipt, tx_hash: &str) -> Result<String> {
    if receipt.status.as_deref() != Some("0x1") {
        bail!("Deployment transaction {tx_hash} reverted");
    }

    let address = receipt
        .contract_address
        .clone()
        .with_context(|| format!("Receipt for {tx_hash} carries no contract address"))?;

    Address::from_str(&address)
        .with_context(|| format!("Node returned malformed contract address `{address}`"))?;

    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_deserializes_from_node_json() {
        let receipt: TxReceipt = serde_json::from_str(
            r#"{
                "transactionHash": "0xdeadbeef",
                "status": "0x1",
                "contractAddress": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                "blockNumber": "0x2"
            }"#,
        )
        .unwrap();

        assert_eq!(receipt.status.as_deref(), Some("0x1"));
        assert_eq!(
            receipt.contract_address.as_deref(),
            Some("0x5FbDB2315678afecb367f032d93F642f64180aa3")
        );
    }

    #[test]
    fn test_address_is_returned_verbatim() {
        let receipt = TxReceipt {
            status: Some("0x1".to_string()),
            contract_address: Some("0x5fbdb2315678afecb367f032d93f642f64180aa3".to_string()),
        };

        // Lowercase input stays lowercase; no checksum reformatting.
        let address = extract_contract_address(&receipt, "0xabc").unwrap();
        assert_eq!(address, "0x5fbdb2315678afecb367f032d93f642f64180aa3");
    }

    #[test]
    fn test_reverted_receipt_is_rejected() {
        let receipt = TxReceipt {
            status: Some("0x0".to_string()),
            contract_address: None,
        };

        let err = extract_contract_address(&receipt, "0xabc").unwrap_err();
        assert!(err.to_string().contains("reverted"));
    }

    #[test]
    fn test_malformed_address_is_rejected() {
        let receipt = TxReceipt {
            status: Some("0x1".to_string()),
            contract_address: Some("0xnot-an-address".to_string()),
        };

        let err = extract_contract_address(&receipt, "0xabc").unwrap_err();
        assert!(err.to_string().contains("malformed contract address"));
    }
}
