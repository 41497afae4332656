use alloy::{
    consensus::Transaction as _,
    network::{ReceiptResponse, TransactionBuilder},
    primitives::{Address, Bytes, B256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::{Log, TransactionReceipt, TransactionRequest as RpcTransactionRequest},
    transports::http::{Client, Http},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::fmt::Display;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::client::{event_channel, ChainClient, TxEvent, TxEvents};
use super::utils::interpret_rpc_error;
use super::{ClientError, RawLog, Receipt, TransactionDetails, TransactionRequest};
use crate::config::NetworkConfig;

/// [`ChainClient`] over a JSON-RPC HTTP endpoint.
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    provider: RootProvider<Http<Client>>,
    rpc_url: String,
}

impl RpcChainClient {
    pub fn connect(rpc_url: &str) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|e| anyhow!("Invalid RPC URL '{}': {}", rpc_url, e))?;
        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self {
            provider,
            rpc_url: rpc_url.to_string(),
        })
    }

    pub fn from_network(network: &NetworkConfig) -> Result<Self> {
        Self::connect(&network.rpc_url)
    }

    /// Validates network connectivity with detailed error information
    pub async fn validate_connection(&self) -> Result<()> {
        let block = self.provider.get_block_number().await.map_err(|e| {
            anyhow!(
                "Cannot connect to '{}': {}. Please check your RPC endpoint configuration and network connectivity.",
                self.rpc_url,
                interpret_rpc_error(&e.to_string())
            )
        })?;
        debug!("Connected to {} at block {}", self.rpc_url, block);
        Ok(())
    }

    pub async fn chain_id(&self) -> Result<u64> {
        self.provider.get_chain_id().await.map_err(|e| {
            anyhow!(
                "Failed to get chain id from '{}': {}",
                self.rpc_url,
                interpret_rpc_error(&e.to_string())
            )
        })
    }

    /// Fails when the endpoint serves a different chain than `expected`.
    pub async fn ensure_chain(&self, expected: u64) -> Result<()> {
        let actual = self.chain_id().await?;
        check_chain_id(&self.rpc_url, expected, actual)
    }
}

fn check_chain_id(rpc_url: &str, expected: u64, actual: u64) -> Result<()> {
    if expected != actual {
        return Err(anyhow!(
            "'{}' serves chain {} but the network is configured for chain {}",
            rpc_url,
            actual,
            expected
        ));
    }
    Ok(())
}

fn client_error(e: impl Display) -> ClientError {
    let message = e.to_string();
    error!("RPC error details: {}", message);
    ClientError::new(interpret_rpc_error(&message))
}

fn rpc_request(request: TransactionRequest) -> RpcTransactionRequest {
    let mut rpc = RpcTransactionRequest::default().with_value(request.value);
    rpc = match request.to {
        Some(to) => rpc.with_to(to).with_input(request.data),
        None => rpc.with_deploy_code(request.data),
    };
    if let Some(from) = request.from {
        rpc = rpc.with_from(from);
    }
    if let Some(gas_limit) = request.gas_limit {
        rpc = rpc.with_gas_limit(gas_limit);
    }
    if let Some(gas_price) = request.gas_price {
        rpc = rpc.with_gas_price(gas_price);
    }
    if let Some(max_fee) = request.max_fee_per_gas {
        rpc = rpc.with_max_fee_per_gas(max_fee);
    }
    if let Some(priority_fee) = request.max_priority_fee_per_gas {
        rpc = rpc.with_max_priority_fee_per_gas(priority_fee);
    }
    if let Some(nonce) = request.nonce {
        rpc = rpc.with_nonce(nonce);
    }
    if let Some(chain_id) = request.chain_id {
        rpc = rpc.with_chain_id(chain_id);
    }
    rpc
}

fn raw_log(log: &Log) -> RawLog {
    RawLog {
        address: log.address(),
        topics: log.topics().to_vec(),
        data: log.data().data.clone(),
        log_index: log.log_index,
        transaction_hash: log.transaction_hash,
        block_number: log.block_number,
    }
}

fn convert_receipt(receipt: &TransactionReceipt) -> Receipt {
    Receipt {
        transaction_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        status: receipt.status(),
        gas_used: receipt.gas_used() as u64,
        contract_address: receipt.contract_address,
        logs: receipt.inner.logs().iter().map(raw_log).collect(),
    }
}

/// Reports `HashAccepted`, then waits for the receipt in the background.
///
/// Waiting stops once the receiver is dropped; the transaction itself is not
/// affected.
fn follow<F, E>(sender: mpsc::Sender<TxEvent>, hash: B256, pending_receipt: F) -> JoinHandle<()>
where
    F: Future<Output = std::result::Result<Receipt, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        if sender.send(TxEvent::HashAccepted(hash)).await.is_err() {
            return;
        }

        tokio::select! {
            result = pending_receipt => {
                let event = match result {
                    Ok(mined) => TxEvent::Confirmed(mined),
                    Err(e) => TxEvent::Error(client_error(e)),
                };
                // the receiver may be gone already
                let _ = sender.send(event).await;
            }
            _ = sender.closed() => {
                debug!("Stopped following 0x{:x}; it may still be mined", hash);
            }
        }
    })
}

async fn reject(sender: mpsc::Sender<TxEvent>, error: ClientError) {
    let _ = sender.send(TxEvent::Error(error)).await;
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn pending_nonce(&self, address: Address) -> std::result::Result<u64, ClientError> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(client_error)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> TxEvents {
        let (sender, events) = event_channel();
        match self.provider.send_raw_transaction(&raw).await {
            Ok(pending) => {
                let hash = *pending.tx_hash();
                info!("Raw transaction accepted: 0x{:x}", hash);
                let receipt = async move {
                    pending.get_receipt().await.map(|mined| convert_receipt(&mined))
                };
                follow(sender, hash, receipt);
            }
            Err(e) => reject(sender, client_error(e)).await,
        }
        events
    }

    async fn send_transaction(&self, request: TransactionRequest) -> TxEvents {
        let (sender, events) = event_channel();
        match self.provider.send_transaction(rpc_request(request)).await {
            Ok(pending) => {
                let hash = *pending.tx_hash();
                info!("Transaction accepted: 0x{:x}", hash);
                let receipt = async move {
                    pending.get_receipt().await.map(|mined| convert_receipt(&mined))
                };
                follow(sender, hash, receipt);
            }
            Err(e) => reject(sender, client_error(e)).await,
        }
        events
    }

    async fn call(&self, request: TransactionRequest) -> std::result::Result<Bytes, ClientError> {
        self.provider
            .call(&rpc_request(request))
            .await
            .map_err(client_error)
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> std::result::Result<Option<Receipt>, ClientError> {
        let mined = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(client_error)?;
        Ok(mined.as_ref().map(convert_receipt))
    }

    async fn transaction(
        &self,
        hash: B256,
    ) -> std::result::Result<Option<TransactionDetails>, ClientError> {
        let transaction = self
            .provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(client_error)?;

        Ok(transaction.map(|tx| TransactionDetails {
            hash,
            from: tx.from,
            to: tx.to(),
            value: tx.value(),
            nonce: tx.nonce(),
            input: tx.input().clone(),
            block_number: tx.block_number,
        }))
    }
}
