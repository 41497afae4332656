use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use std::fmt::Debug;
use tokio::sync::mpsc;

use super::{ClientError, Receipt, TransactionDetails, TransactionRequest};

/// One step in the life of a submitted transaction, as reported by the node.
#[derive(Debug, Clone, PartialEq)]
pub enum TxEvent {
    /// The node accepted the transaction into its pending pool.
    HashAccepted(B256),
    /// The transaction was mined.
    Confirmed(Receipt),
    /// Terminal failure: rejected, dropped, replaced, or the transport failed.
    Error(ClientError),
}

/// Events for a single submission: zero or one `HashAccepted`, then zero or one
/// `Confirmed`, then optionally `Error`.
pub type TxEvents = mpsc::Receiver<TxEvent>;

pub fn event_channel() -> (mpsc::Sender<TxEvent>, TxEvents) {
    mpsc::channel(4)
}

/// The RPC capabilities a contract binding needs from a node.
///
/// Implementations own transport concerns (connections, batching, retries of
/// idempotent reads). Submissions must never be retried here: a resend after an
/// ambiguous failure can land the same transaction twice.
#[async_trait]
pub trait ChainClient: Send + Sync + Debug {
    /// `eth_getTransactionCount(address, "pending")`.
    async fn pending_nonce(&self, address: Address) -> Result<u64, ClientError>;

    /// `eth_sendRawTransaction`, followed until a receipt or a terminal error.
    async fn send_raw_transaction(&self, raw: Bytes) -> TxEvents;

    /// `eth_sendTransaction` through an account managed by the node.
    async fn send_transaction(&self, request: TransactionRequest) -> TxEvents;

    /// `eth_call` against the latest block.
    async fn call(&self, request: TransactionRequest) -> Result<Bytes, ClientError>;

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>, ClientError>;

    async fn transaction(&self, hash: B256) -> Result<Option<TransactionDetails>, ClientError>;
}
