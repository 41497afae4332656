use alloy::primitives::B256;
use tracing::{debug, info, warn};

use super::client::{ChainClient, TxEvent};
use super::signer::SignedTransaction;
use super::{BindingError, CompletionMode, Submitted, TransactionRequest};

/// What gets handed to the chain client.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Signed locally; submitted with `eth_sendRawTransaction`.
    Signed(SignedTransaction),
    /// Signed by an account managed by the node; submitted with `eth_sendTransaction`.
    Unsigned(TransactionRequest),
}

/// Where a single submission stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Unsent,
    Pending(B256),
    Confirmed(B256),
    Failed,
}

impl SubmissionState {
    fn hash(&self) -> Option<B256> {
        match self {
            Self::Pending(hash) | Self::Confirmed(hash) => Some(*hash),
            Self::Unsent | Self::Failed => None,
        }
    }
}

/// Sends `submission` and resolves according to `mode`.
///
/// `HashOnly` returns as soon as the node acknowledges the transaction and stops
/// listening; the transaction may still be mined later. `AwaitReceipt` returns only
/// once a receipt exists. There is no timeout and no retry: whatever terminal event
/// the client reports is surfaced.
pub async fn submit(
    client: &dyn ChainClient,
    submission: Submission,
    mode: CompletionMode,
) -> Result<Submitted, BindingError> {
    let mut events = match submission {
        Submission::Signed(signed) => {
            debug!("Submitting signed transaction 0x{:x}", signed.hash);
            client.send_raw_transaction(signed.raw).await
        }
        Submission::Unsigned(request) => {
            debug!("Submitting transaction from {:?} through the node", request.from);
            client.send_transaction(request).await
        }
    };

    let mut state = SubmissionState::Unsent;
    while let Some(event) = events.recv().await {
        match event {
            TxEvent::HashAccepted(hash) => {
                if state != SubmissionState::Unsent {
                    debug!("Ignoring repeated acceptance of 0x{:x}", hash);
                    continue;
                }
                state = SubmissionState::Pending(hash);
                info!("Transaction 0x{:x} accepted into the pending pool", hash);
                if mode == CompletionMode::HashOnly {
                    return Ok(Submitted::Hash(hash));
                }
            }
            TxEvent::Confirmed(receipt) => {
                let hash = receipt.transaction_hash;
                if mode == CompletionMode::HashOnly {
                    return Ok(Submitted::Hash(hash));
                }
                if !receipt.status {
                    warn!("Transaction 0x{:x} reverted", hash);
                    return Err(BindingError::ConfirmationFailed {
                        hash,
                        message: "transaction reverted".to_string(),
                    });
                }
                state = SubmissionState::Confirmed(hash);
                debug!("Submission reached {:?}", state);
                info!(
                    "Transaction 0x{:x} confirmed in block {:?}",
                    hash, receipt.block_number
                );
                return Ok(Submitted::Receipt(receipt));
            }
            TxEvent::Error(error) => {
                return Err(fail(state, error.to_string()));
            }
        }
    }

    Err(fail(state, "event stream closed before completion".to_string()))
}

fn fail(state: SubmissionState, message: String) -> BindingError {
    debug!("Submission moved from {:?} to {:?}", state, SubmissionState::Failed);
    match state.hash() {
        Some(hash) => {
            warn!("Transaction 0x{:x} failed after acceptance: {}", hash, message);
            BindingError::ConfirmationFailed { hash, message }
        }
        None => {
            warn!("Transaction rejected: {}", message);
            BindingError::SubmissionRejected(message)
        }
    }
}
