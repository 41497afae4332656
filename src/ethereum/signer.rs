use alloy::{
    consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy},
    eips::eip2718::Encodable2718,
    primitives::{Address, Bytes, TxKind, B256},
    signers::{local::PrivateKeySigner, SignerSync},
};
use std::str::FromStr;
use tracing::debug;

use super::client::ChainClient;
use super::{BindingError, ChainSettings, TransactionRequest};

/// A signed, serialized transaction. Submit it once: a second submission under the
/// same nonce is either rejected or replaces the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: B256,
    pub raw: Bytes,
}

/// Signs transaction requests with a local private key.
#[derive(Debug, Clone)]
pub struct TransactionSigner {
    key: PrivateKeySigner,
}

impl TransactionSigner {
    pub fn new(key: PrivateKeySigner) -> Self {
        Self { key }
    }

    /// Parses a hex private key, with or without `0x`.
    pub fn from_hex(private_key: &str) -> Result<Self, BindingError> {
        let private_key = private_key.trim();
        let private_key = private_key
            .strip_prefix("0x")
            .or_else(|| private_key.strip_prefix("0X"))
            .unwrap_or(private_key);

        if private_key.is_empty() {
            return Err(BindingError::MissingKey);
        }

        PrivateKeySigner::from_str(private_key)
            .map(Self::new)
            .map_err(|e| BindingError::InvalidKey(e.to_string()))
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }

    /// Signs a fully populated request.
    ///
    /// The request must already carry its nonce, gas limit and fee fields; the
    /// signature covers exactly those values and the request is not touched.
    /// Requests with `max_fee_per_gas` become EIP-1559 transactions, the rest
    /// legacy EIP-155 ones.
    pub fn sign(&self, request: &TransactionRequest) -> Result<SignedTransaction, BindingError> {
        let nonce = request
            .nonce
            .ok_or_else(|| BindingError::InvalidOptions("nonce is not set".to_string()))?;
        let gas_limit = request
            .gas_limit
            .ok_or_else(|| BindingError::InvalidOptions("gas limit is not set".to_string()))?;
        let chain_id = request
            .chain_id
            .ok_or_else(|| BindingError::InvalidOptions("chain id is not set".to_string()))?;
        let to = match request.to {
            Some(address) => TxKind::Call(address),
            None => TxKind::Create,
        };

        let envelope: TxEnvelope = match request.max_fee_per_gas {
            Some(max_fee_per_gas) => {
                let tx = TxEip1559 {
                    chain_id,
                    nonce,
                    gas_limit,
                    max_fee_per_gas,
                    max_priority_fee_per_gas: request.max_priority_fee_per_gas.unwrap_or(0),
                    to,
                    value: request.value,
                    input: request.data.clone(),
                    ..Default::default()
                };
                let signature = self
                    .key
                    .sign_hash_sync(&tx.signature_hash())
                    .map_err(|e| BindingError::Signing(e.to_string()))?;
                tx.into_signed(signature).into()
            }
            None => {
                let gas_price = request.gas_price.ok_or_else(|| {
                    BindingError::InvalidOptions("gas price is not set".to_string())
                })?;
                let tx = TxLegacy {
                    chain_id: Some(chain_id),
                    nonce,
                    gas_price,
                    gas_limit,
                    to,
                    value: request.value,
                    input: request.data.clone(),
                    ..Default::default()
                };
                let signature = self
                    .key
                    .sign_hash_sync(&tx.signature_hash())
                    .map_err(|e| BindingError::Signing(e.to_string()))?;
                tx.into_signed(signature).into()
            }
        };

        let signed = SignedTransaction {
            hash: *envelope.tx_hash(),
            raw: envelope.encoded_2718().into(),
        };
        debug!("Signed transaction 0x{:x} with nonce {}", signed.hash, nonce);
        Ok(signed)
    }
}

/// Queries the pending transaction count of `address`.
///
/// One query per call, never retried: a stale nonce would produce a duplicate or
/// replacement transaction.
pub async fn resolve_nonce(client: &dyn ChainClient, address: Address) -> Result<u64, BindingError> {
    let nonce = client
        .pending_nonce(address)
        .await
        .map_err(|e| BindingError::NonceResolutionFailed {
            address,
            message: e.to_string(),
        })?;
    debug!("Resolved pending nonce {} for {:?}", nonce, address);
    Ok(nonce)
}

/// Fills gas limit, fee fields and chain id from `chain` where the request has none.
///
/// A configured `max_fee_per_gas` selects EIP-1559 fees; otherwise a gas price is
/// required.
pub fn apply_chain_defaults(
    mut request: TransactionRequest,
    chain: &ChainSettings,
) -> Result<TransactionRequest, BindingError> {
    request.chain_id = request.chain_id.or(Some(chain.chain_id));
    request.gas_limit = request.gas_limit.or(Some(chain.default_gas_limit));

    if request.gas_price.is_none() {
        request.max_fee_per_gas = request.max_fee_per_gas.or(chain.max_fee_per_gas);
    }
    if request.max_fee_per_gas.is_some() {
        request.max_priority_fee_per_gas = request
            .max_priority_fee_per_gas
            .or(chain.priority_fee)
            .or(Some(0));
    } else {
        request.gas_price = request.gas_price.or(chain.gas_price);
        if request.gas_price.is_none() {
            return Err(BindingError::InvalidOptions(
                "no gas price given and no default configured for this chain".to_string(),
            ));
        }
    }

    Ok(request)
}
