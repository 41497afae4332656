pub mod abi;
pub mod client;
pub mod compiler;
pub mod contract;
pub mod decoder;
pub mod deployer;
pub mod encoder;
pub mod error;
pub mod provider;
pub mod selectors;
pub mod signer;
pub mod submit;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use error::{BindingError, ClientError, ErrorKind};

/// A log as emitted by the chain, before any interface-based decoding.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub log_index: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub block_number: Option<u64>,
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub status: bool,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
    pub logs: Vec<RawLog>,
}

/// The fields of a transaction needed to decode its input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub hash: B256,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub nonce: u64,
    pub input: Bytes,
    pub block_number: Option<u64>,
}

/// A transaction as assembled by a binding, before signing or dispatch.
///
/// `to` is `None` for contract creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub value: U256,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub nonce: Option<u64>,
    pub chain_id: Option<u64>,
    pub data: Bytes,
}

impl TransactionRequest {
    pub fn call(to: Address, data: Bytes) -> Self {
        Self {
            to: Some(to),
            data,
            ..Default::default()
        }
    }

    pub fn deployment(data: Bytes) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn is_deployment(&self) -> bool {
        self.to.is_none()
    }

    /// Copies every option the caller set onto the request.
    pub fn with_options(mut self, options: &TransactionOptions) -> Self {
        if let Some(value) = options.value {
            self.value = value;
        }
        self.gas_limit = options.gas_limit.or(self.gas_limit);
        self.gas_price = options.gas_price.or(self.gas_price);
        self.max_fee_per_gas = options.max_fee_per_gas.or(self.max_fee_per_gas);
        self.max_priority_fee_per_gas = options
            .max_priority_fee_per_gas
            .or(self.max_priority_fee_per_gas);
        self.nonce = options.nonce.or(self.nonce);
        self
    }
}

/// Caller-supplied overrides for a single transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOptions {
    pub value: Option<U256>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    /// Ignored when the account fetches nonces automatically.
    pub nonce: Option<u64>,
}

/// Chain id and gas defaults used to complete a transaction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSettings {
    pub chain_id: u64,
    pub default_gas_limit: u64,
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub priority_fee: Option<u128>,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            chain_id: 1,
            default_gas_limit: 100_000,
            gas_price: None,
            max_fee_per_gas: None,
            priority_fee: None,
        }
    }
}

/// When a submission resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionMode {
    /// Resolve as soon as the node accepts the transaction into its pending pool.
    HashOnly,
    /// Resolve once the transaction is mined and its receipt is available.
    AwaitReceipt,
}

impl FromStr for CompletionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hash-only" | "hash" => Ok(Self::HashOnly),
            "await-receipt" | "receipt" => Ok(Self::AwaitReceipt),
            other => Err(format!(
                "Unknown completion mode '{}'. Use 'hash-only' or 'await-receipt'",
                other
            )),
        }
    }
}

impl fmt::Display for CompletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HashOnly => f.write_str("hash-only"),
            Self::AwaitReceipt => f.write_str("await-receipt"),
        }
    }
}

/// Result of a submission, shaped by the [`CompletionMode`] it was sent with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Submitted {
    Hash(B256),
    Receipt(Receipt),
}

impl Submitted {
    pub fn transaction_hash(&self) -> B256 {
        match self {
            Self::Hash(hash) => *hash,
            Self::Receipt(receipt) => receipt.transaction_hash,
        }
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            Self::Hash(_) => None,
            Self::Receipt(receipt) => Some(receipt),
        }
    }
}
