//! Contract bindings: selector tables, call encoding, transaction signing and
//! submission, and receipt/log decoding against a contract interface.

pub mod config;
pub mod ethereum;

pub use ethereum::contract::{Account, ContractBinding};
pub use ethereum::deployer::{ContractFactory, Deployment};
pub use ethereum::{BindingError, CompletionMode, Submitted, TransactionOptions};
