use alloy::{
    dyn_abi::{DynSolValue, FunctionExt},
    json_abi::JsonAbi,
    primitives::{Address, Bytes, B256},
};
use std::sync::Arc;
use tracing::{debug, info};

use super::client::ChainClient;
use super::decoder::{self, InputDecode, LogDecode};
use super::encoder;
use super::selectors::SelectorTable;
use super::signer::{apply_chain_defaults, resolve_nonce, SignedTransaction, TransactionSigner};
use super::submit::{submit, Submission};
use super::{
    BindingError, ChainSettings, CompletionMode, Receipt, Submitted, TransactionOptions,
    TransactionRequest,
};

/// Who transactions are sent as, and how they are completed before sending.
#[derive(Debug, Clone, Default)]
pub struct Account {
    /// Sender for unsigned transactions and calls. Falls back to the signer's address.
    pub from: Option<Address>,
    pub signer: Option<TransactionSigner>,
    /// Query the pending nonce before each signed transaction.
    pub auto_nonce: bool,
    pub chain: ChainSettings,
}

impl Account {
    pub fn sender(&self) -> Option<Address> {
        self.from
            .or_else(|| self.signer.as_ref().map(TransactionSigner::address))
    }
}

/// A contract interface bound to a chain client, and optionally to a deployed address.
///
/// Deploying and sending take `&mut self`, so operations on one binding never
/// overlap. Separate bindings sharing a signing key are not coordinated: callers
/// sending concurrently from one key must serialize those sends themselves, or
/// the pending-nonce queries can race.
#[derive(Debug, Clone)]
pub struct ContractBinding {
    abi: JsonAbi,
    bytecode: Option<Bytes>,
    selectors: SelectorTable,
    client: Arc<dyn ChainClient>,
    account: Account,
    address: Option<Address>,
    transaction_hash: Option<B256>,
    receipt: Option<Receipt>,
}

impl ContractBinding {
    pub fn new(
        abi: JsonAbi,
        bytecode: Option<Bytes>,
        client: Arc<dyn ChainClient>,
        account: Account,
    ) -> Self {
        let selectors = SelectorTable::build(&abi);
        debug!(
            "Built selector table with {} entries for binding",
            selectors.len()
        );
        Self {
            abi,
            bytecode: bytecode.filter(|code| !code.is_empty()),
            selectors,
            client,
            account,
            address: None,
            transaction_hash: None,
            receipt: None,
        }
    }

    /// Binds to a contract that is already deployed.
    pub fn at(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Swaps the interface, rebuilding the selector table. Address, bytecode and
    /// the last outcome are kept.
    pub fn with_interface(mut self, abi: JsonAbi) -> Self {
        self.selectors = SelectorTable::build(&abi);
        debug!(
            "Rebuilt selector table with {} entries for binding",
            self.selectors.len()
        );
        self.abi = abi;
        self
    }

    pub fn code(&self) -> Option<&Bytes> {
        self.bytecode.as_ref()
    }

    pub fn interface(&self) -> &JsonAbi {
        &self.abi
    }

    pub fn selectors(&self) -> &SelectorTable {
        &self.selectors
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn set_address(&mut self, address: Address) {
        self.address = Some(address);
    }

    pub fn transaction_hash(&self) -> Option<B256> {
        self.transaction_hash
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        self.receipt.as_ref()
    }

    pub fn encode_deployment(&self, args: &[DynSolValue]) -> Result<Bytes, BindingError> {
        let bytecode = self.bytecode.as_ref().ok_or(BindingError::MissingBytecode)?;
        let params = self
            .abi
            .constructor()
            .map(|constructor| constructor.inputs.as_slice())
            .unwrap_or_default();
        encoder::encode_deployment(bytecode, params, args)
    }

    pub fn encode_call(&self, name: &str, args: &[DynSolValue]) -> Result<Bytes, BindingError> {
        let function = encoder::find_function(&self.abi, name, args.len())?;
        encoder::encode_call(function, args)
    }

    /// Runs `name` through `eth_call` and decodes its outputs. Nothing is sent.
    pub async fn call(
        &self,
        name: &str,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, BindingError> {
        let address = self.address.ok_or(BindingError::MissingAddress)?;
        let function = encoder::find_function(&self.abi, name, args.len())?;
        let data = encoder::encode_call(function, args)?;

        let mut request = TransactionRequest::call(address, data);
        request.from = self.account.sender();

        debug!("Calling {} on {:?}", function.signature(), address);
        let output = self
            .client
            .call(request)
            .await
            .map_err(|e| BindingError::CallFailed {
                function: name.to_string(),
                message: e.to_string(),
            })?;

        if output.is_empty() && !function.outputs.is_empty() {
            return Err(BindingError::CallFailed {
                function: name.to_string(),
                message: "empty return data; is there a contract at this address?".to_string(),
            });
        }

        function
            .abi_decode_output(&output, false)
            .map_err(|e| BindingError::CallFailed {
                function: name.to_string(),
                message: format!("failed to decode output: {}", e),
            })
    }

    /// Deploys through an account managed by the node.
    pub async fn deploy(
        &mut self,
        args: &[DynSolValue],
        options: &TransactionOptions,
        mode: CompletionMode,
    ) -> Result<Submitted, BindingError> {
        let data = self.encode_deployment(args)?;
        let mut request = TransactionRequest::deployment(data).with_options(options);
        request.from = self.account.sender();

        info!("Deploying contract ({} mode)", mode);
        let outcome = submit(self.client.as_ref(), Submission::Unsigned(request), mode).await?;
        self.record(&outcome, true);
        Ok(outcome)
    }

    /// Deploys with the local signing key.
    pub async fn deploy_signed(
        &mut self,
        args: &[DynSolValue],
        options: &TransactionOptions,
        mode: CompletionMode,
    ) -> Result<Submitted, BindingError> {
        let signer = self.account.signer.clone().ok_or(BindingError::MissingKey)?;
        let data = self.encode_deployment(args)?;
        let request = TransactionRequest::deployment(data).with_options(options);
        let signed = self.prepare_signed(&signer, request, options).await?;

        info!(
            "Deploying contract from {:?} as 0x{:x} ({} mode)",
            signer.address(),
            signed.hash,
            mode
        );
        let outcome = submit(self.client.as_ref(), Submission::Signed(signed), mode).await?;
        self.record(&outcome, true);
        Ok(outcome)
    }

    /// Sends a state-changing call through an account managed by the node.
    pub async fn send(
        &mut self,
        name: &str,
        args: &[DynSolValue],
        options: &TransactionOptions,
        mode: CompletionMode,
    ) -> Result<Submitted, BindingError> {
        let address = self.address.ok_or(BindingError::MissingAddress)?;
        let data = self.encode_call(name, args)?;
        let mut request = TransactionRequest::call(address, data).with_options(options);
        request.from = self.account.sender();

        info!("Sending {} to {:?} ({} mode)", name, address, mode);
        let outcome = submit(self.client.as_ref(), Submission::Unsigned(request), mode).await?;
        self.record(&outcome, false);
        Ok(outcome)
    }

    /// Sends a state-changing call signed with the local key.
    pub async fn send_signed(
        &mut self,
        name: &str,
        args: &[DynSolValue],
        options: &TransactionOptions,
        mode: CompletionMode,
    ) -> Result<Submitted, BindingError> {
        let signer = self.account.signer.clone().ok_or(BindingError::MissingKey)?;
        let address = self.address.ok_or(BindingError::MissingAddress)?;
        let data = self.encode_call(name, args)?;
        let request = TransactionRequest::call(address, data).with_options(options);
        let signed = self.prepare_signed(&signer, request, options).await?;

        info!(
            "Sending {} to {:?} from {:?} as 0x{:x} ({} mode)",
            name,
            address,
            signer.address(),
            signed.hash,
            mode
        );
        let outcome = submit(self.client.as_ref(), Submission::Signed(signed), mode).await?;
        self.record(&outcome, false);
        Ok(outcome)
    }

    /// Fetches the receipt of `hash` and decodes its logs against this interface.
    ///
    /// Logs from other contracts pass through undecoded; a log that matches an
    /// event but does not fit its types fails on its own.
    pub async fn decode_receipt_logs(&self, hash: B256) -> Result<Vec<LogDecode>, BindingError> {
        let receipt = self
            .client
            .transaction_receipt(hash)
            .await
            .map_err(|e| BindingError::CallFailed {
                function: format!("eth_getTransactionReceipt(0x{:x})", hash),
                message: e.to_string(),
            })?
            .ok_or(BindingError::TransactionNotFound(hash))?;

        debug!("Decoding {} logs of 0x{:x}", receipt.logs.len(), hash);
        Ok(decoder::decode_logs(&receipt.logs, &self.selectors))
    }

    /// Fetches transaction `hash` and decodes its input against this interface.
    pub async fn decode_transaction_input(&self, hash: B256) -> Result<InputDecode, BindingError> {
        let transaction = self
            .client
            .transaction(hash)
            .await
            .map_err(|e| BindingError::CallFailed {
                function: format!("eth_getTransactionByHash(0x{:x})", hash),
                message: e.to_string(),
            })?
            .ok_or(BindingError::TransactionNotFound(hash))?;

        decoder::decode_input(&transaction.input, &self.selectors)
    }

    /// Completes `request` (nonce, gas, chain id) and signs it.
    async fn prepare_signed(
        &self,
        signer: &TransactionSigner,
        mut request: TransactionRequest,
        options: &TransactionOptions,
    ) -> Result<SignedTransaction, BindingError> {
        let from = signer.address();
        request.from = Some(from);
        request.nonce = if self.account.auto_nonce {
            Some(resolve_nonce(self.client.as_ref(), from).await?)
        } else {
            Some(options.nonce.ok_or_else(|| {
                BindingError::InvalidOptions(
                    "a nonce is required when automatic nonce fetching is off".to_string(),
                )
            })?)
        };

        let request = apply_chain_defaults(request, &self.account.chain)?;
        signer.sign(&request)
    }

    /// Hash and receipt always describe the same transaction; a hash-only
    /// outcome clears the previous receipt.
    fn record(&mut self, outcome: &Submitted, deployment: bool) {
        self.transaction_hash = Some(outcome.transaction_hash());
        self.receipt = outcome.receipt().cloned();
        if deployment {
            if let Some(address) = self.receipt.as_ref().and_then(|r| r.contract_address) {
                info!("Contract deployed at {:?}", address);
                self.address = Some(address);
            }
        }
    }
}
