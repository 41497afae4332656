//! In-memory chain client and fixtures shared by the unit tests.

use alloy::{
    consensus::TxEnvelope,
    eips::eip2718::Decodable2718,
    json_abi::JsonAbi,
    primitives::{address, keccak256, Address, Bytes, B256, U256},
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::mpsc;

use super::client::{event_channel, ChainClient, TxEvent, TxEvents};
use super::{ClientError, RawLog, Receipt, TransactionDetails, TransactionRequest};

/// Well-known development key.
pub(crate) const TEST_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub(crate) const TEST_KEY_ADDRESS: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");
pub(crate) const ALICE: Address = address!("1111111111111111111111111111111111111111");
pub(crate) const BOB: Address = address!("2222222222222222222222222222222222222222");
pub(crate) const DEPLOYED_ADDRESS: Address = address!("5fbdb2315678afecb367f032d93f642f64180aa3");

const ERC20_ABI: &str = r#"[
    {"type":"constructor","inputs":[{"name":"initialSupply","type":"uint256"}],"stateMutability":"nonpayable"},
    {"type":"function","name":"name","inputs":[],"outputs":[{"name":"","type":"string"}],"stateMutability":"view"},
    {"type":"function","name":"decimals","inputs":[],"outputs":[{"name":"","type":"uint8"}],"stateMutability":"view"},
    {"type":"function","name":"totalSupply","inputs":[],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
    {"type":"function","name":"balanceOf","inputs":[{"name":"account","type":"address"}],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
    {"type":"function","name":"transfer","inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
    {"type":"function","name":"approve","inputs":[{"name":"spender","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
    {"type":"function","name":"transferFrom","inputs":[{"name":"from","type":"address"},{"name":"to","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
    {"type":"function","name":"allowance","inputs":[{"name":"owner","type":"address"},{"name":"spender","type":"address"}],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
    {"type":"event","name":"Transfer","inputs":[{"name":"from","type":"address","indexed":true},{"name":"to","type":"address","indexed":true},{"name":"value","type":"uint256","indexed":false}],"anonymous":false},
    {"type":"event","name":"Approval","inputs":[{"name":"owner","type":"address","indexed":true},{"name":"spender","type":"address","indexed":true},{"name":"value","type":"uint256","indexed":false}],"anonymous":false}
]"#;

pub(crate) const ERC20_BYTECODE: [u8; 5] = [0x60, 0x80, 0x60, 0x40, 0x52];

pub(crate) fn erc20_abi_json() -> &'static str {
    ERC20_ABI
}

pub(crate) fn erc20_abi() -> JsonAbi {
    serde_json::from_str(ERC20_ABI).unwrap()
}

pub(crate) fn raw_log(topics: Vec<B256>, data: Vec<u8>) -> RawLog {
    RawLog {
        address: DEPLOYED_ADDRESS,
        topics,
        data: data.into(),
        ..Default::default()
    }
}

/// A `Transfer(from, to, value)` log as an ERC-20 token emits it.
pub(crate) fn transfer_log(from: Address, to: Address, value: u64) -> RawLog {
    let topic = keccak256("Transfer(address,address,uint256)");
    raw_log(
        vec![topic, from.into_word(), to.into_word()],
        U256::from(value).to_be_bytes::<32>().to_vec(),
    )
}

/// Every request the mock received, in order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ClientCall {
    PendingNonce(Address),
    SendRaw(Bytes),
    Send(TransactionRequest),
    Call(TransactionRequest),
    Receipt(B256),
    Transaction(B256),
}

/// How the mock answers the next submission.
#[derive(Debug, Clone, Default)]
pub(crate) enum Script {
    #[default]
    Mine,
    StayPending,
    Reject(String),
    DropAfterAcceptance(String),
    Revert,
    DuplicateAcceptance,
}

#[derive(Debug, Default)]
pub(crate) struct MockChainClient {
    calls: Mutex<Vec<ClientCall>>,
    pending_nonce: Mutex<u64>,
    nonce_error: Mutex<Option<String>>,
    scripts: Mutex<VecDeque<Script>>,
    logs: Mutex<Vec<RawLog>>,
    call_result: Mutex<Bytes>,
    call_error: Mutex<Option<String>>,
    lookup_error: Mutex<Option<String>>,
    receipts: Mutex<HashMap<B256, Receipt>>,
    transactions: Mutex<HashMap<B256, TransactionDetails>>,
    held: Mutex<Vec<mpsc::Sender<TxEvent>>>,
}

impl MockChainClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn set_pending_nonce(&self, nonce: u64) {
        *self.pending_nonce.lock().unwrap() = nonce;
    }

    pub(crate) fn fail_nonce_queries(&self, message: &str) {
        *self.nonce_error.lock().unwrap() = Some(message.to_string());
    }

    pub(crate) fn script(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    /// Logs attached to every receipt mined from now on.
    pub(crate) fn emit_logs(&self, logs: Vec<RawLog>) {
        *self.logs.lock().unwrap() = logs;
    }

    pub(crate) fn respond_to_calls(&self, result: Result<Bytes, String>) {
        match result {
            Ok(bytes) => *self.call_result.lock().unwrap() = bytes,
            Err(message) => *self.call_error.lock().unwrap() = Some(message),
        }
    }

    /// Receipt and transaction lookups fail from now on.
    pub(crate) fn fail_lookups(&self, message: &str) {
        *self.lookup_error.lock().unwrap() = Some(message.to_string());
    }

    pub(crate) fn insert_transaction(&self, details: TransactionDetails) {
        self.transactions
            .lock()
            .unwrap()
            .insert(details.hash, details);
    }

    fn record(&self, call: ClientCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn receipt(&self, hash: B256, creation: bool, status: bool) -> Receipt {
        let logs = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .cloned()
            .map(|mut log| {
                log.transaction_hash = Some(hash);
                log
            })
            .collect();
        let receipt = Receipt {
            transaction_hash: hash,
            block_number: Some(1),
            status,
            gas_used: 21_000,
            contract_address: creation.then_some(DEPLOYED_ADDRESS),
            logs,
        };
        self.receipts.lock().unwrap().insert(hash, receipt.clone());
        receipt
    }

    fn dispatch(&self, hash: B256, creation: bool, details: TransactionDetails) -> TxEvents {
        let (sender, events) = event_channel();
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();

        let events_to_send = match script {
            Script::Reject(message) => vec![TxEvent::Error(ClientError(message))],
            Script::StayPending => vec![TxEvent::HashAccepted(hash)],
            Script::DropAfterAcceptance(message) => vec![
                TxEvent::HashAccepted(hash),
                TxEvent::Error(ClientError(message)),
            ],
            Script::Revert => vec![
                TxEvent::HashAccepted(hash),
                TxEvent::Confirmed(self.receipt(hash, creation, false)),
            ],
            Script::DuplicateAcceptance => vec![
                TxEvent::HashAccepted(hash),
                TxEvent::HashAccepted(hash),
                TxEvent::Confirmed(self.receipt(hash, creation, true)),
            ],
            Script::Mine => vec![
                TxEvent::HashAccepted(hash),
                TxEvent::Confirmed(self.receipt(hash, creation, true)),
            ],
        };

        let accepted = matches!(events_to_send.first(), Some(TxEvent::HashAccepted(_)));
        if accepted {
            *self.pending_nonce.lock().unwrap() += 1;
            self.insert_transaction(details);
        }
        let keep_open = matches!(events_to_send.as_slice(), [TxEvent::HashAccepted(_)]);

        for event in events_to_send {
            sender.try_send(event).unwrap();
        }
        if keep_open {
            self.held.lock().unwrap().push(sender);
        }
        events
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn pending_nonce(&self, address: Address) -> Result<u64, ClientError> {
        self.record(ClientCall::PendingNonce(address));
        if let Some(message) = self.nonce_error.lock().unwrap().clone() {
            return Err(ClientError(message));
        }
        Ok(*self.pending_nonce.lock().unwrap())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> TxEvents {
        self.record(ClientCall::SendRaw(raw.clone()));
        let hash = keccak256(&raw);

        let (to, nonce, value, input) = match TxEnvelope::decode_2718(&mut &raw[..]) {
            Ok(TxEnvelope::Legacy(signed)) => {
                let tx = signed.tx();
                (tx.to, tx.nonce, tx.value, tx.input.clone())
            }
            Ok(TxEnvelope::Eip1559(signed)) => {
                let tx = signed.tx();
                (tx.to, tx.nonce, tx.value, tx.input.clone())
            }
            other => panic!("mock cannot decode raw transaction: {:?}", other),
        };

        let details = TransactionDetails {
            hash,
            from: TEST_KEY_ADDRESS,
            to: to.to().copied(),
            value,
            nonce,
            input,
            block_number: Some(1),
        };
        self.dispatch(hash, to.is_create(), details)
    }

    async fn send_transaction(&self, request: TransactionRequest) -> TxEvents {
        self.record(ClientCall::Send(request.clone()));
        let nonce = *self.pending_nonce.lock().unwrap();
        let hash = keccak256(format!("{:?}/{}", request, nonce));

        let details = TransactionDetails {
            hash,
            from: request.from.unwrap_or_default(),
            to: request.to,
            value: request.value,
            nonce,
            input: request.data.clone(),
            block_number: Some(1),
        };
        self.dispatch(hash, request.is_deployment(), details)
    }

    async fn call(&self, request: TransactionRequest) -> Result<Bytes, ClientError> {
        self.record(ClientCall::Call(request));
        if let Some(message) = self.call_error.lock().unwrap().clone() {
            return Err(ClientError(message));
        }
        Ok(self.call_result.lock().unwrap().clone())
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>, ClientError> {
        self.record(ClientCall::Receipt(hash));
        if let Some(message) = self.lookup_error.lock().unwrap().clone() {
            return Err(ClientError(message));
        }
        Ok(self.receipts.lock().unwrap().get(&hash).cloned())
    }

    async fn transaction(&self, hash: B256) -> Result<Option<TransactionDetails>, ClientError> {
        self.record(ClientCall::Transaction(hash));
        if let Some(message) = self.lookup_error.lock().unwrap().clone() {
            return Err(ClientError(message));
        }
        Ok(self.transactions.lock().unwrap().get(&hash).cloned())
    }
}
