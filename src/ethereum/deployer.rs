use alloy::{
    dyn_abi::DynSolValue,
    json_abi::JsonAbi,
    primitives::{Address, Bytes},
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::client::ChainClient;
use super::compiler::{CompiledContract, Compiler};
use super::contract::{Account, ContractBinding};
use super::{BindingError, CompletionMode, Submitted, TransactionOptions};

/// A freshly deployed contract and how its submission ended.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub binding: ContractBinding,
    pub outcome: Submitted,
}

/// Creates bindings that share one chain client and one account.
#[derive(Debug, Clone)]
pub struct ContractFactory {
    client: Arc<dyn ChainClient>,
    account: Account,
    compiler: Option<Arc<dyn Compiler>>,
}

impl ContractFactory {
    pub fn new(client: Arc<dyn ChainClient>, account: Account) -> Self {
        Self {
            client,
            account,
            compiler: None,
        }
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// A binding that is not yet deployed.
    pub fn binding(&self, abi: JsonAbi, bytecode: Option<Bytes>) -> ContractBinding {
        ContractBinding::new(abi, bytecode, self.client.clone(), self.account.clone())
    }

    /// A binding to a contract already deployed at `address`.
    pub fn instance(&self, abi: JsonAbi, address: Address) -> ContractBinding {
        self.binding(abi, None).at(address)
    }

    /// Deploys through an account managed by the node.
    pub async fn deploy(
        &self,
        abi: JsonAbi,
        bytecode: Bytes,
        args: &[DynSolValue],
        options: &TransactionOptions,
        mode: CompletionMode,
    ) -> Result<Deployment, BindingError> {
        let mut binding = self.binding(abi, Some(bytecode));
        let outcome = binding.deploy(args, options, mode).await?;
        Ok(Deployment { binding, outcome })
    }

    /// Deploys with the local signing key.
    pub async fn deploy_signed(
        &self,
        abi: JsonAbi,
        bytecode: Bytes,
        args: &[DynSolValue],
        options: &TransactionOptions,
        mode: CompletionMode,
    ) -> Result<Deployment, BindingError> {
        if self.account.signer.is_none() {
            return Err(BindingError::MissingKey);
        }
        let mut binding = self.binding(abi, Some(bytecode));
        let outcome = binding.deploy_signed(args, options, mode).await?;
        Ok(Deployment { binding, outcome })
    }

    /// Compiles `sources`, failing on the first report of any error.
    pub async fn compile(
        &self,
        sources: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, CompiledContract>, BindingError> {
        let compiler = self
            .compiler
            .as_ref()
            .ok_or_else(|| BindingError::Compilation("no compiler configured".to_string()))?;

        let output = compiler
            .compile(sources)
            .await
            .map_err(|e| BindingError::Compilation(e.to_string()))?;

        if !output.errors.is_empty() {
            for error in &output.errors {
                warn!("Compilation error: {}", error.trim_end());
            }
            return Err(BindingError::Compilation(output.errors.join("\n")));
        }

        info!("Compiled {} contracts", output.contracts.len());
        Ok(output.contracts)
    }

    /// Compiles `sources` into undeployed bindings keyed by contract name.
    pub async fn instances(
        &self,
        sources: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, ContractBinding>, BindingError> {
        let contracts = self.compile(sources).await?;
        Ok(contracts
            .into_iter()
            .map(|(name, contract)| {
                let binding = self.binding(contract.abi, Some(contract.bytecode));
                (name, binding)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethereum::compiler::CompilerOutput;
    use crate::ethereum::signer::TransactionSigner;
    use crate::ethereum::testing::{
        erc20_abi, MockChainClient, DEPLOYED_ADDRESS, ERC20_BYTECODE, TEST_KEY,
    };
    use crate::ethereum::{ChainSettings, ErrorKind};
    use alloy::primitives::U256;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct FixedCompiler(CompilerOutput);

    #[async_trait]
    impl Compiler for FixedCompiler {
        async fn compile(
            &self,
            _sources: &BTreeMap<String, String>,
        ) -> anyhow::Result<CompilerOutput> {
            Ok(self.0.clone())
        }
    }

    fn token_output() -> CompilerOutput {
        CompilerOutput {
            contracts: BTreeMap::from([(
                "Token".to_string(),
                CompiledContract {
                    abi: erc20_abi(),
                    bytecode: Bytes::from_static(&ERC20_BYTECODE),
                },
            )]),
            errors: Vec::new(),
        }
    }

    fn sources() -> BTreeMap<String, String> {
        BTreeMap::from([("Token.sol".to_string(), "contract Token {}".to_string())])
    }

    fn factory(client: &Arc<MockChainClient>, signed: bool) -> ContractFactory {
        let account = Account {
            signer: signed.then(|| TransactionSigner::from_hex(TEST_KEY).unwrap()),
            auto_nonce: true,
            chain: ChainSettings {
                gas_price: Some(1),
                ..Default::default()
            },
            ..Default::default()
        };
        ContractFactory::new(client.clone(), account)
    }

    #[tokio::test]
    async fn test_deploy_signed_without_key() {
        let client = Arc::new(MockChainClient::new());
        let err = factory(&client, false)
            .deploy_signed(
                erc20_abi(),
                Bytes::from_static(&ERC20_BYTECODE),
                &[],
                &TransactionOptions::default(),
                CompletionMode::AwaitReceipt,
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingKey);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_signed_returns_bound_contract() {
        let client = Arc::new(MockChainClient::new());
        let deployment = factory(&client, true)
            .deploy_signed(
                erc20_abi(),
                Bytes::from_static(&ERC20_BYTECODE),
                &[DynSolValue::Uint(U256::from(1_000), 256)],
                &TransactionOptions::default(),
                CompletionMode::AwaitReceipt,
            )
            .await
            .unwrap();

        assert_eq!(deployment.binding.address(), Some(DEPLOYED_ADDRESS));
        assert!(deployment.outcome.receipt().is_some());
    }

    #[tokio::test]
    async fn test_instances_from_compiler() {
        let client = Arc::new(MockChainClient::new());
        let factory = factory(&client, true).with_compiler(Arc::new(FixedCompiler(token_output())));

        let instances = factory.instances(&sources()).await.unwrap();
        let token = &instances["Token"];
        assert_eq!(token.code(), Some(&Bytes::from_static(&ERC20_BYTECODE)));
        assert_eq!(token.address(), None);
    }

    #[tokio::test]
    async fn test_compile_errors_fail_before_instances() {
        let client = Arc::new(MockChainClient::new());
        let mut output = token_output();
        output.errors.push("TypeError: undeclared identifier".to_string());
        let factory = factory(&client, true).with_compiler(Arc::new(FixedCompiler(output)));

        let err = factory.instances(&sources()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compilation);
        assert!(err.to_string().contains("undeclared identifier"));
    }

    #[tokio::test]
    async fn test_compile_without_compiler() {
        let client = Arc::new(MockChainClient::new());
        let err = factory(&client, false).compile(&sources()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compilation);
    }

    #[test]
    fn test_instance_is_bound() {
        let client = Arc::new(MockChainClient::new());
        let token = factory(&client, false).instance(erc20_abi(), DEPLOYED_ADDRESS);
        assert_eq!(token.address(), Some(DEPLOYED_ADDRESS));
        assert!(token.code().is_none());
    }
}
