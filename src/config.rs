use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;

use crate::ethereum::contract::Account;
use crate::ethereum::signer::TransactionSigner;
use crate::ethereum::utils;
use crate::ethereum::ChainSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub networks: HashMap<String, NetworkConfig>,
    pub default_network: String,
    #[serde(default)]
    pub account: AccountConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub gas: GasConfig,
}

/// Fee defaults in wei. TOML integers are 64-bit, which covers any realistic price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    pub default_gas_limit: u64,
    pub gas_price: Option<u64>,
    pub max_fee_per_gas: Option<u64>,
    pub priority_fee: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Sender for node-managed transactions and calls.
    pub address: Option<String>,
    /// Prefer the BINDER_PRIVATE_KEY environment variable over storing this on disk.
    pub private_key: Option<String>,
    #[serde(default = "default_auto_nonce")]
    pub auto_nonce: bool,
}

fn default_auto_nonce() -> bool {
    true
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            address: None,
            private_key: None,
            auto_nonce: default_auto_nonce(),
        }
    }
}

impl NetworkConfig {
    pub fn chain_settings(&self) -> ChainSettings {
        ChainSettings {
            chain_id: self.chain_id,
            default_gas_limit: self.gas.default_gas_limit,
            gas_price: self.gas.gas_price.map(u128::from),
            max_fee_per_gas: self.gas.max_fee_per_gas.map(u128::from),
            priority_fee: self.gas.priority_fee.map(u128::from),
        }
    }
}

impl AccountConfig {
    /// Builds the account transactions are sent as on a network.
    pub fn account(&self, chain: ChainSettings) -> Result<Account> {
        let from = self
            .address
            .as_deref()
            .map(utils::validate_address)
            .transpose()
            .map_err(|e| anyhow!("Invalid account address: {}", e))?;

        let signer = match self.private_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Some(TransactionSigner::from_hex(key)?),
            _ => None,
        };

        Ok(Account {
            from,
            signer,
            auto_nonce: self.auto_nonce,
            chain,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut networks = HashMap::new();

        networks.insert(
            "ethereum".to_string(),
            NetworkConfig {
                rpc_url: "https://eth-mainnet.g.alchemy.com/v2/demo".to_string(),
                chain_id: 1,
                gas: GasConfig {
                    default_gas_limit: 100000,
                    gas_price: None,
                    max_fee_per_gas: Some(50_000_000_000), // 50 Gwei
                    priority_fee: Some(2_000_000_000),     // 2 Gwei
                },
            },
        );

        networks.insert(
            "sepolia".to_string(),
            NetworkConfig {
                rpc_url: "https://eth-sepolia.g.alchemy.com/v2/demo".to_string(),
                chain_id: 11155111,
                gas: GasConfig {
                    default_gas_limit: 100000,
                    gas_price: None,
                    max_fee_per_gas: Some(20_000_000_000), // 20 Gwei
                    priority_fee: Some(1_000_000_000),     // 1 Gwei
                },
            },
        );

        networks.insert(
            "local".to_string(),
            NetworkConfig {
                rpc_url: "http://127.0.0.1:8545".to_string(),
                chain_id: 31337,
                gas: GasConfig {
                    default_gas_limit: 3_000_000,
                    gas_price: Some(1_000_000_000), // 1 Gwei
                    max_fee_per_gas: None,
                    priority_fee: None,
                },
            },
        );

        Self {
            networks,
            default_network: "ethereum".to_string(),
            account: AccountConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    anyhow!("Failed to create config directory {:?}: {}", parent, e)
                })?;
            }
        }

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {:?}: {}", path, e))?;

        Ok(())
    }

    /// Load configuration with fallback to default
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let mut config = match path {
            Some(path) => match Self::load_from_file(path).await {
                Ok(config) => {
                    tracing::info!("Loaded configuration from file");
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config file, using defaults: {}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.apply_env_vars();
        config
    }

    pub fn network(&self, name: Option<&str>) -> Result<&NetworkConfig> {
        let name = name.unwrap_or(&self.default_network);
        self.networks.get(name).ok_or_else(|| {
            let mut available: Vec<&str> = self.networks.keys().map(String::as_str).collect();
            available.sort_unstable();
            anyhow!(
                "Unknown network: '{}'. Available networks: {}",
                name,
                available.join(", ")
            )
        })
    }

    fn apply_env_vars(&mut self) {
        if let Ok(api_key) = std::env::var("ALCHEMY_API_KEY") {
            tracing::info!("Using ALCHEMY_API_KEY environment variable for RPC URLs");

            for (network_name, network_config) in &mut self.networks {
                if network_config.rpc_url.contains("alchemy.com/v2/demo") {
                    network_config.rpc_url = network_config
                        .rpc_url
                        .replace("/demo", &format!("/{}", api_key));
                    tracing::debug!("Updated {} RPC URL with API key", network_name);
                } else if network_config.rpc_url.contains("YOUR_API_KEY_HERE") {
                    network_config.rpc_url = network_config
                        .rpc_url
                        .replace("YOUR_API_KEY_HERE", &api_key);
                    tracing::debug!("Updated {} RPC URL with API key", network_name);
                }
            }
        } else {
            for (network_name, network_config) in &self.networks {
                if network_config.rpc_url.contains("/demo") {
                    tracing::warn!("Using demo RPC endpoint for {}, set ALCHEMY_API_KEY environment variable for better reliability", network_name);
                }
            }
        }

        if let Ok(private_key) = std::env::var("BINDER_PRIVATE_KEY") {
            tracing::debug!("Using BINDER_PRIVATE_KEY for signed transactions");
            self.account.private_key = Some(private_key);
        }

        if let Ok(address) = std::env::var("BINDER_ACCOUNT") {
            tracing::debug!("Using BINDER_ACCOUNT as sender {}", address);
            self.account.address = Some(address);
        }
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<std::path::PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("contract-binder").join("config.toml"))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample_config = r#"# contract-binder configuration file

# Network used when --network is not given
default_network = "ethereum"

[networks.ethereum]
rpc_url = "https://eth-mainnet.g.alchemy.com/v2/YOUR_API_KEY_HERE"
chain_id = 1

[networks.ethereum.gas]
default_gas_limit = 100000
max_fee_per_gas = 50_000_000_000  # 50 Gwei, signs EIP-1559 transactions
priority_fee = 2_000_000_000      # 2 Gwei

[networks.sepolia]
rpc_url = "https://eth-sepolia.g.alchemy.com/v2/YOUR_API_KEY_HERE"
chain_id = 11155111

[networks.sepolia.gas]
default_gas_limit = 100000
max_fee_per_gas = 20_000_000_000  # 20 Gwei
priority_fee = 1_000_000_000      # 1 Gwei

[networks.local]
rpc_url = "http://127.0.0.1:8545"
chain_id = 31337

[networks.local.gas]
default_gas_limit = 3000000
gas_price = 1_000_000_000  # 1 Gwei, signs legacy transactions

[account]
# address = "0x..."      # sender for node-managed accounts
# private_key = "0x..."  # better supplied through BINDER_PRIVATE_KEY
auto_nonce = true        # query the pending nonce before each signed transaction

# Environment variables that can be used:
# ALCHEMY_API_KEY - Your Alchemy API key (replaces YOUR_API_KEY_HERE above)
# BINDER_PRIVATE_KEY - Signing key for --signed submissions
# BINDER_ACCOUNT - Sender address
"#;
        sample_config.to_string()
    }
}
