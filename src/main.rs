use alloy::{dyn_abi::DynSolValue, json_abi::JsonAbi};
use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use contract_binder::config::Config;
use contract_binder::ethereum::abi::Artifact;
use contract_binder::ethereum::decoder::{DecodeStats, InputDecode, LogDecode};
use contract_binder::ethereum::encoder;
use contract_binder::ethereum::provider::RpcChainClient;
use contract_binder::ethereum::selectors::{selector_prefix, EntryKind, SelectorTable};
use contract_binder::ethereum::utils;
use contract_binder::{CompletionMode, ContractBinding, TransactionOptions};

fn artifact_arg() -> Arg {
    Arg::new("abi")
        .short('a')
        .long("abi")
        .value_name("FILE")
        .required(true)
        .help("Contract artifact (JSON with 'abi' and 'bytecode') or bare ABI array")
}

fn address_arg() -> Arg {
    Arg::new("address")
        .long("address")
        .value_name("ADDRESS")
        .required(true)
        .help("Deployed contract address")
}

fn function_arg() -> Arg {
    Arg::new("function")
        .short('f')
        .long("function")
        .value_name("NAME")
        .required(true)
        .help("Function name")
}

fn args_arg() -> Arg {
    Arg::new("args")
        .long("args")
        .value_name("JSON")
        .default_value("[]")
        .help("Arguments as a JSON array, e.g. '[\"0x...\", \"1000\"]'")
}

fn hash_arg() -> Arg {
    Arg::new("hash")
        .long("hash")
        .value_name("HASH")
        .required(true)
        .help("Transaction hash")
}

fn submission_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("mode")
                .long("mode")
                .value_name("MODE")
                .required(true)
                .value_parser(["hash-only", "await-receipt"])
                .help("Return once the node accepts the transaction, or once it is mined"),
        )
        .arg(
            Arg::new("signed")
                .long("signed")
                .help("Sign locally with the configured key instead of using a node-managed account")
                .action(ArgAction::SetTrue),
        )
        .arg(Arg::new("value").long("value").value_name("WEI").help("Value to send"))
        .arg(Arg::new("gas-limit").long("gas-limit").value_name("GAS"))
        .arg(Arg::new("gas-price").long("gas-price").value_name("WEI"))
        .arg(Arg::new("max-fee").long("max-fee").value_name("WEI"))
        .arg(Arg::new("priority-fee").long("priority-fee").value_name("WEI"))
        .arg(
            Arg::new("nonce")
                .long("nonce")
                .value_name("NONCE")
                .help("Explicit nonce, used when auto_nonce is off"),
        )
}

fn cli() -> Command {
    Command::new("contract-binder")
        .version("0.1.0")
        .about("Deploy, call and decode Ethereum smart contracts from their ABI")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Path to configuration file"),
        )
        .arg(
            Arg::new("network")
                .short('n')
                .long("network")
                .value_name("NETWORK")
                .global(true)
                .help("Network to use (ethereum, sepolia, local)"),
        )
        .arg(
            Arg::new("rpc-url")
                .short('r')
                .long("rpc-url")
                .value_name("URL")
                .global(true)
                .help("RPC endpoint URL"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a sample configuration file and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config-path")
                .long("config-path")
                .help("Print the default configuration file path and exit")
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("selectors")
                .about("List function selectors and event topics")
                .arg(artifact_arg()),
        )
        .subcommand(
            Command::new("encode-call")
                .about("Encode call data for a function")
                .arg(artifact_arg())
                .arg(function_arg())
                .arg(args_arg()),
        )
        .subcommand(
            Command::new("encode-deploy")
                .about("Encode deployment data: bytecode followed by constructor arguments")
                .arg(artifact_arg())
                .arg(args_arg()),
        )
        .subcommand(
            Command::new("call")
                .about("Call a function with eth_call and decode its outputs")
                .arg(artifact_arg())
                .arg(address_arg())
                .arg(function_arg())
                .arg(args_arg()),
        )
        .subcommand(submission_args(
            Command::new("deploy")
                .about("Deploy the contract")
                .arg(artifact_arg())
                .arg(args_arg()),
        ))
        .subcommand(submission_args(
            Command::new("send")
                .about("Send a transaction calling a function")
                .arg(artifact_arg())
                .arg(address_arg())
                .arg(function_arg())
                .arg(args_arg()),
        ))
        .subcommand(
            Command::new("decode-receipt")
                .about("Decode the logs of a mined transaction")
                .arg(artifact_arg())
                .arg(hash_arg()),
        )
        .subcommand(
            Command::new("decode-input")
                .about("Decode the input of a transaction")
                .arg(artifact_arg())
                .arg(hash_arg()),
        )
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing --{}", name))
}

fn parse_args(matches: &ArgMatches) -> Result<Value> {
    let args = required(matches, "args")?;
    serde_json::from_str(args).map_err(|e| anyhow!("Invalid --args JSON: {}", e))
}

fn arg_count(args: &Value) -> usize {
    args.as_array().map(Vec::len).unwrap_or_default()
}

fn function_args(abi: &JsonAbi, name: &str, args: &Value) -> Result<Vec<DynSolValue>> {
    let function = encoder::find_function(abi, name, arg_count(args))?;
    utils::json_args(args, &function.inputs)
}

fn constructor_args(abi: &JsonAbi, args: &Value) -> Result<Vec<DynSolValue>> {
    let params = abi
        .constructor()
        .map(|constructor| constructor.inputs.as_slice())
        .unwrap_or_default();
    utils::json_args(args, params)
}

fn transaction_options(matches: &ArgMatches) -> Result<TransactionOptions> {
    let amount = |name: &str| -> Result<Option<u128>> {
        matches
            .get_one::<String>(name)
            .map(|value| {
                let value = utils::validate_hex_value(value)?;
                u128::try_from(value).map_err(|_| anyhow!("--{} is too large", name))
            })
            .transpose()
    };
    let integer = |name: &str| -> Result<Option<u64>> {
        matches
            .get_one::<String>(name)
            .map(|value| {
                value
                    .parse::<u64>()
                    .map_err(|e| anyhow!("Invalid --{}: {}", name, e))
            })
            .transpose()
    };

    Ok(TransactionOptions {
        value: matches
            .get_one::<String>("value")
            .map(|value| utils::validate_hex_value(value))
            .transpose()?,
        gas_limit: integer("gas-limit")?,
        gas_price: amount("gas-price")?,
        max_fee_per_gas: amount("max-fee")?,
        max_priority_fee_per_gas: amount("priority-fee")?,
        nonce: integer("nonce")?,
    })
}

fn completion_mode(matches: &ArgMatches) -> Result<CompletionMode> {
    required(matches, "mode")?.parse().map_err(|e: String| anyhow!(e))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn log_to_json(result: &LogDecode) -> Result<Value> {
    Ok(match result {
        LogDecode::Decoded(decoded) => json!({
            "event": decoded.name,
            "address": decoded.log.address,
            "log_index": decoded.log.log_index,
            "params": utils::named_values_to_json(&decoded.params),
        }),
        LogDecode::PassThrough(log) => json!({ "undecoded": serde_json::to_value(log)? }),
        LogDecode::Failed { log, error } => json!({
            "error": error.to_string(),
            "log": serde_json::to_value(log)?,
        }),
    })
}

struct Session {
    config: Config,
    network: Option<String>,
}

impl Session {
    fn binding(&self, artifact: Artifact) -> Result<ContractBinding> {
        let network = self.config.network(self.network.as_deref())?;
        let client = RpcChainClient::from_network(network)?;
        self.bind(artifact, client)
    }

    /// Like [`Session::binding`], but checks the endpoint first. Signed
    /// submissions also require the endpoint to serve the configured chain.
    async fn submission_binding(&self, artifact: Artifact, signed: bool) -> Result<ContractBinding> {
        let network = self.config.network(self.network.as_deref())?;
        let client = RpcChainClient::from_network(network)?;
        client.validate_connection().await?;
        if signed {
            client.ensure_chain(network.chain_id).await?;
        }
        self.bind(artifact, client)
    }

    fn bind(&self, artifact: Artifact, client: RpcChainClient) -> Result<ContractBinding> {
        let network = self.config.network(self.network.as_deref())?;
        let account = self.config.account.account(network.chain_settings())?;
        Ok(ContractBinding::new(
            artifact.abi,
            artifact.bytecode,
            Arc::new(client),
            account,
        ))
    }
}

async fn run(session: Session, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("selectors", sub)) => {
            let artifact = Artifact::load(required(sub, "abi")?).await?;
            let mut entries: Vec<Value> = SelectorTable::build(&artifact.abi)
                .iter()
                .map(|(hash, entry)| {
                    let selector = match entry.kind() {
                        EntryKind::Function => format!("{}", selector_prefix(hash)),
                        EntryKind::Event => format!("{}", hash),
                    };
                    json!({
                        "kind": format!("{:?}", entry.kind()).to_lowercase(),
                        "signature": entry.signature(),
                        "selector": selector,
                    })
                })
                .collect();
            entries.sort_by_key(|entry| entry["signature"].to_string());
            print_json(&Value::Array(entries))
        }
        Some(("encode-call", sub)) => {
            let artifact = Artifact::load(required(sub, "abi")?).await?;
            let name = required(sub, "function")?;
            let args = function_args(&artifact.abi, name, &parse_args(sub)?)?;
            let binding = session.binding(artifact)?;
            println!("{}", binding.encode_call(name, &args)?);
            Ok(())
        }
        Some(("encode-deploy", sub)) => {
            let artifact = Artifact::load(required(sub, "abi")?).await?;
            let args = constructor_args(&artifact.abi, &parse_args(sub)?)?;
            let binding = session.binding(artifact)?;
            println!("{}", binding.encode_deployment(&args)?);
            Ok(())
        }
        Some(("call", sub)) => {
            let artifact = Artifact::load(required(sub, "abi")?).await?;
            let address = utils::validate_address(required(sub, "address")?)?;
            let name = required(sub, "function")?;
            let args = function_args(&artifact.abi, name, &parse_args(sub)?)?;

            let binding = session.binding(artifact)?.at(address);
            let outputs = binding.call(name, &args).await?;
            print_json(&Value::Array(outputs.iter().map(utils::value_to_json).collect()))
        }
        Some(("deploy", sub)) => {
            let artifact = Artifact::load(required(sub, "abi")?).await?;
            let args = constructor_args(&artifact.abi, &parse_args(sub)?)?;
            let options = transaction_options(sub)?;
            let mode = completion_mode(sub)?;

            let signed = sub.get_flag("signed");
            let mut binding = session.submission_binding(artifact, signed).await?;
            let outcome = if signed {
                binding.deploy_signed(&args, &options, mode).await?
            } else {
                binding.deploy(&args, &options, mode).await?
            };
            print_json(&json!({
                "outcome": serde_json::to_value(&outcome)?,
                "address": binding.address(),
            }))
        }
        Some(("send", sub)) => {
            let artifact = Artifact::load(required(sub, "abi")?).await?;
            let address = utils::validate_address(required(sub, "address")?)?;
            let name = required(sub, "function")?;
            let args = function_args(&artifact.abi, name, &parse_args(sub)?)?;
            let options = transaction_options(sub)?;
            let mode = completion_mode(sub)?;

            let signed = sub.get_flag("signed");
            let mut binding = session.submission_binding(artifact, signed).await?.at(address);
            let outcome = if signed {
                binding.send_signed(name, &args, &options, mode).await?
            } else {
                binding.send(name, &args, &options, mode).await?
            };
            print_json(&serde_json::to_value(&outcome)?)
        }
        Some(("decode-receipt", sub)) => {
            let artifact = Artifact::load(required(sub, "abi")?).await?;
            let hash = utils::validate_hash(required(sub, "hash")?)?;

            let binding = session.binding(artifact)?;
            let results = binding.decode_receipt_logs(hash).await?;
            let stats = DecodeStats::of(&results);
            let logs = results
                .iter()
                .map(log_to_json)
                .collect::<Result<Vec<_>>>()?;
            print_json(&json!({ "logs": logs, "stats": serde_json::to_value(stats)? }))
        }
        Some(("decode-input", sub)) => {
            let artifact = Artifact::load(required(sub, "abi")?).await?;
            let hash = utils::validate_hash(required(sub, "hash")?)?;

            let binding = session.binding(artifact)?;
            match binding.decode_transaction_input(hash).await? {
                InputDecode::Decoded(call) => print_json(&json!({
                    "function": call.name,
                    "signature": call.signature,
                    "params": utils::named_values_to_json(&call.params),
                })),
                InputDecode::Undecoded(input) => print_json(&json!({ "undecoded": input })),
            }
        }
        _ => Err(anyhow!("No command given; see --help")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries command output only
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let matches = cli().get_matches();

    if matches.get_flag("generate-config") {
        let sample_config = Config::generate_sample();
        println!("{}", sample_config);
        return Ok(());
    }

    if matches.get_flag("config-path") {
        match Config::default_config_path() {
            Ok(path) => {
                println!("{}", path.display());
                return Ok(());
            }
            Err(e) => {
                error!("Could not determine default config path: {}", e);
                return Err(e);
            }
        }
    }

    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let mut config = Config::load_or_default(config_path).await;

    let network = matches.get_one::<String>("network").cloned();
    if let Some(rpc_url) = matches.get_one::<String>("rpc-url") {
        let name = network.as_deref().unwrap_or(&config.default_network).to_string();
        match config.networks.get_mut(&name) {
            Some(network_config) => network_config.rpc_url = rpc_url.clone(),
            None => return Err(anyhow!("Unknown network: '{}'", name)),
        }
    }

    info!(
        "Using network {}",
        network.as_deref().unwrap_or(&config.default_network)
    );

    if let Err(e) = run(Session { config, network }, &matches).await {
        error!("{}", e);
        return Err(e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn test_submission_requires_mode() {
        let missing = cli().try_get_matches_from([
            "contract-binder",
            "deploy",
            "--abi",
            "Token.json",
        ]);
        assert!(missing.is_err());

        let matches = cli()
            .try_get_matches_from([
                "contract-binder",
                "send",
                "--abi",
                "Token.json",
                "--address",
                "0x5fbdb2315678afecb367f032d93f642f64180aa3",
                "--function",
                "transfer",
                "--mode",
                "hash-only",
                "--signed",
                "--gas-price",
                "0x3b9aca00",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(completion_mode(sub).unwrap(), CompletionMode::HashOnly);
        assert!(sub.get_flag("signed"));
        assert_eq!(
            transaction_options(sub).unwrap().gas_price,
            Some(1_000_000_000)
        );
    }
}
