//! Source-to-bytecode compilation through `solc --standard-json`.

use alloy::{json_abi::JsonAbi, primitives::Bytes};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::utils::parse_hex_bytes;

/// Interface and creation bytecode of one compiled contract.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledContract {
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilerOutput {
    /// Keyed by bare contract name.
    pub contracts: BTreeMap<String, CompiledContract>,
    /// Formatted messages of every diagnostic with severity `error`.
    pub errors: Vec<String>,
}

/// Turns a map of source name to source text into compiled contracts.
///
/// Reporting errors in [`CompilerOutput::errors`] rather than failing is fine;
/// callers reject any output that carries errors.
#[async_trait]
pub trait Compiler: Send + Sync + Debug {
    async fn compile(&self, sources: &BTreeMap<String, String>) -> Result<CompilerOutput>;
}

/// Runs a `solc` executable.
#[derive(Debug, Clone)]
pub struct SolcCompiler {
    executable: String,
}

impl Default for SolcCompiler {
    fn default() -> Self {
        Self::new("solc")
    }
}

impl SolcCompiler {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

#[async_trait]
impl Compiler for SolcCompiler {
    async fn compile(&self, sources: &BTreeMap<String, String>) -> Result<CompilerOutput> {
        let input = serde_json::to_vec(&StandardJsonInput::new(sources))?;

        let mut process = Command::new(&self.executable)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| anyhow!("{} subprocess spawning error: {}", self.executable, e))?;

        let mut stdin = process
            .stdin
            .take()
            .ok_or_else(|| anyhow!("{} stdin getting error", self.executable))?;
        stdin
            .write_all(&input)
            .await
            .map_err(|e| anyhow!("{} stdin writing error: {}", self.executable, e))?;
        drop(stdin);

        let output = process
            .wait_with_output()
            .await
            .map_err(|e| anyhow!("{} subprocess output error: {}", self.executable, e))?;
        if !output.status.success() {
            bail!(
                "{} error: {}",
                self.executable,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        debug!("Compiled {} sources with {}", sources.len(), self.executable);
        parse_standard_json(&output.stdout)
    }
}

#[derive(Debug, Serialize)]
struct StandardJsonInput {
    language: &'static str,
    sources: BTreeMap<String, SourceInput>,
    settings: Settings,
}

#[derive(Debug, Serialize)]
struct SourceInput {
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Settings {
    output_selection: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl StandardJsonInput {
    fn new(sources: &BTreeMap<String, String>) -> Self {
        let selection = vec!["abi".to_string(), "evm.bytecode.object".to_string()];
        let output_selection = BTreeMap::from([(
            "*".to_string(),
            BTreeMap::from([("*".to_string(), selection)]),
        )]);

        Self {
            language: "Solidity",
            sources: sources
                .iter()
                .map(|(name, content)| {
                    (
                        name.clone(),
                        SourceInput {
                            content: content.clone(),
                        },
                    )
                })
                .collect(),
            settings: Settings { output_selection },
        }
    }
}

#[derive(Debug, Deserialize)]
struct StandardJsonOutput {
    #[serde(default)]
    contracts: BTreeMap<String, BTreeMap<String, ContractOutput>>,
    #[serde(default)]
    errors: Vec<Diagnostic>,
}

#[derive(Debug, Deserialize)]
struct ContractOutput {
    abi: Option<JsonAbi>,
    evm: Option<EvmOutput>,
}

#[derive(Debug, Deserialize)]
struct EvmOutput {
    bytecode: Option<BytecodeOutput>,
}

#[derive(Debug, Deserialize)]
struct BytecodeOutput {
    object: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Diagnostic {
    severity: String,
    message: String,
    formatted_message: Option<String>,
}

/// Parses `solc --standard-json` output.
///
/// Contracts are keyed by their bare name; the source file they came from is
/// dropped.
pub fn parse_standard_json(stdout: &[u8]) -> Result<CompilerOutput> {
    let output: StandardJsonOutput = serde_json::from_slice(stdout)
        .map_err(|e| anyhow!("solc output parsing error: {}", e))?;

    let mut result = CompilerOutput::default();
    for diagnostic in output.errors {
        let text = diagnostic
            .formatted_message
            .unwrap_or(diagnostic.message);
        if diagnostic.severity == "error" {
            result.errors.push(text);
        } else {
            warn!("solc {}: {}", diagnostic.severity, text.trim_end());
        }
    }

    for (file, contracts) in output.contracts {
        for (name, contract) in contracts {
            let abi = contract.abi.unwrap_or_default();
            let bytecode = match contract.evm.and_then(|evm| evm.bytecode) {
                Some(bytecode) => parse_hex_bytes(&bytecode.object)
                    .map_err(|e| anyhow!("Bytecode of {}:{}: {}", file, name, e))?,
                None => Bytes::new(),
            };
            if result.contracts.contains_key(&name) {
                warn!("Contract {} in {} replaces an earlier one of the same name", name, file);
            }
            result
                .contracts
                .insert(name, CompiledContract { abi, bytecode });
        }
    }

    Ok(result)
}
