use alloy::{json_abi::JsonAbi, primitives::Bytes};
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tracing::debug;

use super::utils::parse_hex_bytes;

/// A contract interface with its creation bytecode, as compilers and build tools
/// write them to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub abi: JsonAbi,
    pub bytecode: Option<Bytes>,
}

impl Artifact {
    /// Load an artifact from a JSON file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read artifact {:?}: {}", path, e))?;

        let artifact = Self::from_json(&content)
            .map_err(|e| anyhow!("Failed to parse artifact {:?}: {}", path, e))?;
        debug!(
            "Loaded artifact {:?} ({} functions, {} events, bytecode: {})",
            path,
            artifact.abi.functions().count(),
            artifact.abi.events().count(),
            artifact.bytecode.is_some()
        );
        Ok(artifact)
    }

    /// Accepts a bare ABI array, or an object with `abi` and an optional
    /// `bytecode` given either as a hex string or as `{ "object": "..." }`.
    pub fn from_json(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;

        match value {
            Value::Array(_) => Ok(Self {
                abi: serde_json::from_value(value)?,
                bytecode: None,
            }),
            Value::Object(mut object) => {
                let abi = object
                    .remove("abi")
                    .ok_or_else(|| anyhow!("Artifact has no 'abi' field"))?;
                // some tools store the ABI as an escaped JSON string
                let abi: JsonAbi = match abi {
                    Value::String(text) => serde_json::from_str(&text)?,
                    other => serde_json::from_value(other)?,
                };

                let bytecode = match object.get("bytecode") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(code)) => Some(code.as_str()),
                    Some(Value::Object(code)) => code.get("object").and_then(Value::as_str),
                    Some(other) => return Err(anyhow!("Unsupported bytecode format: {}", other)),
                };
                let bytecode = bytecode
                    .map(parse_hex_bytes)
                    .transpose()?
                    .filter(|code| !code.is_empty());

                Ok(Self { abi, bytecode })
            }
            other => Err(anyhow!(
                "Expected an ABI array or an artifact object, got: {}",
                other
            )),
        }
    }
}
