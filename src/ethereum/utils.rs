use alloy::{
    dyn_abi::{DynSolType, DynSolValue},
    json_abi::Param,
    primitives::{Address, Bytes, B256, U256},
};
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::str::FromStr;

use super::encoder::resolve_types;

/// Validates and normalizes an Ethereum address
pub fn validate_address(address: &str) -> Result<Address> {
    let address = address.trim();

    if address.is_empty() {
        return Err(anyhow!("Address cannot be empty"));
    }

    if !address.starts_with("0x") && !address.starts_with("0X") {
        return Err(anyhow!(
            "Invalid address format: '{}'. Ethereum addresses must start with '0x'",
            address
        ));
    }

    if address.len() != 42 {
        return Err(anyhow!(
            "Invalid address length: '{}'. Ethereum addresses must be exactly 42 characters (0x + 40 hex characters)",
            address
        ));
    }

    Address::from_str(address)
        .map_err(|e| anyhow!("Invalid Ethereum address: '{}'. Error: {}", address, e))
}

/// Parses a transaction or block hash.
pub fn validate_hash(hash: &str) -> Result<B256> {
    let hash = hash.trim();
    let digits = hash
        .strip_prefix("0x")
        .or_else(|| hash.strip_prefix("0X"))
        .unwrap_or(hash);

    if digits.len() != 64 {
        return Err(anyhow!(
            "Invalid hash length: '{}'. Hashes are 32 bytes (64 hex characters)",
            hash
        ));
    }

    B256::from_str(digits).map_err(|e| anyhow!("Invalid hash '{}': {}", hash, e))
}

/// Parses a decimal or `0x`-prefixed hex amount (values, gas prices).
pub fn validate_hex_value(value_str: &str) -> Result<U256> {
    let value_str = value_str.trim();
    if value_str.is_empty() {
        return Err(anyhow!("Value cannot be empty"));
    }

    match value_str
        .strip_prefix("0x")
        .or_else(|| value_str.strip_prefix("0X"))
    {
        Some(digits) => U256::from_str_radix(digits, 16)
            .map_err(|_| anyhow!("Invalid hexadecimal value: '{}'", value_str)),
        None => U256::from_str(value_str).map_err(|_| {
            anyhow!(
                "Invalid numeric value: '{}'. Use decimal format or '0x' prefixed hex",
                value_str
            )
        }),
    }
}

/// Decodes hex data such as bytecode, with or without `0x`.
pub fn parse_hex_bytes(data: &str) -> Result<Bytes> {
    let data = data.trim();
    let digits = data
        .strip_prefix("0x")
        .or_else(|| data.strip_prefix("0X"))
        .unwrap_or(data);
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| anyhow!("Invalid hex data: {}", e))
}

/// Creates user-friendly error messages for common RPC errors
pub fn interpret_rpc_error(error: &str) -> String {
    if error.contains("execution reverted") {
        "Transaction failed: The contract function reverted execution. This usually means the function's requirements were not met or an assertion failed.".to_string()
    } else if error.contains("insufficient funds") {
        "Transaction failed: Insufficient funds to cover gas costs. Make sure your account has enough ETH for gas fees.".to_string()
    } else if error.contains("gas required exceeds allowance") {
        "Transaction failed: Gas limit too low. Try increasing the gas limit for this transaction."
            .to_string()
    } else if error.contains("nonce too low") {
        "Transaction failed: Nonce too low. This usually means another transaction was already mined with this nonce.".to_string()
    } else if error.contains("replacement transaction underpriced") {
        "Transaction failed: Gas price too low to replace pending transaction. Increase the gas price.".to_string()
    } else if error.contains("connection refused") || error.contains("network unreachable") {
        "Network error: Cannot connect to RPC endpoint. Check your internet connection and RPC URL configuration.".to_string()
    } else if error.contains("timeout") || error.contains("timed out") {
        "Network error: Request timed out. The RPC endpoint may be overloaded or unreachable."
            .to_string()
    } else if error.contains("rate limit") {
        "Rate limit error: Too many requests to the RPC endpoint. Try again in a few moments or use a different endpoint.".to_string()
    } else if error.contains("method not found") {
        "RPC error: The requested method is not supported by this RPC endpoint. Try using a different endpoint.".to_string()
    } else {
        format!("RPC error: {}", error)
    }
}

/// Converts JSON arguments into values for `params`.
///
/// Arguments come as a JSON array in declaration order. The count is not checked
/// here; the encoder reports a mismatch with the function name attached.
pub fn json_args(args: &Value, params: &[Param]) -> Result<Vec<DynSolValue>> {
    let args = match args {
        Value::Array(args) => args,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(anyhow!(
                "Arguments must be a JSON array, got: {}",
                other
            ))
        }
    };

    let types = resolve_types(params)?;
    args.iter()
        .enumerate()
        .map(|(i, arg)| match types.get(i) {
            Some(ty) => json_to_value(arg, ty).map_err(|e| {
                anyhow!(
                    "Invalid parameter #{} ('{}' of type '{}'): {}",
                    i + 1,
                    params[i].name,
                    params[i].ty,
                    e
                )
            }),
            // surplus argument, left for the count check downstream
            None => Ok(json_untyped(arg)),
        })
        .collect()
}

/// Converts a JSON value into a value of type `ty`.
pub fn json_to_value(value: &Value, ty: &DynSolType) -> Result<DynSolValue> {
    match (value, ty) {
        (Value::String(s), _) => ty
            .coerce_str(s)
            .map_err(|e| anyhow!("'{}' is not a valid {}: {}", s, ty, e)),
        (Value::Number(n), DynSolType::Uint(_) | DynSolType::Int(_)) => ty
            .coerce_str(&n.to_string())
            .map_err(|e| anyhow!("{} is not a valid {}: {}", n, ty, e)),
        (Value::Bool(b), DynSolType::Bool) => Ok(DynSolValue::Bool(*b)),
        (Value::Array(items), DynSolType::Array(inner)) => items
            .iter()
            .map(|item| json_to_value(item, inner))
            .collect::<Result<Vec<_>>>()
            .map(DynSolValue::Array),
        (Value::Array(items), DynSolType::FixedArray(inner, len)) => {
            if items.len() != *len {
                return Err(anyhow!("expected {} elements, got {}", len, items.len()));
            }
            items
                .iter()
                .map(|item| json_to_value(item, inner))
                .collect::<Result<Vec<_>>>()
                .map(DynSolValue::FixedArray)
        }
        (Value::Array(items), DynSolType::Tuple(types)) => {
            if items.len() != types.len() {
                return Err(anyhow!(
                    "expected a tuple of {} elements, got {}",
                    types.len(),
                    items.len()
                ));
            }
            items
                .iter()
                .zip(types)
                .map(|(item, ty)| json_to_value(item, ty))
                .collect::<Result<Vec<_>>>()
                .map(DynSolValue::Tuple)
        }
        (other, ty) => Err(anyhow!("cannot convert {} into {}", other, ty)),
    }
}

fn json_untyped(value: &Value) -> DynSolValue {
    match value {
        Value::Bool(b) => DynSolValue::Bool(*b),
        Value::String(s) => DynSolValue::String(s.clone()),
        other => DynSolValue::String(other.to_string()),
    }
}

/// Renders a decoded value as JSON: checksummed addresses, decimal integers,
/// `0x`-hex bytes.
pub fn value_to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Address(addr) => Value::String(addr.to_checksum(None)),
        DynSolValue::Uint(num, _) => Value::String(num.to_string()),
        DynSolValue::Int(num, _) => Value::String(num.to_string()),
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(format!("0x{}", hex::encode(&word[..*size])))
        }
        DynSolValue::Function(function) => Value::String(format!("0x{}", hex::encode(function))),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(value_to_json).collect())
        }
        #[allow(unreachable_patterns)]
        other => Value::String(format!("{:?}", other)),
    }
}

/// Renders named values (decoded events or calls) as a JSON object.
pub fn named_values_to_json(params: &[(String, DynSolValue)]) -> Value {
    Value::Object(
        params
            .iter()
            .map(|(name, value)| (name.clone(), value_to_json(value)))
            .collect(),
    )
}
