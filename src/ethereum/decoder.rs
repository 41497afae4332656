use alloy::{
    dyn_abi::{DynSolType, DynSolValue},
    json_abi::{Event, EventParam},
    primitives::{Bytes, B256},
};
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::encoder::resolve_types;
use super::selectors::SelectorTable;
use super::{BindingError, RawLog};

/// A log matched to an event of the interface, with its parameters decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLog {
    /// Name of the matched event.
    pub name: String,
    /// Parameters in declaration order; unnamed ones are called `arg{i}`.
    pub params: Vec<(String, DynSolValue)>,
    pub log: RawLog,
}

impl DecodedLog {
    pub fn get(&self, name: &str) -> Option<&DynSolValue> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| value)
    }
}

/// Result of decoding a single log of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum LogDecode {
    Decoded(DecodedLog),
    /// The first topic matched no event of the interface; the log is left untouched.
    PassThrough(RawLog),
    /// The log matched an event but its topics or data did not fit the declaration.
    Failed { log: RawLog, error: BindingError },
}

impl LogDecode {
    pub fn decoded(&self) -> Option<&DecodedLog> {
        match self {
            Self::Decoded(decoded) => Some(decoded),
            _ => None,
        }
    }

    pub fn raw(&self) -> &RawLog {
        match self {
            Self::Decoded(decoded) => &decoded.log,
            Self::PassThrough(log) => log,
            Self::Failed { log, .. } => log,
        }
    }
}

/// A function call recovered from transaction input.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCall {
    pub name: String,
    pub signature: String,
    pub params: Vec<(String, DynSolValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputDecode {
    Decoded(DecodedCall),
    /// No function of the interface has this selector.
    Undecoded(Bytes),
}

/// Summary of a batch, for logging and CLI output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    pub decoded: usize,
    pub passed_through: usize,
    pub failed: usize,
}

impl DecodeStats {
    pub fn of(results: &[LogDecode]) -> Self {
        results.iter().fold(Self::default(), |mut stats, result| {
            match result {
                LogDecode::Decoded(_) => stats.decoded += 1,
                LogDecode::PassThrough(_) => stats.passed_through += 1,
                LogDecode::Failed { .. } => stats.failed += 1,
            }
            stats
        })
    }
}

/// Decodes every log independently; one failure never affects the others.
pub fn decode_logs(logs: &[RawLog], selectors: &SelectorTable) -> Vec<LogDecode> {
    let results: Vec<LogDecode> = logs.iter().map(|log| decode_log(log, selectors)).collect();

    let stats = DecodeStats::of(&results);
    debug!(
        decoded = stats.decoded,
        passed_through = stats.passed_through,
        failed = stats.failed,
        "Decoded log batch"
    );
    results
}

pub fn decode_log(log: &RawLog, selectors: &SelectorTable) -> LogDecode {
    let Some(event) = log
        .topics
        .first()
        .and_then(|topic| selectors.resolve_event(topic))
    else {
        debug!("Passing through log without a known event selector");
        return LogDecode::PassThrough(log.clone());
    };

    match decode_event(event, log) {
        Ok(decoded) => LogDecode::Decoded(decoded),
        Err(error) => {
            warn!("Failed to decode log as '{}': {}", event.name, error);
            LogDecode::Failed {
                log: log.clone(),
                error,
            }
        }
    }
}

/// Decodes `log` as an occurrence of `event`.
///
/// Indexed parameters take the topics after the selector, one each, in the order
/// they are met while scanning the full parameter list. Non-indexed parameters are
/// decoded together from the data payload, also in declaration order.
pub fn decode_event(event: &Event, log: &RawLog) -> Result<DecodedLog, BindingError> {
    let item = format!("event '{}'", event.name);

    let types = resolve_event_types(&event.inputs)?;
    let mut topics = log.topics.iter().skip(1);
    let mut body_types = Vec::new();
    let mut slots = Vec::with_capacity(event.inputs.len());

    for (position, (input, ty)) in event.inputs.iter().zip(&types).enumerate() {
        if input.indexed {
            let topic = topics.next().ok_or_else(|| {
                BindingError::decode(
                    &item,
                    format!(
                        "missing topic for indexed parameter '{}' (log has {} topics)",
                        param_name(&input.name, position),
                        log.topics.len()
                    ),
                )
            })?;
            let value = decode_topic(ty, topic).map_err(|e| BindingError::decode(&item, e))?;
            slots.push(Some(value));
        } else {
            body_types.push(ty.clone());
            slots.push(None);
        }
    }

    let mut body = decode_body(&item, body_types, &log.data)?.into_iter();
    let mut params = Vec::with_capacity(slots.len());
    for (position, (input, slot)) in event.inputs.iter().zip(slots).enumerate() {
        let value = match slot {
            Some(value) => value,
            None => body.next().ok_or_else(|| {
                BindingError::decode(&item, "data payload has fewer values than declared")
            })?,
        };
        params.push((param_name(&input.name, position), value));
    }

    trace!("Decoded event {} with {} parameters", event.name, params.len());

    Ok(DecodedLog {
        name: event.name.clone(),
        params,
        log: log.clone(),
    })
}

/// Decodes transaction input against the function its selector names.
pub fn decode_input(input: &[u8], selectors: &SelectorTable) -> Result<InputDecode, BindingError> {
    let Some(function) = selectors.resolve_function(input) else {
        debug!("No function matches the input selector");
        return Ok(InputDecode::Undecoded(Bytes::copy_from_slice(input)));
    };

    let item = format!("input of '{}'", function.name);
    let types = resolve_types(&function.inputs)?;
    let values = decode_body(&item, types, &input[4..])?;

    let params = function
        .inputs
        .iter()
        .enumerate()
        .zip(values)
        .map(|((position, input), value)| (param_name(&input.name, position), value))
        .collect();

    Ok(InputDecode::Decoded(DecodedCall {
        name: function.name.clone(),
        signature: function.signature(),
        params,
    }))
}

fn resolve_event_types(inputs: &[EventParam]) -> Result<Vec<DynSolType>, BindingError> {
    use alloy::dyn_abi::Specifier;

    inputs
        .iter()
        .map(|input| {
            input.resolve().map_err(|e| {
                BindingError::InvalidInterface(format!("'{}': {}", input.ty, e))
            })
        })
        .collect()
}

/// Reference types are stored in topics as the hash of their encoding, which
/// cannot be inverted; those come back as the raw 32-byte topic.
fn decode_topic(ty: &DynSolType, topic: &B256) -> Result<DynSolValue, alloy::dyn_abi::Error> {
    match ty {
        DynSolType::String
        | DynSolType::Bytes
        | DynSolType::Array(_)
        | DynSolType::FixedArray(..)
        | DynSolType::Tuple(_) => Ok(DynSolValue::FixedBytes(*topic, 32)),
        _ => ty.abi_decode(topic.as_slice()),
    }
}

fn decode_body(
    item: &str,
    types: Vec<DynSolType>,
    data: &[u8],
) -> Result<Vec<DynSolValue>, BindingError> {
    if types.is_empty() {
        return Ok(Vec::new());
    }
    let expected = types.len();

    match DynSolType::Tuple(types).abi_decode_params(data) {
        Ok(DynSolValue::Tuple(values)) if values.len() == expected => Ok(values),
        Ok(other) => Err(BindingError::decode(
            item,
            format!("expected {} values, decoded {:?}", expected, other),
        )),
        Err(e) => Err(BindingError::decode(item, e)),
    }
}

fn param_name(name: &str, position: usize) -> String {
    if name.is_empty() {
        format!("arg{}", position)
    } else {
        name.to_string()
    }
}
