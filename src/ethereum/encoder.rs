use alloy::{
    dyn_abi::{DynSolType, DynSolValue, Specifier},
    json_abi::{Function, JsonAbi, Param},
    primitives::Bytes,
};

use super::selectors::{selector_prefix, signature_hash};
use super::BindingError;

/// Finds a function by name, picking the overload whose arity matches `argc`.
///
/// When no overload has the right arity the error reports the first one.
pub fn find_function<'a>(
    abi: &'a JsonAbi,
    name: &str,
    argc: usize,
) -> Result<&'a Function, BindingError> {
    let overloads = abi
        .function(name)
        .filter(|overloads| !overloads.is_empty())
        .ok_or_else(|| BindingError::UnknownFunction(name.to_string()))?;

    overloads
        .iter()
        .find(|function| function.inputs.len() == argc)
        .ok_or_else(|| BindingError::ArgumentCountMismatch {
            function: name.to_string(),
            expected: overloads[0].inputs.len(),
            got: argc,
        })
}

/// Resolves declared parameter types into encodable types.
pub fn resolve_types(params: &[Param]) -> Result<Vec<DynSolType>, BindingError> {
    params
        .iter()
        .map(|param| {
            param.resolve().map_err(|e| {
                BindingError::InvalidInterface(format!("'{}': {}", param.ty, e))
            })
        })
        .collect()
}

/// Encodes `args` against `params` without any selector.
///
/// The argument count is checked before anything else so a mismatch never
/// yields partial output.
pub fn encode_params(
    owner: &str,
    params: &[Param],
    args: &[DynSolValue],
) -> Result<Vec<u8>, BindingError> {
    if params.len() != args.len() {
        return Err(BindingError::ArgumentCountMismatch {
            function: owner.to_string(),
            expected: params.len(),
            got: args.len(),
        });
    }

    let types = resolve_types(params)?;
    for (index, (ty, arg)) in types.iter().zip(args).enumerate() {
        if !ty.matches(arg) {
            return Err(BindingError::InvalidArgument {
                function: owner.to_string(),
                index: index + 1,
                expected: ty.to_string(),
            });
        }
    }

    if args.is_empty() {
        return Ok(Vec::new());
    }
    Ok(DynSolValue::Tuple(args.to_vec()).abi_encode_params())
}

/// Call-data for `function`: 4-byte selector followed by the encoded arguments.
pub fn encode_call(function: &Function, args: &[DynSolValue]) -> Result<Bytes, BindingError> {
    let encoded = encode_params(&function.name, &function.inputs, args)?;
    let selector = selector_prefix(&signature_hash(&function.signature()));

    let mut data = Vec::with_capacity(4 + encoded.len());
    data.extend_from_slice(selector.as_slice());
    data.extend_from_slice(&encoded);
    Ok(data.into())
}

/// Deployment data: creation bytecode followed by the encoded constructor arguments.
pub fn encode_deployment(
    bytecode: &[u8],
    constructor_params: &[Param],
    args: &[DynSolValue],
) -> Result<Bytes, BindingError> {
    let encoded = encode_params("constructor", constructor_params, args)?;

    let mut data = Vec::with_capacity(bytecode.len() + encoded.len());
    data.extend_from_slice(bytecode);
    data.extend_from_slice(&encoded);
    Ok(data.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethereum::testing::{erc20_abi, ALICE, BOB};
    use crate::ethereum::ErrorKind;
    use alloy::primitives::{hex, U256};

    #[test]
    fn test_encode_transfer_call() {
        let abi = erc20_abi();
        let transfer = find_function(&abi, "transfer", 2).unwrap();
        let args = [
            DynSolValue::Address(BOB),
            DynSolValue::Uint(U256::from(1000), 256),
        ];

        let data = encode_call(transfer, &args).unwrap();
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], &hex!("a9059cbb"));
        assert_eq!(&data[16..36], BOB.as_slice());
        assert_eq!(U256::from_be_slice(&data[36..68]), U256::from(1000));
    }

    #[test]
    fn test_encode_call_is_deterministic() {
        let abi = erc20_abi();
        let approve = find_function(&abi, "approve", 2).unwrap();
        let args = [
            DynSolValue::Address(ALICE),
            DynSolValue::Uint(U256::MAX, 256),
        ];

        assert_eq!(
            encode_call(approve, &args).unwrap(),
            encode_call(approve, &args).unwrap()
        );
    }

    #[test]
    fn test_wrong_argument_count_fails() {
        let abi = erc20_abi();
        let transfer = &abi.function("transfer").unwrap()[0];

        let err = encode_call(transfer, &[DynSolValue::Address(BOB)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentCountMismatch);
        assert_eq!(
            err,
            BindingError::ArgumentCountMismatch {
                function: "transfer".to_string(),
                expected: 2,
                got: 1,
            }
        );

        let err = find_function(&abi, "transfer", 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentCountMismatch);
    }

    #[test]
    fn test_wrong_argument_type_fails() {
        let abi = erc20_abi();
        let transfer = find_function(&abi, "transfer", 2).unwrap();
        let args = [DynSolValue::Bool(true), DynSolValue::Uint(U256::from(1), 256)];

        let err = encode_call(transfer, &args).unwrap_err();
        assert!(matches!(err, BindingError::InvalidArgument { index: 1, .. }));
    }

    #[test]
    fn test_unknown_function() {
        let abi = erc20_abi();
        let err = find_function(&abi, "mint", 0).unwrap_err();
        assert_eq!(err, BindingError::UnknownFunction("mint".to_string()));
    }

    #[test]
    fn test_encode_dynamic_string_argument() {
        let abi: JsonAbi = serde_json::from_str(
            r#"[{"type":"function","name":"setName","inputs":[{"name":"name","type":"string"}],"outputs":[],"stateMutability":"nonpayable"}]"#,
        )
        .unwrap();
        let set_name = find_function(&abi, "setName", 1).unwrap();

        let data = encode_call(set_name, &[DynSolValue::String("hi".to_string())]).unwrap();
        // selector, offset word, length word, one padded data word
        assert_eq!(data.len(), 4 + 32 * 3);
        assert_eq!(U256::from_be_slice(&data[4..36]), U256::from(32));
        assert_eq!(U256::from_be_slice(&data[36..68]), U256::from(2));
        assert_eq!(&data[68..70], b"hi");
    }

    #[test]
    fn test_encode_deployment_appends_constructor_args() {
        let bytecode = hex!("6080604052");
        let params: Vec<Param> = serde_json::from_str(
            r#"[{"name":"supply","type":"uint256"},{"name":"owner","type":"address"}]"#,
        )
        .unwrap();
        let args = [
            DynSolValue::Uint(U256::from(42), 256),
            DynSolValue::Address(ALICE),
        ];

        let data = encode_deployment(&bytecode, &params, &args).unwrap();
        assert_eq!(&data[..5], &bytecode);
        assert_eq!(data.len(), 5 + 64);
        assert_eq!(U256::from_be_slice(&data[5..37]), U256::from(42));

        let empty = encode_deployment(&bytecode, &[], &[]).unwrap();
        assert_eq!(&empty[..], &bytecode);

        let err = encode_deployment(&bytecode, &params, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentCountMismatch);
    }
}
