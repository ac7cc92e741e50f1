//! Safe transaction builder
//!
//! Normalizes loosely typed call parameters (hex strings, decimal amounts,
//! optional gas fields) into a [`SafeTransaction`]. Unset numeric fields are
//! zero and unset address fields are the zero address.

use crate::error::{CoordinatorError, CoordinatorResult, Stage};
use crate::types::{Operation, SafeTransaction};
use crate::utils::crypto::{parse_address, parse_hex_bytes, parse_u256};
use crate::verifier::SafeVerifier;
use crate::{log_debug, log_warn};
use ethers_core::abi::param_type::Reader;
use ethers_core::abi::token::{LenientTokenizer, Tokenizer};
use ethers_core::abi::{self, ParamType};
use ethers_core::types::{Address, Bytes, U256};
use ethers_core::utils::id;

/// Build a plain Safe transaction.
///
/// `target` must be a `0x` address and `nonce` a non-negative integer in
/// decimal or hex.
pub fn build(target: &str, payload: Bytes, kind: Operation, nonce: &str) -> CoordinatorResult<SafeTransaction> {
    SafeTransactionBuilder::new(target)
        .data(payload)
        .operation(kind)
        .nonce(nonce)
        .build()
}

/// Builder for the optional value, gas and refund fields
#[derive(Debug, Clone, Default)]
pub struct SafeTransactionBuilder {
    to: String,
    value: Option<String>,
    data: Bytes,
    data_hex: Option<String>,
    operation: Operation,
    safe_tx_gas: Option<String>,
    base_gas: Option<String>,
    gas_price: Option<String>,
    gas_token: Option<String>,
    refund_receiver: Option<String>,
    nonce: Option<String>,
}

impl SafeTransactionBuilder {
    pub fn new(to: &str) -> Self {
        Self {
            to: to.to_string(),
            ..Default::default()
        }
    }

    /// Wei, decimal or hex
    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn data(mut self, data: Bytes) -> Self {
        self.data = data;
        self.data_hex = None;
        self
    }

    /// Calldata as hex; parsed at `build`
    pub fn data_hex(mut self, data: &str) -> Self {
        self.data_hex = Some(data.to_string());
        self
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    pub fn safe_tx_gas(mut self, gas: &str) -> Self {
        self.safe_tx_gas = Some(gas.to_string());
        self
    }

    pub fn base_gas(mut self, gas: &str) -> Self {
        self.base_gas = Some(gas.to_string());
        self
    }

    pub fn gas_price(mut self, price: &str) -> Self {
        self.gas_price = Some(price.to_string());
        self
    }

    pub fn gas_token(mut self, token: &str) -> Self {
        self.gas_token = Some(token.to_string());
        self
    }

    pub fn refund_receiver(mut self, receiver: &str) -> Self {
        self.refund_receiver = Some(receiver.to_string());
        self
    }

    pub fn nonce(mut self, nonce: &str) -> Self {
        self.nonce = Some(nonce.to_string());
        self
    }

    pub fn build(self) -> CoordinatorResult<SafeTransaction> {
        let in_build = |e: CoordinatorError| e.with_stage(Stage::Build);

        let to = parse_address(&self.to).map_err(in_build)?;
        let nonce = match self.nonce.as_deref() {
            Some(nonce) => parse_u256(nonce).map_err(in_build)?,
            None => return Err(CoordinatorError::invalid_input("nonce is required").with_stage(Stage::Build)),
        };

        let data = match self.data_hex.as_deref() {
            Some(hex) => parse_hex_bytes(hex).map_err(in_build)?,
            None => self.data,
        };

        let tx = SafeTransaction {
            to,
            value: optional_u256(self.value.as_deref()).map_err(in_build)?,
            data,
            operation: self.operation,
            safe_tx_gas: optional_u256(self.safe_tx_gas.as_deref()).map_err(in_build)?,
            base_gas: optional_u256(self.base_gas.as_deref()).map_err(in_build)?,
            gas_price: optional_u256(self.gas_price.as_deref()).map_err(in_build)?,
            gas_token: optional_address(self.gas_token.as_deref()).map_err(in_build)?,
            refund_receiver: optional_address(self.refund_receiver.as_deref()).map_err(in_build)?,
            nonce,
        };

        if tx.operation == Operation::DelegateCall {
            log_warn!("builder", "delegatecall runs target code in the Safe's context", to = tx.to);
        }
        log_debug!("builder", "Safe transaction built", to = tx.to, nonce = tx.nonce, data_len = tx.data.len());

        Ok(tx)
    }
}

fn optional_u256(value: Option<&str>) -> CoordinatorResult<U256> {
    value.map(parse_u256).transpose().map(Option::unwrap_or_default)
}

fn optional_address(value: Option<&str>) -> CoordinatorResult<Address> {
    value.map(parse_address).transpose().map(Option::unwrap_or_default)
}

/// ABI-encode `name(type,...)` with arguments given as strings
pub fn encode_function_call(function_signature: &str, args: &[String]) -> CoordinatorResult<Bytes> {
    let signature = function_signature.trim().trim_start_matches("function ").trim();
    let open = signature
        .find('(')
        .ok_or_else(|| CoordinatorError::invalid_input(format!("missing '(' in {:?}", signature)))?;
    if !signature.ends_with(')') {
        return Err(CoordinatorError::invalid_input(format!("missing ')' in {:?}", signature)));
    }

    let param_types = split_param_types(&signature[open + 1..signature.len() - 1])
        .into_iter()
        .map(|ty| {
            Reader::read(ty).map_err(|e| CoordinatorError::invalid_input(format!("bad parameter type {:?}: {}", ty, e)))
        })
        .collect::<CoordinatorResult<Vec<ParamType>>>()?;

    if param_types.len() != args.len() {
        return Err(CoordinatorError::invalid_input(format!(
            "{} expects {} arguments, got {}",
            signature,
            param_types.len(),
            args.len()
        )));
    }

    let tokens = param_types
        .iter()
        .zip(args)
        .map(|(ty, arg)| {
            let arg = arg.trim();
            let raw = match ty {
                ParamType::Address | ParamType::Bytes | ParamType::FixedBytes(_) => arg.trim_start_matches("0x"),
                _ => arg,
            };
            LenientTokenizer::tokenize(ty, raw)
                .map_err(|e| CoordinatorError::invalid_input(format!("bad {} argument {:?}: {}", ty, arg, e)))
        })
        .collect::<CoordinatorResult<Vec<_>>>()?;

    let canonical = format!(
        "{}({})",
        &signature[..open],
        param_types.iter().map(ParamType::to_string).collect::<Vec<_>>().join(",")
    );

    let mut data = id(&canonical).to_vec();
    data.extend_from_slice(&abi::encode(&tokens));
    Ok(Bytes::from(data))
}

/// Split a parameter list on top-level commas: "address,(uint256,bool)" ->
/// ["address", "(uint256,bool)"]
fn split_param_types(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in list.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(list[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = list[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

/// A Safe call into another contract, e.g. `transfer(address,uint256)` on a
/// token
pub fn build_contract_call(
    target: &str,
    function_signature: &str,
    args: &[String],
    nonce: &str,
) -> CoordinatorResult<SafeTransaction> {
    let data = encode_function_call(function_signature, args).map_err(|e| e.with_stage(Stage::Build))?;
    build(target, data, Operation::Call, nonce)
}

/// Fail unless `tx.nonce` is the verifier's current nonce
pub fn check_nonce(verifier: &dyn SafeVerifier, tx: &SafeTransaction) -> CoordinatorResult<U256> {
    let current = verifier.nonce().map_err(|e| e.with_stage(Stage::Build))?;
    if tx.nonce != current {
        return Err(CoordinatorError::invalid_input(format!(
            "transaction nonce {} does not match Safe nonce {}",
            tx.nonce, current
        ))
        .with_stage(Stage::Build));
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    const TARGET: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    #[test]
    fn test_build_defaults() {
        let tx = build(TARGET, Bytes::from(vec![0xab, 0xcd]), Operation::Call, "5").unwrap();
        assert_eq!(tx.to, Address::repeat_byte(0xaa));
        assert_eq!(tx.nonce, U256::from(5));
        assert_eq!(tx.value, U256::zero());
        assert_eq!(tx.gas_token, Address::zero());
        assert_eq!(tx.refund_receiver, Address::zero());
        assert_eq!(tx.data.to_vec(), vec![0xab, 0xcd]);
    }

    #[test]
    fn test_build_rejects_bad_input() {
        for (target, nonce) in [("0x1234", "0"), ("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "0"), (TARGET, "-1"), (TARGET, "1.5"), (TARGET, "")] {
            let err = build(target, Bytes::default(), Operation::Call, nonce).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidInput, "{} / {}", target, nonce);
            assert_eq!(err.stage, Some(Stage::Build));
        }
    }

    #[test]
    fn test_builder_optional_fields() {
        let tx = SafeTransactionBuilder::new(TARGET)
            .value("0xde0b6b3a7640000")
            .data_hex("0xabcd")
            .operation(Operation::DelegateCall)
            .safe_tx_gas("100000")
            .gas_price("1")
            .refund_receiver("0x1111111111111111111111111111111111111111")
            .nonce("0x05")
            .build()
            .unwrap();

        assert_eq!(tx.value, U256::exp10(18));
        assert_eq!(tx.safe_tx_gas, U256::from(100_000));
        assert_eq!(tx.gas_price, U256::one());
        assert_eq!(tx.base_gas, U256::zero());
        assert_eq!(tx.refund_receiver, Address::repeat_byte(0x11));
        assert_eq!(tx.nonce, U256::from(5));
        assert_eq!(tx.operation, Operation::DelegateCall);
    }

    #[test]
    fn test_builder_requires_nonce() {
        assert!(SafeTransactionBuilder::new(TARGET).build().is_err());
    }

    #[test]
    fn test_encode_erc20_transfer() {
        let data = encode_function_call(
            "transfer(address,uint256)",
            &["0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_string(), "1000".to_string()],
        )
        .unwrap();

        assert_eq!(hex::encode(&data[..4]), "a9059cbb");
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(data[4 + 63], 0xe8);
        assert_eq!(data[4 + 62], 0x03);
    }

    #[test]
    fn test_encode_rejects_arity_mismatch() {
        assert!(encode_function_call("transfer(address,uint256)", &["0x00".to_string()]).is_err());
        assert!(encode_function_call("transfer", &[]).is_err());
    }

    #[test]
    fn test_split_param_types() {
        assert_eq!(split_param_types("address,(uint256,bool),bytes"), vec!["address", "(uint256,bool)", "bytes"]);
        assert!(split_param_types("").is_empty());
    }

    #[test]
    fn test_build_contract_call() {
        let tx = build_contract_call(TARGET, "approve(address,uint256)", &[TARGET.to_string(), "1".to_string()], "0")
            .unwrap();
        assert_eq!(hex::encode(&tx.data[..4]), "095ea7b3");
    }
}
