//! Payloads handed to the custody provider for EVM signing and sending.

use alloy_primitives::{Address, B256, U256};
use serde::Serialize;

use crate::address::parse_address;
use crate::error::EthError;

/// The `{to, value}` descriptor the provider fills in (nonce, gas, chain)
/// before signing or sending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvmTransactionRequest {
    pub to: Address,
    pub value: U256,
}

impl EvmTransactionRequest {
    pub fn new(to: &str, value_wei: u128) -> Result<Self, EthError> {
        Ok(Self {
            to: parse_address(to)?,
            value: U256::from(value_wei),
        })
    }
}

/// Parse a 32-byte hash given as hex, with or without a `0x`/`0X` prefix.
pub fn parse_raw_hash(hash_hex: &str) -> Result<B256, EthError> {
    let digits = hash_hex
        .strip_prefix("0x")
        .or_else(|| hash_hex.strip_prefix("0X"))
        .unwrap_or(hash_hex);
    let bytes = hex::decode(digits).map_err(|e| EthError::InvalidHash(e.to_string()))?;
    let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
        EthError::InvalidHash(format!("expected 32 bytes, got {}", v.len()))
    })?;
    Ok(B256::from(arr))
}

/// The `0x`-prefixed parameter of a `secp256k1_sign` request.
pub fn raw_hash_param(hash: &B256) -> String {
    format!("0x{}", hex::encode(hash.as_slice()))
}
