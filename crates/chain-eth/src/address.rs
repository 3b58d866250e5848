use std::str::FromStr;

use alloy_primitives::Address;
use sha3::{Digest, Keccak256};

use crate::error::EthError;

/// Validates an Ethereum address string.
///
/// The address must be `0x` followed by 40 hex characters. All-lowercase and
/// all-uppercase forms carry no checksum and are accepted as-is; mixed case
/// must match its EIP-55 checksum.
pub fn validate_address(address: &str) -> Result<(), EthError> {
    let hex_part = strip_and_check(address)?;

    let is_all_lower = hex_part.chars().all(|c| !c.is_ascii_uppercase());
    let is_all_upper = hex_part.chars().all(|c| !c.is_ascii_lowercase());
    if is_all_lower || is_all_upper {
        return Ok(());
    }

    let checksummed = checksum_address(address)?;
    if checksummed[2..] != *hex_part {
        return Err(EthError::InvalidAddress(format!(
            "checksum mismatch, expected {checksummed}"
        )));
    }
    Ok(())
}

/// Validates and parses an address into its 20-byte form.
pub fn parse_address(address: &str) -> Result<Address, EthError> {
    validate_address(address)?;
    Address::from_str(address).map_err(|e| EthError::InvalidAddress(e.to_string()))
}

/// Applies EIP-55 mixed-case checksum encoding to an Ethereum address.
///
/// Input case is ignored.
pub fn checksum_address(address: &str) -> Result<String, EthError> {
    let hex_part = strip_and_check(address)?.to_ascii_lowercase();

    // EIP-55: hash the lowercase hex address (without 0x).
    let hash = Keccak256::digest(hex_part.as_bytes());

    let mut checksummed = String::with_capacity(42);
    checksummed.push_str("0x");
    for (i, c) in hex_part.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            checksummed.push(c.to_ascii_uppercase());
        } else {
            checksummed.push(c);
        }
    }

    Ok(checksummed)
}

fn strip_and_check(address: &str) -> Result<&str, EthError> {
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| EthError::InvalidAddress("address must start with 0x".into()))?;

    if hex_part.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            hex_part.len()
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EthError::InvalidAddress(
            "address contains non-hex characters".into(),
        ));
    }

    Ok(hex_part)
}
