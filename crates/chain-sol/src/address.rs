//! Solana address parsing and validation.
//!
//! Solana addresses are Base58-encoded 32-byte Ed25519 public keys. Blockhashes
//! use the same encoding, so the decoder here serves both.

use crate::error::SolError;

/// Validate a Solana address string.
///
/// A valid Solana address is a Base58-encoded string that decodes to exactly
/// 32 bytes.
pub fn validate_address(address: &str) -> Result<(), SolError> {
    address_to_bytes(address).map(|_| ())
}

/// Decode a Solana address string to its 32-byte representation.
///
/// Returns an error if the address is not valid Base58 or does not decode
/// to exactly 32 bytes.
pub fn address_to_bytes(address: &str) -> Result<[u8; 32], SolError> {
    decode_32(address).map_err(SolError::InvalidAddress)
}

/// Encode 32 bytes as a Solana address (Base58 string).
pub fn bytes_to_address(bytes: &[u8; 32]) -> String {
    bs58::encode(bytes).into_string()
}

/// Decode a Base58 blockhash as returned by `getLatestBlockhash`.
pub fn blockhash_to_bytes(blockhash: &str) -> Result<[u8; 32], SolError> {
    decode_32(blockhash).map_err(SolError::InvalidBlockhash)
}

fn decode_32(input: &str) -> Result<[u8; 32], String> {
    let bytes = bs58::decode(input)
        .into_vec()
        .map_err(|e| format!("base58 decode failed: {e}"))?;

    bytes
        .try_into()
        .map_err(|v: Vec<u8>| format!("expected 32 bytes, got {}", v.len()))
}
