//! Solana chain support for the wallet session.
//!
//! This crate builds unsigned SOL transfers in the versioned (v0) wire format
//! and fetches the blockhash they are bound to. Signing belongs to the custody
//! provider, so no key material ever passes through here.
//!
//! The wire format is written by hand rather than through `solana-sdk`, which
//! drags in a very large dependency tree for the handful of bytes we need.

pub mod address;
pub mod builder;
pub mod error;
pub mod rpc;
pub mod transaction;

// Re-export key public types for ergonomic imports.
pub use address::{address_to_bytes, bytes_to_address, validate_address};
pub use builder::{TransferBuilder, WireTransaction};
pub use error::SolError;
pub use rpc::{
    BlockhashSource, Commitment, FailingBlockhash, LatestBlockhash, SolanaRpcClient,
    StaticBlockhash,
};
pub use transaction::{
    compile_message, decode_wire_transaction, encode_wire_transaction, system_transfer_instruction,
    DecodedTransaction, MessageV0, SYSTEM_PROGRAM_ID,
};
