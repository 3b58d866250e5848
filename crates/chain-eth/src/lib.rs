//! Ethereum/EVM request types for the wallet session.
//!
//! This crate provides:
//! - EIP-55 address validation and checksumming
//! - The `{to, value}` transaction descriptor and raw-hash parameters handed to
//!   the custody provider
//! - EIP-712 typed-data payloads with structural validation
//! - The catalogue of EVM networks a wallet can be switched to

pub mod address;
pub mod chains;
pub mod error;
pub mod request;
pub mod typed_data;

pub use error::EthError;
pub use request::EvmTransactionRequest;
pub use typed_data::TypedData;
