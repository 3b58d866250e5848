//! Multi-chain wallet session and signing coordinator.
//!
//! The session keeps one registry of every EVM and Solana wallet the
//! identity/custody provider reports, tracks which one is active, and routes
//! signing, sending, export and import requests through a guard table to the
//! right chain. Key material never passes through this crate: the provider
//! signs, and Solana transfers are compiled here unsigned.
//!
//! ```text
//! provider feeds ──▶ RegistrySync ──▶ UnifiedRegistry ──▶ ActiveWalletSelector
//!                                                              │
//! ActionRequest ──▶ ChainDispatcher (guards) ──▶ EVM / Solana executor ──▶ provider
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod mock;
pub mod network;
pub mod notify;
pub mod provider;
pub mod registry;
pub mod selector;
pub mod session;
pub mod types;

pub use config::SessionConfig;
pub use dispatcher::{
    ActionKind, ActionOutcome, ActionRequest, ChainDispatcher, Guard, TransferRequest,
};
pub use error::{ProviderError, SessionError};
pub use network::{NetworkSwitch, NetworkSwitchController};
pub use notify::{Level, Notification};
pub use provider::{
    Authenticator, EvmCustody, LinkTarget, SessionContext, SolanaCustody, WalletFeeds,
};
pub use registry::UnifiedRegistry;
pub use selector::{ActiveWalletSelector, StalePolicy};
pub use session::{RegistrySync, WalletSession};
pub use types::{
    ChainFamily, EvmWalletHandle, LinkedAccount, SolanaWalletHandle, UserProfile, WalletHandle,
    WalletId, WalletOrigin, WalletRecord,
};
