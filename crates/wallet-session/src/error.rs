use chain_eth::EthError;
use chain_sol::SolError;
use thiserror::Error;

use crate::dispatcher::ActionKind;
use crate::types::ChainFamily;

/// Failures reported by the identity/custody provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("user rejected the request")]
    UserRejected,

    #[error("network error: {0}")]
    Network(String),

    #[error("provider unavailable")]
    Unavailable,

    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("no wallet selected")]
    NoWalletSelected,

    #[error("{action} is not supported for {family} wallets")]
    UnsupportedChainFamily {
        action: &'static str,
        family: ChainFamily,
    },

    #[error("a custody-backed wallet is required")]
    RequiresCustodyWallet,

    #[error("secret key is empty")]
    EmptySecret,

    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    #[error("blockhash fetch failed: {0}")]
    BlockhashFetchFailed(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("provider rejected the request: {0}")]
    ProviderRejected(ProviderError),

    #[error("network switch failed: {0}")]
    SwitchFailed(ProviderError),

    #[error("{0} is already in flight")]
    ActionInFlight(ActionKind),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transaction build failed: {0}")]
    TransactionBuild(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<ProviderError> for SessionError {
    fn from(e: ProviderError) -> Self {
        SessionError::ProviderRejected(e)
    }
}

impl From<SolError> for SessionError {
    fn from(e: SolError) -> Self {
        match e {
            SolError::BlockhashFetchFailed(reason) => SessionError::BlockhashFetchFailed(reason),
            SolError::InvalidAddress(reason) => SessionError::InvalidAddress(reason),
            other => SessionError::TransactionBuild(other.to_string()),
        }
    }
}

impl From<EthError> for SessionError {
    fn from(e: EthError) -> Self {
        match e {
            EthError::InvalidAddress(reason) => SessionError::InvalidAddress(reason),
            other => SessionError::InvalidRequest(other.to_string()),
        }
    }
}
