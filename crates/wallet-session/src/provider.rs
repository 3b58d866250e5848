//! Seams to the identity/custody provider and the Solana RPC endpoint.
//!
//! Everything the session needs from the outside world is reached through
//! the traits here, bundled into a [`SessionContext`] that is handed to
//! every component at construction.

use std::sync::Arc;

use async_trait::async_trait;
use chain_eth::{EvmTransactionRequest, TypedData};
use chain_sol::BlockhashSource;
use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::watch;

use crate::error::ProviderError;
use crate::types::{EvmWalletHandle, LinkedAccount, SolanaWalletHandle, UserProfile};

/// Low-level method name for signing a bare 32-byte hash.
pub const SECP256K1_SIGN: &str = "secp256k1_sign";

/// Something the user can attach to their identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    Email(String),
    Phone(String),
    /// Runs the provider's external wallet connection flow.
    Wallet,
}

/// Login, session and account linking.
#[async_trait]
pub trait Authenticator: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn current_user(&self) -> Option<UserProfile>;

    async fn login(&self) -> Result<UserProfile, ProviderError>;

    async fn logout(&self) -> Result<(), ProviderError>;

    async fn link_passkey(&self) -> Result<(), ProviderError>;

    async fn unlink_passkey(&self, credential_id: &str) -> Result<(), ProviderError>;

    async fn link_account(&self, target: LinkTarget) -> Result<(), ProviderError>;

    async fn unlink_account(&self, account: &LinkedAccount) -> Result<(), ProviderError>;
}

/// EVM capabilities. Signatures and hashes are `0x`-prefixed hex.
#[async_trait]
pub trait EvmCustody: Send + Sync {
    async fn sign_message(&self, address: &str, message: &str) -> Result<String, ProviderError>;

    async fn sign_typed_data(
        &self,
        address: &str,
        data: &TypedData,
    ) -> Result<String, ProviderError>;

    /// Raw provider request against a custody-backed wallet.
    async fn request(
        &self,
        address: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, ProviderError>;

    async fn sign_transaction(
        &self,
        address: &str,
        tx: &EvmTransactionRequest,
    ) -> Result<String, ProviderError>;

    /// Returns the transaction hash.
    async fn send_transaction(
        &self,
        address: &str,
        tx: &EvmTransactionRequest,
    ) -> Result<String, ProviderError>;

    async fn switch_chain(&self, address: &str, chain_id: u64) -> Result<(), ProviderError>;

    /// Opens the provider's export flow; the key is never returned here.
    async fn export_wallet(&self, address: &str) -> Result<(), ProviderError>;

    /// Returns the address of the imported wallet.
    async fn import_wallet(&self, private_key: &SecretString) -> Result<String, ProviderError>;

    /// Returns the address of the new custody-backed wallet.
    async fn create_wallet(&self) -> Result<String, ProviderError>;
}

/// Solana capabilities. Transactions and signatures are raw bytes.
#[async_trait]
pub trait SolanaCustody: Send + Sync {
    async fn sign_message(&self, address: &str, message: &[u8]) -> Result<Vec<u8>, ProviderError>;

    /// Returns the signed wire transaction.
    async fn sign_transaction(
        &self,
        address: &str,
        transaction: &[u8],
    ) -> Result<Vec<u8>, ProviderError>;

    /// Returns the transaction signature.
    async fn sign_and_send_transaction(
        &self,
        address: &str,
        transaction: &[u8],
    ) -> Result<Vec<u8>, ProviderError>;

    async fn export_wallet(&self, address: &str) -> Result<(), ProviderError>;

    async fn import_wallet(&self, private_key: &SecretString) -> Result<String, ProviderError>;
}

/// Push-updated wallet lists.
#[derive(Debug, Clone)]
pub struct WalletFeeds {
    pub evm: watch::Receiver<Vec<EvmWalletHandle>>,
    pub solana: watch::Receiver<Vec<SolanaWalletHandle>>,
}

impl WalletFeeds {
    /// Whether either list was replaced since it was last read.
    pub fn has_changed(&self) -> bool {
        // A closed feed counts as changed so the final value is picked up.
        self.evm.has_changed().unwrap_or(true) || self.solana.has_changed().unwrap_or(true)
    }

    /// Read both lists, marking them seen.
    pub fn snapshot(&mut self) -> (Vec<EvmWalletHandle>, Vec<SolanaWalletHandle>) {
        let evm = self.evm.borrow_and_update().clone();
        let solana = self.solana.borrow_and_update().clone();
        (evm, solana)
    }

    /// Wait until either list changes. Returns `false` once both senders
    /// are gone.
    pub async fn changed(&mut self) -> bool {
        tokio::select! {
            res = self.evm.changed() => res.is_ok() || self.solana.changed().await.is_ok(),
            res = self.solana.changed() => res.is_ok() || self.evm.changed().await.is_ok(),
        }
    }
}

/// The collaborators a session is built from. Created at session start
/// and dropped at logout.
#[derive(Clone)]
pub struct SessionContext {
    pub auth: Arc<dyn Authenticator>,
    pub evm: Arc<dyn EvmCustody>,
    pub solana: Arc<dyn SolanaCustody>,
    pub rpc: Arc<dyn BlockhashSource>,
}

impl SessionContext {
    pub fn new(
        auth: Arc<dyn Authenticator>,
        evm: Arc<dyn EvmCustody>,
        solana: Arc<dyn SolanaCustody>,
        rpc: Arc<dyn BlockhashSource>,
    ) -> Self {
        Self {
            auth,
            evm,
            solana,
            rpc,
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WalletOrigin;

    #[tokio::test]
    async fn feeds_track_changes() {
        let (evm_tx, evm_rx) = watch::channel(Vec::new());
        let (_sol_tx, sol_rx) = watch::channel(Vec::new());
        let mut feeds = WalletFeeds {
            evm: evm_rx,
            solana: sol_rx,
        };

        assert!(!feeds.has_changed());
        evm_tx.send_modify(|list| {
            list.push(EvmWalletHandle {
                address: "0xA".into(),
                origin: WalletOrigin::Custody,
            })
        });
        assert!(feeds.has_changed());

        let (evm, solana) = feeds.snapshot();
        assert_eq!(evm.len(), 1);
        assert!(solana.is_empty());
        assert!(!feeds.has_changed());
    }

    #[tokio::test]
    async fn changed_reports_closed_feeds() {
        let (evm_tx, evm_rx) = watch::channel(Vec::<EvmWalletHandle>::new());
        let (sol_tx, sol_rx) = watch::channel(Vec::<SolanaWalletHandle>::new());
        let mut feeds = WalletFeeds {
            evm: evm_rx,
            solana: sol_rx,
        };

        drop(evm_tx);
        drop(sol_tx);
        assert!(!feeds.changed().await);
    }
}
