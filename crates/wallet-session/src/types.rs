use std::fmt;

use serde::{Deserialize, Serialize};

/// The account/transaction model a wallet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Ethereum,
    Solana,
}

impl ChainFamily {
    /// Short label used in notifications
    pub fn label(&self) -> &'static str {
        match self {
            ChainFamily::Ethereum => "EVM",
            ChainFamily::Solana => "Solana",
        }
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFamily::Ethereum => f.write_str("ethereum"),
            ChainFamily::Solana => f.write_str("solana"),
        }
    }
}

/// Who holds the keys behind a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum WalletOrigin {
    /// Key material is managed by the identity/custody provider.
    Custody,
    /// A wallet the provider only observes, connected through `connector`.
    External { connector: String },
}

impl WalletOrigin {
    pub fn external(connector: impl Into<String>) -> Self {
        WalletOrigin::External {
            connector: connector.into(),
        }
    }
}

/// An EVM wallet as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmWalletHandle {
    pub address: String,
    pub origin: WalletOrigin,
}

/// A Solana wallet as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolanaWalletHandle {
    pub address: String,
    pub origin: WalletOrigin,
}

/// Either provider-native wallet shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletHandle {
    Evm(EvmWalletHandle),
    Solana(SolanaWalletHandle),
}

/// Identity of a wallet inside the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletId {
    pub address: String,
    pub chain_family: ChainFamily,
}

/// The chain-agnostic wallet entry every downstream component works with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub address: String,
    pub chain_family: ChainFamily,
    pub origin: WalletOrigin,
}

impl WalletRecord {
    pub fn id(&self) -> WalletId {
        WalletId {
            address: self.address.clone(),
            chain_family: self.chain_family,
        }
    }

    pub fn matches(&self, id: &WalletId) -> bool {
        self.address == id.address && self.chain_family == id.chain_family
    }

    pub fn is_custody(&self) -> bool {
        matches!(self.origin, WalletOrigin::Custody)
    }
}

/// Kinds of account the user can attach to their identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum LinkedAccount {
    Email { address: String },
    Phone { number: String },
    Wallet { address: String, chain_family: ChainFamily },
    Passkey { credential_id: String },
}

/// The authenticated user, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub linked_accounts: Vec<LinkedAccount>,
}

impl UserProfile {
    pub fn passkeys(&self) -> impl Iterator<Item = &str> {
        self.linked_accounts.iter().filter_map(|account| match account {
            LinkedAccount::Passkey { credential_id } => Some(credential_id.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_labels() {
        assert_eq!(ChainFamily::Ethereum.label(), "EVM");
        assert_eq!(ChainFamily::Solana.label(), "Solana");
        assert_eq!(ChainFamily::Solana.to_string(), "solana");
    }

    #[test]
    fn record_identity_ignores_origin() {
        let custody = WalletRecord {
            address: "0xA".into(),
            chain_family: ChainFamily::Ethereum,
            origin: WalletOrigin::Custody,
        };
        let external = WalletRecord {
            origin: WalletOrigin::external("metamask"),
            ..custody.clone()
        };

        assert!(external.matches(&custody.id()));
        assert!(custody.is_custody());
        assert!(!external.is_custody());
    }

    #[test]
    fn same_address_different_family_is_a_different_wallet() {
        let record = WalletRecord {
            address: "shared".into(),
            chain_family: ChainFamily::Solana,
            origin: WalletOrigin::Custody,
        };
        let id = WalletId {
            address: "shared".into(),
            chain_family: ChainFamily::Ethereum,
        };
        assert!(!record.matches(&id));
    }

    #[test]
    fn origin_serializes_tagged() {
        let json = serde_json::to_value(WalletOrigin::external("phantom")).unwrap();
        assert_eq!(json["kind"], "external");
        assert_eq!(json["connector"], "phantom");
    }

    #[test]
    fn profile_lists_passkeys() {
        let profile = UserProfile {
            id: "did:privy:123".into(),
            email: Some("a@example.com".into()),
            phone: None,
            linked_accounts: vec![
                LinkedAccount::Email {
                    address: "a@example.com".into(),
                },
                LinkedAccount::Passkey {
                    credential_id: "cred-1".into(),
                },
            ],
        };
        assert_eq!(profile.passkeys().collect::<Vec<_>>(), vec!["cred-1"]);
    }
}
