//! User-facing notifications for action results.
//!
//! Successes show only a short prefix of any signature or transaction so the
//! user can tell something happened; failures get a distinct message per
//! error kind.

use std::fmt;

use crate::dispatcher::{ActionKind, ActionOutcome};
use crate::error::{ProviderError, SessionError};
use crate::network::NetworkSwitch;
use crate::types::ChainFamily;

const SHORT_PREFIX: usize = 10;
const LONG_PREFIX: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn prefix(s: &str, n: usize) -> String {
    let mut out: String = s.chars().take(n).collect();
    out.push_str("...");
    out
}

impl Notification {
    pub fn success(outcome: &ActionOutcome) -> Self {
        let message = match outcome {
            ActionOutcome::MessageSigned { family, signature } => format!(
                "{} message signed: {}",
                family.label(),
                prefix(signature, SHORT_PREFIX)
            ),
            ActionOutcome::TypedDataSigned { signature } => {
                format!("Typed data signed: {}", prefix(signature, SHORT_PREFIX))
            }
            ActionOutcome::RawHashSigned { signature } => {
                format!("Raw hash signed: {}", prefix(signature, SHORT_PREFIX))
            }
            ActionOutcome::TransactionSigned {
                family: ChainFamily::Ethereum,
                signed,
            } => format!("EVM transaction signed: {}", prefix(signed, LONG_PREFIX)),
            ActionOutcome::TransactionSigned {
                family: ChainFamily::Solana,
                ..
            } => "Solana transaction signed successfully".to_string(),
            ActionOutcome::TransactionSent { family, id } => {
                let len = match family {
                    ChainFamily::Ethereum => LONG_PREFIX,
                    ChainFamily::Solana => SHORT_PREFIX,
                };
                format!("{} transaction sent: {}", family.label(), prefix(id, len))
            }
            ActionOutcome::WalletExported { family, .. } => {
                format!("{} wallet export opened", family.label())
            }
            ActionOutcome::WalletImported { family, address } => {
                format!("{} wallet imported: {address}", family.label())
            }
        };
        Self {
            level: Level::Success,
            message,
        }
    }

    pub fn network_switched(switch: &NetworkSwitch) -> Self {
        Self {
            level: Level::Success,
            message: format!("Switched to {}", switch.label),
        }
    }

    /// Failure text for `err`, naming the action when the provider refused it.
    pub fn failure(action: Option<ActionKind>, err: &SessionError) -> Self {
        let message = match err {
            SessionError::NotAuthenticated => "Please log in first".to_string(),
            SessionError::NoWalletSelected => "Please select a wallet".to_string(),
            SessionError::UnsupportedChainFamily { action, family } => {
                format!("Cannot {action} with a {} wallet", family.label())
            }
            SessionError::RequiresCustodyWallet => {
                "This action needs an embedded wallet".to_string()
            }
            SessionError::EmptySecret => "Please enter a private key".to_string(),
            SessionError::WalletNotFound(address) => format!("Wallet {address} not found"),
            SessionError::BlockhashFetchFailed(reason) => {
                format!("Could not fetch a recent blockhash: {reason}")
            }
            SessionError::InvalidAddress(reason) => format!("Invalid address: {reason}"),
            SessionError::ProviderRejected(ProviderError::UserRejected) => match action {
                Some(kind) => format!("Request to {kind} was declined"),
                None => "Request was declined".to_string(),
            },
            SessionError::ProviderRejected(reason) => match action {
                Some(kind) => format!("Failed to {kind}: {reason}"),
                None => format!("Wallet provider error: {reason}"),
            },
            SessionError::SwitchFailed(reason) => format!("Failed to switch network: {reason}"),
            SessionError::ActionInFlight(kind) => format!("Already trying to {kind}"),
            SessionError::InvalidRequest(reason) => format!("Invalid request: {reason}"),
            SessionError::TransactionBuild(reason) => {
                format!("Could not build transaction: {reason}")
            }
            SessionError::Config(reason) => format!("Configuration error: {reason}"),
        };
        Self {
            level: Level::Failure,
            message,
        }
    }

    pub fn for_result(kind: ActionKind, result: &Result<ActionOutcome, SessionError>) -> Self {
        match result {
            Ok(outcome) => Self::success(outcome),
            Err(err) => Self::failure(Some(kind), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evm_signature_shows_ten_chars() {
        let n = Notification::success(&ActionOutcome::MessageSigned {
            family: ChainFamily::Ethereum,
            signature: "0x1234567890abcdef".into(),
        });
        assert_eq!(n.level, Level::Success);
        assert_eq!(n.message, "EVM message signed: 0x12345678...");
    }

    #[test]
    fn evm_transaction_shows_twenty_chars() {
        let n = Notification::success(&ActionOutcome::TransactionSent {
            family: ChainFamily::Ethereum,
            id: format!("0x{}", "ab".repeat(32)),
        });
        assert_eq!(n.message, "EVM transaction sent: 0xababababababababab...");
    }

    #[test]
    fn solana_signed_transaction_is_not_echoed() {
        let n = Notification::success(&ActionOutcome::TransactionSigned {
            family: ChainFamily::Solana,
            signed: "AQAAAA".repeat(40),
        });
        assert!(!n.message.contains("AQAA"));
    }

    #[test]
    fn short_values_are_not_padded() {
        assert_eq!(prefix("abc", SHORT_PREFIX), "abc...");
    }

    #[test]
    fn every_error_has_a_distinct_message() {
        let errors = [
            SessionError::NotAuthenticated,
            SessionError::NoWalletSelected,
            SessionError::UnsupportedChainFamily {
                action: "sign typed data",
                family: ChainFamily::Solana,
            },
            SessionError::RequiresCustodyWallet,
            SessionError::EmptySecret,
            SessionError::WalletNotFound("x".into()),
            SessionError::BlockhashFetchFailed("x".into()),
            SessionError::InvalidAddress("x".into()),
            SessionError::ProviderRejected(ProviderError::UserRejected),
            SessionError::ProviderRejected(ProviderError::Unavailable),
            SessionError::SwitchFailed(ProviderError::Unavailable),
            SessionError::ActionInFlight(ActionKind::SignMessage),
            SessionError::InvalidRequest("x".into()),
            SessionError::TransactionBuild("x".into()),
            SessionError::Config("x".into()),
        ];
        let messages: Vec<String> = errors
            .iter()
            .map(|e| Notification::failure(Some(ActionKind::SignMessage), e).message)
            .collect();
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn provider_failure_names_the_action() {
        let n = Notification::for_result(
            ActionKind::SendTransaction,
            &Err(SessionError::ProviderRejected(ProviderError::Network(
                "timeout".into(),
            ))),
        );
        assert_eq!(n.level, Level::Failure);
        assert_eq!(n.message, "Failed to send transaction: network error: timeout");
    }
}
