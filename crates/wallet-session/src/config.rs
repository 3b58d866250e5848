use std::path::Path;
use std::time::Duration;

use chain_sol::rpc::DEVNET_RPC_URL;
use chain_sol::{Commitment, SolanaRpcClient};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::selector::StalePolicy;

pub const DEFAULT_EVM_RECIPIENT: &str = "0xE3070d3e4309afA3bC9a6b057685743CF42da77C";
pub const DEFAULT_MESSAGE: &str = "Hello, world! I am signing this message.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolanaConfig {
    /// JSON-RPC endpoint used for `getLatestBlockhash`.
    pub rpc_url: String,
    pub commitment: Commitment,
    pub request_timeout_secs: u64,
    /// Amount for the demo transfer, which goes back to the sender.
    pub default_transfer_lamports: u64,
}

impl Default for SolanaConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEVNET_RPC_URL.into(),
            commitment: Commitment::Finalized,
            request_timeout_secs: 20,
            default_transfer_lamports: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvmConfig {
    /// Recipient used when a transfer does not name one.
    pub default_recipient: String,
    pub default_transfer_wei: u64,
}

impl Default for EvmConfig {
    fn default() -> Self {
        Self {
            default_recipient: DEFAULT_EVM_RECIPIENT.into(),
            default_transfer_wei: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub stale_policy: StalePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Reject a second request of the same kind while one is pending.
    pub dedupe_in_flight: bool,
    pub default_message: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            dedupe_in_flight: true,
            default_message: DEFAULT_MESSAGE.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub solana: SolanaConfig,
    pub evm: EvmConfig,
    pub selection: SelectionConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

impl SessionConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, SessionError> {
        let cfg: Self = toml::from_str(s).map_err(|e| SessionError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("read {}: {e}", path.display())))?;
        let mut cfg: Self =
            toml::from_str(&raw).map_err(|e| SessionError::Config(e.to_string()))?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml_string(&self) -> Result<String, SessionError> {
        toml::to_string_pretty(self).map_err(|e| SessionError::Config(e.to_string()))
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|var| std::env::var(var).ok());
    }

    /// Apply overrides from `lookup`; blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = get("WALLET_SESSION_SOLANA_RPC_URL") {
            self.solana.rpc_url = url;
        }
        if let Some(filter) = get("WALLET_SESSION_LOG") {
            self.logging.filter = filter;
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        let url = self.solana.rpc_url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(SessionError::Config(format!(
                "solana.rpc_url must be an http(s) URL, got {url:?}"
            )));
        }
        if self.solana.request_timeout_secs == 0 {
            return Err(SessionError::Config(
                "solana.request_timeout_secs must be positive".into(),
            ));
        }
        chain_eth::address::validate_address(&self.evm.default_recipient).map_err(|e| {
            SessionError::Config(format!("evm.default_recipient: {e}"))
        })?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.solana.request_timeout_secs)
    }

    /// HTTP client for the configured Solana endpoint.
    pub fn rpc_client(&self) -> Result<SolanaRpcClient, SessionError> {
        Ok(SolanaRpcClient::with_options(
            self.solana.rpc_url.clone(),
            self.solana.commitment,
            self.request_timeout(),
        )?)
    }
}
