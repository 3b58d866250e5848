//! Table-driven routing of wallet actions.
//!
//! Each [`ActionKind`] maps to an ordered guard list. Guards run
//! synchronously, before any provider call, and stop at the first failure.
//! The executor is then picked by action kind and the selected wallet's
//! chain family.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use alloy_primitives::B256;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chain_eth::request::{parse_raw_hash, raw_hash_param};
use chain_eth::{EvmTransactionRequest, TypedData};
use chain_sol::TransferBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{ProviderError, SessionError};
use crate::provider::{SessionContext, SECP256K1_SIGN};
use crate::selector::ActiveWalletSelector;
use crate::types::{ChainFamily, WalletRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    SignMessage,
    SignTypedData,
    SignRawHash,
    SignTransaction,
    SendTransaction,
    ExportWallet,
    ImportWallet,
}

/// A precondition checked before an action reaches the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Authenticated,
    WalletSelected,
    EthereumFamily,
    CustodyWallet,
    NonEmptySecret,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::SignMessage,
        ActionKind::SignTypedData,
        ActionKind::SignRawHash,
        ActionKind::SignTransaction,
        ActionKind::SendTransaction,
        ActionKind::ExportWallet,
        ActionKind::ImportWallet,
    ];

    /// Guards for this action, in evaluation order.
    pub fn guards(self) -> &'static [Guard] {
        use Guard::*;
        match self {
            ActionKind::SignMessage | ActionKind::SignTransaction | ActionKind::SendTransaction => {
                &[WalletSelected]
            }
            ActionKind::SignTypedData => &[WalletSelected, EthereumFamily],
            ActionKind::SignRawHash => &[WalletSelected, EthereumFamily, CustodyWallet],
            ActionKind::ExportWallet => &[Authenticated],
            // The secret check comes first so an empty import fails the same
            // way whether or not the user is logged in.
            ActionKind::ImportWallet => &[NonEmptySecret, Authenticated],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActionKind::SignMessage => "sign message",
            ActionKind::SignTypedData => "sign typed data",
            ActionKind::SignRawHash => "sign raw hash",
            ActionKind::SignTransaction => "sign transaction",
            ActionKind::SendTransaction => "send transaction",
            ActionKind::ExportWallet => "export wallet",
            ActionKind::ImportWallet => "import wallet",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A SOL or native EVM transfer. `destination` falls back to the configured
/// EVM recipient, or to the fee payer itself on Solana.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub destination: Option<String>,
    pub amount_minor_units: u128,
}

impl TransferRequest {
    pub fn new(destination: Option<String>, amount_minor_units: u128) -> Self {
        Self {
            destination,
            amount_minor_units,
        }
    }
}

/// One action together with its payload.
#[derive(Debug)]
pub enum ActionRequest {
    SignMessage { text: String },
    SignTypedData(TypedData),
    SignRawHash { hash: B256 },
    SignTransaction(TransferRequest),
    SendTransaction(TransferRequest),
    ExportWallet { family: ChainFamily },
    ImportWallet { family: ChainFamily, secret: SecretString },
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRequest::SignMessage { .. } => ActionKind::SignMessage,
            ActionRequest::SignTypedData(_) => ActionKind::SignTypedData,
            ActionRequest::SignRawHash { .. } => ActionKind::SignRawHash,
            ActionRequest::SignTransaction(_) => ActionKind::SignTransaction,
            ActionRequest::SendTransaction(_) => ActionKind::SendTransaction,
            ActionRequest::ExportWallet { .. } => ActionKind::ExportWallet,
            ActionRequest::ImportWallet { .. } => ActionKind::ImportWallet,
        }
    }

    pub fn sign_message(text: impl Into<String>) -> Self {
        ActionRequest::SignMessage { text: text.into() }
    }

    /// Parse a hex hash (with or without `0x`) into a raw-hash request.
    pub fn sign_raw_hash(hash_hex: &str) -> Result<Self, SessionError> {
        Ok(ActionRequest::SignRawHash {
            hash: parse_raw_hash(hash_hex)?,
        })
    }

    /// Parse and validate an EIP-712 JSON document into a typed-data request.
    pub fn sign_typed_data_json(json: &str) -> Result<Self, SessionError> {
        Ok(ActionRequest::SignTypedData(TypedData::from_json(json)?))
    }

    pub fn import_wallet(family: ChainFamily, secret: impl Into<String>) -> Self {
        ActionRequest::ImportWallet {
            family,
            secret: SecretString::new(secret.into().into_boxed_str()),
        }
    }
}

/// What a successful action produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Hex for EVM, base58 for Solana.
    MessageSigned {
        family: ChainFamily,
        signature: String,
    },
    TypedDataSigned {
        signature: String,
    },
    RawHashSigned {
        signature: String,
    },
    /// Provider-encoded for EVM, base64 wire bytes for Solana.
    TransactionSigned {
        family: ChainFamily,
        signed: String,
    },
    /// Transaction hash for EVM, base58 signature for Solana.
    TransactionSent {
        family: ChainFamily,
        id: String,
    },
    WalletExported {
        family: ChainFamily,
        address: String,
    },
    WalletImported {
        family: ChainFamily,
        address: String,
    },
}

#[derive(Debug, Default)]
struct InFlight {
    active: Mutex<HashSet<ActionKind>>,
}

impl InFlight {
    fn try_claim(&self, kind: ActionKind) -> Option<InFlightClaim<'_>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active
            .insert(kind)
            .then(|| InFlightClaim { owner: self, kind })
    }

    fn is_active(&self, kind: ActionKind) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&kind)
    }
}

/// Releases the action kind when dropped, including on cancellation.
struct InFlightClaim<'a> {
    owner: &'a InFlight,
    kind: ActionKind,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.owner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.kind);
    }
}

pub struct ChainDispatcher {
    ctx: SessionContext,
    selector: Arc<ActiveWalletSelector>,
    transfers: TransferBuilder<Arc<dyn chain_sol::BlockhashSource>>,
    default_recipient: String,
    dedupe: bool,
    in_flight: InFlight,
}

impl fmt::Debug for ChainDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainDispatcher")
            .field("default_recipient", &self.default_recipient)
            .field("dedupe", &self.dedupe)
            .finish_non_exhaustive()
    }
}

impl ChainDispatcher {
    pub fn new(
        ctx: SessionContext,
        selector: Arc<ActiveWalletSelector>,
        config: &SessionConfig,
    ) -> Self {
        let transfers = TransferBuilder::new(Arc::clone(&ctx.rpc));
        Self {
            ctx,
            selector,
            transfers,
            default_recipient: config.evm.default_recipient.clone(),
            dedupe: config.dispatch.dedupe_in_flight,
            in_flight: InFlight::default(),
        }
    }

    pub fn is_in_flight(&self, kind: ActionKind) -> bool {
        self.in_flight.is_active(kind)
    }

    /// Run `request` through its guards, then its chain-specific executor.
    ///
    /// Provider and RPC failures are returned unchanged and never retried.
    pub async fn perform(&self, request: ActionRequest) -> Result<ActionOutcome, SessionError> {
        let kind = request.kind();
        info!(action = %kind, "action requested");

        let wallet = match self.check_guards(&request) {
            Ok(wallet) => wallet,
            Err(e) => {
                warn!(action = %kind, error = %e, "guard rejected action");
                return Err(e);
            }
        };

        let _claim = if self.dedupe {
            match self.in_flight.try_claim(kind) {
                Some(claim) => Some(claim),
                None => {
                    warn!(action = %kind, "action already in flight");
                    return Err(SessionError::ActionInFlight(kind));
                }
            }
        } else {
            None
        };

        let result = self.execute(request, wallet).await;
        match &result {
            Ok(_) => info!(action = %kind, "action completed"),
            Err(e) => warn!(action = %kind, error = %e, "action failed"),
        }
        result
    }

    /// Evaluate the guard list for `request`. Returns the selected wallet
    /// when the action needs one.
    pub fn check_guards(
        &self,
        request: &ActionRequest,
    ) -> Result<Option<WalletRecord>, SessionError> {
        let kind = request.kind();
        let mut wallet: Option<WalletRecord> = None;

        for guard in kind.guards() {
            debug!(action = %kind, guard = ?guard, "checking guard");
            match guard {
                Guard::Authenticated => {
                    if !self.ctx.auth.is_authenticated() {
                        return Err(SessionError::NotAuthenticated);
                    }
                }
                Guard::WalletSelected => {
                    wallet = Some(self.selector.resolve()?);
                }
                Guard::EthereumFamily => {
                    let selected = wallet.as_ref().ok_or(SessionError::NoWalletSelected)?;
                    if selected.chain_family != ChainFamily::Ethereum {
                        return Err(SessionError::UnsupportedChainFamily {
                            action: kind.label(),
                            family: selected.chain_family,
                        });
                    }
                }
                Guard::CustodyWallet => {
                    let selected = wallet.as_ref().ok_or(SessionError::NoWalletSelected)?;
                    if !selected.is_custody() {
                        return Err(SessionError::RequiresCustodyWallet);
                    }
                }
                Guard::NonEmptySecret => {
                    if let ActionRequest::ImportWallet { secret, .. } = request {
                        if secret.expose_secret().trim().is_empty() {
                            return Err(SessionError::EmptySecret);
                        }
                    }
                }
            }
        }
        Ok(wallet)
    }

    async fn execute(
        &self,
        request: ActionRequest,
        wallet: Option<WalletRecord>,
    ) -> Result<ActionOutcome, SessionError> {
        match request {
            ActionRequest::ExportWallet { family } => self.export_wallet(family).await,
            ActionRequest::ImportWallet { family, secret } => {
                self.import_wallet(family, &secret).await
            }
            request => {
                let wallet = wallet.ok_or(SessionError::NoWalletSelected)?;
                debug!(
                    action = %request.kind(),
                    family = %wallet.chain_family,
                    address = %wallet.address,
                    "routing"
                );
                match wallet.chain_family {
                    ChainFamily::Ethereum => self.execute_evm(request, &wallet).await,
                    ChainFamily::Solana => self.execute_solana(request, &wallet).await,
                }
            }
        }
    }

    async fn execute_evm(
        &self,
        request: ActionRequest,
        wallet: &WalletRecord,
    ) -> Result<ActionOutcome, SessionError> {
        let evm = &self.ctx.evm;
        let address = wallet.address.as_str();
        let family = ChainFamily::Ethereum;

        match request {
            ActionRequest::SignMessage { text } => {
                let signature = evm.sign_message(address, &text).await?;
                Ok(ActionOutcome::MessageSigned { family, signature })
            }
            ActionRequest::SignTypedData(data) => {
                let signature = evm.sign_typed_data(address, &data).await?;
                Ok(ActionOutcome::TypedDataSigned { signature })
            }
            ActionRequest::SignRawHash { hash } => {
                let params = json!([raw_hash_param(&hash)]);
                let response = evm.request(address, SECP256K1_SIGN, params).await?;
                let signature = match response {
                    Value::String(signature) => signature,
                    other => {
                        return Err(SessionError::ProviderRejected(ProviderError::Rejected(
                            format!("unexpected {SECP256K1_SIGN} response: {other}"),
                        )))
                    }
                };
                Ok(ActionOutcome::RawHashSigned { signature })
            }
            ActionRequest::SignTransaction(transfer) => {
                let tx = self.evm_transaction(&transfer)?;
                let signed = evm.sign_transaction(address, &tx).await?;
                Ok(ActionOutcome::TransactionSigned { family, signed })
            }
            ActionRequest::SendTransaction(transfer) => {
                let tx = self.evm_transaction(&transfer)?;
                let id = evm.send_transaction(address, &tx).await?;
                Ok(ActionOutcome::TransactionSent { family, id })
            }
            other => Err(SessionError::InvalidRequest(format!(
                "{} does not target the selected wallet",
                other.kind()
            ))),
        }
    }

    async fn execute_solana(
        &self,
        request: ActionRequest,
        wallet: &WalletRecord,
    ) -> Result<ActionOutcome, SessionError> {
        let solana = &self.ctx.solana;
        let address = wallet.address.as_str();
        let family = ChainFamily::Solana;

        match request {
            ActionRequest::SignMessage { text } => {
                let signature = solana.sign_message(address, text.as_bytes()).await?;
                Ok(ActionOutcome::MessageSigned {
                    family,
                    signature: bs58::encode(signature).into_string(),
                })
            }
            ActionRequest::SignTransaction(transfer) => {
                let tx = self.solana_transaction(wallet, &transfer).await?;
                let signed = solana.sign_transaction(address, tx.as_bytes()).await?;
                Ok(ActionOutcome::TransactionSigned {
                    family,
                    signed: STANDARD.encode(signed),
                })
            }
            ActionRequest::SendTransaction(transfer) => {
                let tx = self.solana_transaction(wallet, &transfer).await?;
                let signature = solana
                    .sign_and_send_transaction(address, tx.as_bytes())
                    .await?;
                Ok(ActionOutcome::TransactionSent {
                    family,
                    id: bs58::encode(signature).into_string(),
                })
            }
            other => Err(SessionError::UnsupportedChainFamily {
                action: other.kind().label(),
                family,
            }),
        }
    }

    fn evm_transaction(
        &self,
        transfer: &TransferRequest,
    ) -> Result<EvmTransactionRequest, SessionError> {
        let to = transfer
            .destination
            .as_deref()
            .unwrap_or(self.default_recipient.as_str());
        Ok(EvmTransactionRequest::new(to, transfer.amount_minor_units)?)
    }

    async fn solana_transaction(
        &self,
        wallet: &WalletRecord,
        transfer: &TransferRequest,
    ) -> Result<chain_sol::WireTransaction, SessionError> {
        let lamports = u64::try_from(transfer.amount_minor_units).map_err(|_| {
            SessionError::InvalidRequest(format!(
                "{} lamports does not fit in u64",
                transfer.amount_minor_units
            ))
        })?;
        let destination = transfer
            .destination
            .as_deref()
            .unwrap_or(wallet.address.as_str());
        let tx = self
            .transfers
            .build(&wallet.address, destination, lamports)
            .await?;
        debug!(
            bytes = tx.as_bytes().len(),
            last_valid_block_height = tx.last_valid_block_height(),
            "built solana transfer"
        );
        Ok(tx)
    }

    async fn export_wallet(&self, family: ChainFamily) -> Result<ActionOutcome, SessionError> {
        let registry = self.selector.registry();
        let wallet = registry
            .first_custody(family)
            .ok_or(SessionError::RequiresCustodyWallet)?;
        let address = wallet.address.clone();

        match family {
            ChainFamily::Ethereum => self.ctx.evm.export_wallet(&address).await?,
            ChainFamily::Solana => self.ctx.solana.export_wallet(&address).await?,
        }
        Ok(ActionOutcome::WalletExported { family, address })
    }

    async fn import_wallet(
        &self,
        family: ChainFamily,
        secret: &SecretString,
    ) -> Result<ActionOutcome, SessionError> {
        let address = match family {
            ChainFamily::Ethereum => self.ctx.evm.import_wallet(secret).await?,
            ChainFamily::Solana => self.ctx.solana.import_wallet(secret).await?,
        };
        Ok(ActionOutcome::WalletImported { family, address })
    }
}
