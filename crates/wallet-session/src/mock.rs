//! In-memory provider for tests and offline runs.
//!
//! [`MockCustody`] implements every provider trait, records each call, and
//! owns the sending half of both wallet feeds. Solana wallets are backed by
//! real Ed25519 keys, so signed transactions can be checked byte for byte.
//! EVM "signatures" are Keccak digests of the request and carry no meaning
//! beyond being stable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chain_eth::{EvmTransactionRequest, TypedData};
use chain_sol::transaction::{decode_compact_u16, SIGNATURE_LEN};
use chain_sol::{decode_wire_transaction, BlockhashSource};
use ed25519_dalek::{Signer as _, SigningKey};
use secrecy::{ExposeSecret as _, SecretString};
use serde_json::Value;
use sha3::{Digest, Keccak256};
use tokio::sync::{watch, Notify};

use crate::error::ProviderError;
use crate::provider::{
    Authenticator, EvmCustody, LinkTarget, SessionContext, SolanaCustody, WalletFeeds,
    SECP256K1_SIGN,
};
use crate::types::{
    EvmWalletHandle, LinkedAccount, SolanaWalletHandle, UserProfile, WalletOrigin,
};

/// EIP-712 "Mail" document, usable as a typed-data payload.
pub const MAIL_TYPED_DATA: &str = r#"{
    "domain": {
        "name": "Ether Mail",
        "version": "1",
        "chainId": 1,
        "verifyingContract": "0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC"
    },
    "types": {
        "Person": [
            { "name": "name", "type": "string" },
            { "name": "wallet", "type": "address" }
        ],
        "Mail": [
            { "name": "from", "type": "Person" },
            { "name": "to", "type": "Person" },
            { "name": "contents", "type": "string" }
        ]
    },
    "primaryType": "Mail",
    "message": {
        "from": { "name": "Cow", "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826" },
        "to": { "name": "Bob", "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB" },
        "contents": "Hello, Bob!"
    }
}"#;

/// Every provider entry point, for call records and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Login,
    Logout,
    LinkPasskey,
    UnlinkPasskey,
    LinkAccount,
    UnlinkAccount,
    EvmSignMessage,
    EvmSignTypedData,
    EvmRequest,
    EvmSignTransaction,
    EvmSendTransaction,
    EvmSwitchChain,
    EvmExport,
    EvmImport,
    EvmCreate,
    SolanaSignMessage,
    SolanaSignTransaction,
    SolanaSignAndSend,
    SolanaExport,
    SolanaImport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub capability: Capability,
    pub address: Option<String>,
    pub detail: Option<String>,
}

#[derive(Default)]
struct MockState {
    authenticated: bool,
    user: Option<UserProfile>,
    calls: Vec<Call>,
    failures: HashMap<Capability, ProviderError>,
    holds: HashMap<Capability, Arc<Notify>>,
    solana_keys: HashMap<String, SigningKey>,
    chain_ids: HashMap<String, u64>,
    last_solana_transaction: Option<Vec<u8>>,
    created: u64,
}

pub struct MockCustody {
    state: Mutex<MockState>,
    evm_feed: watch::Sender<Vec<EvmWalletHandle>>,
    solana_feed: watch::Sender<Vec<SolanaWalletHandle>>,
}

impl std::fmt::Debug for MockCustody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCustody").finish_non_exhaustive()
    }
}

fn keccak_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

fn default_user() -> UserProfile {
    UserProfile {
        id: "did:mock:user".into(),
        email: None,
        phone: None,
        linked_accounts: Vec::new(),
    }
}

impl MockCustody {
    pub fn new() -> Arc<Self> {
        let (evm_feed, _) = watch::channel(Vec::new());
        let (solana_feed, _) = watch::channel(Vec::new());
        Arc::new(Self {
            state: Mutex::new(MockState::default()),
            evm_feed,
            solana_feed,
        })
    }

    /// A session context backed entirely by this mock.
    pub fn context(self: &Arc<Self>, rpc: Arc<dyn BlockhashSource>) -> SessionContext {
        SessionContext::new(self.clone(), self.clone(), self.clone(), rpc)
    }

    pub fn feeds(&self) -> WalletFeeds {
        WalletFeeds {
            evm: self.evm_feed.subscribe(),
            solana: self.solana_feed.subscribe(),
        }
    }

    pub fn wallet_lists(&self) -> (Vec<EvmWalletHandle>, Vec<SolanaWalletHandle>) {
        (
            self.evm_feed.borrow().clone(),
            self.solana_feed.borrow().clone(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_evm_wallet(&self, address: &str, origin: WalletOrigin) {
        let handle = EvmWalletHandle {
            address: address.to_string(),
            origin,
        };
        self.evm_feed.send_modify(|list| list.push(handle));
    }

    /// Add a Solana wallet whose key is `[seed; 32]`. Returns its address.
    pub fn add_solana_wallet(&self, seed: u8, origin: WalletOrigin) -> String {
        self.add_solana_key(SigningKey::from_bytes(&[seed; 32]), origin)
    }

    fn add_solana_key(&self, key: SigningKey, origin: WalletOrigin) -> String {
        let address = bs58::encode(key.verifying_key().to_bytes()).into_string();
        self.lock().solana_keys.insert(address.clone(), key);
        let handle = SolanaWalletHandle {
            address: address.clone(),
            origin,
        };
        self.solana_feed.send_modify(|list| list.push(handle));
        address
    }

    /// Drop a wallet from whichever feed lists it.
    pub fn remove_wallet(&self, address: &str) {
        self.evm_feed
            .send_if_modified(|list| remove_matching(list, |h| h.address == address));
        self.solana_feed
            .send_if_modified(|list| remove_matching(list, |h| h.address == address));
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        let mut state = self.lock();
        state.authenticated = authenticated;
        state.user = authenticated.then(default_user);
    }

    /// Make every later call to `capability` fail with `err`.
    pub fn fail(&self, capability: Capability, err: ProviderError) {
        self.lock().failures.insert(capability, err);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Park the next call to `capability` until the returned handle is
    /// notified.
    pub fn hold(&self, capability: Capability) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().holds.insert(capability, gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn chain_id_of(&self, address: &str) -> Option<u64> {
        self.lock().chain_ids.get(address).copied()
    }

    /// The last Solana transaction signed, with signatures filled in.
    pub fn last_solana_transaction(&self) -> Option<Vec<u8>> {
        self.lock().last_solana_transaction.clone()
    }

    async fn enter(
        &self,
        capability: Capability,
        address: Option<&str>,
        detail: Option<String>,
    ) -> Result<(), ProviderError> {
        let gate = {
            let mut state = self.lock();
            state.calls.push(Call {
                capability,
                address: address.map(str::to_string),
                detail,
            });
            if let Some(err) = state.failures.get(&capability) {
                return Err(err.clone());
            }
            state.holds.remove(&capability)
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(())
    }

    fn solana_key(&self, address: &str) -> Result<SigningKey, ProviderError> {
        self.lock()
            .solana_keys
            .get(address)
            .cloned()
            .ok_or_else(|| ProviderError::Rejected(format!("unknown wallet {address}")))
    }

    fn is_custody_evm(&self, address: &str) -> bool {
        self.evm_feed
            .borrow()
            .iter()
            .any(|h| h.address == address && h.origin == WalletOrigin::Custody)
    }

    /// Fill this wallet's signature slot. Returns the signed bytes and the
    /// signature.
    fn sign_wire(
        &self,
        address: &str,
        transaction: &[u8],
    ) -> Result<(Vec<u8>, [u8; SIGNATURE_LEN]), ProviderError> {
        let key = self.solana_key(address)?;
        let rejected = |e: chain_sol::SolError| ProviderError::Rejected(e.to_string());

        let decoded = decode_wire_transaction(transaction).map_err(rejected)?;
        let pubkey = key.verifying_key().to_bytes();
        let slot = decoded
            .message
            .account_keys
            .iter()
            .take(usize::from(decoded.message.num_required_signatures))
            .position(|k| *k == pubkey)
            .ok_or_else(|| ProviderError::Rejected("wallet is not a required signer".into()))?;

        let (num_sigs, prefix_len) = decode_compact_u16(transaction).map_err(rejected)?;
        let message_start = prefix_len + usize::from(num_sigs) * SIGNATURE_LEN;
        let message = transaction
            .get(message_start..)
            .ok_or_else(|| ProviderError::Rejected("truncated transaction".into()))?;

        let signature = key.sign(message).to_bytes();
        let mut signed = transaction.to_vec();
        let at = prefix_len + slot * SIGNATURE_LEN;
        signed[at..at + SIGNATURE_LEN].copy_from_slice(&signature);

        self.lock().last_solana_transaction = Some(signed.clone());
        Ok((signed, signature))
    }
}

fn remove_matching<T>(list: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> bool {
    let before = list.len();
    list.retain(|item| !pred(item));
    list.len() != before
}

#[async_trait]
impl Authenticator for MockCustody {
    fn is_authenticated(&self) -> bool {
        self.lock().authenticated
    }

    fn current_user(&self) -> Option<UserProfile> {
        self.lock().user.clone()
    }

    async fn login(&self) -> Result<UserProfile, ProviderError> {
        self.enter(Capability::Login, None, None).await?;
        self.set_authenticated(true);
        Ok(default_user())
    }

    async fn logout(&self) -> Result<(), ProviderError> {
        self.enter(Capability::Logout, None, None).await?;
        self.set_authenticated(false);
        Ok(())
    }

    async fn link_passkey(&self) -> Result<(), ProviderError> {
        self.enter(Capability::LinkPasskey, None, None).await?;
        let mut state = self.lock();
        let n = state.created;
        state.created += 1;
        if let Some(user) = state.user.as_mut() {
            user.linked_accounts.push(LinkedAccount::Passkey {
                credential_id: format!("passkey-{n}"),
            });
        }
        Ok(())
    }

    async fn unlink_passkey(&self, credential_id: &str) -> Result<(), ProviderError> {
        self.enter(
            Capability::UnlinkPasskey,
            None,
            Some(credential_id.to_string()),
        )
        .await?;
        if let Some(user) = self.lock().user.as_mut() {
            user.linked_accounts.retain(|a| {
                !matches!(a, LinkedAccount::Passkey { credential_id: id } if id == credential_id)
            });
        }
        Ok(())
    }

    async fn link_account(&self, target: LinkTarget) -> Result<(), ProviderError> {
        self.enter(Capability::LinkAccount, None, Some(format!("{target:?}")))
            .await?;
        let account = match target {
            LinkTarget::Email(address) => LinkedAccount::Email { address },
            LinkTarget::Phone(number) => LinkedAccount::Phone { number },
            LinkTarget::Wallet => return Ok(()),
        };
        if let Some(user) = self.lock().user.as_mut() {
            user.linked_accounts.push(account);
        }
        Ok(())
    }

    async fn unlink_account(&self, account: &LinkedAccount) -> Result<(), ProviderError> {
        self.enter(Capability::UnlinkAccount, None, Some(format!("{account:?}")))
            .await?;
        if let Some(user) = self.lock().user.as_mut() {
            user.linked_accounts.retain(|a| a != account);
        }
        Ok(())
    }
}

#[async_trait]
impl EvmCustody for MockCustody {
    async fn sign_message(&self, address: &str, message: &str) -> Result<String, ProviderError> {
        self.enter(Capability::EvmSignMessage, Some(address), None)
            .await?;
        Ok(format!(
            "0x{}1b",
            keccak_hex(&[address.as_bytes(), message.as_bytes()])
        ))
    }

    async fn sign_typed_data(
        &self,
        address: &str,
        data: &TypedData,
    ) -> Result<String, ProviderError> {
        self.enter(
            Capability::EvmSignTypedData,
            Some(address),
            Some(data.primary_type.clone()),
        )
        .await?;
        let encoded = serde_json::to_vec(data)
            .map_err(|e| ProviderError::Rejected(e.to_string()))?;
        Ok(format!("0x{}1c", keccak_hex(&[address.as_bytes(), &encoded])))
    }

    async fn request(
        &self,
        address: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, ProviderError> {
        self.enter(Capability::EvmRequest, Some(address), Some(method.to_string()))
            .await?;
        if method != SECP256K1_SIGN {
            return Err(ProviderError::Rejected(format!("unsupported method {method}")));
        }
        if !self.is_custody_evm(address) {
            return Err(ProviderError::Rejected(format!(
                "{method} requires an embedded wallet"
            )));
        }
        let hash = params
            .get(0)
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Rejected("missing hash parameter".into()))?;
        Ok(Value::String(format!(
            "0x{}1b",
            keccak_hex(&[address.as_bytes(), hash.as_bytes()])
        )))
    }

    async fn sign_transaction(
        &self,
        address: &str,
        tx: &EvmTransactionRequest,
    ) -> Result<String, ProviderError> {
        self.enter(
            Capability::EvmSignTransaction,
            Some(address),
            Some(format!("{}:{}", tx.to, tx.value)),
        )
        .await?;
        Ok(format!(
            "0x02{}",
            keccak_hex(&[address.as_bytes(), tx.to.as_slice(), &tx.value.to_be_bytes::<32>()])
        ))
    }

    async fn send_transaction(
        &self,
        address: &str,
        tx: &EvmTransactionRequest,
    ) -> Result<String, ProviderError> {
        self.enter(
            Capability::EvmSendTransaction,
            Some(address),
            Some(format!("{}:{}", tx.to, tx.value)),
        )
        .await?;
        Ok(format!(
            "0x{}",
            keccak_hex(&[b"send".as_slice(), address.as_bytes(), tx.to.as_slice()])
        ))
    }

    async fn switch_chain(&self, address: &str, chain_id: u64) -> Result<(), ProviderError> {
        self.enter(
            Capability::EvmSwitchChain,
            Some(address),
            Some(chain_id.to_string()),
        )
        .await?;
        self.lock().chain_ids.insert(address.to_string(), chain_id);
        Ok(())
    }

    async fn export_wallet(&self, address: &str) -> Result<(), ProviderError> {
        self.enter(Capability::EvmExport, Some(address), None).await
    }

    async fn import_wallet(&self, private_key: &SecretString) -> Result<String, ProviderError> {
        self.enter(Capability::EvmImport, None, None).await?;
        let digest = keccak_hex(&[private_key.expose_secret().trim().as_bytes()]);
        let address = format!("0x{}", &digest[24..]);
        self.add_evm_wallet(&address, WalletOrigin::Custody);
        Ok(address)
    }

    async fn create_wallet(&self) -> Result<String, ProviderError> {
        self.enter(Capability::EvmCreate, None, None).await?;
        let n = {
            let mut state = self.lock();
            state.created += 1;
            state.created
        };
        let digest = keccak_hex(&[b"created".as_slice(), &n.to_be_bytes()]);
        let address = format!("0x{}", &digest[24..]);
        self.add_evm_wallet(&address, WalletOrigin::Custody);
        Ok(address)
    }
}

#[async_trait]
impl SolanaCustody for MockCustody {
    async fn sign_message(&self, address: &str, message: &[u8]) -> Result<Vec<u8>, ProviderError> {
        self.enter(Capability::SolanaSignMessage, Some(address), None)
            .await?;
        let key = self.solana_key(address)?;
        Ok(key.sign(message).to_bytes().to_vec())
    }

    async fn sign_transaction(
        &self,
        address: &str,
        transaction: &[u8],
    ) -> Result<Vec<u8>, ProviderError> {
        self.enter(Capability::SolanaSignTransaction, Some(address), None)
            .await?;
        let (signed, _) = self.sign_wire(address, transaction)?;
        Ok(signed)
    }

    async fn sign_and_send_transaction(
        &self,
        address: &str,
        transaction: &[u8],
    ) -> Result<Vec<u8>, ProviderError> {
        self.enter(Capability::SolanaSignAndSend, Some(address), None)
            .await?;
        let (_, signature) = self.sign_wire(address, transaction)?;
        Ok(signature.to_vec())
    }

    async fn export_wallet(&self, address: &str) -> Result<(), ProviderError> {
        self.enter(Capability::SolanaExport, Some(address), None)
            .await
    }

    async fn import_wallet(&self, private_key: &SecretString) -> Result<String, ProviderError> {
        self.enter(Capability::SolanaImport, None, None).await?;
        let mut hasher = Keccak256::new();
        hasher.update(private_key.expose_secret().trim().as_bytes());
        let seed: [u8; 32] = hasher.finalize().into();
        Ok(self.add_solana_key(SigningKey::from_bytes(&seed), WalletOrigin::Custody))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_sol::{StaticBlockhash, TransferBuilder};
    use ed25519_dalek::{Signature, Verifier as _, VerifyingKey};

    #[tokio::test]
    async fn signs_the_compiled_message() {
        let mock = MockCustody::new();
        let address = mock.add_solana_wallet(4, WalletOrigin::Custody);

        let tx = TransferBuilder::new(StaticBlockhash::new([1u8; 32]))
            .build(&address, &address, 1_000_000)
            .await
            .unwrap();
        let signed = SolanaCustody::sign_transaction(&*mock, &address, tx.as_bytes())
            .await
            .unwrap();

        let decoded = decode_wire_transaction(&signed).unwrap();
        let signature = Signature::from_bytes(&decoded.signatures[0]);
        let key = VerifyingKey::from_bytes(&decoded.message.account_keys[0]).unwrap();
        let message = &signed[1 + SIGNATURE_LEN..];
        assert!(key.verify(message, &signature).is_ok());
        assert_eq!(mock.last_solana_transaction(), Some(signed));
    }

    #[tokio::test]
    async fn failure_injection_records_the_call() {
        let mock = MockCustody::new();
        mock.fail(Capability::SolanaSignMessage, ProviderError::UserRejected);

        let err = SolanaCustody::sign_message(&*mock, "addr", b"hi")
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::UserRejected);
        assert_eq!(mock.calls()[0].capability, Capability::SolanaSignMessage);
    }

    #[tokio::test]
    async fn raw_hash_is_refused_for_external_wallets() {
        let mock = MockCustody::new();
        mock.add_evm_wallet("0xabc", WalletOrigin::external("metamask"));

        let err = mock
            .request("0xabc", SECP256K1_SIGN, serde_json::json!(["0x00"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
    }

    #[tokio::test]
    async fn import_pushes_wallet_to_feed() {
        let mock = MockCustody::new();
        let mut feeds = mock.feeds();

        let secret = SecretString::new("4c0883a6".to_string().into_boxed_str());
        let address = SolanaCustody::import_wallet(&*mock, &secret).await.unwrap();

        assert!(feeds.has_changed());
        let (_, solana) = feeds.snapshot();
        assert_eq!(solana[0].address, address);
        assert_eq!(solana[0].origin, WalletOrigin::Custody);
    }

    #[test]
    fn remove_wallet_only_touches_matching_feed() {
        let mock = MockCustody::new();
        mock.add_evm_wallet("0xA", WalletOrigin::Custody);
        let sol = mock.add_solana_wallet(2, WalletOrigin::Custody);

        mock.remove_wallet(&sol);
        let (evm, solana) = mock.wallet_lists();
        assert_eq!(evm.len(), 1);
        assert!(solana.is_empty());
    }

    #[test]
    fn mail_document_is_valid() {
        assert!(TypedData::from_json(MAIL_TYPED_DATA).is_ok());
    }
}
