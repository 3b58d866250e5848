//! The session facade a UI talks to.
//!
//! [`WalletSession::open`] builds the selector, dispatcher and network
//! controller around one [`SessionContext`] and returns a [`RegistrySync`]
//! that keeps the registry in step with the provider's wallet feeds.

use std::sync::Arc;

use chain_eth::chains::EvmChain;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::dispatcher::{ActionOutcome, ActionRequest, ChainDispatcher, TransferRequest};
use crate::error::SessionError;
use crate::network::{NetworkSwitch, NetworkSwitchController};
use crate::notify::Notification;
use crate::provider::{LinkTarget, SessionContext, WalletFeeds};
use crate::registry::{normalize_evm, normalize_solana, UnifiedRegistry};
use crate::selector::ActiveWalletSelector;
use crate::types::{ChainFamily, LinkedAccount, UserProfile, WalletRecord};

/// Rebuilds the registry whenever a wallet feed changes.
pub struct RegistrySync {
    feeds: WalletFeeds,
    selector: Arc<ActiveWalletSelector>,
    generation: u64,
}

impl RegistrySync {
    /// Recompute the registry from the current lists and hand it to the
    /// selector. Returns the selection afterwards.
    pub fn refresh(&mut self) -> Option<WalletRecord> {
        let (evm, solana) = self.feeds.snapshot();
        self.generation += 1;
        let registry =
            UnifiedRegistry::recompute(normalize_evm(&evm), normalize_solana(&solana))
                .with_generation(self.generation);
        debug!(
            evm = evm.len(),
            solana = solana.len(),
            generation = self.generation,
            "registry recomputed"
        );
        self.selector.on_registry_changed(registry)
    }

    /// Refresh only if a feed changed since the last read.
    pub fn refresh_if_changed(&mut self) -> bool {
        if self.feeds.has_changed() {
            self.refresh();
            true
        } else {
            false
        }
    }

    /// Follow the feeds until the provider drops them.
    pub async fn run(mut self) {
        while self.feeds.changed().await {
            self.refresh();
        }
        debug!("wallet feeds closed");
    }
}

pub struct WalletSession {
    ctx: SessionContext,
    config: SessionConfig,
    selector: Arc<ActiveWalletSelector>,
    dispatcher: ChainDispatcher,
    network: NetworkSwitchController,
}

impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession")
            .field("selected", &self.selector.current())
            .finish_non_exhaustive()
    }
}

impl WalletSession {
    /// Build a session and load the provider's current wallet lists.
    pub fn open(
        ctx: SessionContext,
        feeds: WalletFeeds,
        config: SessionConfig,
    ) -> (Self, RegistrySync) {
        let selector = Arc::new(ActiveWalletSelector::new(config.selection.stale_policy));
        let dispatcher = ChainDispatcher::new(ctx.clone(), Arc::clone(&selector), &config);
        let network = NetworkSwitchController::new(Arc::clone(&ctx.evm));

        let mut sync = RegistrySync {
            feeds,
            selector: Arc::clone(&selector),
            generation: 0,
        };
        sync.refresh();

        let session = Self {
            ctx,
            config,
            selector,
            dispatcher,
            network,
        };
        (session, sync)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> UnifiedRegistry {
        self.selector.registry()
    }

    pub fn selected(&self) -> Option<WalletRecord> {
        self.selector.current()
    }

    pub fn select_wallet(&self, address: &str) -> Result<WalletRecord, SessionError> {
        self.selector.select_by_address(address)
    }

    pub async fn perform(&self, request: ActionRequest) -> Result<ActionOutcome, SessionError> {
        self.dispatcher.perform(request).await
    }

    /// Perform `request` and describe the result for the user.
    pub async fn perform_notified(&self, request: ActionRequest) -> Notification {
        let kind = request.kind();
        let result = self.dispatcher.perform(request).await;
        Notification::for_result(kind, &result)
    }

    /// The configured demo message.
    pub fn default_message(&self) -> ActionRequest {
        ActionRequest::sign_message(self.config.dispatch.default_message.clone())
    }

    /// The configured demo transfer for the selected wallet's chain: the
    /// EVM default recipient, or a Solana self-transfer.
    pub fn default_transfer(&self) -> Result<TransferRequest, SessionError> {
        let wallet = self.selector.resolve()?;
        let amount = match wallet.chain_family {
            ChainFamily::Ethereum => u128::from(self.config.evm.default_transfer_wei),
            ChainFamily::Solana => u128::from(self.config.solana.default_transfer_lamports),
        };
        Ok(TransferRequest::new(None, amount))
    }

    pub fn networks(&self) -> Vec<&'static EvmChain> {
        self.network.catalogue()
    }

    pub async fn switch_network(
        &self,
        wallet: &WalletRecord,
        chain_id: u64,
    ) -> Result<NetworkSwitch, SessionError> {
        self.network.switch_network(wallet, chain_id).await
    }

    /// Switch the selected wallet's chain.
    pub async fn switch_selected_network(
        &self,
        chain_id: u64,
    ) -> Result<NetworkSwitch, SessionError> {
        let wallet = self.selector.resolve()?;
        self.network.switch_network(&wallet, chain_id).await
    }

    pub fn is_authenticated(&self) -> bool {
        self.ctx.auth.is_authenticated()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.ctx.auth.current_user()
    }

    fn require_auth(&self) -> Result<(), SessionError> {
        if self.ctx.auth.is_authenticated() {
            Ok(())
        } else {
            Err(SessionError::NotAuthenticated)
        }
    }

    pub async fn login(&self) -> Result<UserProfile, SessionError> {
        let user = self.ctx.auth.login().await?;
        info!(user = %user.id, "logged in");
        Ok(user)
    }

    /// Log out and drop the registry and selection.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.ctx.auth.logout().await?;
        self.selector.clear();
        info!("logged out");
        Ok(())
    }

    /// Ask the provider for a new custody-backed EVM wallet. It shows up in
    /// the registry once the provider's feed reports it.
    pub async fn create_wallet(&self) -> Result<String, SessionError> {
        self.require_auth()?;
        let address = self.ctx.evm.create_wallet().await?;
        info!(address = %address, "wallet created");
        Ok(address)
    }

    pub async fn link_passkey(&self) -> Result<(), SessionError> {
        self.require_auth()?;
        Ok(self.ctx.auth.link_passkey().await?)
    }

    pub async fn unlink_passkey(&self, credential_id: &str) -> Result<(), SessionError> {
        self.require_auth()?;
        if credential_id.trim().is_empty() {
            return Err(SessionError::InvalidRequest("no passkey selected".into()));
        }
        Ok(self.ctx.auth.unlink_passkey(credential_id).await?)
    }

    pub async fn link_account(&self, target: LinkTarget) -> Result<(), SessionError> {
        self.require_auth()?;
        match &target {
            LinkTarget::Email(v) | LinkTarget::Phone(v) if v.trim().is_empty() => {
                return Err(SessionError::InvalidRequest("nothing to link".into()));
            }
            _ => {}
        }
        Ok(self.ctx.auth.link_account(target).await?)
    }

    pub async fn unlink_account(&self, account: &LinkedAccount) -> Result<(), SessionError> {
        self.require_auth()?;
        Ok(self.ctx.auth.unlink_account(account).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::mock::{Capability, MockCustody};
    use crate::notify::Level;
    use crate::types::WalletOrigin;
    use chain_sol::StaticBlockhash;

    const EVM_ADDR: &str = "0xE3070d3e4309afA3bC9a6b057685743CF42da77C";

    fn open(mock: &Arc<MockCustody>) -> (WalletSession, RegistrySync) {
        let ctx = mock.context(Arc::new(StaticBlockhash::new([3u8; 32])));
        WalletSession::open(ctx, mock.feeds(), SessionConfig::default())
    }

    #[test]
    fn open_loads_existing_wallets() {
        let mock = MockCustody::new();
        mock.add_evm_wallet(EVM_ADDR, WalletOrigin::Custody);
        let (session, _sync) = open(&mock);

        assert_eq!(session.registry().len(), 1);
        assert_eq!(session.selected().unwrap().address, EVM_ADDR);
        assert_eq!(session.registry().generation(), 1);
    }

    #[test]
    fn refresh_if_changed_tracks_feed_updates() {
        let mock = MockCustody::new();
        let (session, mut sync) = open(&mock);
        assert!(session.selected().is_none());
        assert!(!sync.refresh_if_changed());

        let sol = mock.add_solana_wallet(5, WalletOrigin::Custody);
        assert!(sync.refresh_if_changed());
        assert_eq!(session.selected().unwrap().address, sol);
    }

    #[tokio::test]
    async fn run_stops_when_provider_goes_away() {
        let mock = MockCustody::new();
        let (session, sync) = open(&mock);
        drop(session);
        drop(mock);
        sync.run().await;
    }

    #[test]
    fn default_transfer_follows_selected_family() {
        let mock = MockCustody::new();
        mock.add_evm_wallet(EVM_ADDR, WalletOrigin::Custody);
        let sol = mock.add_solana_wallet(5, WalletOrigin::Custody);
        let (session, _sync) = open(&mock);

        assert_eq!(
            session.default_transfer().unwrap(),
            TransferRequest::new(None, 10_000)
        );
        session.select_wallet(&sol).unwrap();
        assert_eq!(
            session.default_transfer().unwrap(),
            TransferRequest::new(None, 1_000_000)
        );
    }

    #[tokio::test]
    async fn default_message_is_signed() {
        let mock = MockCustody::new();
        mock.add_evm_wallet(EVM_ADDR, WalletOrigin::Custody);
        let (session, _sync) = open(&mock);

        let note = session.perform_notified(session.default_message()).await;
        assert_eq!(note.level, Level::Success);
        assert!(note.message.starts_with("EVM message signed: 0x"));
        assert!(note.message.ends_with("..."));
    }

    #[tokio::test]
    async fn switch_selected_network_requires_selection() {
        let mock = MockCustody::new();
        let (session, mut sync) = open(&mock);
        assert_eq!(
            session.switch_selected_network(1).await.unwrap_err(),
            SessionError::NoWalletSelected
        );

        mock.add_evm_wallet(EVM_ADDR, WalletOrigin::Custody);
        sync.refresh();
        let switch = session.switch_selected_network(137).await.unwrap();
        assert_eq!(switch.label, "Polygon");
    }

    #[tokio::test]
    async fn logout_clears_session_state() {
        let mock = MockCustody::new();
        mock.add_evm_wallet(EVM_ADDR, WalletOrigin::Custody);
        let (session, _sync) = open(&mock);

        session.login().await.unwrap();
        assert!(session.is_authenticated());
        session.logout().await.unwrap();

        assert!(!session.is_authenticated());
        assert!(session.registry().is_empty());
        assert!(session.selected().is_none());
    }

    #[tokio::test]
    async fn failed_logout_keeps_state() {
        let mock = MockCustody::new();
        mock.add_evm_wallet(EVM_ADDR, WalletOrigin::Custody);
        mock.set_authenticated(true);
        mock.fail(Capability::Logout, ProviderError::Unavailable);
        let (session, _sync) = open(&mock);

        assert!(session.logout().await.is_err());
        assert_eq!(session.registry().len(), 1);
    }

    #[tokio::test]
    async fn create_wallet_requires_login_and_appears_in_feed() {
        let mock = MockCustody::new();
        let (session, mut sync) = open(&mock);
        assert_eq!(
            session.create_wallet().await.unwrap_err(),
            SessionError::NotAuthenticated
        );

        session.login().await.unwrap();
        let address = session.create_wallet().await.unwrap();
        assert!(sync.refresh_if_changed());
        assert_eq!(session.selected().unwrap().address, address);
    }

    #[tokio::test]
    async fn passkeys_and_links_pass_through() {
        let mock = MockCustody::new();
        let (session, _sync) = open(&mock);
        assert_eq!(
            session.link_passkey().await.unwrap_err(),
            SessionError::NotAuthenticated
        );

        session.login().await.unwrap();
        session.link_passkey().await.unwrap();
        let passkey = session
            .current_user()
            .unwrap()
            .passkeys()
            .next()
            .map(str::to_string)
            .unwrap();

        assert!(matches!(
            session.unlink_passkey("").await,
            Err(SessionError::InvalidRequest(_))
        ));
        session.unlink_passkey(&passkey).await.unwrap();
        assert_eq!(session.current_user().unwrap().passkeys().count(), 0);

        session
            .link_account(LinkTarget::Email("a@example.com".into()))
            .await
            .unwrap();
        let user = session.current_user().unwrap();
        assert_eq!(user.linked_accounts.len(), 1);

        session.unlink_account(&user.linked_accounts[0]).await.unwrap();
        assert!(session.current_user().unwrap().linked_accounts.is_empty());

        assert!(matches!(
            session.link_account(LinkTarget::Phone(" ".into())).await,
            Err(SessionError::InvalidRequest(_))
        ));
    }
}
