use std::sync::Arc;

use chain_eth::chains::{chain_label, get_chain, EvmChain};
use tracing::{info, warn};

use crate::error::SessionError;
use crate::provider::EvmCustody;
use crate::types::{ChainFamily, WalletRecord};

/// A completed chain switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSwitch {
    pub address: String,
    pub chain_id: u64,
    /// Catalogue name, or `chain <id>` for networks we do not list.
    pub label: String,
}

/// Asks the provider to move an EVM wallet to another chain.
///
/// The active chain is owned by the provider; nothing is recorded here.
pub struct NetworkSwitchController {
    evm: Arc<dyn EvmCustody>,
}

impl NetworkSwitchController {
    pub fn new(evm: Arc<dyn EvmCustody>) -> Self {
        Self { evm }
    }

    /// Networks offered in the switch menu.
    pub fn catalogue(&self) -> Vec<&'static EvmChain> {
        chain_eth::chains::supported_chains()
    }

    pub async fn switch_network(
        &self,
        wallet: &WalletRecord,
        chain_id: u64,
    ) -> Result<NetworkSwitch, SessionError> {
        if wallet.chain_family != ChainFamily::Ethereum {
            return Err(SessionError::UnsupportedChainFamily {
                action: "switch network",
                family: wallet.chain_family,
            });
        }
        if get_chain(chain_id).is_none() {
            warn!(chain_id, "switching to a network outside the catalogue");
        }

        self.evm
            .switch_chain(&wallet.address, chain_id)
            .await
            .map_err(SessionError::SwitchFailed)?;

        info!(address = %wallet.address, chain_id, "network switched");
        Ok(NetworkSwitch {
            address: wallet.address.clone(),
            chain_id,
            label: chain_label(chain_id),
        })
    }
}
