use serde::Serialize;

use crate::error::EthError;

/// An EVM network a wallet can be switched to.
#[derive(Debug, Clone, Serialize)]
pub struct EvmChain {
    pub chain_id: u64,
    pub name: &'static str,
    pub symbol: &'static str,
    pub explorer_url: &'static str,
    pub is_testnet: bool,
}

pub const ETHEREUM: EvmChain = EvmChain {
    chain_id: 1,
    name: "Ethereum Mainnet",
    symbol: "ETH",
    explorer_url: "https://etherscan.io",
    is_testnet: false,
};

pub const BASE: EvmChain = EvmChain {
    chain_id: 8453,
    name: "Base",
    symbol: "ETH",
    explorer_url: "https://basescan.org",
    is_testnet: false,
};

pub const OPTIMISM: EvmChain = EvmChain {
    chain_id: 10,
    name: "Optimism",
    symbol: "ETH",
    explorer_url: "https://optimistic.etherscan.io",
    is_testnet: false,
};

pub const POLYGON: EvmChain = EvmChain {
    chain_id: 137,
    name: "Polygon",
    symbol: "POL",
    explorer_url: "https://polygonscan.com",
    is_testnet: false,
};

pub const ARBITRUM: EvmChain = EvmChain {
    chain_id: 42161,
    name: "Arbitrum One",
    symbol: "ETH",
    explorer_url: "https://arbiscan.io",
    is_testnet: false,
};

pub const BSC: EvmChain = EvmChain {
    chain_id: 56,
    name: "BNB Smart Chain",
    symbol: "BNB",
    explorer_url: "https://bscscan.com",
    is_testnet: false,
};

pub const UNICHAIN_SEPOLIA: EvmChain = EvmChain {
    chain_id: 1301,
    name: "Unichain Sepolia",
    symbol: "ETH",
    explorer_url: "https://sepolia.uniscan.xyz",
    is_testnet: true,
};

pub const BASE_SEPOLIA: EvmChain = EvmChain {
    chain_id: 84532,
    name: "Base Sepolia",
    symbol: "ETH",
    explorer_url: "https://sepolia.basescan.org",
    is_testnet: true,
};

pub const SEPOLIA: EvmChain = EvmChain {
    chain_id: 11155111,
    name: "Sepolia",
    symbol: "ETH",
    explorer_url: "https://sepolia.etherscan.io",
    is_testnet: true,
};

pub const POLYGON_AMOY: EvmChain = EvmChain {
    chain_id: 80002,
    name: "Polygon Amoy",
    symbol: "POL",
    explorer_url: "https://amoy.polygonscan.com",
    is_testnet: true,
};

/// Networks offered for switching, in menu order.
const ALL_CHAINS: &[&EvmChain] = &[
    &ETHEREUM,
    &BASE,
    &OPTIMISM,
    &POLYGON,
    &ARBITRUM,
    &BSC,
    &UNICHAIN_SEPOLIA,
    &BASE_SEPOLIA,
    &SEPOLIA,
    &POLYGON_AMOY,
];

/// Returns the chain definition for a given chain ID, or `None` if unknown.
pub fn get_chain(chain_id: u64) -> Option<&'static EvmChain> {
    ALL_CHAINS
        .iter()
        .find(|c| c.chain_id == chain_id)
        .copied()
}

/// Like [`get_chain`], but unknown IDs are an error.
pub fn require_chain(chain_id: u64) -> Result<&'static EvmChain, EthError> {
    get_chain(chain_id).ok_or(EthError::UnsupportedChain(chain_id))
}

/// Human-readable name, falling back to the bare ID for unknown chains.
pub fn chain_label(chain_id: u64) -> String {
    match get_chain(chain_id) {
        Some(chain) => chain.name.to_string(),
        None => format!("chain {chain_id}"),
    }
}

/// All switchable EVM networks.
pub fn supported_chains() -> Vec<&'static EvmChain> {
    ALL_CHAINS.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_networks_are_present() {
        for id in [1, 8453, 10, 137, 42161, 56, 1301, 84532] {
            assert!(get_chain(id).is_some(), "chain {id} should be switchable");
        }
    }

    #[test]
    fn get_base_sepolia() {
        let chain = get_chain(84532).expect("Base Sepolia should be supported");
        assert_eq!(chain.name, "Base Sepolia");
        assert!(chain.is_testnet);
    }

    #[test]
    fn get_bsc() {
        let chain = get_chain(56).expect("BSC should be supported");
        assert_eq!(chain.symbol, "BNB");
        assert!(!chain.is_testnet);
    }

    #[test]
    fn unknown_chain_returns_none() {
        assert!(get_chain(999999).is_none());
        assert!(matches!(require_chain(999999), Err(EthError::UnsupportedChain(999999))));
    }

    #[test]
    fn chain_label_falls_back_to_id() {
        assert_eq!(chain_label(10), "Optimism");
        assert_eq!(chain_label(31337), "chain 31337");
    }

    #[test]
    fn chain_ids_are_unique() {
        let chains = supported_chains();
        for (i, a) in chains.iter().enumerate() {
            for b in &chains[i + 1..] {
                assert_ne!(a.chain_id, b.chain_id, "{} and {} collide", a.name, b.name);
            }
        }
    }

    #[test]
    fn all_chains_have_explorer_url() {
        for chain in supported_chains() {
            assert!(
                chain.explorer_url.starts_with("https://"),
                "{} explorer_url should start with https://",
                chain.name
            );
        }
    }
}
