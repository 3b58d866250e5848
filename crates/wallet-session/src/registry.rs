//! Normalization of provider wallet lists and the unified registry.
//!
//! The registry is an immutable snapshot: EVM records first, then Solana
//! records, each in provider order. It is rebuilt wholesale whenever either
//! provider list changes and never patched in place.

use std::sync::Arc;

use crate::types::{
    ChainFamily, EvmWalletHandle, SolanaWalletHandle, WalletHandle, WalletId, WalletRecord,
};

pub fn normalize(handle: &WalletHandle) -> WalletRecord {
    match handle {
        WalletHandle::Evm(h) => WalletRecord {
            address: h.address.clone(),
            chain_family: ChainFamily::Ethereum,
            origin: h.origin.clone(),
        },
        WalletHandle::Solana(h) => WalletRecord {
            address: h.address.clone(),
            chain_family: ChainFamily::Solana,
            origin: h.origin.clone(),
        },
    }
}

pub fn normalize_evm(handles: &[EvmWalletHandle]) -> Vec<WalletRecord> {
    handles
        .iter()
        .map(|h| normalize(&WalletHandle::Evm(h.clone())))
        .collect()
}

pub fn normalize_solana(handles: &[SolanaWalletHandle]) -> Vec<WalletRecord> {
    handles
        .iter()
        .map(|h| normalize(&WalletHandle::Solana(h.clone())))
        .collect()
}

/// Ordered snapshot of every wallet the provider currently reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedRegistry {
    records: Arc<[WalletRecord]>,
    generation: u64,
}

impl UnifiedRegistry {
    /// Concatenate EVM records then Solana records. Duplicates are not
    /// removed; provider lists are trusted to be unique.
    pub fn recompute(evm: Vec<WalletRecord>, solana: Vec<WalletRecord>) -> Self {
        let mut records = evm;
        records.extend(solana);
        Self {
            records: records.into(),
            generation: 0,
        }
    }

    /// The same snapshot, stamped with the recomputation count that produced it.
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn records(&self) -> &[WalletRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &WalletRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&WalletRecord> {
        self.records.first()
    }

    pub fn find_by_address(&self, address: &str) -> Option<&WalletRecord> {
        self.records.iter().find(|r| r.address == address)
    }

    pub fn get(&self, id: &WalletId) -> Option<&WalletRecord> {
        self.records.iter().find(|r| r.matches(id))
    }

    pub fn contains(&self, id: &WalletId) -> bool {
        self.get(id).is_some()
    }

    /// First custody-backed wallet of `family`, in registry order.
    pub fn first_custody(&self, family: ChainFamily) -> Option<&WalletRecord> {
        self.records
            .iter()
            .find(|r| r.chain_family == family && r.is_custody())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WalletOrigin;

    fn evm(address: &str) -> EvmWalletHandle {
        EvmWalletHandle {
            address: address.into(),
            origin: WalletOrigin::Custody,
        }
    }

    fn sol(address: &str, origin: WalletOrigin) -> SolanaWalletHandle {
        SolanaWalletHandle {
            address: address.into(),
            origin,
        }
    }

    #[test]
    fn empty_inputs_give_empty_registry() {
        assert!(normalize_evm(&[]).is_empty());
        assert!(normalize_solana(&[]).is_empty());
        assert!(UnifiedRegistry::recompute(vec![], vec![]).is_empty());
    }

    #[test]
    fn normalizer_tags_family() {
        let records = normalize_solana(&[sol("Sol1", WalletOrigin::external("phantom"))]);
        assert_eq!(records[0].chain_family, ChainFamily::Solana);
        assert_eq!(records[0].origin, WalletOrigin::external("phantom"));

        let records = normalize_evm(&[evm("0xA")]);
        assert_eq!(records[0].chain_family, ChainFamily::Ethereum);
    }

    #[test]
    fn registry_is_evm_first_in_provider_order() {
        let e = [evm("0xA"), evm("0xB")];
        let s = [
            sol("Sol1", WalletOrigin::Custody),
            sol("Sol2", WalletOrigin::Custody),
            sol("Sol3", WalletOrigin::Custody),
        ];
        let registry = UnifiedRegistry::recompute(normalize_evm(&e), normalize_solana(&s));

        assert_eq!(registry.len(), e.len() + s.len());
        let addresses: Vec<&str> = registry.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(addresses, ["0xA", "0xB", "Sol1", "Sol2", "Sol3"]);
        assert_eq!(&registry.records()[..2], normalize_evm(&e).as_slice());
        assert_eq!(&registry.records()[2..], normalize_solana(&s).as_slice());
    }

    #[test]
    fn duplicates_are_kept() {
        let registry =
            UnifiedRegistry::recompute(normalize_evm(&[evm("0xA"), evm("0xA")]), vec![]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn lookups() {
        let registry = UnifiedRegistry::recompute(
            normalize_evm(&[evm("0xA")]),
            normalize_solana(&[
                sol("Ext", WalletOrigin::external("phantom")),
                sol("Sol1", WalletOrigin::Custody),
            ]),
        );

        assert_eq!(registry.first().unwrap().address, "0xA");
        assert_eq!(
            registry.find_by_address("Sol1").unwrap().chain_family,
            ChainFamily::Solana
        );
        assert!(registry.find_by_address("missing").is_none());
        assert_eq!(
            registry.first_custody(ChainFamily::Solana).unwrap().address,
            "Sol1"
        );
        assert!(registry.contains(&WalletId {
            address: "0xA".into(),
            chain_family: ChainFamily::Ethereum,
        }));
    }

    #[test]
    fn generation_stamp() {
        let registry = UnifiedRegistry::recompute(vec![], vec![]).with_generation(7);
        assert_eq!(registry.generation(), 7);
    }
}
