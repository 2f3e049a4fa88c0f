//! Supported chains and block explorer links

use otter_types::{Address, TxHash};
use serde::{Deserialize, Serialize};

pub const ANVIL_CHAIN_ID: u64 = 31337;
pub const LISK_SEPOLIA_CHAIN_ID: u64 = 4202;
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    /// Base URL without trailing slash; `None` for local chains
    pub explorer_url: Option<String>,
}

impl Network {
    pub fn anvil() -> Self {
        Self {
            chain_id: ANVIL_CHAIN_ID,
            name: "Anvil (Local)".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            explorer_url: None,
        }
    }

    pub fn lisk_sepolia() -> Self {
        Self {
            chain_id: LISK_SEPOLIA_CHAIN_ID,
            name: "Lisk Sepolia".to_string(),
            rpc_url: "https://rpc.sepolia-api.lisk.com".to_string(),
            explorer_url: Some("https://sepolia-blockscout.lisk.com".to_string()),
        }
    }

    pub fn sepolia() -> Self {
        Self {
            chain_id: SEPOLIA_CHAIN_ID,
            name: "Sepolia".to_string(),
            rpc_url: "https://rpc.sepolia.org".to_string(),
            explorer_url: Some("https://sepolia.etherscan.io".to_string()),
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        match chain_id {
            ANVIL_CHAIN_ID => Some(Self::anvil()),
            LISK_SEPOLIA_CHAIN_ID => Some(Self::lisk_sepolia()),
            SEPOLIA_CHAIN_ID => Some(Self::sepolia()),
            _ => None,
        }
    }

    /// Known chain with its RPC endpoint replaced, or a bare custom chain
    pub fn with_rpc_url(chain_id: u64, rpc_url: &str) -> Self {
        let mut network = Self::from_chain_id(chain_id).unwrap_or_else(|| Self {
            chain_id,
            name: format!("Chain {}", chain_id),
            rpc_url: String::new(),
            explorer_url: None,
        });
        network.rpc_url = rpc_url.to_string();
        network
    }

    /// Explorer page for a transaction, empty without an explorer
    pub fn tx_url(&self, tx_hash: &TxHash) -> String {
        self.link("tx", &tx_hash.to_string())
    }

    /// Explorer page for an address, empty without an explorer
    pub fn address_url(&self, address: &Address) -> String {
        self.link("address", &address.to_string())
    }

    fn link(&self, kind: &str, id: &str) -> String {
        match &self.explorer_url {
            Some(base) if !base.is_empty() => format!("{}/{}/{}", base.trim_end_matches('/'), kind, id),
            _ => String::new(),
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::anvil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explorer_links() {
        let hash = TxHash([0x11; 32]);
        let lisk = Network::lisk_sepolia();
        assert_eq!(
            lisk.tx_url(&hash),
            format!("https://sepolia-blockscout.lisk.com/tx/0x{}", "11".repeat(32))
        );

        let address = Address([0x22; 20]);
        assert_eq!(
            Network::sepolia().address_url(&address),
            format!("https://sepolia.etherscan.io/address/0x{}", "22".repeat(20))
        );

        assert_eq!(Network::anvil().tx_url(&hash), "");
    }

    #[test]
    fn test_custom_chain() {
        let network = Network::with_rpc_url(999, "http://localhost:9545");
        assert_eq!(network.rpc_url, "http://localhost:9545");
        assert_eq!(network.explorer_url, None);
        assert_eq!(Network::with_rpc_url(4202, "http://x").name, "Lisk Sepolia");
    }
}
