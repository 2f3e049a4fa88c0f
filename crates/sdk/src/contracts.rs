//! Fixed protocol contract addresses

use hex_literal::hex;
use otter_types::{Address, OtterError, OtterResult};
use serde::{Deserialize, Serialize};

/// Addresses of the six singleton contracts; vaults are discovered per pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractAddresses {
    pub settlement_token: Address,
    pub access_manager: Address,
    pub asset_registry: Address,
    pub revenue_oracle: Address,
    pub revenue_escrow: Address,
    pub yield_distributor: Address,
}

impl ContractAddresses {
    /// Deterministic deployment on a fresh Anvil node
    pub fn local() -> Self {
        Self {
            settlement_token: Address(hex!("5fbdb2315678afecb367f032d93f642f64180aa3")),
            access_manager: Address(hex!("e7f1725e7734ce288f8367e1bb143e90bb3f0512")),
            asset_registry: Address(hex!("9fe46736679d2d9a65f0992f2272de9f3c7fa6e0")),
            revenue_oracle: Address(hex!("cf7ed3acca5a467e9e704c703e8d87f634fb0fc9")),
            revenue_escrow: Address(hex!("dc64a140aa3e981100a9beca4e685f962f0cf6c9")),
            yield_distributor: Address(hex!("5fc8d32690cc91d4c39d9d3abcbd16989f875707")),
        }
    }

    pub fn entries(&self) -> [(&'static str, Address); 6] {
        [
            ("settlement_token", self.settlement_token),
            ("access_manager", self.access_manager),
            ("asset_registry", self.asset_registry),
            ("revenue_oracle", self.revenue_oracle),
            ("revenue_escrow", self.revenue_escrow),
            ("yield_distributor", self.yield_distributor),
        ]
    }

    /// Every address must be set and distinct
    pub fn validate(&self) -> OtterResult<()> {
        let entries = self.entries();
        for (i, (name, address)) in entries.iter().enumerate() {
            if address.is_zero() {
                return Err(OtterError::invalid_configuration("contracts", &format!("{} is the zero address", name)));
            }
            if let Some((other, _)) = entries[..i].iter().find(|(_, a)| a == address) {
                return Err(OtterError::invalid_configuration(
                    "contracts",
                    &format!("{} and {} share address {}", other, name, address),
                ));
            }
        }
        Ok(())
    }
}

impl Default for ContractAddresses {
    fn default() -> Self {
        Self::local()
    }
}
