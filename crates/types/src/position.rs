/// Per-account vault position

use serde::{Deserialize, Serialize};

use crate::TokenAmount;

/// Share balance, unharvested rewards and vault size for one account
///
/// Every field is always populated; a vault that does not exist or a missing
/// wallet yields zeros rather than absent values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultPosition {
    pub shares: TokenAmount,
    pub pending_rewards: TokenAmount,
    pub total_assets: TokenAmount,
}

impl VaultPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn has_shares(&self) -> bool {
        !self.shares.is_zero()
    }

    pub fn has_rewards(&self) -> bool {
        !self.pending_rewards.is_zero()
    }
}
