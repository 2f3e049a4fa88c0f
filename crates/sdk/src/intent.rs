//! Mutating contract calls
//!
//! A [`ContractCall`] is a fully validated intent: every constructor that
//! takes user text converts it to base units first and refuses garbage, so
//! nothing invalid ever reaches the wallet.

use std::fmt;

use otter_types::{
    format_units, parse_amount, Address, Console, OtterError, OtterResult, TransactionKind, U256,
    MAX_SENIOR_SPLIT_BPS, SETTLEMENT_SYMBOL,
};

use crate::abi::{encode_call, selectors, Token};
use crate::cache::Scope;
use crate::contracts::ContractAddresses;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    /// Faucet mint of the settlement token
    Mint { to: Address, amount: U256 },
    Approve { spender: Address, amount: U256 },
    Deposit { vault: Address, amount: U256 },
    Withdraw { vault: Address, shares: U256 },
    Harvest { vault: Address },
    ProposePool {
        metadata_cid: String,
        epoch_seconds: u64,
        start_time: u64,
        senior_split_bps: u16,
    },
    ActivatePool { pool_id: u64 },
    RejectPool { pool_id: u64 },
    PostRevenue { pool_id: u64, epoch: u64, amount: U256 },
    DepositRevenue { pool_id: u64, epoch: u64, amount: U256 },
    Distribute { pool_id: u64, epoch: u64 },
}

fn require_address(parameter: &str, address: Address) -> OtterResult<Address> {
    if address.is_zero() {
        return Err(OtterError::invalid_parameter(parameter, &address.to_string(), "non-zero address"));
    }
    Ok(address)
}

fn require_pool_id(pool_id: u64) -> OtterResult<u64> {
    if pool_id == 0 {
        return Err(OtterError::invalid_parameter("pool_id", "0", "1-based pool id"));
    }
    Ok(pool_id)
}

impl ContractCall {
    pub fn mint(to: Address, amount: &str) -> OtterResult<Self> {
        Ok(ContractCall::Mint {
            to: require_address("to", to)?,
            amount: parse_amount(amount)?,
        })
    }

    pub fn approve(spender: Address, amount: &str) -> OtterResult<Self> {
        Ok(ContractCall::Approve {
            spender: require_address("spender", spender)?,
            amount: parse_amount(amount)?,
        })
    }

    pub fn deposit(vault: Address, amount: &str) -> OtterResult<Self> {
        Ok(ContractCall::Deposit {
            vault: require_address("vault", vault)?,
            amount: parse_amount(amount)?,
        })
    }

    pub fn withdraw(vault: Address, shares: &str) -> OtterResult<Self> {
        Ok(ContractCall::Withdraw {
            vault: require_address("vault", vault)?,
            shares: parse_amount(shares)?,
        })
    }

    pub fn harvest(vault: Address) -> OtterResult<Self> {
        Ok(ContractCall::Harvest {
            vault: require_address("vault", vault)?,
        })
    }

    pub fn propose_pool(
        metadata_cid: &str,
        epoch_seconds: u64,
        start_time: u64,
        senior_split_bps: u16,
    ) -> OtterResult<Self> {
        let metadata_cid = metadata_cid.trim();
        if metadata_cid.is_empty() {
            return Err(OtterError::invalid_parameter("metadata_cid", "", "non-empty content identifier"));
        }
        if epoch_seconds == 0 {
            return Err(OtterError::invalid_parameter("epoch_seconds", "0", "positive epoch length"));
        }
        if senior_split_bps > MAX_SENIOR_SPLIT_BPS {
            return Err(OtterError::invalid_parameter(
                "senior_split_bps",
                &senior_split_bps.to_string(),
                "0..=10000",
            ));
        }
        Ok(ContractCall::ProposePool {
            metadata_cid: metadata_cid.to_string(),
            epoch_seconds,
            start_time,
            senior_split_bps,
        })
    }

    pub fn activate_pool(pool_id: u64) -> OtterResult<Self> {
        Ok(ContractCall::ActivatePool { pool_id: require_pool_id(pool_id)? })
    }

    pub fn reject_pool(pool_id: u64) -> OtterResult<Self> {
        Ok(ContractCall::RejectPool { pool_id: require_pool_id(pool_id)? })
    }

    pub fn post_revenue(pool_id: u64, epoch: u64, amount: &str) -> OtterResult<Self> {
        Ok(ContractCall::PostRevenue {
            pool_id: require_pool_id(pool_id)?,
            epoch,
            amount: parse_amount(amount)?,
        })
    }

    pub fn deposit_revenue(pool_id: u64, epoch: u64, amount: &str) -> OtterResult<Self> {
        Ok(ContractCall::DepositRevenue {
            pool_id: require_pool_id(pool_id)?,
            epoch,
            amount: parse_amount(amount)?,
        })
    }

    pub fn distribute(pool_id: u64, epoch: u64) -> OtterResult<Self> {
        Ok(ContractCall::Distribute {
            pool_id: require_pool_id(pool_id)?,
            epoch,
        })
    }

    /// Contract the call is sent to
    pub fn target(&self, contracts: &ContractAddresses) -> Address {
        match self {
            ContractCall::Mint { .. } | ContractCall::Approve { .. } => contracts.settlement_token,
            ContractCall::Deposit { vault, .. }
            | ContractCall::Withdraw { vault, .. }
            | ContractCall::Harvest { vault } => *vault,
            ContractCall::ProposePool { .. }
            | ContractCall::ActivatePool { .. }
            | ContractCall::RejectPool { .. } => contracts.asset_registry,
            ContractCall::PostRevenue { .. } => contracts.revenue_oracle,
            ContractCall::DepositRevenue { .. } => contracts.revenue_escrow,
            ContractCall::Distribute { .. } => contracts.yield_distributor,
        }
    }

    /// ABI-encoded calldata
    pub fn calldata(&self) -> Vec<u8> {
        match self {
            ContractCall::Mint { to, amount } => {
                encode_call(selectors::MINT, &[Token::Address(*to), Token::Uint(*amount)])
            }
            ContractCall::Approve { spender, amount } => {
                encode_call(selectors::APPROVE, &[Token::Address(*spender), Token::Uint(*amount)])
            }
            ContractCall::Deposit { amount, .. } => encode_call(selectors::DEPOSIT, &[Token::Uint(*amount)]),
            ContractCall::Withdraw { shares, .. } => encode_call(selectors::WITHDRAW, &[Token::Uint(*shares)]),
            ContractCall::Harvest { .. } => encode_call(selectors::HARVEST, &[]),
            ContractCall::ProposePool {
                metadata_cid,
                epoch_seconds,
                start_time,
                senior_split_bps,
            } => encode_call(
                selectors::PROPOSE_POOL,
                &[
                    Token::String(metadata_cid.clone()),
                    Token::uint(*epoch_seconds),
                    Token::uint(*start_time),
                    Token::uint(*senior_split_bps as u64),
                ],
            ),
            ContractCall::ActivatePool { pool_id } => {
                encode_call(selectors::ACTIVATE_POOL, &[Token::uint(*pool_id)])
            }
            ContractCall::RejectPool { pool_id } => encode_call(selectors::REJECT_POOL, &[Token::uint(*pool_id)]),
            ContractCall::PostRevenue { pool_id, epoch, amount } => encode_call(
                selectors::POST_REVENUE,
                &[Token::uint(*pool_id), Token::uint(*epoch), Token::Uint(*amount)],
            ),
            ContractCall::DepositRevenue { pool_id, epoch, amount } => encode_call(
                selectors::DEPOSIT_REVENUE,
                &[Token::uint(*pool_id), Token::uint(*epoch), Token::Uint(*amount)],
            ),
            ContractCall::Distribute { pool_id, epoch } => {
                encode_call(selectors::DISTRIBUTE, &[Token::uint(*pool_id), Token::uint(*epoch)])
            }
        }
    }

    /// Cached reads that may be stale once this call is mined
    pub fn invalidates(&self) -> Vec<Scope> {
        match self {
            ContractCall::Mint { .. } => vec![Scope::TokenBalances],
            ContractCall::Approve { .. } => vec![Scope::Allowances],
            ContractCall::Deposit { vault, .. } => {
                vec![Scope::Vault(*vault), Scope::TokenBalances, Scope::Allowances]
            }
            ContractCall::Withdraw { vault, .. } | ContractCall::Harvest { vault } => {
                vec![Scope::Vault(*vault), Scope::TokenBalances]
            }
            ContractCall::ProposePool { .. }
            | ContractCall::ActivatePool { .. }
            | ContractCall::RejectPool { .. } => vec![Scope::Pools],
            ContractCall::PostRevenue { .. } => vec![Scope::Revenue],
            ContractCall::DepositRevenue { .. } => {
                vec![Scope::Escrow, Scope::TokenBalances, Scope::Allowances]
            }
            ContractCall::Distribute { .. } => {
                vec![Scope::Distribution, Scope::Escrow, Scope::AllVaults]
            }
        }
    }

    /// Kind written to the local history, for the calls that are logged
    pub fn record_kind(&self) -> Option<TransactionKind> {
        match self {
            ContractCall::Mint { .. } => Some(TransactionKind::Mint),
            ContractCall::Approve { .. } => Some(TransactionKind::Approve),
            ContractCall::Deposit { .. } => Some(TransactionKind::Deposit),
            ContractCall::Withdraw { .. } => Some(TransactionKind::Withdraw),
            ContractCall::Harvest { .. } => Some(TransactionKind::Harvest),
            _ => None,
        }
    }

    /// Console whose role gate the caller must pass, if any
    pub fn console(&self) -> Option<Console> {
        match self {
            ContractCall::ProposePool { .. } => Some(Console::Issuer),
            ContractCall::ActivatePool { .. }
            | ContractCall::RejectPool { .. }
            | ContractCall::PostRevenue { .. }
            | ContractCall::DepositRevenue { .. }
            | ContractCall::Distribute { .. } => Some(Console::Verifier),
            _ => None,
        }
    }

    /// Amount as shown to the user, `"0"` for calls without one
    pub fn display_amount(&self) -> String {
        match self {
            ContractCall::Mint { amount, .. }
            | ContractCall::Approve { amount, .. }
            | ContractCall::Deposit { amount, .. }
            | ContractCall::PostRevenue { amount, .. }
            | ContractCall::DepositRevenue { amount, .. } => format_units(*amount),
            ContractCall::Withdraw { shares, .. } => format_units(*shares),
            _ => "0".to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContractCall::Mint { .. } => "mint",
            ContractCall::Approve { .. } => "approve",
            ContractCall::Deposit { .. } => "deposit",
            ContractCall::Withdraw { .. } => "withdraw",
            ContractCall::Harvest { .. } => "harvest",
            ContractCall::ProposePool { .. } => "proposePool",
            ContractCall::ActivatePool { .. } => "activatePool",
            ContractCall::RejectPool { .. } => "rejectPool",
            ContractCall::PostRevenue { .. } => "postRevenue",
            ContractCall::DepositRevenue { .. } => "depositRevenue",
            ContractCall::Distribute { .. } => "distribute",
        }
    }

    /// Notice title once the call is confirmed
    pub fn success_title(&self) -> String {
        match self {
            ContractCall::Mint { .. } => format!("{} minted!", SETTLEMENT_SYMBOL),
            ContractCall::Approve { .. } => "Approved!".to_string(),
            ContractCall::Deposit { amount, .. } => {
                format!("Deposited {} {}!", format_units(*amount), SETTLEMENT_SYMBOL)
            }
            ContractCall::Withdraw { .. } => "Withdrawal successful!".to_string(),
            ContractCall::Harvest { .. } => "Rewards claimed!".to_string(),
            ContractCall::ProposePool { .. } => "Pool proposed".to_string(),
            ContractCall::ActivatePool { pool_id } => format!("Pool #{} activated", pool_id),
            ContractCall::RejectPool { pool_id } => format!("Pool #{} rejected", pool_id),
            ContractCall::PostRevenue { pool_id, epoch, amount } => format!(
                "Posted {} {} for Pool #{}, Epoch {}",
                format_units(*amount),
                SETTLEMENT_SYMBOL,
                pool_id,
                epoch
            ),
            ContractCall::DepositRevenue { amount, .. } => {
                format!("Deposited {} {} to escrow", format_units(*amount), SETTLEMENT_SYMBOL)
            }
            ContractCall::Distribute { pool_id, epoch } => {
                format!("Distributed yield for Pool #{}, Epoch {}", pool_id, epoch)
            }
        }
    }

    /// Notice title when submission or execution fails
    pub fn failure_title(&self) -> &'static str {
        match self {
            ContractCall::Mint { .. } => "Mint failed",
            ContractCall::Approve { .. } => "Approval failed",
            ContractCall::Deposit { .. } => "Deposit failed",
            ContractCall::Withdraw { .. } => "Withdrawal failed",
            ContractCall::Harvest { .. } => "Harvest failed",
            _ => "Transaction failed",
        }
    }
}

impl fmt::Display for ContractCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractCall::Mint { to, amount } => write!(f, "mint({}, {})", to, amount),
            ContractCall::Approve { spender, amount } => write!(f, "approve({}, {})", spender, amount),
            ContractCall::Deposit { vault, amount } => write!(f, "{}.deposit({})", vault, amount),
            ContractCall::Withdraw { vault, shares } => write!(f, "{}.withdraw({})", vault, shares),
            ContractCall::Harvest { vault } => write!(f, "{}.harvest()", vault),
            ContractCall::ProposePool { metadata_cid, epoch_seconds, start_time, senior_split_bps } => write!(
                f,
                "proposePool({}, {}, {}, {})",
                metadata_cid, epoch_seconds, start_time, senior_split_bps
            ),
            ContractCall::ActivatePool { pool_id } => write!(f, "activatePool({})", pool_id),
            ContractCall::RejectPool { pool_id } => write!(f, "rejectPool({})", pool_id),
            ContractCall::PostRevenue { pool_id, epoch, amount } => {
                write!(f, "postRevenue({}, {}, {})", pool_id, epoch, amount)
            }
            ContractCall::DepositRevenue { pool_id, epoch, amount } => {
                write!(f, "depositRevenue({}, {}, {})", pool_id, epoch, amount)
            }
            ContractCall::Distribute { pool_id, epoch } => write!(f, "distribute({}, {})", pool_id, epoch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> Address {
        Address([0x42; 20])
    }

    #[test]
    fn test_amount_conversion() {
        let call = ContractCall::deposit(vault(), "1000").unwrap();
        assert_eq!(
            call,
            ContractCall::Deposit { vault: vault(), amount: U256::new(1_000_000_000) }
        );
        assert_eq!(call.display_amount(), "1000");
    }

    #[test]
    fn test_rejects_garbage_before_submission() {
        for input in ["", "   ", "abc", "-5", "0", "0.0", "1.2345678", "1e6"] {
            assert!(ContractCall::deposit(vault(), input).is_err(), "accepted {:?}", input);
        }
        assert!(ContractCall::deposit(Address::ZERO, "1").is_err());
        assert!(ContractCall::harvest(Address::ZERO).is_err());
        assert!(ContractCall::activate_pool(0).is_err());
        assert!(ContractCall::distribute(0, 1).is_err());
        assert!(ContractCall::propose_pool("", 86_400, 0, 7000).is_err());
        assert!(ContractCall::propose_pool("Qm", 0, 0, 7000).is_err());
        assert!(ContractCall::propose_pool("Qm", 86_400, 0, 10_001).is_err());
    }

    #[test]
    fn test_targets() {
        let contracts = ContractAddresses::local();
        let mint = ContractCall::mint(Address([1; 20]), "5").unwrap();
        assert_eq!(mint.target(&contracts), contracts.settlement_token);
        assert_eq!(ContractCall::harvest(vault()).unwrap().target(&contracts), vault());
        assert_eq!(
            ContractCall::post_revenue(1, 0, "10").unwrap().target(&contracts),
            contracts.revenue_oracle
        );
        assert_eq!(
            ContractCall::deposit_revenue(1, 0, "10").unwrap().target(&contracts),
            contracts.revenue_escrow
        );
        assert_eq!(
            ContractCall::distribute(1, 0).unwrap().target(&contracts),
            contracts.yield_distributor
        );
        assert_eq!(ContractCall::reject_pool(2).unwrap().target(&contracts), contracts.asset_registry);
    }

    #[test]
    fn test_calldata_selectors() {
        let harvest = ContractCall::harvest(vault()).unwrap().calldata();
        assert_eq!(harvest, selectors::HARVEST.to_vec());

        let distribute = ContractCall::distribute(3, 2).unwrap().calldata();
        assert_eq!(&distribute[..4], &selectors::DISTRIBUTE);
        assert_eq!(distribute.len(), 4 + 64);
        assert_eq!(distribute[4 + 31], 3);
        assert_eq!(distribute[4 + 63], 2);
    }

    #[test]
    fn test_record_kinds() {
        assert_eq!(
            ContractCall::withdraw(vault(), "1").unwrap().record_kind(),
            Some(TransactionKind::Withdraw)
        );
        assert_eq!(ContractCall::activate_pool(1).unwrap().record_kind(), None);
    }

    #[test]
    fn test_console_gates() {
        assert_eq!(ContractCall::propose_pool("Qm", 60, 0, 5000).unwrap().console(), Some(Console::Issuer));
        assert_eq!(ContractCall::distribute(1, 1).unwrap().console(), Some(Console::Verifier));
        assert_eq!(ContractCall::mint(vault(), "1").unwrap().console(), None);
    }

    #[test]
    fn test_deposit_invalidates_position_and_balance() {
        let scopes = ContractCall::deposit(vault(), "1").unwrap().invalidates();
        assert!(scopes.contains(&Scope::Vault(vault())));
        assert!(scopes.contains(&Scope::TokenBalances));
    }
}
