/// Protocol constants used across the Otter Flow client

// ============================================================================
// Settlement Token Constants
// ============================================================================

/// Decimal places of the settlement token (mUSDC)
pub const SETTLEMENT_DECIMALS: u32 = 6;

/// Base units per whole settlement token: 10^6
pub const SETTLEMENT_SCALE: u128 = 1_000_000;

/// Display symbol of the settlement token
pub const SETTLEMENT_SYMBOL: &str = "mUSDC";

// ============================================================================
// Tranche Constants
// ============================================================================

/// Basis points denominator (10,000 = 100%)
pub const BPS_DENOMINATOR: u16 = 10_000;

/// Maximum senior split in basis points (100%)
pub const MAX_SENIOR_SPLIT_BPS: u16 = 10_000;

/// Prefix of the display name derived for every pool
pub const POOL_NAME_PREFIX: &str = "Otter Pool #";

// ============================================================================
// Registry Status Codes
// ============================================================================

pub const POOL_STATUS_PENDING: u8 = 0;
pub const POOL_STATUS_ACTIVE: u8 = 1;
pub const POOL_STATUS_REJECTED: u8 = 2;
pub const POOL_STATUS_CLOSED: u8 = 3;

// ============================================================================
// Access Control Role Identifiers
// ============================================================================

/// `DEFAULT_ADMIN_ROLE` of the access manager
pub const ADMIN_ROLE: [u8; 32] = [0u8; 32];

/// Verifier role identifier (`bytes32(uint256(1))`)
pub const VERIFIER_ROLE: [u8; 32] = {
    let mut id = [0u8; 32];
    id[31] = 1;
    id
};

/// Issuer role identifier (`bytes32(uint256(2))`)
pub const ISSUER_ROLE: [u8; 32] = {
    let mut id = [0u8; 32];
    id[31] = 2;
    id
};

// ============================================================================
// Client-side Limits
// ============================================================================

/// Number of records retained by the local transaction log
pub const MAX_TRANSACTION_RECORDS: usize = 50;

/// Maximum length of an error description shown to the user
pub const MAX_NOTICE_DESCRIPTION_LEN: usize = 80;

// ============================================================================
// Calculator Defaults
// ============================================================================

/// Advertised senior tranche APY (percent)
pub const DEFAULT_SENIOR_APY: f64 = 7.0;

/// Advertised junior tranche APY (percent)
pub const DEFAULT_JUNIOR_APY: f64 = 20.0;

/// Shortest projection horizon in months
pub const MIN_PROJECTION_MONTHS: u32 = 1;

/// Longest projection horizon in months
pub const MAX_PROJECTION_MONTHS: u32 = 36;

/// Days per month used for daily earnings estimates
pub const DAYS_PER_MONTH: u32 = 30;
