/// Fixed-point conversion between settlement-token base units and decimal text
///
/// Raw amounts are `uint256` on chain, so they are carried as `U256` and
/// converted with integer arithmetic only. `format_units` and `parse_units`
/// are exact inverses for every value with at most six fractional digits.

use ethnum::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{OtterError, OtterResult, SETTLEMENT_DECIMALS, SETTLEMENT_SCALE};

fn scale() -> U256 {
    U256::new(SETTLEMENT_SCALE)
}

/// Render base units as a decimal string at the settlement scale
///
/// Trailing fractional zeros are trimmed and zero renders as `"0"`.
pub fn format_units(raw: U256) -> String {
    let whole = raw / scale();
    let (_, frac) = (raw % scale()).into_words();

    if frac == 0 {
        return whole.to_string();
    }

    let digits = format!("{:0width$}", frac, width = SETTLEMENT_DECIMALS as usize);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Parse user-entered decimal text into base units at the settlement scale
///
/// Rejects empty input, signs, more than six fractional digits and values
/// that do not fit in `uint256`. Zero is accepted; see [`parse_amount`].
pub fn parse_units(input: &str) -> OtterResult<U256> {
    let text = input.trim();

    if text.is_empty() {
        return Err(OtterError::invalid_amount(input, "amount is empty"));
    }
    if text.starts_with('-') {
        return Err(OtterError::invalid_amount(input, "amount is negative"));
    }

    let (whole, frac) = match text.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (text, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(OtterError::invalid_amount(input, "no digits"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(OtterError::invalid_amount(input, "not a decimal number"));
    }
    if frac.len() > SETTLEMENT_DECIMALS as usize {
        return Err(OtterError::invalid_amount(
            input,
            &format!("more than {} decimal places", SETTLEMENT_DECIMALS),
        ));
    }

    let overflow = || OtterError::invalid_amount(input, "amount exceeds uint256");

    let whole_units = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).map_err(|_| overflow())?
    };

    let frac_units = if frac.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{:0<width$}", frac, width = SETTLEMENT_DECIMALS as usize);
        U256::from_str_radix(&padded, 10).map_err(|_| overflow())?
    };

    whole_units
        .checked_mul(scale())
        .and_then(|units| units.checked_add(frac_units))
        .ok_or_else(overflow)
}

/// Parse an amount that is about to be submitted: must be strictly positive
pub fn parse_amount(input: &str) -> OtterResult<U256> {
    let raw = parse_units(input)?;
    if raw == U256::ZERO {
        return Err(OtterError::invalid_amount(input, "amount must be greater than zero"));
    }
    Ok(raw)
}

// ============================================================================
// Token Amount
// ============================================================================

/// Raw base-unit amount paired with its exact decimal rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    #[serde(with = "u256_decimal")]
    pub raw: U256,
    pub formatted: String,
}

impl TokenAmount {
    pub fn zero() -> Self {
        Self {
            raw: U256::ZERO,
            formatted: "0".to_string(),
        }
    }

    pub fn from_raw(raw: U256) -> Self {
        Self {
            raw,
            formatted: format_units(raw),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.raw == U256::ZERO
    }
}

impl Default for TokenAmount {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted)
    }
}

impl From<U256> for TokenAmount {
    fn from(raw: U256) -> Self {
        Self::from_raw(raw)
    }
}

/// Serde helper storing a `U256` as a decimal string
pub mod u256_decimal {
    use ethnum::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        U256::from_str_radix(&s, 10).map_err(serde::de::Error::custom)
    }
}
