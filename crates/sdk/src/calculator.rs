//! Display-only earnings projection
//!
//! Uses floating point on purpose: the output is an estimate for a person to
//! read, never an amount that is submitted.

use otter_types::{
    OtterError, OtterResult, Tranche, DAYS_PER_MONTH, DEFAULT_JUNIOR_APY, DEFAULT_SENIOR_APY, MAX_PROJECTION_MONTHS,
    MIN_PROJECTION_MONTHS,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Projection {
    pub deposit: f64,
    pub apy_percent: f64,
    pub months: u32,
    pub final_amount: f64,
    pub total_earnings: f64,
    pub monthly_earnings: f64,
    pub daily_earnings: f64,
}

/// Advertised APY used when none is given
pub fn default_apy(tranche: Tranche) -> f64 {
    match tranche {
        Tranche::Senior => DEFAULT_SENIOR_APY,
        Tranche::Junior => DEFAULT_JUNIOR_APY,
    }
}

/// Monthly-compounded projection of `deposit` at `apy_percent` over `months`
pub fn project(deposit: f64, apy_percent: f64, months: u32) -> OtterResult<Projection> {
    if !deposit.is_finite() || deposit < 0.0 {
        return Err(OtterError::invalid_parameter("deposit", &deposit.to_string(), "non-negative amount"));
    }
    if !apy_percent.is_finite() || apy_percent < 0.0 {
        return Err(OtterError::invalid_parameter("apy", &apy_percent.to_string(), "non-negative percentage"));
    }
    if !(MIN_PROJECTION_MONTHS..=MAX_PROJECTION_MONTHS).contains(&months) {
        return Err(OtterError::invalid_parameter(
            "months",
            &months.to_string(),
            &format!("{}..={}", MIN_PROJECTION_MONTHS, MAX_PROJECTION_MONTHS),
        ));
    }

    let monthly_rate = apy_percent / 100.0 / 12.0;
    let final_amount = deposit * (1.0 + monthly_rate).powi(months as i32);
    let total_earnings = final_amount - deposit;

    Ok(Projection {
        deposit,
        apy_percent,
        months,
        final_amount,
        total_earnings,
        monthly_earnings: total_earnings / months as f64,
        daily_earnings: total_earnings / (months * DAYS_PER_MONTH) as f64,
    })
}
