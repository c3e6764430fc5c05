//! Checked fixed point helpers
//!
//! All intermediate products are carried in u128.

use solana_program::program_error::ProgramError;

use crate::{
    constants::{BPS_DENOMINATOR, RATIO_PRECISION},
    error::DscError,
};

/// 10^exp as u128
pub fn pow10(exp: u32) -> Result<u128, ProgramError> {
    10u128
        .checked_pow(exp)
        .ok_or_else(|| DscError::MathOverflow.into())
}

/// floor(a * b / c)
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128, ProgramError> {
    if c == 0 {
        return Err(DscError::MathOverflow.into());
    }
    a.checked_mul(b)
        .map(|product| product / c)
        .ok_or_else(|| DscError::MathOverflow.into())
}

/// Scale `value` by 10^shift, flooring when the shift is negative.
pub fn shift_decimals(value: u128, shift: i32) -> Result<u128, ProgramError> {
    if shift >= 0 {
        value
            .checked_mul(pow10(shift as u32)?)
            .ok_or_else(|| DscError::MathOverflow.into())
    } else {
        Ok(value / pow10(shift.unsigned_abs())?)
    }
}

/// value * (1 + bps / 10_000)
pub fn add_bps(value: u128, bps: u16) -> Result<u128, ProgramError> {
    mul_div(
        value,
        BPS_DENOMINATOR as u128 + bps as u128,
        BPS_DENOMINATOR as u128,
    )
}

/// value / debt as a 6 decimal ratio
pub fn ratio(value: u128, debt: u128) -> Result<u128, ProgramError> {
    mul_div(value, RATIO_PRECISION as u128, debt)
}
