//! Valuation & health engine
//!
//! Collateral value is expressed in synthetic token base units: one whole
//! synthetic token is pegged at $1 and debt is never re-priced.

use solana_program::{
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{
    error::DscError,
    math::{ratio, shift_decimals},
    oracle::{OracleAdapter, PriceSource},
    state::{Position, SystemConfig},
};

/// Collateral value / debt, fixed point 6 decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthRatio {
    Finite(u128),
    /// No debt outstanding
    Infinite,
}

impl HealthRatio {
    pub fn from_value(collateral_value: u128, debt: u64) -> Result<Self, ProgramError> {
        if debt == 0 {
            return Ok(HealthRatio::Infinite);
        }
        Ok(HealthRatio::Finite(ratio(collateral_value, debt as u128)?))
    }

    pub fn is_below(&self, min_health_ratio: u64) -> bool {
        match self {
            HealthRatio::Finite(value) => *value < min_health_ratio as u128,
            HealthRatio::Infinite => false,
        }
    }
}

pub struct Valuation<'a, S: PriceSource + ?Sized> {
    config: &'a SystemConfig,
    oracle: OracleAdapter<'a, S>,
}

impl<'a, S: PriceSource + ?Sized> Valuation<'a, S> {
    pub fn new(config: &'a SystemConfig, source: &'a S, now: UnixTimestamp) -> Self {
        Self {
            config,
            oracle: OracleAdapter::new(config, source, now),
        }
    }

    /// Value of `amount` base units of `asset_id`
    pub fn value_of_balance(&self, asset_id: &Pubkey, amount: u64) -> Result<u128, ProgramError> {
        if amount == 0 {
            return Ok(0);
        }

        let asset = self
            .config
            .find_asset(asset_id)
            .ok_or(DscError::UnknownAsset)?;
        let price = self.oracle.get_price(asset_id)?;

        // amount * price * 10^(synthetic_decimals + expo - asset_decimals)
        let raw = (amount as u128)
            .checked_mul(price.mantissa as u128)
            .ok_or(DscError::MathOverflow)?;
        let shift = self.config.synthetic_decimals as i32 + price.expo - asset.decimals as i32;

        shift_decimals(raw, shift)
    }

    /// Total collateral value. Any unpriceable nonzero balance fails the
    /// whole valuation.
    pub fn value_of(&self, position: &Position) -> Result<u128, ProgramError> {
        position
            .nonzero_balances()
            .try_fold(0u128, |total, balance| -> Result<u128, ProgramError> {
                let value = self.value_of_balance(&balance.asset_id, balance.amount)?;
                Ok(total.checked_add(value).ok_or(DscError::MathOverflow)?)
            })
    }

    /// Debt-free positions are infinitely healthy and need no price reads.
    pub fn health_ratio(&self, position: &Position) -> Result<HealthRatio, ProgramError> {
        if !position.has_debt() {
            return Ok(HealthRatio::Infinite);
        }
        HealthRatio::from_value(self.value_of(position)?, position.debt)
    }

    pub fn check_health(&self, position: &Position) -> ProgramResult {
        let health = self.health_ratio(position)?;
        if health.is_below(self.config.params.min_health_ratio) {
            msg!(
                "Health check failed for {}: {:?} < {}",
                position.owner,
                health,
                self.config.params.min_health_ratio
            );
            return Err(DscError::HealthCheckFailed.into());
        }
        Ok(())
    }
}
