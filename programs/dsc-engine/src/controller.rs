//! Mint/redeem/liquidate controller
//!
//! Every operation mutates the ledger and registry it is handed and returns
//! the custody effects the host must apply. Hosts pass staged copies and only
//! commit them when the operation and all of its effects succeed, so an error
//! here may leave the staged copies half-updated.

use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    custody::CustodyEffect,
    error::DscError,
    math::{add_bps, mul_div},
    oracle::PriceSource,
    state::{CollateralBalance, LiquidationPolicy, PositionLedger, SystemConfig, VaultRegistry},
    valuation::{HealthRatio, Valuation},
};

/// Outcome of a successful liquidation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Liquidation {
    pub ratio_before: HealthRatio,
    pub ratio_after: HealthRatio,
    pub seized: Vec<CollateralBalance>,
    pub effects: Vec<CustodyEffect>,
}

pub struct Controller<'a> {
    config: &'a SystemConfig,
}

impl<'a> Controller<'a> {
    pub fn new(config: &'a SystemConfig) -> Self {
        Self { config }
    }

    /// Deposits only improve health, so no price is read.
    pub fn deposit_collateral(
        &self,
        ledger: &mut PositionLedger,
        vaults: &mut VaultRegistry,
        owner: &Pubkey,
        asset_id: &Pubkey,
        amount: u64,
    ) -> Result<Vec<CustodyEffect>, ProgramError> {
        require_amount(amount)?;
        self.config.require_asset(asset_id)?;

        ledger
            .get_or_create(owner)
            .adjust_collateral(asset_id, amount as i128)?;
        vaults.credit(asset_id, amount)?;

        msg!("Deposited {} of {} for {}", amount, asset_id, owner);
        Ok(vec![CustodyEffect::TransferIn {
            asset_id: *asset_id,
            amount,
            from: *owner,
        }])
    }

    pub fn withdraw_collateral<S: PriceSource + ?Sized>(
        &self,
        valuation: &Valuation<'_, S>,
        ledger: &mut PositionLedger,
        vaults: &mut VaultRegistry,
        owner: &Pubkey,
        asset_id: &Pubkey,
        amount: u64,
    ) -> Result<Vec<CustodyEffect>, ProgramError> {
        require_amount(amount)?;
        self.config.require_asset(asset_id)?;

        ledger.adjust_collateral(owner, asset_id, -(amount as i128))?;

        let position = ledger.require(owner)?;
        if position.has_debt() {
            valuation.check_health(position)?;
        }

        vaults.debit(asset_id, amount)?;

        msg!("Withdrew {} of {} for {}", amount, asset_id, owner);
        Ok(vec![CustodyEffect::TransferOut {
            asset_id: *asset_id,
            amount,
            to: *owner,
        }])
    }

    pub fn mint_synthetic<S: PriceSource + ?Sized>(
        &self,
        valuation: &Valuation<'_, S>,
        ledger: &mut PositionLedger,
        owner: &Pubkey,
        amount: u64,
    ) -> Result<Vec<CustodyEffect>, ProgramError> {
        require_amount(amount)?;

        ledger.adjust_debt(owner, amount as i128)?;
        let position = ledger.require(owner)?;
        valuation.check_health(position)?;

        msg!("Minted {} for {}, debt now {}", amount, owner, position.debt);
        Ok(vec![CustodyEffect::MintSynthetic { amount, to: *owner }])
    }

    /// Burning only lowers debt, so no price is read.
    pub fn burn_synthetic(
        &self,
        ledger: &mut PositionLedger,
        owner: &Pubkey,
        amount: u64,
    ) -> Result<Vec<CustodyEffect>, ProgramError> {
        require_amount(amount)?;

        ledger.adjust_debt(owner, -(amount as i128))?;

        msg!("Burned {} for {}", amount, owner);
        Ok(vec![CustodyEffect::BurnSynthetic {
            amount,
            from: *owner,
        }])
    }

    /// Repay `repay_amount` of an unhealthy position's debt in exchange for
    /// collateral worth `repay_amount * (1 + bonus)`, taken from every held
    /// asset in proportion to its share of the position's value. The
    /// liquidator does not pick a single collateral asset to seize.
    pub fn liquidate<S: PriceSource + ?Sized>(
        &self,
        valuation: &Valuation<'_, S>,
        ledger: &mut PositionLedger,
        vaults: &mut VaultRegistry,
        liquidator: &Pubkey,
        target: &Pubkey,
        repay_amount: u64,
    ) -> Result<Liquidation, ProgramError> {
        require_amount(repay_amount)?;
        let params = self.config.params;

        let position = ledger.require(target)?;
        if repay_amount > position.debt {
            msg!(
                "Repay amount {} exceeds debt {}",
                repay_amount,
                position.debt
            );
            return Err(DscError::ExcessiveRepay.into());
        }

        let total_value = valuation.value_of(position)?;
        let ratio_before = HealthRatio::from_value(total_value, position.debt)?;
        if !ratio_before.is_below(params.min_health_ratio) {
            msg!("Position {} is healthy: {:?}", target, ratio_before);
            return Err(DscError::PositionHealthy.into());
        }

        let seize_value = add_bps(repay_amount as u128, params.liquidation_bonus_bps)?;
        let seized = position
            .nonzero_balances()
            .map(|balance| {
                let amount = if seize_value >= total_value {
                    balance.amount
                } else {
                    let share = mul_div(balance.amount as u128, seize_value, total_value)?;
                    u64::try_from(share).map_err(|_| DscError::MathOverflow)?
                };
                Ok(CollateralBalance {
                    asset_id: balance.asset_id,
                    amount,
                })
            })
            .collect::<Result<Vec<_>, ProgramError>>()?;

        for balance in &seized {
            ledger.adjust_collateral(target, &balance.asset_id, -(balance.amount as i128))?;
            vaults.debit(&balance.asset_id, balance.amount)?;
        }
        ledger.adjust_debt(target, -(repay_amount as i128))?;

        let ratio_after = valuation.health_ratio(ledger.require(target)?)?;
        if ratio_after <= ratio_before {
            msg!(
                "Liquidation does not improve health: {:?} -> {:?}",
                ratio_before,
                ratio_after
            );
            return Err(DscError::HealthNotImproved.into());
        }
        if params.liquidation_policy == LiquidationPolicy::RestoreHealth
            && ratio_after.is_below(params.min_health_ratio)
        {
            msg!("Liquidation leaves position below minimum: {:?}", ratio_after);
            return Err(DscError::HealthNotImproved.into());
        }

        let mut effects = Vec::with_capacity(seized.len() + 1);
        effects.push(CustodyEffect::BurnSynthetic {
            amount: repay_amount,
            from: *liquidator,
        });
        effects.extend(
            seized
                .iter()
                .filter(|balance| balance.amount > 0)
                .map(|balance| CustodyEffect::TransferOut {
                    asset_id: balance.asset_id,
                    amount: balance.amount,
                    to: *liquidator,
                }),
        );

        msg!(
            "Liquidated {} by {}: repaid {}, health {:?} -> {:?}",
            target,
            liquidator,
            repay_amount,
            ratio_before,
            ratio_after
        );

        Ok(Liquidation {
            ratio_before,
            ratio_after,
            seized,
            effects,
        })
    }
}

fn require_amount(amount: u64) -> Result<(), ProgramError> {
    if amount == 0 {
        return Err(DscError::InvalidAmount.into());
    }
    Ok(())
}
