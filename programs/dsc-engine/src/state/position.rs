use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    entrypoint::ProgramResult,
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{
    constants::MAX_COLLATERAL_TYPES,
    error::DscError,
};

/// Deposited amount of one asset, in the asset's native precision
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralBalance {
    pub asset_id: Pubkey,
    pub amount: u64,
}

/// Per-owner collateral and synthetic debt
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Account discriminator
    pub discriminator: [u8; 8],

    /// Is initialized
    pub is_initialized: bool,

    /// Controlling identity
    pub owner: Pubkey,

    /// Synthetic tokens minted against this position (base units)
    pub debt: u64,

    /// Balances per asset; an entry is removed when it reaches zero
    pub collateral: Vec<CollateralBalance>,

    /// PDA bump
    pub bump: u8,
}

impl Position {
    pub const DISCRIMINATOR: [u8; 8] = *b"DSC_POSN";

    pub const LEN: usize = 8 + // discriminator
        1 + // is_initialized
        32 + // owner
        8 + // debt
        4 + (32 + 8) * MAX_COLLATERAL_TYPES + // collateral
        1 + // bump
        32; // padding

    pub fn new(owner: Pubkey, bump: u8) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            is_initialized: true,
            owner,
            debt: 0,
            collateral: Vec::new(),
            bump,
        }
    }

    pub fn validate(&self) -> ProgramResult {
        if self.discriminator != Self::DISCRIMINATOR {
            return Err(ProgramError::InvalidAccountData);
        }
        if !self.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(())
    }

    pub fn balance_of(&self, asset_id: &Pubkey) -> u64 {
        self.collateral
            .iter()
            .find(|balance| balance.asset_id == *asset_id)
            .map(|balance| balance.amount)
            .unwrap_or(0)
    }

    pub fn nonzero_balances(&self) -> impl Iterator<Item = &CollateralBalance> {
        self.collateral.iter().filter(|balance| balance.amount > 0)
    }

    pub fn has_debt(&self) -> bool {
        self.debt > 0
    }

    pub fn adjust_collateral(&mut self, asset_id: &Pubkey, delta: i128) -> ProgramResult {
        let current = self.balance_of(asset_id);
        let updated = apply_delta(current, delta)?;

        let index = self
            .collateral
            .iter()
            .position(|balance| balance.asset_id == *asset_id);

        match index {
            Some(index) if updated == 0 => {
                self.collateral.remove(index);
            }
            Some(index) => self.collateral[index].amount = updated,
            None if updated == 0 => {}
            None => {
                if self.collateral.len() >= MAX_COLLATERAL_TYPES {
                    return Err(DscError::InvalidConfig.into());
                }
                self.collateral.push(CollateralBalance {
                    asset_id: *asset_id,
                    amount: updated,
                });
            }
        }

        Ok(())
    }

    pub fn adjust_debt(&mut self, delta: i128) -> ProgramResult {
        self.debt = apply_delta(self.debt, delta)?;
        Ok(())
    }
}

fn apply_delta(current: u64, delta: i128) -> Result<u64, ProgramError> {
    let updated = (current as i128)
        .checked_add(delta)
        .ok_or(DscError::MathOverflow)?;

    if updated < 0 {
        return Err(DscError::Overdraw.into());
    }

    u64::try_from(updated).map_err(|_| DscError::MathOverflow.into())
}

/// Pure bookkeeping over positions keyed by owner; no pricing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionLedger {
    positions: BTreeMap<Pubkey, Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positions are created lazily with a zero balance.
    pub fn get_or_create(&mut self, owner: &Pubkey) -> &mut Position {
        self.positions
            .entry(*owner)
            .or_insert_with(|| Position::new(*owner, 0))
    }

    pub fn insert(&mut self, position: Position) {
        self.positions.insert(position.owner, position);
    }

    pub fn get(&self, owner: &Pubkey) -> Option<&Position> {
        self.positions.get(owner)
    }

    pub fn require(&self, owner: &Pubkey) -> Result<&Position, ProgramError> {
        self.positions
            .get(owner)
            .ok_or_else(|| DscError::PositionNotFound.into())
    }

    pub fn adjust_collateral(
        &mut self,
        owner: &Pubkey,
        asset_id: &Pubkey,
        delta: i128,
    ) -> ProgramResult {
        self.require_mut(owner)?.adjust_collateral(asset_id, delta)
    }

    pub fn adjust_debt(&mut self, owner: &Pubkey, delta: i128) -> ProgramResult {
        self.require_mut(owner)?.adjust_debt(delta)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn into_positions(self) -> impl Iterator<Item = Position> {
        self.positions.into_values()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn require_mut(&mut self, owner: &Pubkey) -> Result<&mut Position, ProgramError> {
        self.positions
            .get_mut(owner)
            .ok_or_else(|| DscError::PositionNotFound.into())
    }
}
