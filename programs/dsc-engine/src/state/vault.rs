use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::error::DscError;

/// Aggregate custody balance of one collateral asset
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    /// Account discriminator
    pub discriminator: [u8; 8],

    /// Is initialized
    pub is_initialized: bool,

    /// Collateral asset held by this vault
    pub asset_id: Pubkey,

    /// Sum of every position's balance of `asset_id`
    pub total_held_balance: u64,

    /// PDA bump
    pub bump: u8,
}

impl Vault {
    pub const DISCRIMINATOR: [u8; 8] = *b"DSCVAULT";

    pub const LEN: usize = 8 + // discriminator
        1 + // is_initialized
        32 + // asset_id
        8 + // total_held_balance
        1 + // bump
        32; // padding

    pub fn new(asset_id: Pubkey, bump: u8) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            is_initialized: true,
            asset_id,
            total_held_balance: 0,
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

    pub fn credit(&mut self, amount: u64) -> ProgramResult {
        self.total_held_balance = self
            .total_held_balance
            .checked_add(amount)
            .ok_or(DscError::MathOverflow)?;
        Ok(())
    }

    /// Fails instead of wrapping; the position ledger should already have
    /// refused any debit that reaches this point.
    pub fn debit(&mut self, amount: u64) -> ProgramResult {
        self.total_held_balance = self
            .total_held_balance
            .checked_sub(amount)
            .ok_or_else(|| {
                msg!(
                    "Vault {} holds {}, cannot release {}",
                    self.asset_id,
                    self.total_held_balance,
                    amount
                );
                DscError::InsufficientVaultBalance
            })?;
        Ok(())
    }
}

/// One vault per approved asset. Vaults are never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultRegistry {
    vaults: BTreeMap<Pubkey, Vault>,
}

impl VaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh vault for an asset being approved.
    pub fn register(&mut self, asset_id: Pubkey, bump: u8) -> ProgramResult {
        if self.vaults.contains_key(&asset_id) {
            msg!("Vault for {} already registered", asset_id);
            return Err(DscError::InvalidConfig.into());
        }
        self.vaults.insert(asset_id, Vault::new(asset_id, bump));
        Ok(())
    }

    /// Track an existing vault loaded from storage.
    pub fn insert(&mut self, vault: Vault) {
        self.vaults.insert(vault.asset_id, vault);
    }

    pub fn get(&self, asset_id: &Pubkey) -> Option<&Vault> {
        self.vaults.get(asset_id)
    }

    pub fn credit(&mut self, asset_id: &Pubkey, amount: u64) -> ProgramResult {
        self.vault_mut(asset_id)?.credit(amount)
    }

    pub fn debit(&mut self, asset_id: &Pubkey, amount: u64) -> ProgramResult {
        self.vault_mut(asset_id)?.debit(amount)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vault> {
        self.vaults.values()
    }

    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }

    fn vault_mut(&mut self, asset_id: &Pubkey) -> Result<&mut Vault, ProgramError> {
        self.vaults
            .get_mut(asset_id)
            .ok_or_else(|| DscError::AssetNotApproved.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_credit_debit() {
        let mut vault = Vault::new(Pubkey::new_unique(), 255);

        vault.credit(1_000).unwrap();
        vault.debit(400).unwrap();
        assert_eq!(vault.total_held_balance, 600);

        assert_eq!(vault.debit(601), Err(DscError::InsufficientVaultBalance.into()));
        assert_eq!(vault.total_held_balance, 600);

        vault.debit(600).unwrap();
        assert_eq!(vault.total_held_balance, 0);
    }

    #[test]
    fn test_credit_overflow() {
        let mut vault = Vault::new(Pubkey::new_unique(), 255);
        vault.credit(u64::MAX).unwrap();
        assert_eq!(vault.credit(1), Err(DscError::MathOverflow.into()));
    }

    #[test]
    fn test_registry_is_append_only() {
        let asset = Pubkey::new_unique();
        let mut registry = VaultRegistry::new();
        registry.register(asset, 1).unwrap();

        registry.credit(&asset, 50).unwrap();
        registry.debit(&asset, 50).unwrap();

        // Zero balance keeps the vault
        assert_eq!(registry.get(&asset).map(|v| v.total_held_balance), Some(0));
        assert_eq!(registry.register(asset, 1), Err(DscError::InvalidConfig.into()));
        assert_eq!(
            registry.credit(&Pubkey::new_unique(), 1),
            Err(DscError::AssetNotApproved.into())
        );
    }
}
