//! Program Derived Address (PDA) derivation functions

use solana_program::{account_info::AccountInfo, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    constants::{
        CONFIG_SEED, MINT_AUTHORITY_SEED, POSITION_SEED, SOL_VAULT_SEED, VAULT_AUTHORITY_SEED,
        VAULT_SEED,
    },
    error::DscError,
};

/// Singleton system configuration
pub struct ConfigPDA;
impl ConfigPDA {
    pub fn derive(program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[CONFIG_SEED], program_id)
    }
}

/// Per-owner position
pub struct PositionPDA;
impl PositionPDA {
    pub fn derive(program_id: &Pubkey, owner: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[POSITION_SEED, owner.as_ref()], program_id)
    }
}

/// Per-asset vault bookkeeping
pub struct VaultPDA;
impl VaultPDA {
    pub fn derive(program_id: &Pubkey, asset_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[VAULT_SEED, asset_id.as_ref()], program_id)
    }
}

/// Owner of every SPL collateral token account held in custody
pub struct VaultAuthorityPDA;
impl VaultAuthorityPDA {
    pub fn derive(program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[VAULT_AUTHORITY_SEED], program_id)
    }
}

/// System account holding native collateral
pub struct SolVaultPDA;
impl SolVaultPDA {
    pub fn derive(program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[SOL_VAULT_SEED], program_id)
    }
}

/// Mint authority of the synthetic token
pub struct MintAuthorityPDA;
impl MintAuthorityPDA {
    pub fn derive(program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[MINT_AUTHORITY_SEED], program_id)
    }
}

/// Check an account against its derived address and return the bump
pub fn verify_pda(account: &AccountInfo, derived: (Pubkey, u8)) -> Result<u8, ProgramError> {
    let (expected, bump) = derived;
    if *account.key != expected {
        msg!("Expected PDA {}, got {}", expected, account.key);
        return Err(DscError::InvalidPda.into());
    }
    Ok(bump)
}
