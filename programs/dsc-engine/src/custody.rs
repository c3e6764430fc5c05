//! Token custody capability
//!
//! The controller never moves tokens itself. Every successful operation
//! returns the custody effects it needs and the host applies them before
//! committing state.

use solana_program::{entrypoint::ProgramResult, msg, pubkey::Pubkey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustodyEffect {
    /// Move collateral from `from` into the asset's vault
    TransferIn {
        asset_id: Pubkey,
        amount: u64,
        from: Pubkey,
    },
    /// Release collateral from the asset's vault to `to`
    TransferOut {
        asset_id: Pubkey,
        amount: u64,
        to: Pubkey,
    },
    MintSynthetic { amount: u64, to: Pubkey },
    BurnSynthetic { amount: u64, from: Pubkey },
}

pub trait TokenCustody {
    fn transfer_in(&mut self, asset_id: &Pubkey, amount: u64, from: &Pubkey) -> ProgramResult;

    fn transfer_out(&mut self, asset_id: &Pubkey, amount: u64, to: &Pubkey) -> ProgramResult;

    fn mint_synthetic(&mut self, amount: u64, to: &Pubkey) -> ProgramResult;

    fn burn_synthetic(&mut self, amount: u64, from: &Pubkey) -> ProgramResult;
}

/// Apply effects in order, stopping at the first failure
pub fn apply_effects<C: TokenCustody + ?Sized>(
    custody: &mut C,
    effects: &[CustodyEffect],
) -> ProgramResult {
    for effect in effects {
        match effect {
            CustodyEffect::TransferIn {
                asset_id,
                amount,
                from,
            } => custody.transfer_in(asset_id, *amount, from),
            CustodyEffect::TransferOut {
                asset_id,
                amount,
                to,
            } => custody.transfer_out(asset_id, *amount, to),
            CustodyEffect::MintSynthetic { amount, to } => custody.mint_synthetic(*amount, to),
            CustodyEffect::BurnSynthetic { amount, from } => custody.burn_synthetic(*amount, from),
        }
        .map_err(|error| {
            msg!("Custody effect {:?} failed: {:?}", effect, error);
            error
        })?;
    }
    Ok(())
}
