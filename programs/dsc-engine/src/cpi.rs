//! Token custody over CPI
//!
//! SPL collateral sits in token accounts owned by the vault authority PDA and
//! native collateral in the sol vault PDA. The synthetic token is minted by
//! the mint authority PDA and burned by its holder.

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    system_instruction, system_program,
};
use spl_token::{instruction as token_instruction, state::Account as TokenAccount};

use crate::{
    constants::{MINT_AUTHORITY_SEED, SOL_VAULT_SEED, VAULT_AUTHORITY_SEED},
    custody::TokenCustody,
    error::DscError,
    pda::{verify_pda, MintAuthorityPDA, SolVaultPDA, VaultAuthorityPDA},
    state::AssetKind,
};

/// Custody and counterparty accounts for one collateral asset
pub struct CollateralLeg<'a, 'b> {
    pub asset_id: Pubkey,
    /// Vault token account, or the sol vault PDA
    pub custody: &'a AccountInfo<'b>,
    /// User token account, or the user for the native asset
    pub counterparty: &'a AccountInfo<'b>,
}

/// Synthetic mint and the holder's token account
pub struct SyntheticLeg<'a, 'b> {
    pub mint: &'a AccountInfo<'b>,
    pub holder: &'a AccountInfo<'b>,
    pub mint_authority: Option<&'a AccountInfo<'b>>,
}

pub struct CpiCustody<'a, 'b> {
    program_id: &'a Pubkey,
    signer: &'a AccountInfo<'b>,
    token_program: &'a AccountInfo<'b>,
    system_program: Option<&'a AccountInfo<'b>>,
    vault_authority: Option<&'a AccountInfo<'b>>,
    synthetic: Option<SyntheticLeg<'a, 'b>>,
    collateral: Vec<CollateralLeg<'a, 'b>>,
}

impl<'a, 'b> CpiCustody<'a, 'b> {
    pub fn new(
        program_id: &'a Pubkey,
        signer: &'a AccountInfo<'b>,
        token_program: &'a AccountInfo<'b>,
    ) -> Result<Self, ProgramError> {
        if *token_program.key != spl_token::id() {
            return Err(ProgramError::IncorrectProgramId);
        }
        Ok(Self {
            program_id,
            signer,
            token_program,
            system_program: None,
            vault_authority: None,
            synthetic: None,
            collateral: Vec::new(),
        })
    }

    pub fn with_system_program(
        mut self,
        system_program: &'a AccountInfo<'b>,
    ) -> Result<Self, ProgramError> {
        if *system_program.key != system_program::id() {
            return Err(ProgramError::IncorrectProgramId);
        }
        self.system_program = Some(system_program);
        Ok(self)
    }

    pub fn with_vault_authority(mut self, vault_authority: &'a AccountInfo<'b>) -> Self {
        self.vault_authority = Some(vault_authority);
        self
    }

    pub fn with_synthetic(mut self, synthetic: SyntheticLeg<'a, 'b>) -> Self {
        self.synthetic = Some(synthetic);
        self
    }

    pub fn with_collateral(mut self, leg: CollateralLeg<'a, 'b>) -> Self {
        self.collateral.push(leg);
        self
    }

    fn leg(&self, asset_id: &Pubkey) -> Result<&CollateralLeg<'a, 'b>, ProgramError> {
        self.collateral
            .iter()
            .find(|leg| leg.asset_id == *asset_id)
            .ok_or_else(|| {
                msg!("No custody accounts supplied for {}", asset_id);
                ProgramError::NotEnoughAccountKeys
            })
    }

    fn system_program(&self) -> Result<&'a AccountInfo<'b>, ProgramError> {
        self.system_program.ok_or(ProgramError::NotEnoughAccountKeys)
    }

    fn synthetic(&self) -> Result<&SyntheticLeg<'a, 'b>, ProgramError> {
        self.synthetic.as_ref().ok_or(ProgramError::NotEnoughAccountKeys)
    }

    fn vault_authority(&self) -> Result<(&'a AccountInfo<'b>, u8), ProgramError> {
        let vault_authority = self.vault_authority.ok_or(ProgramError::NotEnoughAccountKeys)?;
        let bump = verify_pda(vault_authority, VaultAuthorityPDA::derive(self.program_id))?;
        Ok((vault_authority, bump))
    }

    fn require_signer(&self, identity: &Pubkey) -> ProgramResult {
        if self.signer.key != identity || !self.signer.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        Ok(())
    }
}

impl TokenCustody for CpiCustody<'_, '_> {
    fn transfer_in(&mut self, asset_id: &Pubkey, amount: u64, from: &Pubkey) -> ProgramResult {
        self.require_signer(from)?;
        let leg = self.leg(asset_id)?;

        match AssetKind::of(asset_id) {
            AssetKind::Native => {
                verify_pda(leg.custody, SolVaultPDA::derive(self.program_id))?;
                invoke(
                    &system_instruction::transfer(self.signer.key, leg.custody.key, amount),
                    &[
                        self.signer.clone(),
                        leg.custody.clone(),
                        self.system_program()?.clone(),
                    ],
                )
            }
            AssetKind::SplToken => {
                let (vault_authority, _) = VaultAuthorityPDA::derive(self.program_id);
                check_token_account(leg.custody, asset_id, &vault_authority)?;
                invoke(
                    &token_instruction::transfer(
                        self.token_program.key,
                        leg.counterparty.key,
                        leg.custody.key,
                        self.signer.key,
                        &[],
                        amount,
                    )?,
                    &[
                        leg.counterparty.clone(),
                        leg.custody.clone(),
                        self.signer.clone(),
                        self.token_program.clone(),
                    ],
                )
            }
        }
    }

    fn transfer_out(&mut self, asset_id: &Pubkey, amount: u64, to: &Pubkey) -> ProgramResult {
        let leg = self.leg(asset_id)?;

        match AssetKind::of(asset_id) {
            AssetKind::Native => {
                let bump = verify_pda(leg.custody, SolVaultPDA::derive(self.program_id))?;
                if leg.counterparty.key != to {
                    return Err(DscError::CustodyMismatch.into());
                }
                invoke_signed(
                    &system_instruction::transfer(leg.custody.key, to, amount),
                    &[
                        leg.custody.clone(),
                        leg.counterparty.clone(),
                        self.system_program()?.clone(),
                    ],
                    &[&[SOL_VAULT_SEED, &[bump]]],
                )
            }
            AssetKind::SplToken => {
                let (vault_authority, bump) = self.vault_authority()?;
                check_token_account(leg.custody, asset_id, vault_authority.key)?;
                check_token_account(leg.counterparty, asset_id, to)?;
                invoke_signed(
                    &token_instruction::transfer(
                        self.token_program.key,
                        leg.custody.key,
                        leg.counterparty.key,
                        vault_authority.key,
                        &[],
                        amount,
                    )?,
                    &[
                        leg.custody.clone(),
                        leg.counterparty.clone(),
                        vault_authority.clone(),
                        self.token_program.clone(),
                    ],
                    &[&[VAULT_AUTHORITY_SEED, &[bump]]],
                )
            }
        }
    }

    fn mint_synthetic(&mut self, amount: u64, to: &Pubkey) -> ProgramResult {
        let synthetic = self.synthetic()?;
        let mint_authority = synthetic
            .mint_authority
            .ok_or(ProgramError::NotEnoughAccountKeys)?;
        let bump = verify_pda(mint_authority, MintAuthorityPDA::derive(self.program_id))?;
        check_token_account(synthetic.holder, synthetic.mint.key, to)?;

        invoke_signed(
            &token_instruction::mint_to(
                self.token_program.key,
                synthetic.mint.key,
                synthetic.holder.key,
                mint_authority.key,
                &[],
                amount,
            )?,
            &[
                synthetic.mint.clone(),
                synthetic.holder.clone(),
                mint_authority.clone(),
                self.token_program.clone(),
            ],
            &[&[MINT_AUTHORITY_SEED, &[bump]]],
        )
    }

    fn burn_synthetic(&mut self, amount: u64, from: &Pubkey) -> ProgramResult {
        self.require_signer(from)?;
        let synthetic = self.synthetic()?;
        check_token_account(synthetic.holder, synthetic.mint.key, from)?;

        invoke(
            &token_instruction::burn(
                self.token_program.key,
                synthetic.holder.key,
                synthetic.mint.key,
                self.signer.key,
                &[],
                amount,
            )?,
            &[
                synthetic.holder.clone(),
                synthetic.mint.clone(),
                self.signer.clone(),
                self.token_program.clone(),
            ],
        )
    }
}

/// SPL token account holding `mint` and owned by `owner`
pub fn check_token_account(account: &AccountInfo, mint: &Pubkey, owner: &Pubkey) -> ProgramResult {
    if *account.owner != spl_token::id() {
        msg!("{} is not a token account", account.key);
        return Err(DscError::CustodyMismatch.into());
    }

    let token_account = TokenAccount::unpack(&account.try_borrow_data()?)?;
    if token_account.mint != *mint || token_account.owner != *owner {
        msg!(
            "Token account {} holds {} for {}, expected {} for {}",
            account.key,
            token_account.mint,
            token_account.owner,
            mint,
            owner
        );
        return Err(DscError::CustodyMismatch.into());
    }

    Ok(())
}
