use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::{
    pda::{ConfigPDA, MintAuthorityPDA, PositionPDA, SolVaultPDA, VaultAuthorityPDA, VaultPDA},
    state::{AssetKind, RiskParameterUpdate, RiskParameters},
};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum DscInstruction {
    /// Create the system configuration and one vault per collateral type
    /// Accounts:
    /// 0. `[signer, writable]` Authority (payer)
    /// 1. `[writable]` Config PDA
    /// 2. `[]` Synthetic mint (mint authority must be the mint authority PDA)
    /// 3. `[]` System program
    /// 4.. For each collateral token, in order:
    ///     `[writable]` Vault PDA
    ///     `[]` Collateral mint (system program for the native asset)
    /// n. `[writable]` Sol vault PDA, only when the native asset is listed
    Initialize {
        collateral_tokens: Vec<Pubkey>,
        price_feeds: Vec<Pubkey>,
        params: RiskParameters,
    },

    /// Approve an additional collateral type
    /// Accounts:
    /// 0. `[signer, writable]` Authority (payer)
    /// 1. `[writable]` Config PDA
    /// 2. `[writable]` Vault PDA for the asset
    /// 3. `[]` Collateral mint (system program for the native asset)
    /// 4. `[]` System program
    /// 5. `[writable]` Sol vault PDA, only for the native asset
    AddCollateralType {
        asset_id: Pubkey,
        price_feed: Pubkey,
    },

    /// Accounts:
    /// 0. `[signer]` Authority
    /// 1. `[writable]` Config PDA
    UpdateRiskParameters {
        update: RiskParameterUpdate,
    },

    /// Accounts:
    /// 0. `[signer, writable]` Owner (payer)
    /// 1. `[]` Config PDA
    /// 2. `[writable]` Position PDA (created on first deposit)
    /// 3. `[writable]` Vault PDA
    /// 4. `[writable]` Source: owner token account, or the owner for the native asset
    /// 5. `[writable]` Custody: vault token account, or the sol vault PDA
    /// 6. `[]` Token program
    /// 7. `[]` System program
    DepositCollateral {
        amount: u64,
    },

    /// Accounts:
    /// 0. `[signer, writable]` Owner
    /// 1. `[]` Config PDA
    /// 2. `[writable]` Position PDA
    /// 3. `[writable]` Vault PDA
    /// 4. `[writable]` Destination: owner token account, or the owner for the native asset
    /// 5. `[writable]` Custody: vault token account, or the sol vault PDA
    /// 6. `[]` Vault authority PDA
    /// 7. `[]` Token program
    /// 8. `[]` System program
    /// 9.. `[]` Price feeds of every asset the position holds
    WithdrawCollateral {
        amount: u64,
    },

    /// Accounts:
    /// 0. `[signer]` Owner
    /// 1. `[]` Config PDA
    /// 2. `[writable]` Position PDA
    /// 3. `[writable]` Synthetic mint
    /// 4. `[writable]` Owner synthetic token account
    /// 5. `[]` Mint authority PDA
    /// 6. `[]` Token program
    /// 7.. `[]` Price feeds of every asset the position holds
    MintSynthetic {
        amount: u64,
    },

    /// Accounts:
    /// 0. `[signer]` Owner
    /// 1. `[]` Config PDA
    /// 2. `[writable]` Position PDA
    /// 3. `[writable]` Synthetic mint
    /// 4. `[writable]` Owner synthetic token account
    /// 5. `[]` Token program
    BurnSynthetic {
        amount: u64,
    },

    /// Accounts:
    /// 0. `[signer, writable]` Liquidator
    /// 1. `[]` Config PDA
    /// 2. `[writable]` Target position PDA
    /// 3. `[writable]` Synthetic mint
    /// 4. `[writable]` Liquidator synthetic token account
    /// 5. `[]` Vault authority PDA
    /// 6. `[]` Token program
    /// 7. `[]` System program
    /// 8.. For each asset the target holds, in order:
    ///     `[]` Price feed
    ///     `[writable]` Vault PDA
    ///     `[writable]` Custody: vault token account, or the sol vault PDA
    ///     `[writable]` Destination: liquidator token account, or the liquidator
    Liquidate {
        repay_amount: u64,
    },
}

impl DscInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| ProgramError::InvalidInstructionData)
    }

    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        self.try_to_vec()
            .map_err(|_| ProgramError::InvalidInstructionData)
    }
}

/// Collateral accounts supplied to `Liquidate` for one seized asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralAccounts {
    pub asset_id: Pubkey,
    pub price_feed: Pubkey,
    pub custody: Pubkey,
    pub destination: Pubkey,
}

// Helper functions to create instructions
pub fn initialize(
    program_id: &Pubkey,
    authority: &Pubkey,
    synthetic_mint: &Pubkey,
    collateral_tokens: Vec<Pubkey>,
    price_feeds: Vec<Pubkey>,
    params: RiskParameters,
) -> Result<Instruction, ProgramError> {
    let mut accounts = vec![
        AccountMeta::new(*authority, true),
        AccountMeta::new(ConfigPDA::derive(program_id).0, false),
        AccountMeta::new_readonly(*synthetic_mint, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];
    for asset_id in &collateral_tokens {
        accounts.push(AccountMeta::new(VaultPDA::derive(program_id, asset_id).0, false));
        accounts.push(AccountMeta::new_readonly(*asset_id, false));
    }
    if collateral_tokens
        .iter()
        .any(|asset_id| AssetKind::of(asset_id) == AssetKind::Native)
    {
        accounts.push(AccountMeta::new(SolVaultPDA::derive(program_id).0, false));
    }

    let data = DscInstruction::Initialize {
        collateral_tokens,
        price_feeds,
        params,
    }
    .pack()?;

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

pub fn add_collateral_type(
    program_id: &Pubkey,
    authority: &Pubkey,
    asset_id: &Pubkey,
    price_feed: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let mut accounts = vec![
        AccountMeta::new(*authority, true),
        AccountMeta::new(ConfigPDA::derive(program_id).0, false),
        AccountMeta::new(VaultPDA::derive(program_id, asset_id).0, false),
        AccountMeta::new_readonly(*asset_id, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];
    if AssetKind::of(asset_id) == AssetKind::Native {
        accounts.push(AccountMeta::new(SolVaultPDA::derive(program_id).0, false));
    }

    let data = DscInstruction::AddCollateralType {
        asset_id: *asset_id,
        price_feed: *price_feed,
    }
    .pack()?;

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

pub fn update_risk_parameters(
    program_id: &Pubkey,
    authority: &Pubkey,
    update: RiskParameterUpdate,
) -> Result<Instruction, ProgramError> {
    let accounts = vec![
        AccountMeta::new_readonly(*authority, true),
        AccountMeta::new(ConfigPDA::derive(program_id).0, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: DscInstruction::UpdateRiskParameters { update }.pack()?,
    })
}

pub fn deposit_collateral(
    program_id: &Pubkey,
    owner: &Pubkey,
    asset_id: &Pubkey,
    source: &Pubkey,
    custody: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let accounts = vec![
        AccountMeta::new(*owner, true),
        AccountMeta::new_readonly(ConfigPDA::derive(program_id).0, false),
        AccountMeta::new(PositionPDA::derive(program_id, owner).0, false),
        AccountMeta::new(VaultPDA::derive(program_id, asset_id).0, false),
        AccountMeta::new(*source, false),
        AccountMeta::new(*custody, false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: DscInstruction::DepositCollateral { amount }.pack()?,
    })
}

pub fn withdraw_collateral(
    program_id: &Pubkey,
    owner: &Pubkey,
    asset_id: &Pubkey,
    destination: &Pubkey,
    custody: &Pubkey,
    price_feeds: &[Pubkey],
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let mut accounts = vec![
        AccountMeta::new(*owner, true),
        AccountMeta::new_readonly(ConfigPDA::derive(program_id).0, false),
        AccountMeta::new(PositionPDA::derive(program_id, owner).0, false),
        AccountMeta::new(VaultPDA::derive(program_id, asset_id).0, false),
        AccountMeta::new(*destination, false),
        AccountMeta::new(*custody, false),
        AccountMeta::new_readonly(VaultAuthorityPDA::derive(program_id).0, false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];
    accounts.extend(
        price_feeds
            .iter()
            .map(|feed| AccountMeta::new_readonly(*feed, false)),
    );

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: DscInstruction::WithdrawCollateral { amount }.pack()?,
    })
}

pub fn mint_synthetic(
    program_id: &Pubkey,
    owner: &Pubkey,
    synthetic_mint: &Pubkey,
    owner_synthetic_account: &Pubkey,
    price_feeds: &[Pubkey],
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let mut accounts = vec![
        AccountMeta::new_readonly(*owner, true),
        AccountMeta::new_readonly(ConfigPDA::derive(program_id).0, false),
        AccountMeta::new(PositionPDA::derive(program_id, owner).0, false),
        AccountMeta::new(*synthetic_mint, false),
        AccountMeta::new(*owner_synthetic_account, false),
        AccountMeta::new_readonly(MintAuthorityPDA::derive(program_id).0, false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ];
    accounts.extend(
        price_feeds
            .iter()
            .map(|feed| AccountMeta::new_readonly(*feed, false)),
    );

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: DscInstruction::MintSynthetic { amount }.pack()?,
    })
}

pub fn burn_synthetic(
    program_id: &Pubkey,
    owner: &Pubkey,
    synthetic_mint: &Pubkey,
    owner_synthetic_account: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let accounts = vec![
        AccountMeta::new_readonly(*owner, true),
        AccountMeta::new_readonly(ConfigPDA::derive(program_id).0, false),
        AccountMeta::new(PositionPDA::derive(program_id, owner).0, false),
        AccountMeta::new(*synthetic_mint, false),
        AccountMeta::new(*owner_synthetic_account, false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: DscInstruction::BurnSynthetic { amount }.pack()?,
    })
}

pub fn liquidate(
    program_id: &Pubkey,
    liquidator: &Pubkey,
    target: &Pubkey,
    synthetic_mint: &Pubkey,
    liquidator_synthetic_account: &Pubkey,
    collateral: &[CollateralAccounts],
    repay_amount: u64,
) -> Result<Instruction, ProgramError> {
    let mut accounts = vec![
        AccountMeta::new(*liquidator, true),
        AccountMeta::new_readonly(ConfigPDA::derive(program_id).0, false),
        AccountMeta::new(PositionPDA::derive(program_id, target).0, false),
        AccountMeta::new(*synthetic_mint, false),
        AccountMeta::new(*liquidator_synthetic_account, false),
        AccountMeta::new_readonly(VaultAuthorityPDA::derive(program_id).0, false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];
    for entry in collateral {
        accounts.push(AccountMeta::new_readonly(entry.price_feed, false));
        accounts.push(AccountMeta::new(VaultPDA::derive(program_id, &entry.asset_id).0, false));
        accounts.push(AccountMeta::new(entry.custody, false));
        accounts.push(AccountMeta::new(entry.destination, false));
    }

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: DscInstruction::Liquidate { repay_amount }.pack()?,
    })
}
