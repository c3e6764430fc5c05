use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_option::COption,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction, system_program,
    sysvar::Sysvar,
};
use spl_token::state::Mint;

use crate::{
    constants::{CONFIG_SEED, NATIVE_DECIMALS, POSITION_SEED, VAULT_SEED},
    controller::Controller,
    cpi::{CollateralLeg, CpiCustody, SyntheticLeg},
    custody::apply_effects,
    error::DscError,
    instructions::DscInstruction,
    oracle::AccountPriceSource,
    pda::{verify_pda, ConfigPDA, MintAuthorityPDA, PositionPDA, SolVaultPDA, VaultPDA},
    state::{
        AssetKind, CollateralAsset, Position, PositionLedger, RiskParameterUpdate, RiskParameters,
        SystemConfig, Vault, VaultRegistry,
    },
    valuation::Valuation,
};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = DscInstruction::unpack(instruction_data)?;

    match instruction {
        DscInstruction::Initialize {
            collateral_tokens,
            price_feeds,
            params,
        } => {
            msg!("Instruction: Initialize");
            process_initialize(program_id, accounts, collateral_tokens, price_feeds, params)
        }

        DscInstruction::AddCollateralType {
            asset_id,
            price_feed,
        } => {
            msg!("Instruction: AddCollateralType");
            process_add_collateral_type(program_id, accounts, asset_id, price_feed)
        }

        DscInstruction::UpdateRiskParameters { update } => {
            msg!("Instruction: UpdateRiskParameters");
            process_update_risk_parameters(program_id, accounts, update)
        }

        DscInstruction::DepositCollateral { amount } => {
            msg!("Instruction: DepositCollateral");
            process_deposit_collateral(program_id, accounts, amount)
        }

        DscInstruction::WithdrawCollateral { amount } => {
            msg!("Instruction: WithdrawCollateral");
            process_withdraw_collateral(program_id, accounts, amount)
        }

        DscInstruction::MintSynthetic { amount } => {
            msg!("Instruction: MintSynthetic");
            process_mint_synthetic(program_id, accounts, amount)
        }

        DscInstruction::BurnSynthetic { amount } => {
            msg!("Instruction: BurnSynthetic");
            process_burn_synthetic(program_id, accounts, amount)
        }

        DscInstruction::Liquidate { repay_amount } => {
            msg!("Instruction: Liquidate");
            process_liquidate(program_id, accounts, repay_amount)
        }
    }
}

fn process_initialize<'a, 'b>(
    program_id: &Pubkey,
    accounts: &'a [AccountInfo<'b>],
    collateral_tokens: Vec<Pubkey>,
    price_feeds: Vec<Pubkey>,
    params: RiskParameters,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let authority_info = next_account_info(account_info_iter)?;
    let config_info = next_account_info(account_info_iter)?;
    let synthetic_mint_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;

    if !authority_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let config_bump = verify_pda(config_info, ConfigPDA::derive(program_id))?;
    if !config_info.data_is_empty() {
        return Err(DscError::AlreadyInitialized.into());
    }

    if collateral_tokens.is_empty() || collateral_tokens.len() != price_feeds.len() {
        msg!(
            "Token addresses and price feed addresses must have the same length: {} != {}",
            collateral_tokens.len(),
            price_feeds.len()
        );
        return Err(DscError::InvalidConfig.into());
    }

    // Synthetic mint must be controlled by this program
    let synthetic_mint = load_mint(synthetic_mint_info)?;
    let (mint_authority, _) = MintAuthorityPDA::derive(program_id);
    if synthetic_mint.mint_authority != COption::Some(mint_authority) {
        msg!("Synthetic mint authority must be {}", mint_authority);
        return Err(DscError::InvalidConfig.into());
    }

    let mut decimals = Vec::with_capacity(collateral_tokens.len());
    let mut vault_infos = Vec::with_capacity(collateral_tokens.len());
    for asset_id in &collateral_tokens {
        let vault_info = next_account_info(account_info_iter)?;
        let asset_info = next_account_info(account_info_iter)?;
        decimals.push(collateral_decimals(asset_id, asset_info)?);
        vault_infos.push(vault_info);
    }
    let sol_vault_info = if collateral_tokens
        .iter()
        .any(|asset_id| AssetKind::of(asset_id) == AssetKind::Native)
    {
        Some(next_account_info(account_info_iter)?)
    } else {
        None
    };

    let mut config = SystemConfig::from_lists(
        *authority_info.key,
        *synthetic_mint_info.key,
        synthetic_mint.decimals,
        &collateral_tokens,
        &price_feeds,
        &decimals,
        params,
    )?;
    config.bump = config_bump;
    config.last_update = Clock::get()?.unix_timestamp;

    create_pda_account(
        program_id,
        authority_info,
        config_info,
        system_program_info,
        SystemConfig::LEN,
        &[CONFIG_SEED, &[config_bump]],
    )?;
    store(&config, config_info)?;

    for (asset_id, vault_info) in collateral_tokens.iter().zip(vault_infos) {
        open_vault(program_id, authority_info, vault_info, system_program_info, asset_id)?;
    }
    if let Some(sol_vault_info) = sol_vault_info {
        fund_sol_vault(program_id, authority_info, sol_vault_info, system_program_info)?;
    }

    msg!(
        "Initialized with {} collateral types, min health ratio {}",
        config.approved_collateral.len(),
        config.params.min_health_ratio
    );
    Ok(())
}

fn process_add_collateral_type<'a, 'b>(
    program_id: &Pubkey,
    accounts: &'a [AccountInfo<'b>],
    asset_id: Pubkey,
    price_feed: Pubkey,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let authority_info = next_account_info(account_info_iter)?;
    let config_info = next_account_info(account_info_iter)?;
    let vault_info = next_account_info(account_info_iter)?;
    let asset_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;

    if !authority_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut config = load_config(program_id, config_info)?;
    config.check_authority(authority_info.key)?;

    let decimals = collateral_decimals(&asset_id, asset_info)?;
    config.add_collateral_type(
        authority_info.key,
        CollateralAsset::new(asset_id, price_feed, decimals),
    )?;
    config.last_update = Clock::get()?.unix_timestamp;
    store(&config, config_info)?;

    open_vault(program_id, authority_info, vault_info, system_program_info, &asset_id)?;
    if AssetKind::of(&asset_id) == AssetKind::Native {
        let sol_vault_info = next_account_info(account_info_iter)?;
        fund_sol_vault(program_id, authority_info, sol_vault_info, system_program_info)?;
    }

    msg!("Collateral type {} approved with feed {}", asset_id, price_feed);
    Ok(())
}

fn process_update_risk_parameters<'a, 'b>(
    program_id: &Pubkey,
    accounts: &'a [AccountInfo<'b>],
    update: RiskParameterUpdate,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let authority_info = next_account_info(account_info_iter)?;
    let config_info = next_account_info(account_info_iter)?;

    if !authority_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut config = load_config(program_id, config_info)?;
    config.update_risk_parameters(authority_info.key, &update)?;
    config.last_update = Clock::get()?.unix_timestamp;
    store(&config, config_info)?;

    msg!("Risk parameters updated: {:?}", config.params);
    Ok(())
}

fn process_deposit_collateral<'a, 'b>(
    program_id: &Pubkey,
    accounts: &'a [AccountInfo<'b>],
    amount: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let owner_info = next_account_info(account_info_iter)?;
    let config_info = next_account_info(account_info_iter)?;
    let position_info = next_account_info(account_info_iter)?;
    let vault_info = next_account_info(account_info_iter)?;
    let source_info = next_account_info(account_info_iter)?;
    let custody_info = next_account_info(account_info_iter)?;
    let token_program_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;

    if !owner_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let config = load_config(program_id, config_info)?;
    let vault = load_vault(program_id, vault_info)?;
    let asset_id = vault.asset_id;

    // Positions are created lazily on first deposit
    let position_bump = verify_pda(position_info, PositionPDA::derive(program_id, owner_info.key))?;
    let position = if position_info.data_is_empty() {
        create_pda_account(
            program_id,
            owner_info,
            position_info,
            system_program_info,
            Position::LEN,
            &[POSITION_SEED, owner_info.key.as_ref(), &[position_bump]],
        )?;
        Position::new(*owner_info.key, position_bump)
    } else {
        load_position(program_id, position_info)?
    };

    let mut ledger = PositionLedger::new();
    ledger.insert(position);
    let mut vaults = VaultRegistry::new();
    vaults.insert(vault);

    let effects = Controller::new(&config).deposit_collateral(
        &mut ledger,
        &mut vaults,
        owner_info.key,
        &asset_id,
        amount,
    )?;

    let mut custody = CpiCustody::new(program_id, owner_info, token_program_info)?
        .with_system_program(system_program_info)?
        .with_collateral(CollateralLeg {
            asset_id,
            custody: custody_info,
            counterparty: source_info,
        });
    apply_effects(&mut custody, &effects)?;

    commit(ledger, vaults, position_info, &[(asset_id, vault_info)])
}

fn process_withdraw_collateral<'a, 'b>(
    program_id: &Pubkey,
    accounts: &'a [AccountInfo<'b>],
    amount: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let owner_info = next_account_info(account_info_iter)?;
    let config_info = next_account_info(account_info_iter)?;
    let position_info = next_account_info(account_info_iter)?;
    let vault_info = next_account_info(account_info_iter)?;
    let destination_info = next_account_info(account_info_iter)?;
    let custody_info = next_account_info(account_info_iter)?;
    let vault_authority_info = next_account_info(account_info_iter)?;
    let token_program_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;
    let price_feeds = account_info_iter.as_slice();

    if !owner_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let config = load_config(program_id, config_info)?;
    let vault = load_vault(program_id, vault_info)?;
    let asset_id = vault.asset_id;

    verify_pda(position_info, PositionPDA::derive(program_id, owner_info.key))?;
    let mut ledger = PositionLedger::new();
    if !position_info.data_is_empty() {
        ledger.insert(load_position(program_id, position_info)?);
    }
    let mut vaults = VaultRegistry::new();
    vaults.insert(vault);

    let source = AccountPriceSource::new(price_feeds);
    let valuation = Valuation::new(&config, &source, Clock::get()?.unix_timestamp);
    let effects = Controller::new(&config).withdraw_collateral(
        &valuation,
        &mut ledger,
        &mut vaults,
        owner_info.key,
        &asset_id,
        amount,
    )?;

    let mut custody = CpiCustody::new(program_id, owner_info, token_program_info)?
        .with_system_program(system_program_info)?
        .with_vault_authority(vault_authority_info)
        .with_collateral(CollateralLeg {
            asset_id,
            custody: custody_info,
            counterparty: destination_info,
        });
    apply_effects(&mut custody, &effects)?;

    commit(ledger, vaults, position_info, &[(asset_id, vault_info)])
}

fn process_mint_synthetic<'a, 'b>(
    program_id: &Pubkey,
    accounts: &'a [AccountInfo<'b>],
    amount: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let owner_info = next_account_info(account_info_iter)?;
    let config_info = next_account_info(account_info_iter)?;
    let position_info = next_account_info(account_info_iter)?;
    let synthetic_mint_info = next_account_info(account_info_iter)?;
    let holder_info = next_account_info(account_info_iter)?;
    let mint_authority_info = next_account_info(account_info_iter)?;
    let token_program_info = next_account_info(account_info_iter)?;
    let price_feeds = account_info_iter.as_slice();

    if !owner_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let config = load_config(program_id, config_info)?;
    check_synthetic_mint(&config, synthetic_mint_info)?;

    verify_pda(position_info, PositionPDA::derive(program_id, owner_info.key))?;
    let mut ledger = PositionLedger::new();
    if !position_info.data_is_empty() {
        ledger.insert(load_position(program_id, position_info)?);
    }

    let source = AccountPriceSource::new(price_feeds);
    let valuation = Valuation::new(&config, &source, Clock::get()?.unix_timestamp);
    let effects =
        Controller::new(&config).mint_synthetic(&valuation, &mut ledger, owner_info.key, amount)?;

    let mut custody = CpiCustody::new(program_id, owner_info, token_program_info)?
        .with_synthetic(SyntheticLeg {
            mint: synthetic_mint_info,
            holder: holder_info,
            mint_authority: Some(mint_authority_info),
        });
    apply_effects(&mut custody, &effects)?;

    commit(ledger, VaultRegistry::new(), position_info, &[])
}

fn process_burn_synthetic<'a, 'b>(
    program_id: &Pubkey,
    accounts: &'a [AccountInfo<'b>],
    amount: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let owner_info = next_account_info(account_info_iter)?;
    let config_info = next_account_info(account_info_iter)?;
    let position_info = next_account_info(account_info_iter)?;
    let synthetic_mint_info = next_account_info(account_info_iter)?;
    let holder_info = next_account_info(account_info_iter)?;
    let token_program_info = next_account_info(account_info_iter)?;

    if !owner_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let config = load_config(program_id, config_info)?;
    check_synthetic_mint(&config, synthetic_mint_info)?;

    verify_pda(position_info, PositionPDA::derive(program_id, owner_info.key))?;
    let mut ledger = PositionLedger::new();
    if !position_info.data_is_empty() {
        ledger.insert(load_position(program_id, position_info)?);
    }

    let effects = Controller::new(&config).burn_synthetic(&mut ledger, owner_info.key, amount)?;

    let mut custody = CpiCustody::new(program_id, owner_info, token_program_info)?
        .with_synthetic(SyntheticLeg {
            mint: synthetic_mint_info,
            holder: holder_info,
            mint_authority: None,
        });
    apply_effects(&mut custody, &effects)?;

    commit(ledger, VaultRegistry::new(), position_info, &[])
}

fn process_liquidate<'a, 'b>(
    program_id: &Pubkey,
    accounts: &'a [AccountInfo<'b>],
    repay_amount: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let liquidator_info = next_account_info(account_info_iter)?;
    let config_info = next_account_info(account_info_iter)?;
    let position_info = next_account_info(account_info_iter)?;
    let synthetic_mint_info = next_account_info(account_info_iter)?;
    let holder_info = next_account_info(account_info_iter)?;
    let vault_authority_info = next_account_info(account_info_iter)?;
    let token_program_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;
    let collateral_infos = account_info_iter.as_slice();

    if !liquidator_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    // [price feed, vault, custody, destination] per asset
    if collateral_infos.len() % 4 != 0 {
        return Err(ProgramError::NotEnoughAccountKeys);
    }

    let config = load_config(program_id, config_info)?;
    check_synthetic_mint(&config, synthetic_mint_info)?;

    if position_info.data_is_empty() {
        return Err(DscError::PositionNotFound.into());
    }
    let position = load_position(program_id, position_info)?;
    verify_pda(position_info, PositionPDA::derive(program_id, &position.owner))?;
    let target = position.owner;

    let mut custody = CpiCustody::new(program_id, liquidator_info, token_program_info)?
        .with_system_program(system_program_info)?
        .with_vault_authority(vault_authority_info)
        .with_synthetic(SyntheticLeg {
            mint: synthetic_mint_info,
            holder: holder_info,
            mint_authority: None,
        });

    let mut vaults = VaultRegistry::new();
    let mut vault_infos = Vec::with_capacity(collateral_infos.len() / 4);
    for group in collateral_infos.chunks(4) {
        let (vault_info, custody_info, destination_info) = (&group[1], &group[2], &group[3]);
        let vault = load_vault(program_id, vault_info)?;
        custody = custody.with_collateral(CollateralLeg {
            asset_id: vault.asset_id,
            custody: custody_info,
            counterparty: destination_info,
        });
        vault_infos.push((vault.asset_id, vault_info));
        vaults.insert(vault);
    }

    // Every asset the target holds is seized, so every vault must be present
    if let Some(missing) = position
        .nonzero_balances()
        .find(|balance| vaults.get(&balance.asset_id).is_none())
    {
        msg!("Vault accounts for {} not supplied", missing.asset_id);
        return Err(ProgramError::NotEnoughAccountKeys);
    }

    let mut ledger = PositionLedger::new();
    ledger.insert(position);

    let source = AccountPriceSource::new(collateral_infos);
    let valuation = Valuation::new(&config, &source, Clock::get()?.unix_timestamp);
    let liquidation = Controller::new(&config).liquidate(
        &valuation,
        &mut ledger,
        &mut vaults,
        liquidator_info.key,
        &target,
        repay_amount,
    )?;

    apply_effects(&mut custody, &liquidation.effects)?;

    commit(ledger, vaults, position_info, &vault_infos)
}

/// Write staged state back to its accounts
fn commit(
    ledger: PositionLedger,
    vaults: VaultRegistry,
    position_info: &AccountInfo,
    vault_infos: &[(Pubkey, &AccountInfo)],
) -> ProgramResult {
    for position in ledger.into_positions() {
        store(&position, position_info)?;
    }

    for (asset_id, vault_info) in vault_infos {
        let vault = vaults.get(asset_id).ok_or(DscError::InvalidAccountData)?;
        store(vault, vault_info)?;
    }

    Ok(())
}

fn open_vault<'a, 'b>(
    program_id: &Pubkey,
    payer_info: &'a AccountInfo<'b>,
    vault_info: &'a AccountInfo<'b>,
    system_program_info: &'a AccountInfo<'b>,
    asset_id: &Pubkey,
) -> ProgramResult {
    let bump = verify_pda(vault_info, VaultPDA::derive(program_id, asset_id))?;
    if !vault_info.data_is_empty() {
        return Err(DscError::AlreadyInitialized.into());
    }

    create_pda_account(
        program_id,
        payer_info,
        vault_info,
        system_program_info,
        Vault::LEN,
        &[VAULT_SEED, asset_id.as_ref(), &[bump]],
    )?;
    store(&Vault::new(*asset_id, bump), vault_info)
}

/// Top up the sol vault to the rent-exempt minimum. The buffer belongs to no
/// position and is not counted in the native vault's held balance.
fn fund_sol_vault<'a, 'b>(
    program_id: &Pubkey,
    payer_info: &'a AccountInfo<'b>,
    sol_vault_info: &'a AccountInfo<'b>,
    system_program_info: &'a AccountInfo<'b>,
) -> ProgramResult {
    verify_pda(sol_vault_info, SolVaultPDA::derive(program_id))?;
    if *system_program_info.key != system_program::id() {
        return Err(ProgramError::IncorrectProgramId);
    }

    let shortfall = Rent::get()?
        .minimum_balance(0)
        .saturating_sub(sol_vault_info.lamports());
    if shortfall == 0 {
        return Ok(());
    }

    invoke(
        &system_instruction::transfer(payer_info.key, sol_vault_info.key, shortfall),
        &[
            payer_info.clone(),
            sol_vault_info.clone(),
            system_program_info.clone(),
        ],
    )?;
    msg!("Sol vault funded with {} lamports of rent reserve", shortfall);
    Ok(())
}

fn create_pda_account<'a, 'b>(
    program_id: &Pubkey,
    payer_info: &'a AccountInfo<'b>,
    account_info: &'a AccountInfo<'b>,
    system_program_info: &'a AccountInfo<'b>,
    space: usize,
    seeds: &[&[u8]],
) -> ProgramResult {
    if *system_program_info.key != system_program::id() {
        return Err(ProgramError::IncorrectProgramId);
    }

    let lamports = Rent::get()?.minimum_balance(space);
    invoke_signed(
        &system_instruction::create_account(
            payer_info.key,
            account_info.key,
            lamports,
            space as u64,
            program_id,
        ),
        &[
            payer_info.clone(),
            account_info.clone(),
            system_program_info.clone(),
        ],
        &[seeds],
    )
}

fn load<T: BorshDeserialize>(program_id: &Pubkey, account: &AccountInfo) -> Result<T, ProgramError> {
    if account.owner != program_id {
        return Err(ProgramError::IncorrectProgramId);
    }
    let data = account.try_borrow_data()?;
    let mut cursor: &[u8] = &data;
    T::deserialize(&mut cursor).map_err(|_| DscError::InvalidAccountData.into())
}

fn store<T: BorshSerialize>(value: &T, account: &AccountInfo) -> ProgramResult {
    value
        .serialize(&mut &mut account.try_borrow_mut_data()?[..])
        .map_err(|_| DscError::InvalidAccountData.into())
}

fn load_config(program_id: &Pubkey, config_info: &AccountInfo) -> Result<SystemConfig, ProgramError> {
    verify_pda(config_info, ConfigPDA::derive(program_id))?;
    if config_info.data_is_empty() {
        return Err(DscError::NotInitialized.into());
    }
    let config: SystemConfig = load(program_id, config_info)?;
    if config.discriminator != SystemConfig::DISCRIMINATOR || !config.is_initialized {
        return Err(DscError::NotInitialized.into());
    }
    Ok(config)
}

fn load_vault(program_id: &Pubkey, vault_info: &AccountInfo) -> Result<Vault, ProgramError> {
    let vault: Vault = load(program_id, vault_info)?;
    vault.validate()?;
    verify_pda(vault_info, VaultPDA::derive(program_id, &vault.asset_id))?;
    Ok(vault)
}

fn load_position(program_id: &Pubkey, position_info: &AccountInfo) -> Result<Position, ProgramError> {
    let position: Position = load(program_id, position_info)?;
    position.validate()?;
    Ok(position)
}

fn load_mint(mint_info: &AccountInfo) -> Result<Mint, ProgramError> {
    if *mint_info.owner != spl_token::id() {
        msg!("{} is not an SPL token mint", mint_info.key);
        return Err(DscError::InvalidConfig.into());
    }
    Mint::unpack(&mint_info.try_borrow_data()?)
}

/// Decimals of a collateral asset, read from its mint
fn collateral_decimals(asset_id: &Pubkey, asset_info: &AccountInfo) -> Result<u8, ProgramError> {
    if asset_info.key != asset_id {
        msg!("Expected collateral account {}, got {}", asset_id, asset_info.key);
        return Err(DscError::InvalidConfig.into());
    }
    if *asset_id == system_program::id() {
        return Ok(NATIVE_DECIMALS);
    }
    Ok(load_mint(asset_info)?.decimals)
}

fn check_synthetic_mint(config: &SystemConfig, mint_info: &AccountInfo) -> ProgramResult {
    if *mint_info.key != config.synthetic_mint {
        return Err(DscError::CustodyMismatch.into());
    }
    Ok(())
}
