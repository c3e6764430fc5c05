//! In-memory engine
//!
//! Owns the configuration, vault registry and position ledger and wraps each
//! public operation in an explicit transaction: the controller runs against
//! staged copies, custody effects are applied, and only then is the staged
//! state committed. Mutating operations take `&mut self`, so there is a single
//! writer and every health check sees the state immediately preceding commit.

use solana_program::{
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{
    controller::{Controller, Liquidation},
    custody::{apply_effects, CustodyEffect, TokenCustody},
    oracle::PriceSource,
    state::{
        CollateralAsset, Position, PositionLedger, RiskParameterUpdate, SystemConfig, Vault,
        VaultRegistry,
    },
    valuation::{HealthRatio, Valuation},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    config: SystemConfig,
    vaults: VaultRegistry,
    positions: PositionLedger,
}

impl Engine {
    /// Validate the configuration and open one empty vault per approved asset
    pub fn initialize(config: SystemConfig) -> Result<Self, ProgramError> {
        config.validate()?;

        let mut vaults = VaultRegistry::new();
        for asset in &config.approved_collateral {
            vaults.register(asset.asset_id, 0)?;
        }

        msg!(
            "Engine initialized with {} collateral types",
            config.approved_collateral.len()
        );

        Ok(Self {
            config,
            vaults,
            positions: PositionLedger::new(),
        })
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn vault(&self, asset_id: &Pubkey) -> Option<&Vault> {
        self.vaults.get(asset_id)
    }

    pub fn position(&self, owner: &Pubkey) -> Option<&Position> {
        self.positions.get(owner)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    pub fn health_ratio<S: PriceSource + ?Sized>(
        &self,
        source: &S,
        now: UnixTimestamp,
        owner: &Pubkey,
    ) -> Result<HealthRatio, ProgramError> {
        let position = self.positions.require(owner)?;
        Valuation::new(&self.config, source, now).health_ratio(position)
    }

    /// Approve a new collateral type and open its vault
    pub fn add_collateral_type(&mut self, caller: &Pubkey, asset: CollateralAsset) -> ProgramResult {
        let mut config = self.config.clone();
        config.add_collateral_type(caller, asset)?;

        let mut vaults = self.vaults.clone();
        vaults.register(asset.asset_id, 0)?;

        self.config = config;
        self.vaults = vaults;
        msg!("Collateral type {} approved", asset.asset_id);
        Ok(())
    }

    pub fn update_risk_parameters(
        &mut self,
        caller: &Pubkey,
        update: &RiskParameterUpdate,
    ) -> ProgramResult {
        self.config.update_risk_parameters(caller, update)?;
        msg!("Risk parameters updated: {:?}", self.config.params);
        Ok(())
    }

    pub fn deposit_collateral<C: TokenCustody + ?Sized>(
        &mut self,
        custody: &mut C,
        owner: &Pubkey,
        asset_id: &Pubkey,
        amount: u64,
    ) -> ProgramResult {
        self.transact(custody, owner, |config, ledger, vaults| {
            let effects = Controller::new(config)
                .deposit_collateral(ledger, vaults, owner, asset_id, amount)?;
            Ok(((), effects))
        })
    }

    pub fn withdraw_collateral<S: PriceSource + ?Sized, C: TokenCustody + ?Sized>(
        &mut self,
        source: &S,
        now: UnixTimestamp,
        custody: &mut C,
        owner: &Pubkey,
        asset_id: &Pubkey,
        amount: u64,
    ) -> ProgramResult {
        self.transact(custody, owner, |config, ledger, vaults| {
            let valuation = Valuation::new(config, source, now);
            let effects = Controller::new(config)
                .withdraw_collateral(&valuation, ledger, vaults, owner, asset_id, amount)?;
            Ok(((), effects))
        })
    }

    pub fn mint_synthetic<S: PriceSource + ?Sized, C: TokenCustody + ?Sized>(
        &mut self,
        source: &S,
        now: UnixTimestamp,
        custody: &mut C,
        owner: &Pubkey,
        amount: u64,
    ) -> ProgramResult {
        self.transact(custody, owner, |config, ledger, _| {
            let valuation = Valuation::new(config, source, now);
            let effects = Controller::new(config).mint_synthetic(&valuation, ledger, owner, amount)?;
            Ok(((), effects))
        })
    }

    pub fn burn_synthetic<C: TokenCustody + ?Sized>(
        &mut self,
        custody: &mut C,
        owner: &Pubkey,
        amount: u64,
    ) -> ProgramResult {
        self.transact(custody, owner, |config, ledger, _| {
            let effects = Controller::new(config).burn_synthetic(ledger, owner, amount)?;
            Ok(((), effects))
        })
    }

    pub fn liquidate<S: PriceSource + ?Sized, C: TokenCustody + ?Sized>(
        &mut self,
        source: &S,
        now: UnixTimestamp,
        custody: &mut C,
        liquidator: &Pubkey,
        target: &Pubkey,
        repay_amount: u64,
    ) -> Result<Liquidation, ProgramError> {
        self.transact(custody, target, |config, ledger, vaults| {
            let valuation = Valuation::new(config, source, now);
            let liquidation = Controller::new(config)
                .liquidate(&valuation, ledger, vaults, liquidator, target, repay_amount)?;
            let effects = liquidation.effects.clone();
            Ok((liquidation, effects))
        })
    }

    /// Every vault holds exactly the sum of the positions' balances of its asset
    pub fn is_reconciled(&self) -> bool {
        let vaults_match = self.vaults.iter().all(|vault| {
            let held = self
                .positions
                .iter()
                .map(|position| position.balance_of(&vault.asset_id) as u128)
                .sum::<u128>();
            held == vault.total_held_balance as u128
        });

        let no_orphans = self.positions.iter().all(|position| {
            position
                .nonzero_balances()
                .all(|balance| self.vaults.get(&balance.asset_id).is_some())
        });

        vaults_match && no_orphans
    }

    /// Run one operation against staged copies of `owner`'s position and the
    /// vault registry. State is committed only if the operation and every
    /// custody effect succeed.
    fn transact<T, C, F>(&mut self, custody: &mut C, owner: &Pubkey, op: F) -> Result<T, ProgramError>
    where
        C: TokenCustody + ?Sized,
        F: FnOnce(
            &SystemConfig,
            &mut PositionLedger,
            &mut VaultRegistry,
        ) -> Result<(T, Vec<CustodyEffect>), ProgramError>,
    {
        let mut ledger = PositionLedger::new();
        if let Some(position) = self.positions.get(owner) {
            ledger.insert(position.clone());
        }
        let mut vaults = self.vaults.clone();

        let (outcome, effects) = op(&self.config, &mut ledger, &mut vaults)?;
        apply_effects(custody, &effects)?;

        for position in ledger.into_positions() {
            self.positions.insert(position);
        }
        self.vaults = vaults;

        Ok(outcome)
    }
}
