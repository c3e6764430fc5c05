use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::{
    constants::*,
    error::DscError,
};

/// Custody model of a collateral asset
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// SPL token held in a token account owned by the vault authority PDA
    SplToken,
    /// Lamports held by the sol vault PDA
    Native,
}

impl AssetKind {
    /// The native asset is identified by the system program id.
    pub fn of(asset_id: &Pubkey) -> Self {
        if *asset_id == system_program::id() {
            AssetKind::Native
        } else {
            AssetKind::SplToken
        }
    }
}

/// Approved collateral descriptor
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralAsset {
    /// Token mint (system program id for the native asset)
    pub asset_id: Pubkey,

    /// Price feed account
    pub price_feed: Pubkey,

    /// Token decimals, kept as-is in position balances
    pub decimals: u8,

    pub kind: AssetKind,
}

impl CollateralAsset {
    pub const LEN: usize = 32 + 32 + 1 + 1;

    pub fn new(asset_id: Pubkey, price_feed: Pubkey, decimals: u8) -> Self {
        let kind = AssetKind::of(&asset_id);
        let decimals = match kind {
            AssetKind::Native => NATIVE_DECIMALS,
            AssetKind::SplToken => decimals,
        };

        Self {
            asset_id,
            price_feed,
            decimals,
            kind,
        }
    }

    pub fn native(price_feed: Pubkey) -> Self {
        Self::new(system_program::id(), price_feed, NATIVE_DECIMALS)
    }
}

/// What a partial liquidation has to achieve
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidationPolicy {
    /// Health must strictly improve; it may stay under the minimum
    Partial,
    /// Health must strictly improve and reach the minimum
    RestoreHealth,
}

/// Risk parameters
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskParameters {
    /// Minimum collateral value / debt (fixed point 6 decimals, 1_500_000 = 150%)
    pub min_health_ratio: u64,

    /// Liquidator reward in basis points (1_000 = 10%)
    pub liquidation_bonus_bps: u16,

    /// Maximum accepted price age in seconds
    pub max_price_age: i64,

    pub liquidation_policy: LiquidationPolicy,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            min_health_ratio: DEFAULT_MIN_HEALTH_RATIO,
            liquidation_bonus_bps: DEFAULT_LIQUIDATION_BONUS_BPS,
            max_price_age: DEFAULT_MAX_PRICE_AGE,
            liquidation_policy: LiquidationPolicy::Partial,
        }
    }
}

impl RiskParameters {
    pub const LEN: usize = 8 + 2 + 8 + 1;

    pub fn validate(&self) -> ProgramResult {
        if self.min_health_ratio < RATIO_PRECISION {
            msg!("Minimum health ratio below 100%: {}", self.min_health_ratio);
            return Err(DscError::InvalidConfig.into());
        }

        if self.liquidation_bonus_bps > MAX_LIQUIDATION_BONUS_BPS {
            msg!("Liquidation bonus too large: {} bps", self.liquidation_bonus_bps);
            return Err(DscError::InvalidConfig.into());
        }

        if self.max_price_age <= 0 {
            msg!("Maximum price age must be positive");
            return Err(DscError::InvalidConfig.into());
        }

        Ok(())
    }
}

/// Partial update of the risk parameters; `None` keeps the current value
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiskParameterUpdate {
    pub min_health_ratio: Option<u64>,
    pub liquidation_bonus_bps: Option<u16>,
    pub max_price_age: Option<i64>,
    pub liquidation_policy: Option<LiquidationPolicy>,
}

/// Singleton system configuration
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct SystemConfig {
    /// Account discriminator
    pub discriminator: [u8; 8],

    /// Is initialized flag
    pub is_initialized: bool,

    /// Authority that can update config
    pub authority: Pubkey,

    /// Synthetic token mint
    pub synthetic_mint: Pubkey,

    /// Synthetic token decimals; one whole token is valued at $1
    pub synthetic_decimals: u8,

    /// Approved collateral, unique per asset id
    pub approved_collateral: Vec<CollateralAsset>,

    /// Risk parameters
    pub params: RiskParameters,

    /// PDA bump
    pub bump: u8,

    /// Last update timestamp
    pub last_update: UnixTimestamp,
}

impl SystemConfig {
    pub const DISCRIMINATOR: [u8; 8] = *b"DSC_CONF";

    pub const LEN: usize = 8 + // discriminator
        1 + // is_initialized
        32 + // authority
        32 + // synthetic_mint
        1 + // synthetic_decimals
        4 + CollateralAsset::LEN * MAX_COLLATERAL_TYPES + // approved_collateral
        RiskParameters::LEN +
        1 + // bump
        8 + // last_update
        64; // padding for growth

    pub fn new(
        authority: Pubkey,
        synthetic_mint: Pubkey,
        synthetic_decimals: u8,
        approved_collateral: Vec<CollateralAsset>,
        params: RiskParameters,
    ) -> Result<Self, ProgramError> {
        let config = Self {
            discriminator: Self::DISCRIMINATOR,
            is_initialized: true,
            authority,
            synthetic_mint,
            synthetic_decimals,
            approved_collateral,
            params,
            bump: 0,
            last_update: 0,
        };

        config.validate()?;
        Ok(config)
    }

    /// Build from the parallel token / feed / decimals lists used by the
    /// `Initialize` instruction.
    pub fn from_lists(
        authority: Pubkey,
        synthetic_mint: Pubkey,
        synthetic_decimals: u8,
        collateral_tokens: &[Pubkey],
        price_feeds: &[Pubkey],
        decimals: &[u8],
        params: RiskParameters,
    ) -> Result<Self, ProgramError> {
        if collateral_tokens.len() != price_feeds.len()
            || collateral_tokens.len() != decimals.len()
        {
            msg!(
                "Token addresses and price feed addresses must have the same length: {} != {}",
                collateral_tokens.len(),
                price_feeds.len()
            );
            return Err(DscError::InvalidConfig.into());
        }

        let approved_collateral = collateral_tokens
            .iter()
            .zip(price_feeds)
            .zip(decimals)
            .map(|((asset_id, feed), decimals)| CollateralAsset::new(*asset_id, *feed, *decimals))
            .collect();

        Self::new(
            authority,
            synthetic_mint,
            synthetic_decimals,
            approved_collateral,
            params,
        )
    }

    pub fn find_asset(&self, asset_id: &Pubkey) -> Option<&CollateralAsset> {
        self.approved_collateral
            .iter()
            .find(|asset| asset.asset_id == *asset_id)
    }

    pub fn require_asset(&self, asset_id: &Pubkey) -> Result<&CollateralAsset, ProgramError> {
        self.find_asset(asset_id).ok_or_else(|| {
            msg!("Asset {} is not approved as collateral", asset_id);
            DscError::AssetNotApproved.into()
        })
    }

    pub fn check_authority(&self, caller: &Pubkey) -> ProgramResult {
        if self.authority != *caller {
            return Err(DscError::Unauthorized.into());
        }
        Ok(())
    }

    /// Append a collateral type. Existing entries never change.
    pub fn add_collateral_type(
        &mut self,
        caller: &Pubkey,
        asset: CollateralAsset,
    ) -> ProgramResult {
        self.check_authority(caller)?;

        if self.find_asset(&asset.asset_id).is_some() {
            msg!("Asset {} already approved", asset.asset_id);
            return Err(DscError::InvalidConfig.into());
        }

        if self.approved_collateral.len() >= MAX_COLLATERAL_TYPES {
            msg!("Collateral list is full");
            return Err(DscError::InvalidConfig.into());
        }

        if asset.decimals > MAX_DECIMALS || asset.kind != AssetKind::of(&asset.asset_id) {
            return Err(DscError::InvalidConfig.into());
        }

        self.approved_collateral.push(asset);
        Ok(())
    }

    pub fn update_risk_parameters(
        &mut self,
        caller: &Pubkey,
        update: &RiskParameterUpdate,
    ) -> ProgramResult {
        self.check_authority(caller)?;

        let mut params = self.params;
        if let Some(value) = update.min_health_ratio {
            params.min_health_ratio = value;
        }
        if let Some(value) = update.liquidation_bonus_bps {
            params.liquidation_bonus_bps = value;
        }
        if let Some(value) = update.max_price_age {
            params.max_price_age = value;
        }
        if let Some(value) = update.liquidation_policy {
            params.liquidation_policy = value;
        }

        params.validate()?;
        self.params = params;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ProgramResult {
        if self.discriminator != Self::DISCRIMINATOR {
            return Err(ProgramError::InvalidAccountData);
        }

        if !self.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }

        if self.approved_collateral.is_empty()
            || self.approved_collateral.len() > MAX_COLLATERAL_TYPES
        {
            msg!("Collateral list must hold 1..={} entries", MAX_COLLATERAL_TYPES);
            return Err(DscError::InvalidConfig.into());
        }

        if self.synthetic_decimals > MAX_DECIMALS {
            return Err(DscError::InvalidConfig.into());
        }

        for (index, asset) in self.approved_collateral.iter().enumerate() {
            if asset.decimals > MAX_DECIMALS || asset.kind != AssetKind::of(&asset.asset_id) {
                return Err(DscError::InvalidConfig.into());
            }

            let duplicated = self.approved_collateral[..index]
                .iter()
                .any(|earlier| earlier.asset_id == asset.asset_id);
            if duplicated {
                msg!("Duplicate collateral asset {}", asset.asset_id);
                return Err(DscError::InvalidConfig.into());
            }
        }

        self.params.validate()
    }
}
