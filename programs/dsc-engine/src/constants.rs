//! Protocol constants

/// Fixed point scale for health ratios (6 decimals, 1_000_000 = 100%)
pub const RATIO_PRECISION: u64 = 1_000_000;

/// Basis point denominator
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Default minimum health ratio (150%)
pub const DEFAULT_MIN_HEALTH_RATIO: u64 = 1_500_000;

/// Default liquidation bonus (10%)
pub const DEFAULT_LIQUIDATION_BONUS_BPS: u16 = 1_000;

/// Upper bound on the liquidation bonus (50%)
pub const MAX_LIQUIDATION_BONUS_BPS: u16 = 5_000;

/// Default maximum price age in seconds
pub const DEFAULT_MAX_PRICE_AGE: i64 = 60;

/// Maximum number of approved collateral types
pub const MAX_COLLATERAL_TYPES: usize = 10;

/// Decimals of the native asset (lamports)
pub const NATIVE_DECIMALS: u8 = 9;

/// Largest decimal precision accepted for any token
pub const MAX_DECIMALS: u8 = 18;

/// Most negative price exponent accepted from a feed
pub const MIN_PRICE_EXPO: i32 = -18;

/// PDA seeds
pub const CONFIG_SEED: &[u8] = b"dsc_state";
pub const POSITION_SEED: &[u8] = b"user_position";
pub const VAULT_SEED: &[u8] = b"vault";
pub const VAULT_AUTHORITY_SEED: &[u8] = b"vault_authority";
pub const SOL_VAULT_SEED: &[u8] = b"sol_vault";
pub const MINT_AUTHORITY_SEED: &[u8] = b"mint_authority";
