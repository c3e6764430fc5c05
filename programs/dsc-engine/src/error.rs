use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use solana_program::{
    decode_error::DecodeError,
    program_error::{PrintProgramError, ProgramError},
};
use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, FromPrimitive, PartialEq, Eq)]
pub enum DscError {
    #[error("Invalid configuration")]
    InvalidConfig = 0,

    #[error("Token not allowed as collateral")]
    AssetNotApproved = 1,

    #[error("Amount must be greater than zero")]
    InvalidAmount = 2,

    #[error("Account already initialized")]
    AlreadyInitialized = 3,

    #[error("Account not initialized")]
    NotInitialized = 4,

    #[error("Balance would go negative")]
    Overdraw = 5,

    #[error("Vault balance would go negative")]
    InsufficientVaultBalance = 6,

    #[error("Position not found")]
    PositionNotFound = 7,

    #[error("Health factor is broken")]
    HealthCheckFailed = 8,

    #[error("Price data stale")]
    StaleFeed = 9,

    #[error("No price feed registered for asset")]
    UnknownAsset = 10,

    #[error("Price feed reading out of domain")]
    MalformedFeed = 11,

    #[error("Invalid authority")]
    Unauthorized = 12,

    #[error("Health factor is sufficient")]
    PositionHealthy = 13,

    #[error("Repay amount exceeds outstanding debt")]
    ExcessiveRepay = 14,

    #[error("Health factor not improved after liquidation")]
    HealthNotImproved = 15,

    #[error("Arithmetic overflow")]
    MathOverflow = 16,

    #[error("Invalid PDA")]
    InvalidPda = 17,

    #[error("Invalid account data")]
    InvalidAccountData = 18,

    #[error("Custody account mismatch")]
    CustodyMismatch = 19,
}

/// Coarse error taxonomy surfaced to callers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    InsufficientFunds,
    HealthCheckFailed,
    OracleFailure,
    Unauthorized,
    InvalidLiquidation,
    Arithmetic,
    Account,
}

impl DscError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig
            | Self::AssetNotApproved
            | Self::InvalidAmount
            | Self::AlreadyInitialized
            | Self::NotInitialized => ErrorCategory::Configuration,
            Self::Overdraw | Self::InsufficientVaultBalance | Self::PositionNotFound => {
                ErrorCategory::InsufficientFunds
            }
            Self::HealthCheckFailed => ErrorCategory::HealthCheckFailed,
            Self::StaleFeed | Self::UnknownAsset | Self::MalformedFeed => {
                ErrorCategory::OracleFailure
            }
            Self::Unauthorized => ErrorCategory::Unauthorized,
            Self::PositionHealthy | Self::ExcessiveRepay | Self::HealthNotImproved => {
                ErrorCategory::InvalidLiquidation
            }
            Self::MathOverflow => ErrorCategory::Arithmetic,
            Self::InvalidPda | Self::InvalidAccountData | Self::CustodyMismatch => {
                ErrorCategory::Account
            }
        }
    }

    /// Only oracle failures may succeed on a later attempt without the
    /// caller changing the request.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::OracleFailure
    }

    /// Recover the engine error carried by a `ProgramError::Custom` code.
    pub fn from_program_error(error: &ProgramError) -> Option<Self> {
        match error {
            ProgramError::Custom(code) => Self::from_u32(*code),
            _ => None,
        }
    }
}

impl PrintProgramError for DscError {
    fn print<E>(&self) {
        use solana_program::msg;
        msg!("DscError: {}", self);
    }
}

impl From<DscError> for ProgramError {
    fn from(e: DscError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for DscError {
    fn type_of() -> &'static str {
        "DscError"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_code_roundtrip() {
        let error: ProgramError = DscError::HealthCheckFailed.into();
        assert_eq!(error, ProgramError::Custom(8));
        assert_eq!(
            DscError::from_program_error(&error),
            Some(DscError::HealthCheckFailed)
        );
        assert_eq!(
            DscError::from_program_error(&ProgramError::InvalidArgument),
            None
        );
    }

    #[test]
    fn test_only_oracle_failures_retry() {
        assert!(DscError::StaleFeed.is_retryable());
        assert!(DscError::MalformedFeed.is_retryable());
        assert!(DscError::UnknownAsset.is_retryable());
        assert!(!DscError::HealthCheckFailed.is_retryable());
        assert!(!DscError::Overdraw.is_retryable());
        assert!(!DscError::Unauthorized.is_retryable());
    }

    #[test]
    fn test_liquidation_errors_share_category() {
        for error in [
            DscError::PositionHealthy,
            DscError::ExcessiveRepay,
            DscError::HealthNotImproved,
        ] {
            assert_eq!(error.category(), ErrorCategory::InvalidLiquidation);
        }
    }
}
