//! Price oracle adapter
//!
//! Normalizes raw feed readings into a canonical `Price` and rejects stale or
//! out-of-domain data. Nothing is cached: every `get_price` call reads the
//! source again.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo,
    clock::UnixTimestamp,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{
    constants::MIN_PRICE_EXPO,
    error::DscError,
    state::SystemConfig,
};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Unknown,
    Trading,
    Halted,
}

/// Raw reading as published by the feed: `price * 10^expo` USD per whole token
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedReading {
    pub price: i64,
    pub conf: u64,
    pub expo: i32,
    pub publish_time: UnixTimestamp,
    pub status: FeedStatus,
}

/// Validated price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Price {
    pub mantissa: u64,
    pub expo: i32,
    pub conf: u64,
    pub published_at: UnixTimestamp,
}

/// Read interface of an external price provider
pub trait PriceSource {
    fn read(&self, price_feed: &Pubkey) -> Result<FeedReading, ProgramError>;
}

/// Resolves assets to their configured feed and validates what it returns
pub struct OracleAdapter<'a, S: PriceSource + ?Sized> {
    config: &'a SystemConfig,
    source: &'a S,
    now: UnixTimestamp,
}

impl<'a, S: PriceSource + ?Sized> OracleAdapter<'a, S> {
    pub fn new(config: &'a SystemConfig, source: &'a S, now: UnixTimestamp) -> Self {
        Self { config, source, now }
    }

    pub fn now(&self) -> UnixTimestamp {
        self.now
    }

    pub fn get_price(&self, asset_id: &Pubkey) -> Result<Price, ProgramError> {
        let asset = self.config.find_asset(asset_id).ok_or_else(|| {
            msg!("No price feed registered for {}", asset_id);
            DscError::UnknownAsset
        })?;

        let reading = self.source.read(&asset.price_feed)?;
        normalize(&reading, self.now, self.config.params.max_price_age)
    }
}

/// Validate a raw reading against the clock
pub fn normalize(
    reading: &FeedReading,
    now: UnixTimestamp,
    max_price_age: i64,
) -> Result<Price, ProgramError> {
    if reading.status != FeedStatus::Trading {
        msg!("Price feed is not trading: {:?}", reading.status);
        return Err(DscError::MalformedFeed.into());
    }

    if reading.price <= 0 {
        msg!("Invalid price value: {}", reading.price);
        return Err(DscError::MalformedFeed.into());
    }

    if reading.expo > 0 || reading.expo < MIN_PRICE_EXPO {
        msg!("Invalid price exponent: {}", reading.expo);
        return Err(DscError::MalformedFeed.into());
    }

    // Readings from the future count as fresh
    let age = now.saturating_sub(reading.publish_time);
    if age > max_price_age {
        msg!("Oracle data is stale: {} seconds old", age);
        return Err(DscError::StaleFeed.into());
    }

    Ok(Price {
        mantissa: reading.price as u64,
        expo: reading.expo,
        conf: reading.conf,
        published_at: reading.publish_time,
    })
}

/// On-chain layout of a price feed account
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct PriceFeedAccount {
    pub discriminator: [u8; 8],
    pub reading: FeedReading,
}

impl PriceFeedAccount {
    pub const DISCRIMINATOR: [u8; 8] = *b"DSC_FEED";

    pub const LEN: usize = 8 + 8 + 8 + 4 + 8 + 1;

    pub fn new(reading: FeedReading) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            reading,
        }
    }
}

/// Price source backed by the feed accounts passed to an instruction
pub struct AccountPriceSource<'a, 'b> {
    accounts: &'a [AccountInfo<'b>],
}

impl<'a, 'b> AccountPriceSource<'a, 'b> {
    pub fn new(accounts: &'a [AccountInfo<'b>]) -> Self {
        Self { accounts }
    }
}

impl PriceSource for AccountPriceSource<'_, '_> {
    fn read(&self, price_feed: &Pubkey) -> Result<FeedReading, ProgramError> {
        let account = self
            .accounts
            .iter()
            .find(|account| account.key == price_feed)
            .ok_or_else(|| {
                msg!("Price feed account {} not supplied", price_feed);
                DscError::UnknownAsset
            })?;

        if account.data_is_empty() {
            msg!("Oracle account is empty");
            return Err(DscError::MalformedFeed.into());
        }

        let data = account.try_borrow_data()?;
        let mut cursor: &[u8] = &data;
        let feed = PriceFeedAccount::deserialize(&mut cursor)
            .map_err(|_| DscError::MalformedFeed)?;

        if feed.discriminator != PriceFeedAccount::DISCRIMINATOR {
            return Err(DscError::MalformedFeed.into());
        }

        Ok(feed.reading)
    }
}
