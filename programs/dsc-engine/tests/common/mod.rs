#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap};

use dsc_engine::{
    custody::{CustodyEffect, TokenCustody},
    engine::Engine,
    oracle::{FeedReading, FeedStatus, PriceSource},
    state::{CollateralAsset, RiskParameters, SystemConfig},
    DscError,
};
use solana_program::{entrypoint::ProgramResult, program_error::ProgramError, pubkey::Pubkey};

pub const NOW: i64 = 1_700_000_000;
pub const SATS: u64 = 100_000_000;
pub const WEI: u64 = 1_000_000_000_000_000_000;
/// One whole synthetic token (6 decimals)
pub const USD: u64 = 1_000_000;

#[derive(Default)]
pub struct MockFeeds {
    readings: RefCell<HashMap<Pubkey, FeedReading>>,
}

impl MockFeeds {
    pub fn set_price(&self, feed: &Pubkey, usd: i64) {
        self.set_reading(
            feed,
            FeedReading {
                price: usd * 100_000_000,
                conf: 0,
                expo: -8,
                publish_time: NOW,
                status: FeedStatus::Trading,
            },
        );
    }

    pub fn set_reading(&self, feed: &Pubkey, reading: FeedReading) {
        self.readings.borrow_mut().insert(*feed, reading);
    }

    pub fn reading(&self, feed: &Pubkey) -> Option<FeedReading> {
        self.readings.borrow().get(feed).copied()
    }

    pub fn clear(&self) {
        self.readings.borrow_mut().clear();
    }
}

impl PriceSource for MockFeeds {
    fn read(&self, price_feed: &Pubkey) -> Result<FeedReading, ProgramError> {
        self.reading(price_feed)
            .ok_or_else(|| DscError::UnknownAsset.into())
    }
}

#[derive(Default)]
pub struct RecordingCustody {
    pub applied: Vec<CustodyEffect>,
    pub fail: bool,
}

impl RecordingCustody {
    fn record(&mut self, effect: CustodyEffect) -> ProgramResult {
        if self.fail {
            return Err(ProgramError::InsufficientFunds);
        }
        self.applied.push(effect);
        Ok(())
    }
}

impl TokenCustody for RecordingCustody {
    fn transfer_in(&mut self, asset_id: &Pubkey, amount: u64, from: &Pubkey) -> ProgramResult {
        self.record(CustodyEffect::TransferIn {
            asset_id: *asset_id,
            amount,
            from: *from,
        })
    }

    fn transfer_out(&mut self, asset_id: &Pubkey, amount: u64, to: &Pubkey) -> ProgramResult {
        self.record(CustodyEffect::TransferOut {
            asset_id: *asset_id,
            amount,
            to: *to,
        })
    }

    fn mint_synthetic(&mut self, amount: u64, to: &Pubkey) -> ProgramResult {
        self.record(CustodyEffect::MintSynthetic { amount, to: *to })
    }

    fn burn_synthetic(&mut self, amount: u64, from: &Pubkey) -> ProgramResult {
        self.record(CustodyEffect::BurnSynthetic { amount, from: *from })
    }
}

/// WBTC at $60,000 and WETH at $3,000 with a 150% minimum health ratio
pub struct Market {
    pub engine: Engine,
    pub feeds: MockFeeds,
    pub custody: RecordingCustody,
    pub authority: Pubkey,
    pub wbtc: CollateralAsset,
    pub weth: CollateralAsset,
}

pub fn market() -> Market {
    market_with(RiskParameters::default())
}

pub fn market_with(params: RiskParameters) -> Market {
    let authority = Pubkey::new_unique();
    let wbtc = CollateralAsset::new(Pubkey::new_unique(), Pubkey::new_unique(), 8);
    let weth = CollateralAsset::new(Pubkey::new_unique(), Pubkey::new_unique(), 18);

    let config = SystemConfig::from_lists(
        authority,
        Pubkey::new_unique(),
        6,
        &[wbtc.asset_id, weth.asset_id],
        &[wbtc.price_feed, weth.price_feed],
        &[8, 18],
        params,
    )
    .unwrap();

    let feeds = MockFeeds::default();
    feeds.set_price(&wbtc.price_feed, 60_000);
    feeds.set_price(&weth.price_feed, 3_000);

    Market {
        engine: Engine::initialize(config).unwrap(),
        feeds,
        custody: RecordingCustody::default(),
        authority,
        wbtc,
        weth,
    }
}

impl Market {
    pub fn deposit(&mut self, owner: &Pubkey, asset: &Pubkey, amount: u64) -> ProgramResult {
        self.engine
            .deposit_collateral(&mut self.custody, owner, asset, amount)
    }

    pub fn withdraw(&mut self, owner: &Pubkey, asset: &Pubkey, amount: u64) -> ProgramResult {
        self.engine
            .withdraw_collateral(&self.feeds, NOW, &mut self.custody, owner, asset, amount)
    }

    pub fn mint(&mut self, owner: &Pubkey, amount: u64) -> ProgramResult {
        self.engine
            .mint_synthetic(&self.feeds, NOW, &mut self.custody, owner, amount)
    }

    pub fn burn(&mut self, owner: &Pubkey, amount: u64) -> ProgramResult {
        self.engine.burn_synthetic(&mut self.custody, owner, amount)
    }

    pub fn debt(&self, owner: &Pubkey) -> u64 {
        self.engine.position(owner).map(|p| p.debt).unwrap_or(0)
    }

    pub fn balance(&self, owner: &Pubkey, asset: &Pubkey) -> u64 {
        self.engine
            .position(owner)
            .map(|p| p.balance_of(asset))
            .unwrap_or(0)
    }

    pub fn held(&self, asset: &Pubkey) -> u64 {
        self.engine
            .vault(asset)
            .map(|v| v.total_held_balance)
            .unwrap_or(0)
    }
}
