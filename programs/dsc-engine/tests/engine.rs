mod common;

use common::*;
use dsc_engine::{
    custody::CustodyEffect,
    oracle::FeedStatus,
    state::{CollateralAsset, LiquidationPolicy, RiskParameterUpdate},
    valuation::{HealthRatio, Valuation},
    DscError, ErrorCategory,
};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

#[test]
fn test_mint_against_wbtc() {
    let mut market = market();
    let user = Pubkey::new_unique();
    let wbtc = market.wbtc.asset_id;

    market.deposit(&user, &wbtc, SATS / 2).unwrap();
    let position = market.engine.position(&user).unwrap();
    let value = Valuation::new(market.engine.config(), &market.feeds, NOW)
        .value_of(position)
        .unwrap();
    assert_eq!(value, 30_000 * USD as u128);

    market.mint(&user, 15_000 * USD).unwrap();
    assert_eq!(
        market.engine.health_ratio(&market.feeds, NOW, &user).unwrap(),
        HealthRatio::Finite(2_000_000)
    );

    // 30,000 / 21,000 is under 150%
    assert_eq!(
        market.mint(&user, 6_000 * USD),
        Err(DscError::HealthCheckFailed.into())
    );
    assert_eq!(market.debt(&user), 15_000 * USD);
    assert_eq!(
        market.custody.applied,
        vec![
            CustodyEffect::TransferIn {
                asset_id: wbtc,
                amount: SATS / 2,
                from: user,
            },
            CustodyEffect::MintSynthetic {
                amount: 15_000 * USD,
                to: user,
            },
        ]
    );
}

#[test]
fn test_liquidation_after_price_drop() {
    let mut market = market();
    let user = Pubkey::new_unique();
    let liquidator = Pubkey::new_unique();
    let wbtc = market.wbtc.asset_id;

    market.deposit(&user, &wbtc, SATS / 2).unwrap();
    market.mint(&user, 15_000 * USD).unwrap();

    market.feeds.set_price(&market.wbtc.price_feed, 40_000);
    assert_eq!(
        market.engine.health_ratio(&market.feeds, NOW, &user).unwrap(),
        HealthRatio::Finite(1_333_333)
    );

    market.custody.applied.clear();
    let liquidation = market
        .engine
        .liquidate(
            &market.feeds,
            NOW,
            &mut market.custody,
            &liquidator,
            &user,
            15_000 * USD,
        )
        .unwrap();

    // $16,500 of WBTC at $40,000
    let seized = 41_250_000;
    assert_eq!(liquidation.ratio_after, HealthRatio::Infinite);
    assert_eq!(market.debt(&user), 0);
    assert_eq!(market.balance(&user, &wbtc), SATS / 2 - seized);
    assert_eq!(market.held(&wbtc), SATS / 2 - seized);
    assert_eq!(
        market.custody.applied,
        vec![
            CustodyEffect::BurnSynthetic {
                amount: 15_000 * USD,
                from: liquidator,
            },
            CustodyEffect::TransferOut {
                asset_id: wbtc,
                amount: seized,
                to: liquidator,
            },
        ]
    );
    assert!(market.engine.is_reconciled());
}

#[test]
fn test_liquidation_requires_unhealthy_target() {
    let mut market = market();
    let user = Pubkey::new_unique();
    let wbtc = market.wbtc.asset_id;

    market.deposit(&user, &wbtc, SATS / 2).unwrap();
    market.mint(&user, 15_000 * USD).unwrap();
    let snapshot = market.engine.clone();

    let result = market.engine.liquidate(
        &market.feeds,
        NOW,
        &mut market.custody,
        &Pubkey::new_unique(),
        &user,
        1_000 * USD,
    );
    assert_eq!(result, Err(DscError::PositionHealthy.into()));
    assert_eq!(market.engine, snapshot);
}

#[test]
fn test_stale_feed_blocks_liquidation() {
    let mut market = market();
    let user = Pubkey::new_unique();
    let wbtc = market.wbtc.asset_id;

    market.deposit(&user, &wbtc, SATS / 2).unwrap();
    market.mint(&user, 15_000 * USD).unwrap();

    let feed = market.wbtc.price_feed;
    market.feeds.set_price(&feed, 40_000);
    let mut reading = market.feeds.reading(&feed).unwrap();
    reading.publish_time = NOW - 61;
    market.feeds.set_reading(&feed, reading);

    let snapshot = market.engine.clone();
    let error = market
        .engine
        .liquidate(
            &market.feeds,
            NOW,
            &mut market.custody,
            &Pubkey::new_unique(),
            &user,
            15_000 * USD,
        )
        .unwrap_err();
    assert_eq!(error, DscError::StaleFeed.into());

    let error = DscError::from_program_error(&error).unwrap();
    assert_eq!(error.category(), ErrorCategory::OracleFailure);
    assert!(error.is_retryable());
    assert_eq!(market.engine, snapshot);
}

#[test]
fn test_halted_feed_fails_closed() {
    let mut market = market();
    let user = Pubkey::new_unique();
    let (wbtc, weth) = (market.wbtc.asset_id, market.weth.asset_id);
    market.deposit(&user, &wbtc, SATS).unwrap();
    market.deposit(&user, &weth, WEI).unwrap();

    let feed = market.weth.price_feed;
    let mut reading = market.feeds.reading(&feed).unwrap();
    reading.status = FeedStatus::Halted;
    market.feeds.set_reading(&feed, reading);

    // WBTC alone would cover this, but the position cannot be valued
    assert_eq!(
        market.mint(&user, 100 * USD),
        Err(DscError::MalformedFeed.into())
    );
}

#[test]
fn test_custody_failure_aborts() {
    let mut market = market();
    let user = Pubkey::new_unique();
    let wbtc = market.wbtc.asset_id;
    let snapshot = market.engine.clone();

    market.custody.fail = true;
    assert_eq!(
        market.deposit(&user, &wbtc, SATS),
        Err(ProgramError::InsufficientFunds)
    );
    assert_eq!(market.engine, snapshot);
    assert!(market.engine.position(&user).is_none());
    assert_eq!(market.held(&wbtc), 0);
}

#[test]
fn test_deposit_withdraw_round_trip() {
    let mut market = market();
    let user = Pubkey::new_unique();
    let weth = market.weth.asset_id;

    market.deposit(&user, &weth, WEI).unwrap();
    let snapshot = market.engine.clone();

    market.deposit(&user, &weth, 3 * WEI).unwrap();
    market.withdraw(&user, &weth, 3 * WEI).unwrap();
    assert_eq!(market.engine, snapshot);
}

#[test]
fn test_deposit_withdraw_round_trip_new_asset() {
    let mut market = market();
    let user = Pubkey::new_unique();
    let wbtc = market.wbtc.asset_id;
    let weth = market.weth.asset_id;

    market.deposit(&user, &wbtc, 10).unwrap();
    let snapshot = market.engine.clone();

    market.deposit(&user, &weth, 5).unwrap();
    market.withdraw(&user, &weth, 5).unwrap();
    assert_eq!(market.engine, snapshot);
    assert_eq!(market.engine.position(&user).unwrap().collateral.len(), 1);
}

#[test]
fn test_withdraw_without_debt_skips_oracle() {
    let mut market = market();
    let user = Pubkey::new_unique();
    let wbtc = market.wbtc.asset_id;

    market.deposit(&user, &wbtc, SATS).unwrap();
    market.feeds.clear();
    market.withdraw(&user, &wbtc, SATS).unwrap();
    assert_eq!(market.balance(&user, &wbtc), 0);
    assert_eq!(market.held(&wbtc), 0);
}

#[test]
fn test_withdraw_guarded_by_health() {
    let mut market = market();
    let user = Pubkey::new_unique();
    let wbtc = market.wbtc.asset_id;

    market.deposit(&user, &wbtc, SATS / 2).unwrap();
    market.mint(&user, 15_000 * USD).unwrap();
    let snapshot = market.engine.clone();

    // Leaves $22,500 against $15,000, exactly 150%
    market.withdraw(&user, &wbtc, SATS / 8).unwrap();
    assert_eq!(
        market.withdraw(&user, &wbtc, 1),
        Err(DscError::HealthCheckFailed.into())
    );
    assert_eq!(
        market.withdraw(&user, &wbtc, SATS),
        Err(DscError::Overdraw.into())
    );
    assert_ne!(market.engine, snapshot);
    assert!(market.engine.is_reconciled());
}

#[test]
fn test_burn_never_needs_prices() {
    let mut market = market();
    let user = Pubkey::new_unique();
    let wbtc = market.wbtc.asset_id;

    market.deposit(&user, &wbtc, SATS / 2).unwrap();
    market.mint(&user, 15_000 * USD).unwrap();
    market.feeds.clear();

    assert_eq!(
        market.burn(&user, 15_000 * USD + 1),
        Err(DscError::Overdraw.into())
    );
    market.burn(&user, 5_000 * USD).unwrap();
    assert_eq!(market.debt(&user), 10_000 * USD);
}

#[test]
fn test_operations_reject_bad_input() {
    let mut market = market();
    let user = Pubkey::new_unique();
    let wbtc = market.wbtc.asset_id;

    assert_eq!(market.deposit(&user, &wbtc, 0), Err(DscError::InvalidAmount.into()));
    assert_eq!(
        market.deposit(&user, &Pubkey::new_unique(), 1),
        Err(DscError::AssetNotApproved.into())
    );
    assert_eq!(market.withdraw(&user, &wbtc, 1), Err(DscError::PositionNotFound.into()));
    assert_eq!(market.mint(&user, 1), Err(DscError::PositionNotFound.into()));
    assert_eq!(market.burn(&user, 1), Err(DscError::PositionNotFound.into()));
    assert!(market.engine.position(&user).is_none());
    assert!(market.custody.applied.is_empty());
}

#[test]
fn test_native_collateral() {
    let mut market = market();
    let user = Pubkey::new_unique();
    let sol = CollateralAsset::native(Pubkey::new_unique());
    market.feeds.set_price(&sol.price_feed, 150);

    let authority = market.authority;
    market.engine.add_collateral_type(&authority, sol).unwrap();

    // 2 SOL at 9 decimals
    market.deposit(&user, &sol.asset_id, 2_000_000_000).unwrap();
    market.mint(&user, 200 * USD).unwrap();
    assert_eq!(
        market.engine.health_ratio(&market.feeds, NOW, &user).unwrap(),
        HealthRatio::Finite(1_500_000)
    );
    assert_eq!(market.held(&sol.asset_id), 2_000_000_000);
}

#[test]
fn test_risk_parameter_updates() {
    let mut market = market();
    let user = Pubkey::new_unique();
    let wbtc = market.wbtc.asset_id;
    market.deposit(&user, &wbtc, SATS / 2).unwrap();

    let update = RiskParameterUpdate {
        min_health_ratio: Some(2_500_000),
        ..RiskParameterUpdate::default()
    };
    assert_eq!(
        market
            .engine
            .update_risk_parameters(&Pubkey::new_unique(), &update),
        Err(DscError::Unauthorized.into())
    );

    let authority = market.authority;
    market.engine.update_risk_parameters(&authority, &update).unwrap();
    assert_eq!(
        market.mint(&user, 15_000 * USD),
        Err(DscError::HealthCheckFailed.into())
    );
    market.mint(&user, 12_000 * USD).unwrap();

    let invalid = RiskParameterUpdate {
        liquidation_bonus_bps: Some(9_000),
        ..RiskParameterUpdate::default()
    };
    assert_eq!(
        market.engine.update_risk_parameters(&authority, &invalid),
        Err(DscError::InvalidConfig.into())
    );
    assert_eq!(market.engine.config().params.liquidation_bonus_bps, 1_000);
}

#[test]
fn test_restore_health_policy_rejects_shallow_liquidation() {
    let mut market = market();
    let authority = market.authority;
    market
        .engine
        .update_risk_parameters(
            &authority,
            &RiskParameterUpdate {
                liquidation_policy: Some(LiquidationPolicy::RestoreHealth),
                ..RiskParameterUpdate::default()
            },
        )
        .unwrap();

    let user = Pubkey::new_unique();
    let wbtc = market.wbtc.asset_id;
    market.deposit(&user, &wbtc, SATS / 2).unwrap();
    market.mint(&user, 15_000 * USD).unwrap();
    market.feeds.set_price(&market.wbtc.price_feed, 40_000);

    let liquidator = Pubkey::new_unique();
    // $20,000 vs $15,000: repaying $1,000 only reaches ~135%
    assert_eq!(
        market.engine.liquidate(
            &market.feeds,
            NOW,
            &mut market.custody,
            &liquidator,
            &user,
            1_000 * USD,
        ),
        Err(DscError::HealthNotImproved.into())
    );
    assert_eq!(market.debt(&user), 15_000 * USD);
}
