mod common;

use common::*;
use dsc_engine::valuation::HealthRatio;
use proptest::prelude::*;
use solana_program::pubkey::Pubkey;

#[derive(Debug, Clone)]
enum Op {
    Deposit { user: usize, asset: usize, amount: u64 },
    Withdraw { user: usize, asset: usize, amount: u64 },
    Mint { user: usize, amount: u64 },
    Burn { user: usize, amount: u64 },
    Liquidate { user: usize, repay: u64 },
    Reprice { asset: usize, usd: i64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 0..2usize, 1..5 * SATS).prop_map(|(user, asset, amount)| Op::Deposit {
            user,
            asset,
            amount
        }),
        (0..3usize, 0..2usize, 1..5 * SATS).prop_map(|(user, asset, amount)| Op::Withdraw {
            user,
            asset,
            amount
        }),
        (0..3usize, 1..50_000 * USD).prop_map(|(user, amount)| Op::Mint { user, amount }),
        (0..3usize, 1..50_000 * USD).prop_map(|(user, amount)| Op::Burn { user, amount }),
        (0..3usize, 1..50_000 * USD).prop_map(|(user, repay)| Op::Liquidate { user, repay }),
        (0..2usize, 100..100_000i64).prop_map(|(asset, usd)| Op::Reprice { asset, usd }),
    ]
}

proptest! {
    #[test]
    fn test_vaults_reconcile_after_any_sequence(ops in prop::collection::vec(op(), 1..40)) {
        let mut market = market();
        let users = [Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique()];
        let assets = [market.wbtc, market.weth];
        let liquidator = Pubkey::new_unique();

        for op in ops {
            let before = market.engine.clone();
            let result = match op {
                Op::Deposit { user, asset, amount } => {
                    market.deposit(&users[user], &assets[asset].asset_id, amount)
                }
                Op::Withdraw { user, asset, amount } => {
                    market.withdraw(&users[user], &assets[asset].asset_id, amount)
                }
                Op::Mint { user, amount } => market.mint(&users[user], amount),
                Op::Burn { user, amount } => market.burn(&users[user], amount),
                Op::Liquidate { user, repay } => {
                    let debt = market.debt(&users[user]);
                    let result = market
                        .engine
                        .liquidate(&market.feeds, NOW, &mut market.custody, &liquidator, &users[user], repay)
                        .map(|_| ());
                    if result.is_ok() {
                        prop_assert_eq!(market.debt(&users[user]), debt - repay);
                    }
                    result
                }
                Op::Reprice { asset, usd } => {
                    market.feeds.set_price(&assets[asset].price_feed, usd);
                    Ok(())
                }
            };

            if result.is_err() {
                prop_assert_eq!(&market.engine, &before);
            }
            prop_assert!(market.engine.is_reconciled());
        }
    }

    #[test]
    fn test_committed_mints_are_healthy(
        deposit in 1..10 * SATS,
        mints in prop::collection::vec(1..100_000 * USD, 1..10),
        usd in 1_000..100_000i64,
    ) {
        let mut market = market();
        let user = Pubkey::new_unique();
        let wbtc = market.wbtc;
        market.feeds.set_price(&wbtc.price_feed, usd);
        market.deposit(&user, &wbtc.asset_id, deposit).unwrap();

        let min = market.engine.config().params.min_health_ratio;
        for amount in mints {
            if market.mint(&user, amount).is_ok() {
                let ratio = market.engine.health_ratio(&market.feeds, NOW, &user).unwrap();
                prop_assert!(!ratio.is_below(min));
                prop_assert!(ratio < HealthRatio::Infinite);
            }
        }
    }
}
