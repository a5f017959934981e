// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use proptest::prelude::*;
use reti_rewards::{
    fetch_validator_rewards, merge_reward_maps, EventProcessor, InMemorySource, RewardMap,
    RoundRange,
};
use reti_test_utils::{staker, test_config, test_validator, POOL_APP_ID};

use crate::common;

/// Histories of up to `max_len` steps for the pool described by [test_config].
fn steps(max_len: usize) -> impl Strategy<Value = Vec<common::PoolOp>> {
    common::pool_ops(test_config().protocol.min_residual_stake, 1..=max_len)
}

fn last_round(txns: &[reti_rewards::Transaction]) -> u64 {
    txns.iter().map(|txn| txn.confirmed_round).max().unwrap_or(0)
}

fn reward_map() -> impl Strategy<Value = RewardMap> {
    prop::collection::btree_map(1u8..=8, 0u64..1_000_000, 0..6)
        .prop_map(|rewards| rewards.into_iter().map(|(n, reward)| (staker(n), reward)).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_conservation_holds_after_every_event(ops in steps(200)) {
        let config = test_config();
        let validator = test_validator(&[POOL_APP_ID]);
        let txns = common::history(&config, POOL_APP_ID, &ops);
        let mut processor = EventProcessor::new(&config, &validator, POOL_APP_ID).unwrap();
        for txn in &txns {
            processor.process(txn).unwrap();
            let ledger = processor.ledger();
            let roster: u64 = ledger.occupied().map(|(_, record)| record.balance).sum();
            prop_assert_eq!(roster, ledger.total_staked(), "at {}", txn.id);
            prop_assert!(ledger.total_staked() <= processor.tracked_total());
        }
    }

    #[test]
    fn test_replay_is_deterministic(ops in steps(150), from in 0u64..40_000) {
        let config = test_config();
        let validator = test_validator(&[POOL_APP_ID]);
        let txns = common::history(&config, POOL_APP_ID, &ops);
        let range = RoundRange::new(Some(from), None).unwrap();
        let first = common::replay(&config, &validator, POOL_APP_ID, &txns, range).unwrap();
        let second = common::replay(&config, &validator, POOL_APP_ID, &txns, range).unwrap();
        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_windowed_rewards_are_cumulative_differences(
        ops in steps(150),
        a in 0u64..40_000,
        b in 0u64..40_000,
    ) {
        let config = test_config();
        let validator = test_validator(&[POOL_APP_ID]);
        let txns = common::history(&config, POOL_APP_ID, &ops);
        let (lower, upper) = (a.min(b), a.max(b));
        let cumulative = |to: u64| {
            common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::up_to(to))
                .unwrap()
                .rewards
        };

        let window = common::replay(
            &config,
            &validator,
            POOL_APP_ID,
            &txns,
            RoundRange::new(Some(lower), Some(upper)).unwrap(),
        )
        .unwrap()
        .rewards;
        let (to, from) = (cumulative(upper), cumulative(lower));
        for (account, reward) in &to {
            let expected = reward - from.get(account).unwrap_or(0);
            prop_assert_eq!(
                window.get(account).unwrap_or(0),
                expected,
                "{} in ({}, {}]",
                account,
                lower,
                upper
            );
        }
        prop_assert!(window.accounts().all(|account| to.get(account).is_some()));
    }

    #[test]
    fn test_window_without_later_transactions_is_all_zero(ops in steps(60)) {
        let config = test_config();
        let validator = test_validator(&[POOL_APP_ID]);
        let txns = common::history(&config, POOL_APP_ID, &ops);

        let replay = common::replay(
            &config,
            &validator,
            POOL_APP_ID,
            &txns,
            RoundRange::new(Some(last_round(&txns)), None).unwrap(),
        )
        .unwrap();
        prop_assert_eq!(replay.rewards.len(), replay.cumulative_rewards.len());
        prop_assert!(replay.rewards.iter().all(|(_, reward)| *reward == 0));
    }

    #[test]
    fn test_merge_is_order_independent(a in reward_map(), b in reward_map(), c in reward_map()) {
        let ab = merge_reward_maps([&a, &b]).unwrap();
        prop_assert_eq!(&ab, &merge_reward_maps([&b, &a]).unwrap());

        let left = merge_reward_maps([&a, &merge_reward_maps([&b, &c]).unwrap()]).unwrap();
        prop_assert_eq!(&left, &merge_reward_maps([&ab, &c]).unwrap());
        let ac = merge_reward_maps([&a, &c]).unwrap();
        prop_assert_eq!(&left, &merge_reward_maps([&b, &ac]).unwrap());
        prop_assert_eq!(left.total(), a.total() + b.total() + c.total());
    }
}

#[test]
fn test_merge_sums_shared_stakers() {
    let a: RewardMap = [(staker(1), 10), (staker(2), 5)].into_iter().collect();
    let b: RewardMap = [(staker(1), 3), (staker(3), 7)].into_iter().collect();

    let expected: RewardMap =
        [(staker(1), 13), (staker(2), 5), (staker(3), 7)].into_iter().collect();
    assert_eq!(merge_reward_maps([&a, &b]).unwrap(), expected);
    assert_eq!(merge_reward_maps([&b, &a]).unwrap(), expected);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_validator_rewards_do_not_depend_on_pool_order(
        histories in prop::collection::vec(steps(80), 3),
    ) {
        let config = test_config();
        let pools = [POOL_APP_ID, POOL_APP_ID + 1, POOL_APP_ID + 2];
        let mut source = InMemorySource::new(16);
        for (pool, ops) in pools.iter().zip(&histories) {
            for txn in common::history(&config, *pool, ops) {
                source.insert(txn);
            }
        }
        let range = RoundRange::new(Some(2_000), Some(30_000)).unwrap();

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (forward, reversed) = runtime.block_on(async {
            let forward = fetch_validator_rewards(&source, &config, &test_validator(&pools), range)
                .await
                .unwrap();
            let reversed = fetch_validator_rewards(
                &source,
                &config,
                &test_validator(&[pools[2], pools[1], pools[0]]),
                range,
            )
            .await
            .unwrap();
            (forward, reversed)
        });

        prop_assert_eq!(&forward.rewards, &reversed.rewards);
        prop_assert_eq!(&forward.summary.stake_by_staker, &reversed.summary.stake_by_staker);
        let expected = merge_reward_maps(forward.pools.iter().map(|pool| &pool.rewards)).unwrap();
        prop_assert_eq!(forward.rewards, expected);
    }
}
