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

use reti_rewards::{
    EventProcessor, RewardsError, RoundRange, SettlementReport, Slot, ValidatorParams,
};
use reti_test_utils::{
    app_call, instant_activation_config, staker, test_config, test_validator, PoolTxnBuilder,
    POOL_APP_ID,
};
use tracing_test::traced_test;

use crate::common;

/// Validator taking half of every reward, so a commission of `c` leaves `c` for stakers.
fn half_commission_validator() -> ValidatorParams {
    ValidatorParams { percent_to_validator: 500_000, ..test_validator(&[POOL_APP_ID]) }
}

#[test]
fn test_single_full_epoch_staker_takes_whole_pool() {
    let config = instant_activation_config();
    let validator = test_validator(&[POOL_APP_ID]);
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    let txns =
        vec![pool.deposit(staker(1), 1_000_000, 0), pool.commission_settlement(1286, 950_000, 50_000)];

    let replay =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap();
    // 50_000 / 5% - 50_000
    assert_eq!(replay.rewards.get(&staker(1)), Some(950_000));
    assert_eq!(replay.ledger.balances()[&staker(1)], 1_950_000);
    assert_eq!(replay.summary.total_staked, 1_950_000);
    assert_eq!(replay.summary.tracked_total, 1_950_000);
    assert_eq!(replay.summary.drift(), 0);
    assert_eq!(replay.summary.counters.rewards_distributed, 950_000);
}

#[test]
fn test_activation_delay_makes_first_epoch_partial() {
    let config = test_config();
    let validator = test_validator(&[POOL_APP_ID]);
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    let txns = vec![
        pool.deposit(staker(1), 1_000_000, 100),
        pool.commission_settlement(1286, 950_000, 50_000),
    ];

    let replay =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap();
    // Entry at 420, so 866 of 1286 rounds: 673 per mille of the pool.
    assert_eq!(replay.rewards.get(&staker(1)), Some(639_350));
    assert_eq!(replay.ledger.balances()[&staker(1)], 1_639_350);
    assert_eq!(replay.summary.tracked_total, 1_950_000);
    assert_eq!(replay.summary.drift(), 310_650);
}

#[test]
fn test_partial_staker_paid_first_and_rest_split_by_full_stakers() {
    let config = instant_activation_config();
    let validator = half_commission_validator();
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    let txns = vec![
        pool.deposit(staker(1), 1_000_000, 0),
        pool.deposit(staker(2), 1_000_000, 700),
        pool.commission_settlement(1286, 100_000, 100_000),
    ];

    let replay =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap();
    assert_eq!((1286 - 700) * 1000 / 1286, 455);
    // 1_000_000 * 100_000 * 455 / (2_000_000 * 1000)
    assert_eq!(replay.rewards.get(&staker(2)), Some(22_750));
    // Remaining 77_250 over the 1_000_000 full-epoch stake.
    assert_eq!(replay.rewards.get(&staker(1)), Some(77_250));
    assert_eq!(replay.rewards.total(), 100_000);
    assert_eq!(replay.summary.drift(), 0);
}

#[test]
fn test_withdrawal_below_floor_vacates_slot_for_reuse() {
    let config = test_config();
    let validator = test_validator(&[POOL_APP_ID]);
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    let txns = vec![
        pool.deposit(staker(1), 1_500_000, 10),
        pool.deposit(staker(2), 2_000_000, 20),
        pool.withdrawal(staker(1), 1_000_000, 30),
    ];

    let replay =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap();
    assert_eq!(replay.ledger.slots()[0], Slot::Vacant);
    assert_eq!(replay.ledger.active_stakers(), 1);
    assert_eq!(replay.ledger.total_staked(), 2_000_000);
    assert_eq!(replay.summary.counters.exits, 1);
    // The dust stays in the contract's own total, and shows up as drift, not as an error.
    assert_eq!(replay.summary.tracked_total, 2_500_000);
    assert_eq!(replay.summary.drift(), 500_000);

    let mut txns = txns;
    txns.push(pool.deposit(staker(3), 1_000_000, 40));
    let replay =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap();
    match &replay.ledger.slots()[0] {
        Slot::Occupied(record) => assert_eq!(record.account, staker(3)),
        Slot::Vacant => panic!("vacant slot was not reused"),
    }
    assert_eq!(replay.ledger.slot_count(), 2);
}

#[test]
fn test_withdrawal_keeping_floor_stays_active() {
    let config = test_config();
    let validator = test_validator(&[POOL_APP_ID]);
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    let txns =
        vec![pool.deposit(staker(1), 3_000_000, 10), pool.withdrawal(staker(1), 2_000_000, 30)];

    let replay =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap();
    assert_eq!(replay.ledger.balances()[&staker(1)], 1_000_000);
    assert_eq!(replay.summary.counters.exits, 0);
    assert_eq!(replay.summary.counters.withdrawals, 1);
}

#[test]
fn test_deposit_without_payment_aborts() {
    let config = test_config();
    let validator = test_validator(&[POOL_APP_ID]);
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    let txns = vec![pool.deposit(staker(1), 1_000_000, 10), pool.unpaid_deposit(staker(2), 20)];

    let err =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap_err();
    assert!(matches!(err, RewardsError::MalformedTransactionGroup { .. }), "{err}");
}

#[test]
fn test_withdrawal_without_payment_aborts() {
    let config = test_config();
    let validator = test_validator(&[POOL_APP_ID]);
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    let mut unpaid = pool.withdrawal(staker(1), 1_000_000, 20);
    unpaid.inner_txns.clear();
    let txns = vec![pool.deposit(staker(1), 3_000_000, 10), unpaid];

    let err =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap_err();
    match err {
        RewardsError::MalformedTransactionGroup { txn_id, reason } => {
            assert_eq!(txn_id, txns[1].display_id());
            assert!(reason.contains("removeStake"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_withdrawal_by_unknown_staker_aborts() {
    let config = test_config();
    let validator = test_validator(&[POOL_APP_ID]);
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    let txns = vec![pool.deposit(staker(1), 1_000_000, 10), pool.withdrawal(staker(9), 1, 20)];

    let err =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap_err();
    match err {
        RewardsError::UnknownStakerReference { account, .. } => assert_eq!(account, staker(9)),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_withdrawal_past_tracked_total_aborts() {
    let config = test_config();
    let validator = test_validator(&[POOL_APP_ID]);
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    let txns =
        vec![pool.deposit(staker(1), 1_000_000, 10), pool.withdrawal(staker(1), 2_000_000, 20)];

    let err =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap_err();
    assert!(matches!(err, RewardsError::StakeAccountingMismatch { .. }), "{err}");
}

#[test]
fn test_overallocated_partial_rewards_are_reported() {
    let config = instant_activation_config();
    let validator = half_commission_validator();
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    // The oversized withdrawal empties staker 1 and shrinks the tracked total below staker 2's
    // balance, so staker 2's partial share exceeds the pool.
    let txns = vec![
        pool.deposit(staker(1), 2_000_000, 0),
        pool.deposit(staker(2), 2_000_000, 100),
        pool.withdrawal(staker(1), 3_000_000, 200),
        pool.commission_settlement(1286, 100_000, 100_000),
    ];

    let err =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap_err();
    match err {
        RewardsError::NegativeRewardPool { available, deficit, .. } => {
            assert_eq!(available, 100_000);
            assert_eq!(deficit, 84_400);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_zero_rewards_still_record_stakers() {
    let config = instant_activation_config();
    let validator = test_validator(&[POOL_APP_ID]);
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    let nothing = SettlementReport { stake_increase: 0, commission_paid: 0, excess_to_fee_sink: 0 };
    let txns = vec![
        pool.deposit(staker(1), 1_000_000, 0),
        pool.settlement(1286, nothing),
        // Enters after the start of the next settled epoch.
        pool.deposit(staker(2), 1_000_000, 1300),
        pool.settlement(2000, nothing),
    ];

    let replay =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap();
    assert_eq!(replay.rewards.len(), 1);
    assert_eq!(replay.rewards.get(&staker(1)), Some(0));
    assert_eq!(replay.rewards.get(&staker(2)), None);
}

#[test]
fn test_stake_entering_after_epoch_start_is_left_out_of_full_epoch_split() {
    let config = instant_activation_config();
    let validator = half_commission_validator();
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    let txns = vec![
        pool.deposit(staker(1), 1_000_000, 0),
        pool.deposit(staker(2), 3_000_000, 1290),
        // The settled epoch starts at 1286, before staker 2 entered.
        pool.commission_settlement(2571, 100_000, 100_000),
    ];

    let replay =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap();
    // Staker 2's 3_000_000 comes off the 4_000_000 denominator, so staker 1 takes it all.
    assert_eq!(replay.rewards.get(&staker(1)), Some(100_000));
    assert_eq!(replay.rewards.get(&staker(2)), None);
    assert_eq!(replay.ledger.balances()[&staker(2)], 3_000_000);
    assert_eq!(replay.summary.tracked_total, 4_100_000);
    assert_eq!(replay.summary.drift(), 0);
}

#[test]
fn test_settlement_without_registry_call_pays_nothing() {
    let config = instant_activation_config();
    let validator = test_validator(&[POOL_APP_ID]);
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    let txns = vec![pool.deposit(staker(1), 1_000_000, 0), pool.empty_settlement(1286)];

    let replay =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap();
    assert!(replay.rewards.is_empty());
    assert_eq!(replay.summary.counters.settlements, 1);
    assert_eq!(replay.summary.counters.settlements_without_rewards, 1);
}

#[test]
#[traced_test]
fn test_excess_only_settlement_is_approximated() {
    let config = instant_activation_config();
    let validator = test_validator(&[POOL_APP_ID]);
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    let report = SettlementReport { stake_increase: 40_000, commission_paid: 0, excess_to_fee_sink: 5 };
    let txns = vec![pool.deposit(staker(1), 1_000_000, 0), pool.settlement(1286, report)];

    let replay =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap();
    assert_eq!(replay.rewards.get(&staker(1)), Some(40_000));
    assert_eq!(replay.summary.counters.approximated_settlements, 1);
    assert!(logs_contain("approximating reward pool"));
}

#[test]
fn test_top_up_restarts_time_in_pool() {
    let config = instant_activation_config();
    let validator = half_commission_validator();
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    let txns = vec![
        pool.deposit(staker(1), 1_000_000, 0),
        pool.deposit(staker(1), 1_000_000, 1000),
        pool.commission_settlement(1286, 100_000, 100_000),
    ];

    let replay =
        common::replay(&config, &validator, POOL_APP_ID, &txns, RoundRange::default()).unwrap();
    // 286 rounds in the epoch: 222 per mille of the whole pool.
    assert_eq!(replay.rewards.get(&staker(1)), Some(22_200));
    assert_eq!(replay.ledger.active_stakers(), 1);
}

#[test]
fn test_calls_nested_in_other_applications_are_found() {
    let config = instant_activation_config();
    let validator = test_validator(&[POOL_APP_ID]);
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);
    let wrap = |txn| {
        let mut outer = app_call(555, staker(7), 0, vec![]);
        outer.id = "wrapper".into();
        outer.inner_txns = vec![txn];
        outer
    };
    let mut deposit = wrap(pool.deposit(staker(1), 1_000_000, 0));
    deposit.confirmed_round = 0;
    let mut settlement = wrap(pool.commission_settlement(1286, 950_000, 50_000));
    settlement.confirmed_round = 1286;

    let replay = common::replay(
        &config,
        &validator,
        POOL_APP_ID,
        &[deposit, pool.untracked_call(500), settlement],
        RoundRange::default(),
    )
    .unwrap();
    assert_eq!(replay.rewards.get(&staker(1)), Some(950_000));
    assert_eq!(replay.summary.counters.deposits, 1);
    assert_eq!(replay.summary.transactions, 3);
}

#[test]
fn test_deeply_nested_calls_are_dispatched_in_order() {
    let config = instant_activation_config();
    let validator = test_validator(&[POOL_APP_ID]);
    let mut pool = PoolTxnBuilder::new(&config, POOL_APP_ID);

    // The withdrawal only finds its staker if the deposit before it was applied first.
    let mut txn = app_call(555, staker(7), 10, vec![]);
    txn.inner_txns =
        vec![pool.deposit(staker(1), 3_000_000, 10), pool.withdrawal(staker(1), 1_000_000, 10)];
    for _ in 0..1_024 {
        let mut outer = app_call(555, staker(7), 10, vec![]);
        outer.inner_txns = vec![txn];
        txn = outer;
    }
    txn.id = "nested".into();

    let mut processor = EventProcessor::new(&config, &validator, POOL_APP_ID).unwrap();
    processor.process(&txn).unwrap();
    assert_eq!(processor.ledger().balances()[&staker(1)], 2_000_000);
    assert_eq!(processor.tracked_total(), 2_000_000);
    let counters = processor.summary().counters;
    assert_eq!((counters.deposits, counters.withdrawals), (1, 1));
}

#[test]
fn test_processor_rejects_invalid_parameters() {
    let config = test_config();
    let validator = ValidatorParams { epoch_round_length: 0, ..test_validator(&[POOL_APP_ID]) };
    assert!(matches!(
        EventProcessor::new(&config, &validator, POOL_APP_ID),
        Err(RewardsError::InvalidConfig(_))
    ));
}
