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

//! Pool and validator statistics gathered while replaying.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    error::{Result, RewardsError},
    transaction::Account,
};

/// Event counts accumulated by the processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolCounters {
    pub deposits: u64,
    pub withdrawals: u64,
    /// Withdrawals that left the staker under the residual floor and vacated the slot.
    pub exits: u64,
    pub settlements: u64,
    /// Settlements without a registry side-effect, i.e. epochs with nothing to distribute.
    pub settlements_without_rewards: u64,
    /// Settlements whose reward pool was approximated by the stake increase.
    pub approximated_settlements: u64,
    /// Rewards credited to stakers since genesis of the replayed history.
    pub rewards_distributed: u64,
}

/// Summary of one replayed pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSummary {
    pub pool_app_id: u64,
    /// Sum of reconstructed staker balances.
    pub total_staked: u64,
    /// Pool total tracked with the contract's own bookkeeping.
    pub tracked_total: u64,
    pub active_stakers: usize,
    pub transactions: usize,
    pub last_round: Option<u64>,
    #[serde(flatten)]
    pub counters: PoolCounters,
}

impl PoolSummary {
    /// Difference between the tracked total and the reconstructed balances.
    ///
    /// Non-zero when rounding dust or sub-floor residuals were dropped from the roster.
    pub fn drift(&self) -> i128 {
        i128::from(self.tracked_total) - i128::from(self.total_staked)
    }
}

/// Summary across every pool of a validator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidatorSummary {
    pub validator_id: u64,
    pub pools: usize,
    pub total_staked: u64,
    pub tracked_total: u64,
    pub unique_stakers: usize,
    pub rewards_distributed: u64,
    /// Stake per staker summed over all pools.
    pub stake_by_staker: BTreeMap<Account, u64>,
}

impl ValidatorSummary {
    /// Combine per-pool summaries and balances into a validator summary.
    pub fn from_pools<'a>(
        validator_id: u64,
        pools: impl IntoIterator<Item = (&'a PoolSummary, BTreeMap<Account, u64>)>,
    ) -> Result<Self> {
        let mut summary = ValidatorSummary { validator_id, ..Default::default() };
        for (pool, balances) in pools {
            summary.pools += 1;
            summary.total_staked = checked_sum(summary.total_staked, pool.total_staked)?;
            summary.tracked_total = checked_sum(summary.tracked_total, pool.tracked_total)?;
            summary.rewards_distributed =
                checked_sum(summary.rewards_distributed, pool.counters.rewards_distributed)?;
            for (account, balance) in balances {
                let stake = summary.stake_by_staker.entry(account).or_insert(0);
                *stake = checked_sum(*stake, balance)?;
            }
        }
        summary.unique_stakers = summary.stake_by_staker.len();
        Ok(summary)
    }
}

fn checked_sum(a: u64, b: u64) -> Result<u64> {
    a.checked_add(b).ok_or(RewardsError::Overflow("validator totals"))
}
