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

//! Application of classified pool events to a reconstructed ledger.
//!
//! Events must be fed in ascending confirmation order. Deposits and withdrawals move stake in and
//! out of the roster; settlements split the epoch's reward pool across stakers in two passes, the
//! same way the pool contract does, using integer arithmetic with the contract's truncation.

use alloy_primitives::U256;

use crate::{
    classify::{direct_pool_method, find_registry_call, PoolMethod},
    config::{RewardsConfig, ValidatorParams},
    error::{Result, RewardsError},
    ledger::{LedgerState, StakerRecord},
    rewards::RewardMap,
    stats::{PoolCounters, PoolSummary},
    transaction::{Account, Transaction},
};

/// Amounts reported by the registry call issued during a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementReport {
    /// Increase of the pool's total stake.
    pub stake_increase: u64,
    /// Commission paid out to the validator.
    pub commission_paid: u64,
    /// Excess routed to the fee sink.
    pub excess_to_fee_sink: u64,
}

impl SettlementReport {
    /// Decode the report from the arguments of a `stakeUpdatedViaRewards` call.
    pub fn decode(call: &Transaction) -> Option<Self> {
        Some(Self {
            stake_increase: call.arg_u64(2)?,
            commission_paid: call.arg_u64(4)?,
            excess_to_fee_sink: call.arg_u64(5)?,
        })
    }
}

/// `prod(numerator) / prod(denominator)` with 256-bit intermediates.
///
/// Returns `None` when the denominator is zero or the quotient does not fit in 64 bits.
pub fn wide_ratio(numerator: &[u64], denominator: &[u64]) -> Option<u64> {
    let product = |factors: &[u64]| {
        factors.iter().try_fold(U256::from(1u64), |acc, factor| acc.checked_mul(U256::from(*factor)))
    };
    let ratio = product(numerator)?.checked_div(product(denominator)?)?;
    u64::try_from(ratio).ok()
}

fn malformed(txn: &Transaction, reason: &'static str) -> RewardsError {
    RewardsError::MalformedTransactionGroup { txn_id: txn.display_id(), reason }
}

fn mismatch(txn: &Transaction, reason: &'static str) -> RewardsError {
    RewardsError::StakeAccountingMismatch { txn_id: txn.display_id(), reason }
}

/// Replays events of one pool into its ledger and reward accumulator.
pub struct EventProcessor<'a> {
    config: &'a RewardsConfig,
    validator: &'a ValidatorParams,
    pool_app_id: u64,
    ledger: LedgerState,
    rewards: RewardMap,
    tracked_total: u64,
    counters: PoolCounters,
    transactions: usize,
    last_round: Option<u64>,
}

impl<'a> EventProcessor<'a> {
    pub fn new(
        config: &'a RewardsConfig,
        validator: &'a ValidatorParams,
        pool_app_id: u64,
    ) -> Result<Self> {
        config.validate()?;
        validator.validate(&config.protocol)?;
        Ok(Self {
            config,
            validator,
            pool_app_id,
            ledger: LedgerState::new(),
            rewards: RewardMap::new(),
            tracked_total: 0,
            counters: PoolCounters::default(),
            transactions: 0,
            last_round: None,
        })
    }

    /// Apply one top-level transaction, then verify conservation.
    pub fn process(&mut self, txn: &Transaction) -> Result<()> {
        self.dispatch(txn)?;
        self.ledger.check_conservation(self.pool_app_id)?;
        self.transactions += 1;
        self.last_round = Some(txn.confirmed_round);
        Ok(())
    }

    /// Handle tracked calls in pre-order, descending only into the inner transactions of
    /// untracked ones. Inner transactions are dispatched with their siblings as the enclosing
    /// group.
    fn dispatch(&mut self, root: &Transaction) -> Result<()> {
        let mut stack: Vec<(&Transaction, Option<&[Transaction]>)> = vec![(root, None)];
        while let Some((txn, group)) = stack.pop() {
            match direct_pool_method(txn, &self.config.selectors, self.pool_app_id) {
                Some(PoolMethod::AddStake) => self.apply_deposit(txn, group)?,
                Some(PoolMethod::RemoveStake) => self.apply_withdrawal(txn)?,
                Some(PoolMethod::EpochBalanceUpdate) => self.apply_settlement(txn)?,
                None => {
                    let siblings = txn.inner_txns.as_slice();
                    stack.extend(siblings.iter().rev().map(|inner| (inner, Some(siblings))));
                }
            }
        }
        Ok(())
    }

    fn apply_deposit(&mut self, txn: &Transaction, group: Option<&[Transaction]>) -> Result<()> {
        let payment = group
            .and_then(|group| group.iter().find(|sibling| sibling.is_payment()))
            .ok_or_else(|| malformed(txn, "addStake without a payment in its group"))?;
        let amount =
            payment.payment_amount().ok_or_else(|| malformed(txn, "addStake payment has no amount"))?;
        let account =
            txn.arg_account(1).ok_or_else(|| malformed(txn, "addStake without a staker account"))?;
        let entry_round = payment
            .confirmed_round
            .checked_add(self.config.protocol.staking_activation_delay)
            .ok_or(RewardsError::Overflow("entry round"))?;

        let index = match self.ledger.find_by_account(&account) {
            Some(index) => index,
            None => {
                self.ledger.insert_or_reuse(StakerRecord { account, balance: 0, entry_round })?
            }
        };
        self.ledger.credit(index, amount)?;
        self.ledger.set_entry_round(index, entry_round)?;

        self.tracked_total =
            self.tracked_total.checked_add(amount).ok_or(RewardsError::Overflow("pool total"))?;
        self.counters.deposits += 1;
        tracing::trace!(
            "pool {}: {} deposited {} at round {}",
            self.pool_app_id,
            account,
            amount,
            txn.confirmed_round
        );
        Ok(())
    }

    fn apply_withdrawal(&mut self, txn: &Transaction) -> Result<()> {
        let amount = txn
            .inner_txns
            .iter()
            .find(|inner| inner.is_payment())
            .and_then(Transaction::payment_amount)
            .ok_or_else(|| malformed(txn, "removeStake without an inner payment"))?;
        let account = txn
            .arg_account(1)
            .ok_or_else(|| malformed(txn, "removeStake without a staker account"))?;
        let index = self.ledger.find_by_account(&account).ok_or_else(|| {
            RewardsError::UnknownStakerReference { txn_id: txn.display_id(), account }
        })?;

        let residual = self.ledger.debit(index, amount)?;
        // The contract rejects balances under the floor, so a smaller residual is an exit.
        if residual < self.config.protocol.min_residual_stake {
            self.ledger.vacate(index);
            self.counters.exits += 1;
        }

        self.tracked_total = self
            .tracked_total
            .checked_sub(amount)
            .ok_or_else(|| mismatch(txn, "withdrawal exceeds the tracked pool total"))?;
        self.counters.withdrawals += 1;
        tracing::trace!(
            "pool {}: {} withdrew {} at round {} (residual {})",
            self.pool_app_id,
            account,
            amount,
            txn.confirmed_round,
            residual
        );
        Ok(())
    }

    fn apply_settlement(&mut self, txn: &Transaction) -> Result<()> {
        self.counters.settlements += 1;
        let Some(call) = find_registry_call(
            &txn.inner_txns,
            self.config.selectors.stake_updated_via_rewards,
            self.config.registry_app_id,
        ) else {
            self.counters.settlements_without_rewards += 1;
            tracing::debug!(
                "pool {}: settlement at round {} had no rewards to pay",
                self.pool_app_id,
                txn.confirmed_round
            );
            return Ok(());
        };
        let report = SettlementReport::decode(call)
            .ok_or_else(|| malformed(txn, "stakeUpdatedViaRewards call is missing amounts"))?;

        let round = txn.confirmed_round;
        let epoch_start = round - round % self.validator.epoch_round_length;
        let reward_available = self.reward_available(txn, &report)?;
        self.distribute(txn, epoch_start, reward_available)?;

        self.tracked_total = self
            .tracked_total
            .checked_add(report.stake_increase)
            .ok_or(RewardsError::Overflow("pool total"))?;
        tracing::debug!(
            "pool {}: settled epoch starting at round {} with {} available ({:?})",
            self.pool_app_id,
            epoch_start,
            reward_available,
            report
        );
        Ok(())
    }

    /// Reward pool available to stakers for this settlement.
    fn reward_available(&mut self, txn: &Transaction, report: &SettlementReport) -> Result<u64> {
        let commission_rate = self.validator.percent_to_validator;
        if report.commission_paid != 0 && commission_rate != 0 {
            // Invert `commission = reward * rate / ppm_max`, keeping the contract's truncation.
            let gross =
                wide_ratio(&[report.commission_paid, self.config.protocol.ppm_max], &[commission_rate])
                    .ok_or(RewardsError::Overflow("recovered reward pool"))?;
            return gross
                .checked_sub(report.commission_paid)
                .ok_or_else(|| mismatch(txn, "commission exceeds the recovered reward pool"));
        }
        if report.excess_to_fee_sink != 0 {
            // APPROXIMATION: the exact pool needs the pool's online stake at settlement time,
            // which no transaction records. The stake increase stands in for it; results differ
            // from the contract whenever the two do.
            self.counters.approximated_settlements += 1;
            tracing::warn!(
                "pool {}: settlement {} paid no commission; approximating reward pool with stake increase {}",
                self.pool_app_id,
                txn.display_id(),
                report.stake_increase
            );
            return Ok(report.stake_increase);
        }
        Ok(0)
    }

    /// Two-pass proportional allocation of `reward_available` across the roster.
    ///
    /// Pass A pays stakers that were in the pool for only part of the epoch, pro rata to stake and
    /// time in pool, and gathers the stake of everyone not in for the full epoch. Pass B splits
    /// what is left among full-epoch stakers over the tracked total minus that partial stake.
    fn distribute(
        &mut self,
        txn: &Transaction,
        epoch_start: u64,
        reward_available: u64,
    ) -> Result<()> {
        let epoch_length = self.validator.epoch_round_length;
        let full_time = self.config.protocol.full_time_percentage;
        let total_before = self.tracked_total;

        let mut partial_stake = 0u64;
        let mut partial_rewards = 0u64;
        for index in 0..self.ledger.slot_count() {
            let Some(record) = self.ledger.get(index) else { continue };
            let (account, balance, entry_round) =
                (record.account, record.balance, record.entry_round);
            if entry_round < epoch_start && epoch_start - entry_round >= epoch_length {
                continue;
            }
            partial_stake =
                partial_stake.checked_add(balance).ok_or(RewardsError::Overflow("partial stake"))?;
            if entry_round >= epoch_start {
                continue;
            }

            let time_in_pool = epoch_start - entry_round;
            let time_percentage = wide_ratio(&[time_in_pool, full_time], &[epoch_length])
                .ok_or(RewardsError::Overflow("time in pool percentage"))?;
            if total_before == 0 {
                return Err(mismatch(txn, "stakers present while the tracked pool total is zero"));
            }
            let reward = wide_ratio(
                &[balance, reward_available, time_percentage],
                &[total_before, full_time],
            )
            .ok_or(RewardsError::Overflow("partial-epoch reward"))?;
            self.credit_reward(index, account, reward)?;
            partial_rewards = partial_rewards
                .checked_add(reward)
                .ok_or(RewardsError::Overflow("partial-epoch rewards"))?;
        }

        let remaining = reward_available.checked_sub(partial_rewards).ok_or_else(|| {
            RewardsError::NegativeRewardPool {
                txn_id: txn.display_id(),
                available: reward_available,
                deficit: partial_rewards - reward_available,
            }
        })?;

        let full_time_stake = total_before
            .checked_sub(partial_stake)
            .ok_or_else(|| mismatch(txn, "partial-epoch stake exceeds the tracked pool total"))?;
        for index in 0..self.ledger.slot_count() {
            let Some(record) = self.ledger.get(index) else { continue };
            let (account, balance, entry_round) =
                (record.account, record.balance, record.entry_round);
            if entry_round >= epoch_start || epoch_start - entry_round < epoch_length {
                continue;
            }
            if full_time_stake == 0 {
                return Err(mismatch(txn, "full-epoch stakers present without full-epoch stake"));
            }
            let reward = wide_ratio(&[balance, remaining], &[full_time_stake])
                .ok_or(RewardsError::Overflow("full-epoch reward"))?;
            self.credit_reward(index, account, reward)?;
        }

        tracing::trace!(
            "pool {}: partial stake {} took {}, {} left for {} full-epoch stake",
            self.pool_app_id,
            partial_stake,
            partial_rewards,
            remaining,
            full_time_stake
        );
        Ok(())
    }

    fn credit_reward(&mut self, index: usize, account: Account, reward: u64) -> Result<()> {
        self.ledger.credit(index, reward)?;
        self.rewards.credit(account, reward)?;
        self.counters.rewards_distributed = self
            .counters
            .rewards_distributed
            .checked_add(reward)
            .ok_or(RewardsError::Overflow("rewards distributed"))?;
        Ok(())
    }

    pub fn pool_app_id(&self) -> u64 {
        self.pool_app_id
    }

    pub fn ledger(&self) -> &LedgerState {
        &self.ledger
    }

    /// Cumulative rewards since the start of the replayed history.
    pub fn rewards(&self) -> &RewardMap {
        &self.rewards
    }

    /// Pool total as tracked by the contract's bookkeeping.
    pub fn tracked_total(&self) -> u64 {
        self.tracked_total
    }

    pub fn summary(&self) -> PoolSummary {
        PoolSummary {
            pool_app_id: self.pool_app_id,
            total_staked: self.ledger.total_staked(),
            tracked_total: self.tracked_total,
            active_stakers: self.ledger.active_stakers(),
            transactions: self.transactions,
            last_round: self.last_round,
            counters: self.counters,
        }
    }

    pub fn into_parts(self) -> (LedgerState, RewardMap, PoolSummary) {
        let summary = self.summary();
        (self.ledger, self.rewards, summary)
    }
}
