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

//! Replay driver: retrieves a pool's history and folds it through the [EventProcessor].

use std::time::Instant;

use futures_util::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};

use crate::{
    classify::contains_tracked_call,
    config::{RewardsConfig, ValidatorParams},
    error::{Result, RewardsError},
    ledger::LedgerState,
    processor::EventProcessor,
    rewards::{merge_reward_maps, RewardMap},
    source::{TransactionQuery, TransactionSource},
    stats::{PoolSummary, ValidatorSummary},
    transaction::Transaction,
};

/// Bounds of a reward window. Rewards are counted for transactions confirmed after `from` and at
/// or before `to`; a missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRange {
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl RoundRange {
    pub fn new(from: Option<u64>, to: Option<u64>) -> Result<Self> {
        let range = Self { from, to };
        range.validate()?;
        Ok(range)
    }

    /// Everything up to and including `to`.
    pub fn up_to(to: u64) -> Self {
        Self { from: None, to: Some(to) }
    }

    pub fn validate(&self) -> Result<()> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => Err(RewardsError::InvalidRoundRange { from, to }),
            _ => Ok(()),
        }
    }

    fn past_upper_bound(&self, round: u64) -> bool {
        self.to.is_some_and(|to| round > to)
    }
}

/// Result of replaying one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolReplay {
    pub pool_app_id: u64,
    pub range: RoundRange,
    /// Rewards earned inside the window.
    pub rewards: RewardMap,
    /// Rewards earned from the start of the history up to the upper bound.
    pub cumulative_rewards: RewardMap,
    pub ledger: LedgerState,
    pub summary: PoolSummary,
}

/// Result of replaying every pool of a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatorReplay {
    pub validator_id: u64,
    pub range: RoundRange,
    /// Per-staker rewards summed over all pools.
    pub rewards: RewardMap,
    pub pools: Vec<PoolReplay>,
    pub summary: ValidatorSummary,
}

/// Retrieve every transaction of `pool_app_id` that carries a tracked call, in ascending round
/// order. Records in the same round keep the order the source returned them in.
///
/// Pages are requested until the continuation token runs out, or until a page holds a record
/// confirmed after `max_round`.
pub async fn fetch_pool_transactions<S>(
    source: &S,
    config: &RewardsConfig,
    pool_app_id: u64,
    max_round: Option<u64>,
) -> Result<Vec<Transaction>>
where
    S: TransactionSource + Sync + ?Sized,
{
    let mut query = TransactionQuery { application_id: pool_app_id, max_round, next_token: None };
    let mut transactions = Vec::new();
    let mut pages = 0usize;
    loop {
        let page = source
            .search_application_transactions(&query)
            .await
            .map_err(RewardsError::Retrieval)?;
        pages += 1;

        let received = page.transactions.len();
        let mut past_bound = false;
        for txn in page.transactions {
            if max_round.is_some_and(|max| txn.confirmed_round > max) {
                past_bound = true;
                continue;
            }
            if contains_tracked_call(&txn, &config.selectors, pool_app_id) {
                transactions.push(txn);
            }
        }
        tracing::debug!(
            "pool {}: page {} held {} records, {} tracked so far",
            pool_app_id,
            pages,
            received,
            transactions.len()
        );

        match page.next_token {
            Some(token) if !token.is_empty() && received > 0 && !past_bound => {
                query.next_token = Some(token)
            }
            _ => break,
        }
    }

    transactions.sort_by_key(|txn| txn.confirmed_round);
    Ok(transactions)
}

/// Replay already retrieved transactions of one pool.
///
/// With a lower bound, the cumulative rewards are snapshotted just before the first transaction
/// confirmed after it and the window rewards are the difference to the final state. When no
/// transaction follows the lower bound the snapshot is the final state and every delta is zero.
pub fn replay_pool_transactions(
    config: &RewardsConfig,
    validator: &ValidatorParams,
    pool_app_id: u64,
    transactions: &[Transaction],
    range: RoundRange,
) -> Result<PoolReplay> {
    range.validate()?;
    let mut ordered: Vec<&Transaction> = transactions.iter().collect();
    ordered.sort_by_key(|txn| txn.confirmed_round);

    let mut processor = EventProcessor::new(config, validator, pool_app_id)?;
    let mut snapshot: Option<RewardMap> = None;
    for txn in ordered {
        if range.past_upper_bound(txn.confirmed_round) {
            break;
        }
        if let Some(from) = range.from {
            if snapshot.is_none() && txn.confirmed_round > from {
                snapshot = Some(processor.rewards().clone());
            }
        }
        processor.process(txn)?;
    }

    let (ledger, cumulative_rewards, summary) = processor.into_parts();
    let rewards = match (range.from, snapshot) {
        (None, _) => cumulative_rewards.clone(),
        (Some(_), Some(snapshot)) => cumulative_rewards.delta_since(&snapshot),
        (Some(_), None) => cumulative_rewards.delta_since(&cumulative_rewards),
    };
    Ok(PoolReplay { pool_app_id, range, rewards, cumulative_rewards, ledger, summary })
}

/// Retrieve and replay the history of one pool.
pub async fn fetch_pool_rewards<S>(
    source: &S,
    config: &RewardsConfig,
    validator: &ValidatorParams,
    pool_app_id: u64,
    range: RoundRange,
) -> Result<PoolReplay>
where
    S: TransactionSource + Sync + ?Sized,
{
    range.validate()?;
    let start = Instant::now();
    tracing::info!("Replaying pool {} of validator {} ({:?})", pool_app_id, validator.id, range);

    let transactions = fetch_pool_transactions(source, config, pool_app_id, range.to).await?;
    let replay = replay_pool_transactions(config, validator, pool_app_id, &transactions, range)?;

    tracing::info!(
        "Replayed pool {}: {} transactions, {} active stakers, {} stakers rewarded in {:?}",
        pool_app_id,
        replay.summary.transactions,
        replay.summary.active_stakers,
        replay.rewards.len(),
        start.elapsed()
    );
    Ok(replay)
}

/// Replay every pool of a validator concurrently and sum rewards per staker.
///
/// Fails if any pool fails. See [fetch_validator_rewards_by_pool] to keep healthy pools.
pub async fn fetch_validator_rewards<S>(
    source: &S,
    config: &RewardsConfig,
    validator: &ValidatorParams,
    range: RoundRange,
) -> Result<ValidatorReplay>
where
    S: TransactionSource + Sync + ?Sized,
{
    range.validate()?;
    config.validate()?;
    validator.validate(&config.protocol)?;
    let start = Instant::now();
    tracing::info!("Replaying {} pools of validator {}", validator.pools.len(), validator.id);

    let pools = try_join_all(
        validator
            .pools
            .iter()
            .map(|pool_app_id| fetch_pool_rewards(source, config, validator, *pool_app_id, range)),
    )
    .await?;

    let rewards = merge_reward_maps(pools.iter().map(|pool| &pool.rewards))?;
    let summary = ValidatorSummary::from_pools(
        validator.id,
        pools.iter().map(|pool| (&pool.summary, pool.ledger.balances())),
    )?;

    tracing::info!(
        "Replayed validator {}: {} pools, {} unique stakers, {} stakers rewarded in {:?}",
        validator.id,
        summary.pools,
        summary.unique_stakers,
        rewards.len(),
        start.elapsed()
    );
    Ok(ValidatorReplay { validator_id: validator.id, range, rewards, pools, summary })
}

/// Replay every pool of a validator concurrently, reporting each pool's outcome separately.
///
/// Only an invalid range fails the whole call, before any retrieval.
pub async fn fetch_validator_rewards_by_pool<S>(
    source: &S,
    config: &RewardsConfig,
    validator: &ValidatorParams,
    range: RoundRange,
) -> Result<Vec<(u64, Result<PoolReplay>)>>
where
    S: TransactionSource + Sync + ?Sized,
{
    range.validate()?;
    let outcomes = join_all(
        validator
            .pools
            .iter()
            .map(|pool_app_id| fetch_pool_rewards(source, config, validator, *pool_app_id, range)),
    )
    .await;

    let outcomes: Vec<_> = validator.pools.iter().copied().zip(outcomes).collect();
    for (pool_app_id, outcome) in &outcomes {
        if let Err(err) = outcome {
            tracing::warn!("pool {} of validator {} failed: {}", pool_app_id, validator.id, err);
        }
    }
    Ok(outcomes)
}
