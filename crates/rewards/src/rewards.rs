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

//! Per-staker reward accumulation.

use std::collections::{btree_map, BTreeMap};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, RewardsError},
    transaction::Account,
};

/// Rewards earned per staker, in the smallest on-chain unit.
///
/// Ordered so that two maps with the same content serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardMap(BTreeMap<Account, u64>);

impl RewardMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to the reward of `account`, inserting it if absent (a zero credit still
    /// records the staker).
    pub fn credit(&mut self, account: Account, amount: u64) -> Result<()> {
        let entry = self.0.entry(account).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(RewardsError::Overflow("staker reward"))?;
        Ok(())
    }

    pub fn get(&self, account: &Account) -> Option<u64> {
        self.0.get(account).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Account, u64> {
        self.0.iter()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.0.keys()
    }

    /// Sum of all rewards. Wide enough that it cannot overflow.
    pub fn total(&self) -> u128 {
        self.0.values().map(|reward| u128::from(*reward)).sum()
    }

    /// Fold `other` into this map by per-staker summation.
    pub fn merge(&mut self, other: &RewardMap) -> Result<()> {
        for (account, reward) in other.iter() {
            self.credit(*account, *reward)?;
        }
        Ok(())
    }

    /// Rewards earned since `earlier` was captured.
    ///
    /// Every staker of `self` is reported; a staker absent from `earlier` counts from zero.
    /// Rewards only grow during a replay, so a later snapshot dominates an earlier one.
    pub fn delta_since(&self, earlier: &RewardMap) -> RewardMap {
        self.0
            .iter()
            .map(|(account, reward)| {
                (*account, reward.saturating_sub(earlier.get(account).unwrap_or(0)))
            })
            .collect()
    }

    pub fn into_inner(self) -> BTreeMap<Account, u64> {
        self.0
    }
}

/// Merge any number of reward maps. The result does not depend on their order.
pub fn merge_reward_maps<'a>(maps: impl IntoIterator<Item = &'a RewardMap>) -> Result<RewardMap> {
    let mut merged = RewardMap::new();
    for map in maps {
        merged.merge(map)?;
    }
    Ok(merged)
}

impl FromIterator<(Account, u64)> for RewardMap {
    fn from_iter<T: IntoIterator<Item = (Account, u64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<Account, u64>> for RewardMap {
    fn from(value: BTreeMap<Account, u64>) -> Self {
        Self(value)
    }
}

impl<'a> IntoIterator for &'a RewardMap {
    type Item = (&'a Account, &'a u64);
    type IntoIter = btree_map::Iter<'a, Account, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for RewardMap {
    type Item = (Account, u64);
    type IntoIter = btree_map::IntoIter<Account, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
