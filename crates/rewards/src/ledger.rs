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

//! Reconstructed staker roster of a single pool.
//!
//! The roster mirrors the pool contract's fixed-capacity staker array: a vacated slot is reused by
//! the next new staker, and a vacated trailing slot is dropped. Vacancy is an explicit state of a
//! slot rather than a sentinel account.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    error::{Result, RewardsError},
    transaction::Account,
};

/// One staker's reconstructed position in a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StakerRecord {
    pub account: Account,
    pub balance: u64,
    /// Round from which the current balance counts as fully active.
    pub entry_round: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "staker")]
pub enum Slot {
    Occupied(StakerRecord),
    Vacant,
}

/// Staker roster and its aggregate stake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerState {
    slots: Vec<Slot>,
    total_staked: u64,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_by_account(&self, account: &Account) -> Option<usize> {
        self.slots.iter().position(|slot| match slot {
            Slot::Occupied(record) => record.account == *account,
            Slot::Vacant => false,
        })
    }

    /// Place `record` in the first vacant slot, or append it, and return the slot index.
    pub fn insert_or_reuse(&mut self, record: StakerRecord) -> Result<usize> {
        self.total_staked = self
            .total_staked
            .checked_add(record.balance)
            .ok_or(RewardsError::Overflow("pool total staked"))?;
        match self.slots.iter().position(|slot| matches!(slot, Slot::Vacant)) {
            Some(index) => {
                self.slots[index] = Slot::Occupied(record);
                Ok(index)
            }
            None => {
                self.slots.push(Slot::Occupied(record));
                Ok(self.slots.len() - 1)
            }
        }
    }

    /// Vacate the slot at `index`, returning the record it held.
    ///
    /// The last slot is removed outright; any other slot is marked vacant for reuse. Whatever
    /// balance remains on the record leaves the ledger total with it.
    pub fn vacate(&mut self, index: usize) -> Option<StakerRecord> {
        let slot = self.slots.get_mut(index)?;
        let record = match std::mem::replace(slot, Slot::Vacant) {
            Slot::Occupied(record) => record,
            Slot::Vacant => return None,
        };
        if index == self.slots.len() - 1 {
            self.slots.pop();
        }
        self.total_staked -= record.balance;
        Some(record)
    }

    pub fn get(&self, index: usize) -> Option<&StakerRecord> {
        match self.slots.get(index)? {
            Slot::Occupied(record) => Some(record),
            Slot::Vacant => None,
        }
    }

    /// Add `amount` to the balance in slot `index`.
    pub fn credit(&mut self, index: usize, amount: u64) -> Result<()> {
        let total = self
            .total_staked
            .checked_add(amount)
            .ok_or(RewardsError::Overflow("pool total staked"))?;
        let record = self.get_mut(index)?;
        record.balance =
            record.balance.checked_add(amount).ok_or(RewardsError::Overflow("staker balance"))?;
        self.total_staked = total;
        Ok(())
    }

    /// Remove up to `amount` from the balance in slot `index`, returning the residual balance.
    ///
    /// A debit larger than the balance empties it; the balance never goes negative.
    pub fn debit(&mut self, index: usize, amount: u64) -> Result<u64> {
        let record = self.get_mut(index)?;
        let taken = amount.min(record.balance);
        record.balance -= taken;
        let residual = record.balance;
        self.total_staked -= taken;
        Ok(residual)
    }

    pub fn set_entry_round(&mut self, index: usize, entry_round: u64) -> Result<()> {
        self.get_mut(index)?.entry_round = entry_round;
        Ok(())
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut StakerRecord> {
        match self.slots.get_mut(index) {
            Some(Slot::Occupied(record)) => Ok(record),
            _ => Err(RewardsError::VacantSlot(index)),
        }
    }

    /// Occupied slots with their indices, in slot order.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &StakerRecord)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| match slot {
            Slot::Occupied(record) => Some((index, record)),
            Slot::Vacant => None,
        })
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn active_stakers(&self) -> usize {
        self.occupied().count()
    }

    pub fn total_staked(&self) -> u64 {
        self.total_staked
    }

    /// Balance per staker.
    pub fn balances(&self) -> BTreeMap<Account, u64> {
        self.occupied().map(|(_, record)| (record.account, record.balance)).collect()
    }

    /// Verify that the occupied balances add up to the ledger total.
    ///
    /// The ledger total moves with every credit, debit and vacate, so this only guards the
    /// roster's own bookkeeping. The gap to the contract-tracked pool total is reported as
    /// [crate::PoolSummary::drift] and is not an error.
    pub fn check_conservation(&self, pool_app_id: u64) -> Result<()> {
        let roster_total: u128 = self.occupied().map(|(_, record)| u128::from(record.balance)).sum();
        if roster_total != u128::from(self.total_staked) {
            return Err(RewardsError::ConservationViolation {
                pool_app_id,
                ledger_total: self.total_staked,
                roster_total,
            });
        }
        Ok(())
    }
}
