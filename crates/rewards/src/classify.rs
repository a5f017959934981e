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

//! Classification of confirmed transactions into tracked pool operations.

use crate::{config::MethodSelectors, transaction::Transaction};

/// Pool methods whose calls change the reconstructed ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolMethod {
    /// `addStake`: a staker adds stake, paid by a sibling payment in the same group.
    AddStake,
    /// `removeStake`: the pool pays stake back through an inner payment.
    RemoveStake,
    /// `epochBalanceUpdate`: the epoch settlement that distributes rewards.
    EpochBalanceUpdate,
}

impl MethodSelectors {
    /// Map a selector to the tracked pool method it names, if any.
    pub fn pool_method(&self, selector: u32) -> Option<PoolMethod> {
        if selector == self.add_stake {
            Some(PoolMethod::AddStake)
        } else if selector == self.remove_stake {
            Some(PoolMethod::RemoveStake)
        } else if selector == self.epoch_balance_update {
            Some(PoolMethod::EpochBalanceUpdate)
        } else {
            None
        }
    }
}

/// A tracked call found somewhere in a transaction tree.
#[derive(Debug, Clone, Copy)]
pub struct TrackedCall<'a> {
    pub method: PoolMethod,
    pub call: &'a Transaction,
}

/// Classify `txn` itself, without looking at inner transactions.
pub fn direct_pool_method(
    txn: &Transaction,
    selectors: &MethodSelectors,
    pool_app_id: u64,
) -> Option<PoolMethod> {
    if txn.application_id()? != pool_app_id {
        return None;
    }
    selectors.pool_method(txn.method_selector()?)
}

/// Depth-first search for the first tracked call to `pool_app_id` in `txn` or its descendants.
///
/// Nodes are visited in pre-order with inner transactions in their recorded order.
pub fn find_tracked_call<'a>(
    txn: &'a Transaction,
    selectors: &MethodSelectors,
    pool_app_id: u64,
) -> Option<TrackedCall<'a>> {
    let mut stack = vec![txn];
    while let Some(node) = stack.pop() {
        if let Some(method) = direct_pool_method(node, selectors, pool_app_id) {
            return Some(TrackedCall { method, call: node });
        }
        stack.extend(node.inner_txns.iter().rev());
    }
    None
}

/// Whether `txn` is relevant to the replay of `pool_app_id`.
pub fn contains_tracked_call(
    txn: &Transaction,
    selectors: &MethodSelectors,
    pool_app_id: u64,
) -> bool {
    find_tracked_call(txn, selectors, pool_app_id).is_some()
}

/// Find the registry side-effect call among the direct inner transactions of a settlement.
pub fn find_registry_call<'a>(
    inner_txns: &'a [Transaction],
    selector: u32,
    registry_app_id: u64,
) -> Option<&'a Transaction> {
    inner_txns.iter().find(|txn| {
        txn.application_id() == Some(registry_app_id) && txn.method_selector() == Some(selector)
    })
}
