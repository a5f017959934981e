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

//! Error taxonomy for pool replays.

use thiserror::Error;

use crate::transaction::Account;

/// Errors produced while reconstructing pool ledgers.
///
/// Every variant is fatal for the replay of the affected pool. Partial reward maps are never
/// returned alongside an error.
#[derive(Error, Debug)]
pub enum RewardsError {
    #[error("malformed transaction group in {txn_id}: {reason}")]
    MalformedTransactionGroup { txn_id: String, reason: &'static str },

    #[error("transaction {txn_id} references staker {account} with no active ledger record")]
    UnknownStakerReference { txn_id: String, account: Account },

    #[error(
        "settlement {txn_id} allocated {deficit} more to partial-epoch stakers than the {available} available"
    )]
    NegativeRewardPool { txn_id: String, available: u64, deficit: u64 },

    #[error("round range is inverted: from {from} is larger than to {to}")]
    InvalidRoundRange { from: u64, to: u64 },

    #[error("stake accounting mismatch in {txn_id}: {reason}")]
    StakeAccountingMismatch { txn_id: String, reason: &'static str },

    #[error(
        "conservation violated in pool {pool_app_id}: ledger total {ledger_total} != roster sum {roster_total}"
    )]
    ConservationViolation { pool_app_id: u64, ledger_total: u64, roster_total: u128 },

    #[error("ledger slot {0} is not occupied")]
    VacantSlot(usize),

    #[error("arithmetic overflow: {0}")]
    Overflow(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("vote for {0} does not sum to the fixed denominator")]
    UnnormalizedVote(String),

    #[error("transaction retrieval failed: {0:#}")]
    Retrieval(#[source] anyhow::Error),
}

pub type Result<T, E = RewardsError> = std::result::Result<T, E>;
