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

//! Ledger replay and reward reconstruction for Reti staking pools.
//!
//! Staker balances and per-staker rewards are rebuilt from the confirmed transaction history of a
//! pool, reproducing the pool contract's integer arithmetic. Rewards of every pool of a validator
//! can be merged, and used to weigh staker votes on governance proposals.

pub mod classify;
pub mod config;
pub mod error;
pub mod ledger;
pub mod processor;
pub mod replay;
pub mod rewards;
pub mod source;
pub mod stats;
pub mod transaction;
pub mod vote;

pub use classify::{
    contains_tracked_call, direct_pool_method, find_registry_call, find_tracked_call, PoolMethod,
    TrackedCall,
};

pub use config::{
    method_selector, MethodFingerprint, MethodFingerprints, MethodSelectors, ProtocolConstants,
    RewardsConfig, ValidatorParams,
};

pub use error::{Result, RewardsError};

pub use ledger::{LedgerState, Slot, StakerRecord};

pub use processor::{EventProcessor, SettlementReport};

pub use replay::{
    fetch_pool_rewards, fetch_pool_transactions, fetch_validator_rewards,
    fetch_validator_rewards_by_pool, replay_pool_transactions, PoolReplay, RoundRange,
    ValidatorReplay,
};

pub use rewards::{merge_reward_maps, RewardMap};

pub use source::{
    InMemorySource, TransactionPage, TransactionQuery, TransactionSource, TransactionSourceObj,
};

pub use stats::{PoolCounters, PoolSummary, ValidatorSummary};

pub use transaction::{Account, ApplicationCall, PaymentTransfer, Transaction, TxType};

pub use vote::{aggregate_vote, committee_window, latest_votes, Vote, VoteRecord};
