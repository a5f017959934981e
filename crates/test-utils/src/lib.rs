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

//! Test utilities for the Reti rewards crates.
//!
//! Builders for synthetic transaction trees shaped like the ones the staking contracts produce,
//! plus a ready-made configuration and validator.

use alloy_primitives::Bytes;
use reti_rewards::{
    method_selector, Account, ApplicationCall, MethodSelectors, PaymentTransfer,
    ProtocolConstants, RewardsConfig, SettlementReport, Transaction, TxType, ValidatorParams,
};

pub const REGISTRY_APP_ID: u64 = 900;
pub const POOL_APP_ID: u64 = 1001;
pub const VALIDATOR_ID: u64 = 1;
pub const EPOCH_ROUND_LENGTH: u64 = 1286;
/// 5% commission.
pub const PERCENT_TO_VALIDATOR: u64 = 50_000;

pub const ADD_STAKE: &str = "addStake(pay,address)uint64";
pub const REMOVE_STAKE: &str = "removeStake(address,uint64)void";
pub const EPOCH_BALANCE_UPDATE: &str = "epochBalanceUpdate()void";
pub const STAKE_UPDATED_VIA_REWARDS: &str =
    "stakeUpdatedViaRewards((uint64,uint64,uint64),uint64,uint64,uint64,uint64)void";
const REGISTRY_ADD_STAKE: &str = "addStake(pay,uint64,uint64)(uint64,uint64,uint64)";

pub fn test_selectors() -> MethodSelectors {
    MethodSelectors {
        add_stake: method_selector(ADD_STAKE),
        remove_stake: method_selector(REMOVE_STAKE),
        epoch_balance_update: method_selector(EPOCH_BALANCE_UPDATE),
        stake_updated_via_rewards: method_selector(STAKE_UPDATED_VIA_REWARDS),
    }
}

/// Configuration with the default protocol constants.
pub fn test_config() -> RewardsConfig {
    RewardsConfig {
        selectors: test_selectors(),
        registry_app_id: REGISTRY_APP_ID,
        protocol: ProtocolConstants::default(),
    }
}

/// Configuration where deposits count from the round of their payment.
pub fn instant_activation_config() -> RewardsConfig {
    let mut config = test_config();
    config.protocol.staking_activation_delay = 0;
    config
}

pub fn test_validator(pools: &[u64]) -> ValidatorParams {
    ValidatorParams {
        id: VALIDATOR_ID,
        epoch_round_length: EPOCH_ROUND_LENGTH,
        percent_to_validator: PERCENT_TO_VALIDATOR,
        pools: pools.to_vec(),
    }
}

/// Deterministic staker account.
pub fn staker(n: u8) -> Account {
    Account::repeat_byte(n)
}

/// Account of an application, for use as payment sender or receiver.
pub fn app_account(app_id: u64) -> Account {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&app_id.to_be_bytes());
    Account::from(bytes)
}

pub fn selector_arg(selector: u32) -> Bytes {
    Bytes::from(selector.to_be_bytes().to_vec())
}

pub fn u64_arg(value: u64) -> Bytes {
    Bytes::from(value.to_be_bytes().to_vec())
}

pub fn account_arg(account: Account) -> Bytes {
    Bytes::from(account.to_vec())
}

pub fn app_call(app_id: u64, sender: Account, round: u64, args: Vec<Bytes>) -> Transaction {
    Transaction {
        id: String::new(),
        tx_type: TxType::Appl,
        confirmed_round: round,
        sender,
        application_transaction: Some(ApplicationCall {
            application_id: app_id,
            application_args: args,
        }),
        payment_transaction: None,
        inner_txns: vec![],
    }
}

pub fn payment(sender: Account, receiver: Account, amount: u64, round: u64) -> Transaction {
    Transaction {
        id: String::new(),
        tx_type: TxType::Pay,
        confirmed_round: round,
        sender,
        application_transaction: None,
        payment_transaction: Some(PaymentTransfer { amount, receiver }),
        inner_txns: vec![],
    }
}

/// Builds top-level transactions touching one pool.
#[derive(Debug, Clone)]
pub struct PoolTxnBuilder {
    pub pool_app_id: u64,
    pub registry_app_id: u64,
    pub selectors: MethodSelectors,
    issued: u64,
}

impl PoolTxnBuilder {
    pub fn new(config: &RewardsConfig, pool_app_id: u64) -> Self {
        Self {
            pool_app_id,
            registry_app_id: config.registry_app_id,
            selectors: config.selectors,
            issued: 0,
        }
    }

    fn finish(&mut self, kind: &str, mut txn: Transaction) -> Transaction {
        self.issued += 1;
        txn.id = format!("{kind}-{}-{}", self.pool_app_id, self.issued);
        txn
    }

    fn pool_add_stake(&self, account: Account, round: u64) -> Transaction {
        app_call(
            self.pool_app_id,
            app_account(self.registry_app_id),
            round,
            vec![selector_arg(self.selectors.add_stake), account_arg(account)],
        )
    }

    /// A registry call routing `amount` into the pool. The payment and the pool's `addStake`
    /// call are siblings among the registry call's inner transactions.
    pub fn deposit(&mut self, account: Account, amount: u64, round: u64) -> Transaction {
        let mut outer = app_call(
            self.registry_app_id,
            account,
            round,
            vec![selector_arg(method_selector(REGISTRY_ADD_STAKE))],
        );
        outer.inner_txns = vec![
            payment(
                app_account(self.registry_app_id),
                app_account(self.pool_app_id),
                amount,
                round,
            ),
            self.pool_add_stake(account, round),
        ];
        self.finish("deposit", outer)
    }

    /// A pool `addStake` call with no payment anywhere in its group.
    pub fn unpaid_deposit(&mut self, account: Account, round: u64) -> Transaction {
        let mut outer = app_call(
            self.registry_app_id,
            account,
            round,
            vec![selector_arg(method_selector(REGISTRY_ADD_STAKE))],
        );
        outer.inner_txns = vec![self.pool_add_stake(account, round)];
        self.finish("unpaid-deposit", outer)
    }

    /// A direct `removeStake` call paying `amount` back to the staker.
    pub fn withdrawal(&mut self, account: Account, amount: u64, round: u64) -> Transaction {
        let mut call = app_call(
            self.pool_app_id,
            account,
            round,
            vec![selector_arg(self.selectors.remove_stake), account_arg(account), u64_arg(amount)],
        );
        call.inner_txns = vec![payment(app_account(self.pool_app_id), account, amount, round)];
        self.finish("withdrawal", call)
    }

    /// An `epochBalanceUpdate` call reporting `report` to the registry.
    pub fn settlement(&mut self, round: u64, report: SettlementReport) -> Transaction {
        let mut call = app_call(
            self.pool_app_id,
            Account::ZERO,
            round,
            vec![selector_arg(self.selectors.epoch_balance_update)],
        );
        call.inner_txns = vec![app_call(
            self.registry_app_id,
            app_account(self.pool_app_id),
            round,
            vec![
                selector_arg(self.selectors.stake_updated_via_rewards),
                u64_arg(self.pool_app_id),
                u64_arg(report.stake_increase),
                u64_arg(0),
                u64_arg(report.commission_paid),
                u64_arg(report.excess_to_fee_sink),
            ],
        )];
        self.finish("settlement", call)
    }

    /// Settlement paying `commission_paid` to the validator and `stake_increase` to stakers.
    pub fn commission_settlement(
        &mut self,
        round: u64,
        stake_increase: u64,
        commission_paid: u64,
    ) -> Transaction {
        self.settlement(
            round,
            SettlementReport { stake_increase, commission_paid, excess_to_fee_sink: 0 },
        )
    }

    /// An `epochBalanceUpdate` call with nothing to distribute.
    pub fn empty_settlement(&mut self, round: u64) -> Transaction {
        let call = app_call(
            self.pool_app_id,
            Account::ZERO,
            round,
            vec![selector_arg(self.selectors.epoch_balance_update)],
        );
        self.finish("empty-settlement", call)
    }

    /// A call to the pool with a method that is not tracked.
    pub fn untracked_call(&mut self, round: u64) -> Transaction {
        let call =
            app_call(self.pool_app_id, Account::ZERO, round, vec![selector_arg(0xdead_beef)]);
        self.finish("untracked", call)
    }
}
