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

//! Confirmed transaction records consumed by the replay.
//!
//! These mirror the subset of the indexer's transaction shape the engine needs: a type tag, the
//! confirmation round, the sender, application call arguments or payment details, and the list of
//! inner transactions issued by the call.

use alloy_primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};

/// Identity of a staker or any other account on chain.
pub type Account = B256;

/// Transaction type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Pay,
    Keyreg,
    Acfg,
    Axfer,
    Afrz,
    Appl,
    Stpf,
    Hb,
}

/// Application call portion of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationCall {
    pub application_id: u64,
    #[serde(default)]
    pub application_args: Vec<Bytes>,
}

/// Payment portion of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransfer {
    pub amount: u64,
    pub receiver: Account,
}

/// A confirmed transaction, possibly carrying inner transactions to any depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Indexer id. Inner transactions usually have none.
    #[serde(default)]
    pub id: String,
    pub tx_type: TxType,
    pub confirmed_round: u64,
    pub sender: Account,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_transaction: Option<ApplicationCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_transaction: Option<PaymentTransfer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inner_txns: Vec<Transaction>,
}

impl Transaction {
    /// Application id called by this transaction, if it is an application call.
    pub fn application_id(&self) -> Option<u64> {
        self.application_transaction.as_ref().map(|call| call.application_id)
    }

    /// Raw application argument at `index`.
    pub fn arg(&self, index: usize) -> Option<&Bytes> {
        self.application_transaction.as_ref()?.application_args.get(index)
    }

    /// Four byte method selector carried in the first application argument, read big-endian.
    pub fn method_selector(&self) -> Option<u32> {
        let selector = self.arg(0)?.get(..4)?;
        Some(u32::from_be_bytes(selector.try_into().ok()?))
    }

    /// Big-endian `uint64` stored in the leading eight bytes of the argument at `index`.
    pub fn arg_u64(&self, index: usize) -> Option<u64> {
        let word = self.arg(index)?.get(..8)?;
        Some(u64::from_be_bytes(word.try_into().ok()?))
    }

    /// 32 byte account encoded in the argument at `index`.
    pub fn arg_account(&self, index: usize) -> Option<Account> {
        let arg = self.arg(index)?;
        (arg.len() == 32).then(|| Account::from_slice(arg))
    }

    pub fn is_payment(&self) -> bool {
        self.tx_type == TxType::Pay && self.payment_transaction.is_some()
    }

    /// Amount moved by this transaction when it is a payment.
    pub fn payment_amount(&self) -> Option<u64> {
        match self.tx_type {
            TxType::Pay => self.payment_transaction.as_ref().map(|pay| pay.amount),
            _ => None,
        }
    }

    /// Identifier used in diagnostics. Falls back to the round for inner transactions.
    pub fn display_id(&self) -> String {
        if self.id.is_empty() {
            format!("<inner txn @ round {}>", self.confirmed_round)
        } else {
            self.id.clone()
        }
    }
}
