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

//! Paginated retrieval of confirmed transactions.

use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::{bail, Context};
use async_trait::async_trait;

use crate::transaction::Transaction;

/// Default number of records served per page by [InMemorySource].
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Search parameters for one page of transactions touching an application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionQuery {
    pub application_id: u64,
    /// Only return transactions confirmed at or before this round.
    pub max_round: Option<u64>,
    /// Continuation token returned by the previous page.
    pub next_token: Option<String>,
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    /// Present when more results may follow.
    pub next_token: Option<String>,
}

/// Source of confirmed transaction history, typically an indexer client.
///
/// Implementations own transport concerns such as retries. Any error returned here aborts the
/// replay that issued the request.
#[async_trait]
pub trait TransactionSource {
    async fn search_application_transactions(
        &self,
        query: &TransactionQuery,
    ) -> anyhow::Result<TransactionPage>;
}

pub type TransactionSourceObj = Arc<dyn TransactionSource + Send + Sync>;

/// Whether `txn` or any of its descendants calls `application_id`.
fn involves_application(txn: &Transaction, application_id: u64) -> bool {
    let mut stack = vec![txn];
    while let Some(node) = stack.pop() {
        if node.application_id() == Some(application_id) {
            return true;
        }
        stack.extend(node.inner_txns.iter());
    }
    false
}

/// A [TransactionSource] over a fixed set of transactions, served in pages.
///
/// Continuation tokens are the decimal offset of the next record.
#[derive(Debug)]
pub struct InMemorySource {
    transactions: Vec<Transaction>,
    page_size: usize,
    failing: BTreeSet<u64>,
    requests: AtomicUsize,
}

impl InMemorySource {
    pub fn new(page_size: usize) -> Self {
        Self {
            transactions: Vec::new(),
            page_size: page_size.max(1),
            failing: BTreeSet::new(),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn with_transactions(
        page_size: usize,
        transactions: impl IntoIterator<Item = Transaction>,
    ) -> Self {
        let mut source = Self::new(page_size);
        source.transactions.extend(transactions);
        source
    }

    pub fn insert(&mut self, txn: Transaction) {
        self.transactions.push(txn);
    }

    /// Make every search for `application_id` fail.
    pub fn fail_application(&mut self, application_id: u64) {
        self.failing.insert(application_id);
    }

    /// Number of pages requested so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

#[async_trait]
impl TransactionSource for InMemorySource {
    async fn search_application_transactions(
        &self,
        query: &TransactionQuery,
    ) -> anyhow::Result<TransactionPage> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&query.application_id) {
            bail!("search for application {} is unavailable", query.application_id);
        }

        let offset = match &query.next_token {
            Some(token) => token
                .parse::<usize>()
                .with_context(|| format!("invalid continuation token {token:?}"))?,
            None => 0,
        };
        let mut matching = self.transactions.iter().filter(|txn| {
            query.max_round.map_or(true, |max| txn.confirmed_round <= max)
                && involves_application(txn, query.application_id)
        });

        let transactions: Vec<Transaction> =
            matching.by_ref().skip(offset).take(self.page_size).cloned().collect();
        let next_token = if matching.next().is_some() {
            Some((offset + transactions.len()).to_string())
        } else {
            None
        };
        Ok(TransactionPage { transactions, next_token })
    }
}
