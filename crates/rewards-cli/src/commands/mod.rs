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

//! Commands of the rewards CLI.

mod pool;
mod validator;
mod vote;

pub use pool::PoolRewards;
pub use validator::{PoolOutcome, ValidatorRewards, ValidatorRewardsOutput};
pub use vote::{VoteCommand, VoteNote, VoteOutput, VotesFile};

use anyhow::Context;
use clap::Subcommand;
use serde::Serialize;

use crate::config::GlobalConfig;

/// Commands of the rewards CLI.
#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Reconstruct staker rewards of one pool.
    PoolRewards(PoolRewards),
    /// Reconstruct staker rewards across every pool of a validator.
    ValidatorRewards(ValidatorRewards),
    /// Weigh staker votes on a proposal by their rewards.
    Vote(VoteCommand),
}

impl Command {
    /// Run the command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        match self {
            Self::PoolRewards(cmd) => cmd.run(global_config).await,
            Self::ValidatorRewards(cmd) => cmd.run(global_config).await,
            Self::Vote(cmd) => cmd.run(global_config).await,
        }
    }
}

/// Print `value` to stdout as pretty JSON.
pub(crate) fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
