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

use anyhow::{ensure, Context};
use clap::Args;
use reti_rewards::{fetch_pool_rewards, PoolReplay};

use super::print_json;
use crate::config::{GlobalConfig, RoundArgs};

/// Command to reconstruct staker rewards of one pool.
#[derive(Args, Clone, Debug)]
pub struct PoolRewards {
    /// Application id of the pool.
    pub pool_app_id: u64,
    /// Validator owning the pool. Looked up in the configuration when omitted.
    #[clap(long)]
    pub validator: Option<u64>,
    #[clap(flatten)]
    pub rounds: RoundArgs,
    /// Print only the per-staker rewards.
    #[clap(long)]
    pub rewards_only: bool,
}

impl PoolRewards {
    /// Run the [PoolRewards] command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        let replay = self.execute(global_config).await?;
        if self.rewards_only {
            print_json(&replay.rewards)
        } else {
            print_json(&replay)
        }
    }

    /// Replay the pool without printing anything.
    pub async fn execute(&self, global_config: &GlobalConfig) -> anyhow::Result<PoolReplay> {
        let range = self.rounds.range()?;
        let config = global_config.load_config().await?;
        let validator = match self.validator {
            Some(id) => config.validator(id)?,
            None => config.validator_of_pool(self.pool_app_id)?,
        };
        ensure!(
            validator.pools.contains(&self.pool_app_id),
            "pool {} does not belong to validator {}",
            self.pool_app_id,
            validator.id
        );
        let source = global_config.load_source().await?;

        fetch_pool_rewards(&source, &config.rewards_config(), validator, self.pool_app_id, range)
            .await
            .with_context(|| format!("Failed to replay pool {}", self.pool_app_id))
    }
}
