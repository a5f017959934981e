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

use anyhow::Context;
use clap::Args;
use reti_rewards::{
    fetch_validator_rewards, fetch_validator_rewards_by_pool, PoolReplay, ValidatorReplay,
};
use serde::Serialize;

use super::print_json;
use crate::config::{GlobalConfig, RoundArgs};

/// Command to reconstruct staker rewards across every pool of a validator.
#[derive(Args, Clone, Debug)]
pub struct ValidatorRewards {
    /// Id of the validator.
    pub validator_id: u64,
    #[clap(flatten)]
    pub rounds: RoundArgs,
    /// Report every pool on its own, keeping healthy pools when another one fails.
    #[clap(long)]
    pub per_pool: bool,
}

/// Outcome of replaying one pool in `--per-pool` mode.
#[derive(Debug, Clone, Serialize)]
pub struct PoolOutcome {
    pub pool_app_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay: Option<PoolReplay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ValidatorRewardsOutput {
    Merged(ValidatorReplay),
    PerPool(Vec<PoolOutcome>),
}

impl ValidatorRewards {
    /// Run the [ValidatorRewards] command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        print_json(&self.execute(global_config).await?)
    }

    pub async fn execute(
        &self,
        global_config: &GlobalConfig,
    ) -> anyhow::Result<ValidatorRewardsOutput> {
        let range = self.rounds.range()?;
        let config = global_config.load_config().await?;
        let validator = config.validator(self.validator_id)?;
        let source = global_config.load_source().await?;
        let rewards_config = config.rewards_config();

        if !self.per_pool {
            let replay = fetch_validator_rewards(&source, &rewards_config, validator, range)
                .await
                .with_context(|| format!("Failed to replay validator {}", self.validator_id))?;
            return Ok(ValidatorRewardsOutput::Merged(replay));
        }

        let outcomes =
            fetch_validator_rewards_by_pool(&source, &rewards_config, validator, range).await?;
        let outcomes = outcomes
            .into_iter()
            .map(|(pool_app_id, outcome)| match outcome {
                Ok(replay) => PoolOutcome { pool_app_id, replay: Some(replay), error: None },
                Err(err) => PoolOutcome { pool_app_id, replay: None, error: Some(err.to_string()) },
            })
            .collect();
        Ok(ValidatorRewardsOutput::PerPool(outcomes))
    }
}
