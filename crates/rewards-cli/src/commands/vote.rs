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

use std::path::PathBuf;

use anyhow::{ensure, Context};
use clap::Args;
use reti_rewards::{
    aggregate_vote, committee_window, fetch_validator_rewards, latest_votes, Account, RoundRange,
    Vote, VoteRecord,
};
use serde::{Deserialize, Serialize};

use super::print_json;
use crate::config::{read_file, GlobalConfig, RoundArgs};

/// Default alignment of committee windows, in rounds.
const DEFAULT_COMMITTEE_MULTIPLE: u64 = 1_000_000;

/// Command to weigh staker votes on a proposal by the stakers' rewards.
#[derive(Args, Clone, Debug)]
pub struct VoteCommand {
    /// Id of the validator casting the vote.
    pub validator_id: u64,
    /// File with the owner's vote and the stakers' votes or vote notes (YAML or JSON).
    #[clap(long)]
    pub votes: PathBuf,
    /// Proposal that vote notes must refer to.
    #[clap(long)]
    pub proposal: Option<u64>,
    /// Round the proposal was created in. Derives the reward window from the committee schedule.
    #[clap(long, requires = "committee_window", conflicts_with_all = ["round_from", "round_to"])]
    pub created_round: Option<u64>,
    /// Committee windows end on multiples of this many rounds.
    #[clap(long, default_value_t = DEFAULT_COMMITTEE_MULTIPLE)]
    pub committee_multiple: u64,
    /// Length of the committee window in rounds.
    #[clap(long)]
    pub committee_window: Option<u64>,
    #[clap(flatten)]
    pub rounds: RoundArgs,
}

/// Contents of the votes file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotesFile {
    /// Vote applied to the weight of stakers that did not vote.
    pub owner: Vote,
    #[serde(default)]
    pub votes: Vec<VoteRecord>,
    #[serde(default)]
    pub notes: Vec<VoteNote>,
}

/// Raw vote note sent by a staker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteNote {
    pub staker: Account,
    pub round: u64,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteOutput {
    pub validator_id: u64,
    pub range: RoundRange,
    pub rewards_total: u128,
    pub stakers: usize,
    /// Stakers with rewards that cast their own vote.
    pub explicit_votes: usize,
    pub vote: Vote,
}

impl VoteCommand {
    /// Run the [VoteCommand] command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        print_json(&self.execute(global_config).await?)
    }

    fn range(&self) -> anyhow::Result<RoundRange> {
        match (self.created_round, self.committee_window) {
            (Some(created_round), Some(window)) => {
                Ok(committee_window(created_round, self.committee_multiple, window)?)
            }
            (Some(_), None) => anyhow::bail!("--created-round requires --committee-window"),
            _ => self.rounds.range(),
        }
    }

    pub async fn execute(&self, global_config: &GlobalConfig) -> anyhow::Result<VoteOutput> {
        let range = self.range()?;
        let config = global_config.load_config().await?;
        let validator = config.validator(self.validator_id)?;
        let ppm_max = config.protocol.ppm_max;

        let file: VotesFile = read_file(&self.votes).await?;
        ensure!(
            file.notes.is_empty() || self.proposal.is_some(),
            "--proposal is required to read vote notes"
        );
        let mut records = file.votes.clone();
        for note in &file.notes {
            match Vote::parse_note(&note.note, ppm_max) {
                Some((proposal, vote)) if Some(proposal) == self.proposal => {
                    records.push(VoteRecord { staker: note.staker, round: note.round, vote })
                }
                _ => tracing::debug!("Ignoring note from {}: {:?}", note.staker, note.note),
            }
        }

        let source = global_config.load_source().await?;
        let replay = fetch_validator_rewards(&source, &config.rewards_config(), validator, range)
            .await
            .with_context(|| format!("Failed to replay validator {}", self.validator_id))?;

        let votes = latest_votes(&records, ppm_max);
        let vote = aggregate_vote(&replay.rewards, &votes, &file.owner, ppm_max)?;
        let explicit_votes =
            replay.rewards.accounts().filter(|staker| votes.contains_key(*staker)).count();
        tracing::info!(
            "Validator {} votes {:?} for {} stakers ({} explicit)",
            self.validator_id,
            vote,
            replay.rewards.len(),
            explicit_votes
        );

        Ok(VoteOutput {
            validator_id: self.validator_id,
            range,
            rewards_total: replay.rewards.total(),
            stakers: replay.rewards.len(),
            explicit_votes,
            vote,
        })
    }
}
