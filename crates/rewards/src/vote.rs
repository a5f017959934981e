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

//! Reward-weighted aggregation of staker votes into a single pool vote.

use std::collections::BTreeMap;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, RewardsError},
    replay::RoundRange,
    rewards::RewardMap,
    transaction::Account,
};

/// Prefix of the payment notes through which stakers express an opinion on a proposal.
pub const VOTE_NOTE_PREFIX: &str = "xGovReti";

/// Split of one voice across the three options, in fixed-point parts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub approvals: u64,
    pub rejections: u64,
    pub nulls: u64,
}

impl Vote {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the three fields sum exactly to `denominator`.
    pub fn is_normalized(&self, denominator: u64) -> bool {
        u128::from(self.approvals) + u128::from(self.rejections) + u128::from(self.nulls)
            == u128::from(denominator)
    }

    /// Parse a note of the form `xGovReti/<proposal>:j{"a":..,"r":..,"n":..}`.
    ///
    /// Fields may be JSON integers or decimal strings. Returns the proposal id and the vote, or
    /// `None` when the note is not a vote or the vote is not normalized.
    pub fn parse_note(note: &str, denominator: u64) -> Option<(u64, Vote)> {
        let rest = note.strip_prefix(VOTE_NOTE_PREFIX)?.strip_prefix('/')?;
        let (proposal, json) = rest.split_once(':')?;
        let json = json.strip_prefix('j')?;
        let proposal = proposal.parse::<u64>().ok()?;

        let value: serde_json::Value = serde_json::from_str(json).ok()?;
        let field = |key: &str| match value.get(key)? {
            serde_json::Value::Number(number) => number.as_u64(),
            serde_json::Value::String(digits) => digits.parse::<u64>().ok(),
            _ => None,
        };
        let vote = Vote { approvals: field("a")?, rejections: field("r")?, nulls: field("n")? };
        vote.is_normalized(denominator).then_some((proposal, vote))
    }

    /// Inverse of [Vote::parse_note].
    pub fn to_note(&self, proposal: u64) -> String {
        format!(
            "{VOTE_NOTE_PREFIX}/{proposal}:j{{\"a\":{},\"r\":{},\"n\":{}}}",
            self.approvals, self.rejections, self.nulls
        )
    }
}

/// A vote cast by a staker at a given round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub staker: Account,
    pub round: u64,
    pub vote: Vote,
}

/// Keep the most recent normalized vote of every staker.
///
/// Votes in the same round are ordered by their position in `records`, later ones winning.
/// Records that are not normalized are ignored, so an older valid vote still counts.
pub fn latest_votes<'a>(
    records: impl IntoIterator<Item = &'a VoteRecord>,
    denominator: u64,
) -> BTreeMap<Account, Vote> {
    let mut latest: BTreeMap<Account, (u64, Vote)> = BTreeMap::new();
    for record in records {
        if !record.vote.is_normalized(denominator) {
            continue;
        }
        match latest.get(&record.staker) {
            Some((round, _)) if *round > record.round => {}
            _ => {
                latest.insert(record.staker, (record.round, record.vote));
            }
        }
    }
    latest.into_iter().map(|(staker, (_, vote))| (staker, vote)).collect()
}

/// Combine staker votes into one vote weighted by each staker's reward.
///
/// Stakers without an explicit vote lend their weight to `owner`. The result is normalized to
/// `denominator`, with the rounding shortfall counted as nulls. An empty or all-zero reward map
/// yields [Vote::empty].
///
/// Every vote that carries weight must already sum to `denominator`. This includes `owner` when
/// some stakers did not vote. An owner vote that falls short is rejected with
/// [RewardsError::UnnormalizedVote] instead of having the gap counted as nulls.
pub fn aggregate_vote(
    rewards: &RewardMap,
    votes: &BTreeMap<Account, Vote>,
    owner: &Vote,
    denominator: u64,
) -> Result<Vote> {
    let mut approvals = U256::ZERO;
    let mut rejections = U256::ZERO;
    let mut nulls = U256::ZERO;
    let mut unassigned = U256::ZERO;
    let mut total = U256::ZERO;

    let mut accumulate = |vote: &Vote, weight: U256| {
        approvals += U256::from(vote.approvals) * weight;
        rejections += U256::from(vote.rejections) * weight;
        nulls += U256::from(vote.nulls) * weight;
    };
    for (staker, reward) in rewards {
        let weight = U256::from(*reward);
        total += weight;
        match votes.get(staker) {
            Some(vote) if !vote.is_normalized(denominator) => {
                return Err(RewardsError::UnnormalizedVote(staker.to_string()));
            }
            Some(vote) => accumulate(vote, weight),
            None => unassigned += weight,
        }
    }
    if !unassigned.is_zero() {
        if !owner.is_normalized(denominator) {
            return Err(RewardsError::UnnormalizedVote("pool owner".into()));
        }
        accumulate(owner, unassigned);
    }

    if total.is_zero() {
        return Ok(Vote::empty());
    }
    let normalize = |sum: U256| {
        u64::try_from(sum / total).map_err(|_| RewardsError::Overflow("normalized vote"))
    };
    let mut vote = Vote {
        approvals: normalize(approvals)?,
        rejections: normalize(rejections)?,
        nulls: normalize(nulls)?,
    };
    let shortfall = denominator
        .checked_sub(vote.approvals + vote.rejections + vote.nulls)
        .ok_or(RewardsError::Overflow("vote exceeds denominator"))?;
    vote.nulls += shortfall;
    Ok(vote)
}

/// Round window whose rewards weigh a proposal's committee vote.
///
/// The window ends at `created_round` rounded down to a multiple of `multiple` and spans `window`
/// rounds before that, clamped at genesis.
pub fn committee_window(created_round: u64, multiple: u64, window: u64) -> Result<RoundRange> {
    if multiple == 0 {
        return Err(RewardsError::InvalidConfig("committee round multiple must be non-zero".into()));
    }
    let to = created_round / multiple * multiple;
    RoundRange::new(Some(to.saturating_sub(window)), Some(to))
}
