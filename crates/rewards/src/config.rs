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

//! Engine configuration: method fingerprints, protocol constants and validator parameters.
//!
//! Nothing in here is read from the process environment. Callers build a [RewardsConfig] (usually
//! by deserializing a file) and pass it explicitly to every entry point.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512_256};

use crate::error::{Result, RewardsError};

/// Activation lag, in rounds, before newly added stake participates in consensus.
pub const DEFAULT_STAKING_ACTIVATION_DELAY: u64 = 320;
/// Smallest balance a staker can keep in a pool (1 ALGO in microalgos).
pub const DEFAULT_MIN_RESIDUAL_STAKE: u64 = 1_000_000;
/// Fixed-point denominator for time-in-pool percentages.
pub const DEFAULT_FULL_TIME_PERCENTAGE: u64 = 1_000;
/// Parts-per-million denominator used by commissions and votes.
pub const DEFAULT_PPM_MAX: u64 = 1_000_000;

/// ARC-4 method selector: the first four bytes of SHA-512/256 over the ABI signature.
pub fn method_selector(signature: &str) -> u32 {
    let digest = Sha512_256::digest(signature.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Either a raw selector or an ABI signature to derive one from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MethodFingerprint {
    Selector(u32),
    Signature(String),
}

impl MethodFingerprint {
    pub fn selector(&self) -> u32 {
        match self {
            Self::Selector(selector) => *selector,
            Self::Signature(signature) => method_selector(signature),
        }
    }
}

/// Fingerprints of the tracked pool methods and of the registry side-effect call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSelectors {
    pub add_stake: u32,
    pub remove_stake: u32,
    pub epoch_balance_update: u32,
    /// Registry call issued by a settlement that reports the stake increase, the commission paid
    /// out and the excess routed to the fee sink.
    pub stake_updated_via_rewards: u32,
}

/// Same as [MethodSelectors], but accepting signatures as well as raw selectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodFingerprints {
    pub add_stake: MethodFingerprint,
    pub remove_stake: MethodFingerprint,
    pub epoch_balance_update: MethodFingerprint,
    pub stake_updated_via_rewards: MethodFingerprint,
}

impl From<&MethodFingerprints> for MethodSelectors {
    fn from(value: &MethodFingerprints) -> Self {
        Self {
            add_stake: value.add_stake.selector(),
            remove_stake: value.remove_stake.selector(),
            epoch_balance_update: value.epoch_balance_update.selector(),
            stake_updated_via_rewards: value.stake_updated_via_rewards.selector(),
        }
    }
}

/// Fixed protocol constants mirrored from the staking pool contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConstants {
    pub staking_activation_delay: u64,
    pub min_residual_stake: u64,
    pub full_time_percentage: u64,
    pub ppm_max: u64,
}

impl Default for ProtocolConstants {
    fn default() -> Self {
        Self {
            staking_activation_delay: DEFAULT_STAKING_ACTIVATION_DELAY,
            min_residual_stake: DEFAULT_MIN_RESIDUAL_STAKE,
            full_time_percentage: DEFAULT_FULL_TIME_PERCENTAGE,
            ppm_max: DEFAULT_PPM_MAX,
        }
    }
}

/// Configuration shared by every replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsConfig {
    pub selectors: MethodSelectors,
    /// Application id of the validator registry that receives settlement side-effect calls.
    pub registry_app_id: u64,
    #[serde(default)]
    pub protocol: ProtocolConstants,
}

impl RewardsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.protocol.full_time_percentage == 0 {
            return Err(RewardsError::InvalidConfig("full_time_percentage must be non-zero".into()));
        }
        if self.protocol.ppm_max == 0 {
            return Err(RewardsError::InvalidConfig("ppm_max must be non-zero".into()));
        }
        Ok(())
    }
}

/// Per-validator parameters needed to replay its pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorParams {
    pub id: u64,
    /// Epoch length in rounds.
    pub epoch_round_length: u64,
    /// Commission rate in parts per million.
    pub percent_to_validator: u64,
    /// Application ids of the validator's staking pools.
    #[serde(default)]
    pub pools: Vec<u64>,
}

impl ValidatorParams {
    pub fn validate(&self, protocol: &ProtocolConstants) -> Result<()> {
        if self.epoch_round_length == 0 {
            return Err(RewardsError::InvalidConfig(format!(
                "validator {} has a zero epoch round length",
                self.id
            )));
        }
        if self.percent_to_validator > protocol.ppm_max {
            return Err(RewardsError::InvalidConfig(format!(
                "validator {} commission {} exceeds {}",
                self.id, self.percent_to_validator, protocol.ppm_max
            )));
        }
        Ok(())
    }
}
