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

//! Common configuration options and input files for commands of the rewards CLI.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use reti_rewards::{
    source::DEFAULT_PAGE_SIZE, InMemorySource, MethodFingerprints, MethodSelectors,
    ProtocolConstants, RewardsConfig, RoundRange, Transaction, ValidatorParams,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Common configuration options for all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalConfig {
    /// Engine configuration file (YAML or JSON)
    #[clap(long, env = "RETI_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Transaction dump: a JSON array of confirmed transactions
    #[clap(long, env = "RETI_TRANSACTIONS", global = true)]
    pub transactions: Option<PathBuf>,

    /// Records served per page when replaying the dump
    #[clap(long, env = "RETI_PAGE_SIZE", global = true, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Whether to log in JSON format.
    #[clap(long, env = "RETI_LOG_JSON", global = true, default_value_t = false)]
    pub log_json: bool,
}

impl GlobalConfig {
    /// Load [Self::config] or return an error that can be shown to the user.
    pub async fn load_config(&self) -> Result<ConfigFile> {
        let path = self
            .config
            .as_ref()
            .context("Configuration not provided; please set --config or the RETI_CONFIG env var")?;
        ConfigFile::load(path).await
    }

    /// Load [Self::transactions] into an in-memory paginated source.
    pub async fn load_source(&self) -> Result<InMemorySource> {
        let path = self.transactions.as_ref().context(
            "Transaction dump not provided; please set --transactions or the RETI_TRANSACTIONS env var",
        )?;
        let transactions: Vec<Transaction> = read_file(path).await?;
        tracing::debug!("Loaded {} transactions from {}", transactions.len(), path.display());
        Ok(InMemorySource::with_transactions(self.page_size, transactions))
    }
}

/// Round bounds of the reward window.
#[derive(Args, Debug, Clone, Default)]
pub struct RoundArgs {
    /// Count rewards from transactions confirmed after this round
    #[clap(long)]
    pub round_from: Option<u64>,

    /// Count rewards up to and including this round
    #[clap(long)]
    pub round_to: Option<u64>,
}

impl RoundArgs {
    pub fn range(&self) -> Result<RoundRange> {
        Ok(RoundRange::new(self.round_from, self.round_to)?)
    }
}

/// Contents of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Tracked methods, as raw selectors or ABI signatures.
    pub selectors: MethodFingerprints,
    pub registry_app_id: u64,
    #[serde(default)]
    pub protocol: ProtocolConstants,
    #[serde(default)]
    pub validators: Vec<ValidatorParams>,
}

impl ConfigFile {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = read_file(path.as_ref()).await?;
        config.rewards_config().validate()?;
        for validator in &config.validators {
            validator.validate(&config.protocol)?;
        }
        Ok(config)
    }

    pub fn rewards_config(&self) -> RewardsConfig {
        RewardsConfig {
            selectors: MethodSelectors::from(&self.selectors),
            registry_app_id: self.registry_app_id,
            protocol: self.protocol,
        }
    }

    pub fn validator(&self, id: u64) -> Result<&ValidatorParams> {
        self.validators
            .iter()
            .find(|validator| validator.id == id)
            .with_context(|| format!("validator {id} is not in the configuration"))
    }

    /// Validator owning `pool_app_id`.
    pub fn validator_of_pool(&self, pool_app_id: u64) -> Result<&ValidatorParams> {
        self.validators
            .iter()
            .find(|validator| validator.pools.contains(&pool_app_id))
            .with_context(|| format!("no configured validator owns pool {pool_app_id}"))
    }
}

/// Read a YAML or JSON file, chosen by extension.
pub async fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
    match extension {
        "json" => serde_json::from_slice(&data)
            .with_context(|| format!("Failed to decode JSON from file: {}", path.display())),
        "yaml" | "yml" => serde_yaml::from_slice(&data)
            .with_context(|| format!("Failed to decode YAML from file: {}", path.display())),
        other => bail!("Unsupported file extension {other:?} for {}", path.display()),
    }
}
