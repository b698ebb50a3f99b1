// This file is part of Gear.
//
// Copyright (C) 2025 Gear Technologies Inc.
// SPDX-License-Identifier: GPL-3.0-or-later WITH Classpath-exception-2.0
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use super::MergeParams;
use alloy_primitives::utils::parse_ether;
use anyhow::{Context, Result};
use clap::Parser;
use keeper_service::{ExecutionPolicy, KeeperConfig};
use serde::Deserialize;
use std::time::Duration;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Scheduling and cost limits.
#[derive(Clone, Debug, Default, Deserialize, Parser)]
#[serde(deny_unknown_fields)]
pub struct PolicyParams {
    /// Seconds between polling cycles.
    #[arg(long)]
    #[serde(rename = "poll-interval")]
    pub poll_interval: Option<u64>,

    /// Gas price ceiling in gwei. Actions are skipped while the network is more expensive.
    #[arg(long)]
    #[serde(rename = "max-gas-price")]
    pub max_gas_price: Option<u64>,

    /// Gas limit of every submitted transaction.
    #[arg(long)]
    #[serde(rename = "gas-limit")]
    pub gas_limit: Option<u64>,

    /// Attempts per action within one cycle.
    #[arg(long)]
    #[serde(rename = "max-attempts")]
    pub max_attempts: Option<u32>,

    /// Seconds between attempts.
    #[arg(long)]
    #[serde(rename = "retry-backoff")]
    pub retry_backoff: Option<u64>,

    /// Seconds to wait after each confirmed action.
    #[arg(long)]
    #[serde(rename = "action-delay")]
    pub action_delay: Option<u64>,

    #[arg(long)]
    #[serde(rename = "max-actions-per-raffle")]
    pub max_actions_per_raffle: Option<u32>,

    /// Operating minimum of the signer balance in ETH, e.g. `0.05`.
    #[arg(long)]
    #[serde(rename = "min-balance")]
    pub min_balance: Option<String>,

    /// Cycles between two logged summaries.
    #[arg(long)]
    #[serde(rename = "summary-every")]
    pub summary_every: Option<u64>,
}

impl PolicyParams {
    pub fn into_config(self) -> Result<KeeperConfig> {
        let defaults = KeeperConfig::default();
        let policy = ExecutionPolicy::default();

        let min_balance = match self.min_balance {
            Some(eth) => parse_ether(&eth).with_context(|| "invalid `min-balance`")?,
            None => defaults.min_balance,
        };

        let config = KeeperConfig {
            poll_interval: self
                .poll_interval
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            policy: ExecutionPolicy {
                max_gas_price: self
                    .max_gas_price
                    .map(|gwei| gwei as u128 * WEI_PER_GWEI)
                    .unwrap_or(policy.max_gas_price),
                gas_limit: self.gas_limit.unwrap_or(policy.gas_limit),
                max_attempts: self.max_attempts.unwrap_or(policy.max_attempts),
                retry_backoff: self
                    .retry_backoff
                    .map(Duration::from_secs)
                    .unwrap_or(policy.retry_backoff),
                action_delay: self
                    .action_delay
                    .map(Duration::from_secs)
                    .unwrap_or(policy.action_delay),
                max_actions_per_raffle: self
                    .max_actions_per_raffle
                    .unwrap_or(policy.max_actions_per_raffle),
            },
            min_balance,
            summary_every: self.summary_every.unwrap_or(defaults.summary_every),
        };

        config.validate()?;

        Ok(config)
    }
}

impl MergeParams for PolicyParams {
    fn merge(self, with: Self) -> Self {
        Self {
            poll_interval: self.poll_interval.or(with.poll_interval),
            max_gas_price: self.max_gas_price.or(with.max_gas_price),
            gas_limit: self.gas_limit.or(with.gas_limit),
            max_attempts: self.max_attempts.or(with.max_attempts),
            retry_backoff: self.retry_backoff.or(with.retry_backoff),
            action_delay: self.action_delay.or(with.action_delay),
            max_actions_per_raffle: self.max_actions_per_raffle.or(with.max_actions_per_raffle),
            min_balance: self.min_balance.or(with.min_balance),
            summary_every: self.summary_every.or(with.summary_every),
        }
    }
}
