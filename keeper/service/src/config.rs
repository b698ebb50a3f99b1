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

//! Validated keeper configuration.

use alloy_primitives::U256;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// 50 gwei.
pub const DEFAULT_MAX_GAS_PRICE: u128 = 50_000_000_000;
pub const DEFAULT_GAS_LIMIT: u64 = 500_000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);
pub const DEFAULT_ACTION_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_ACTIONS_PER_RAFFLE: u32 = 3;
pub const DEFAULT_SUMMARY_EVERY: u64 = 10;
/// 0.05 ETH.
pub const DEFAULT_MIN_BALANCE: u128 = 50_000_000_000_000_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("polling interval must be non-zero")]
    ZeroPollInterval,
    #[error("max gas price must be non-zero")]
    ZeroGasPrice,
    #[error("gas limit must be non-zero")]
    ZeroGasLimit,
    #[error("at least one attempt per action is required")]
    ZeroAttempts,
    #[error("at least one action per raffle and cycle is required")]
    ZeroActions,
    #[error("summary period must be non-zero")]
    ZeroSummaryPeriod,
}

/// Limits applied to every write the scheduler submits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPolicy {
    /// Ceiling for the network gas price, in wei. Actions are skipped above it.
    pub max_gas_price: u128,
    pub gas_limit: u64,
    /// Attempts per action within one cycle, the first one included.
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    /// Pause after each confirmed action.
    pub action_delay: Duration,
    /// Sequential steps taken on one raffle in a single cycle.
    pub max_actions_per_raffle: u32,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            max_gas_price: DEFAULT_MAX_GAS_PRICE,
            gas_limit: DEFAULT_GAS_LIMIT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            action_delay: DEFAULT_ACTION_DELAY,
            max_actions_per_raffle: DEFAULT_MAX_ACTIONS_PER_RAFFLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeeperConfig {
    pub poll_interval: Duration,
    pub policy: ExecutionPolicy,
    /// Operating minimum for the signer balance, in wei.
    pub min_balance: U256,
    /// Log a summary every this many cycles.
    pub summary_every: u64,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            policy: ExecutionPolicy::default(),
            min_balance: U256::from(DEFAULT_MIN_BALANCE),
            summary_every: DEFAULT_SUMMARY_EVERY,
        }
    }
}

impl KeeperConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.policy.max_gas_price == 0 {
            return Err(ConfigError::ZeroGasPrice);
        }
        if self.policy.gas_limit == 0 {
            return Err(ConfigError::ZeroGasLimit);
        }
        if self.policy.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.policy.max_actions_per_raffle == 0 {
            return Err(ConfigError::ZeroActions);
        }
        if self.summary_every == 0 {
            return Err(ConfigError::ZeroSummaryPeriod);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = KeeperConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.policy.max_gas_price, 50_000_000_000);
        assert_eq!(config.min_balance, U256::from(5u64) * U256::from(10u64).pow(U256::from(16)));
    }

    #[test]
    fn rejects_zero_limits() {
        let mut config = KeeperConfig::default();
        config.policy.max_attempts = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroAttempts));

        let mut config = KeeperConfig::default();
        config.poll_interval = Duration::ZERO;
        assert_eq!(config.validate(), Err(ConfigError::ZeroPollInterval));

        let mut config = KeeperConfig::default();
        config.policy.gas_limit = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroGasLimit));
    }
}
