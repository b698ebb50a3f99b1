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

use alloy_primitives::{Address, utils::format_ether};
use keeper_service::KeeperConfig;
use serde::Deserialize;
use std::{convert::Infallible, fmt, str::FromStr, time::Duration};

/// Hex-encoded signing key. Never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl FromStr for PrivateKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

#[derive(Debug, Clone)]
pub struct EthereumConfig {
    pub rpc: String,
    pub contract: Address,
    pub private_key: Option<PrivateKey>,
    pub confirmation_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub ethereum: EthereumConfig,
    pub keeper: KeeperConfig,
}

impl Config {
    pub fn log_info(&self) {
        let policy = &self.keeper.policy;

        tracing::info!("⧫  Ethereum RPC: {}", self.ethereum.rpc);
        tracing::info!("📡 Raffle contract: {}", self.ethereum.contract);
        tracing::info!("⏱️  Poll interval: {:?}", self.keeper.poll_interval);
        tracing::info!(
            "⛽ Gas: ceiling {} wei, limit {}",
            policy.max_gas_price,
            policy.gas_limit
        );
        tracing::info!(
            "🔁 Retries: {} attempts, backoff {:?}, action delay {:?}",
            policy.max_attempts,
            policy.retry_backoff,
            policy.action_delay
        );
        tracing::info!(
            "💰 Minimum balance: {} ETH",
            format_ether(self.keeper.min_balance)
        );
    }
}
