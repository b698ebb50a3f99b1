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
use crate::config::{EthereumConfig, PrivateKey};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use keeper_ethereum::DEFAULT_CONFIRMATION_TIMEOUT;
use serde::Deserialize;
use std::time::Duration;

/// CLI/TOML-config parameters related to Ethereum.
#[derive(Clone, Debug, Default, Deserialize, Parser)]
#[serde(deny_unknown_fields)]
pub struct EthereumParams {
    /// Ethereum RPC endpoint.
    #[arg(long, alias = "eth-rpc")]
    pub rpc: Option<String>,

    /// Raffle manager contract address.
    #[arg(long)]
    pub contract: Option<String>,

    /// Hex-encoded signing key. Prefer the environment variable, command
    /// line arguments are visible to other local users.
    #[arg(long, env = "KEEPER_PRIVATE_KEY", hide_env_values = true)]
    #[serde(rename = "private-key")]
    pub private_key: Option<PrivateKey>,

    /// Seconds to wait for a transaction receipt before counting the attempt as failed.
    #[arg(long)]
    #[serde(rename = "confirmation-timeout")]
    pub confirmation_timeout: Option<u64>,
}

impl EthereumParams {
    /// Default Ethereum RPC.
    pub const DEFAULT_ETHEREUM_RPC: &str = "http://localhost:8545";

    /// Convert self into a proper `EthereumConfig` object.
    pub fn into_config(self) -> Result<EthereumConfig> {
        Ok(EthereumConfig {
            rpc: self
                .rpc
                .unwrap_or_else(|| Self::DEFAULT_ETHEREUM_RPC.into()),
            contract: self
                .contract
                .ok_or_else(|| anyhow!("missing `contract`"))?
                .parse()
                .with_context(|| "invalid `contract`")?,
            private_key: self.private_key,
            confirmation_timeout: self
                .confirmation_timeout
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CONFIRMATION_TIMEOUT),
        })
    }
}

impl MergeParams for EthereumParams {
    fn merge(self, with: Self) -> Self {
        Self {
            rpc: self.rpc.or(with.rpc),
            contract: self.contract.or(with.contract),
            private_key: self.private_key.or(with.private_key),
            confirmation_timeout: self.confirmation_timeout.or(with.confirmation_timeout),
        }
    }
}
