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

//! CLI and TOML parameters.

use crate::config::Config;
use anyhow::{Context as _, Result};
use clap::Parser;
use serde::Deserialize;
use std::{fs, path::PathBuf};

mod ethereum;
mod policy;

pub use ethereum::EthereumParams;
pub use policy::PolicyParams;

/// Combination of command line and file parameters. Command line wins.
pub trait MergeParams: Sized {
    fn merge(self, with: Self) -> Self;
}

#[derive(Clone, Debug, Default, Deserialize, Parser)]
#[serde(deny_unknown_fields)]
pub struct Params {
    #[clap(flatten)]
    #[serde(default)]
    pub ethereum: EthereumParams,

    #[clap(flatten)]
    #[serde(default)]
    pub policy: PolicyParams,
}

impl Params {
    pub fn from_file(path: PathBuf) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read params file {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse toml params")
    }

    pub fn into_config(self) -> Result<Config> {
        Ok(Config {
            ethereum: self
                .ethereum
                .into_config()
                .context("invalid ethereum params")?,
            keeper: self.policy.into_config().context("invalid policy params")?,
        })
    }
}

impl MergeParams for Params {
    fn merge(self, with: Self) -> Self {
        Self {
            ethereum: self.ethereum.merge(with.ethereum),
            policy: self.policy.merge(with.policy),
        }
    }
}
