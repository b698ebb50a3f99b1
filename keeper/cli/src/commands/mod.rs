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

use crate::params::Params;
use anyhow::{Result, anyhow};
use clap::Subcommand;
use tracing_subscriber::EnvFilter;

mod run;
mod scan;

pub use run::RunCommand;
pub use scan::ScanCommand;

/// CLI command.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the keeper until interrupted.
    Run(Box<RunCommand>),
    /// Classify raffles once and print the result. Sends no transactions.
    Scan(ScanCommand),
}

impl Command {
    /// Merge the command with the provided params.
    fn with_file_params(self, file_params: Params) -> Self {
        match self {
            Self::Run(run_cmd) => Self::Run(Box::new(run_cmd.with_params(file_params))),
            Self::Scan(scan_cmd) => Self::Scan(scan_cmd.with_params(file_params)),
        }
    }

    /// Run the command.
    pub async fn run(self, file_params: Params) -> Result<()> {
        match self.with_file_params(file_params) {
            Command::Run(run_cmd) => run_cmd.run().await,
            Command::Scan(scan_cmd) => scan_cmd.run().await,
        }
    }
}

fn init_logger(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!("failed to initialize logger: {err}"))
}
