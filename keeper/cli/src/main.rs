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

mod commands;
mod config;
mod params;

#[cfg(test)]
mod tests;

use crate::{commands::Command, params::Params};
use anyhow::Result;
use clap::Parser;
use std::{env, path::PathBuf};

/// Off-chain keeper finalizing raffles on the raffle manager contract.
#[derive(Debug, Parser)]
#[command(name = "raffle-keeper", version)]
pub struct Cli {
    /// Parameters file. `.raffle-keeper.toml` in the working directory is used when present.
    #[arg(long, global = true)]
    pub cfg: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub const DEFAULT_PARAMS_FILE: &str = ".raffle-keeper.toml";

    fn file_params(&self) -> Result<Params> {
        let path = match &self.cfg {
            Some(path) => path.clone(),
            None => {
                let path = env::current_dir()?.join(Self::DEFAULT_PARAMS_FILE);
                if !path.exists() {
                    return Ok(Params::default());
                }
                path
            }
        };

        // Logging is not initialized yet, it depends on the command.
        println!("❗️ Using parameters file: {}", path.display());

        Params::from_file(path)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let file_params = cli.file_params()?;

    cli.command.run(file_params).await
}
