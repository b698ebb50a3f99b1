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

use crate::params::{MergeParams, Params};
use alloy_primitives::utils::format_ether;
use anyhow::{Context as _, Result, ensure};
use clap::Args;
use keeper_common::Ledger;
use keeper_ethereum::RaffleLedger;
use keeper_service::Scheduler;

#[derive(Debug, Args)]
pub struct RunCommand {
    #[clap(flatten)]
    pub params: Params,

    #[clap(short, long)]
    pub verbose: bool,
}

impl RunCommand {
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = self.params.merge(params);

        self
    }

    pub async fn run(self) -> Result<()> {
        super::init_logger(self.verbose)?;

        let config = self
            .params
            .into_config()
            .with_context(|| "invalid configuration")?;

        config.log_info();

        let private_key = config
            .ethereum
            .private_key
            .as_ref()
            .context("missing signing key, pass `--private-key` or set `KEEPER_PRIVATE_KEY`")?;

        let ledger = RaffleLedger::connect(
            &config.ethereum.rpc,
            config.ethereum.contract,
            private_key.expose(),
            config.ethereum.confirmation_timeout,
        )
        .await
        .with_context(|| "failed to create raffle ledger client")?;

        let balance = ledger
            .signer_balance()
            .await
            .with_context(|| "failed to query signer balance")?;

        tracing::info!(
            "🔑 Signer: {} ({} ETH)",
            ledger.signer(),
            format_ether(balance)
        );

        ensure!(
            balance >= config.keeper.min_balance,
            "signer balance {} ETH is below the operating minimum of {} ETH",
            format_ether(balance),
            format_ether(config.keeper.min_balance)
        );

        let scheduler =
            Scheduler::new(ledger, config.keeper).context("invalid keeper configuration")?;
        scheduler
            .run(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => tracing::info!("Received SIGINT, shutting down"),
                    Err(err) => {
                        tracing::error!("failed to listen for SIGINT: {err}");
                        std::future::pending::<()>().await;
                    }
                }
            })
            .await;

        Ok(())
    }
}
