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
use anyhow::{Context as _, Result};
use clap::Args;
use keeper_common::{Ledger, RaffleId};
use keeper_ethereum::RaffleLedger;
use keeper_service::scan;
use std::collections::BTreeSet;

#[derive(Debug, Args)]
pub struct ScanCommand {
    #[clap(flatten)]
    pub params: Params,

    #[clap(short, long)]
    pub verbose: bool,
}

impl ScanCommand {
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

        let ledger = RaffleLedger::read_only(&config.ethereum.rpc, config.ethereum.contract)
            .await
            .with_context(|| "failed to create raffle ledger client")?;

        let now = ledger
            .latest_timestamp()
            .await
            .with_context(|| "failed to read ledger time")?;
        let report = scan(&ledger, now, &BTreeSet::new())
            .await
            .with_context(|| "failed to scan raffles")?;

        println!("Ledger time: {now}");
        println!("Sold out, pending: {}", list(&report.sold_out_pending));
        println!("Expired, pending:  {}", list(&report.expired_pending));
        println!("Already terminal:  {}", list(&report.already_terminal));

        for (id, err) in &report.failed {
            println!("Failed to read raffle {id}: {err}");
        }

        Ok(())
    }
}

fn list(ids: &BTreeSet<RaffleId>) -> String {
    if ids.is_empty() {
        return "-".into();
    }

    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
