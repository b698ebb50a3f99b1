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

//! Classification of raffle records into work sets.

use derive_more::Display;
use keeper_common::{Ledger, LedgerError, LedgerResult, Raffle, RaffleId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    #[display("already terminal")]
    AlreadyTerminal,
    #[display("sold out")]
    SoldOutPending,
    #[display("expired")]
    ExpiredPending,
    #[display("not a candidate")]
    NotCandidate,
}

/// Whether the raffle has reached a state no keeper action can change.
///
/// A non-zero winner counts even when the status still reads active.
pub fn is_settled(raffle: &Raffle) -> bool {
    raffle.status.is_terminal() || raffle.winner.is_some_and(|winner| !winner.is_zero())
}

pub fn classify(raffle: &Raffle, now: u64) -> Classification {
    if is_settled(raffle) {
        Classification::AlreadyTerminal
    } else if raffle.is_sold_out() {
        Classification::SoldOutPending
    } else if raffle.is_expired(now) {
        Classification::ExpiredPending
    } else {
        Classification::NotCandidate
    }
}

/// Result of one pass over the ledger's candidate queries.
///
/// The three id sets are disjoint.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub sold_out_pending: BTreeSet<RaffleId>,
    pub expired_pending: BTreeSet<RaffleId>,
    pub already_terminal: BTreeSet<RaffleId>,
    /// Records fetched during the scan, keyed by id.
    pub records: BTreeMap<RaffleId, Raffle>,
    /// Ids whose record could not be fetched; they are retried next scan.
    pub failed: BTreeMap<RaffleId, LedgerError>,
}

impl ScanReport {
    pub fn pending(&self) -> usize {
        self.sold_out_pending.len() + self.expired_pending.len()
    }

    /// Pending ids in processing order: sold out first, then expired.
    pub fn work_order(&self) -> impl Iterator<Item = RaffleId> + '_ {
        self.sold_out_pending
            .iter()
            .chain(self.expired_pending.iter())
            .copied()
    }
}

/// Queries every candidate list, fetches and classifies the records.
///
/// Ids in `known_terminal` are reported as terminal without being fetched
/// again. A failed candidate query fails the whole scan, a failed record
/// fetch only drops that id from this scan.
pub async fn scan<L: Ledger + ?Sized>(
    ledger: &L,
    now: u64,
    known_terminal: &BTreeSet<RaffleId>,
) -> LedgerResult<ScanReport> {
    let mut candidates = BTreeSet::new();
    candidates.extend(ledger.sold_out_raffles().await?);
    candidates.extend(ledger.expired_raffles().await?);
    candidates.extend(ledger.active_raffles().await?);

    let mut report = ScanReport::default();

    for id in candidates {
        if known_terminal.contains(&id) {
            report.already_terminal.insert(id);
            continue;
        }

        let raffle = match ledger.raffle(id).await {
            Ok(raffle) => raffle,
            Err(err) => {
                tracing::warn!(raffle = %id, error = %err, "failed to fetch raffle record");
                report.failed.insert(id, err);
                continue;
            }
        };

        match classify(&raffle, now) {
            Classification::AlreadyTerminal => {
                report.already_terminal.insert(id);
            }
            Classification::SoldOutPending => {
                report.sold_out_pending.insert(id);
            }
            Classification::ExpiredPending => {
                report.expired_pending.insert(id);
            }
            Classification::NotCandidate => continue,
        }

        report.records.insert(id, raffle);
    }

    tracing::debug!(
        sold_out = report.sold_out_pending.len(),
        expired = report.expired_pending.len(),
        terminal = report.already_terminal.len(),
        failed = report.failed.len(),
        "scan finished"
    );

    Ok(report)
}
