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

//! Outcome counters, spent fees and signer balance tracking.

use alloy_primitives::{U256, utils::format_ether};
use derive_more::Display;
use std::fmt;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    #[display("committed")]
    Committed,
    #[display("revealed")]
    Revealed,
    #[display("emergency")]
    Emergency,
    #[display("cancelled")]
    Cancelled,
    #[display("skipped")]
    Skipped,
    #[display("errored")]
    Errored,
    #[display("no-op")]
    NoOp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub cycles: u64,
    pub committed: u64,
    pub revealed: u64,
    pub emergency: u64,
    pub cancelled: u64,
    pub skipped: u64,
    pub errored: u64,
    pub no_op: u64,
}

impl Counters {
    fn slot(&mut self, outcome: Outcome) -> &mut u64 {
        match outcome {
            Outcome::Committed => &mut self.committed,
            Outcome::Revealed => &mut self.revealed,
            Outcome::Emergency => &mut self.emergency,
            Outcome::Cancelled => &mut self.cancelled,
            Outcome::Skipped => &mut self.skipped,
            Outcome::Errored => &mut self.errored,
            Outcome::NoOp => &mut self.no_op,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceAlert {
    Healthy,
    /// Balance has just dropped below the minimum.
    Low,
    StillLow,
    Recovered,
}

#[derive(Debug)]
pub struct Statistics {
    counters: Counters,
    cost: u128,
    balance: Option<U256>,
    min_balance: U256,
    below_minimum: bool,
}

impl Statistics {
    pub fn new(min_balance: U256) -> Self {
        Self {
            counters: Counters::default(),
            cost: 0,
            balance: None,
            min_balance,
            below_minimum: false,
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Total fees paid, in wei.
    pub fn cost(&self) -> u128 {
        self.cost
    }

    pub fn begin_cycle(&mut self) -> u64 {
        self.counters.cycles += 1;
        self.counters.cycles
    }

    pub fn record(&mut self, outcome: Outcome) {
        *self.counters.slot(outcome) += 1;
    }

    pub fn record_cost(&mut self, cost: u128) {
        self.cost = self.cost.saturating_add(cost);
    }

    /// Stores the latest balance and warns once each time it drops below the minimum.
    pub fn observe_balance(&mut self, balance: U256) -> BalanceAlert {
        self.balance = Some(balance);

        let low = balance < self.min_balance;
        let alert = match (self.below_minimum, low) {
            (false, true) => BalanceAlert::Low,
            (true, true) => BalanceAlert::StillLow,
            (true, false) => BalanceAlert::Recovered,
            (false, false) => BalanceAlert::Healthy,
        };
        self.below_minimum = low;

        match alert {
            BalanceAlert::Low => tracing::warn!(
                balance = %format_ether(balance),
                minimum = %format_ether(self.min_balance),
                "signer balance below operating minimum"
            ),
            BalanceAlert::Recovered => {
                tracing::info!(balance = %format_ether(balance), "signer balance recovered")
            }
            BalanceAlert::Healthy | BalanceAlert::StillLow => {}
        }

        alert
    }

    pub fn summary(&self) -> Summary {
        Summary {
            counters: self.counters,
            cost: self.cost,
            balance: self.balance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub counters: Counters,
    pub cost: u128,
    pub balance: Option<U256>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Counters {
            cycles,
            committed,
            revealed,
            emergency,
            cancelled,
            skipped,
            errored,
            no_op,
        } = self.counters;

        write!(
            f,
            "cycles {cycles}, committed {committed}, revealed {revealed}, emergency {emergency}, \
             cancelled {cancelled}, skipped {skipped}, errored {errored}, no-op {no_op}, \
             spent {} ETH",
            format_ether(U256::from(self.cost))
        )?;

        match self.balance {
            Some(balance) => write!(f, ", balance {} ETH", format_ether(balance)),
            None => write!(f, ", balance unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_balance_warns_once_per_crossing() {
        let mut stats = Statistics::new(U256::from(100));

        assert_eq!(stats.observe_balance(U256::from(150)), BalanceAlert::Healthy);
        assert_eq!(stats.observe_balance(U256::from(99)), BalanceAlert::Low);
        assert_eq!(stats.observe_balance(U256::from(50)), BalanceAlert::StillLow);
        assert_eq!(stats.observe_balance(U256::from(100)), BalanceAlert::Recovered);
        assert_eq!(stats.observe_balance(U256::from(10)), BalanceAlert::Low);
    }

    #[test]
    fn summary_reports_counters() {
        let mut stats = Statistics::new(U256::ZERO);
        stats.begin_cycle();
        stats.record(Outcome::Committed);
        stats.record(Outcome::Revealed);
        stats.record(Outcome::Skipped);
        stats.record_cost(1_500_000_000_000_000);
        stats.record_cost(u128::MAX);

        let summary = stats.summary();
        assert_eq!(summary.counters.cycles, 1);
        assert_eq!(summary.counters.committed, 1);
        assert_eq!(summary.counters.skipped, 1);
        assert_eq!(summary.cost, u128::MAX);

        let text = summary.to_string();
        assert!(text.contains("committed 1"));
        assert!(text.ends_with("balance unknown"));
    }
}
