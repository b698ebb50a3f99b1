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

//! Off-chain finalization of raffles.
//!
//! Each cycle reads the ledger, classifies raffles and drives the pending ones
//! through commit, reveal or emergency selection, or cancels them when nobody
//! bought a ticket. Writes are strictly sequential and bounded by an
//! [`ExecutionPolicy`].

pub mod config;
pub mod coordinator;
pub mod scanner;
pub mod scheduler;
pub mod stats;


pub use config::{ConfigError, ExecutionPolicy, KeeperConfig};
pub use scanner::{Classification, ScanReport, classify, scan};
pub use scheduler::{CycleReport, RaffleOutcome, Scheduler, SchedulerContext};
pub use stats::{Statistics, Summary};
