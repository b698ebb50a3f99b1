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

//! Typed interface over the raffle ledger contract.
//!
//! Every read and write the keeper performs against the ledger goes through
//! [`Ledger`]. Write results are decoded into a [`WriteOutcome`] instead of
//! being inferred from logs by the caller.

use crate::primitives::{Raffle, RaffleId, RandomnessCommitment, Secret};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use derive_more::Display;
use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Reason the ledger refused a write.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[display("randomness already committed")]
    AlreadyCommitted,
    #[display("randomness not committed")]
    NotCommitted,
    #[display("reveal deadline not reached yet")]
    TooEarly,
    #[display("reveal window closed")]
    RevealWindowClosed,
    #[display("secret does not match commitment")]
    InvalidSecret,
    #[display("raffle is not active")]
    NotActive,
    #[display("raffle is neither sold out nor expired")]
    NotEligible,
    #[display("raffle has tickets and cannot be cancelled")]
    HasTickets,
    #[display("{_0}")]
    Other(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Provider or network unavailable before anything was submitted; the
    /// request may be repeated verbatim.
    #[error("transient ledger failure: {0}")]
    Transient(String),
    /// Submission failed after the transaction was handed to the node. It may
    /// still land.
    #[error("submission unconfirmed: {0}")]
    Unconfirmed(String),
    /// Stopped waiting for confirmation. The transaction may or may not land.
    #[error("timed out waiting for confirmation")]
    Timeout,
    #[error("rejected by ledger: {0}")]
    Rejected(Rejection),
    /// Transaction was included but failed.
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: B256 },
    #[error("failed to decode ledger response: {0}")]
    Decode(String),
}

impl LedgerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether the write may have taken effect despite the error. The ledger
    /// must be re-read before repeating such a write.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            Self::Unconfirmed(_) | Self::Timeout | Self::Reverted { .. } | Self::Decode(_)
        )
    }
}

impl From<Rejection> for LedgerError {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

/// Per-transaction fee and resource settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxParams {
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionPath {
    #[display("reveal")]
    Reveal,
    #[display("emergency")]
    Emergency,
}

/// Decoded effect of a confirmed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed {
        commit_time: u64,
        reveal_deadline: u64,
    },
    WinnerSelected {
        winner: Address,
        ticket_index: u64,
        via: SelectionPath,
    },
    Cancelled,
    /// The ledger accepted the call but it changed nothing.
    NoOp,
    AlreadyTerminal,
}

/// Confirmed write together with what it cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub tx_hash: B256,
    /// Fee paid in wei (`gas_used * effective_gas_price`).
    pub cost: u128,
    pub outcome: WriteOutcome,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Address of the signing identity used for writes.
    fn signer(&self) -> Address;

    async fn active_raffles(&self) -> LedgerResult<Vec<RaffleId>>;

    async fn expired_raffles(&self) -> LedgerResult<Vec<RaffleId>>;

    async fn sold_out_raffles(&self) -> LedgerResult<Vec<RaffleId>>;

    async fn raffle(&self, id: RaffleId) -> LedgerResult<Raffle>;

    async fn commitment(&self, id: RaffleId) -> LedgerResult<Option<RandomnessCommitment>>;

    /// Timestamp of the latest ledger block, used as "now" for every decision.
    async fn latest_timestamp(&self) -> LedgerResult<u64>;

    /// Current network price per gas unit, in wei.
    async fn gas_price(&self) -> LedgerResult<u128>;

    async fn signer_balance(&self) -> LedgerResult<U256>;

    async fn commit_randomness(
        &self,
        id: RaffleId,
        commitment: B256,
        params: &TxParams,
    ) -> LedgerResult<Submitted>;

    async fn reveal_randomness(
        &self,
        id: RaffleId,
        secret: &Secret,
        params: &TxParams,
    ) -> LedgerResult<Submitted>;

    async fn emergency_select(&self, id: RaffleId, params: &TxParams) -> LedgerResult<Submitted>;

    /// Cancels an expired raffle without tickets and returns the reward to its creator.
    async fn cancel_raffle(&self, id: RaffleId, params: &TxParams) -> LedgerResult<Submitted>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_taxonomy() {
        assert!(LedgerError::Transient("down".into()).is_transient());
        assert!(!LedgerError::Transient("down".into()).is_ambiguous());

        assert!(LedgerError::Timeout.is_ambiguous());
        assert!(
            LedgerError::Reverted {
                tx_hash: B256::ZERO
            }
            .is_ambiguous()
        );

        assert!(LedgerError::Unconfirmed("reset".into()).is_ambiguous());
        assert!(!LedgerError::Unconfirmed("reset".into()).is_transient());

        let rejected = LedgerError::from(Rejection::TooEarly);
        assert!(!rejected.is_transient());
        assert!(!rejected.is_ambiguous());
        assert_eq!(rejected, LedgerError::Rejected(Rejection::TooEarly));
    }
}
