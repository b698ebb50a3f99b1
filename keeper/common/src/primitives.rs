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

//! Raffle data model as exposed by the ledger contract.

use alloy_primitives::{Address, B256, U256, keccak256};
use derive_more::{Display, From};
use rand::RngCore;
use std::fmt;

/// Identifier of a raffle inside the ledger contract.
#[derive(
    Debug, Display, From, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[display("{_0}")]
pub struct RaffleId(pub u64);

impl RaffleId {
    pub fn to_u256(self) -> U256 {
        U256::from(self.0)
    }
}

impl TryFrom<U256> for RaffleId {
    type Error = U256;

    fn try_from(value: U256) -> Result<Self, Self::Error> {
        u64::try_from(value).map(Self).map_err(|_| value)
    }
}

/// Lifecycle status of a raffle. Transitions are monotonic: once a raffle
/// leaves [`RaffleStatus::Active`] it never comes back.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RaffleStatus {
    Active,
    Completed,
    Cancelled,
    Emergency,
}

impl RaffleStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl TryFrom<u8> for RaffleStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Active),
            1 => Ok(Self::Completed),
            2 => Ok(Self::Cancelled),
            3 => Ok(Self::Emergency),
            other => Err(other),
        }
    }
}

impl From<RaffleStatus> for u8 {
    fn from(status: RaffleStatus) -> Self {
        match status {
            RaffleStatus::Active => 0,
            RaffleStatus::Completed => 1,
            RaffleStatus::Cancelled => 2,
            RaffleStatus::Emergency => 3,
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RewardKind {
    Native,
    Erc20,
    Erc721,
}

impl TryFrom<u8> for RewardKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Native),
            1 => Ok(Self::Erc20),
            2 => Ok(Self::Erc721),
            other => Err(other),
        }
    }
}

/// Prize held by the ledger on behalf of the raffle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reward {
    pub kind: RewardKind,
    /// Token contract, zero for [`RewardKind::Native`].
    pub token: Address,
    /// Amount for fungible rewards, token id for [`RewardKind::Erc721`].
    pub amount_or_id: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raffle {
    pub id: RaffleId,
    pub creator: Address,
    pub ticket_price: U256,
    pub payment_token: Address,
    pub max_tickets: u64,
    pub tickets_sold: u64,
    pub start_time: u64,
    pub end_time: u64,
    pub reward: Reward,
    pub status: RaffleStatus,
    /// `None` while the contract stores the zero address.
    pub winner: Option<Address>,
    pub reward_claimed: bool,
}

impl Raffle {
    pub fn is_sold_out(&self) -> bool {
        self.tickets_sold >= self.max_tickets
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.end_time
    }

    pub fn has_tickets(&self) -> bool {
        self.tickets_sold > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub raffle_id: RaffleId,
    pub buyer: Address,
    pub number: u64,
    pub purchase_time: u64,
}

/// On-ledger record of the first phase of the commit-reveal protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomnessCommitment {
    pub commitment: B256,
    pub commit_time: u64,
    pub reveal_deadline: u64,
    pub revealed: bool,
}

impl RandomnessCommitment {
    pub fn is_reveal_window_open(&self, now: u64) -> bool {
        now < self.reveal_deadline
    }

    /// Emergency selection becomes available once this returns true.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.reveal_deadline
    }
}

/// Locally held preimage of a [`RandomnessCommitment`].
///
/// The ledger accepts a reveal only if `keccak256(secret)` equals the stored
/// commitment. The value never leaves the process except through a reveal.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Secret(B256);

impl Secret {
    /// Draws a fresh secret from OS randomness mixed with the raffle id and
    /// caller-provided entropy.
    pub fn generate(raffle_id: RaffleId, local_entropy: &[u8]) -> Self {
        let mut random = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut random);

        let mut preimage = Vec::with_capacity(32 + 8 + local_entropy.len());
        preimage.extend_from_slice(&random);
        preimage.extend_from_slice(&raffle_id.0.to_be_bytes());
        preimage.extend_from_slice(local_entropy);

        Self(keccak256(preimage))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }

    pub fn commitment(&self) -> B256 {
        keccak256(self.0)
    }

    pub fn matches(&self, commitment: B256) -> bool {
        self.commitment() == commitment
    }

    pub fn expose(&self) -> B256 {
        self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}
