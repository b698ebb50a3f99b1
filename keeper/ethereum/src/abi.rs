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

use alloy::{primitives::U256, sol};
use keeper_common::{
    LedgerError, Raffle, RaffleId, RaffleStatus, RandomnessCommitment, Rejection, Reward,
    RewardKind,
};

sol!(
    #[sol(rpc)]
    interface IRaffleManager {
        struct RaffleInfo {
            uint256 id;
            address creator;
            uint256 ticketPrice;
            address paymentToken;
            uint256 maxTickets;
            uint256 ticketsSold;
            uint256 startTime;
            uint256 endTime;
            uint8 rewardType;
            address rewardToken;
            uint256 rewardAmount;
            uint8 status;
            address winner;
            bool rewardClaimed;
        }

        struct CommitmentInfo {
            bytes32 commitment;
            uint256 commitTime;
            uint256 revealDeadline;
            bool revealed;
        }

        event RandomnessCommitted(
            uint256 indexed raffleId,
            bytes32 commitment,
            uint256 commitTime,
            uint256 revealDeadline
        );
        event WinnerSelected(uint256 indexed raffleId, address indexed winner, uint256 ticketNumber);
        event EmergencyWinnerSelected(
            uint256 indexed raffleId,
            address indexed winner,
            uint256 ticketNumber
        );
        event RaffleCancelled(uint256 indexed raffleId);

        error AlreadyCommitted();
        error NotCommitted();
        error RevealTooEarly();
        error RevealWindowClosed();
        error InvalidSecret();
        error RaffleNotActive();
        error RaffleNotEnded();
        error RaffleHasTickets();

        function getActiveRaffles() external view returns (uint256[] memory);
        function getExpiredRaffles() external view returns (uint256[] memory);
        function getSoldOutRaffles() external view returns (uint256[] memory);
        function getRaffle(uint256 raffleId) external view returns (RaffleInfo memory);
        function getCommitment(uint256 raffleId) external view returns (CommitmentInfo memory);

        function commitRandomness(uint256 raffleId, bytes32 commitment) external;
        function revealRandomness(uint256 raffleId, bytes32 secret) external;
        function emergencySelectWinner(uint256 raffleId) external;
        function cancelRaffle(uint256 raffleId) external;
    }
);

pub(crate) mod utils {
    use super::*;

    pub fn uint256_to_u64(value: U256, field: &str) -> Result<u64, LedgerError> {
        u64::try_from(value)
            .map_err(|_| LedgerError::Decode(format!("{field} overflows u64: {value}")))
    }

    pub fn raffle_ids(values: Vec<U256>) -> Result<Vec<RaffleId>, LedgerError> {
        values
            .into_iter()
            .map(|value| {
                RaffleId::try_from(value).map_err(|value| {
                    LedgerError::Decode(format!("raffle id overflows u64: {value}"))
                })
            })
            .collect()
    }
}

impl TryFrom<IRaffleManager::RaffleInfo> for Raffle {
    type Error = LedgerError;

    fn try_from(info: IRaffleManager::RaffleInfo) -> Result<Self, Self::Error> {
        let id = RaffleId::try_from(info.id)
            .map_err(|value| LedgerError::Decode(format!("raffle id overflows u64: {value}")))?;
        let status = RaffleStatus::try_from(info.status)
            .map_err(|value| LedgerError::Decode(format!("unknown raffle status {value}")))?;
        let kind = RewardKind::try_from(info.rewardType)
            .map_err(|value| LedgerError::Decode(format!("unknown reward type {value}")))?;

        Ok(Self {
            id,
            creator: info.creator,
            ticket_price: info.ticketPrice,
            payment_token: info.paymentToken,
            max_tickets: utils::uint256_to_u64(info.maxTickets, "maxTickets")?,
            tickets_sold: utils::uint256_to_u64(info.ticketsSold, "ticketsSold")?,
            start_time: utils::uint256_to_u64(info.startTime, "startTime")?,
            end_time: utils::uint256_to_u64(info.endTime, "endTime")?,
            reward: Reward {
                kind,
                token: info.rewardToken,
                amount_or_id: info.rewardAmount,
            },
            status,
            winner: (!info.winner.is_zero()).then_some(info.winner),
            reward_claimed: info.rewardClaimed,
        })
    }
}

/// Decodes a commitment record. The contract returns a zeroed struct for
/// raffles that were never committed.
pub(crate) fn commitment(
    info: IRaffleManager::CommitmentInfo,
) -> Result<Option<RandomnessCommitment>, LedgerError> {
    if info.commitment.is_zero() {
        return Ok(None);
    }

    Ok(Some(RandomnessCommitment {
        commitment: info.commitment,
        commit_time: utils::uint256_to_u64(info.commitTime, "commitTime")?,
        reveal_deadline: utils::uint256_to_u64(info.revealDeadline, "revealDeadline")?,
        revealed: info.revealed,
    }))
}

impl From<IRaffleManager::IRaffleManagerErrors> for Rejection {
    fn from(err: IRaffleManager::IRaffleManagerErrors) -> Self {
        use IRaffleManager::IRaffleManagerErrors as E;

        match err {
            E::AlreadyCommitted(_) => Self::AlreadyCommitted,
            E::NotCommitted(_) => Self::NotCommitted,
            E::RevealTooEarly(_) => Self::TooEarly,
            E::RevealWindowClosed(_) => Self::RevealWindowClosed,
            E::InvalidSecret(_) => Self::InvalidSecret,
            E::RaffleNotActive(_) => Self::NotActive,
            E::RaffleNotEnded(_) => Self::NotEligible,
            E::RaffleHasTickets(_) => Self::HasTickets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{
        primitives::{Address, B256},
        sol_types::{SolError, SolInterface},
    };

    fn info() -> IRaffleManager::RaffleInfo {
        IRaffleManager::RaffleInfo {
            id: U256::from(4),
            creator: Address::repeat_byte(1),
            ticketPrice: U256::from(10),
            paymentToken: Address::ZERO,
            maxTickets: U256::from(100),
            ticketsSold: U256::from(100),
            startTime: U256::from(1_000),
            endTime: U256::from(2_000),
            rewardType: 1,
            rewardToken: Address::repeat_byte(2),
            rewardAmount: U256::from(500),
            status: 0,
            winner: Address::ZERO,
            rewardClaimed: false,
        }
    }

    #[test]
    fn decodes_raffle_record() {
        let raffle = Raffle::try_from(info()).unwrap();

        assert_eq!(raffle.id, RaffleId(4));
        assert!(raffle.is_sold_out());
        assert_eq!(raffle.reward.kind, RewardKind::Erc20);
        assert_eq!(raffle.winner, None);

        let mut completed = info();
        completed.status = 1;
        completed.winner = Address::repeat_byte(3);
        let raffle = Raffle::try_from(completed).unwrap();
        assert_eq!(raffle.status, RaffleStatus::Completed);
        assert_eq!(raffle.winner, Some(Address::repeat_byte(3)));
    }

    #[test]
    fn rejects_malformed_records() {
        let mut bad_status = info();
        bad_status.status = 9;
        assert!(matches!(Raffle::try_from(bad_status), Err(LedgerError::Decode(_))));

        let mut huge = info();
        huge.endTime = U256::MAX;
        assert!(matches!(Raffle::try_from(huge), Err(LedgerError::Decode(_))));
    }

    #[test]
    fn zeroed_commitment_is_absent() {
        let empty = IRaffleManager::CommitmentInfo {
            commitment: B256::ZERO,
            commitTime: U256::ZERO,
            revealDeadline: U256::ZERO,
            revealed: false,
        };
        assert_eq!(commitment(empty).unwrap(), None);

        let present = IRaffleManager::CommitmentInfo {
            commitment: B256::repeat_byte(7),
            commitTime: U256::from(10),
            revealDeadline: U256::from(3_610),
            revealed: false,
        };
        let record = commitment(present).unwrap().unwrap();
        assert_eq!(record.reveal_deadline, 3_610);
    }

    #[test]
    fn revert_data_maps_to_rejection() {
        let data = IRaffleManager::RevealTooEarly {}.abi_encode();
        let decoded = IRaffleManager::IRaffleManagerErrors::abi_decode(&data).unwrap();

        assert_eq!(Rejection::from(decoded), Rejection::TooEarly);
    }
}
