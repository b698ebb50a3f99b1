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

//! Commit-reveal state machine driving a raffle to its terminal state.

use crate::scanner;
use alloy_primitives::B256;
use derive_more::Display;
use keeper_common::{
    Ledger, LedgerError, LedgerResult, Raffle, RaffleId, RandomnessCommitment, Rejection,
    Secret, Submitted, TxParams,
};
use std::collections::HashMap;

/// Secrets of outstanding commitments. Lives only as long as the process.
#[derive(Default)]
pub struct NonceVault {
    secrets: HashMap<RaffleId, Secret>,
}

impl NonceVault {
    pub fn get(&self, id: RaffleId) -> Option<Secret> {
        self.secrets.get(&id).copied()
    }

    /// Returns the stored secret for `id`, generating one if there is none.
    pub fn get_or_generate(&mut self, id: RaffleId, local_entropy: &[u8]) -> Secret {
        *self
            .secrets
            .entry(id)
            .or_insert_with(|| Secret::generate(id, local_entropy))
    }

    pub fn remove(&mut self, id: RaffleId) -> Option<Secret> {
        self.secrets.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    #[display("commit")]
    Commit { commitment: B256 },
    #[display("reveal")]
    Reveal { secret: Secret },
    #[display("emergency selection")]
    EmergencySelect,
    #[display("cancel")]
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Act(Action),
    /// Committed by someone whose secret we do not hold.
    WaitForDeadline { reveal_deadline: u64 },
    /// No tickets sold, but the sale is still open.
    WaitForEnd { end_time: u64 },
    Finished,
}

/// How the scheduler should continue after a write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Done(Submitted),
    /// The ledger already reflects the action.
    NoOp,
    /// Refused; not retried in this cycle.
    Rejected(Rejection),
    /// State may have moved; re-read the ledger before deciding again.
    Replan(LedgerError),
    /// Safe to repeat verbatim.
    Retry(LedgerError),
}

pub struct Coordinator {
    vault: NonceVault,
    local_entropy: Vec<u8>,
}

impl Coordinator {
    pub fn new(local_entropy: impl Into<Vec<u8>>) -> Self {
        Self {
            vault: NonceVault::default(),
            local_entropy: local_entropy.into(),
        }
    }

    pub fn vault(&self) -> &NonceVault {
        &self.vault
    }

    pub fn plan(
        &mut self,
        raffle: &Raffle,
        commitment: Option<&RandomnessCommitment>,
        now: u64,
    ) -> Plan {
        if scanner::is_settled(raffle) {
            return Plan::Finished;
        }

        if !raffle.has_tickets() {
            return if raffle.is_expired(now) {
                Plan::Act(Action::Cancel)
            } else {
                Plan::WaitForEnd {
                    end_time: raffle.end_time,
                }
            };
        }

        let Some(record) = commitment else {
            // Reusing the vault secret keeps a retried commit identical.
            let secret = self.vault.get_or_generate(raffle.id, &self.local_entropy);
            return Plan::Act(Action::Commit {
                commitment: secret.commitment(),
            });
        };

        if record.revealed {
            return Plan::Finished;
        }

        if record.is_reveal_window_open(now) {
            match self.vault.get(raffle.id) {
                Some(secret) if secret.matches(record.commitment) => {
                    Plan::Act(Action::Reveal { secret })
                }
                _ => Plan::WaitForDeadline {
                    reveal_deadline: record.reveal_deadline,
                },
            }
        } else {
            Plan::Act(Action::EmergencySelect)
        }
    }

    /// Drops everything held for a raffle that reached its terminal state.
    pub fn forget(&mut self, id: RaffleId) {
        if self.vault.remove(id).is_some() {
            tracing::debug!(raffle = %id, "secret discarded");
        }
    }
}

pub async fn execute<L: Ledger + ?Sized>(
    ledger: &L,
    id: RaffleId,
    action: &Action,
    params: &TxParams,
) -> LedgerResult<Submitted> {
    match action {
        Action::Commit { commitment } => ledger.commit_randomness(id, *commitment, params).await,
        Action::Reveal { secret } => ledger.reveal_randomness(id, secret, params).await,
        Action::EmergencySelect => ledger.emergency_select(id, params).await,
        Action::Cancel => ledger.cancel_raffle(id, params).await,
    }
}

pub fn resolve(action: &Action, result: LedgerResult<Submitted>) -> Resolution {
    let err = match result {
        Ok(submitted) => return Resolution::Done(submitted),
        Err(err) => err,
    };

    match (action, err) {
        (Action::Commit { .. }, LedgerError::Rejected(Rejection::AlreadyCommitted))
        | (_, LedgerError::Rejected(Rejection::NotActive)) => Resolution::NoOp,
        // A failed reveal is never repeated blindly, the deadline may have passed.
        (Action::Reveal { .. }, err) => Resolution::Replan(err),
        (_, err) if err.is_ambiguous() => Resolution::Replan(err),
        (_, LedgerError::Rejected(rejection)) => Resolution::Rejected(rejection),
        (_, err) => Resolution::Retry(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use keeper_common::{RaffleStatus, Reward, RewardKind, WriteOutcome};

    fn raffle(tickets_sold: u64) -> Raffle {
        Raffle {
            id: RaffleId(7),
            creator: Address::repeat_byte(1),
            ticket_price: U256::from(1),
            payment_token: Address::ZERO,
            max_tickets: 10,
            tickets_sold,
            start_time: 0,
            end_time: 100,
            reward: Reward {
                kind: RewardKind::Native,
                token: Address::ZERO,
                amount_or_id: U256::from(100),
            },
            status: RaffleStatus::Active,
            winner: None,
            reward_claimed: false,
        }
    }

    fn record(commitment: B256) -> RandomnessCommitment {
        RandomnessCommitment {
            commitment,
            commit_time: 200,
            reveal_deadline: 3800,
            revealed: false,
        }
    }

    #[test]
    fn empty_pool_is_cancelled() {
        let mut coordinator = Coordinator::new(b"test".to_vec());
        assert_eq!(
            coordinator.plan(&raffle(0), None, 200),
            Plan::Act(Action::Cancel)
        );
        assert!(coordinator.vault().is_empty());
    }

    #[test]
    fn empty_pool_waits_for_end() {
        let mut coordinator = Coordinator::new(b"test".to_vec());
        let mut unsellable = raffle(0);
        unsellable.max_tickets = 0;
        assert!(unsellable.is_sold_out());

        assert_eq!(
            coordinator.plan(&unsellable, None, 99),
            Plan::WaitForEnd { end_time: 100 }
        );
        assert_eq!(
            coordinator.plan(&unsellable, None, 100),
            Plan::Act(Action::Cancel)
        );
    }

    #[test]
    fn commit_then_reveal() {
        let mut coordinator = Coordinator::new(b"test".to_vec());
        let raffle = raffle(3);

        let Plan::Act(Action::Commit { commitment }) = coordinator.plan(&raffle, None, 200) else {
            panic!("expected commit");
        };
        // Planning again before the commit lands yields the same commitment.
        assert_eq!(
            coordinator.plan(&raffle, None, 201),
            Plan::Act(Action::Commit { commitment })
        );

        let record = record(commitment);
        let Plan::Act(Action::Reveal { secret }) = coordinator.plan(&raffle, Some(&record), 300)
        else {
            panic!("expected reveal");
        };
        assert!(secret.matches(commitment));

        assert_eq!(
            coordinator.plan(&raffle, Some(&record), 3800),
            Plan::Act(Action::EmergencySelect)
        );

        coordinator.forget(raffle.id);
        assert!(coordinator.vault().is_empty());
    }

    #[test]
    fn foreign_commitment_waits_for_deadline() {
        let mut coordinator = Coordinator::new(b"test".to_vec());
        let record = record(B256::repeat_byte(9));

        assert_eq!(
            coordinator.plan(&raffle(3), Some(&record), 300),
            Plan::WaitForDeadline {
                reveal_deadline: 3800
            }
        );
        assert_eq!(
            coordinator.plan(&raffle(3), Some(&record), 3800),
            Plan::Act(Action::EmergencySelect)
        );
    }

    #[test]
    fn settled_raffles_are_finished() {
        let mut coordinator = Coordinator::new(b"test".to_vec());
        let mut completed = raffle(3);
        completed.status = RaffleStatus::Completed;
        assert_eq!(coordinator.plan(&completed, None, 200), Plan::Finished);

        let mut revealed = record(B256::ZERO);
        revealed.revealed = true;
        assert_eq!(coordinator.plan(&raffle(3), Some(&revealed), 300), Plan::Finished);
    }

    #[test]
    fn resolution_of_failures() {
        let commit = Action::Commit {
            commitment: B256::ZERO,
        };
        let reveal = Action::Reveal {
            secret: Secret::from_bytes([1; 32]),
        };

        assert_eq!(
            resolve(&commit, Err(Rejection::AlreadyCommitted.into())),
            Resolution::NoOp
        );
        assert_eq!(
            resolve(&Action::Cancel, Err(Rejection::NotActive.into())),
            Resolution::NoOp
        );
        assert_eq!(
            resolve(&Action::EmergencySelect, Err(Rejection::TooEarly.into())),
            Resolution::Rejected(Rejection::TooEarly)
        );
        assert_eq!(
            resolve(&reveal, Err(Rejection::RevealWindowClosed.into())),
            Resolution::Replan(Rejection::RevealWindowClosed.into())
        );
        assert_eq!(
            resolve(&reveal, Err(LedgerError::Transient("down".into()))),
            Resolution::Replan(LedgerError::Transient("down".into()))
        );
        assert_eq!(
            resolve(&commit, Err(LedgerError::Timeout)),
            Resolution::Replan(LedgerError::Timeout)
        );
        assert_eq!(
            resolve(&commit, Err(LedgerError::Transient("down".into()))),
            Resolution::Retry(LedgerError::Transient("down".into()))
        );

        let submitted = Submitted {
            tx_hash: B256::ZERO,
            cost: 1,
            outcome: WriteOutcome::Cancelled,
        };
        assert_eq!(
            resolve(&Action::Cancel, Ok(submitted.clone())),
            Resolution::Done(submitted)
        );
    }
}
