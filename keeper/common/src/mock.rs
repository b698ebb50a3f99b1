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

//! In-memory ledger reproducing the raffle contract rules.
//!
//! Time is driven manually, failures can be injected per operation and every
//! submitted write and every value transfer is journaled so tests can assert
//! on what the keeper actually sent.

use crate::{
    ledger::{
        Ledger, LedgerError, LedgerResult, Rejection, SelectionPath, Submitted, TxParams,
        WriteOutcome,
    },
    primitives::{
        Raffle, RaffleId, RaffleStatus, RandomnessCommitment, Reward, RewardKind, Secret,
        Ticket,
    },
};
use alloy_primitives::{Address, B256, U256, keccak256};
use async_trait::async_trait;
use derive_more::Display;
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::Arc,
};

/// Reveal window of the targeted contract generation, in seconds.
pub const DEFAULT_REVEAL_WINDOW: u64 = 3600;

const GAS_PER_WRITE: u64 = 60_000;
const DEFAULT_GAS_PRICE: u128 = 1_000_000_000;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Candidates,
    Record,
    Commit,
    Reveal,
    Emergency,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    Prize {
        raffle: RaffleId,
        to: Address,
        reward: Reward,
    },
    Refund {
        raffle: RaffleId,
        to: Address,
        reward: Reward,
    },
}

impl Transfer {
    pub fn raffle(&self) -> RaffleId {
        match self {
            Self::Prize { raffle, .. } | Self::Refund { raffle, .. } => *raffle,
        }
    }
}

#[derive(Debug, Clone)]
enum Injected {
    Fail(LedgerError),
    /// Apply the write, then report the error.
    LandThenFail(LedgerError),
}

#[derive(Debug)]
struct Entry {
    raffle: Raffle,
    tickets: Vec<Ticket>,
    commitment: Option<RandomnessCommitment>,
    commit_entropy: B256,
}

#[derive(Debug)]
struct State {
    now: u64,
    reveal_window: u64,
    gas_price: u128,
    balance: U256,
    next_id: u64,
    tx_counter: u64,
    raffles: BTreeMap<RaffleId, Entry>,
    injected: HashMap<Op, VecDeque<Injected>>,
    writes: Vec<(Op, RaffleId)>,
    transfers: Vec<Transfer>,
}

impl State {
    fn take_injected(&mut self, op: Op) -> Option<Injected> {
        self.injected.get_mut(&op).and_then(VecDeque::pop_front)
    }

    fn entry_mut(&mut self, id: RaffleId) -> LedgerResult<&mut Entry> {
        self.raffles
            .get_mut(&id)
            .ok_or_else(|| Rejection::Other(format!("unknown raffle {id}")).into())
    }

    fn receipt(&mut self, outcome: WriteOutcome) -> Submitted {
        self.tx_counter += 1;
        let cost = GAS_PER_WRITE as u128 * self.gas_price;
        self.balance = self.balance.saturating_sub(U256::from(cost));

        Submitted {
            tx_hash: keccak256(self.tx_counter.to_be_bytes()),
            cost,
            outcome,
        }
    }

    fn apply(
        &mut self,
        op: Op,
        id: RaffleId,
        secret: Option<Secret>,
        commitment: B256,
    ) -> LedgerResult<WriteOutcome> {
        let now = self.now;
        let reveal_window = self.reveal_window;
        let entry = self.entry_mut(id)?;

        if entry.raffle.status.is_terminal() {
            return Err(Rejection::NotActive.into());
        }

        let transfer = match op {
            Op::Commit => {
                if entry.commitment.is_some() {
                    return Err(Rejection::AlreadyCommitted.into());
                }
                if !(entry.raffle.is_sold_out() || entry.raffle.is_expired(now))
                    || !entry.raffle.has_tickets()
                {
                    return Err(Rejection::NotEligible.into());
                }

                let record = RandomnessCommitment {
                    commitment,
                    commit_time: now,
                    reveal_deadline: now + reveal_window,
                    revealed: false,
                };
                entry.commitment = Some(record);
                entry.commit_entropy = keccak256([id.0.to_be_bytes(), now.to_be_bytes()].concat());

                return Ok(WriteOutcome::Committed {
                    commit_time: record.commit_time,
                    reveal_deadline: record.reveal_deadline,
                });
            }
            Op::Reveal | Op::Emergency => {
                let Some(mut record) = entry.commitment else {
                    return Err(Rejection::NotCommitted.into());
                };

                let (randomness, via) = if op == Op::Reveal {
                    if record.is_expired(now) {
                        return Err(Rejection::RevealWindowClosed.into());
                    }
                    let secret = secret.ok_or(Rejection::InvalidSecret)?;
                    if !secret.matches(record.commitment) {
                        return Err(Rejection::InvalidSecret.into());
                    }
                    record.revealed = true;
                    (
                        keccak256([secret.expose().0, entry.commit_entropy.0].concat()),
                        SelectionPath::Reveal,
                    )
                } else {
                    if !record.is_expired(now) {
                        return Err(Rejection::TooEarly.into());
                    }
                    (
                        keccak256([entry.commit_entropy.0, B256::from(U256::from(now)).0].concat()),
                        SelectionPath::Emergency,
                    )
                };

                let ticket_index = (U256::from_be_bytes(randomness.0)
                    % U256::from(entry.raffle.tickets_sold))
                .to::<u64>();
                let winner = entry.tickets[ticket_index as usize].buyer;

                entry.commitment = Some(record);
                entry.raffle.status = RaffleStatus::Completed;
                entry.raffle.winner = Some(winner);
                entry.raffle.reward_claimed = true;

                let outcome = WriteOutcome::WinnerSelected {
                    winner,
                    ticket_index,
                    via,
                };
                let transfer = Transfer::Prize {
                    raffle: id,
                    to: winner,
                    reward: entry.raffle.reward,
                };
                self.transfers.push(transfer);

                return Ok(outcome);
            }
            Op::Cancel => {
                if entry.raffle.has_tickets() {
                    return Err(Rejection::HasTickets.into());
                }
                if !entry.raffle.is_expired(now) {
                    return Err(Rejection::NotEligible.into());
                }

                entry.raffle.status = RaffleStatus::Cancelled;
                entry.raffle.reward_claimed = true;

                Transfer::Refund {
                    raffle: id,
                    to: entry.raffle.creator,
                    reward: entry.raffle.reward,
                }
            }
            Op::Candidates | Op::Record => unreachable!("not a write operation"),
        };

        self.transfers.push(transfer);
        Ok(WriteOutcome::Cancelled)
    }
}

/// Shared handle to the in-memory ledger; clones observe the same state.
#[derive(Debug, Clone)]
pub struct MockLedger {
    signer: Address,
    state: Arc<Mutex<State>>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self::with_reveal_window(DEFAULT_REVEAL_WINDOW)
    }

    pub fn with_reveal_window(reveal_window: u64) -> Self {
        Self {
            signer: Address::repeat_byte(0x4b),
            state: Arc::new(Mutex::new(State {
                now: 1_700_000_000,
                reveal_window,
                gas_price: DEFAULT_GAS_PRICE,
                balance: U256::from(10u128.pow(18)),
                next_id: 1,
                tx_counter: 0,
                raffles: BTreeMap::new(),
                injected: HashMap::new(),
                writes: Vec::new(),
                transfers: Vec::new(),
            })),
        }
    }

    pub fn now(&self) -> u64 {
        self.state.lock().now
    }

    pub fn set_time(&self, now: u64) {
        self.state.lock().now = now;
    }

    pub fn advance(&self, secs: u64) {
        self.state.lock().now += secs;
    }

    pub fn set_gas_price(&self, gas_price: u128) {
        self.state.lock().gas_price = gas_price;
    }

    pub fn set_balance(&self, balance: U256) {
        self.state.lock().balance = balance;
    }

    /// Opens a native-reward raffle ending `duration` seconds from now.
    pub fn create_raffle(&self, creator: Address, max_tickets: u64, duration: u64) -> RaffleId {
        let mut state = self.state.lock();
        let id = RaffleId(state.next_id);
        state.next_id += 1;

        let raffle = Raffle {
            id,
            creator,
            ticket_price: U256::from(10u64.pow(16)),
            payment_token: Address::ZERO,
            max_tickets,
            tickets_sold: 0,
            start_time: state.now,
            end_time: state.now + duration,
            reward: Reward {
                kind: RewardKind::Native,
                token: Address::ZERO,
                amount_or_id: U256::from(10u128.pow(18)),
            },
            status: RaffleStatus::Active,
            winner: None,
            reward_claimed: false,
        };

        state.raffles.insert(
            id,
            Entry {
                raffle,
                tickets: Vec::new(),
                commitment: None,
                commit_entropy: B256::ZERO,
            },
        );

        id
    }

    pub fn buy_tickets(&self, id: RaffleId, buyer: Address, count: u64) -> LedgerResult<()> {
        let mut state = self.state.lock();
        let now = state.now;
        let entry = state.entry_mut(id)?;

        if entry.raffle.status.is_terminal() {
            return Err(Rejection::NotActive.into());
        }
        if entry.raffle.is_expired(now)
            || entry.raffle.tickets_sold + count > entry.raffle.max_tickets
        {
            return Err(Rejection::NotEligible.into());
        }

        let first = entry.raffle.tickets_sold;
        entry.tickets.extend((first..first + count).map(|number| Ticket {
            raffle_id: id,
            buyer,
            number,
            purchase_time: now,
        }));
        entry.raffle.tickets_sold += count;

        Ok(())
    }

    /// Overrides status and winner, bypassing contract rules.
    pub fn force_state(&self, id: RaffleId, status: RaffleStatus, winner: Option<Address>) {
        let mut state = self.state.lock();
        if let Some(entry) = state.raffles.get_mut(&id) {
            entry.raffle.status = status;
            entry.raffle.winner = winner;
        }
    }

    pub fn snapshot(&self, id: RaffleId) -> Option<Raffle> {
        self.state.lock().raffles.get(&id).map(|entry| entry.raffle.clone())
    }

    pub fn commitment_of(&self, id: RaffleId) -> Option<RandomnessCommitment> {
        self.state.lock().raffles.get(&id).and_then(|entry| entry.commitment)
    }

    pub fn tickets(&self, id: RaffleId) -> Vec<Ticket> {
        self.state
            .lock()
            .raffles
            .get(&id)
            .map(|entry| entry.tickets.clone())
            .unwrap_or_default()
    }

    /// Makes the next `times` calls of `op` fail with `error` without effect.
    pub fn fail_next(&self, op: Op, times: usize, error: LedgerError) {
        let mut state = self.state.lock();
        let queue = state.injected.entry(op).or_default();
        queue.extend(std::iter::repeat_n(Injected::Fail(error), times));
    }

    /// Makes the next call of `op` take effect but report `error`.
    pub fn land_then_fail(&self, op: Op, error: LedgerError) {
        let mut state = self.state.lock();
        state
            .injected
            .entry(op)
            .or_default()
            .push_back(Injected::LandThenFail(error));
    }

    pub fn land_then_timeout(&self, op: Op) {
        self.land_then_fail(op, LedgerError::Timeout);
    }

    /// Every write submitted so far, including failed ones, in order.
    pub fn writes(&self) -> Vec<(Op, RaffleId)> {
        self.state.lock().writes.clone()
    }

    pub fn writes_for(&self, id: RaffleId) -> Vec<Op> {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|(_, raffle)| *raffle == id)
            .map(|(op, _)| *op)
            .collect()
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.state.lock().transfers.clone()
    }

    fn read<T>(&self, op: Op, f: impl FnOnce(&State) -> LedgerResult<T>) -> LedgerResult<T> {
        let mut state = self.state.lock();
        match state.take_injected(op) {
            Some(Injected::Fail(err)) => Err(err),
            _ => f(&state),
        }
    }

    fn write(
        &self,
        op: Op,
        id: RaffleId,
        secret: Option<Secret>,
        commitment: B256,
    ) -> LedgerResult<Submitted> {
        let mut state = self.state.lock();
        state.writes.push((op, id));

        match state.take_injected(op) {
            Some(Injected::Fail(err)) => Err(err),
            Some(Injected::LandThenFail(err)) => {
                let outcome = state.apply(op, id, secret, commitment)?;
                state.receipt(outcome);
                Err(err)
            }
            None => {
                let outcome = state.apply(op, id, secret, commitment)?;
                Ok(state.receipt(outcome))
            }
        }
    }

    fn ids_where(state: &State, f: impl Fn(&Raffle, u64) -> bool) -> Vec<RaffleId> {
        state
            .raffles
            .values()
            .filter(|entry| f(&entry.raffle, state.now))
            .map(|entry| entry.raffle.id)
            .collect()
    }
}

#[async_trait]
impl Ledger for MockLedger {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn active_raffles(&self) -> LedgerResult<Vec<RaffleId>> {
        self.read(Op::Candidates, |state| {
            Ok(Self::ids_where(state, |raffle, _| !raffle.status.is_terminal()))
        })
    }

    /// Like many deployed contracts, does not filter out finished raffles.
    async fn expired_raffles(&self) -> LedgerResult<Vec<RaffleId>> {
        self.read(Op::Candidates, |state| {
            Ok(Self::ids_where(state, |raffle, now| raffle.is_expired(now)))
        })
    }

    async fn sold_out_raffles(&self) -> LedgerResult<Vec<RaffleId>> {
        self.read(Op::Candidates, |state| {
            Ok(Self::ids_where(state, |raffle, _| raffle.is_sold_out()))
        })
    }

    async fn raffle(&self, id: RaffleId) -> LedgerResult<Raffle> {
        self.read(Op::Record, |state| {
            state
                .raffles
                .get(&id)
                .map(|entry| entry.raffle.clone())
                .ok_or_else(|| Rejection::Other(format!("unknown raffle {id}")).into())
        })
    }

    async fn commitment(&self, id: RaffleId) -> LedgerResult<Option<RandomnessCommitment>> {
        self.read(Op::Record, |state| {
            Ok(state.raffles.get(&id).and_then(|entry| entry.commitment))
        })
    }

    async fn latest_timestamp(&self) -> LedgerResult<u64> {
        Ok(self.state.lock().now)
    }

    async fn gas_price(&self) -> LedgerResult<u128> {
        Ok(self.state.lock().gas_price)
    }

    async fn signer_balance(&self) -> LedgerResult<U256> {
        Ok(self.state.lock().balance)
    }

    async fn commit_randomness(
        &self,
        id: RaffleId,
        commitment: B256,
        _params: &TxParams,
    ) -> LedgerResult<Submitted> {
        self.write(Op::Commit, id, None, commitment)
    }

    async fn reveal_randomness(
        &self,
        id: RaffleId,
        secret: &Secret,
        _params: &TxParams,
    ) -> LedgerResult<Submitted> {
        self.write(Op::Reveal, id, Some(*secret), B256::ZERO)
    }

    async fn emergency_select(&self, id: RaffleId, _params: &TxParams) -> LedgerResult<Submitted> {
        self.write(Op::Emergency, id, None, B256::ZERO)
    }

    async fn cancel_raffle(&self, id: RaffleId, _params: &TxParams) -> LedgerResult<Submitted> {
        self.write(Op::Cancel, id, None, B256::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: TxParams = TxParams {
        gas_limit: 500_000,
        max_fee_per_gas: 50_000_000_000,
    };

    fn buyer(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    #[tokio::test]
    async fn reveal_selects_ticket_holder() {
        let ledger = MockLedger::new();
        let id = ledger.create_raffle(buyer(0xcc), 4, 600);
        ledger.buy_tickets(id, buyer(1), 3).unwrap();
        ledger.buy_tickets(id, buyer(2), 1).unwrap();

        let secret = Secret::generate(id, b"test");
        let committed = ledger
            .commit_randomness(id, secret.commitment(), &PARAMS)
            .await
            .unwrap();
        let WriteOutcome::Committed {
            commit_time,
            reveal_deadline,
        } = committed.outcome
        else {
            panic!("unexpected outcome {:?}", committed.outcome);
        };
        assert!(reveal_deadline > commit_time);

        let revealed = ledger.reveal_randomness(id, &secret, &PARAMS).await.unwrap();
        let WriteOutcome::WinnerSelected { winner, via, .. } = revealed.outcome else {
            panic!("unexpected outcome {:?}", revealed.outcome);
        };

        assert_eq!(via, SelectionPath::Reveal);
        let tickets = ledger.tickets(id);
        assert_eq!(tickets.len(), 4);
        assert_eq!(tickets[3].number, 3);
        assert!(tickets.iter().any(|ticket| ticket.buyer == winner));
        assert_eq!(ledger.snapshot(id).unwrap().status, RaffleStatus::Completed);
        assert_eq!(ledger.transfers().len(), 1);
    }

    #[tokio::test]
    async fn contract_rules_are_enforced() {
        let ledger = MockLedger::new();
        let id = ledger.create_raffle(buyer(0xcc), 2, 600);
        ledger.buy_tickets(id, buyer(1), 1).unwrap();

        // Neither sold out nor expired.
        let err = ledger
            .commit_randomness(id, B256::ZERO, &PARAMS)
            .await
            .unwrap_err();
        assert_eq!(err, Rejection::NotEligible.into());

        ledger.advance(600);
        let secret = Secret::generate(id, b"test");
        ledger
            .commit_randomness(id, secret.commitment(), &PARAMS)
            .await
            .unwrap();

        let err = ledger
            .commit_randomness(id, secret.commitment(), &PARAMS)
            .await
            .unwrap_err();
        assert_eq!(err, Rejection::AlreadyCommitted.into());

        let err = ledger.emergency_select(id, &PARAMS).await.unwrap_err();
        assert_eq!(err, Rejection::TooEarly.into());

        let wrong = Secret::generate(id, b"other");
        let err = ledger.reveal_randomness(id, &wrong, &PARAMS).await.unwrap_err();
        assert_eq!(err, Rejection::InvalidSecret.into());

        ledger.advance(DEFAULT_REVEAL_WINDOW);
        let err = ledger.reveal_randomness(id, &secret, &PARAMS).await.unwrap_err();
        assert_eq!(err, Rejection::RevealWindowClosed.into());

        let selected = ledger.emergency_select(id, &PARAMS).await.unwrap();
        assert!(matches!(
            selected.outcome,
            WriteOutcome::WinnerSelected {
                via: SelectionPath::Emergency,
                ..
            }
        ));

        let err = ledger.emergency_select(id, &PARAMS).await.unwrap_err();
        assert_eq!(err, Rejection::NotActive.into());
    }

    #[tokio::test]
    async fn cancel_refunds_creator() {
        let ledger = MockLedger::new();
        let creator = buyer(0xcc);
        let id = ledger.create_raffle(creator, 5, 60);

        let err = ledger.cancel_raffle(id, &PARAMS).await.unwrap_err();
        assert_eq!(err, Rejection::NotEligible.into());

        ledger.advance(60);
        let err = ledger
            .commit_randomness(id, B256::ZERO, &PARAMS)
            .await
            .unwrap_err();
        assert_eq!(err, Rejection::NotEligible.into());

        let cancelled = ledger.cancel_raffle(id, &PARAMS).await.unwrap();
        assert_eq!(cancelled.outcome, WriteOutcome::Cancelled);
        assert!(matches!(
            ledger.transfers().as_slice(),
            [Transfer::Refund { to, .. }] if *to == creator
        ));
    }

    #[tokio::test]
    async fn injected_failures() {
        let ledger = MockLedger::new();
        let id = ledger.create_raffle(buyer(0xcc), 1, 60);
        ledger.buy_tickets(id, buyer(1), 1).unwrap();

        ledger.fail_next(Op::Commit, 1, LedgerError::Transient("rpc down".into()));
        let err = ledger
            .commit_randomness(id, B256::ZERO, &PARAMS)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(ledger.commitment_of(id).is_none());

        ledger.land_then_timeout(Op::Commit);
        let err = ledger
            .commit_randomness(id, B256::ZERO, &PARAMS)
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::Timeout);
        assert!(ledger.commitment_of(id).is_some());

        assert_eq!(ledger.writes_for(id), vec![Op::Commit, Op::Commit]);
    }

    #[tokio::test]
    async fn expired_query_includes_finished_raffles() {
        let ledger = MockLedger::new();
        let id = ledger.create_raffle(buyer(0xcc), 1, 60);
        ledger.advance(60);
        ledger.force_state(id, RaffleStatus::Cancelled, None);

        assert_eq!(ledger.expired_raffles().await.unwrap(), vec![id]);
        assert!(ledger.active_raffles().await.unwrap().is_empty());
    }
}
