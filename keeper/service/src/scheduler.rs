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

//! Cycle loop executing finalization actions one at a time.

use crate::{
    config::{ConfigError, ExecutionPolicy, KeeperConfig},
    coordinator::{self, Action, Coordinator, Plan, Resolution},
    scanner::{self, ScanReport},
    stats::{Outcome, Statistics, Summary},
};
use anyhow::{Context as _, Result};
use derive_more::Display;
use keeper_common::{
    Ledger, LedgerError, Raffle, RaffleId, RaffleStatus, RandomnessCommitment, Rejection,
    SelectionPath, TxParams, WriteOutcome,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    future::Future,
    time::Duration,
};
use tokio::time::MissedTickBehavior;

/// Final state of one raffle within a cycle.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum RaffleOutcome {
    #[display("completed via {_0}")]
    Completed(SelectionPath),
    #[display("cancelled")]
    Cancelled,
    #[display("already terminal")]
    AlreadyTerminal,
    #[display("waiting for reveal deadline {_0}")]
    AwaitingDeadline(u64),
    #[display("waiting for sale end {_0}")]
    AwaitingEnd(u64),
    #[display("skipped: gas price {_0} above ceiling")]
    PriceCeiling(u128),
    #[display("rejected: {_0}")]
    Rejected(Rejection),
    #[display("deferred: {_0}")]
    Deferred(LedgerError),
    /// Action budget for this cycle used up, work continues next cycle.
    #[display("in progress")]
    InProgress,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub cycle: u64,
    /// Ledger timestamp the cycle was evaluated at.
    pub now: u64,
    pub scan: ScanReport,
    pub outcomes: BTreeMap<RaffleId, RaffleOutcome>,
}

/// Everything the scheduler mutates across cycles.
pub struct SchedulerContext<L> {
    pub ledger: L,
    pub config: KeeperConfig,
    pub coordinator: Coordinator,
    pub stats: Statistics,
    /// Ids observed terminal during this process lifetime.
    pub terminal: BTreeSet<RaffleId>,
}

pub struct Scheduler<L> {
    ctx: SchedulerContext<L>,
}

enum Attempt {
    Landed(WriteOutcome),
    NoOp,
    Stop(RaffleOutcome),
    /// State must be re-read. With `submitted` set, the write may have landed.
    Replan { err: LedgerError, submitted: bool },
}

impl<L: Ledger> Scheduler<L> {
    pub fn new(ledger: L, config: KeeperConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let coordinator = Coordinator::new(ledger.signer().to_vec());
        let stats = Statistics::new(config.min_balance);

        Ok(Self {
            ctx: SchedulerContext {
                ledger,
                config,
                coordinator,
                stats,
                terminal: BTreeSet::new(),
            },
        })
    }

    pub fn context(&self) -> &SchedulerContext<L> {
        &self.ctx
    }

    pub fn summary(&self) -> Summary {
        self.ctx.stats.summary()
    }

    fn policy(&self) -> &ExecutionPolicy {
        &self.ctx.config.policy
    }

    fn tx_params(&self) -> TxParams {
        TxParams {
            gas_limit: self.policy().gas_limit,
            max_fee_per_gas: self.policy().max_gas_price,
        }
    }

    /// Runs cycles on the polling interval until `shutdown` resolves.
    ///
    /// A cycle in progress is always completed before shutting down.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Summary {
        let mut interval = tokio::time::interval(self.ctx.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            signer = %self.ctx.ledger.signer(),
            interval = ?self.ctx.config.poll_interval,
            "keeper started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = interval.tick() => {}
            }

            match self.run_cycle().await {
                Ok(report) => tracing::debug!(
                    cycle = report.cycle,
                    pending = report.scan.pending(),
                    acted = report.outcomes.len(),
                    "cycle finished"
                ),
                Err(err) => tracing::warn!("cycle failed: {err:#}"),
            }

            let cycles = self.ctx.stats.counters().cycles;
            if cycles % self.ctx.config.summary_every == 0 {
                tracing::info!("📊 {}", self.ctx.stats.summary());
            }
        }

        let summary = self.ctx.stats.summary();
        tracing::info!("🛑 shutting down, final stats: {summary}");

        summary
    }

    /// Scans the ledger and drives every pending raffle as far as possible.
    ///
    /// Each pending id is handled at most once; sold out raffles go first.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let cycle = self.ctx.stats.begin_cycle();

        let now = self
            .ctx
            .ledger
            .latest_timestamp()
            .await
            .context("failed to read ledger time")?;

        match self.ctx.ledger.signer_balance().await {
            Ok(balance) => {
                self.ctx.stats.observe_balance(balance);
            }
            Err(err) => tracing::warn!(error = %err, "failed to read signer balance"),
        }

        let scan = scanner::scan(&self.ctx.ledger, now, &self.ctx.terminal)
            .await
            .context("failed to scan raffles")?;

        for &id in &scan.already_terminal {
            self.mark_terminal(id);
        }

        let mut report = CycleReport {
            cycle,
            now,
            ..Default::default()
        };

        let order: Vec<_> = scan.work_order().collect();
        for id in order {
            if report.outcomes.contains_key(&id) {
                continue;
            }

            let outcome = self.process(id, scan.records.get(&id).cloned()).await;
            tracing::debug!(raffle = %id, %outcome, "raffle processed");
            report.outcomes.insert(id, outcome);
        }

        report.scan = scan;
        Ok(report)
    }

    /// Refuses any write for a raffle already known to be terminal.
    fn ensure_actionable(&self, id: RaffleId) -> bool {
        let actionable = !self.ctx.terminal.contains(&id);
        if !actionable {
            tracing::debug!(raffle = %id, "refusing write for terminal raffle");
        }
        actionable
    }

    fn mark_terminal(&mut self, id: RaffleId) {
        if self.ctx.terminal.insert(id) {
            self.ctx.coordinator.forget(id);
        }
    }

    async fn backoff(&self) {
        sleep(self.policy().retry_backoff).await;
    }

    async fn process(&mut self, id: RaffleId, mut record: Option<Raffle>) -> RaffleOutcome {
        let max_attempts = self.policy().max_attempts;
        let mut actions = 0;
        let mut replans = 0;
        let mut unconfirmed: Option<Action> = None;

        loop {
            if !self.ensure_actionable(id) {
                return RaffleOutcome::AlreadyTerminal;
            }

            let (raffle, commitment, now) = match self.read_state(id, record.take()).await {
                Ok(state) => state,
                Err(err) => {
                    replans += 1;
                    if replans >= max_attempts {
                        tracing::warn!(raffle = %id, error = %err, "ledger unreadable, deferring");
                        self.ctx.stats.record(Outcome::Errored);
                        return RaffleOutcome::Deferred(err);
                    }
                    self.backoff().await;
                    continue;
                }
            };

            if let Some(action) = unconfirmed.take() {
                if let Some(outcome) = landed(&action, &raffle, commitment.as_ref()) {
                    tracing::info!(raffle = %id, %action, "write landed despite failure report");
                    self.ctx.stats.record(outcome);

                    let finished = match outcome {
                        Outcome::Revealed => Some(RaffleOutcome::Completed(SelectionPath::Reveal)),
                        Outcome::Emergency => {
                            Some(RaffleOutcome::Completed(SelectionPath::Emergency))
                        }
                        Outcome::Cancelled => Some(RaffleOutcome::Cancelled),
                        _ => None,
                    };
                    if let Some(finished) = finished {
                        self.mark_terminal(id);
                        return finished;
                    }
                }
            }

            let action = match self.ctx.coordinator.plan(&raffle, commitment.as_ref(), now) {
                Plan::Finished => {
                    self.mark_terminal(id);
                    return RaffleOutcome::AlreadyTerminal;
                }
                Plan::WaitForDeadline { reveal_deadline } => {
                    tracing::debug!(raffle = %id, reveal_deadline, "foreign commitment, waiting");
                    return RaffleOutcome::AwaitingDeadline(reveal_deadline);
                }
                Plan::WaitForEnd { end_time } => {
                    tracing::debug!(raffle = %id, end_time, "no tickets sold yet, waiting");
                    return RaffleOutcome::AwaitingEnd(end_time);
                }
                Plan::Act(action) => action,
            };

            if actions >= self.policy().max_actions_per_raffle {
                return RaffleOutcome::InProgress;
            }
            actions += 1;

            match self.attempt(id, &action).await {
                Attempt::Landed(outcome) => match outcome {
                    WriteOutcome::WinnerSelected { via, .. } => {
                        self.mark_terminal(id);
                        return RaffleOutcome::Completed(via);
                    }
                    WriteOutcome::Cancelled => {
                        self.mark_terminal(id);
                        return RaffleOutcome::Cancelled;
                    }
                    WriteOutcome::AlreadyTerminal => {
                        self.mark_terminal(id);
                        return RaffleOutcome::AlreadyTerminal;
                    }
                    WriteOutcome::Committed { .. } | WriteOutcome::NoOp => {}
                },
                Attempt::NoOp => {}
                Attempt::Stop(outcome) => return outcome,
                Attempt::Replan { err, submitted } => {
                    if submitted {
                        unconfirmed = Some(action);
                    }
                    replans += 1;
                    if replans >= max_attempts {
                        tracing::warn!(
                            raffle = %id,
                            %action,
                            error = %err,
                            "giving up until next cycle"
                        );
                        self.ctx.stats.record(Outcome::Errored);
                        return RaffleOutcome::Deferred(err);
                    }
                    tracing::debug!(raffle = %id, %action, error = %err, "re-reading ledger state");
                    self.backoff().await;
                }
            }
        }
    }

    async fn read_state(
        &self,
        id: RaffleId,
        record: Option<Raffle>,
    ) -> Result<(Raffle, Option<RandomnessCommitment>, u64), LedgerError> {
        let ledger = &self.ctx.ledger;

        let raffle = match record {
            Some(raffle) => raffle,
            None => ledger.raffle(id).await?,
        };
        let commitment = if raffle.has_tickets() && !scanner::is_settled(&raffle) {
            ledger.commitment(id).await?
        } else {
            None
        };
        let now = ledger.latest_timestamp().await?;

        Ok((raffle, commitment, now))
    }

    /// Submits one action, retrying it verbatim while that is safe.
    async fn attempt(&mut self, id: RaffleId, action: &Action) -> Attempt {
        let max_attempts = self.policy().max_attempts;
        let params = self.tx_params();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.ctx.ledger.gas_price().await {
                Ok(price) if price > self.policy().max_gas_price => {
                    tracing::warn!(
                        raffle = %id,
                        %action,
                        gas_price = price,
                        ceiling = self.policy().max_gas_price,
                        "gas price above ceiling, skipping until next cycle"
                    );
                    self.ctx.stats.record(Outcome::Skipped);
                    return Attempt::Stop(RaffleOutcome::PriceCeiling(price));
                }
                Ok(_) => {}
                Err(err) => {
                    return Attempt::Replan {
                        err,
                        submitted: false,
                    };
                }
            }

            if !self.ensure_actionable(id) {
                self.ctx.stats.record(Outcome::Skipped);
                return Attempt::Stop(RaffleOutcome::AlreadyTerminal);
            }

            tracing::info!(raffle = %id, %action, attempt, "submitting");
            let result = coordinator::execute(&self.ctx.ledger, id, action, &params).await;

            match coordinator::resolve(action, result) {
                Resolution::Done(submitted) => {
                    self.ctx.stats.record_cost(submitted.cost);
                    self.ctx.stats.record(outcome_of(&submitted.outcome));
                    tracing::info!(
                        raffle = %id,
                        %action,
                        tx = %submitted.tx_hash,
                        cost = submitted.cost,
                        outcome = ?submitted.outcome,
                        "✅ confirmed"
                    );
                    sleep(self.policy().action_delay).await;
                    return Attempt::Landed(submitted.outcome);
                }
                Resolution::NoOp => {
                    tracing::info!(raffle = %id, %action, "ledger already reflects action");
                    self.ctx.stats.record(Outcome::NoOp);
                    return Attempt::NoOp;
                }
                Resolution::Rejected(rejection) => {
                    tracing::warn!(raffle = %id, %action, %rejection, "action rejected");
                    self.ctx.stats.record(Outcome::Errored);
                    return Attempt::Stop(RaffleOutcome::Rejected(rejection));
                }
                Resolution::Replan(err) => {
                    return Attempt::Replan {
                        err,
                        submitted: true,
                    };
                }
                Resolution::Retry(err) if attempt >= max_attempts => {
                    tracing::warn!(
                        raffle = %id,
                        %action,
                        error = %err,
                        "retries exhausted, deferring to next cycle"
                    );
                    self.ctx.stats.record(Outcome::Errored);
                    return Attempt::Stop(RaffleOutcome::Deferred(err));
                }
                Resolution::Retry(err) => {
                    tracing::debug!(raffle = %id, %action, attempt, error = %err, "retrying");
                    self.backoff().await;
                }
            }
        }
    }
}

/// Transition a write reported as failed left on the ledger, if any. Fees of
/// such writes are unknown without a receipt and are not counted.
fn landed(
    action: &Action,
    raffle: &Raffle,
    commitment: Option<&RandomnessCommitment>,
) -> Option<Outcome> {
    let settled = scanner::is_settled(raffle);

    match action {
        Action::Commit { commitment: sent } => commitment
            .filter(|record| record.commitment == *sent)
            .map(|_| Outcome::Committed),
        Action::Reveal { .. } => {
            (settled && raffle.status != RaffleStatus::Emergency).then_some(Outcome::Revealed)
        }
        Action::EmergencySelect => {
            (settled && raffle.status != RaffleStatus::Cancelled).then_some(Outcome::Emergency)
        }
        Action::Cancel => (raffle.status == RaffleStatus::Cancelled).then_some(Outcome::Cancelled),
    }
}

fn outcome_of(outcome: &WriteOutcome) -> Outcome {
    match outcome {
        WriteOutcome::Committed { .. } => Outcome::Committed,
        WriteOutcome::WinnerSelected {
            via: SelectionPath::Reveal,
            ..
        } => Outcome::Revealed,
        WriteOutcome::WinnerSelected {
            via: SelectionPath::Emergency,
            ..
        } => Outcome::Emergency,
        WriteOutcome::Cancelled => Outcome::Cancelled,
        WriteOutcome::NoOp | WriteOutcome::AlreadyTerminal => Outcome::NoOp,
    }
}

async fn sleep(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
