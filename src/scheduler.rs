use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashSet;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::calculator::ScoreCalculator;
use crate::clock::RoundClock;
use crate::error::Result;
use crate::store::{CheckpointStore, ScoreStore, TeamDirectory};
use crate::types::RoundId;

// ---------------------------------------------------------------------------
// In-flight guard
// ---------------------------------------------------------------------------

/// Process-wide set of round ids currently being computed. Check-and-insert
/// is atomic, so two triggers racing for the same round resolve to exactly
/// one winner; the loser skips silently.
#[derive(Default)]
pub struct InFlightRounds {
    rounds: DashSet<RoundId>,
}

impl InFlightRounds {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns a guard that releases the entry on drop, so success,
    /// error and early return all walk through the same release path.
    pub fn try_acquire(&self, round_id: RoundId) -> Option<InFlightGuard<'_>> {
        if self.rounds.insert(round_id) {
            Some(InFlightGuard { rounds: self, round_id })
        } else {
            None
        }
    }

    pub fn is_held(&self, round_id: RoundId) -> bool {
        self.rounds.contains(&round_id)
    }
}

pub struct InFlightGuard<'a> {
    rounds: &'a InFlightRounds,
    round_id: RoundId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.rounds.rounds.remove(&self.round_id);
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Round was not yet finished; retained for a later tick.
    NotFinished,
    /// Every team already had a record; nothing recomputed.
    AlreadyScored,
    /// Another trigger holds the round's in-flight entry.
    SkippedInFlight,
    /// All pending teams were computed and persisted.
    Scored { teams: usize },
    /// Some teams failed; the round stays pending for the next tick.
    Incomplete { scored: usize, failed: usize },
}

#[derive(Debug)]
pub struct TickReport {
    pub processed: Vec<(RoundId, RoundOutcome)>,
    pub checkpoint: RoundId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecomputeSummary {
    pub computed: usize,
    pub skipped_in_flight: bool,
}

/// Walks unfinished→finished round transitions on a timer, computing and
/// persisting every team's score for each newly finished round, and
/// advancing the resume checkpoint across the contiguous prefix of fully
/// scored rounds.
pub struct Scheduler {
    clock: Arc<RoundClock>,
    calculator: Arc<ScoreCalculator>,
    scores: Arc<dyn ScoreStore>,
    checkpoint: Arc<dyn CheckpointStore>,
    teams: Arc<dyn TeamDirectory>,
    in_flight: Arc<InFlightRounds>,
    health: Arc<HealthState>,
    tick_interval: Duration,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: Arc<RoundClock>,
        calculator: Arc<ScoreCalculator>,
        scores: Arc<dyn ScoreStore>,
        checkpoint: Arc<dyn CheckpointStore>,
        teams: Arc<dyn TeamDirectory>,
        in_flight: Arc<InFlightRounds>,
        health: Arc<HealthState>,
        tick_interval: Duration,
    ) -> Self {
        Self { clock, calculator, scores, checkpoint, teams, in_flight, health, tick_interval }
    }

    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.tick_interval);

        loop {
            ticker.tick().await;
            match self.tick().await {
                Ok(report) => {
                    if !report.processed.is_empty() {
                        info!(
                            checkpoint = report.checkpoint,
                            rounds = report.processed.len(),
                            "Scheduler tick complete",
                        );
                    }
                }
                Err(e) => error!("Scheduler tick failed: {e}"),
            }
        }
    }

    /// One pass over every round strictly above the checkpoint, up to and
    /// including the current round, ascending. A failure on one round is
    /// logged and left for the next tick while later rounds still proceed.
    pub async fn tick(&self) -> Result<TickReport> {
        let current = self.clock.current_round().await?;
        let mut checkpoint = self.checkpoint.load().await?;
        self.health.record_tick();

        let mut processed = Vec::new();
        // Checkpoint advances only across a contiguous prefix of scored
        // rounds; a pending round must stay below it or it would never
        // be retried.
        let mut contiguous = true;

        for round_id in (checkpoint + 1)..=current.id {
            let outcome = match self.walk_round(round_id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    if e.is_transient() {
                        warn!(round_id, "Round attempt abandoned for this tick: {e}");
                    } else {
                        error!(round_id, "Round scoring failed: {e}");
                    }
                    contiguous = false;
                    continue;
                }
            };

            match outcome {
                RoundOutcome::Scored { .. } | RoundOutcome::AlreadyScored => {
                    if contiguous {
                        self.checkpoint.advance(round_id).await?;
                        checkpoint = round_id;
                    }
                }
                RoundOutcome::NotFinished
                | RoundOutcome::SkippedInFlight
                | RoundOutcome::Incomplete { .. } => {
                    contiguous = false;
                }
            }
            processed.push((round_id, outcome));
        }

        Ok(TickReport { processed, checkpoint })
    }

    async fn walk_round(&self, round_id: RoundId) -> Result<RoundOutcome> {
        if !self.clock.is_finished(round_id).await? {
            debug!(round_id, "Round not finished yet, retained for a later tick");
            return Ok(RoundOutcome::NotFinished);
        }

        let teams = self.teams.teams().await?;
        let mut pending = Vec::new();
        for team in &teams {
            if self.scores.latest(&team.id, round_id).await?.is_none() {
                pending.push(team.id.clone());
            }
        }
        if pending.is_empty() {
            debug!(round_id, "All teams already scored, advancing past round");
            return Ok(RoundOutcome::AlreadyScored);
        }

        let Some(_guard) = self.in_flight.try_acquire(round_id) else {
            debug!(round_id, "Round already being computed by another trigger");
            return Ok(RoundOutcome::SkippedInFlight);
        };

        // Guard held across the whole compute-and-persist sequence; the
        // drop at the end of this scope releases it on every exit path.
        let mut scored = 0usize;
        let mut failed = 0usize;
        for team_id in &pending {
            // A concurrent trigger may have settled this team between the
            // pending check and guard acquisition.
            if self.scores.latest(team_id, round_id).await?.is_some() {
                continue;
            }
            match self.compute_and_persist(team_id, round_id).await {
                Ok(()) => scored += 1,
                Err(e) => {
                    warn!(team_id = %team_id, round_id, "Team scoring failed, retrying next tick: {e}");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Ok(RoundOutcome::Incomplete { scored, failed });
        }
        info!(round_id, teams = scored, "Round scored");
        self.health.record_round_scored();
        Ok(RoundOutcome::Scored { teams: scored })
    }

    async fn compute_and_persist(&self, team_id: &str, round_id: RoundId) -> Result<()> {
        let record = self.calculator.compute(team_id, round_id, Utc::now()).await?;
        self.scores.append(&record).await
    }

    /// Manual trigger. Unlike the tick loop this surfaces errors
    /// synchronously to the caller; `force` appends a fresh version for
    /// every team even when records exist (latest wins on read).
    pub async fn recompute_round(&self, round_id: RoundId, force: bool) -> Result<RecomputeSummary> {
        if !self.clock.is_finished(round_id).await? {
            return Err(crate::error::AppError::MissingData(format!(
                "round {round_id} is not finished"
            )));
        }

        let Some(_guard) = self.in_flight.try_acquire(round_id) else {
            debug!(round_id, "Recompute request ignored, round already in flight");
            return Ok(RecomputeSummary { computed: 0, skipped_in_flight: true });
        };

        let teams = self.teams.teams().await?;
        let mut computed = 0usize;
        for team in &teams {
            if !force && self.scores.latest(&team.id, round_id).await?.is_some() {
                continue;
            }
            self.compute_and_persist(&team.id, round_id).await?;
            computed += 1;
        }
        info!(round_id, computed, force, "Manual recompute complete");
        Ok(RecomputeSummary { computed, skipped_in_flight: false })
    }
}
