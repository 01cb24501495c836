//! Contracts for every external collaborator the engine reads from or
//! writes to. The surrounding application (UI, auth, persistence details)
//! only ever touches the engine through these traits.

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    DraftCursor, DraftPick, FormationRule, PlayerScoreEntry, RoundFixture, RoundId, ScoreRecord,
    Team, TeamRoundRoster,
};

/// Read-only fixture feed: the list of rounds with dates and an optional
/// explicit upstream status.
#[async_trait]
pub trait FixtureFeed: Send + Sync {
    async fn fetch_rounds(&self) -> Result<Vec<RoundFixture>>;
}

/// Read-only per-round score feed, keyed by external scoring id.
#[async_trait]
pub trait PlayerScoreFeed: Send + Sync {
    async fn fetch_scores(&self, round_id: RoundId) -> Result<HashMap<String, PlayerScoreEntry>>;
}

/// Roster snapshots plus the live roster fallback. Snapshot writes happen
/// outside the engine, triggered at transfer-window close.
#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn roster_for_round(
        &self,
        team_id: &str,
        round_id: RoundId,
    ) -> Result<Option<TeamRoundRoster>>;

    /// The team's current editable roster. Used only when a team never had
    /// a round closed for it (mid-season joiners).
    async fn live_roster(&self, team_id: &str) -> Result<Option<TeamRoundRoster>>;
}

/// Append-only score records. No update or delete primitive exists in the
/// backing store; a recompute appends a new version and `latest` wins.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn latest(&self, team_id: &str, round_id: RoundId) -> Result<Option<ScoreRecord>>;
    async fn append(&self, record: &ScoreRecord) -> Result<()>;
}

#[async_trait]
pub trait FormationRuleStore: Send + Sync {
    async fn rule(&self, formation_id: &str) -> Result<Option<FormationRule>>;
}

/// Append-only draft pick rows plus the league's current pick pointer.
#[async_trait]
pub trait DraftPickStore: Send + Sync {
    async fn append_picks(&self, picks: &[DraftPick]) -> Result<()>;
    async fn picks(&self, league_id: &str) -> Result<Vec<DraftPick>>;
    async fn cursor(&self, league_id: &str) -> Result<Option<DraftCursor>>;
    async fn set_cursor(&self, league_id: &str, cursor: DraftCursor) -> Result<()>;
}

/// Scheduler resume checkpoint: last round id known to be fully scored.
/// Advances monotonically and only on confirmed success.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self) -> Result<RoundId>;
    async fn advance(&self, round_id: RoundId) -> Result<()>;
}

/// The population of teams the scheduler walks each finished round.
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    async fn teams(&self) -> Result<Vec<Team>>;
    async fn team(&self, team_id: &str) -> Result<Option<Team>>;
}
