//! In-memory adapters for every store contract. Used by tests and by
//! local runs that don't need durability.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::store::{
    CheckpointStore, DraftPickStore, FixtureFeed, FormationRuleStore, PlayerScoreFeed, RosterStore,
    ScoreStore, TeamDirectory,
};
use crate::types::{
    DraftCursor, DraftPick, FormationRule, PlayerScoreEntry, RoundFixture, RoundId, ScoreRecord,
    Team, TeamId, TeamRoundRoster,
};

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryFixtureFeed {
    fixtures: RwLock<Vec<RoundFixture>>,
}

impl MemoryFixtureFeed {
    pub fn new(fixtures: Vec<RoundFixture>) -> Self {
        Self { fixtures: RwLock::new(fixtures) }
    }

    pub fn set_fixtures(&self, fixtures: Vec<RoundFixture>) {
        *self.fixtures.write().expect("fixture lock poisoned") = fixtures;
    }
}

#[async_trait]
impl FixtureFeed for MemoryFixtureFeed {
    async fn fetch_rounds(&self) -> Result<Vec<RoundFixture>> {
        Ok(self.fixtures.read().expect("fixture lock poisoned").clone())
    }
}

#[derive(Default)]
pub struct MemoryScoreFeed {
    by_round: DashMap<RoundId, HashMap<String, PlayerScoreEntry>>,
}

impl MemoryScoreFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_round(&self, round_id: RoundId, entries: Vec<PlayerScoreEntry>) {
        let map = entries.into_iter().map(|e| (e.scoring_id.clone(), e)).collect();
        self.by_round.insert(round_id, map);
    }
}

#[async_trait]
impl PlayerScoreFeed for MemoryScoreFeed {
    async fn fetch_scores(&self, round_id: RoundId) -> Result<HashMap<String, PlayerScoreEntry>> {
        Ok(self.by_round.get(&round_id).map(|e| e.clone()).unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Rosters
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRosterStore {
    snapshots: DashMap<(TeamId, RoundId), TeamRoundRoster>,
    live: DashMap<TeamId, TeamRoundRoster>,
}

impl MemoryRosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_snapshot(&self, roster: TeamRoundRoster) {
        self.snapshots.insert((roster.team_id.clone(), roster.round_id), roster);
    }

    pub fn insert_live(&self, roster: TeamRoundRoster) {
        self.live.insert(roster.team_id.clone(), roster);
    }
}

#[async_trait]
impl RosterStore for MemoryRosterStore {
    async fn roster_for_round(
        &self,
        team_id: &str,
        round_id: RoundId,
    ) -> Result<Option<TeamRoundRoster>> {
        Ok(self.snapshots.get(&(team_id.to_string(), round_id)).map(|r| r.clone()))
    }

    async fn live_roster(&self, team_id: &str) -> Result<Option<TeamRoundRoster>> {
        Ok(self.live.get(team_id).map(|r| r.clone()))
    }
}

// ---------------------------------------------------------------------------
// Scores — append-only versions, latest wins on read
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryScoreStore {
    records: DashMap<(TeamId, RoundId), Vec<ScoreRecord>>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored versions for one key. Test hook for the
    /// at-most-once property.
    pub fn version_count(&self, team_id: &str, round_id: RoundId) -> usize {
        self.records
            .get(&(team_id.to_string(), round_id))
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn latest(&self, team_id: &str, round_id: RoundId) -> Result<Option<ScoreRecord>> {
        Ok(self
            .records
            .get(&(team_id.to_string(), round_id))
            .and_then(|v| v.last().cloned()))
    }

    async fn append(&self, record: &ScoreRecord) -> Result<()> {
        self.records
            .entry((record.team_id.clone(), record.round_id))
            .or_default()
            .push(record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Formation rules
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryFormationRules {
    rules: DashMap<String, FormationRule>,
}

impl MemoryFormationRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard formation table shipped with the engine.
    pub fn with_defaults() -> Self {
        let store = Self::default();
        for rule in [
            FormationRule::new("F433", 1, 2, 2, 3, 3, 1),
            FormationRule::new("F442", 1, 2, 2, 4, 2, 1),
            FormationRule::new("F352", 1, 3, 0, 5, 2, 1),
            FormationRule::new("F532", 1, 3, 2, 3, 2, 1),
            FormationRule::new("F343", 1, 3, 0, 4, 3, 1),
        ] {
            store.insert(rule);
        }
        store
    }

    pub fn insert(&self, rule: FormationRule) {
        self.rules.insert(rule.id.clone(), rule);
    }
}

#[async_trait]
impl FormationRuleStore for MemoryFormationRules {
    async fn rule(&self, formation_id: &str) -> Result<Option<FormationRule>> {
        Ok(self.rules.get(formation_id).map(|r| r.clone()))
    }
}

// ---------------------------------------------------------------------------
// Draft picks
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryDraftPickStore {
    picks: DashMap<String, Vec<DraftPick>>,
    cursors: DashMap<String, DraftCursor>,
}

impl MemoryDraftPickStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftPickStore for MemoryDraftPickStore {
    async fn append_picks(&self, picks: &[DraftPick]) -> Result<()> {
        for pick in picks {
            self.picks.entry(pick.league_id.clone()).or_default().push(pick.clone());
        }
        Ok(())
    }

    async fn picks(&self, league_id: &str) -> Result<Vec<DraftPick>> {
        let mut picks = self.picks.get(league_id).map(|p| p.clone()).unwrap_or_default();
        picks.sort_by_key(|p| p.order_index);
        Ok(picks)
    }

    async fn cursor(&self, league_id: &str) -> Result<Option<DraftCursor>> {
        Ok(self.cursors.get(league_id).map(|c| *c))
    }

    async fn set_cursor(&self, league_id: &str, cursor: DraftCursor) -> Result<()> {
        self.cursors.insert(league_id.to_string(), cursor);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// Single-integer resume checkpoint. `advance` is monotonic; a stale
/// writer can never move it backwards.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    last_scored: AtomicU32,
}

impl MemoryCheckpointStore {
    pub fn new(last_scored: RoundId) -> Self {
        Self { last_scored: AtomicU32::new(last_scored) }
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<RoundId> {
        Ok(self.last_scored.load(Ordering::SeqCst))
    }

    async fn advance(&self, round_id: RoundId) -> Result<()> {
        self.last_scored.fetch_max(round_id, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryTeamDirectory {
    teams: RwLock<Vec<Team>>,
}

impl MemoryTeamDirectory {
    pub fn new(teams: Vec<Team>) -> Self {
        Self { teams: RwLock::new(teams) }
    }
}

#[async_trait]
impl TeamDirectory for MemoryTeamDirectory {
    async fn teams(&self) -> Result<Vec<Team>> {
        Ok(self.teams.read().expect("team lock poisoned").clone())
    }

    async fn team(&self, team_id: &str) -> Result<Option<Team>> {
        Ok(self
            .teams
            .read()
            .expect("team lock poisoned")
            .iter()
            .find(|t| t.id == team_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn score_store_keeps_versions_and_returns_latest() {
        let store = MemoryScoreStore::new();
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let mut record = ScoreRecord::zero("t1", 3, at);
        store.append(&record).await.unwrap();
        record.total = 42.0;
        store.append(&record).await.unwrap();

        let latest = store.latest("t1", 3).await.unwrap().unwrap();
        assert_eq!(latest.total, 42.0);
        assert_eq!(store.version_count("t1", 3), 2);
        assert!(store.latest("t1", 4).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn checkpoint_never_regresses() {
        let store = MemoryCheckpointStore::new(5);
        store.advance(8).await.unwrap();
        store.advance(6).await.unwrap();
        assert_eq!(store.load().await.unwrap(), 8);
    }

    #[tokio::test]
    async fn default_formation_quotas_sum_to_roster_size() {
        let store = MemoryFormationRules::with_defaults();
        for id in ["F433", "F442", "F352", "F532", "F343"] {
            let rule = store.rule(id).await.unwrap().unwrap();
            assert_eq!(rule.roster_size(), 12, "formation {id}");
        }
        assert!(store.rule("F999").await.unwrap().is_none());
    }
}
