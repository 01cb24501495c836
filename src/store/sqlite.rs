//! SQLite persistence for the engine's own durable state: teams, roster
//! snapshots, score record versions, the scheduler checkpoint and draft
//! picks. Score records are append-only versions; reads return the
//! latest.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::store::{
    CheckpointStore, DraftPickStore, RosterStore, ScoreStore, TeamDirectory,
};
use crate::types::{
    DraftCursor, DraftPick, PlayerScoreLine, RosterPlayer, RoundId, ScoreRecord, Team,
    TeamRoundRoster,
};

pub async fn connect(db_path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
        .map_err(AppError::Database)?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}

/// In-memory database for tests. A single connection keeps every query on
/// the same memory instance.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(AppError::Database)?;
    let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}

pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = [
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            formation_id TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS roster_snapshots (
            team_id TEXT NOT NULL,
            round_id INTEGER NOT NULL,
            formation_id TEXT,
            captured_at TEXT NOT NULL,
            players TEXT NOT NULL,
            PRIMARY KEY (team_id, round_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS live_rosters (
            team_id TEXT PRIMARY KEY,
            formation_id TEXT,
            captured_at TEXT NOT NULL,
            players TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS score_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id TEXT NOT NULL,
            round_id INTEGER NOT NULL,
            total REAL NOT NULL,
            computed_at TEXT NOT NULL,
            per_player TEXT NOT NULL
        )
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS idx_score_records_key
            ON score_records (team_id, round_id, id)
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS scheduler_checkpoint (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            last_scored_round INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS draft_picks (
            league_id TEXT NOT NULL,
            round INTEGER NOT NULL,
            order_index INTEGER NOT NULL,
            team_id TEXT NOT NULL,
            PRIMARY KEY (league_id, order_index)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS draft_cursors (
            league_id TEXT PRIMARY KEY,
            round INTEGER NOT NULL,
            pick_index INTEGER NOT NULL
        )
        "#,
    ];
    for statement in ddl {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::Config(format!("bad timestamp in store: {e}")))
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct ScoreRow {
    team_id: String,
    round_id: i64,
    total: f64,
    computed_at: String,
    per_player: String,
}

impl ScoreRow {
    fn into_record(self) -> Result<ScoreRecord> {
        let per_player: Vec<PlayerScoreLine> = serde_json::from_str(&self.per_player)?;
        Ok(ScoreRecord {
            team_id: self.team_id,
            round_id: self.round_id as RoundId,
            total: self.total,
            computed_at: parse_timestamp(&self.computed_at)?,
            per_player,
        })
    }
}

pub struct SqliteScoreStore {
    pool: SqlitePool,
}

impl SqliteScoreStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScoreStore for SqliteScoreStore {
    async fn latest(&self, team_id: &str, round_id: RoundId) -> Result<Option<ScoreRecord>> {
        let row: Option<ScoreRow> = sqlx::query_as(
            r#"
            SELECT team_id, round_id, total, computed_at, per_player
            FROM score_records
            WHERE team_id = ? AND round_id = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(team_id)
        .bind(round_id as i64)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ScoreRow::into_record).transpose()
    }

    async fn append(&self, record: &ScoreRecord) -> Result<()> {
        let per_player = serde_json::to_string(&record.per_player)?;
        sqlx::query(
            r#"
            INSERT INTO score_records (team_id, round_id, total, computed_at, per_player)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.team_id)
        .bind(record.round_id as i64)
        .bind(record.total)
        .bind(record.computed_at.to_rfc3339())
        .bind(per_player)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self) -> Result<RoundId> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT last_scored_round FROM scheduler_checkpoint WHERE id = 0")
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.unwrap_or(0) as RoundId)
    }

    async fn advance(&self, round_id: RoundId) -> Result<()> {
        // MAX keeps the checkpoint monotonic even if a stale writer races.
        sqlx::query(
            r#"
            INSERT INTO scheduler_checkpoint (id, last_scored_round)
            VALUES (0, ?)
            ON CONFLICT(id) DO UPDATE SET
                last_scored_round = MAX(last_scored_round, excluded.last_scored_round)
            "#,
        )
        .bind(round_id as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rosters
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct RosterRow {
    team_id: String,
    round_id: i64,
    formation_id: Option<String>,
    captured_at: String,
    players: String,
}

impl RosterRow {
    fn into_roster(self) -> Result<TeamRoundRoster> {
        let players: Vec<RosterPlayer> = serde_json::from_str(&self.players)?;
        Ok(TeamRoundRoster {
            team_id: self.team_id,
            round_id: self.round_id as RoundId,
            formation_id: self.formation_id,
            captured_at: parse_timestamp(&self.captured_at)?,
            players,
        })
    }
}

pub struct SqliteRosterStore {
    pool: SqlitePool,
}

impl SqliteRosterStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Snapshot writes are triggered outside the engine at window close;
    /// this is the write path those triggers use.
    pub async fn insert_snapshot(&self, roster: &TeamRoundRoster) -> Result<()> {
        let players = serde_json::to_string(&roster.players)?;
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO roster_snapshots
                (team_id, round_id, formation_id, captured_at, players)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&roster.team_id)
        .bind(roster.round_id as i64)
        .bind(&roster.formation_id)
        .bind(roster.captured_at.to_rfc3339())
        .bind(players)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_live(&self, roster: &TeamRoundRoster) -> Result<()> {
        let players = serde_json::to_string(&roster.players)?;
        sqlx::query(
            r#"
            INSERT INTO live_rosters (team_id, formation_id, captured_at, players)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(team_id) DO UPDATE SET
                formation_id = excluded.formation_id,
                captured_at = excluded.captured_at,
                players = excluded.players
            "#,
        )
        .bind(&roster.team_id)
        .bind(&roster.formation_id)
        .bind(roster.captured_at.to_rfc3339())
        .bind(players)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RosterStore for SqliteRosterStore {
    async fn roster_for_round(
        &self,
        team_id: &str,
        round_id: RoundId,
    ) -> Result<Option<TeamRoundRoster>> {
        let row: Option<RosterRow> = sqlx::query_as(
            r#"
            SELECT team_id, round_id, formation_id, captured_at, players
            FROM roster_snapshots
            WHERE team_id = ? AND round_id = ?
            "#,
        )
        .bind(team_id)
        .bind(round_id as i64)
        .fetch_optional(&self.pool)
        .await?;
        row.map(RosterRow::into_roster).transpose()
    }

    async fn live_roster(&self, team_id: &str) -> Result<Option<TeamRoundRoster>> {
        let row: Option<RosterRow> = sqlx::query_as(
            r#"
            SELECT team_id, 0 AS round_id, formation_id, captured_at, players
            FROM live_rosters
            WHERE team_id = ?
            "#,
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(RosterRow::into_roster).transpose()
    }
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct TeamRow {
    id: String,
    name: String,
    formation_id: String,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Team { id: row.id, name: row.name, formation_id: row.formation_id }
    }
}

pub struct SqliteTeamDirectory {
    pool: SqlitePool,
}

impl SqliteTeamDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, team: &Team) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO teams (id, name, formation_id)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                formation_id = excluded.formation_id
            "#,
        )
        .bind(&team.id)
        .bind(&team.name)
        .bind(&team.formation_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TeamDirectory for SqliteTeamDirectory {
    async fn teams(&self) -> Result<Vec<Team>> {
        let rows: Vec<TeamRow> =
            sqlx::query_as("SELECT id, name, formation_id FROM teams ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Team::from).collect())
    }

    async fn team(&self, team_id: &str) -> Result<Option<Team>> {
        let row: Option<TeamRow> =
            sqlx::query_as("SELECT id, name, formation_id FROM teams WHERE id = ?")
                .bind(team_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Team::from))
    }
}

// ---------------------------------------------------------------------------
// Draft picks
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct DraftPickRow {
    league_id: String,
    round: i64,
    order_index: i64,
    team_id: String,
}

impl From<DraftPickRow> for DraftPick {
    fn from(row: DraftPickRow) -> Self {
        DraftPick {
            league_id: row.league_id,
            round: row.round as u32,
            order_index: row.order_index as u32,
            team_id: row.team_id,
        }
    }
}

pub struct SqliteDraftPickStore {
    pool: SqlitePool,
}

impl SqliteDraftPickStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DraftPickStore for SqliteDraftPickStore {
    async fn append_picks(&self, picks: &[DraftPick]) -> Result<()> {
        for pick in picks {
            sqlx::query(
                r#"
                INSERT INTO draft_picks (league_id, round, order_index, team_id)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&pick.league_id)
            .bind(pick.round as i64)
            .bind(pick.order_index as i64)
            .bind(&pick.team_id)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn picks(&self, league_id: &str) -> Result<Vec<DraftPick>> {
        let rows: Vec<DraftPickRow> = sqlx::query_as(
            r#"
            SELECT league_id, round, order_index, team_id
            FROM draft_picks
            WHERE league_id = ?
            ORDER BY order_index
            "#,
        )
        .bind(league_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(DraftPick::from).collect())
    }

    async fn cursor(&self, league_id: &str) -> Result<Option<DraftCursor>> {
        let row: Option<(i64, i64)> =
            sqlx::query_as("SELECT round, pick_index FROM draft_cursors WHERE league_id = ?")
                .bind(league_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(round, index)| DraftCursor { round: round as u32, index: index as u32 }))
    }

    async fn set_cursor(&self, league_id: &str, cursor: DraftCursor) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO draft_cursors (league_id, round, pick_index)
            VALUES (?, ?, ?)
            ON CONFLICT(league_id) DO UPDATE SET
                round = excluded.round,
                pick_index = excluded.pick_index
            "#,
        )
        .bind(league_id)
        .bind(cursor.round as i64)
        .bind(cursor.index as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PlayerScoreLine, Position};
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn score_records_version_and_return_latest() {
        let pool = connect_in_memory().await.unwrap();
        let store = SqliteScoreStore::new(pool);

        assert!(store.latest("t1", 3).await.unwrap().is_none());

        let mut record = ScoreRecord {
            team_id: "t1".to_string(),
            round_id: 3,
            total: 10.5,
            computed_at: at(),
            per_player: vec![PlayerScoreLine {
                player_id: "p1".to_string(),
                points: 10.5,
                considered: true,
            }],
        };
        store.append(&record).await.unwrap();
        record.total = 11.0;
        store.append(&record).await.unwrap();

        let latest = store.latest("t1", 3).await.unwrap().unwrap();
        assert_eq!(latest.total, 11.0);
        assert_eq!(latest.computed_at, at());
        assert_eq!(latest.per_player.len(), 1);
        assert!(latest.per_player[0].considered);
    }

    #[tokio::test]
    async fn checkpoint_defaults_to_zero_and_never_regresses() {
        let pool = connect_in_memory().await.unwrap();
        let store = SqliteCheckpointStore::new(pool);

        assert_eq!(store.load().await.unwrap(), 0);
        store.advance(7).await.unwrap();
        store.advance(5).await.unwrap();
        assert_eq!(store.load().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn roster_snapshots_round_trip_and_stay_immutable() {
        let pool = connect_in_memory().await.unwrap();
        let store = SqliteRosterStore::new(pool);

        let roster = TeamRoundRoster {
            team_id: "t1".to_string(),
            round_id: 4,
            formation_id: Some("F433".to_string()),
            captured_at: at(),
            players: vec![RosterPlayer {
                player_id: "p1".to_string(),
                scoring_id: "ext1".to_string(),
                position: Position::Gk,
            }],
        };
        store.insert_snapshot(&roster).await.unwrap();

        // A second write for the same key is ignored; snapshots are
        // captured once and never mutated.
        let mut altered = roster.clone();
        altered.formation_id = Some("F442".to_string());
        store.insert_snapshot(&altered).await.unwrap();

        let loaded = store.roster_for_round("t1", 4).await.unwrap().unwrap();
        assert_eq!(loaded.formation_id.as_deref(), Some("F433"));
        assert_eq!(loaded.players, roster.players);
        assert!(store.roster_for_round("t1", 5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn live_roster_upserts() {
        let pool = connect_in_memory().await.unwrap();
        let store = SqliteRosterStore::new(pool);

        let mut roster = TeamRoundRoster {
            team_id: "t1".to_string(),
            round_id: 0,
            formation_id: None,
            captured_at: at(),
            players: Vec::new(),
        };
        store.upsert_live(&roster).await.unwrap();
        roster.formation_id = Some("F352".to_string());
        store.upsert_live(&roster).await.unwrap();

        let loaded = store.live_roster("t1").await.unwrap().unwrap();
        assert_eq!(loaded.formation_id.as_deref(), Some("F352"));
    }

    #[tokio::test]
    async fn team_directory_lists_in_id_order() {
        let pool = connect_in_memory().await.unwrap();
        let store = SqliteTeamDirectory::new(pool);

        for (id, name) in [("b", "Bravo"), ("a", "Alpha")] {
            store
                .upsert(&Team {
                    id: id.to_string(),
                    name: name.to_string(),
                    formation_id: "F442".to_string(),
                })
                .await
                .unwrap();
        }
        let teams = store.teams().await.unwrap();
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].id, "a");
        assert_eq!(store.team("b").await.unwrap().unwrap().name, "Bravo");
    }

    #[tokio::test]
    async fn draft_picks_and_cursor_round_trip() {
        let pool = connect_in_memory().await.unwrap();
        let store = SqliteDraftPickStore::new(pool);

        let picks = vec![
            DraftPick {
                league_id: "lg".to_string(),
                round: 1,
                order_index: 0,
                team_id: "t1".to_string(),
            },
            DraftPick {
                league_id: "lg".to_string(),
                round: 1,
                order_index: 1,
                team_id: "t2".to_string(),
            },
        ];
        store.append_picks(&picks).await.unwrap();

        assert_eq!(store.picks("lg").await.unwrap(), picks);
        assert!(store.cursor("lg").await.unwrap().is_none());

        store.set_cursor("lg", DraftCursor { round: 1, index: 1 }).await.unwrap();
        assert_eq!(
            store.cursor("lg").await.unwrap(),
            Some(DraftCursor { round: 1, index: 1 })
        );
    }
}
