use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TeamId = String;
pub type LeagueId = String;
pub type RoundId = u32;

// ---------------------------------------------------------------------------
// Round lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle phase of a fixture round. Ordered by progression; a round
/// never moves backwards once it reaches `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Not the next round yet; lineups cannot be set.
    Future,
    /// Transfer window open, matches not started.
    Open,
    /// Matches in progress, roster frozen.
    Closed,
    /// Matches over, waiting for the feed to settle final scores.
    Evaluating,
    /// Terminal; scores are final.
    Finished,
}

impl RoundPhase {
    pub fn is_finished(self) -> bool {
        self == RoundPhase::Finished
    }
}

impl std::fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RoundPhase::Future => "future",
            RoundPhase::Open => "open",
            RoundPhase::Closed => "closed",
            RoundPhase::Evaluating => "evaluating",
            RoundPhase::Finished => "finished",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub phase: RoundPhase,
}

/// One entry of the raw fixture feed: dates plus an optional explicit
/// status reported by the upstream. An explicit terminal status always
/// wins over date comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundFixture {
    pub id: RoundId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub status: Option<RoundPhase>,
}

// ---------------------------------------------------------------------------
// Positions & formations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    Gk,
    Cb,
    Fb,
    Mid,
    Fwd,
    Coach,
}

impl Position {
    /// All positions in lineup display order.
    pub const ALL: [Position; 6] = [
        Position::Gk,
        Position::Cb,
        Position::Fb,
        Position::Mid,
        Position::Fwd,
        Position::Coach,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Position::Gk => "GK",
            Position::Cb => "CB",
            Position::Fb => "FB",
            Position::Mid => "MID",
            Position::Fwd => "FWD",
            Position::Coach => "COACH",
        }
    }

    pub fn from_code(code: &str) -> Option<Position> {
        match code.trim().to_uppercase().as_str() {
            "GK" => Some(Position::Gk),
            "CB" => Some(Position::Cb),
            // Side backs come through under several labels depending on the feed.
            "FB" | "LB" | "RB" => Some(Position::Fb),
            "MID" => Some(Position::Mid),
            "FWD" => Some(Position::Fwd),
            "COACH" => Some(Position::Coach),
            _ => None,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Per-position roster quotas for one formation shape. Quotas sum to the
/// roster size, coach slot included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormationRule {
    pub id: String,
    pub gk: u8,
    pub cb: u8,
    pub fb: u8,
    pub mid: u8,
    pub fwd: u8,
    pub coach: u8,
}

impl FormationRule {
    pub fn new(id: &str, gk: u8, cb: u8, fb: u8, mid: u8, fwd: u8, coach: u8) -> Self {
        Self { id: id.to_string(), gk, cb, fb, mid, fwd, coach }
    }

    pub fn quota(&self, pos: Position) -> u8 {
        match pos {
            Position::Gk => self.gk,
            Position::Cb => self.cb,
            Position::Fb => self.fb,
            Position::Mid => self.mid,
            Position::Fwd => self.fwd,
            Position::Coach => self.coach,
        }
    }

    pub fn roster_size(&self) -> u8 {
        self.gk + self.cb + self.fb + self.mid + self.fwd + self.coach
    }
}

// ---------------------------------------------------------------------------
// Score feed entries
// ---------------------------------------------------------------------------

/// One player's raw line from the per-round score feed, keyed by the
/// external scoring id. `scout` is an ordered event→count breakdown so
/// serialized records are reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerScoreEntry {
    pub scoring_id: String,
    pub position: Position,
    pub points: f64,
    #[serde(default)]
    pub scout: BTreeMap<String, u32>,
    pub played: bool,
}

impl PlayerScoreEntry {
    /// Placeholder line for a roster player the feed knows nothing about.
    /// Never eligible for the lineup.
    pub fn absent(scoring_id: &str, position: Position) -> Self {
        Self {
            scoring_id: scoring_id.to_string(),
            position,
            points: 0.0,
            scout: BTreeMap::new(),
            played: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Rosters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterPlayer {
    pub player_id: String,
    /// External id used to join against the score feed.
    pub scoring_id: String,
    pub position: Position,
}

/// Immutable snapshot of a team's roster for one round, captured once
/// when the round's transfer window closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRoundRoster {
    pub team_id: TeamId,
    pub round_id: RoundId,
    /// Missing on snapshots that predate formation tracking.
    pub formation_id: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub players: Vec<RosterPlayer>,
}

// ---------------------------------------------------------------------------
// Score records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerScoreLine {
    pub player_id: String,
    pub points: f64,
    /// Whether this player filled one of the formation's quota slots and
    /// therefore counts toward the round total.
    pub considered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub team_id: TeamId,
    pub round_id: RoundId,
    pub total: f64,
    pub computed_at: DateTime<Utc>,
    pub per_player: Vec<PlayerScoreLine>,
}

impl ScoreRecord {
    /// Record emitted when a team has no roster data at all for a round.
    /// Downstream consumers expect a record to exist once a round finishes,
    /// so missing data yields zero points rather than an error.
    pub fn zero(team_id: &str, round_id: RoundId, computed_at: DateTime<Utc>) -> Self {
        Self {
            team_id: team_id.to_string(),
            round_id,
            total: 0.0,
            computed_at,
            per_player: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPick {
    pub league_id: LeagueId,
    /// 1-based draft round.
    pub round: u32,
    /// 0-based position within the full flattened pick list.
    pub order_index: u32,
    pub team_id: TeamId,
}

/// Current pick pointer for a league's draft: `(round, index)` of the next
/// pick to be made, `index` counting over the flattened list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftCursor {
    pub round: u32,
    pub index: u32,
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    /// Formation currently configured in the team editor. Fallback for
    /// roster snapshots that carry no formation id.
    pub formation_id: String,
}
