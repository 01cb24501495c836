//! HTTP adapters for the two read-only external feeds: the fixture/round
//! feed and the per-round player score feed. The score feed serves
//! header-plus-rows ranges out of the backing sheet store; the header is
//! mapped to typed columns up front and missing required columns fail
//! loudly instead of defaulting.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::FEED_TIMEOUT_SECS;
use crate::error::{AppError, Result};
use crate::store::{FixtureFeed, PlayerScoreFeed};
use crate::types::{PlayerScoreEntry, Position, RoundFixture, RoundId};

// ---------------------------------------------------------------------------
// Fixture feed
// ---------------------------------------------------------------------------

pub struct HttpFixtureFeed {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFixtureFeed {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FEED_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl FixtureFeed for HttpFixtureFeed {
    async fn fetch_rounds(&self) -> Result<Vec<RoundFixture>> {
        let url = format!("{}/rounds", self.base_url);
        let resp = self.client.get(&url).send().await?;
        check_auth(&resp)?;
        let fixtures: Vec<RoundFixture> = resp.error_for_status()?.json().await?;
        debug!(count = fixtures.len(), "Fetched fixture rounds");
        Ok(fixtures)
    }
}

// ---------------------------------------------------------------------------
// Player score feed
// ---------------------------------------------------------------------------

/// Raw range shape served by the score backend: one header row naming the
/// columns, then one row of cells per player.
#[derive(Debug, Deserialize)]
pub struct ScoreRange {
    pub header: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Typed mapping from required column names to row indexes, resolved once
/// per fetched range. A missing required column is a configuration error,
/// never a silent default.
#[derive(Debug, PartialEq, Eq)]
pub struct ColumnMap {
    scoring_id: usize,
    position: usize,
    points: usize,
    played: usize,
    scout: Option<usize>,
}

impl ColumnMap {
    pub fn from_header(header: &[String]) -> Result<Self> {
        let find = |name: &str| header.iter().position(|h| h.eq_ignore_ascii_case(name));
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                AppError::Config(format!("score feed header is missing required column {name}"))
            })
        };
        Ok(Self {
            scoring_id: require("scoring_id")?,
            position: require("position")?,
            points: require("points")?,
            played: require("played")?,
            scout: find("scout"),
        })
    }

    /// Parses one row into a feed entry. Rows with an unknown position
    /// label are rejected; the caller decides whether to skip or fail.
    pub fn parse_row(&self, row: &[serde_json::Value]) -> Result<PlayerScoreEntry> {
        let scoring_id = cell_str(row, self.scoring_id)
            .ok_or_else(|| AppError::Feed("score row has no scoring id".to_string()))?;
        let position_code = cell_str(row, self.position)
            .ok_or_else(|| AppError::Feed(format!("score row {scoring_id} has no position")))?;
        let position = Position::from_code(&position_code).ok_or_else(|| {
            AppError::Feed(format!("unknown position label {position_code} for {scoring_id}"))
        })?;
        let points = cell_f64(row, self.points).unwrap_or(0.0);
        let played = cell_bool(row, self.played);
        let scout = self.scout.and_then(|idx| row.get(idx)).map(parse_scout).unwrap_or_default();

        Ok(PlayerScoreEntry { scoring_id, position, points, scout, played })
    }
}

pub struct HttpScoreFeed {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScoreFeed {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FEED_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl PlayerScoreFeed for HttpScoreFeed {
    async fn fetch_scores(&self, round_id: RoundId) -> Result<HashMap<String, PlayerScoreEntry>> {
        let url = format!("{}/rounds/{round_id}/scores", self.base_url);
        let resp = self.client.get(&url).send().await?;
        check_auth(&resp)?;
        let range: ScoreRange = resp.error_for_status()?.json().await?;
        parse_score_range(&range)
    }
}

/// Maps the header, then parses every row. Individual malformed rows are
/// logged and skipped so one bad cell cannot sink a whole round.
pub fn parse_score_range(range: &ScoreRange) -> Result<HashMap<String, PlayerScoreEntry>> {
    let map = ColumnMap::from_header(&range.header)?;
    let mut entries = HashMap::with_capacity(range.rows.len());
    for row in &range.rows {
        match map.parse_row(row) {
            Ok(entry) => {
                entries.insert(entry.scoring_id.clone(), entry);
            }
            Err(e) => warn!("Skipping malformed score row: {e}"),
        }
    }
    Ok(entries)
}

fn check_auth(resp: &reqwest::Response) -> Result<()> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(AppError::NotAuthenticated(format!("feed rejected request with {status}")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Cell accessors — the backing sheet serves numbers and booleans as
// strings often enough that every accessor tolerates both shapes.
// ---------------------------------------------------------------------------

fn cell_str(row: &[serde_json::Value], idx: usize) -> Option<String> {
    let v = row.get(idx)?;
    match v {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn cell_f64(row: &[serde_json::Value], idx: usize) -> Option<f64> {
    let v = row.get(idx)?;
    match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

fn cell_bool(row: &[serde_json::Value], idx: usize) -> bool {
    match row.get(idx) {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0) != 0.0,
        Some(serde_json::Value::String(s)) => {
            matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes")
        }
        _ => false,
    }
}

/// Scout breakdowns arrive either as a JSON object (`{"G":1,"A":2}`) or
/// as the sheet's compact string form (`"G:1,A:2"`).
fn parse_scout(cell: &serde_json::Value) -> BTreeMap<String, u32> {
    match cell {
        serde_json::Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| v.as_u64().map(|n| (k.clone(), n as u32)))
            .collect(),
        serde_json::Value::String(s) => s
            .split(',')
            .filter_map(|pair| {
                let (event, count) = pair.split_once(':')?;
                Some((event.trim().to_string(), count.trim().parse().ok()?))
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}
