use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::cache::KeyedCache;
use crate::error::{AppError, Result};
use crate::selector::select_lineup;
use crate::store::{FormationRuleStore, PlayerScoreFeed, RosterStore, TeamDirectory};
use crate::types::{
    FormationRule, PlayerScoreEntry, PlayerScoreLine, RoundId, ScoreRecord, TeamRoundRoster,
};

/// Computes one team's score for one round: resolves the roster snapshot,
/// joins it against the round's score feed, runs the lineup selection and
/// emits the record. Pure given identical inputs: the caller supplies
/// `computed_at`, and idempotency checks are the caller's job.
pub struct ScoreCalculator {
    rosters: Arc<dyn RosterStore>,
    feed: Arc<dyn PlayerScoreFeed>,
    formations: Arc<dyn FormationRuleStore>,
    teams: Arc<dyn TeamDirectory>,
    formation_cache: KeyedCache<String, FormationRule>,
}

impl ScoreCalculator {
    pub fn new(
        rosters: Arc<dyn RosterStore>,
        feed: Arc<dyn PlayerScoreFeed>,
        formations: Arc<dyn FormationRuleStore>,
        teams: Arc<dyn TeamDirectory>,
        formation_cache: KeyedCache<String, FormationRule>,
    ) -> Self {
        Self { rosters, feed, formations, teams, formation_cache }
    }

    pub async fn compute(
        &self,
        team_id: &str,
        round_id: RoundId,
        computed_at: DateTime<Utc>,
    ) -> Result<ScoreRecord> {
        let Some(roster) = self.resolve_roster(team_id, round_id).await? else {
            warn!(team_id, round_id, "no roster snapshot or live roster, emitting zero record");
            return Ok(ScoreRecord::zero(team_id, round_id, computed_at));
        };

        let Some(formation_id) = self.resolve_formation_id(team_id, &roster).await? else {
            warn!(team_id, round_id, "no formation resolvable, emitting zero record");
            return Ok(ScoreRecord::zero(team_id, round_id, computed_at));
        };
        let rule = self.formation_rule(&formation_id).await?;

        let feed_entries = self.feed.fetch_scores(round_id).await?;

        // Join roster players to feed lines by external scoring id. The
        // roster's position governs which slot a player competes for;
        // players the feed never mentions can never enter the lineup.
        let mut pool = Vec::with_capacity(roster.players.len());
        let mut player_ids = std::collections::HashMap::new();
        for player in &roster.players {
            player_ids.insert(player.scoring_id.clone(), player.player_id.clone());
            let entry = match feed_entries.get(&player.scoring_id) {
                Some(line) => PlayerScoreEntry {
                    scoring_id: player.scoring_id.clone(),
                    position: player.position,
                    points: line.points,
                    scout: line.scout.clone(),
                    played: line.played,
                },
                None => PlayerScoreEntry::absent(&player.scoring_id, player.position),
            };
            pool.push(entry);
        }

        let selection = select_lineup(pool, &rule);

        let per_player = selection
            .entries
            .iter()
            .map(|selected| PlayerScoreLine {
                player_id: player_ids
                    .get(&selected.entry.scoring_id)
                    .cloned()
                    .unwrap_or_else(|| selected.entry.scoring_id.clone()),
                points: selected.entry.points,
                considered: selected.considered,
            })
            .collect();

        Ok(ScoreRecord {
            team_id: team_id.to_string(),
            round_id,
            total: selection.total,
            computed_at,
            per_player,
        })
    }

    /// Snapshot for the round, falling back to the live roster for teams
    /// that never had a round closed for them.
    async fn resolve_roster(
        &self,
        team_id: &str,
        round_id: RoundId,
    ) -> Result<Option<TeamRoundRoster>> {
        if let Some(snapshot) = self.rosters.roster_for_round(team_id, round_id).await? {
            return Ok(Some(snapshot));
        }
        self.rosters.live_roster(team_id).await
    }

    /// Snapshot metadata first; snapshots that predate formation tracking
    /// fall back to the team's currently configured formation.
    async fn resolve_formation_id(
        &self,
        team_id: &str,
        roster: &TeamRoundRoster,
    ) -> Result<Option<String>> {
        if let Some(id) = &roster.formation_id {
            return Ok(Some(id.clone()));
        }
        Ok(self.teams.team(team_id).await?.map(|t| t.formation_id))
    }

    async fn formation_rule(&self, formation_id: &str) -> Result<FormationRule> {
        if let Some(rule) = self.formation_cache.get(&formation_id.to_string()) {
            return Ok(rule);
        }
        let rule = self
            .formations
            .rule(formation_id)
            .await?
            .ok_or_else(|| AppError::Config(format!("unknown formation id {formation_id}")))?;
        self.formation_cache.set(formation_id.to_string(), rule.clone());
        Ok(rule)
    }
}
