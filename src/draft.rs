//! Snake-draft order generation and the pick pointer used to seed
//! rosters. One uniformly random base permutation; every even round runs
//! it in reverse so no team is structurally favored across rounds.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::error::{AppError, Result};
use crate::store::DraftPickStore;
use crate::types::{DraftCursor, DraftPick, TeamId};

/// Generates the full flattened pick list for a league: `teams × rounds`
/// picks, round r reversing the base order when r is even.
///
/// The shuffle is non-deterministic by default; passing a seed pins the
/// permutation so callers can reproduce an exact order.
pub fn generate_order(
    league_id: &str,
    team_ids: &[TeamId],
    rounds: u32,
    seed: Option<u64>,
) -> Vec<DraftPick> {
    let mut base: Vec<TeamId> = team_ids.to_vec();
    match seed {
        Some(seed) => base.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => base.shuffle(&mut rand::thread_rng()),
    }

    let mut picks = Vec::with_capacity(base.len() * rounds as usize);
    let mut order_index = 0u32;
    for round in 1..=rounds {
        let forward = round % 2 == 1;
        let round_order: Vec<&TeamId> = if forward {
            base.iter().collect()
        } else {
            base.iter().rev().collect()
        };
        for team_id in round_order {
            picks.push(DraftPick {
                league_id: league_id.to_string(),
                round,
                order_index,
                team_id: team_id.clone(),
            });
            order_index += 1;
        }
    }
    picks
}

/// Persists draft orders and advances the league's pick pointer. Turn
/// advance is a single monotonically increasing index over the flattened
/// list; once it passes the end no further picks are valid.
pub struct DraftService {
    store: Arc<dyn DraftPickStore>,
}

impl DraftService {
    pub fn new(store: Arc<dyn DraftPickStore>) -> Self {
        Self { store }
    }

    /// Generates and persists a league's pick list. The pick rows are
    /// append-only, so a league can only be seeded once.
    pub async fn start_draft(
        &self,
        league_id: &str,
        team_ids: &[TeamId],
        rounds: u32,
        seed: Option<u64>,
    ) -> Result<Vec<DraftPick>> {
        if !self.store.picks(league_id).await?.is_empty() {
            return Err(AppError::Config(format!("draft already seeded for league {league_id}")));
        }
        let picks = generate_order(league_id, team_ids, rounds, seed);
        self.store.append_picks(&picks).await?;
        let initial = DraftCursor { round: 1, index: 0 };
        self.store.set_cursor(league_id, initial).await?;
        info!(league_id, picks = picks.len(), rounds, "Draft order seeded");
        Ok(picks)
    }

    /// The pick the league is currently waiting on, if the draft is still
    /// running.
    pub async fn current_pick(&self, league_id: &str) -> Result<Option<DraftPick>> {
        let picks = self.store.picks(league_id).await?;
        if picks.is_empty() {
            return Err(AppError::MissingData(format!("no draft seeded for league {league_id}")));
        }
        let cursor = self
            .store
            .cursor(league_id)
            .await?
            .unwrap_or(DraftCursor { round: 1, index: 0 });
        Ok(picks.get(cursor.index as usize).cloned())
    }

    /// Consumes the current pick and moves the pointer forward. Returns
    /// the consumed pick, or `None` once the draft is complete.
    pub async fn advance_pick(&self, league_id: &str) -> Result<Option<DraftPick>> {
        let picks = self.store.picks(league_id).await?;
        if picks.is_empty() {
            return Err(AppError::MissingData(format!("no draft seeded for league {league_id}")));
        }
        let cursor = self
            .store
            .cursor(league_id)
            .await?
            .unwrap_or(DraftCursor { round: 1, index: 0 });

        let Some(pick) = picks.get(cursor.index as usize).cloned() else {
            return Ok(None);
        };

        let next_index = cursor.index + 1;
        let next_round = picks
            .get(next_index as usize)
            .map(|p| p.round)
            .unwrap_or(pick.round);
        self.store
            .set_cursor(league_id, DraftCursor { round: next_round, index: next_index })
            .await?;
        Ok(Some(pick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryDraftPickStore;
    use std::collections::HashSet;

    fn teams(n: usize) -> Vec<TeamId> {
        (1..=n).map(|i| format!("team{i}")).collect()
    }

    fn round_order(picks: &[DraftPick], round: u32) -> Vec<&str> {
        picks
            .iter()
            .filter(|p| p.round == round)
            .map(|p| p.team_id.as_str())
            .collect()
    }

    #[test]
    fn pick_list_has_teams_times_rounds_entries() {
        let picks = generate_order("lg", &teams(6), 5, None);
        assert_eq!(picks.len(), 30);
        let indexes: Vec<u32> = picks.iter().map(|p| p.order_index).collect();
        assert_eq!(indexes, (0..30).collect::<Vec<u32>>());
    }

    #[test]
    fn every_round_contains_each_team_exactly_once() {
        let picks = generate_order("lg", &teams(6), 4, None);
        for round in 1..=4 {
            let order = round_order(&picks, round);
            let unique: HashSet<&&str> = order.iter().collect();
            assert_eq!(order.len(), 6);
            assert_eq!(unique.len(), 6, "duplicate team in round {round}");
        }
    }

    #[test]
    fn even_rounds_reverse_the_preceding_odd_round() {
        let picks = generate_order("lg", &teams(5), 6, Some(99));
        for even in [2u32, 4, 6] {
            let mut previous = round_order(&picks, even - 1);
            previous.reverse();
            assert_eq!(round_order(&picks, even), previous, "round {even}");
        }
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let a = generate_order("lg", &teams(8), 3, Some(42));
        let b = generate_order("lg", &teams(8), 3, Some(42));
        assert_eq!(a, b);
    }

    #[test]
    fn unseeded_generation_is_still_a_valid_permutation() {
        let picks = generate_order("lg", &teams(10), 1, None);
        let order = round_order(&picks, 1);
        let unique: HashSet<&&str> = order.iter().collect();
        assert_eq!(unique.len(), 10);
    }

    #[tokio::test]
    async fn draft_runs_to_completion_through_the_pointer() {
        let service = DraftService::new(Arc::new(MemoryDraftPickStore::new()));
        service.start_draft("lg", &teams(3), 2, Some(7)).await.unwrap();

        let mut consumed = Vec::new();
        while let Some(pick) = service.advance_pick("lg").await.unwrap() {
            consumed.push(pick);
        }
        assert_eq!(consumed.len(), 6);
        assert!(service.current_pick("lg").await.unwrap().is_none());
        // Pointer stays exhausted.
        assert!(service.advance_pick("lg").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn league_cannot_be_seeded_twice() {
        let service = DraftService::new(Arc::new(MemoryDraftPickStore::new()));
        service.start_draft("lg", &teams(3), 2, None).await.unwrap();
        let err = service.start_draft("lg", &teams(3), 2, None).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn unseeded_league_reports_missing_data() {
        let service = DraftService::new(Arc::new(MemoryDraftPickStore::new()));
        let err = service.current_pick("lg").await.unwrap_err();
        assert!(matches!(err, AppError::MissingData(_)));
    }
}
