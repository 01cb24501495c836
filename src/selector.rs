//! Picks the optimal-scoring starting set from a scored candidate pool
//! under a formation's positional quotas.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::{FormationRule, PlayerScoreEntry, Position};

/// One candidate after selection: the raw feed line plus whether it fills
/// a quota slot and counts toward the total.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedEntry {
    pub entry: PlayerScoreEntry,
    pub considered: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineupSelection {
    /// The full candidate list, annotated. Ordered by position, then the
    /// selection sort (points descending, scoring id ascending), with
    /// unplayed candidates trailing their position group.
    pub entries: Vec<SelectedEntry>,
    /// Sum of points over all considered entries, coach slot included.
    pub total: f64,
}

/// Selects the lineup for one formation rule.
///
/// Unplayed candidates are discarded from contention outright; they can
/// never be considered regardless of quota availability. Within each
/// position, played candidates are ranked by points descending with ties
/// broken by scoring id ascending, so identical inputs always produce the
/// identical selection. When a position has fewer played candidates than
/// its quota, all of them are taken.
pub fn select_lineup(pool: Vec<PlayerScoreEntry>, rule: &FormationRule) -> LineupSelection {
    let mut by_position: HashMap<Position, Vec<PlayerScoreEntry>> = HashMap::new();
    for entry in pool {
        by_position.entry(entry.position).or_default().push(entry);
    }

    let mut entries = Vec::new();
    let mut total = 0.0;

    for pos in Position::ALL {
        let Some(mut group) = by_position.remove(&pos) else {
            continue;
        };
        group.sort_by(rank);

        let quota = rule.quota(pos) as usize;
        let mut taken = 0usize;
        for entry in group {
            let considered = entry.played && taken < quota;
            if considered {
                total += entry.points;
                taken += 1;
            }
            entries.push(SelectedEntry { entry, considered });
        }
    }

    LineupSelection { entries, total }
}

/// Played candidates first, then points descending, then scoring id.
fn rank(a: &PlayerScoreEntry, b: &PlayerScoreEntry) -> Ordering {
    b.played
        .cmp(&a.played)
        .then(b.points.partial_cmp(&a.points).unwrap_or(Ordering::Equal))
        .then_with(|| a.scoring_id.cmp(&b.scoring_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, pos: Position, points: f64, played: bool) -> PlayerScoreEntry {
        PlayerScoreEntry {
            scoring_id: id.to_string(),
            position: pos,
            points,
            scout: Default::default(),
            played,
        }
    }

    fn standard_rule() -> FormationRule {
        FormationRule::new("F432", 1, 2, 2, 3, 2, 1)
    }

    fn considered_ids(selection: &LineupSelection) -> Vec<&str> {
        selection
            .entries
            .iter()
            .filter(|e| e.considered)
            .map(|e| e.entry.scoring_id.as_str())
            .collect()
    }

    #[test]
    fn best_goalkeeper_wins_the_single_slot() {
        let pool = vec![
            entry("gk1", Position::Gk, 5.0, true),
            entry("gk2", Position::Gk, 8.0, true),
            entry("gk3", Position::Gk, 2.0, true),
        ];
        let selection = select_lineup(pool, &standard_rule());
        assert_eq!(considered_ids(&selection), vec!["gk2"]);
        assert_eq!(selection.total, 8.0);
        assert_eq!(selection.entries.len(), 3);
    }

    #[test]
    fn zero_played_candidates_leave_position_empty_without_error() {
        let pool = vec![
            entry("m1", Position::Mid, 10.0, false),
            entry("m2", Position::Mid, 4.0, false),
            entry("f1", Position::Fwd, 3.0, true),
        ];
        let selection = select_lineup(pool, &standard_rule());
        assert_eq!(considered_ids(&selection), vec!["f1"]);
        assert_eq!(selection.total, 3.0);
    }

    #[test]
    fn unplayed_candidate_never_considered_even_with_free_quota() {
        // One played MID against a quota of 3; the unplayed one must not
        // backfill the remaining slots.
        let pool = vec![
            entry("m1", Position::Mid, 1.0, true),
            entry("m2", Position::Mid, 99.0, false),
        ];
        let selection = select_lineup(pool, &standard_rule());
        assert_eq!(considered_ids(&selection), vec!["m1"]);
        assert_eq!(selection.total, 1.0);
    }

    #[test]
    fn quota_never_exceeded_per_position() {
        let pool: Vec<PlayerScoreEntry> = (0..10)
            .map(|i| entry(&format!("m{i}"), Position::Mid, i as f64, true))
            .collect();
        let selection = select_lineup(pool, &standard_rule());
        let considered = considered_ids(&selection);
        assert_eq!(considered.len(), 3);
        assert_eq!(considered, vec!["m9", "m8", "m7"]);
    }

    #[test]
    fn short_position_takes_everyone_available() {
        let pool = vec![entry("m1", Position::Mid, 2.5, true)];
        let selection = select_lineup(pool, &standard_rule());
        assert_eq!(considered_ids(&selection), vec!["m1"]);
        assert_eq!(selection.total, 2.5);
    }

    #[test]
    fn ties_break_by_scoring_id_for_reproducibility() {
        let pool = vec![
            entry("z9", Position::Fwd, 6.0, true),
            entry("a1", Position::Fwd, 6.0, true),
            entry("m5", Position::Fwd, 6.0, true),
        ];
        let selection = select_lineup(pool, &standard_rule());
        assert_eq!(considered_ids(&selection), vec!["a1", "m5"]);
    }

    #[test]
    fn coach_slot_follows_the_same_rule() {
        let pool = vec![
            entry("c1", Position::Coach, 4.0, true),
            entry("c2", Position::Coach, 7.0, true),
            entry("f1", Position::Fwd, 1.0, true),
        ];
        let selection = select_lineup(pool, &standard_rule());
        assert_eq!(considered_ids(&selection), vec!["f1", "c2"]);
        assert_eq!(selection.total, 8.0);
    }

    #[test]
    fn negative_scores_still_fill_mandatory_quota() {
        let pool = vec![
            entry("gk1", Position::Gk, -2.0, true),
            entry("gk2", Position::Gk, -5.0, true),
        ];
        let selection = select_lineup(pool, &standard_rule());
        assert_eq!(considered_ids(&selection), vec!["gk1"]);
        assert_eq!(selection.total, -2.0);
    }

    #[test]
    fn total_equals_sum_of_considered_points() {
        let pool = vec![
            entry("gk1", Position::Gk, 3.0, true),
            entry("cb1", Position::Cb, 1.5, true),
            entry("cb2", Position::Cb, 2.5, true),
            entry("cb3", Position::Cb, 9.0, false),
            entry("m1", Position::Mid, -1.0, true),
            entry("c1", Position::Coach, 2.0, true),
        ];
        let selection = select_lineup(pool, &standard_rule());
        let considered_sum: f64 = selection
            .entries
            .iter()
            .filter(|e| e.considered)
            .map(|e| e.entry.points)
            .sum();
        assert_eq!(selection.total, considered_sum);
        assert_eq!(selection.total, 3.0 + 1.5 + 2.5 - 1.0 + 2.0);
    }

    #[test]
    fn empty_pool_selects_nothing() {
        let selection = select_lineup(Vec::new(), &standard_rule());
        assert!(selection.entries.is_empty());
        assert_eq!(selection.total, 0.0);
    }
}
