use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::KeyedCache;
use crate::error::{AppError, Result};
use crate::store::FixtureFeed;
use crate::types::{Round, RoundFixture, RoundId, RoundPhase};

/// Resolves the current round and its lifecycle phase from external
/// fixture data. Fixture fetches are cached behind an injected TTL cache;
/// `invalidate` forces the next read to hit the feed.
pub struct RoundClock {
    feed: Arc<dyn FixtureFeed>,
    cache: KeyedCache<(), Vec<RoundFixture>>,
}

impl RoundClock {
    pub fn new(feed: Arc<dyn FixtureFeed>, cache_ttl: Duration) -> Self {
        Self { feed, cache: KeyedCache::new(cache_ttl) }
    }

    pub fn invalidate(&self) {
        self.cache.invalidate(&());
    }

    pub async fn current_round(&self) -> Result<Round> {
        self.current_round_at(Utc::now()).await
    }

    /// The earliest round that is not yet finished; when every round is
    /// finished (end of season) the last one is returned.
    pub async fn current_round_at(&self, now: DateTime<Utc>) -> Result<Round> {
        let fixtures = self.fixtures().await?;
        current_from(&fixtures, now)
    }

    pub async fn is_finished(&self, round_id: RoundId) -> Result<bool> {
        self.is_finished_at(round_id, Utc::now()).await
    }

    /// True when the round's phase is finished, or when the round lies
    /// strictly before the current one. Rounds are sequential, so any
    /// earlier round is assumed finished even if clock data is incomplete.
    pub async fn is_finished_at(&self, round_id: RoundId, now: DateTime<Utc>) -> Result<bool> {
        let fixtures = self.fixtures().await?;
        let current = current_from(&fixtures, now)?;
        if round_id < current.id {
            return Ok(true);
        }
        Ok(fixtures
            .iter()
            .find(|f| f.id == round_id)
            .map(|f| derive_phase(f, now).is_finished())
            .unwrap_or(false))
    }

    async fn fixtures(&self) -> Result<Vec<RoundFixture>> {
        if let Some(cached) = self.cache.get(&()) {
            return Ok(cached);
        }
        let mut fixtures = self.feed.fetch_rounds().await?;
        fixtures.sort_by_key(|f| f.id);
        self.cache.set((), fixtures.clone());
        Ok(fixtures)
    }
}

fn current_from(fixtures: &[RoundFixture], now: DateTime<Utc>) -> Result<Round> {
    if fixtures.is_empty() {
        return Err(AppError::MissingData("fixture feed returned no rounds".to_string()));
    }
    let idx = fixtures
        .iter()
        .position(|f| !derive_phase(f, now).is_finished())
        .unwrap_or(fixtures.len() - 1);
    let fx = &fixtures[idx];
    Ok(Round {
        id: fx.id,
        starts_at: fx.starts_at,
        ends_at: fx.ends_at,
        phase: derive_phase(fx, now),
    })
}

/// An explicit status from the feed wins over date comparison. Without
/// one, a round is open before its start, closed while matches run, and
/// evaluating after its end until the feed settles it as finished.
fn derive_phase(fx: &RoundFixture, now: DateTime<Utc>) -> RoundPhase {
    if let Some(status) = fx.status {
        return status;
    }
    if now < fx.starts_at {
        RoundPhase::Open
    } else if now <= fx.ends_at {
        RoundPhase::Closed
    } else {
        RoundPhase::Evaluating
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryFixtureFeed;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, day, hour, 0, 0).unwrap()
    }

    fn fixture(id: RoundId, start_day: u32, end_day: u32, status: Option<RoundPhase>) -> RoundFixture {
        RoundFixture { id, starts_at: at(start_day, 12), ends_at: at(end_day, 22), status }
    }

    fn clock(fixtures: Vec<RoundFixture>) -> RoundClock {
        RoundClock::new(
            Arc::new(MemoryFixtureFeed::new(fixtures)),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn phase_derived_from_dates() {
        let clock = clock(vec![fixture(1, 10, 12, None)]);

        let before = clock.current_round_at(at(9, 0)).await.unwrap();
        assert_eq!(before.phase, RoundPhase::Open);

        let during = clock.current_round_at(at(11, 0)).await.unwrap();
        assert_eq!(during.phase, RoundPhase::Closed);

        let after = clock.current_round_at(at(13, 0)).await.unwrap();
        assert_eq!(after.phase, RoundPhase::Evaluating);
    }

    #[tokio::test]
    async fn explicit_status_wins_over_dates() {
        // Dates say matches are still running; the feed already settled it.
        let finished = fixture(1, 10, 12, Some(RoundPhase::Finished));
        let clock = clock(vec![finished, fixture(2, 14, 16, None)]);

        let current = clock.current_round_at(at(11, 0)).await.unwrap();
        assert_eq!(current.id, 2);
        assert!(clock.is_finished_at(1, at(11, 0)).await.unwrap());
    }

    #[tokio::test]
    async fn evaluating_round_is_not_finished() {
        let clock = clock(vec![fixture(1, 10, 12, None)]);
        assert!(!clock.is_finished_at(1, at(13, 0)).await.unwrap());
    }

    #[tokio::test]
    async fn rounds_before_current_are_assumed_finished() {
        // Round 3 has no fixture entry at all; the feed starts at round 4.
        let clock = clock(vec![fixture(4, 10, 12, None), fixture(5, 14, 16, None)]);
        assert!(clock.is_finished_at(3, at(9, 0)).await.unwrap());
        assert!(!clock.is_finished_at(4, at(9, 0)).await.unwrap());
        assert!(!clock.is_finished_at(5, at(9, 0)).await.unwrap());
    }

    #[tokio::test]
    async fn season_end_returns_last_round() {
        let clock = clock(vec![
            fixture(1, 1, 2, Some(RoundPhase::Finished)),
            fixture(2, 3, 4, Some(RoundPhase::Finished)),
        ]);
        let current = clock.current_round_at(at(20, 0)).await.unwrap();
        assert_eq!(current.id, 2);
        assert_eq!(current.phase, RoundPhase::Finished);
        assert!(clock.is_finished_at(2, at(20, 0)).await.unwrap());
    }

    #[tokio::test]
    async fn empty_feed_is_missing_data() {
        let clock = clock(Vec::new());
        let err = clock.current_round_at(at(1, 0)).await.unwrap_err();
        assert!(matches!(err, AppError::MissingData(_)));
    }
}
