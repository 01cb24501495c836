mod api;
mod cache;
mod calculator;
mod clock;
mod config;
mod draft;
mod error;
mod feed;
mod scheduler;
mod selector;
mod store;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::routes::{router, ApiState};
use crate::cache::KeyedCache;
use crate::calculator::ScoreCalculator;
use crate::clock::RoundClock;
use crate::config::{Config, FIXTURE_CACHE_TTL_SECS, FORMATION_CACHE_TTL_SECS};
use crate::draft::DraftService;
use crate::error::Result;
use crate::feed::{HttpFixtureFeed, HttpScoreFeed};
use crate::scheduler::{InFlightRounds, Scheduler};
use crate::store::memory::MemoryFormationRules;
use crate::store::sqlite::{
    SqliteCheckpointStore, SqliteDraftPickStore, SqliteRosterStore, SqliteScoreStore,
    SqliteTeamDirectory,
};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = store::sqlite::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    let scores = Arc::new(SqliteScoreStore::new(pool.clone()));
    let checkpoint = Arc::new(SqliteCheckpointStore::new(pool.clone()));
    let rosters = Arc::new(SqliteRosterStore::new(pool.clone()));
    let teams = Arc::new(SqliteTeamDirectory::new(pool.clone()));
    let draft_picks = Arc::new(SqliteDraftPickStore::new(pool.clone()));

    // --- External feeds ---
    let fixture_feed = Arc::new(HttpFixtureFeed::new(&cfg.fixture_feed_url)?);
    let score_feed = Arc::new(HttpScoreFeed::new(&cfg.score_feed_url)?);
    info!(
        fixture_feed = %cfg.fixture_feed_url,
        score_feed = %cfg.score_feed_url,
        "Feed adapters ready",
    );

    // --- Engine components ---
    let formations = Arc::new(MemoryFormationRules::with_defaults());
    let clock = Arc::new(RoundClock::new(
        fixture_feed,
        Duration::from_secs(FIXTURE_CACHE_TTL_SECS),
    ));
    let calculator = Arc::new(ScoreCalculator::new(
        rosters,
        score_feed,
        formations,
        teams.clone(),
        KeyedCache::new(Duration::from_secs(FORMATION_CACHE_TTL_SECS)),
    ));
    let health = Arc::new(HealthState::new());
    let in_flight = InFlightRounds::new();

    // --- Scheduler (background, walks newly finished rounds) ---
    let scheduler = Arc::new(Scheduler::new(
        clock.clone(),
        calculator,
        scores.clone(),
        checkpoint,
        teams,
        in_flight,
        health.clone(),
        Duration::from_secs(cfg.tick_interval_secs),
    ));
    tokio::spawn(Arc::clone(&scheduler).run());
    info!(
        interval_secs = cfg.tick_interval_secs,
        league_id = %cfg.league_id,
        "Scheduler started",
    );

    // --- HTTP API server ---
    let api_state = ApiState {
        scheduler,
        scores,
        clock,
        draft: Arc::new(DraftService::new(draft_picks)),
        health,
        league_id: cfg.league_id.clone(),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
