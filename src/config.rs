use crate::error::{AppError, Result};

pub const FIXTURE_FEED_URL: &str = "https://api.fantasy-rounds.example/v1";
pub const SCORE_FEED_URL: &str = "https://api.fantasy-scores.example/v1";

/// Scheduler tick interval (seconds), how often the round walk runs.
pub const SCHEDULER_TICK_INTERVAL_SECS: u64 = 300;

/// How long fetched fixture data stays fresh before the clock re-fetches.
pub const FIXTURE_CACHE_TTL_SECS: u64 = 60;

/// Formation rules change roughly never; cache them for a long time.
pub const FORMATION_CACHE_TTL_SECS: u64 = 3600;

/// Feed request timeout (seconds). Timeouts live at the transport layer,
/// not in the scheduler.
pub const FEED_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub fixture_feed_url: String,
    pub score_feed_url: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Scheduler tick interval in seconds (SCHEDULER_TICK_SECS).
    pub tick_interval_secs: u64,
    /// League this engine instance scores (LEAGUE_ID).
    pub league_id: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            fixture_feed_url: std::env::var("FIXTURE_FEED_URL")
                .unwrap_or_else(|_| FIXTURE_FEED_URL.to_string()),
            score_feed_url: std::env::var("SCORE_FEED_URL")
                .unwrap_or_else(|_| SCORE_FEED_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "engine.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            tick_interval_secs: std::env::var("SCHEDULER_TICK_SECS")
                .unwrap_or_else(|_| SCHEDULER_TICK_INTERVAL_SECS.to_string())
                .parse::<u64>()
                .map_err(|_| {
                    AppError::Config("SCHEDULER_TICK_SECS must be a number of seconds".to_string())
                })?,
            league_id: std::env::var("LEAGUE_ID").unwrap_or_else(|_| "default".to_string()),
        })
    }
}
