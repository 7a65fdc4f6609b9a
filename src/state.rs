use std::sync::Arc;

use crate::config::Config;
use crate::utils::rate_limit::RateLimiter;
use axum::extract::FromRef;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self {
            pool,
            config,
            limiter,
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<RateLimiter> {
    fn from_ref(state: &AppState) -> Self {
        state.limiter.clone()
    }
}
