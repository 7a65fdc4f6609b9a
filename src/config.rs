// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Session lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    /// Adds the `Secure` attribute to session and CSRF cookies.
    pub cookie_secure: bool,
    pub cors_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: usize,
    /// Upper bound on the number of tracked (ip, path) keys.
    pub capacity: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 60,
            capacity: 10_000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = parse_var("JWT_EXPIRATION", 86_400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            window: Duration::from_secs(parse_var(
                "RATE_LIMIT_WINDOW_SECS",
                defaults.window.as_secs(),
            )),
            max_requests: parse_var("RATE_LIMIT_MAX_REQUESTS", defaults.max_requests),
            capacity: parse_var("RATE_LIMIT_CAPACITY", defaults.capacity),
        };

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            cookie_secure: parse_var("COOKIE_SECURE", false),
            cors_origins,
            rate_limit,
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable {}={:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}
