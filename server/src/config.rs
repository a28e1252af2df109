// HTTP server settings, read from the environment at startup

use std::time::Duration;

use tracing::warn;

/// Headroom on top of two engine attempts, for conditioning and publish
pub const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 60;

#[derive(Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
}

/// Smallest request timeout that still lets a primary and a fallback engine
/// attempt both time out and report `SynthesisFailed` to the caller.
pub fn min_request_timeout_secs(engine_timeout_secs: u64) -> u64 {
    engine_timeout_secs
        .saturating_mul(2)
        .saturating_add(REQUEST_TIMEOUT_MARGIN_SECS)
}

/// Use `requested` when it covers both engine attempts, otherwise the minimum.
pub fn resolve_request_timeout(requested: Option<u64>, engine_timeout_secs: u64) -> u64 {
    let min = min_request_timeout_secs(engine_timeout_secs);
    match requested {
        Some(secs) if secs >= min => secs,
        Some(secs) => {
            warn!(
                "REQUEST_TIMEOUT_SECS={} does not cover two engine attempts of {}s; using {}s",
                secs, engine_timeout_secs, min
            );
            min
        }
        None => min,
    }
}

impl ServerConfig {
    pub fn from_env(engine_timeout_secs: u64) -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9003);

        let rate_limit_per_minute = std::env::var("RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let requested = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok());
        let request_timeout_secs = resolve_request_timeout(requested, engine_timeout_secs);

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });

        Self {
            port,
            rate_limit_per_minute,
            request_timeout_secs,
            cors_allowed_origins,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
