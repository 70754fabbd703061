//! Environment-driven runtime configuration.

use std::{env, time::Duration};

use tracing::info;

/// Time-to-live applied to every room-scoped store key, refreshed on write.
const DEFAULT_ROOM_TTL_SECS: u64 = 6 * 60 * 60;
/// How long an event stream may stay silent before the bus retires it.
const DEFAULT_STREAM_IDLE_SECS: u64 = 60 * 60;
/// Default quiz round length when the host does not override it.
const DEFAULT_QUIZ_ROUND_SECS: u64 = 120;
/// Bounded capacity of each per-client event channel; a full channel marks
/// the client as too slow and the stream is dropped.
const DEFAULT_BUS_CAPACITY: usize = 64;

/// Immutable runtime configuration shared across the application.
///
/// None of these values influence protocol semantics; they only tune
/// lifetimes and defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub room_ttl: Duration,
    pub stream_idle_timeout: Duration,
    pub quiz_round_secs: u64,
    pub bus_capacity: usize,
}

impl AppConfig {
    /// Load the configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let config = Self {
            port: env_parse("PORT").unwrap_or(8080),
            room_ttl: Duration::from_secs(
                env_parse("POCHA_ROOM_TTL_SECS").unwrap_or(DEFAULT_ROOM_TTL_SECS),
            ),
            stream_idle_timeout: Duration::from_secs(
                env_parse("POCHA_STREAM_IDLE_SECS").unwrap_or(DEFAULT_STREAM_IDLE_SECS),
            ),
            quiz_round_secs: env_parse("POCHA_QUIZ_ROUND_SECS").unwrap_or(DEFAULT_QUIZ_ROUND_SECS),
            bus_capacity: env_parse("POCHA_BUS_CAPACITY").unwrap_or(DEFAULT_BUS_CAPACITY),
        };
        info!(
            port = config.port,
            room_ttl_secs = config.room_ttl.as_secs(),
            stream_idle_secs = config.stream_idle_timeout.as_secs(),
            "loaded configuration"
        );
        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            room_ttl: Duration::from_secs(DEFAULT_ROOM_TTL_SECS),
            stream_idle_timeout: Duration::from_secs(DEFAULT_STREAM_IDLE_SECS),
            quiz_round_secs: DEFAULT_QUIZ_ROUND_SECS,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.parse().ok())
}
