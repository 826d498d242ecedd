use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

// Top-level settings container
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub reservation: ReservationConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub acquire_timeout_secs: u64,
    /// Row lock wait limit applied to every transaction; 0 waits forever.
    pub lock_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Without a URL, reservation events stay in-process.
    pub url: Option<String>,
    pub channel: String,
}

#[derive(Debug, Clone)]
pub struct ReservationConfig {
    /// How long an unpaid reservation holds its seat.
    pub hold_seconds: u64,
}

impl ReservationConfig {
    pub fn hold(&self) -> Duration {
        Duration::from_secs(self.hold_seconds)
    }
}

fn var_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            app: AppConfig {
                host: var_or("HOST", "0.0.0.0"),
                port: parsed_or("PORT", 8000)?,
                environment: var_or("ENVIRONMENT", "development"),
                rust_log: var_or("RUST_LOG", "concert_ticketing=debug,tower_http=debug"),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
                pool_size: parsed_or("DB_POOL_SIZE", 20)?,
                acquire_timeout_secs: parsed_or("DB_ACQUIRE_TIMEOUT_SECONDS", 5)?,
                lock_timeout_ms: parsed_or("DB_LOCK_TIMEOUT_MS", 5000)?,
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
                channel: var_or("RESERVATION_EVENT_CHANNEL", "reservation-topic"),
            },
            reservation: ReservationConfig {
                hold_seconds: parsed_or("RESERVATION_HOLD_SECONDS", 600)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_or_falls_back_and_rejects_garbage() {
        env::remove_var("TICKETING_TEST_UNSET");
        assert_eq!(parsed_or("TICKETING_TEST_UNSET", 42u64).unwrap(), 42);

        env::set_var("TICKETING_TEST_GARBAGE", "forty-two");
        let err = parsed_or::<u64>("TICKETING_TEST_GARBAGE", 1).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "TICKETING_TEST_GARBAGE", .. }));
    }

    #[test]
    fn hold_is_in_seconds() {
        let cfg = ReservationConfig { hold_seconds: 600 };
        assert_eq!(cfg.hold(), Duration::from_secs(600));
    }
}
