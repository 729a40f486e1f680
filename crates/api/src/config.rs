use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use vidgit_events::Backoff;
use vidgit_pipeline::QueueConfig;

/// Base delay of the consumer retry backoff.
const CONSUMER_BASE_DELAY: Duration = Duration::from_secs(1);

/// Consumer group name used on the event streams.
const DEFAULT_STREAM_GROUP: &str = "vidgit-api";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("DATABASE_URL must be set when STORAGE_BACKEND=postgres")]
    MissingDatabaseUrl,
}

/// Where timelines, history and commits live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(()),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
        })
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for draining queues and consumers on shutdown.
    pub shutdown_timeout_secs: u64,
    pub database_url: Option<String>,
    pub storage_backend: StorageBackend,
    /// Redis cache; `None` uses an in-process cache.
    pub redis_url: Option<String>,
    /// Cache entry lifetime; `0` keeps entries until evicted.
    pub cache_ttl_secs: u64,
    /// Entries held by the in-process cache before LRU eviction.
    pub cache_capacity: usize,
    /// Videos whose changes may be applied at the same time.
    pub change_queue_workers: usize,
    /// How long a change request waits for its turn. Always below
    /// `request_timeout_secs` so the caller sees `TIMEOUT` rather than 408.
    pub change_wait_timeout_secs: u64,
    /// Retries before a failing bus message is dead-lettered.
    pub consumer_max_retries: u32,
    /// Redis server carrying the event streams; `None` keeps the bus
    /// in-process.
    pub event_stream_url: Option<String>,
    pub event_stream_group: String,
    /// Consumer name within the group; unique per instance.
    pub event_stream_consumer: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            cors_origins: vec!["http://localhost:5173".into()],
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
            database_url: None,
            storage_backend: StorageBackend::Memory,
            redis_url: None,
            cache_ttl_secs: 3600,
            cache_capacity: vidgit_cache::memory::DEFAULT_CAPACITY,
            change_queue_workers: 16,
            change_wait_timeout_secs: 25,
            consumer_max_retries: 3,
            event_stream_url: None,
            event_stream_group: DEFAULT_STREAM_GROUP.into(),
            event_stream_consumer: DEFAULT_STREAM_GROUP.into(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                                   |
    /// |----------------------------|-------------------------------------------|
    /// | `HOST`                     | `0.0.0.0`                                 |
    /// | `PORT`                     | `3000`                                    |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`                   |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                                      |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                                      |
    /// | `DATABASE_URL`             | unset                                     |
    /// | `STORAGE_BACKEND`          | `postgres` if `DATABASE_URL` is set, else `memory` |
    /// | `REDIS_URL`                | unset                                     |
    /// | `CACHE_TTL_SECS`           | `3600`                                    |
    /// | `CACHE_CAPACITY`           | `10000`                                   |
    /// | `CHANGE_QUEUE_WORKERS`     | `16`                                      |
    /// | `CHANGE_WAIT_TIMEOUT_SECS` | `25` (must be below the request timeout)  |
    /// | `CONSUMER_MAX_RETRIES`     | `3`                                       |
    /// | `EVENT_STREAM_URL`         | unset (in-process bus only)               |
    /// | `EVENT_STREAM_GROUP`       | `vidgit-api`                              |
    /// | `EVENT_STREAM_CONSUMER`    | `$HOSTNAME`, else `vidgit-api`            |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ServerConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL");
        let storage_backend = match var("STORAGE_BACKEND") {
            Some(raw) => raw.parse().map_err(|()| ConfigError::Invalid {
                name: "STORAGE_BACKEND",
                expected: "one of memory, postgres",
                value: raw,
            })?,
            None if database_url.is_some() => StorageBackend::Postgres,
            None => StorageBackend::Memory,
        };
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        let cors_origins = match var("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.cors_origins,
        };

        let request_timeout_secs = parse(
            &var,
            "REQUEST_TIMEOUT_SECS",
            "a valid u64",
            defaults.request_timeout_secs,
        )?;
        let change_wait_timeout_secs = match var("CHANGE_WAIT_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs < request_timeout_secs => secs,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "CHANGE_WAIT_TIMEOUT_SECS",
                        expected: "a u64 below REQUEST_TIMEOUT_SECS",
                        value: raw,
                    });
                }
            },
            None => defaults
                .change_wait_timeout_secs
                .min(request_timeout_secs.saturating_sub(1)),
        };

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse(&var, "PORT", "a valid u16", defaults.port)?,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs: parse(
                &var,
                "SHUTDOWN_TIMEOUT_SECS",
                "a valid u64",
                defaults.shutdown_timeout_secs,
            )?,
            database_url,
            storage_backend,
            redis_url: var("REDIS_URL"),
            cache_ttl_secs: parse(&var, "CACHE_TTL_SECS", "a valid u64", defaults.cache_ttl_secs)?,
            cache_capacity: parse(
                &var,
                "CACHE_CAPACITY",
                "a positive integer",
                defaults.cache_capacity,
            )?
            .max(1),
            change_queue_workers: parse(
                &var,
                "CHANGE_QUEUE_WORKERS",
                "a positive integer",
                defaults.change_queue_workers,
            )?
            .max(1),
            change_wait_timeout_secs,
            consumer_max_retries: parse(
                &var,
                "CONSUMER_MAX_RETRIES",
                "a valid u32",
                defaults.consumer_max_retries,
            )?,
            event_stream_url: var("EVENT_STREAM_URL"),
            event_stream_group: var("EVENT_STREAM_GROUP").unwrap_or(defaults.event_stream_group),
            event_stream_consumer: var("EVENT_STREAM_CONSUMER")
                .or_else(|| var("HOSTNAME"))
                .unwrap_or(defaults.event_stream_consumer),
        })
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            max_concurrency: self.change_queue_workers,
            wait_timeout: Duration::from_secs(self.change_wait_timeout_secs),
        }
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }

    pub fn consumer_backoff(&self) -> Backoff {
        Backoff::new(self.consumer_max_retries, CONSUMER_BASE_DELAY)
    }
}

fn parse<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value: raw,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_to_memory_storage() {
        let config = load(&[]).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.port, 3000);
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(3600)));
        assert_eq!(config.consumer_backoff().max_retries, 3);
    }

    #[test]
    fn database_url_selects_postgres() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/vidgit")]).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Postgres);

        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/vidgit"),
            ("STORAGE_BACKEND", "memory"),
        ])
        .unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Memory);
    }

    #[test]
    fn postgres_without_url_is_rejected() {
        assert_matches!(
            load(&[("STORAGE_BACKEND", "postgres")]),
            Err(ConfigError::MissingDatabaseUrl)
        );
    }

    #[test]
    fn invalid_numbers_name_the_variable() {
        let err = load(&[("PORT", "http")]).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { name: "PORT", .. });
    }

    #[test]
    fn change_wait_stays_below_request_timeout() {
        let config = load(&[]).unwrap();
        assert!(config.change_wait_timeout_secs < config.request_timeout_secs);

        let config = load(&[("REQUEST_TIMEOUT_SECS", "10")]).unwrap();
        assert_eq!(config.change_wait_timeout_secs, 9);

        assert_matches!(
            load(&[("CHANGE_WAIT_TIMEOUT_SECS", "30")]),
            Err(ConfigError::Invalid { name: "CHANGE_WAIT_TIMEOUT_SECS", .. })
        );
        assert_matches!(
            load(&[("REQUEST_TIMEOUT_SECS", "5"), ("CHANGE_WAIT_TIMEOUT_SECS", "5")]),
            Err(ConfigError::Invalid { name: "CHANGE_WAIT_TIMEOUT_SECS", .. })
        );
    }

    #[test]
    fn event_stream_settings() {
        let config = load(&[]).unwrap();
        assert_eq!(config.event_stream_url, None);
        assert_eq!(config.event_stream_group, "vidgit-api");

        let config = load(&[
            ("EVENT_STREAM_URL", "redis://broker:6379"),
            ("HOSTNAME", "api-7"),
        ])
        .unwrap();
        assert_eq!(config.event_stream_url.as_deref(), Some("redis://broker:6379"));
        assert_eq!(config.event_stream_consumer, "api-7");

        let config = load(&[("HOSTNAME", "api-7"), ("EVENT_STREAM_CONSUMER", "worker-a")]).unwrap();
        assert_eq!(config.event_stream_consumer, "worker-a");
    }

    #[test]
    fn parses_queue_and_cache_settings() {
        let config = load(&[
            ("CHANGE_QUEUE_WORKERS", "0"),
            ("CHANGE_WAIT_TIMEOUT_SECS", "5"),
            ("CACHE_TTL_SECS", "0"),
            ("CACHE_CAPACITY", "0"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
        ])
        .unwrap();
        assert_eq!(config.cache_capacity, 1);
        assert_eq!(config.queue_config().max_concurrency, 1);
        assert_eq!(config.queue_config().wait_timeout, Duration::from_secs(5));
        assert_eq!(config.cache_ttl(), None);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
    }
}
