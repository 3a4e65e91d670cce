//! Thread pool configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default floor on live workers.
pub const DEFAULT_MIN_WORKERS: usize = 1;

/// Default idle time before an above-minimum worker retires.
pub const DEFAULT_MAX_IDLE_TIME: Duration = Duration::from_millis(250);

/// Default worker thread name prefix.
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "pool-worker";

/// Environment variable read by [`ThreadPoolConfig::from_env`] for `min_workers`.
pub const ENV_MIN_WORKERS: &str = "THREAD_POOL_MIN_WORKERS";
/// Environment variable read by [`ThreadPoolConfig::from_env`] for `max_workers`.
pub const ENV_MAX_WORKERS: &str = "THREAD_POOL_MAX_WORKERS";
/// Environment variable read by [`ThreadPoolConfig::from_env`] for `max_idle_time`, in milliseconds.
pub const ENV_MAX_IDLE_MS: &str = "THREAD_POOL_MAX_IDLE_MS";
/// Environment variable read by [`ThreadPoolConfig::from_env`] for `thread_name_prefix`.
pub const ENV_THREAD_NAME: &str = "THREAD_POOL_THREAD_NAME";

/// Detected hardware concurrency, never below one.
#[must_use]
pub fn default_max_workers() -> usize {
    num_cpus::get().max(1)
}

/// Thread pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadPoolConfig {
    /// Floor on live workers while the pool is running.
    pub min_workers: usize,
    /// Ceiling on live workers.
    pub max_workers: usize,
    /// How long an above-minimum idle worker waits before retiring.
    #[serde(rename = "max_idle_time_ms", with = "duration_ms")]
    pub max_idle_time: Duration,
    /// Worker threads are named `{prefix}-{id}`.
    pub thread_name_prefix: String,
    /// Stack size for worker threads; the platform default when `None`.
    pub stack_size: Option<usize>,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            min_workers: DEFAULT_MIN_WORKERS,
            max_workers: default_max_workers(),
            max_idle_time: DEFAULT_MAX_IDLE_TIME,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            stack_size: None,
        }
    }
}

impl ThreadPoolConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers must be greater than 0".into());
        }
        if u32::try_from(self.max_workers).is_err() {
            return Err(format!("max_workers must not exceed {}", u32::MAX));
        }
        if self.max_workers < self.min_workers {
            return Err(format!(
                "max_workers ({}) must be >= min_workers ({})",
                self.max_workers, self.min_workers
            ));
        }
        if self.max_idle_time.is_zero() {
            return Err("max_idle_time must be greater than 0".into());
        }
        if self.stack_size == Some(0) {
            return Err("stack_size must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the process environment.
    ///
    /// A `.env` file is loaded first if present. Unset variables keep their
    /// defaults. The pool never calls this on its own.
    ///
    /// # Errors
    ///
    /// Returns a description of an unparsable variable or a validation failure.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();
        if let Some(min) = env_var::<usize>(ENV_MIN_WORKERS)? {
            cfg.min_workers = min;
        }
        if let Some(max) = env_var::<usize>(ENV_MAX_WORKERS)? {
            cfg.max_workers = max;
        }
        if let Some(ms) = env_var::<u64>(ENV_MAX_IDLE_MS)? {
            cfg.max_idle_time = Duration::from_millis(ms);
        }
        if let Ok(prefix) = env::var(ENV_THREAD_NAME) {
            cfg.thread_name_prefix = prefix;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_var<T>(key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{key}: {e}")),
        Err(_) => Ok(None),
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = ThreadPoolConfig::default();
        assert_eq!(cfg.min_workers, 1);
        assert!(cfg.max_workers >= 1);
        assert_eq!(cfg.max_idle_time, Duration::from_millis(250));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip_uses_milliseconds() {
        let cfg = ThreadPoolConfig {
            max_idle_time: Duration::from_millis(75),
            ..ThreadPoolConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"max_idle_time_ms\":75"));
        assert_eq!(ThreadPoolConfig::from_json_str(&json).unwrap(), cfg);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let cfg = ThreadPoolConfig::from_json_str(r#"{"min_workers": 0}"#).unwrap();
        assert_eq!(cfg.min_workers, 0);
        assert_eq!(cfg.thread_name_prefix, DEFAULT_THREAD_NAME_PREFIX);
    }
}
