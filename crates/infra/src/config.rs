//! Configuration loading and representation.
//!
//! Settings come from environment variables, read once at start-up. Missing
//! variables fall back to defaults with a warning; malformed ones are errors.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Bounded retry for optimistic-concurrency conflicts.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. At least 1.
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `n * backoff` before retrying.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: String,
    /// Selects the Postgres store when set.
    pub database_url: Option<String>,
    pub retry: RetryPolicy,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("KARDEX_BIND_ADDR")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| {
                warn!("KARDEX_BIND_ADDR not set, using default {DEFAULT_BIND_ADDR}");
                DEFAULT_BIND_ADDR.to_string()
            });

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        if database_url.is_none() {
            warn!("DATABASE_URL not set, using the in-memory store (data is lost on exit)");
        }

        let max_attempts = parse_or("KARDEX_MAX_RETRIES", &lookup, DEFAULT_MAX_RETRIES)?;
        let backoff_ms = parse_or("KARDEX_RETRY_BACKOFF_MS", &lookup, DEFAULT_RETRY_BACKOFF_MS)?;

        Ok(Self {
            bind_addr,
            database_url,
            retry: RetryPolicy::new(max_attempts, Duration::from_millis(backoff_ms)),
        })
    }
}

fn parse_or<T, F>(var: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(settings.database_url, None);
        assert_eq!(settings.retry, RetryPolicy::default());
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let settings = Settings::from_lookup(lookup(&[
            ("KARDEX_BIND_ADDR", "127.0.0.1:9000"),
            ("DATABASE_URL", "postgres://kardex@localhost/kardex"),
            ("KARDEX_MAX_RETRIES", "3"),
            ("KARDEX_RETRY_BACKOFF_MS", "0"),
        ]))
        .unwrap();
        assert_eq!(settings.bind_addr, "127.0.0.1:9000");
        assert!(settings.database_url.is_some());
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.backoff, Duration::ZERO);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Settings::from_lookup(lookup(&[("KARDEX_MAX_RETRIES", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "KARDEX_MAX_RETRIES", .. }));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let settings = Settings::from_lookup(lookup(&[("KARDEX_MAX_RETRIES", "0")])).unwrap();
        assert_eq!(settings.retry.max_attempts, 1);
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy::new(4, Duration::from_millis(10));
        assert_eq!(policy.delay_after(3), Duration::from_millis(30));
    }
}
