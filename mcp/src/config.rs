//! Runtime configuration for ingestion and session analysis

use std::str::FromStr;
use thiserror::Error;

pub const ENV_CHUNK_SIZE: &str = "ACCESS_LOG_CHUNK_SIZE";
pub const ENV_PROBE_BYTES: &str = "ACCESS_LOG_PROBE_BYTES";
pub const ENV_SESSION_TIMEOUT: &str = "ACCESS_LOG_SESSION_TIMEOUT_MINUTES";
pub const ENV_SAMPLE_SEED: &str = "ACCESS_LOG_SAMPLE_SEED";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Knobs for the ingestion engine and the session builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Records buffered before they are flushed into the table columns (default 10000)
    pub chunk_size: usize,
    /// Bytes read to estimate line density in sample mode (default 100000)
    pub probe_bytes: usize,
    /// Line estimate used when the probe holds no newline (default 100000)
    pub fallback_line_estimate: usize,
    /// Failing lines surfaced in prefix mode (default 5)
    pub prefix_error_samples: usize,
    /// Failing lines surfaced in sample mode (default 3)
    pub sample_error_samples: usize,
    /// Inactivity gap that closes a session, in minutes (default 30)
    pub session_timeout_minutes: u32,
    /// Fixed seed for sample mode; random when unset
    pub sample_seed: Option<u64>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            probe_bytes: 100_000,
            fallback_line_estimate: 100_000,
            prefix_error_samples: 5,
            sample_error_samples: 3,
            session_timeout_minutes: 30,
            sample_seed: None,
        }
    }
}

impl AnalyzerConfig {
    /// Defaults overlaid with the `ACCESS_LOG_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`AnalyzerConfig::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = positive(&lookup, ENV_CHUNK_SIZE)? {
            config.chunk_size = v;
        }
        if let Some(v) = positive(&lookup, ENV_PROBE_BYTES)? {
            config.probe_bytes = v;
        }
        if let Some(v) = positive(&lookup, ENV_SESSION_TIMEOUT)? {
            config.session_timeout_minutes = v;
        }
        if let Some(v) = parsed(&lookup, ENV_SAMPLE_SEED)? {
            config.sample_seed = Some(v);
        }
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.sample_seed = Some(seed);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

fn parsed<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}

fn positive<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    F: Fn(&str) -> Option<String>,
{
    match parsed::<T, F>(lookup, var)? {
        Some(v) if v <= T::default() => Err(ConfigError::InvalidValue {
            var,
            value: lookup(var).unwrap_or_default(),
        }),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = AnalyzerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AnalyzerConfig::default());
        assert_eq!(config.chunk_size, 10_000);
        assert_eq!(config.session_timeout_minutes, 30);
    }

    #[test]
    fn test_overrides() {
        let config = AnalyzerConfig::from_lookup(lookup(&[
            (ENV_CHUNK_SIZE, "500"),
            (ENV_SESSION_TIMEOUT, "15"),
            (ENV_SAMPLE_SEED, "7"),
        ]))
        .unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.session_timeout_minutes, 15);
        assert_eq!(config.sample_seed, Some(7));
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(
            AnalyzerConfig::from_lookup(lookup(&[(ENV_CHUNK_SIZE, "0")])),
            Err(ConfigError::InvalidValue { var: ENV_CHUNK_SIZE, value: "0".to_string() })
        );
        assert!(AnalyzerConfig::from_lookup(lookup(&[(ENV_PROBE_BYTES, "lots")])).is_err());
    }
}
