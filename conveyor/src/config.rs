//! Buffer configuration.

use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::{ParseStrategyError, Strategy};

/// Environment variable holding the buffer capacity.
pub const CAPACITY_VAR: &str = "CONVEYOR_CAPACITY";
/// Environment variable holding the strategy name.
pub const STRATEGY_VAR: &str = "CONVEYOR_STRATEGY";

/// Configuration for a [`BoundedBuffer`](crate::BoundedBuffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Maximum number of buffered items. Must be non-zero.
    pub capacity: usize,
    /// Primitive used to park and wake callers.
    pub strategy: Strategy,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            strategy: Strategy::Monitor,
        }
    }
}

/// Error reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A capacity variable that is not a base-10 unsigned integer.
    #[error("invalid {var} value {value:?}: {source}")]
    Capacity {
        var: &'static str,
        value: String,
        source: std::num::ParseIntError,
    },
    /// A strategy variable naming no known strategy.
    #[error("invalid {var} value: {source}")]
    Strategy {
        var: &'static str,
        source: ParseStrategyError,
    },
}

impl BufferConfig {
    /// Reads [`CAPACITY_VAR`] and [`STRATEGY_VAR`], keeping the default for
    /// any variable that is unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a value is present but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(CAPACITY_VAR) {
            config.capacity = value
                .trim()
                .parse()
                .map_err(|source| ConfigError::Capacity {
                    var: CAPACITY_VAR,
                    value,
                    source,
                })?;
        }

        if let Some(value) = lookup(STRATEGY_VAR) {
            config.strategy = value.parse().map_err(|source| ConfigError::Strategy {
                var: STRATEGY_VAR,
                source,
            })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn unset_variables_keep_defaults() {
        let config = BufferConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, BufferConfig::default());
    }

    #[test]
    fn reads_both_variables() {
        let config = BufferConfig::from_lookup(lookup(&[
            (CAPACITY_VAR, " 64 "),
            (STRATEGY_VAR, "semaphore"),
        ]))
        .unwrap();
        assert_eq!(config.capacity, 64);
        assert_eq!(config.strategy, Strategy::Semaphore);
    }

    #[test]
    fn bad_capacity_names_the_variable() {
        let err = BufferConfig::from_lookup(lookup(&[(CAPACITY_VAR, "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Capacity { .. }));
        assert!(err.to_string().starts_with("invalid CONVEYOR_CAPACITY value \"lots\""));
    }

    #[test]
    fn bad_strategy_is_reported() {
        let err = BufferConfig::from_lookup(lookup(&[(STRATEGY_VAR, "ticket")])).unwrap_err();
        assert!(matches!(err, ConfigError::Strategy { .. }));
    }

    #[test]
    fn zero_capacity_parses_but_fails_at_construction() {
        let config = BufferConfig::from_lookup(lookup(&[(CAPACITY_VAR, "0")])).unwrap();
        assert!(crate::BoundedBuffer::<u8>::from_config(&config).is_err());
    }

    #[test]
    fn deserializes_with_missing_fields_defaulted() {
        let config: BufferConfig = serde_json::from_str(r#"{"strategy":"fair"}"#).unwrap();
        assert_eq!(config.capacity, 16);
        assert_eq!(config.strategy, Strategy::Fair);
    }
}
