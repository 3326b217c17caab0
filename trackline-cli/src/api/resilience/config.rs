//! Concurrency configuration for lookup fan-out

use serde::Deserialize;

/// Concurrency limiting configuration (`[concurrency]` in the config file)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Maximum carrier lookups in flight at once
    pub max_concurrent_lookups: usize,
    /// Whether concurrency limiting is enabled
    pub enabled: bool,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_lookups: 10,
            enabled: true,
        }
    }
}

impl ConcurrencyConfig {
    /// Config limiting lookups to `max` in flight
    pub fn limited(max: usize) -> Self {
        Self {
            max_concurrent_lookups: max.max(1),
            enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_table() {
        let config: ConcurrencyConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_concurrent_lookups, 10);
        assert!(config.enabled);
    }

    #[test]
    fn test_partial_table() {
        let config: ConcurrencyConfig = toml::from_str("max_concurrent_lookups = 4").unwrap();
        assert_eq!(config.max_concurrent_lookups, 4);
        assert!(config.enabled);
    }

    #[test]
    fn test_limited_never_zero() {
        assert_eq!(ConcurrencyConfig::limited(0).max_concurrent_lookups, 1);
    }
}
