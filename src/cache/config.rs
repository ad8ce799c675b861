//! Namespace cache configuration.

use std::{fmt, num::NonZeroUsize, str::FromStr};

const DEFAULT_CAPACITY: usize = 512;

/// Which entry leaves a full namespace cache first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Least recently accessed; reads refresh recency.
    #[default]
    Lru,
    /// Oldest insertion; reads leave order untouched.
    Fifo,
}

impl EvictionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::Fifo => "fifo",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "fifo" => Ok(Self::Fifo),
            other => Err(format!("unknown eviction policy `{other}` (expected lru|fifo)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// When false, no namespace cache decorator is installed.
    pub enabled: bool,
    /// Maximum entries per namespace.
    pub capacity: usize,
    pub eviction_policy: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            eviction_policy: EvictionPolicy::Lru,
        }
    }
}

impl From<&crate::config::NamespaceCacheSettings> for CacheConfig {
    fn from(settings: &crate::config::NamespaceCacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity.get(),
            eviction_policy: settings.eviction_policy,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.capacity, 512);
        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.capacity_non_zero().get(), 1);
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("LRU".parse::<EvictionPolicy>(), Ok(EvictionPolicy::Lru));
        assert_eq!(" fifo ".parse::<EvictionPolicy>(), Ok(EvictionPolicy::Fifo));
        assert!("random".parse::<EvictionPolicy>().is_err());
    }
}
