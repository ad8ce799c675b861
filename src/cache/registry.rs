//! Namespace → cache lookup, built once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::{config::CacheConfig, namespace::NamespaceCache};

#[derive(Debug, Default, Clone)]
pub struct CacheRegistry {
    caches: HashMap<String, Arc<NamespaceCache>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one cache per declared namespace.
    pub fn from_namespaces<'a>(
        namespaces: impl IntoIterator<Item = &'a str>,
        config: &CacheConfig,
    ) -> Self {
        let mut registry = Self::new();
        for namespace in namespaces {
            registry.declare(namespace, config);
        }
        registry
    }

    pub fn declare(&mut self, namespace: &str, config: &CacheConfig) -> Arc<NamespaceCache> {
        let cache = self
            .caches
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(NamespaceCache::new(namespace, config)));
        info!(
            namespace,
            capacity = config.capacity,
            eviction_policy = %config.eviction_policy,
            "Declared namespace cache"
        );
        Arc::clone(cache)
    }

    pub fn get(&self, namespace: &str) -> Option<Arc<NamespaceCache>> {
        self.caches.get(namespace).cloned()
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.caches.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_namespaces_resolve() {
        let registry =
            CacheRegistry::from_namespaces(["UserMapper"], &CacheConfig::default());
        assert!(registry.get("UserMapper").is_some());
        assert!(registry.get("OrderMapper").is_none());
    }

    #[test]
    fn redeclaring_keeps_the_same_cache() {
        let mut registry = CacheRegistry::new();
        let first = registry.declare("UserMapper", &CacheConfig::default());
        let second = registry.declare("UserMapper", &CacheConfig::default());
        assert!(Arc::ptr_eq(&first, &second));
    }
}
