use std::sync::Arc;

use tracing::info;

use crate::{
    cache::{CacheConfig, CacheRegistry},
    executor::{CachingExecutor, DataSource, Executor, SimpleExecutor},
    mapping::StatementRegistry,
    plugin::{Interceptor, InterceptorChain, Properties},
};

use super::Session;

/// Shared, immutable wiring from which sessions are opened.
pub struct SessionFactory {
    statements: Arc<StatementRegistry>,
    caches: Arc<CacheRegistry>,
    chain: Arc<InterceptorChain>,
    data_source: Arc<dyn DataSource>,
    cache_config: CacheConfig,
}

impl SessionFactory {
    pub fn builder(data_source: Arc<dyn DataSource>) -> SessionFactoryBuilder {
        SessionFactoryBuilder {
            data_source,
            statements: StatementRegistry::new(),
            chain: InterceptorChain::new(),
            cache_config: CacheConfig::default(),
        }
    }

    /// Open a session over `Plugin<CachingExecutor<Plugin<SimpleExecutor>>>`,
    /// or over the plugged raw executor alone when caching is disabled.
    pub fn open_session(&self) -> Session {
        let simple = self.chain.plugin(SimpleExecutor::new(
            Arc::clone(&self.data_source),
            Arc::clone(&self.chain),
        ));
        let executor: Box<dyn Executor> = if self.cache_config.enabled {
            Box::new(
                self.chain
                    .plugin(CachingExecutor::new(simple, Arc::clone(&self.caches))),
            )
        } else {
            Box::new(simple)
        };
        Session::new(executor, Arc::clone(&self.statements))
    }

    pub fn caches(&self) -> &CacheRegistry {
        &self.caches
    }

    pub fn statements(&self) -> &StatementRegistry {
        &self.statements
    }

    pub fn chain(&self) -> &InterceptorChain {
        &self.chain
    }

    pub fn data_source(&self) -> &dyn DataSource {
        self.data_source.as_ref()
    }
}

impl std::fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("data_source", &self.data_source.name())
            .field("statements", &self.statements.len())
            .field("chain", &self.chain)
            .field("cache_config", &self.cache_config)
            .finish()
    }
}

pub struct SessionFactoryBuilder {
    data_source: Arc<dyn DataSource>,
    statements: StatementRegistry,
    chain: InterceptorChain,
    cache_config: CacheConfig,
}

impl SessionFactoryBuilder {
    pub fn statements(mut self, statements: StatementRegistry) -> Self {
        self.statements = statements;
        self
    }

    pub fn chain(mut self, chain: InterceptorChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.chain.add(interceptor);
        self
    }

    pub fn interceptor_with_properties<I: Interceptor + 'static>(
        mut self,
        interceptor: I,
        properties: &Properties,
    ) -> Self {
        self.chain.add_with_properties(interceptor, properties);
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    pub fn build(self) -> SessionFactory {
        let caches = if self.cache_config.enabled {
            CacheRegistry::from_namespaces(self.statements.cached_namespaces(), &self.cache_config)
        } else {
            CacheRegistry::new()
        };

        info!(
            data_source = self.data_source.name(),
            statements = self.statements.len(),
            interceptors = ?self.chain.names(),
            namespace_cache = self.cache_config.enabled,
            "Session factory ready"
        );

        SessionFactory {
            statements: Arc::new(self.statements),
            caches: Arc::new(caches),
            chain: Arc::new(self.chain),
            data_source: self.data_source,
            cache_config: self.cache_config,
        }
    }
}
