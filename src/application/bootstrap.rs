use std::sync::Arc;

use crate::{
    cache::CacheConfig,
    config::{NamespaceCacheSettings, PluginSettings},
    executor::DataSource,
    mapping::{MappingError, StatementRegistry},
    plugin::{ObservationSink, standard_chain},
    session::SessionFactory,
};

use super::users;

/// Every statement the application knows about.
pub fn statement_registry() -> Result<StatementRegistry, MappingError> {
    let mut registry = StatementRegistry::new();
    users::declare(&mut registry)?;
    Ok(registry)
}

/// Wire statements, interceptors and caches over `data_source`.
pub fn session_factory(
    cache: &NamespaceCacheSettings,
    plugins: &PluginSettings,
    data_source: Arc<dyn DataSource>,
    sink: Arc<dyn ObservationSink>,
) -> Result<SessionFactory, MappingError> {
    Ok(SessionFactory::builder(data_source)
        .statements(statement_registry()?)
        .chain(standard_chain(plugins, sink))
        .cache_config(CacheConfig::from(cache))
        .build())
}
