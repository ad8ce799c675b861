//! Data source backends for the executor pipeline.

mod memory;
mod postgres;

use std::sync::Arc;

use tracing::info;

pub use memory::MemoryDataSource;
pub use postgres::{PostgresDataSource, to_postgres_placeholders};

use crate::{config::DatabaseSettings, executor::DataSource};

use super::error::InfraError;

/// Pick the backend: Postgres when a URL is configured, otherwise the seeded
/// in-memory table.
pub async fn connect(settings: &DatabaseSettings) -> Result<Arc<dyn DataSource>, InfraError> {
    match settings.url.as_deref() {
        Some(url) => Ok(Arc::new(PostgresDataSource::connect(settings, url).await?)),
        None => {
            info!(
                target: "mapperlab::infra::db",
                "No database url configured; using the in-memory user table"
            );
            Ok(Arc::new(MemoryDataSource::seeded()))
        }
    }
}
