//! Postgres backend on a `sqlx` pool.
//!
//! The executor pipeline is synchronous, so each call blocks on the runtime
//! handle captured at connect time. Connections must therefore be used from
//! blocking worker threads, never from inside an async task.

use sqlx::{
    Column, Postgres, Row as _, Transaction, TypeInfo,
    postgres::{PgArguments, PgPool, PgPoolOptions, PgRow},
    query::Query,
};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::{
    config::DatabaseSettings,
    executor::{Connection, DataAccessError, DataSource, PreparedStatement},
    infra::error::InfraError,
    mapping::{Row, SqlValue, rewrite_markers},
};

const BACKEND: &str = "postgres";

#[derive(Clone)]
pub struct PostgresDataSource {
    pool: PgPool,
    runtime: Handle,
}

impl PostgresDataSource {
    /// Connect, run migrations and remember the current runtime.
    pub async fn connect(settings: &DatabaseSettings, url: &str) -> Result<Self, InfraError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections.get())
            .connect(url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(
            target: "mapperlab::infra::db::postgres",
            max_connections = settings.max_connections.get(),
            "Postgres pool ready"
        );
        Ok(Self::from_pool(pool, Handle::current()))
    }

    pub fn from_pool(pool: PgPool, runtime: Handle) -> Self {
        Self { pool, runtime }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl DataSource for PostgresDataSource {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn open(&self) -> Result<Box<dyn Connection>, DataAccessError> {
        Ok(Box::new(PostgresConnection {
            pool: self.pool.clone(),
            runtime: self.runtime.clone(),
            transaction: None,
        }))
    }
}

impl std::fmt::Debug for PostgresDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDataSource")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

/// Reads run on the pool until the first write opens a transaction; from then
/// on everything runs inside it until commit or rollback.
struct PostgresConnection {
    pool: PgPool,
    runtime: Handle,
    transaction: Option<Transaction<'static, Postgres>>,
}

impl Connection for PostgresConnection {
    fn query(&mut self, statement: &PreparedStatement) -> Result<Vec<Row>, DataAccessError> {
        let sql = to_postgres_placeholders(statement.sql());
        debug!(
            target: "mapperlab::infra::db::postgres",
            statement_id = statement.statement_id(),
            sql = %sql,
            "Running query"
        );

        let query = bind_values(&sql, statement.values());
        let rows = match self.transaction.as_mut() {
            Some(transaction) => self.runtime.block_on(query.fetch_all(&mut **transaction))?,
            None => self.runtime.block_on(query.fetch_all(&self.pool))?,
        };
        rows.iter().map(decode_row).collect()
    }

    fn execute(&mut self, statement: &PreparedStatement) -> Result<u64, DataAccessError> {
        let sql = to_postgres_placeholders(statement.sql());
        debug!(
            target: "mapperlab::infra::db::postgres",
            statement_id = statement.statement_id(),
            sql = %sql,
            "Running update"
        );

        if self.transaction.is_none() {
            self.transaction = Some(self.runtime.block_on(self.pool.begin())?);
        }
        let Some(transaction) = self.transaction.as_mut() else {
            return Err(DataAccessError::unavailable("transaction was not started"));
        };

        let query = bind_values(&sql, statement.values());
        let result = self.runtime.block_on(query.execute(&mut **transaction))?;
        Ok(result.rows_affected())
    }

    fn commit(&mut self) -> Result<(), DataAccessError> {
        if let Some(transaction) = self.transaction.take() {
            self.runtime.block_on(transaction.commit())?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DataAccessError> {
        if let Some(transaction) = self.transaction.take() {
            self.runtime.block_on(transaction.rollback())?;
        }
        Ok(())
    }
}

fn bind_values<'q>(sql: &'q str, values: &'q [SqlValue]) -> Query<'q, Postgres, PgArguments> {
    values
        .iter()
        .fold(sqlx::query(sql), |query, value| match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(value) => query.bind(*value),
            SqlValue::Int(value) => query.bind(*value),
            SqlValue::Text(value) => query.bind(value.as_str()),
        })
}

fn decode_row(row: &PgRow) -> Result<Row, DataAccessError> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let index = column.ordinal();
        let value = match column.type_info().name() {
            "INT2" => SqlValue::from(row.try_get::<Option<i16>, _>(index)?.map(i64::from)),
            "INT4" => SqlValue::from(row.try_get::<Option<i32>, _>(index)?.map(i64::from)),
            "INT8" => SqlValue::from(row.try_get::<Option<i64>, _>(index)?),
            "BOOL" => SqlValue::from(row.try_get::<Option<bool>, _>(index)?),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                SqlValue::from(row.try_get::<Option<String>, _>(index)?)
            }
            other => {
                return Err(DataAccessError::Decode {
                    column: column.name().to_string(),
                    message: format!("unsupported column type `{other}`"),
                });
            }
        };
        decoded.insert(column.name().to_string(), value);
    }
    Ok(decoded)
}

/// Rewrite `?` markers to `$1`, `$2`, ... outside single-quoted literals.
pub fn to_postgres_placeholders(sql: &str) -> String {
    rewrite_markers(sql, |position| format!("${position}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_in_order() {
        assert_eq!(
            to_postgres_placeholders("select * from t_user where id = ? and username = ?"),
            "select * from t_user where id = $1 and username = $2"
        );
    }

    #[test]
    fn question_marks_inside_literals_are_kept() {
        assert_eq!(
            to_postgres_placeholders("update t_user set username = 'who?' where id = ?"),
            "update t_user set username = 'who?' where id = $1"
        );
    }
}
