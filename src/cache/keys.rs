//! Cache key for statement results.

use crate::mapping::{BoundSql, MappedStatement, RowBounds, SqlValue};

/// Identity of one read: statement, effective SQL, bound values and row window.
///
/// Both cache tiers key on this, so two reads share an entry exactly when they
/// would issue the same SQL with the same values over the same window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    statement_id: String,
    sql: String,
    params: Vec<SqlValue>,
    bounds: RowBounds,
}

impl CacheKey {
    pub fn new(statement: &MappedStatement, bound: &BoundSql, bounds: RowBounds) -> Self {
        Self {
            statement_id: statement.id().to_string(),
            sql: bound.sql.clone(),
            params: bound.values(),
            bounds,
        }
    }

    pub fn statement_id(&self) -> &str {
        &self.statement_id
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn bounds(&self) -> RowBounds {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{Params, SqlCommandType};

    fn find_by_id() -> MappedStatement {
        MappedStatement::new(
            "UserMapper",
            "findById",
            SqlCommandType::Select,
            "select * from t_user where id = #{id}",
        )
        .expect("valid template")
    }

    fn key(id: i64, bounds: RowBounds) -> CacheKey {
        let statement = find_by_id();
        let bound = statement
            .bound_sql(&Params::new().with("id", id))
            .expect("bound");
        CacheKey::new(&statement, &bound, bounds)
    }

    #[test]
    fn equal_inputs_produce_equal_keys() {
        assert_eq!(key(1, RowBounds::UNBOUNDED), key(1, RowBounds::UNBOUNDED));
    }

    #[test]
    fn parameters_and_bounds_discriminate() {
        assert_ne!(key(1, RowBounds::UNBOUNDED), key(2, RowBounds::UNBOUNDED));
        assert_ne!(key(1, RowBounds::UNBOUNDED), key(1, RowBounds::new(0, 1)));
    }
}
