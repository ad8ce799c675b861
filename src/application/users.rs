//! The `UserMapper` namespace: statement declarations and a typed facade over a
//! session.

use crate::{
    domain::{error::DomainError, user::UserRecord},
    mapping::{MappedStatement, MappingError, Params, RowBounds, SqlCommandType, StatementRegistry},
    session::Session,
};

use super::error::AppError;

pub const NAMESPACE: &str = "UserMapper";

pub mod statements {
    pub const FIND_BY_ID: &str = "UserMapper.findById";
    pub const FIND_ALL: &str = "UserMapper.findAll";
    pub const UPDATE_ALL: &str = "UserMapper.updateAll";
    pub const UPDATE_ONE: &str = "UserMapper.updateOne";
    pub const DELETE_ALL: &str = "UserMapper.deleteAll";
}

/// Register the namespace (with a namespace cache) and its five statements.
pub fn declare(registry: &mut StatementRegistry) -> Result<(), MappingError> {
    registry.declare_namespace(NAMESPACE, true);

    let declarations = [
        (
            "findById",
            SqlCommandType::Select,
            "select id, username, email from t_user where id = #{id}",
        ),
        (
            "findAll",
            SqlCommandType::Select,
            "select id, username, email from t_user order by id",
        ),
        (
            "updateAll",
            SqlCommandType::Update,
            "update t_user set username = 'kubo'",
        ),
        (
            "updateOne",
            SqlCommandType::Update,
            "update t_user set username = 'kubo' where id = 1",
        ),
        ("deleteAll", SqlCommandType::Delete, "delete from t_user"),
    ];

    for (name, command, template) in declarations {
        registry.register(MappedStatement::new(NAMESPACE, name, command, template)?)?;
    }
    Ok(())
}

/// Typed calls into the `UserMapper` namespace through one session.
pub struct UserMapper<'s> {
    session: &'s mut Session,
}

impl<'s> UserMapper<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    pub fn find_by_id(&mut self, id: i64) -> Result<Option<UserRecord>, AppError> {
        let params = Params::new().with("id", id);
        let row = self.session.select_one(statements::FIND_BY_ID, &params)?;
        Ok(row.as_ref().map(UserRecord::from_row).transpose()?)
    }

    /// Like [`Self::find_by_id`] but absence is an error.
    pub fn get(&mut self, id: i64) -> Result<UserRecord, AppError> {
        self.find_by_id(id)?
            .ok_or_else(|| AppError::Domain(DomainError::not_found("user")))
    }

    pub fn find_all(&mut self) -> Result<Vec<UserRecord>, AppError> {
        self.find_page(RowBounds::UNBOUNDED)
    }

    pub fn find_page(&mut self, bounds: RowBounds) -> Result<Vec<UserRecord>, AppError> {
        let rows = self
            .session
            .select_list_bounded(statements::FIND_ALL, &Params::new(), bounds)?;
        rows.iter()
            .map(|row| UserRecord::from_row(row).map_err(AppError::from))
            .collect()
    }

    pub fn update_all(&mut self) -> Result<u64, AppError> {
        self.write(statements::UPDATE_ALL)
    }

    pub fn update_one(&mut self) -> Result<u64, AppError> {
        self.write(statements::UPDATE_ONE)
    }

    pub fn delete_all(&mut self) -> Result<u64, AppError> {
        self.write(statements::DELETE_ALL)
    }

    fn write(&mut self, statement_id: &str) -> Result<u64, AppError> {
        self.session
            .update(statement_id, &Params::new())
            .map_err(AppError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::CommandKind;

    #[test]
    fn declares_five_statements_in_a_cached_namespace() {
        let mut registry = StatementRegistry::new();
        declare(&mut registry).expect("declare user mapper");

        assert_eq!(registry.len(), 5);
        assert_eq!(registry.cached_namespaces().collect::<Vec<_>>(), vec![NAMESPACE]);

        let find = registry.get(statements::FIND_BY_ID).expect("findById");
        assert_eq!(find.sql(), "select id, username, email from t_user where id = ?");
        assert_eq!(find.parameter_names(), ["id".to_string()]);

        let delete = registry.get(statements::DELETE_ALL).expect("deleteAll");
        assert_eq!(delete.kind(), CommandKind::Write);
        assert!(!delete.use_cache());
    }

    #[test]
    fn declaring_twice_is_rejected() {
        let mut registry = StatementRegistry::new();
        declare(&mut registry).expect("first declaration");
        assert!(matches!(
            declare(&mut registry),
            Err(MappingError::DuplicateStatement { .. })
        ));
    }
}
