use std::fmt;

use super::{
    MappingError,
    value::{Params, SqlValue},
};

/// Coarse classification used by the executor to decide cache behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlCommandType {
    Select,
    Insert,
    Update,
    Delete,
}

impl SqlCommandType {
    pub fn kind(self) -> CommandKind {
        match self {
            Self::Select => CommandKind::Read,
            Self::Insert | Self::Update | Self::Delete => CommandKind::Write,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for SqlCommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered statement: id, command type and query template.
///
/// The template uses `#{name}` placeholders. They are resolved once at
/// construction into positional `?` markers plus the ordered list of parameter
/// names, so binding is a lookup per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedStatement {
    id: String,
    namespace: String,
    command: SqlCommandType,
    template: String,
    sql: String,
    parameters: Vec<String>,
    use_cache: bool,
}

impl MappedStatement {
    pub fn new(
        namespace: &str,
        name: &str,
        command: SqlCommandType,
        template: &str,
    ) -> Result<Self, MappingError> {
        let (sql, parameters) = parse_template(template)?;
        Ok(Self {
            id: format!("{namespace}.{name}"),
            namespace: namespace.to_string(),
            command,
            template: template.to_string(),
            sql,
            parameters,
            use_cache: command.kind() == CommandKind::Read,
        })
    }

    /// Opt a read out of the namespace cache.
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn command(&self) -> SqlCommandType {
        self.command
    }

    pub fn kind(&self) -> CommandKind {
        self.command.kind()
    }

    /// The template as declared, with `#{name}` placeholders.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The template with placeholders replaced by `?`.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameters
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    pub fn bound_sql(&self, params: &Params) -> Result<BoundSql, MappingError> {
        let parameters = self
            .parameters
            .iter()
            .map(|name| {
                params
                    .get(name)
                    .cloned()
                    .map(|value| (name.clone(), value))
                    .ok_or_else(|| MappingError::MissingParameter {
                        statement: self.id.clone(),
                        name: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BoundSql {
            sql: self.sql.clone(),
            parameters,
        })
    }
}

/// A statement resolved against concrete parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundSql {
    pub sql: String,
    pub parameters: Vec<(String, SqlValue)>,
}

impl BoundSql {
    pub fn values(&self) -> Vec<SqlValue> {
        self.parameters
            .iter()
            .map(|(_, value)| value.clone())
            .collect()
    }
}

fn parse_template(template: &str) -> Result<(String, Vec<String>), MappingError> {
    let mut sql = String::with_capacity(template.len());
    let mut names = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("#{") {
        sql.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| MappingError::UnterminatedPlaceholder {
                template: template.to_string(),
            })?;
        let name = after[..end].trim();
        if name.is_empty() {
            return Err(MappingError::EmptyPlaceholder {
                template: template.to_string(),
            });
        }
        names.push(name.to_string());
        sql.push('?');
        rest = &after[end + 1..];
    }
    sql.push_str(rest);

    Ok((sql, names))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_become_positional() {
        let statement = MappedStatement::new(
            "UserMapper",
            "findById",
            SqlCommandType::Select,
            "select id, username, email from t_user where id = #{id}",
        )
        .expect("valid template");

        assert_eq!(statement.id(), "UserMapper.findById");
        assert_eq!(
            statement.sql(),
            "select id, username, email from t_user where id = ?"
        );
        assert_eq!(statement.parameter_names(), ["id".to_string()]);
        assert!(statement.use_cache());
    }

    #[test]
    fn binding_follows_placeholder_order() {
        let statement = MappedStatement::new(
            "UserMapper",
            "rename",
            SqlCommandType::Update,
            "update t_user set username = #{name} where id = #{id}",
        )
        .expect("valid template");

        let bound = statement
            .bound_sql(&Params::new().with("id", 3_i64).with("name", "kubo"))
            .expect("all parameters present");

        assert_eq!(
            bound.values(),
            vec![SqlValue::Text("kubo".into()), SqlValue::Int(3)]
        );
        assert!(!statement.use_cache());
    }

    #[test]
    fn missing_parameter_is_reported() {
        let statement = MappedStatement::new(
            "UserMapper",
            "findById",
            SqlCommandType::Select,
            "select * from t_user where id = #{id}",
        )
        .expect("valid template");

        let err = statement.bound_sql(&Params::new()).unwrap_err();
        assert!(matches!(err, MappingError::MissingParameter { ref name, .. } if name == "id"));
    }

    #[test]
    fn unterminated_placeholder_is_rejected() {
        let err = MappedStatement::new("N", "bad", SqlCommandType::Select, "select #{id")
            .unwrap_err();
        assert!(matches!(err, MappingError::UnterminatedPlaceholder { .. }));

        let err = MappedStatement::new("N", "bad", SqlCommandType::Select, "select #{ }")
            .unwrap_err();
        assert!(matches!(err, MappingError::EmptyPlaceholder { .. }));
    }
}
