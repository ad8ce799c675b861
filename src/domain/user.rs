use mapperlab_api_types::UserResponse;

use crate::mapping::{Row, SqlValue};

use super::error::DomainError;

/// A row of `t_user`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
}

impl UserRecord {
    pub fn from_row(row: &Row) -> Result<Self, DomainError> {
        let id = match column(row, "id")? {
            SqlValue::Int(id) => *id,
            other => return Err(DomainError::column_type("id", "integer", other.to_string())),
        };
        let username = match column(row, "username")? {
            SqlValue::Text(name) => name.clone(),
            other => {
                return Err(DomainError::column_type(
                    "username",
                    "text",
                    other.to_string(),
                ));
            }
        };
        let email = match row.get("email") {
            None | Some(SqlValue::Null) => None,
            Some(SqlValue::Text(email)) => Some(email.clone()),
            Some(other) => {
                return Err(DomainError::column_type(
                    "email",
                    "text or null",
                    other.to_string(),
                ));
            }
        };

        Ok(Self {
            id,
            username,
            email,
        })
    }

    pub fn to_row(&self) -> Row {
        Row::from([
            ("id".to_string(), SqlValue::Int(self.id)),
            ("username".to_string(), SqlValue::Text(self.username.clone())),
            ("email".to_string(), SqlValue::from(self.email.clone())),
        ])
    }
}

impl From<UserRecord> for UserResponse {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            email: record.email,
        }
    }
}

fn column<'r>(row: &'r Row, name: &'static str) -> Result<&'r SqlValue, DomainError> {
    row.get(name)
        .ok_or(DomainError::MissingColumn { column: name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_round_trips_through_record() {
        let record = UserRecord {
            id: 1,
            username: "alice".to_string(),
            email: None,
        };
        assert_eq!(UserRecord::from_row(&record.to_row()), Ok(record));
    }

    #[test]
    fn wrong_column_type_is_reported() {
        let row = Row::from([
            ("id".to_string(), SqlValue::Text("one".into())),
            ("username".to_string(), SqlValue::Text("alice".into())),
        ]);
        assert!(matches!(
            UserRecord::from_row(&row),
            Err(DomainError::ColumnType { column: "id", .. })
        ));
    }

    #[test]
    fn missing_username_is_reported() {
        let row = Row::from([("id".to_string(), SqlValue::Int(1))]);
        assert_eq!(
            UserRecord::from_row(&row),
            Err(DomainError::MissingColumn { column: "username" })
        );
    }
}
