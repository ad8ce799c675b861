//! Rejects UPDATE/DELETE statements that would touch every row.

use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::{executor::ExecutorError, mapping::SqlCommandType};

use super::{Interceptor, Invocation, Outcome, Signature, signatures};

pub(crate) const METRIC_POLICY_VIOLATION: &str = "mapperlab_policy_violation_total";

static BLOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment pattern"));
static LINE_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--[^\n]*").expect("line comment pattern"));
static HASH_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*#[^\n]*").expect("hash comment pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Strip comments, collapse whitespace and lowercase.
pub(crate) fn normalize_sql(sql: &str) -> String {
    let sql = BLOCK_COMMENT.replace_all(sql, " ");
    let sql = LINE_COMMENT.replace_all(&sql, " ");
    let sql = HASH_COMMENT.replace_all(&sql, " ");
    let sql = WHITESPACE.replace_all(&sql, " ");
    sql.trim().to_lowercase()
}

/// Whether the statement restricts its target rows.
///
/// Textual check only: a `where` inside a string literal or a subquery counts.
pub(crate) fn is_restricted(sql: &str) -> bool {
    // Padding lets a clause at either end still match on word boundaries.
    let normalized = format!(" {} ", normalize_sql(sql));
    normalized.contains(" where ") || normalized.contains(" limit ")
}

#[derive(Debug)]
pub struct BlockFullTableModify {
    signatures: [Signature; 1],
}

impl BlockFullTableModify {
    pub fn new() -> Self {
        Self {
            signatures: [signatures::EXECUTOR_UPDATE],
        }
    }
}

impl Default for BlockFullTableModify {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for BlockFullTableModify {
    fn name(&self) -> &'static str {
        "block_full_table_modify"
    }

    fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    fn intercept(&self, invocation: Invocation<'_>) -> Result<Outcome, ExecutorError> {
        if invocation.target().is_decorator() {
            return invocation.proceed();
        }

        let Some(statement) = invocation.statement() else {
            return invocation.proceed();
        };
        if !matches!(
            statement.command(),
            SqlCommandType::Update | SqlCommandType::Delete
        ) {
            debug!(
                statement_id = statement.id(),
                command = %statement.command(),
                "Not an UPDATE/DELETE; guard skipped"
            );
            return invocation.proceed();
        }

        if !is_restricted(statement.sql()) {
            counter!(METRIC_POLICY_VIOLATION).increment(1);
            warn!(
                statement_id = statement.id(),
                command = %statement.command(),
                sql = statement.sql(),
                "Blocked full-table modification"
            );
            return Err(ExecutorError::PolicyViolation {
                statement_id: statement.id().to_string(),
                command: statement.command(),
                sql: statement.sql().to_string(),
            });
        }

        invocation.proceed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrestricted_update_is_flagged() {
        assert!(!is_restricted("UPDATE t_user SET username='x'"));
        assert!(!is_restricted("delete from t_user"));
    }

    #[test]
    fn where_or_limit_restricts() {
        assert!(is_restricted("UPDATE t_user SET username='x' WHERE id=1"));
        assert!(is_restricted("DELETE FROM t_user LIMIT 10"));
        assert!(is_restricted("update t_user\n\tset username = 'kubo'\nwhere\n id = 1"));
    }

    #[test]
    fn comments_do_not_count_as_clauses() {
        assert!(!is_restricted("update t_user set username = 'x' /* where id = 1 */"));
        assert!(!is_restricted("update t_user set username = 'x' -- where id = 1"));
        assert!(!is_restricted("update t_user set username = 'x'\n# where id = 1\n"));
    }

    #[test]
    fn normalization_collapses_and_lowercases() {
        assert_eq!(
            normalize_sql("  UPDATE   t_user /* c */\n SET a = 1  "),
            "update t_user set a = 1"
        );
    }

    #[test]
    fn default_guard_watches_executor_updates() {
        let guard = BlockFullTableModify::default();
        assert_eq!(guard.signatures(), &[signatures::EXECUTOR_UPDATE]);
    }

    #[test]
    fn literal_where_is_a_known_false_negative() {
        assert!(is_restricted("update t_note set body = 'see where it goes'"));
    }
}
