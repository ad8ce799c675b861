use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::{MappingError, statement::MappedStatement};

/// Statements and namespace declarations, assembled once at startup.
#[derive(Debug, Default, Clone)]
pub struct StatementRegistry {
    statements: HashMap<String, Arc<MappedStatement>>,
    cached_namespaces: BTreeSet<String>,
}

impl StatementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a namespace; `cached` gives it a namespace-level cache.
    pub fn declare_namespace(&mut self, namespace: &str, cached: bool) {
        if cached {
            self.cached_namespaces.insert(namespace.to_string());
        } else {
            self.cached_namespaces.remove(namespace);
        }
    }

    pub fn register(&mut self, statement: MappedStatement) -> Result<(), MappingError> {
        if self.statements.contains_key(statement.id()) {
            return Err(MappingError::DuplicateStatement {
                id: statement.id().to_string(),
            });
        }
        self.statements
            .insert(statement.id().to_string(), Arc::new(statement));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<MappedStatement>> {
        self.statements.get(id).cloned()
    }

    pub fn cached_namespaces(&self) -> impl Iterator<Item = &str> {
        self.cached_namespaces.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
