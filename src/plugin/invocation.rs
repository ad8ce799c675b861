use std::sync::Arc;

use crate::{
    executor::{ExecutorError, PreparedStatement},
    mapping::{MappedStatement, Params, Row, RowBounds},
};

use super::{ArgType, Interceptor, Method, NodeKind};

/// Arguments of an intercepted call, one variant per pipeline method.
///
/// Interceptors may inspect them through [`Invocation::args`] or rewrite them
/// through [`Invocation::args_mut`] before proceeding.
#[derive(Debug)]
pub enum Args<'a> {
    ExecutorUpdate {
        statement: &'a Arc<MappedStatement>,
        params: &'a Params,
    },
    ExecutorQuery {
        statement: &'a Arc<MappedStatement>,
        params: &'a Params,
        bounds: RowBounds,
    },
    Commit {
        required: bool,
    },
    Rollback {
        required: bool,
    },
    Close {
        force_rollback: bool,
    },
    Prepare {
        statement: &'a Arc<MappedStatement>,
    },
    Parameterize {
        statement: &'a mut PreparedStatement,
    },
    StatementQuery {
        statement: &'a PreparedStatement,
    },
    StatementUpdate {
        statement: &'a PreparedStatement,
    },
    SetParameters {
        statement: &'a mut PreparedStatement,
    },
    HandleResultSets {
        statement: &'a Arc<MappedStatement>,
        rows: Vec<Row>,
    },
}

impl Args<'_> {
    /// The declared parameter list of the method these arguments belong to.
    pub fn arg_types(&self) -> &'static [ArgType] {
        match self {
            Self::ExecutorUpdate { .. } => &[ArgType::MappedStatement, ArgType::Params],
            Self::ExecutorQuery { .. } => {
                &[ArgType::MappedStatement, ArgType::Params, ArgType::RowBounds]
            }
            Self::Commit { .. } | Self::Rollback { .. } | Self::Close { .. } => &[ArgType::Bool],
            Self::Prepare { .. } => &[ArgType::Connection],
            Self::Parameterize { .. }
            | Self::StatementQuery { .. }
            | Self::StatementUpdate { .. }
            | Self::SetParameters { .. } => &[ArgType::PreparedStatement],
            Self::HandleResultSets { .. } => &[ArgType::ResultSet],
        }
    }

    pub fn statement(&self) -> Option<&MappedStatement> {
        match self {
            Self::ExecutorUpdate { statement, .. }
            | Self::ExecutorQuery { statement, .. }
            | Self::Prepare { statement, .. }
            | Self::HandleResultSets { statement, .. } => Some(Arc::as_ref(statement)),
            _ => None,
        }
    }

    pub fn prepared(&self) -> Option<&PreparedStatement> {
        match self {
            Self::Parameterize { statement } | Self::SetParameters { statement } => {
                Some(&**statement)
            }
            Self::StatementQuery { statement } | Self::StatementUpdate { statement } => {
                Some(*statement)
            }
            _ => None,
        }
    }

    pub fn statement_id(&self) -> Option<&str> {
        self.statement()
            .map(MappedStatement::id)
            .or_else(|| self.prepared().map(PreparedStatement::statement_id))
    }

    /// SQL with positional placeholders, when the call carries a statement.
    pub fn sql(&self) -> Option<&str> {
        self.statement()
            .map(MappedStatement::sql)
            .or_else(|| self.prepared().map(PreparedStatement::sql))
    }
}

/// Result of an intercepted call.
#[derive(Debug)]
pub enum Outcome {
    Rows(Vec<Row>),
    Affected(u64),
    Prepared(PreparedStatement),
    Unit,
}

impl Outcome {
    fn variant(&self) -> &'static str {
        match self {
            Self::Rows(_) => "rows",
            Self::Affected(_) => "affected",
            Self::Prepared(_) => "prepared",
            Self::Unit => "unit",
        }
    }

    pub fn into_rows(self, method: Method) -> Result<Vec<Row>, ExecutorError> {
        match self {
            Self::Rows(rows) => Ok(rows),
            other => Err(ExecutorError::outcome_mismatch(method, "rows", other.variant())),
        }
    }

    pub fn into_affected(self, method: Method) -> Result<u64, ExecutorError> {
        match self {
            Self::Affected(count) => Ok(count),
            other => Err(ExecutorError::outcome_mismatch(
                method,
                "affected",
                other.variant(),
            )),
        }
    }

    pub fn into_prepared(self, method: Method) -> Result<PreparedStatement, ExecutorError> {
        match self {
            Self::Prepared(statement) => Ok(statement),
            other => Err(ExecutorError::outcome_mismatch(
                method,
                "prepared",
                other.variant(),
            )),
        }
    }

    pub fn into_unit(self, method: Method) -> Result<(), ExecutorError> {
        match self {
            Self::Unit => Ok(()),
            other => Err(ExecutorError::outcome_mismatch(method, "unit", other.variant())),
        }
    }
}

pub(crate) type Terminal<'a> = Box<dyn FnOnce(Args<'a>) -> Result<Outcome, ExecutorError> + 'a>;

/// One call travelling through the chain.
///
/// `proceed` takes `self`, so the rest of the chain runs at most once per
/// invocation. Dropping an invocation without proceeding short-circuits it.
pub struct Invocation<'a> {
    target: NodeKind,
    method: Method,
    args: Args<'a>,
    chain: &'a [Arc<dyn Interceptor>],
    terminal: Terminal<'a>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        target: NodeKind,
        method: Method,
        args: Args<'a>,
        chain: &'a [Arc<dyn Interceptor>],
        terminal: Terminal<'a>,
    ) -> Self {
        Self {
            target,
            method,
            args,
            chain,
            terminal,
        }
    }

    pub fn target(&self) -> NodeKind {
        self.target
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn args(&self) -> &Args<'a> {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Args<'a> {
        &mut self.args
    }

    pub fn statement(&self) -> Option<&MappedStatement> {
        self.args.statement()
    }

    pub fn statement_id(&self) -> Option<&str> {
        self.args.statement_id()
    }

    /// Hand the call to the next matching interceptor, or to the real method.
    pub fn proceed(self) -> Result<Outcome, ExecutorError> {
        let Self {
            target,
            method,
            args,
            chain,
            terminal,
        } = self;

        let role = target.role();
        let arg_types = args.arg_types();
        let mut rest = chain;
        while let Some((next, tail)) = rest.split_first() {
            if next
                .signatures()
                .iter()
                .any(|signature| signature.matches(role, method, arg_types))
            {
                return next.intercept(Invocation {
                    target,
                    method,
                    args,
                    chain: tail,
                    terminal,
                });
            }
            rest = tail;
        }

        terminal(args)
    }
}

impl std::fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("target", &self.target)
            .field("method", &self.method)
            .field("args", &self.args)
            .field("remaining", &self.chain.len())
            .finish()
    }
}
