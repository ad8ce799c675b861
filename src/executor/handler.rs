//! Statement, parameter and result-set handlers and their plugged forms.

use std::sync::Arc;

use tracing::trace;

use crate::{
    mapping::{BoundSql, MappedStatement, Row, RowBounds},
    plugin::{Args, Invocation, Method, Node, NodeKind, Outcome, Plugin},
};

use super::{Connection, ExecutorError, PreparedStatement};

pub trait StatementHandler: Node + Send {
    fn mapped_statement(&self) -> &Arc<MappedStatement>;

    fn prepare(
        &mut self,
        connection: &mut dyn Connection,
    ) -> Result<PreparedStatement, ExecutorError>;

    fn parameterize(&mut self, statement: &mut PreparedStatement) -> Result<(), ExecutorError>;

    fn query(
        &mut self,
        connection: &mut dyn Connection,
        statement: &PreparedStatement,
    ) -> Result<Vec<Row>, ExecutorError>;

    fn update(
        &mut self,
        connection: &mut dyn Connection,
        statement: &PreparedStatement,
    ) -> Result<u64, ExecutorError>;
}

pub trait ParameterHandler: Node + Send {
    fn set_parameters(&mut self, statement: &mut PreparedStatement) -> Result<(), ExecutorError>;
}

pub trait ResultSetHandler: Node + Send {
    fn mapped_statement(&self) -> &Arc<MappedStatement>;

    fn handle_result_sets(&mut self, rows: Vec<Row>) -> Result<Vec<Row>, ExecutorError>;
}

/// Binds the resolved parameter values onto the prepared statement.
#[derive(Debug)]
pub struct DefaultParameterHandler {
    bound: BoundSql,
}

impl DefaultParameterHandler {
    pub fn new(bound: BoundSql) -> Self {
        Self { bound }
    }
}

impl Node for DefaultParameterHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::DefaultParameterHandler
    }
}

impl ParameterHandler for DefaultParameterHandler {
    fn set_parameters(&mut self, statement: &mut PreparedStatement) -> Result<(), ExecutorError> {
        let values = self.bound.values();
        let expected = statement.placeholder_count();
        if values.len() != expected {
            return Err(super::DataAccessError::execution(
                statement.statement_id(),
                format!("{} values for {expected} placeholders", values.len()),
            )
            .into());
        }
        trace!(
            statement_id = statement.statement_id(),
            count = values.len(),
            "Bound parameters"
        );
        statement.bind(values);
        Ok(())
    }
}

/// Applies row bounds to the rows a connection returned.
#[derive(Debug)]
pub struct DefaultResultSetHandler {
    statement: Arc<MappedStatement>,
    bounds: RowBounds,
}

impl DefaultResultSetHandler {
    pub fn new(statement: Arc<MappedStatement>, bounds: RowBounds) -> Self {
        Self { statement, bounds }
    }
}

impl Node for DefaultResultSetHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::DefaultResultSetHandler
    }
}

impl ResultSetHandler for DefaultResultSetHandler {
    fn mapped_statement(&self) -> &Arc<MappedStatement> {
        &self.statement
    }

    fn handle_result_sets(&mut self, rows: Vec<Row>) -> Result<Vec<Row>, ExecutorError> {
        Ok(self.bounds.apply(rows))
    }
}

/// The concrete handler: prepares, binds and runs one statement.
pub struct PreparedStatementHandler {
    statement: Arc<MappedStatement>,
    bound: BoundSql,
    parameter_handler: Box<dyn ParameterHandler>,
    result_set_handler: Box<dyn ResultSetHandler>,
}

impl PreparedStatementHandler {
    pub fn new(
        statement: Arc<MappedStatement>,
        bound: BoundSql,
        parameter_handler: Box<dyn ParameterHandler>,
        result_set_handler: Box<dyn ResultSetHandler>,
    ) -> Self {
        Self {
            statement,
            bound,
            parameter_handler,
            result_set_handler,
        }
    }
}

impl Node for PreparedStatementHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::PreparedStatementHandler
    }
}

impl StatementHandler for PreparedStatementHandler {
    fn mapped_statement(&self) -> &Arc<MappedStatement> {
        &self.statement
    }

    fn prepare(
        &mut self,
        connection: &mut dyn Connection,
    ) -> Result<PreparedStatement, ExecutorError> {
        let prepared = PreparedStatement::new(
            self.statement.id(),
            self.statement.command(),
            self.bound.sql.clone(),
        );
        connection.prepare(&prepared)?;
        Ok(prepared)
    }

    fn parameterize(&mut self, statement: &mut PreparedStatement) -> Result<(), ExecutorError> {
        self.parameter_handler.set_parameters(statement)
    }

    fn query(
        &mut self,
        connection: &mut dyn Connection,
        statement: &PreparedStatement,
    ) -> Result<Vec<Row>, ExecutorError> {
        let rows = connection.query(statement)?;
        self.result_set_handler.handle_result_sets(rows)
    }

    fn update(
        &mut self,
        connection: &mut dyn Connection,
        statement: &PreparedStatement,
    ) -> Result<u64, ExecutorError> {
        Ok(connection.execute(statement)?)
    }
}

/// Decorator that picks the concrete handler for a statement.
///
/// Only prepared statements exist, so routing always lands on
/// [`PreparedStatementHandler`].
pub struct RoutingStatementHandler {
    delegate: Box<dyn StatementHandler>,
}

impl RoutingStatementHandler {
    pub fn new(delegate: Box<dyn StatementHandler>) -> Self {
        Self { delegate }
    }
}

impl Node for RoutingStatementHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::RoutingStatementHandler
    }
}

impl StatementHandler for RoutingStatementHandler {
    fn mapped_statement(&self) -> &Arc<MappedStatement> {
        self.delegate.mapped_statement()
    }

    fn prepare(
        &mut self,
        connection: &mut dyn Connection,
    ) -> Result<PreparedStatement, ExecutorError> {
        self.delegate.prepare(connection)
    }

    fn parameterize(&mut self, statement: &mut PreparedStatement) -> Result<(), ExecutorError> {
        self.delegate.parameterize(statement)
    }

    fn query(
        &mut self,
        connection: &mut dyn Connection,
        statement: &PreparedStatement,
    ) -> Result<Vec<Row>, ExecutorError> {
        self.delegate.query(connection, statement)
    }

    fn update(
        &mut self,
        connection: &mut dyn Connection,
        statement: &PreparedStatement,
    ) -> Result<u64, ExecutorError> {
        self.delegate.update(connection, statement)
    }
}

impl<S: StatementHandler> StatementHandler for Plugin<S> {
    fn mapped_statement(&self) -> &Arc<MappedStatement> {
        self.target.mapped_statement()
    }

    fn prepare(
        &mut self,
        connection: &mut dyn Connection,
    ) -> Result<PreparedStatement, ExecutorError> {
        if self.interceptors.is_empty() {
            return self.target.prepare(connection);
        }
        let kind = self.target.kind();
        let statement = Arc::clone(self.target.mapped_statement());
        let Plugin {
            target,
            interceptors,
        } = self;
        Invocation::new(
            kind,
            Method::Prepare,
            Args::Prepare {
                statement: &statement,
            },
            interceptors,
            Box::new(move |args: Args<'_>| match args {
                Args::Prepare { .. } => target.prepare(connection).map(Outcome::Prepared),
                other => Err(mismatch(Method::Prepare, &other)),
            }),
        )
        .proceed()?
        .into_prepared(Method::Prepare)
    }

    fn parameterize(&mut self, statement: &mut PreparedStatement) -> Result<(), ExecutorError> {
        if self.interceptors.is_empty() {
            return self.target.parameterize(statement);
        }
        let kind = self.target.kind();
        let Plugin {
            target,
            interceptors,
        } = self;
        Invocation::new(
            kind,
            Method::Parameterize,
            Args::Parameterize { statement },
            interceptors,
            Box::new(move |args: Args<'_>| match args {
                Args::Parameterize { statement } => {
                    target.parameterize(statement).map(|()| Outcome::Unit)
                }
                other => Err(mismatch(Method::Parameterize, &other)),
            }),
        )
        .proceed()?
        .into_unit(Method::Parameterize)
    }

    fn query(
        &mut self,
        connection: &mut dyn Connection,
        statement: &PreparedStatement,
    ) -> Result<Vec<Row>, ExecutorError> {
        if self.interceptors.is_empty() {
            return self.target.query(connection, statement);
        }
        let kind = self.target.kind();
        let Plugin {
            target,
            interceptors,
        } = self;
        Invocation::new(
            kind,
            Method::Query,
            Args::StatementQuery { statement },
            interceptors,
            Box::new(move |args: Args<'_>| match args {
                Args::StatementQuery { statement } => {
                    target.query(connection, statement).map(Outcome::Rows)
                }
                other => Err(mismatch(Method::Query, &other)),
            }),
        )
        .proceed()?
        .into_rows(Method::Query)
    }

    fn update(
        &mut self,
        connection: &mut dyn Connection,
        statement: &PreparedStatement,
    ) -> Result<u64, ExecutorError> {
        if self.interceptors.is_empty() {
            return self.target.update(connection, statement);
        }
        let kind = self.target.kind();
        let Plugin {
            target,
            interceptors,
        } = self;
        Invocation::new(
            kind,
            Method::Update,
            Args::StatementUpdate { statement },
            interceptors,
            Box::new(move |args: Args<'_>| match args {
                Args::StatementUpdate { statement } => {
                    target.update(connection, statement).map(Outcome::Affected)
                }
                other => Err(mismatch(Method::Update, &other)),
            }),
        )
        .proceed()?
        .into_affected(Method::Update)
    }
}

impl<P: ParameterHandler> ParameterHandler for Plugin<P> {
    fn set_parameters(&mut self, statement: &mut PreparedStatement) -> Result<(), ExecutorError> {
        if self.interceptors.is_empty() {
            return self.target.set_parameters(statement);
        }
        let kind = self.target.kind();
        let Plugin {
            target,
            interceptors,
        } = self;
        Invocation::new(
            kind,
            Method::SetParameters,
            Args::SetParameters { statement },
            interceptors,
            Box::new(move |args: Args<'_>| match args {
                Args::SetParameters { statement } => {
                    target.set_parameters(statement).map(|()| Outcome::Unit)
                }
                other => Err(mismatch(Method::SetParameters, &other)),
            }),
        )
        .proceed()?
        .into_unit(Method::SetParameters)
    }
}

impl<R: ResultSetHandler> ResultSetHandler for Plugin<R> {
    fn mapped_statement(&self) -> &Arc<MappedStatement> {
        self.target.mapped_statement()
    }

    fn handle_result_sets(&mut self, rows: Vec<Row>) -> Result<Vec<Row>, ExecutorError> {
        if self.interceptors.is_empty() {
            return self.target.handle_result_sets(rows);
        }
        let kind = self.target.kind();
        let statement = Arc::clone(self.target.mapped_statement());
        let Plugin {
            target,
            interceptors,
        } = self;
        Invocation::new(
            kind,
            Method::HandleResultSets,
            Args::HandleResultSets {
                statement: &statement,
                rows,
            },
            interceptors,
            Box::new(move |args: Args<'_>| match args {
                Args::HandleResultSets { rows, .. } => {
                    target.handle_result_sets(rows).map(Outcome::Rows)
                }
                other => Err(mismatch(Method::HandleResultSets, &other)),
            }),
        )
        .proceed()?
        .into_rows(Method::HandleResultSets)
    }
}

pub(crate) fn mismatch(method: Method, args: &Args<'_>) -> ExecutorError {
    ExecutorError::SignatureMismatch {
        method,
        expected: "matching arguments",
        actual: args_name(args),
    }
}

fn args_name(args: &Args<'_>) -> &'static str {
    match args {
        Args::ExecutorUpdate { .. } => "executor update arguments",
        Args::ExecutorQuery { .. } => "executor query arguments",
        Args::Commit { .. } => "commit arguments",
        Args::Rollback { .. } => "rollback arguments",
        Args::Close { .. } => "close arguments",
        Args::Prepare { .. } => "prepare arguments",
        Args::Parameterize { .. } => "parameterize arguments",
        Args::StatementQuery { .. } => "statement query arguments",
        Args::StatementUpdate { .. } => "statement update arguments",
        Args::SetParameters { .. } => "set_parameters arguments",
        Args::HandleResultSets { .. } => "result set arguments",
    }
}
