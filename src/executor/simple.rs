use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    mapping::{BoundSql, MappedStatement, Params, Row, RowBounds},
    plugin::{InterceptorChain, Node, NodeKind, Plugin},
};

use super::{
    Connection, DataAccessError, DataSource, DefaultParameterHandler, DefaultResultSetHandler,
    Executor, ExecutorError, PreparedStatementHandler, RoutingStatementHandler, StatementHandler,
};

/// Raw executor: opens a connection on first use and runs each statement
/// through a freshly plugged handler pipeline.
pub struct SimpleExecutor {
    data_source: Arc<dyn DataSource>,
    chain: Arc<InterceptorChain>,
    connection: Option<Box<dyn Connection>>,
    closed: bool,
}

impl SimpleExecutor {
    pub fn new(data_source: Arc<dyn DataSource>, chain: Arc<InterceptorChain>) -> Self {
        Self {
            data_source,
            chain,
            connection: None,
            closed: false,
        }
    }

    fn connection(&mut self) -> Result<&mut dyn Connection, ExecutorError> {
        if self.closed {
            return Err(ExecutorError::SessionClosed);
        }
        if self.connection.is_none() {
            let connection = self.data_source.open()?;
            debug!(data_source = self.data_source.name(), "Opened connection");
            self.connection = Some(connection);
        }
        match self.connection.as_deref_mut() {
            Some(connection) => Ok(connection),
            None => Err(DataAccessError::unavailable("connection was not opened").into()),
        }
    }

    fn statement_handler(
        &self,
        statement: &Arc<MappedStatement>,
        bound: BoundSql,
        bounds: RowBounds,
    ) -> Plugin<RoutingStatementHandler> {
        let parameter_handler = self
            .chain
            .plugin(DefaultParameterHandler::new(bound.clone()));
        let result_set_handler = self
            .chain
            .plugin(DefaultResultSetHandler::new(Arc::clone(statement), bounds));
        let prepared = self.chain.plugin(PreparedStatementHandler::new(
            Arc::clone(statement),
            bound,
            Box::new(parameter_handler),
            Box::new(result_set_handler),
        ));
        self.chain
            .plugin(RoutingStatementHandler::new(Box::new(prepared)))
    }
}

impl Node for SimpleExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::SimpleExecutor
    }
}

impl Executor for SimpleExecutor {
    fn update(
        &mut self,
        statement: &Arc<MappedStatement>,
        params: &Params,
    ) -> Result<u64, ExecutorError> {
        let bound = statement.bound_sql(params)?;
        let mut handler = self.statement_handler(statement, bound, RowBounds::UNBOUNDED);
        let connection = self.connection()?;

        let mut prepared = handler.prepare(connection)?;
        handler.parameterize(&mut prepared)?;
        handler.update(connection, &prepared)
    }

    fn query(
        &mut self,
        statement: &Arc<MappedStatement>,
        params: &Params,
        bounds: RowBounds,
    ) -> Result<Vec<Row>, ExecutorError> {
        let bound = statement.bound_sql(params)?;
        let mut handler = self.statement_handler(statement, bound, bounds);
        let connection = self.connection()?;

        let mut prepared = handler.prepare(connection)?;
        handler.parameterize(&mut prepared)?;
        handler.query(connection, &prepared)
    }

    fn commit(&mut self, required: bool) -> Result<(), ExecutorError> {
        if self.closed {
            return Err(ExecutorError::SessionClosed);
        }
        if let (true, Some(connection)) = (required, self.connection.as_deref_mut()) {
            connection.commit()?;
        }
        Ok(())
    }

    fn rollback(&mut self, required: bool) -> Result<(), ExecutorError> {
        if self.closed {
            return Err(ExecutorError::SessionClosed);
        }
        if let (true, Some(connection)) = (required, self.connection.as_deref_mut()) {
            connection.rollback()?;
        }
        Ok(())
    }

    fn close(&mut self, force_rollback: bool) -> Result<(), ExecutorError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };
        if force_rollback && let Err(err) = connection.rollback() {
            warn!(error = %err, "Rollback on close failed");
            return Err(err.into());
        }
        debug!(data_source = self.data_source.name(), "Released connection");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
