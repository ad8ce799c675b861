//! Executor pipeline: caching decorator, raw executor and handlers.
//!
//! A read flows `CachingExecutor -> SimpleExecutor -> RoutingStatementHandler ->
//! PreparedStatementHandler -> (ParameterHandler, Connection, ResultSetHandler)`,
//! with every node wrapped by the interceptor chain.

mod caching;
mod datasource;
mod error;
mod handler;
mod simple;

use std::sync::Arc;

pub use caching::CachingExecutor;
pub use datasource::{Connection, DataSource, PreparedStatement};
pub use error::{DataAccessError, ExecutorError};
pub use handler::{
    DefaultParameterHandler, DefaultResultSetHandler, ParameterHandler, PreparedStatementHandler,
    ResultSetHandler, RoutingStatementHandler, StatementHandler,
};
pub use simple::SimpleExecutor;

use crate::{
    mapping::{MappedStatement, Params, Row, RowBounds},
    plugin::{Args, Invocation, Method, Node, Outcome, Plugin},
};

use handler::mismatch;

pub trait Executor: Node + Send {
    fn update(
        &mut self,
        statement: &Arc<MappedStatement>,
        params: &Params,
    ) -> Result<u64, ExecutorError>;

    fn query(
        &mut self,
        statement: &Arc<MappedStatement>,
        params: &Params,
        bounds: RowBounds,
    ) -> Result<Vec<Row>, ExecutorError>;

    fn commit(&mut self, required: bool) -> Result<(), ExecutorError>;

    fn rollback(&mut self, required: bool) -> Result<(), ExecutorError>;

    /// Release the connection, rolling back first when `force_rollback` is set.
    fn close(&mut self, force_rollback: bool) -> Result<(), ExecutorError>;

    fn is_closed(&self) -> bool;
}

impl<E: Executor> Executor for Plugin<E> {
    fn update(
        &mut self,
        statement: &Arc<MappedStatement>,
        params: &Params,
    ) -> Result<u64, ExecutorError> {
        if self.interceptors.is_empty() {
            return self.target.update(statement, params);
        }
        let kind = self.target.kind();
        let Plugin {
            target,
            interceptors,
        } = self;
        Invocation::new(
            kind,
            Method::Update,
            Args::ExecutorUpdate { statement, params },
            interceptors,
            Box::new(move |args: Args<'_>| match args {
                Args::ExecutorUpdate { statement, params } => {
                    target.update(statement, params).map(Outcome::Affected)
                }
                other => Err(mismatch(Method::Update, &other)),
            }),
        )
        .proceed()?
        .into_affected(Method::Update)
    }

    fn query(
        &mut self,
        statement: &Arc<MappedStatement>,
        params: &Params,
        bounds: RowBounds,
    ) -> Result<Vec<Row>, ExecutorError> {
        if self.interceptors.is_empty() {
            return self.target.query(statement, params, bounds);
        }
        let kind = self.target.kind();
        let Plugin {
            target,
            interceptors,
        } = self;
        Invocation::new(
            kind,
            Method::Query,
            Args::ExecutorQuery {
                statement,
                params,
                bounds,
            },
            interceptors,
            Box::new(move |args: Args<'_>| match args {
                Args::ExecutorQuery {
                    statement,
                    params,
                    bounds,
                } => target.query(statement, params, bounds).map(Outcome::Rows),
                other => Err(mismatch(Method::Query, &other)),
            }),
        )
        .proceed()?
        .into_rows(Method::Query)
    }

    fn commit(&mut self, required: bool) -> Result<(), ExecutorError> {
        if self.interceptors.is_empty() {
            return self.target.commit(required);
        }
        let kind = self.target.kind();
        let Plugin {
            target,
            interceptors,
        } = self;
        Invocation::new(
            kind,
            Method::Commit,
            Args::Commit { required },
            interceptors,
            Box::new(move |args: Args<'_>| match args {
                Args::Commit { required } => target.commit(required).map(|()| Outcome::Unit),
                other => Err(mismatch(Method::Commit, &other)),
            }),
        )
        .proceed()?
        .into_unit(Method::Commit)
    }

    fn rollback(&mut self, required: bool) -> Result<(), ExecutorError> {
        if self.interceptors.is_empty() {
            return self.target.rollback(required);
        }
        let kind = self.target.kind();
        let Plugin {
            target,
            interceptors,
        } = self;
        Invocation::new(
            kind,
            Method::Rollback,
            Args::Rollback { required },
            interceptors,
            Box::new(move |args: Args<'_>| match args {
                Args::Rollback { required } => target.rollback(required).map(|()| Outcome::Unit),
                other => Err(mismatch(Method::Rollback, &other)),
            }),
        )
        .proceed()?
        .into_unit(Method::Rollback)
    }

    fn close(&mut self, force_rollback: bool) -> Result<(), ExecutorError> {
        if self.interceptors.is_empty() {
            return self.target.close(force_rollback);
        }
        let kind = self.target.kind();
        let Plugin {
            target,
            interceptors,
        } = self;
        Invocation::new(
            kind,
            Method::Close,
            Args::Close { force_rollback },
            interceptors,
            Box::new(move |args: Args<'_>| match args {
                Args::Close { force_rollback } => {
                    target.close(force_rollback).map(|()| Outcome::Unit)
                }
                other => Err(mismatch(Method::Close, &other)),
            }),
        )
        .proceed()?
        .into_unit(Method::Close)
    }

    fn is_closed(&self) -> bool {
        self.target.is_closed()
    }
}
