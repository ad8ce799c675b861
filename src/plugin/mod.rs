//! Interceptor chain around the executor pipeline.
//!
//! Each pipeline node (executor, statement handler, parameter handler, result
//! set handler) is wrapped by [`InterceptorChain::plugin`]. Calls on the wrapped
//! node become an [`Invocation`] that walks the registered interceptors in
//! registration order; the first registered interceptor is the outermost one and
//! the real method runs last.

mod chain;
mod guard;
mod invocation;
mod observe;
mod sql_cost;
mod trace;

use std::{collections::BTreeMap, fmt, sync::Arc};

pub use chain::{InterceptorChain, Plugin};
pub use guard::BlockFullTableModify;
pub use invocation::{Args, Invocation, Outcome};
pub use observe::{CapturingSink, FanoutSink, Observation, ObservationSink, StageOutcome, TracingSink};
pub use sql_cost::{DEFAULT_SLOW_SQL_THRESHOLD, SLOW_SQL_THRESHOLD_PROPERTY, SqlCost};
pub use trace::FullFlowTrace;

use crate::{config::PluginSettings, executor::ExecutorError};

/// String properties injected into an interceptor at registration.
pub type Properties = BTreeMap<String, String>;

/// The four pluggable roles of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetRole {
    Executor,
    StatementHandler,
    ParameterHandler,
    ResultSetHandler,
}

/// Concrete pipeline node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    CachingExecutor,
    SimpleExecutor,
    RoutingStatementHandler,
    PreparedStatementHandler,
    DefaultParameterHandler,
    DefaultResultSetHandler,
}

impl NodeKind {
    pub fn role(self) -> TargetRole {
        match self {
            Self::CachingExecutor | Self::SimpleExecutor => TargetRole::Executor,
            Self::RoutingStatementHandler | Self::PreparedStatementHandler => {
                TargetRole::StatementHandler
            }
            Self::DefaultParameterHandler => TargetRole::ParameterHandler,
            Self::DefaultResultSetHandler => TargetRole::ResultSetHandler,
        }
    }

    /// Decorators delegate to another node of the same role.
    ///
    /// Interceptors that act on statement detail pass through decorators so one
    /// logical call is handled once, on the concrete node.
    pub fn is_decorator(self) -> bool {
        matches!(self, Self::CachingExecutor | Self::RoutingStatementHandler)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CachingExecutor => "CachingExecutor",
            Self::SimpleExecutor => "SimpleExecutor",
            Self::RoutingStatementHandler => "RoutingStatementHandler",
            Self::PreparedStatementHandler => "PreparedStatementHandler",
            Self::DefaultParameterHandler => "DefaultParameterHandler",
            Self::DefaultResultSetHandler => "DefaultResultSetHandler",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline node that can be wrapped by the chain.
pub trait Node {
    fn kind(&self) -> NodeKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Update,
    Query,
    Commit,
    Rollback,
    Close,
    Prepare,
    Parameterize,
    SetParameters,
    HandleResultSets,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Query => "query",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::Close => "close",
            Self::Prepare => "prepare",
            Self::Parameterize => "parameterize",
            Self::SetParameters => "set_parameters",
            Self::HandleResultSets => "handle_result_sets",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameter types of a pipeline method, used to tell overloads apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    MappedStatement,
    Params,
    RowBounds,
    Bool,
    Connection,
    PreparedStatement,
    ResultSet,
}

/// `{role, method, argument types}` an interceptor registers against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    pub role: TargetRole,
    pub method: Method,
    pub args: &'static [ArgType],
}

impl Signature {
    pub const fn new(role: TargetRole, method: Method, args: &'static [ArgType]) -> Self {
        Self { role, method, args }
    }

    pub fn matches(&self, role: TargetRole, method: Method, args: &[ArgType]) -> bool {
        self.role == role && self.method == method && self.args == args
    }
}

/// Canonical signatures of every interceptable method.
pub mod signatures {
    use super::{ArgType, Method, Signature, TargetRole};

    pub const EXECUTOR_UPDATE: Signature = Signature::new(
        TargetRole::Executor,
        Method::Update,
        &[ArgType::MappedStatement, ArgType::Params],
    );
    pub const EXECUTOR_QUERY: Signature = Signature::new(
        TargetRole::Executor,
        Method::Query,
        &[ArgType::MappedStatement, ArgType::Params, ArgType::RowBounds],
    );
    pub const EXECUTOR_COMMIT: Signature =
        Signature::new(TargetRole::Executor, Method::Commit, &[ArgType::Bool]);
    pub const EXECUTOR_ROLLBACK: Signature =
        Signature::new(TargetRole::Executor, Method::Rollback, &[ArgType::Bool]);
    pub const EXECUTOR_CLOSE: Signature =
        Signature::new(TargetRole::Executor, Method::Close, &[ArgType::Bool]);
    pub const STATEMENT_PREPARE: Signature = Signature::new(
        TargetRole::StatementHandler,
        Method::Prepare,
        &[ArgType::Connection],
    );
    pub const STATEMENT_PARAMETERIZE: Signature = Signature::new(
        TargetRole::StatementHandler,
        Method::Parameterize,
        &[ArgType::PreparedStatement],
    );
    pub const STATEMENT_QUERY: Signature = Signature::new(
        TargetRole::StatementHandler,
        Method::Query,
        &[ArgType::PreparedStatement],
    );
    pub const STATEMENT_UPDATE: Signature = Signature::new(
        TargetRole::StatementHandler,
        Method::Update,
        &[ArgType::PreparedStatement],
    );
    pub const PARAMETER_SET: Signature = Signature::new(
        TargetRole::ParameterHandler,
        Method::SetParameters,
        &[ArgType::PreparedStatement],
    );
    pub const RESULT_SET_HANDLE: Signature = Signature::new(
        TargetRole::ResultSetHandler,
        Method::HandleResultSets,
        &[ArgType::ResultSet],
    );
}

pub trait Interceptor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Methods this interceptor wants to see. Anything else passes by it.
    fn signatures(&self) -> &[Signature];

    /// Handle one call. Continue with [`Invocation::proceed`] or return without
    /// calling it to short-circuit the rest of the chain and the real method.
    fn intercept(&self, invocation: Invocation<'_>) -> Result<Outcome, ExecutorError>;

    /// Receives string properties once, before the chain is frozen.
    fn set_properties(&mut self, _properties: &Properties) {}
}

/// Build the chain from configuration: guard, then cost observer, then trace.
pub fn standard_chain(
    settings: &PluginSettings,
    sink: Arc<dyn ObservationSink>,
) -> InterceptorChain {
    let mut chain = InterceptorChain::new();
    if settings.block_full_table_modify {
        chain.add(BlockFullTableModify::new());
    }
    if settings.sql_cost {
        chain.add_with_properties(SqlCost::new(Arc::clone(&sink)), &settings.properties());
    }
    if settings.trace {
        chain.add(FullFlowTrace::new(sink));
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decorators_are_flagged() {
        assert!(NodeKind::CachingExecutor.is_decorator());
        assert!(NodeKind::RoutingStatementHandler.is_decorator());
        assert!(!NodeKind::SimpleExecutor.is_decorator());
        assert!(!NodeKind::PreparedStatementHandler.is_decorator());
    }

    #[test]
    fn signature_requires_exact_argument_list() {
        let query = signatures::EXECUTOR_QUERY;
        assert!(query.matches(
            TargetRole::Executor,
            Method::Query,
            &[ArgType::MappedStatement, ArgType::Params, ArgType::RowBounds]
        ));
        assert!(!query.matches(
            TargetRole::Executor,
            Method::Query,
            &[ArgType::MappedStatement, ArgType::Params]
        ));
        assert!(!query.matches(
            TargetRole::StatementHandler,
            Method::Query,
            &[ArgType::MappedStatement, ArgType::Params, ArgType::RowBounds]
        ));
    }

    #[test]
    fn standard_chain_respects_flags() {
        let sink: Arc<dyn ObservationSink> = Arc::new(CapturingSink::new());
        let all = standard_chain(&PluginSettings::default(), Arc::clone(&sink));
        assert_eq!(all.names(), vec!["block_full_table_modify", "sql_cost", "trace"]);

        let settings = PluginSettings {
            trace: false,
            block_full_table_modify: false,
            ..PluginSettings::default()
        };
        let only_cost = standard_chain(&settings, sink);
        assert_eq!(only_cost.names(), vec!["sql_cost"]);
    }
}
