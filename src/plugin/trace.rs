//! Reports every pipeline stage to the observation sink.

use std::sync::Arc;

use tracing::trace;

use crate::executor::ExecutorError;

use super::{
    Interceptor, Invocation, Observation, ObservationSink, Outcome, Signature, StageOutcome,
    signatures,
};

const ALL_STAGES: [Signature; 11] = [
    signatures::EXECUTOR_UPDATE,
    signatures::EXECUTOR_QUERY,
    signatures::EXECUTOR_COMMIT,
    signatures::EXECUTOR_ROLLBACK,
    signatures::EXECUTOR_CLOSE,
    signatures::STATEMENT_PREPARE,
    signatures::STATEMENT_PARAMETERIZE,
    signatures::STATEMENT_QUERY,
    signatures::STATEMENT_UPDATE,
    signatures::PARAMETER_SET,
    signatures::RESULT_SET_HANDLE,
];

pub struct FullFlowTrace {
    sink: Arc<dyn ObservationSink>,
}

impl FullFlowTrace {
    pub fn new(sink: Arc<dyn ObservationSink>) -> Self {
        Self { sink }
    }
}

impl Interceptor for FullFlowTrace {
    fn name(&self) -> &'static str {
        "trace"
    }

    fn signatures(&self) -> &[Signature] {
        &ALL_STAGES
    }

    fn intercept(&self, invocation: Invocation<'_>) -> Result<Outcome, ExecutorError> {
        let node = invocation.target();
        let method = invocation.method();
        if node.is_decorator() {
            trace!(node = %node, method = %method, statement_id = ?invocation.statement_id(), "Decorator pass-through");
            return invocation.proceed();
        }

        let statement_id = invocation.statement_id().map(str::to_string);
        let result = invocation.proceed();

        let outcome = match &result {
            Ok(Outcome::Rows(rows)) => StageOutcome::Rows(rows.len()),
            Ok(Outcome::Affected(count)) => StageOutcome::Affected(*count),
            Ok(Outcome::Prepared(_) | Outcome::Unit) => StageOutcome::Completed,
            Err(err) => StageOutcome::Failed(err.to_string()),
        };
        self.sink.observe(Observation::Stage {
            node,
            method,
            statement_id,
            outcome,
        });

        result
    }
}
