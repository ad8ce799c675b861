//! Structured observations emitted by the observing interceptors.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tracing::{info, warn};

use super::{Method, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Rows(usize),
    Affected(u64),
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Timing of one raw execution.
    SqlCost {
        statement_id: String,
        sql: String,
        elapsed: Duration,
        threshold: Duration,
        slow: bool,
        succeeded: bool,
    },
    /// One pipeline stage call.
    Stage {
        node: NodeKind,
        method: Method,
        statement_id: Option<String>,
        outcome: StageOutcome,
    },
}

pub trait ObservationSink: Send + Sync {
    fn observe(&self, observation: Observation);
}

/// Writes observations as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ObservationSink for TracingSink {
    fn observe(&self, observation: Observation) {
        match observation {
            Observation::SqlCost {
                statement_id,
                sql,
                elapsed,
                threshold,
                slow: true,
                succeeded,
            } => warn!(
                target: "mapperlab::plugin::sql_cost",
                statement_id,
                sql,
                cost_ms = elapsed.as_millis() as u64,
                threshold_ms = threshold.as_millis() as u64,
                succeeded,
                "Slow SQL"
            ),
            Observation::SqlCost {
                statement_id,
                sql,
                elapsed,
                succeeded,
                ..
            } => info!(
                target: "mapperlab::plugin::sql_cost",
                statement_id,
                sql,
                cost_ms = elapsed.as_millis() as u64,
                succeeded,
                "SQL executed"
            ),
            Observation::Stage {
                node,
                method,
                statement_id,
                outcome,
            } => info!(
                target: "mapperlab::plugin::trace",
                node = %node,
                method = %method,
                statement_id = statement_id.as_deref().unwrap_or("-"),
                outcome = ?outcome,
                "Pipeline stage"
            ),
        }
    }
}

/// Hands each observation to every inner sink in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ObservationSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn ObservationSink>>) -> Self {
        Self { sinks }
    }
}

impl ObservationSink for FanoutSink {
    fn observe(&self, observation: Observation) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.observe(observation.clone());
            }
            last.observe(observation);
        }
    }
}

/// Keeps every observation in memory.
#[derive(Debug, Default)]
pub struct CapturingSink {
    observations: Mutex<Vec<Observation>>,
}

impl CapturingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn sql_costs(&self) -> Vec<Observation> {
        self.observations()
            .into_iter()
            .filter(|o| matches!(o, Observation::SqlCost { .. }))
            .collect()
    }

    /// Stage observations as `(node, method)` pairs in call order.
    pub fn stages(&self) -> Vec<(NodeKind, Method)> {
        self.observations()
            .into_iter()
            .filter_map(|o| match o {
                Observation::Stage { node, method, .. } => Some((node, method)),
                Observation::SqlCost { .. } => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ObservationSink for CapturingSink {
    fn observe(&self, observation: Observation) {
        self.observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fanout_reaches_every_sink() {
        let first = Arc::new(CapturingSink::new());
        let second = Arc::new(CapturingSink::new());
        let fanout = FanoutSink::new(vec![
            first.clone() as Arc<dyn ObservationSink>,
            second.clone() as Arc<dyn ObservationSink>,
        ]);

        fanout.observe(Observation::Stage {
            node: NodeKind::SimpleExecutor,
            method: Method::Query,
            statement_id: Some("UserMapper.findAll".to_string()),
            outcome: StageOutcome::Rows(3),
        });

        assert_eq!(first.stages(), vec![(NodeKind::SimpleExecutor, Method::Query)]);
        assert_eq!(second.observations(), first.observations());
    }
}
