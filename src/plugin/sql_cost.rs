//! Times raw executions and flags slow SQL.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use metrics::{counter, histogram};
use tracing::warn;

use crate::executor::ExecutorError;

use super::{
    Interceptor, Invocation, Observation, ObservationSink, Outcome, Properties, Signature,
    signatures,
};

pub(crate) const METRIC_SQL_COST_MS: &str = "mapperlab_sql_cost_ms";
pub(crate) const METRIC_SQL_SLOW: &str = "mapperlab_sql_slow_total";

pub const SLOW_SQL_THRESHOLD_PROPERTY: &str = "slowSqlThresholdMs";
pub const DEFAULT_SLOW_SQL_THRESHOLD: Duration = Duration::from_millis(100);

pub(crate) fn is_slow(elapsed: Duration, threshold: Duration) -> bool {
    elapsed >= threshold
}

/// Parse a millisecond threshold, falling back to the default on bad input.
pub(crate) fn parse_threshold(raw: &str) -> Duration {
    match raw.trim().parse::<u64>() {
        Ok(ms) => Duration::from_millis(ms),
        Err(err) => {
            warn!(
                property = SLOW_SQL_THRESHOLD_PROPERTY,
                value = raw,
                error = %err,
                default_ms = DEFAULT_SLOW_SQL_THRESHOLD.as_millis() as u64,
                "Invalid slow SQL threshold; using default"
            );
            DEFAULT_SLOW_SQL_THRESHOLD
        }
    }
}

pub struct SqlCost {
    threshold: Duration,
    sink: Arc<dyn ObservationSink>,
    signatures: [Signature; 2],
}

impl SqlCost {
    pub fn new(sink: Arc<dyn ObservationSink>) -> Self {
        Self {
            threshold: DEFAULT_SLOW_SQL_THRESHOLD,
            sink,
            signatures: [signatures::EXECUTOR_UPDATE, signatures::EXECUTOR_QUERY],
        }
    }

    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }
}

impl Interceptor for SqlCost {
    fn name(&self) -> &'static str {
        "sql_cost"
    }

    fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    fn intercept(&self, invocation: Invocation<'_>) -> Result<Outcome, ExecutorError> {
        // The caching decorator may answer from cache; only the raw layer runs SQL.
        if invocation.target().is_decorator() {
            return invocation.proceed();
        }

        let statement_id = invocation.statement_id().unwrap_or_default().to_string();
        let sql = invocation.args().sql().unwrap_or_default().to_string();

        let started = Instant::now();
        let result = invocation.proceed();
        let elapsed = started.elapsed();

        let slow = is_slow(elapsed, self.threshold);
        histogram!(METRIC_SQL_COST_MS, "statement_id" => statement_id.clone())
            .record(elapsed.as_secs_f64() * 1000.0);
        if slow {
            counter!(METRIC_SQL_SLOW, "statement_id" => statement_id.clone()).increment(1);
        }

        self.sink.observe(Observation::SqlCost {
            statement_id,
            sql,
            elapsed,
            threshold: self.threshold,
            slow,
            succeeded: result.is_ok(),
        });

        result
    }

    fn set_properties(&mut self, properties: &Properties) {
        if let Some(raw) = properties.get(SLOW_SQL_THRESHOLD_PROPERTY) {
            self.threshold = parse_threshold(raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::CapturingSink;

    #[test]
    fn threshold_is_inclusive() {
        let threshold = Duration::from_millis(100);
        assert!(is_slow(Duration::from_millis(100), threshold));
        assert!(is_slow(Duration::from_millis(250), threshold));
        assert!(!is_slow(Duration::from_millis(99), threshold));
    }

    #[test]
    fn properties_override_threshold() {
        let mut interceptor = SqlCost::new(Arc::new(CapturingSink::new()));
        let properties =
            Properties::from([(SLOW_SQL_THRESHOLD_PROPERTY.to_string(), "50".to_string())]);
        interceptor.set_properties(&properties);
        assert_eq!(interceptor.threshold(), Duration::from_millis(50));
    }

    #[test]
    fn malformed_threshold_falls_back_to_default() {
        let mut interceptor =
            SqlCost::new(Arc::new(CapturingSink::new())).with_threshold(Duration::from_millis(7));
        let properties =
            Properties::from([(SLOW_SQL_THRESHOLD_PROPERTY.to_string(), "fast".to_string())]);
        interceptor.set_properties(&properties);
        assert_eq!(interceptor.threshold(), DEFAULT_SLOW_SQL_THRESHOLD);
    }

    #[test]
    fn missing_property_keeps_current_threshold() {
        let mut interceptor =
            SqlCost::new(Arc::new(CapturingSink::new())).with_threshold(Duration::from_millis(7));
        interceptor.set_properties(&Properties::new());
        assert_eq!(interceptor.threshold(), Duration::from_millis(7));
    }
}
