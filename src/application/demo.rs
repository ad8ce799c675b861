//! The cache walkthrough behind `mapperlab demo`.

use tracing::info;

use crate::{
    plugin::{CapturingSink, Observation},
    session::{Session, SessionFactory},
};

use super::{
    error::AppError,
    users::{UserMapper, statements},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoStep {
    pub label: &'static str,
    pub statement_id: &'static str,
    /// Raw executions that reached the data source during this step.
    pub raw_executions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemoReport {
    pub steps: Vec<DemoStep>,
}

impl DemoReport {
    pub fn raw_executions(&self, label: &str) -> Option<usize> {
        self.steps
            .iter()
            .find(|step| step.label == label)
            .map(|step| step.raw_executions)
    }
}

pub const TWO_READS_ONE_SESSION: &str = "findAll twice in one session";
pub const WRITE_IN_NEW_SESSION: &str = "updateOne in a new session";
pub const READ_AFTER_WRITE: &str = "findAll after the write";
pub const READ_FROM_NAMESPACE_CACHE: &str = "findAll in another session";

/// Run the scenario. `capture` must be receiving the cost observer's
/// observations; raw executions are counted from it.
pub fn run_scenario(factory: &SessionFactory, capture: &CapturingSink) -> Result<DemoReport, AppError> {
    let mut report = DemoReport::default();

    step(&mut report, capture, factory, TWO_READS_ONE_SESSION, statements::FIND_ALL, |session| {
        let mut mapper = UserMapper::new(session);
        let first = mapper.find_all()?;
        let second = mapper.find_all()?;
        info!(
            target: "mapperlab::demo",
            first = first.len(),
            second = second.len(),
            same = first == second,
            "Read users twice"
        );
        Ok(())
    })?;

    step(&mut report, capture, factory, WRITE_IN_NEW_SESSION, statements::UPDATE_ONE, |session| {
        let affected = UserMapper::new(session).update_one()?;
        info!(target: "mapperlab::demo", affected, "Renamed user 1");
        Ok(())
    })?;

    for label in [READ_AFTER_WRITE, READ_FROM_NAMESPACE_CACHE] {
        step(&mut report, capture, factory, label, statements::FIND_ALL, |session| {
            let users = UserMapper::new(session).find_all()?;
            info!(target: "mapperlab::demo", users = users.len(), "Read users");
            Ok(())
        })?;
    }

    Ok(report)
}

fn step<F>(
    report: &mut DemoReport,
    capture: &CapturingSink,
    factory: &SessionFactory,
    label: &'static str,
    statement_id: &'static str,
    work: F,
) -> Result<(), AppError>
where
    F: FnOnce(&mut Session) -> Result<(), AppError>,
{
    let before = raw_executions(capture, statement_id);

    let mut session = factory.open_session();
    work(&mut session)?;
    session.commit(false)?;
    session.close()?;

    let raw_executions = raw_executions(capture, statement_id) - before;
    info!(
        target: "mapperlab::demo",
        step = label,
        statement_id,
        raw_executions,
        "Step finished"
    );
    report.steps.push(DemoStep {
        label,
        statement_id,
        raw_executions,
    });
    Ok(())
}

fn raw_executions(capture: &CapturingSink, statement_id: &str) -> usize {
    capture
        .sql_costs()
        .iter()
        .filter(|observation| {
            matches!(observation, Observation::SqlCost { statement_id: id, .. } if id == statement_id)
        })
        .count()
}
