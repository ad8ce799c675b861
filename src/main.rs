use std::{process, sync::Arc};

use mapperlab::{
    application::{bootstrap, demo, error::AppError},
    config,
    infra::{db, http, telemetry},
    plugin::{CapturingSink, FanoutSink, ObservationSink, TracingSink},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(config::ServeArgs::default()));

    telemetry::init(&settings.logging)?;
    settings.report_fallbacks();

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Demo(_) => run_demo(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let data_source = db::connect(&settings.database).await?;
    let factory = bootstrap::session_factory(
        &settings.namespace_cache,
        &settings.plugins,
        data_source,
        Arc::new(TracingSink),
    )?;

    let state = http::HttpState::new(Arc::new(factory));
    http::serve(&settings.server, state).await?;
    Ok(())
}

async fn run_demo(settings: config::Settings) -> Result<(), AppError> {
    let data_source = db::connect(&settings.database).await?;

    // Raw executions are counted from the cost observer, so it stays on here.
    let mut plugins = settings.plugins.clone();
    plugins.sql_cost = true;

    let capture = Arc::new(CapturingSink::new());
    let sink = FanoutSink::new(vec![
        Arc::new(TracingSink) as Arc<dyn ObservationSink>,
        capture.clone() as Arc<dyn ObservationSink>,
    ]);
    let factory =
        bootstrap::session_factory(&settings.namespace_cache, &plugins, data_source, Arc::new(sink))?;

    let report = tokio::task::spawn_blocking(move || demo::run_scenario(&factory, &capture))
        .await
        .map_err(|err| AppError::unexpected(format!("demo worker failed: {err}")))??;

    for step in &report.steps {
        info!(
            target: "mapperlab::demo",
            step = step.label,
            statement_id = step.statement_id,
            raw_executions = step.raw_executions,
            "Demo summary"
        );
    }
    Ok(())
}
