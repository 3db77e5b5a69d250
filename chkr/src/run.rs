use std::path::Path;

use anyhow::Context as _;
use chkr_core::{CancellationToken, HttpClient, Runner};

use crate::cli::{CheckArgs, RunArgs};
use crate::config;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let env = config::merged_env(&args.env).map_err(RunError::InvalidInput)?;
    let endpoints = config::load_endpoints(&args.config, &env)
        .await
        .map_err(RunError::InvalidInput)?;

    let out = output::formatter(args.output);
    out.print_header(&args.config, &endpoints);

    let runner = Runner::new(HttpClient::default());
    let interrupt = tokio::spawn(cancel_on_interrupt(runner.cancellation_token()));
    let summary = runner.run(&endpoints).await;
    interrupt.abort();
    let summary = summary?;

    out.print_summary(&summary).map_err(RunError::RuntimeError)?;

    if let Some(path) = &args.out {
        write_report(path, &summary)
            .await
            .map_err(RunError::RuntimeError)?;
    }

    Ok(ExitCode::from_run(summary.cancelled, summary.has_failures()))
}

pub async fn check(args: CheckArgs) -> Result<ExitCode, RunError> {
    let env = config::merged_env(&args.env).map_err(RunError::InvalidInput)?;
    let endpoints = config::load_endpoints(&args.config, &env)
        .await
        .map_err(RunError::InvalidInput)?;

    println!(
        "config ok: {} ({} endpoints)",
        args.config.display(),
        endpoints.len()
    );
    Ok(ExitCode::Success)
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("interrupt received; cancelling run");
        cancel.cancel();
    }
}

async fn write_report(path: &Path, summary: &chkr_core::RunSummary) -> anyhow::Result<()> {
    let json = output::render_json(summary)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create report dir: {}", parent.display()))?;
    }
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write report: {}", path.display()))
}
