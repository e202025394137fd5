//! Parallel command: parse the batch grammar from standard input, run it
//! through the scheduler, and render the batch report.

use crate::cli::{table, ui, RunArgs};
use crate::config::{ConfigService, EnvironmentProvider, SystemEnvironmentProvider};
use crate::core::batch;
use crate::core::parallel::{BatchReport, TaskScheduler, TaskState};
use crate::core::runner::ProcessExecutor;
use crate::core::tasklog;
use crate::error::AgentXError;
use crate::Result;
use colored::*;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Execute a parallel batch.
pub async fn execute(args: RunArgs, config_service: &dyn ConfigService) -> Result<i32> {
    let mut config = config_service.get_config()?;
    if let Some(timeout) = args.timeout {
        config.general.timeout_ms = timeout;
    }
    if let Some(workers) = args.max_workers {
        config.general.max_parallel_workers = workers;
    }
    if args.fail_fast {
        config.general.fail_fast = true;
    }
    if args.skip_permissions {
        config.general.skip_permissions = true;
    }

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .map_err(AgentXError::Io)?;
    let tasks = batch::parse(&input)?;
    if tasks.is_empty() {
        ui::print_warning("batch input contained no tasks");
        return Ok(0);
    }

    let run_root = tasklog::run_root(&config);
    let env_provider = SystemEnvironmentProvider::new();
    let external_worktree = env_provider.get_var("AGENTX_WORKTREE").map(PathBuf::from);
    let executor = Arc::new(
        ProcessExecutor::new(config.clone(), run_root).with_external_worktree(external_worktree),
    );
    let scheduler = TaskScheduler::new(
        executor,
        config.general.max_parallel_workers,
        config.general.fail_fast,
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let spinner = ui::create_batch_spinner(tasks.len());
    let report = scheduler.run(tasks, cancel).await?;
    spinner.finish_and_clear();

    display_report(&report);
    Ok(report.exit_code())
}

/// Render the batch report: header counts, the per-task table, and the
/// extracted summaries.
fn display_report(report: &BatchReport) {
    let header = format!(
        "{} total | {} succeeded | {} failed | {} skipped | {} cancelled | {} timed-out",
        report.total,
        report.succeeded.to_string().green(),
        report.failed.to_string().red(),
        report.skipped,
        report.cancelled,
        report.timed_out
    );
    println!("{}", header);
    println!("{}", table::create_report_table(report));

    for result in &report.results {
        let Some(summary) = &result.summary else {
            continue;
        };
        println!("{}", format!("[{}]", result.task_id).bold());
        if !summary.did.is_empty() {
            println!("  Did: {}", summary.did);
        }
        if !summary.files.is_empty() {
            println!("  Files: {}", summary.files);
        }
        if !summary.tests.is_empty() {
            println!("  Tests: {}", summary.tests);
        }
        if !summary.coverage.is_empty() {
            let flag = if summary.coverage_below_threshold {
                " (below-threshold)".yellow().to_string()
            } else {
                String::new()
            };
            println!("  Coverage: {}{}", summary.coverage, flag);
        }
    }

    if report.succeeded == report.total {
        ui::print_success("all tasks succeeded");
    } else if report.results.iter().any(|r| r.state == TaskState::Failed) {
        ui::print_warning("some tasks failed; see their log directories for details");
    }
}
