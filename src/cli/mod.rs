//! Command-line interface for the AgentX coding-agent wrapper.
//!
//! This module provides the top-level CLI application structure: the
//! default single-task invocation, session resume, parallel batch mode,
//! configuration inspection, and shell completion generation.
//!
//! # Architecture
//!
//! The CLI is built using `clap`. The default invocation runs one task;
//! subcommands cover the remaining flows:
//! - `agentx [flags] <task-or-dash> [workdir]` - run a single task
//! - `agentx resume <session-id> [flags] <task-or-dash>` - continue a
//!   prior backend conversation
//! - `agentx --parallel` - run a batch read from standard input
//! - `agentx config` - inspect configuration
//! - `agentx generate-completion` - emit shell completion scripts
//!
//! # Examples
//!
//! ```bash
//! # Run a task on the default backend
//! agentx "add error handling to src/parser.rs"
//!
//! # Run a batch with bounded concurrency
//! agentx --parallel --max-workers 4 < tasks.batch
//!
//! # Resume a Claude session
//! agentx resume c-42 --backend claude "now add tests"
//! ```

mod config_args;
mod run_args;
pub mod table;
pub mod ui;

use clap::{Parser, Subcommand};
pub use config_args::ConfigArgs;
pub use run_args::RunArgs;
pub use table::{create_report_table, ReportRow};
pub use ui::{create_batch_spinner, display_task_output, print_error, print_success, print_warning};

/// Main CLI application structure defining the top-level interface.
#[derive(Parser, Debug)]
#[command(name = "agentx")]
#[command(about = "Unified CLI wrapper for AI coding assistants")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// The subcommand to execute, if any
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Single-task and batch arguments
    #[command(flatten)]
    pub run: RunArgs,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resume a prior backend conversation by session id
    Resume {
        /// Session id reported by an earlier run
        session_id: String,

        /// Task execution arguments
        #[command(flatten)]
        run: RunArgs,
    },

    /// Inspect the active configuration
    Config(ConfigArgs),

    /// Generate shell completion scripts
    GenerateCompletion {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Executes the AgentX CLI with parsed arguments.
///
/// This is the main entry point for CLI execution. The returned integer is
/// the process exit code: single-task runs surface the task's exit code,
/// batches surface the report's derived code.
///
/// # Examples
///
/// ```rust
/// use agentx_cli::cli::run;
///
/// # tokio_test::block_on(async {
/// // This would typically be called from main()
/// // let code = run().await?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
///
/// # Errors
///
/// Returns a [`crate::Result`] wrapping any errors encountered during
/// command execution; `main` maps them onto exit codes.
pub async fn run() -> crate::Result<i32> {
    let config_service = std::sync::Arc::new(crate::config::ProductionConfigService::new()?);
    run_with_config(config_service.as_ref()).await
}

/// Run the CLI with a provided configuration service.
///
/// Enables dependency injection of configuration for tests and embedding.
pub async fn run_with_config(config_service: &dyn crate::config::ConfigService) -> crate::Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Resume { session_id, run }) => {
            run.validate()
                .map_err(crate::error::AgentXError::invalid_config)?;
            crate::commands::run_command::execute_with_session(run, Some(session_id), config_service)
                .await
        }
        Some(Commands::Config(args)) => crate::commands::config_command::execute(args, config_service),
        Some(Commands::GenerateCompletion { shell }) => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            let cmd_name = cmd.get_name().to_string();
            let mut stdout = std::io::stdout();
            clap_complete::generate(shell, &mut cmd, cmd_name, &mut stdout);
            Ok(0)
        }
        None => {
            cli.run
                .validate()
                .map_err(crate::error::AgentXError::invalid_config)?;
            if cli.run.parallel {
                crate::commands::parallel_command::execute(cli.run, config_service).await
            } else {
                crate::commands::run_command::execute(cli.run, config_service).await
            }
        }
    }
}
