//! Command implementations for the AgentX CLI.
//!
//! Each module handles one CLI flow: `run_command` for single tasks and
//! session resumes, `parallel_command` for batches, and `config_command`
//! for configuration inspection.

pub mod config_command;
pub mod parallel_command;
pub mod run_command;
