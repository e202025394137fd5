//! Core execution engine for AgentX.
//!
//! This module contains the batch grammar parser, the canonical event
//! model, the per-task execution pipeline, the parallel scheduler, skill
//! resolution, worktree provisioning, and the per-task log sinks.

pub mod batch;
pub mod events;
pub mod parallel;
pub mod runner;
pub mod skills;
pub mod tasklog;
pub mod worktree;
