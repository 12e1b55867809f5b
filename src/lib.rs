// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! # citree - task-tree pipeline runner
//!
//! Pipelines are trees of tasks. Each task may run an action, then runs its
//! children one after another or all at once. Every branch of the tree has
//! its own environment and working directory, forked from its parent, and a
//! run-wide global environment is shared by all branches.
//!
//! ## Features
//!
//! - **Scoped environments** - variable changes only reach later siblings
//!   and their subtrees
//! - **Parallel stages** - siblings run concurrently, and all of them finish
//!   even when one fails
//! - **Skips** - conditional steps prune their subtree without failing
//! - **Status report** - one line per task with duration and state
//!
//! ## Quick Start
//!
//! ```bash
//! # Run the default pipeline
//! citree
//!
//! # Show what a pipeline would do
//! citree --plan Release
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod dsl;
pub mod errors;
pub mod pipeline;
pub mod steps;
pub mod task;
pub mod utils;

// Re-export commonly used types
pub use config::RunConfig;
pub use context::{Context, Environment, GlobalContext};
pub use errors::{CitreeError, CitreeResult, TaskError};
pub use pipeline::{Pipeline, PipelineRunner, Pipelines, RunResult, Stage, Step};
pub use task::{Action, Outcome, Task, TaskBuilder, TaskState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
