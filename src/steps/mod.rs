// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Built-in steps
//!
//! Every step attaches one subtask named after what it does, e.g.
//! `run "cargo build"` or `when CI == "true"`, so the report reads like the
//! pipeline definition.

mod env;
mod files;
mod run;

pub use env::{ChangeDir, CreateTempDir, SetEnv, WhenEnv, WhenEnvSet, WithTempDir};
pub use files::{CopyFiles, RemoveFiles};
pub use run::Run;

/// Where a step publishes a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The caller's context: visible to later siblings and their subtrees
    Local,
    /// The run's global variables: visible from every branch
    Global,
}
