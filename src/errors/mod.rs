// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Error types
//!
//! `CitreeError` covers everything a step or the runner can fail with.
//! `TaskError` wraps those failures with the name of the task tree node
//! they happened in, so a failed run always points at a node.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for citree operations
pub type CitreeResult<T> = Result<T, CitreeError>;

/// Main error type for citree
#[derive(Error, Debug, Diagnostic)]
pub enum CitreeError {
    // ─────────────────────────────────────────────────────────────────────────
    // Environment Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Undefined environment variable(s): {}", .names.join(", "))]
    #[diagnostic(
        code(citree::undefined_variables),
        help("Define them with a set_env step, in .citree.toml or in the calling shell")
    )]
    UndefinedVariables {
        /// Every name that was referenced but not defined
        names: Vec<String>,
        /// Expansion with defined names substituted, missing ones left verbatim
        partial: String,
    },

    #[error("Glob '{pattern}' is outside of the allowed directories")]
    #[diagnostic(
        code(citree::glob_outside_root),
        help("Globs must resolve inside the script directory or the run's temp directory")
    )]
    GlobOutsideRoot { pattern: String, prefix: String },

    #[error("Glob '{pattern}' matches the root directory {}", .root.display())]
    #[diagnostic(
        code(citree::glob_matches_root),
        help("Use a pattern below the directory, e.g. '{pattern}/*'")
    )]
    GlobMatchesRoot { pattern: String, root: PathBuf },

    #[error("Directory not found: {path}")]
    #[diagnostic(code(citree::directory_not_found))]
    DirectoryNotFound { path: PathBuf },

    #[error("Failed to create temp directory: {message}")]
    #[diagnostic(code(citree::temp_dir))]
    TempDir { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Process Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Tool '{tool}' not found")]
    #[diagnostic(code(citree::tool_not_found), help("{suggestion}"))]
    ToolNotFound { tool: String, suggestion: String },

    #[error("Command '{command}' {}", describe_exit(*.code))]
    #[diagnostic(code(citree::command_failed))]
    CommandFailed { command: String, code: Option<i32> },

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Did not find pipeline named '{name}'")]
    #[diagnostic(code(citree::pipeline_not_found), help("Available pipelines: {available}"))]
    PipelineNotFound { name: String, available: String },

    #[error("Invalid configuration in '{path}': {message}")]
    #[diagnostic(code(citree::invalid_config))]
    InvalidConfig { path: PathBuf, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(citree::io_error))]
    Io { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(citree::glob_error))]
    GlobPattern { message: String },

    #[error("JSON error: {message}")]
    #[diagnostic(code(citree::json_error))]
    Json { message: String },
}

impl From<std::io::Error> for CitreeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<glob::PatternError> for CitreeError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl From<glob::GlobError> for CitreeError {
    fn from(e: glob::GlobError) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_json::Error> for CitreeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

impl CitreeError {
    /// Create a tool not found error with installation suggestion
    pub fn tool_not_found(tool: &str) -> Self {
        let suggestion = match tool {
            "cargo" | "rustc" => "Install Rust: https://rustup.rs".to_string(),
            "go" => "Install Go: https://go.dev/dl/".to_string(),
            _ => format!("Install {} and ensure it's in the PATH of the step", tool),
        };

        Self::ToolNotFound {
            tool: tool.to_string(),
            suggestion,
        }
    }
}

/// Failure of a node in the task tree
#[derive(Error, Debug, Diagnostic)]
pub enum TaskError {
    /// The node's own action failed
    #[error("Task '{task}' failed: {source}")]
    #[diagnostic(code(citree::task_failed))]
    Failed {
        task: String,
        #[source]
        source: CitreeError,
    },

    /// One or more children of a parallel node failed
    #[error("Task '{task}': {failed} parallel subtask(s) failed, first: {first}")]
    #[diagnostic(code(citree::join_failed))]
    Join {
        task: String,
        failed: usize,
        #[source]
        first: Box<TaskError>,
    },

    /// The node panicked, or a parallel child was cancelled before reporting
    #[error("Task '{task}' did not complete: {message}")]
    #[diagnostic(code(citree::task_aborted))]
    Aborted { task: String, message: String },
}

impl TaskError {
    /// Name of the node that reported this failure
    pub fn task(&self) -> &str {
        match self {
            Self::Failed { task, .. } | Self::Join { task, .. } | Self::Aborted { task, .. } => {
                task
            }
        }
    }

    /// Follow join failures down to the node that actually failed
    pub fn root_cause(&self) -> &TaskError {
        match self {
            Self::Join { first, .. } => first.root_cause(),
            other => other,
        }
    }
}
