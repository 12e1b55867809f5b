// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Scoped logger handed to every context
//!
//! Output goes through `tracing`; the subscriber installed by the binary
//! decides where it ends up.

use std::fmt::Display;

/// A logger scoped to a path in the task tree, e.g. `Default/Build/run "cargo build"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Logger {
    scope: String,
}

impl Logger {
    /// Logger for the root of a run
    pub fn root(name: impl Into<String>) -> Self {
        Self { scope: name.into() }
    }

    /// Child logger for a nested scope. Empty names keep the current scope.
    pub fn named(&self, name: &str) -> Self {
        let scope = match (self.scope.is_empty(), name.is_empty()) {
            (_, true) => self.scope.clone(),
            (true, false) => name.to_string(),
            (false, false) => format!("{}/{}", self.scope, name),
        };
        Self { scope }
    }

    /// Full scope path
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Informational output
    pub fn print(&self, message: impl Display) {
        tracing::info!(task = %self.scope, "{}", message);
    }

    /// Error output
    pub fn error(&self, message: impl Display) {
        tracing::error!(task = %self.scope, "{}", message);
    }

    /// Debug output, hidden unless the filter enables it
    pub fn debug(&self, message: impl Display) {
        tracing::debug!(task = %self.scope, "{}", message);
    }
}
