// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Terminal color utilities

use colored::{ColoredString, Colorize};

use crate::task::TaskState;

/// Turn colors off when `NO_COLOR` is set
pub fn configure() {
    if std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }
}

/// Color used for a task state
pub fn state(state: TaskState, text: &str) -> ColoredString {
    match state {
        TaskState::Pending => text.dimmed(),
        TaskState::Running => text.blue(),
        TaskState::Skipped => text.yellow(),
        TaskState::Errored => text.red(),
        TaskState::Done => text.green(),
    }
}

/// Print a success check
pub fn print_success(msg: &str) {
    eprintln!("{} {}", "✓".green(), msg);
}

/// Print an error cross
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg.bold());
}
