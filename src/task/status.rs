// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Task status bookkeeping

use serde::Serialize;
use std::time::{Duration, Instant};

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    #[default]
    Pending,
    Running,
    Skipped,
    Errored,
    Done,
}

impl TaskState {
    /// One-character code used in reports
    pub fn code(self) -> char {
        match self {
            Self::Pending => ' ',
            Self::Running => 'R',
            Self::Skipped => 'S',
            Self::Errored => 'E',
            Self::Done => '+',
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Skipped | Self::Errored | Self::Done)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Skipped => write!(f, "skipped"),
            Self::Errored => write!(f, "errored"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Snapshot of a task's progress.
///
/// A task goes Pending → Running → one of Skipped, Errored or Done, and
/// never leaves a terminal state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStatus {
    pub started: Option<Instant>,
    pub finished: Option<Instant>,
    pub state: TaskState,
    /// Failure message when Errored
    pub error: Option<String>,
}

impl TaskStatus {
    /// Mark as running. Has no effect unless the task is still pending.
    pub fn start(&mut self) {
        if self.state == TaskState::Pending {
            self.state = TaskState::Running;
            self.started = Some(Instant::now());
        }
    }

    /// Move a running task into a terminal state and stamp the finish time.
    /// Returns false when the task was not running.
    pub fn finish(&mut self, state: TaskState, error: Option<String>) -> bool {
        debug_assert!(state.is_terminal());
        if self.state != TaskState::Running {
            return false;
        }
        self.state = state;
        self.error = error;
        self.finished = Some(Instant::now());
        true
    }

    /// Time spent so far (running) or in total (finished); `None` while pending
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        let started = self.started?;
        let end = self.finished.unwrap_or(now);
        Some(end.saturating_duration_since(started))
    }
}
