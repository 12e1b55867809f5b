// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Status report rendering
//!
//! One line per task:
//!
//! ```text
//!    3s [+] Default:
//!    1s [+]     Build:
//!    1s [+]         run "cargo build"
//!    0s [E]     Verification: (parallel)
//! ```

use serde::Serialize;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use super::{Task, TaskState, TaskStatus};

/// Indentation added per nesting level
const INDENT: &str = "    ";

/// Format a duration truncated to whole seconds, e.g. `0s`, `42s`, `1m5s`, `2h0m3s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Render one report line (without the trailing newline)
pub fn format_line(status: &TaskStatus, now: Instant, depth: usize, label: &str) -> String {
    let duration = match status.state {
        TaskState::Pending => String::new(),
        _ => status.elapsed(now).map(format_duration).unwrap_or_default(),
    };

    format!(
        "{:>5} [{}] {}{}",
        duration,
        status.state.code(),
        INDENT.repeat(depth),
        label
    )
}

impl Task {
    /// Label shown for this task; `None` for unnamed inner nodes, which
    /// only contribute their children
    fn label(&self) -> Option<String> {
        if self.tasks.is_empty() {
            return Some(self.name.clone());
        }
        if self.name.is_empty() {
            return None;
        }

        let mut label = format!("{}:", self.name);
        if let Some(description) = &self.description {
            label.push(' ');
            label.push_str(description);
        }
        if self.parallel {
            label.push_str(" (parallel)");
        }
        Some(label)
    }

    /// Write the report for this task and its subtree
    pub fn print_to<W: Write>(&self, w: &mut W, depth: usize) -> io::Result<()> {
        self.print_at(w, Instant::now(), depth)
    }

    fn print_at<W: Write>(&self, w: &mut W, now: Instant, depth: usize) -> io::Result<()> {
        if let Some(label) = self.label() {
            writeln!(w, "{}", format_line(&self.status(), now, depth, &label))?;
        }
        for task in &self.tasks {
            task.print_at(w, now, depth + 1)?;
        }
        Ok(())
    }

    /// Report for this task's children, starting at depth zero
    pub fn report(&self) -> String {
        let now = Instant::now();
        let mut out = Vec::new();
        for task in &self.tasks {
            // writing into a Vec cannot fail
            let _ = task.print_at(&mut out, now, 0);
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

/// Serializable view of a task tree
#[derive(Debug, Clone, Serialize)]
pub struct ReportNode {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parallel: bool,
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<ReportNode>,
}

impl ReportNode {
    pub fn from_task(task: &Task) -> Self {
        Self::at(task, Instant::now())
    }

    fn at(task: &Task, now: Instant) -> Self {
        let status = task.status();
        Self {
            name: task.name.clone(),
            description: task.description.clone(),
            parallel: task.parallel,
            state: status.state,
            duration_ms: status.elapsed(now).map(|d| d.as_millis() as u64),
            error: status.error,
            tasks: task.tasks.iter().map(|t| Self::at(t, now)).collect(),
        }
    }
}
