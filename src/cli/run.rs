// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Run command - execute a pipeline and print its report

use miette::Result;
use std::time::Duration;

use super::OutputFormat;
use crate::config::RunConfig;
use crate::errors::CitreeError;
use crate::pipeline::{Pipeline, PipelineRunner};
use crate::task::{format_duration, ReportNode, Task, TaskState};
use crate::utils::colors;

/// Run a pipeline from the current directory
pub async fn run(pipeline: &Pipeline, format: OutputFormat) -> Result<()> {
    colors::configure();

    let cwd = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;
    let config = RunConfig::load(&cwd)?;
    let runner = PipelineRunner::new(config);

    let result = runner.run(pipeline).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&ReportNode::from_task(&result.task))
                .map_err(CitreeError::from)?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!();
            print!("{}", result.task.report());
        }
    }

    let summary = summarize(&result.task, result.duration);
    match result.error {
        None => {
            colors::print_success(&format!("Pipeline '{}' succeeded: {}", pipeline.name, summary));
            Ok(())
        }
        Some(error) => {
            colors::print_error(&format!("Pipeline '{}' failed: {}", pipeline.name, summary));
            Err(error.into())
        }
    }
}

/// Counts of leaf states plus total time, e.g. `3 done, 1 skipped in 12s`
fn summarize(task: &Task, duration: Duration) -> String {
    let mut leaves = Vec::new();
    collect_leaf_states(task, &mut leaves);

    let parts: Vec<String> = [
        TaskState::Done,
        TaskState::Skipped,
        TaskState::Errored,
        TaskState::Pending,
    ]
    .into_iter()
    .filter_map(|state| {
        let count = leaves.iter().filter(|s| **s == state).count();
        (count > 0).then(|| colors::state(state, &format!("{} {}", count, state)).to_string())
    })
    .collect();

    format!("{} in {}", parts.join(", "), format_duration(duration))
}

fn collect_leaf_states(task: &Task, states: &mut Vec<TaskState>) {
    if task.tasks().is_empty() {
        states.push(task.status().state);
    }
    for child in task.tasks() {
        collect_leaf_states(child, states);
    }
}
