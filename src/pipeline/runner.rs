// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Pipeline runner
//!
//! Sets up the shared state of a run, executes the root task and tears the
//! run's temp directory down again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RunConfig;
use crate::context::{GlobalContext, Logger};
use crate::errors::{CitreeResult, TaskError};
use crate::pipeline::Pipeline;
use crate::task::Task;

/// Outcome of a whole pipeline run
#[derive(Debug)]
pub struct RunResult {
    /// Executed tree, with final statuses
    pub task: Task,
    /// Wall-clock time of the run
    pub duration: Duration,
    /// Failure returned by the root task
    pub error: Option<TaskError>,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs pipelines with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct PipelineRunner {
    config: RunConfig,
}

impl PipelineRunner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Create the shared state for one run
    pub fn global_context(&self) -> CitreeResult<Arc<GlobalContext>> {
        GlobalContext::new(&self.config.script_dir, &self.config.temp_prefix)
    }

    /// Run a pipeline to completion.
    ///
    /// Only setup problems are returned as errors; a failing task is
    /// reported through [`RunResult::error`] so the tree can still be shown.
    pub async fn run(&self, pipeline: &Pipeline) -> CitreeResult<RunResult> {
        let global = self.global_context()?;
        let task = pipeline.task();
        Ok(self.run_task(task, &global).await)
    }

    /// Run an already built tree against `global`, then clean up its temp root
    pub async fn run_task(&self, task: Task, global: &Arc<GlobalContext>) -> RunResult {
        let start = Instant::now();
        let mut context = global.root_context(self.config.root_environment(), Logger::default());

        tracing::info!(pipeline = %task.name(), "starting run");
        let result = task.run(&mut context).await;
        let duration = start.elapsed();

        match &result {
            Ok(()) => tracing::info!(
                pipeline = %task.name(),
                "run succeeded in {:.2}s",
                duration.as_secs_f64()
            ),
            Err(e) => tracing::error!(
                pipeline = %task.name(),
                failed_task = %e.root_cause().task(),
                "run failed after {:.2}s",
                duration.as_secs_f64()
            ),
        }

        if let Err(e) = global.cleanup() {
            tracing::warn!("{}", e);
        }

        RunResult {
            task,
            duration,
            error: result.err(),
        }
    }
}
