// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Task tree and execution engine
//!
//! A pipeline is turned into a tree of tasks with a [`TaskBuilder`], then
//! frozen into a [`Task`]. Running a task:
//!
//! 1. marks it running,
//! 2. forks a subcontext for it,
//! 3. runs its action (if any) with the caller's context and the subcontext,
//! 4. runs its children with the subcontext, one after another or all at
//!    once depending on the parallel flag,
//! 5. records the terminal state.
//!
//! An action can skip its task, which prunes the subtree without failing
//! the parent. Sequential children stop at the first failure; parallel
//! children always all run to completion.

mod report;
mod status;

pub use report::{format_duration, format_line, ReportNode};
pub use status::{TaskState, TaskStatus};

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::context::Context;
use crate::errors::{CitreeError, CitreeResult, TaskError};
use crate::pipeline::Step;

/// Result of a task's own action
#[derive(Debug)]
pub enum Outcome {
    /// Continue with the task's children
    Success,
    /// Stop this task without running its children; not an error
    Skip,
    /// Stop this task and fail its parent
    Failure(CitreeError),
}

impl From<CitreeResult<()>> for Outcome {
    fn from(result: CitreeResult<()>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(e) => Self::Failure(e),
        }
    }
}

/// Work attached to a task
///
/// `context` is the caller's context: changes to it are seen by the
/// following sequential siblings. `subcontext` is this task's own fork,
/// inherited by its children.
#[async_trait]
pub trait Action: Send + Sync {
    async fn exec(&self, context: &mut Context, subcontext: &mut Context) -> Outcome;
}

/// Action backed by a synchronous closure
pub struct FnAction<F>(F);

#[async_trait]
impl<F> Action for FnAction<F>
where
    F: Fn(&mut Context, &mut Context) -> Outcome + Send + Sync,
{
    async fn exec(&self, context: &mut Context, subcontext: &mut Context) -> Outcome {
        (self.0)(context, subcontext)
    }
}

/// Wrap a closure as an [`Action`]
pub fn action_fn<F>(f: F) -> FnAction<F>
where
    F: Fn(&mut Context, &mut Context) -> Outcome + Send + Sync,
{
    FnAction(f)
}

/// Mutable task tree used while attaching steps
pub struct TaskBuilder {
    name: String,
    description: Option<String>,
    parallel: bool,
    action: Option<Box<dyn Action>>,
    tasks: Vec<TaskBuilder>,
}

impl TaskBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parallel: false,
            action: None,
            tasks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    /// Run children concurrently instead of in order
    pub fn set_parallel(&mut self, parallel: bool) -> &mut Self {
        self.parallel = parallel;
        self
    }

    /// Install this node's own action, replacing any previous one
    pub fn set_action(&mut self, action: impl Action + 'static) -> &mut Self {
        self.action = Some(Box::new(action));
        self
    }

    /// Append a child and return it
    pub fn subtask(&mut self, name: impl Into<String>) -> &mut TaskBuilder {
        self.tasks.push(TaskBuilder::new(name));
        let last = self.tasks.len() - 1;
        &mut self.tasks[last]
    }

    /// Let each step attach itself to this node, in order
    pub fn add_steps(&mut self, steps: &[Box<dyn Step>]) -> &mut Self {
        for step in steps {
            step.attach(self);
        }
        self
    }

    pub fn subtasks(&self) -> &[TaskBuilder] {
        &self.tasks
    }

    /// Freeze the tree. Only task status changes after this point.
    pub fn build(self) -> Task {
        Task {
            name: self.name,
            description: self.description,
            parallel: self.parallel,
            action: self.action,
            tasks: self
                .tasks
                .into_iter()
                .map(|task| Arc::new(task.build()))
                .collect(),
            status: Mutex::new(TaskStatus::default()),
        }
    }
}

type TaskFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send + 'a>>;

/// A node of the execution tree
pub struct Task {
    name: String,
    description: Option<String>,
    parallel: bool,
    action: Option<Box<dyn Action>>,
    tasks: Vec<Arc<Task>>,
    status: Mutex<TaskStatus>,
}

enum Completion {
    Done,
    Skipped,
}

impl Task {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }

    pub fn tasks(&self) -> &[Arc<Task>] {
        &self.tasks
    }

    /// Consistent copy of the current status
    pub fn status(&self) -> TaskStatus {
        self.lock_status().clone()
    }

    /// Execute this task and its subtree with `context` as the caller's context.
    ///
    /// A panic in this task's action is caught here and reported as
    /// [`TaskError::Aborted`], so every node on the way up is marked Errored
    /// and the panic never leaves `run`.
    pub fn run<'a>(&'a self, context: &'a mut Context) -> TaskFuture<'a> {
        Box::pin(async move {
            self.lock_status().start();

            let result = match AssertUnwindSafe(self.execute(context)).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(task = %self.name, "{}", message);
                    Err(TaskError::Aborted {
                        task: self.name.clone(),
                        message,
                    })
                }
            };

            let mut status = self.lock_status();
            match &result {
                Ok(Completion::Done) => status.finish(TaskState::Done, None),
                Ok(Completion::Skipped) => status.finish(TaskState::Skipped, None),
                Err(e) => status.finish(TaskState::Errored, Some(e.to_string())),
            };

            result.map(|_| ())
        })
    }

    async fn execute(&self, context: &mut Context) -> Result<Completion, TaskError> {
        let mut subcontext = context.sub(&self.name);

        if let Some(action) = &self.action {
            match action.exec(context, &mut subcontext).await {
                Outcome::Success => {}
                Outcome::Skip => {
                    subcontext.logger().debug("skipped");
                    return Ok(Completion::Skipped);
                }
                Outcome::Failure(source) => {
                    subcontext.logger().error(&source);
                    return Err(TaskError::Failed {
                        task: self.name.clone(),
                        source,
                    });
                }
            }
        }

        if self.parallel {
            self.run_parallel(&subcontext).await?;
        } else {
            for task in &self.tasks {
                task.run(&mut subcontext).await?;
            }
        }

        Ok(Completion::Done)
    }

    /// Start every child at once and wait for all of them
    async fn run_parallel(&self, subcontext: &Context) -> Result<(), TaskError> {
        let handles: Vec<_> = self
            .tasks
            .iter()
            .map(|task| {
                let task = Arc::clone(task);
                let mut context = subcontext.clone();
                tokio::spawn(async move { task.run(&mut context).await })
            })
            .collect();

        let mut failures = Vec::new();
        for (task, handle) in self.tasks.iter().zip(handles) {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(e),
                Err(e) => {
                    let message = e.to_string();
                    task.lock_status()
                        .finish(TaskState::Errored, Some(message.clone()));
                    failures.push(TaskError::Aborted {
                        task: task.name.clone(),
                        message,
                    });
                }
            }
        }

        if failures.is_empty() {
            return Ok(());
        }

        let failed = failures.len();
        Err(TaskError::Join {
            task: self.name.clone(),
            failed,
            first: Box::new(failures.swap_remove(0)),
        })
    }

    fn lock_status(&self) -> MutexGuard<'_, TaskStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parallel", &self.parallel)
            .field("has_action", &self.action.is_some())
            .field("tasks", &self.tasks)
            .field("status", &self.status())
            .finish()
    }
}
