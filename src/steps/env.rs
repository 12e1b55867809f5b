// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Environment, temp directory and working directory steps

use async_trait::async_trait;

use super::Scope;
use crate::context::{normalize, Context};
use crate::errors::{CitreeError, CitreeResult};
use crate::pipeline::Step;
use crate::task::{Action, Outcome, TaskBuilder};

fn publish(context: &mut Context, scope: Scope, name: &str, value: String) {
    match scope {
        Scope::Local => context.set_env(name, value),
        Scope::Global => context.global().set_env(name, value),
    }
}

/// Set a variable
pub struct SetEnv {
    pub name: String,
    pub value: String,
    pub scope: Scope,
}

#[async_trait]
impl Action for SetEnv {
    async fn exec(&self, context: &mut Context, subcontext: &mut Context) -> Outcome {
        let value = match context.expand_env(&self.value) {
            Ok(value) => value,
            Err(e) => return Outcome::Failure(e),
        };
        subcontext.logger().debug(format_args!("{} = {}", self.name, value));
        publish(context, self.scope, &self.name, value);
        Outcome::Success
    }
}

impl Step for SetEnv {
    fn attach(&self, parent: &mut TaskBuilder) {
        parent
            .subtask(format!("{} := \"{}\"", self.name, self.value))
            .set_action(SetEnv {
                name: self.name.clone(),
                value: self.value.clone(),
                scope: self.scope,
            });
    }
}

/// Guard deciding whether a conditional subtree runs
#[derive(Debug, Clone)]
enum EnvGuard {
    Equals { name: String, value: String },
    NonEmpty { name: String },
}

#[async_trait]
impl Action for EnvGuard {
    async fn exec(&self, context: &mut Context, _subcontext: &mut Context) -> Outcome {
        let matched = match self {
            EnvGuard::Equals { name, value } => {
                let expected = match context.expand_env(value) {
                    Ok(value) => value,
                    Err(e) => return Outcome::Failure(e),
                };
                context.get_env(name).unwrap_or_default() == expected
            }
            EnvGuard::NonEmpty { name } => context
                .get_env(name)
                .is_some_and(|value| !value.is_empty()),
        };

        if matched {
            Outcome::Success
        } else {
            Outcome::Skip
        }
    }
}

/// Run steps only when a variable has a given value
pub struct WhenEnv {
    pub name: String,
    pub value: String,
    pub steps: Vec<Box<dyn Step>>,
}

impl Step for WhenEnv {
    fn attach(&self, parent: &mut TaskBuilder) {
        parent
            .subtask(format!("when {} == \"{}\"", self.name, self.value))
            .set_action(EnvGuard::Equals {
                name: self.name.clone(),
                value: self.value.clone(),
            })
            .add_steps(&self.steps);
    }
}

/// Run steps only when a variable is set to something non-empty
pub struct WhenEnvSet {
    pub name: String,
    pub steps: Vec<Box<dyn Step>>,
}

impl Step for WhenEnvSet {
    fn attach(&self, parent: &mut TaskBuilder) {
        parent
            .subtask(format!("when {}", self.name))
            .set_action(EnvGuard::NonEmpty {
                name: self.name.clone(),
            })
            .add_steps(&self.steps);
    }
}

fn make_temp_dir(context: &Context, name: &str) -> CitreeResult<String> {
    let dir = context.global().create_temp_dir(&name.to_lowercase())?;
    Ok(dir.to_string_lossy().into_owned())
}

/// Create a temp directory and store its path in a variable
pub struct CreateTempDir {
    pub name: String,
    pub scope: Scope,
}

#[async_trait]
impl Action for CreateTempDir {
    async fn exec(&self, context: &mut Context, subcontext: &mut Context) -> Outcome {
        match make_temp_dir(context, &self.name) {
            Ok(dir) => {
                subcontext.logger().debug(format_args!("{} = {}", self.name, dir));
                publish(context, self.scope, &self.name, dir);
                Outcome::Success
            }
            Err(e) => Outcome::Failure(e),
        }
    }
}

impl Step for CreateTempDir {
    fn attach(&self, parent: &mut TaskBuilder) {
        parent
            .subtask(format!("{} := tempdir", self.name))
            .set_action(CreateTempDir {
                name: self.name.clone(),
                scope: self.scope,
            });
    }
}

/// Run steps with a fresh temp directory in a variable
///
/// The variable is only visible inside the subtree.
pub struct WithTempDir {
    pub name: String,
    pub steps: Vec<Box<dyn Step>>,
}

struct ScopedTempDir {
    name: String,
}

#[async_trait]
impl Action for ScopedTempDir {
    async fn exec(&self, context: &mut Context, subcontext: &mut Context) -> Outcome {
        match make_temp_dir(context, &self.name) {
            Ok(dir) => {
                subcontext.logger().debug(format_args!("{} = {}", self.name, dir));
                subcontext.set_env(&self.name, dir);
                Outcome::Success
            }
            Err(e) => Outcome::Failure(e),
        }
    }
}

impl Step for WithTempDir {
    fn attach(&self, parent: &mut TaskBuilder) {
        parent
            .subtask(format!("with tempdir {}", self.name))
            .set_action(ScopedTempDir {
                name: self.name.clone(),
            })
            .add_steps(&self.steps);
    }
}

/// Change the working directory of the following steps
pub struct ChangeDir {
    pub target: String,
}

impl ChangeDir {
    fn resolve(&self, context: &Context) -> CitreeResult<std::path::PathBuf> {
        let target = context.expand_env(&self.target)?;
        let dir = normalize(&context.working_dir().join(target));
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(CitreeError::DirectoryNotFound { path: dir })
        }
    }
}

#[async_trait]
impl Action for ChangeDir {
    async fn exec(&self, context: &mut Context, subcontext: &mut Context) -> Outcome {
        match self.resolve(context) {
            Ok(dir) => {
                subcontext.logger().debug(format_args!("cd {}", dir.display()));
                context.set_working_dir(dir);
                Outcome::Success
            }
            Err(e) => Outcome::Failure(e),
        }
    }
}

impl Step for ChangeDir {
    fn attach(&self, parent: &mut TaskBuilder) {
        parent
            .subtask(format!("cd \"{}\"", self.target))
            .set_action(ChangeDir {
                target: self.target.clone(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Environment, GlobalContext, Logger};
    use crate::task::{action_fn, Task, TaskState};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn make_context(dir: &TempDir) -> Context {
        let global = GlobalContext::new(dir.path(), "citree-test-").unwrap();
        global.root_context(Environment::new(), Logger::root("test"))
    }

    /// Step recording the value of a variable when it runs
    struct Capture {
        name: &'static str,
        seen: Arc<Mutex<Vec<Option<String>>>>,
    }

    impl Step for Capture {
        fn attach(&self, parent: &mut TaskBuilder) {
            let name = self.name;
            let seen = Arc::clone(&self.seen);
            parent
                .subtask(format!("capture {}", name))
                .set_action(action_fn(move |context, _| {
                    seen.lock().unwrap().push(context.get_env(name));
                    Outcome::Success
                }));
        }
    }

    fn build(steps: Vec<Box<dyn Step>>) -> Task {
        let mut root = TaskBuilder::new("");
        root.add_steps(&steps);
        root.build()
    }

    /// Task of a single step, run with the test's context as its caller
    fn single(step: Box<dyn Step>) -> Arc<Task> {
        Arc::clone(&build(vec![step]).tasks()[0])
    }

    fn set_env(name: &str, value: &str, scope: Scope) -> Box<dyn Step> {
        Box::new(SetEnv {
            name: name.into(),
            value: value.into(),
            scope,
        })
    }

    #[tokio::test]
    async fn test_set_env_expands_in_caller_context() {
        let dir = TempDir::new().unwrap();
        let mut context = make_context(&dir);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let task = build(vec![
            set_env("A", "one", Scope::Local),
            set_env("B", "$A-two", Scope::Local),
            Box::new(Capture {
                name: "B",
                seen: Arc::clone(&seen),
            }),
        ]);
        task.run(&mut context).await.unwrap();

        assert_eq!(task.tasks()[1].name(), "B := \"$A-two\"");
        assert_eq!(*seen.lock().unwrap(), vec![Some("one-two".to_string())]);
    }

    #[tokio::test]
    async fn test_set_env_undefined_reference_fails() {
        let dir = TempDir::new().unwrap();
        let mut context = make_context(&dir);

        let task = build(vec![set_env("A", "$NOPE", Scope::Local)]);
        let err = task.run(&mut context).await.unwrap_err();

        assert!(matches!(
            err.root_cause(),
            crate::errors::TaskError::Failed {
                source: CitreeError::UndefinedVariables { .. },
                ..
            }
        ));
        assert_eq!(task.tasks()[0].status().state, TaskState::Errored);
    }

    #[tokio::test]
    async fn test_global_scope_bypasses_caller_context() {
        let dir = TempDir::new().unwrap();
        let mut context = make_context(&dir);

        let task = single(set_env("SHARED", "yes", Scope::Global));
        task.run(&mut context).await.unwrap();

        assert_eq!(context.global().get_env("SHARED").as_deref(), Some("yes"));
        assert!(context.env().get("SHARED").is_none());
    }

    #[tokio::test]
    async fn test_when_env_guards() {
        let dir = TempDir::new().unwrap();
        let mut context = make_context(&dir);
        context.set_env("CI", "true");
        context.set_env("EMPTY", "");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let capture = |name| -> Box<dyn Step> {
            Box::new(Capture {
                name,
                seen: Arc::clone(&seen),
            })
        };
        let task = build(vec![
            Box::new(WhenEnv {
                name: "CI".into(),
                value: "true".into(),
                steps: vec![capture("CI")],
            }),
            Box::new(WhenEnv {
                name: "CI".into(),
                value: "false".into(),
                steps: vec![capture("CI")],
            }),
            Box::new(WhenEnv {
                name: "UNSET".into(),
                value: "".into(),
                steps: vec![capture("UNSET")],
            }),
            Box::new(WhenEnvSet {
                name: "EMPTY".into(),
                steps: vec![capture("EMPTY")],
            }),
        ]);
        task.run(&mut context).await.unwrap();

        let states: Vec<_> = task.tasks().iter().map(|t| t.status().state).collect();
        assert_eq!(
            states,
            vec![
                TaskState::Done,
                TaskState::Skipped,
                TaskState::Done,
                TaskState::Skipped
            ]
        );
        assert_eq!(task.tasks()[0].name(), "when CI == \"true\"");
        assert_eq!(task.tasks()[3].name(), "when EMPTY");
        assert_eq!(task.tasks()[1].tasks()[0].status().state, TaskState::Pending);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("true".to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_temp_dirs() {
        let dir = TempDir::new().unwrap();
        let mut context = make_context(&dir);
        let inner = Arc::new(Mutex::new(Vec::new()));
        let outer = Arc::new(Mutex::new(Vec::new()));

        let task = build(vec![
            Box::new(CreateTempDir {
                name: "CACHE".into(),
                scope: Scope::Local,
            }),
            Box::new(WithTempDir {
                name: "WORK".into(),
                steps: vec![Box::new(Capture {
                    name: "WORK",
                    seen: Arc::clone(&inner),
                })],
            }),
            Box::new(Capture {
                name: "WORK",
                seen: Arc::clone(&outer),
            }),
        ]);
        task.run(&mut context).await.unwrap();

        let cache = context.global().temp_root().join("cache-1");
        assert!(cache.is_dir());

        let work = inner.lock().unwrap()[0].clone().unwrap();
        assert!(work.ends_with("work-2"));
        assert_eq!(*outer.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_change_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let mut context = make_context(&dir);

        let task = single(Box::new(ChangeDir {
            target: "sub".into(),
        }));
        task.run(&mut context).await.unwrap();
        assert_eq!(context.working_dir(), dir.path().join("sub"));

        let task = single(Box::new(ChangeDir {
            target: "missing".into(),
        }));
        let err = task.run(&mut context).await.unwrap_err();
        assert!(matches!(
            err.root_cause(),
            crate::errors::TaskError::Failed {
                source: CitreeError::DirectoryNotFound { .. },
                ..
            }
        ));
        assert_eq!(context.working_dir(), dir.path().join("sub"));
    }
}
