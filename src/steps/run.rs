// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! External command step
//!
//! The program is looked up on the `PATH` of the step's own environment,
//! not the one citree was started with, and the child process sees exactly
//! that environment.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use crate::context::Context;
use crate::errors::{CitreeError, CitreeResult};
use crate::pipeline::Step;
use crate::task::{Action, Outcome, TaskBuilder};

/// Run a program with arguments
#[derive(Debug, Clone)]
pub struct Run {
    pub command: String,
    pub args: Vec<String>,
}

impl Run {
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Command line as written, e.g. `cargo build --release`
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Locate the program on the context's `PATH`
    fn resolve_program(&self, context: &Context, command: &str) -> CitreeResult<PathBuf> {
        let path = context.get_env("PATH");
        which::which_in(command, path, context.working_dir())
            .map_err(|_| CitreeError::tool_not_found(command))
    }

    async fn execute(&self, context: &Context) -> CitreeResult<()> {
        let command = context.expand_env(&self.command)?;
        let args = self
            .args
            .iter()
            .map(|arg| context.expand_env(arg))
            .collect::<CitreeResult<Vec<_>>>()?;
        let program = self.resolve_program(context, &command)?;

        let line = std::iter::once(command.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        context.logger().print(format_args!("$ {}", line));

        let env = context.process_env();
        let status = Command::new(&program)
            .args(&args)
            .current_dir(context.working_dir())
            .env_clear()
            .envs(env.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| CitreeError::Io {
                message: format!("failed to start '{}': {}", program.display(), e),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(CitreeError::CommandFailed {
                command: line,
                code: status.code(),
            })
        }
    }
}

#[async_trait]
impl Action for Run {
    async fn exec(&self, _context: &mut Context, subcontext: &mut Context) -> Outcome {
        self.execute(subcontext).await.into()
    }
}

impl Step for Run {
    fn attach(&self, parent: &mut TaskBuilder) {
        parent
            .subtask(format!("run \"{}\"", self.command_line()))
            .set_action(self.clone());
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::context::{Environment, GlobalContext, Logger};
    use tempfile::TempDir;

    fn make_context(dir: &TempDir) -> Context {
        let global = GlobalContext::new(dir.path(), "citree-test-").unwrap();
        let mut env = Environment::new();
        env.set("PATH", std::env::var("PATH").unwrap_or_default());
        global.root_context(env, Logger::root("test"))
    }

    #[test]
    fn test_subtask_name() {
        let mut root = TaskBuilder::new("");
        Run::new("cargo", ["build", "--release"]).attach(&mut root);

        assert_eq!(root.subtasks()[0].name(), "run \"cargo build --release\"");
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let dir = TempDir::new().unwrap();
        let context = make_context(&dir);

        let err = Run::new("sh", ["-c", "exit 3"])
            .execute(&context)
            .await
            .unwrap_err();

        match err {
            CitreeError::CommandFailed { command, code } => {
                assert_eq!(command, "sh -c exit 3");
                assert_eq!(code, Some(3));
            }
            other => panic!("expected command failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_child_sees_context_environment() {
        let dir = TempDir::new().unwrap();
        let mut context = make_context(&dir);
        context.set_env("LOCAL_VALUE", "local");
        context.global().set_env("GLOBAL_VALUE", "global");
        context.global().set_env("LOCAL_VALUE", "shadowed");

        Run::new("sh", ["-c", "env > env.txt"])
            .execute(&context)
            .await
            .unwrap();

        let env = std::fs::read_to_string(dir.path().join("env.txt")).unwrap();
        assert!(env.lines().any(|l| l == "LOCAL_VALUE=local"));
        assert!(env.lines().any(|l| l == "GLOBAL_VALUE=global"));
        assert!(env.lines().any(|l| l.starts_with("SCRIPTDIR=")));
        assert!(!env.lines().any(|l| l == "LOCAL_VALUE=shadowed"));
    }

    #[tokio::test]
    async fn test_arguments_are_expanded() {
        let dir = TempDir::new().unwrap();
        let mut context = make_context(&dir);
        context.set_env("OUT", "expanded.txt");

        Run::new("touch", ["$OUT"]).execute(&context).await.unwrap();

        assert!(dir.path().join("expanded.txt").is_file());
    }

    #[tokio::test]
    async fn test_program_not_on_context_path() {
        let dir = TempDir::new().unwrap();
        let mut context = make_context(&dir);
        context.set_env("PATH", dir.path().to_string_lossy());

        let err = Run::new("sh", ["-c", "true"])
            .execute(&context)
            .await
            .unwrap_err();

        assert!(matches!(err, CitreeError::ToolNotFound { ref tool, .. } if tool == "sh"));
    }
}
