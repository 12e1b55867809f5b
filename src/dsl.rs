// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Pipeline definition helpers
//!
//! ```no_run
//! use citree::dsl::*;
//!
//! #[tokio::main]
//! async fn main() -> miette::Result<()> {
//!     citree::cli::main_with(pipelines(vec![pipeline(
//!         "Default",
//!         vec![
//!             stage("Build", vec![run("cargo", ["build"])]),
//!             parallel(
//!                 "Verification",
//!                 vec![
//!                     stage("Test", vec![run("cargo", ["test"])]),
//!                     stage("Lint", vec![run("cargo", ["clippy"])]),
//!                 ],
//!             ),
//!         ],
//!     )]))
//!     .await
//! }
//! ```

use crate::pipeline::{Pipeline, Pipelines, Stage, Step};
use crate::steps::{
    ChangeDir, CopyFiles, CreateTempDir, RemoveFiles, Run, Scope, SetEnv, WhenEnv, WhenEnvSet,
    WithTempDir,
};

pub type Steps = Vec<Box<dyn Step>>;

pub fn pipelines(pipelines: Vec<Pipeline>) -> Pipelines {
    Pipelines::new(pipelines)
}

pub fn pipeline(name: impl Into<String>, steps: Steps) -> Pipeline {
    Pipeline::new(name, steps)
}

/// Steps run one after another
pub fn stage(name: impl Into<String>, steps: Steps) -> Box<dyn Step> {
    Box::new(Stage::sequential(name, steps))
}

/// Steps run concurrently
pub fn parallel(name: impl Into<String>, steps: Steps) -> Box<dyn Step> {
    Box::new(Stage::parallel(name, steps))
}

pub fn run<I, S>(command: impl Into<String>, args: I) -> Box<dyn Step>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Box::new(Run::new(command, args))
}

/// Set a variable for the following steps
pub fn set_env(name: impl Into<String>, value: impl Into<String>) -> Box<dyn Step> {
    Box::new(SetEnv {
        name: name.into(),
        value: value.into(),
        scope: Scope::Local,
    })
}

/// Set a variable for every branch of the run
pub fn set_global_env(name: impl Into<String>, value: impl Into<String>) -> Box<dyn Step> {
    Box::new(SetEnv {
        name: name.into(),
        value: value.into(),
        scope: Scope::Global,
    })
}

pub fn when_env(name: impl Into<String>, value: impl Into<String>, steps: Steps) -> Box<dyn Step> {
    Box::new(WhenEnv {
        name: name.into(),
        value: value.into(),
        steps,
    })
}

pub fn when_env_set(name: impl Into<String>, steps: Steps) -> Box<dyn Step> {
    Box::new(WhenEnvSet {
        name: name.into(),
        steps,
    })
}

pub fn create_temp_dir(name: impl Into<String>) -> Box<dyn Step> {
    Box::new(CreateTempDir {
        name: name.into(),
        scope: Scope::Local,
    })
}

pub fn create_global_temp_dir(name: impl Into<String>) -> Box<dyn Step> {
    Box::new(CreateTempDir {
        name: name.into(),
        scope: Scope::Global,
    })
}

pub fn with_temp_dir(name: impl Into<String>, steps: Steps) -> Box<dyn Step> {
    Box::new(WithTempDir {
        name: name.into(),
        steps,
    })
}

pub fn cd(target: impl Into<String>) -> Box<dyn Step> {
    Box::new(ChangeDir {
        target: target.into(),
    })
}

pub fn copy(source: impl Into<String>, destination: impl Into<String>) -> Box<dyn Step> {
    Box::new(CopyFiles {
        source: source.into(),
        destination: destination.into(),
    })
}

pub fn remove(pattern: impl Into<String>) -> Box<dyn Step> {
    Box::new(RemoveFiles {
        pattern: pattern.into(),
    })
}
