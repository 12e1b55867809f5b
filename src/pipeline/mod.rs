// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Pipelines, stages and steps
//!
//! A [`Pipeline`] is a named list of [`Step`]s. Turning it into a task tree
//! creates a root task and lets every step attach itself to it. A [`Stage`]
//! is itself a step: it attaches one child task carrying its parallel flag
//! and lets its own steps attach below that, which is how stages nest.

mod runner;

pub use runner::{PipelineRunner, RunResult};

use crate::task::{Task, TaskBuilder};

/// An operation that adds itself to a task tree
///
/// `attach` is called exactly once per step while the tree is built. It may
/// create any number of subtasks of `parent` and may install an action on
/// them (or on `parent` itself).
pub trait Step: Send + Sync {
    fn attach(&self, parent: &mut TaskBuilder);
}

/// A named execution tree
pub struct Pipeline {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            name: name.into(),
            description: None,
            steps,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = (!description.is_empty()).then_some(description);
        self
    }

    /// Build the root task of this pipeline
    pub fn task(&self) -> Task {
        let mut root = TaskBuilder::new(self.name.clone());
        if let Some(description) = &self.description {
            root.set_description(description.clone());
        }
        root.add_steps(&self.steps);
        root.build()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// A group of steps run one after another or all at once
pub struct Stage {
    pub name: String,
    pub parallel: bool,
    pub steps: Vec<Box<dyn Step>>,
}

impl Stage {
    /// Stage whose steps run in order
    pub fn sequential(name: impl Into<String>, steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            name: name.into(),
            parallel: false,
            steps,
        }
    }

    /// Stage whose steps run concurrently
    pub fn parallel(name: impl Into<String>, steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            name: name.into(),
            parallel: true,
            steps,
        }
    }
}

impl Step for Stage {
    fn attach(&self, parent: &mut TaskBuilder) {
        let task = parent.subtask(self.name.clone());
        task.set_parallel(self.parallel);
        task.add_steps(&self.steps);
    }
}

/// A collection of pipelines, looked up by name
#[derive(Debug, Default)]
pub struct Pipelines(Vec<Pipeline>);

impl Pipelines {
    pub fn new(pipelines: Vec<Pipeline>) -> Self {
        Self(pipelines)
    }

    /// Find a pipeline by name, ignoring case
    pub fn find(&self, name: &str) -> Option<&Pipeline> {
        self.0.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pipeline> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Pipeline> for Pipelines {
    fn from_iter<I: IntoIterator<Item = Pipeline>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskState;

    struct Leaf(&'static str);

    impl Step for Leaf {
        fn attach(&self, parent: &mut TaskBuilder) {
            parent.subtask(self.0);
        }
    }

    fn leaf(name: &'static str) -> Box<dyn Step> {
        Box::new(Leaf(name))
    }

    #[test]
    fn test_pipeline_task_shape() {
        let pipeline = Pipeline::new(
            "Default",
            vec![
                Box::new(Stage::sequential("Build", vec![leaf("compile")])),
                Box::new(Stage::parallel(
                    "Verification",
                    vec![
                        Box::new(Stage::sequential("Lint", vec![leaf("clippy"), leaf("fmt")])),
                        Box::new(Stage::sequential("Test", vec![leaf("test")])),
                    ],
                )),
            ],
        )
        .with_description("build and verify");

        let root = pipeline.task();
        assert_eq!(root.name(), "Default");
        assert_eq!(root.description(), Some("build and verify"));
        assert!(!root.is_parallel());

        let names: Vec<_> = root.tasks().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Build", "Verification"]);

        let verification = &root.tasks()[1];
        assert!(verification.is_parallel());
        assert_eq!(verification.tasks().len(), 2);
        assert_eq!(verification.tasks()[0].tasks()[1].name(), "fmt");
        assert_eq!(verification.status().state, TaskState::Pending);
    }

    #[test]
    fn test_empty_description_is_none() {
        let pipeline = Pipeline::new("p", vec![]).with_description("");
        assert!(pipeline.description.is_none());
    }

    #[test]
    fn test_find_ignores_case() {
        let pipelines: Pipelines = vec![Pipeline::new("Default", vec![]), Pipeline::new("Release", vec![])]
            .into_iter()
            .collect();

        assert_eq!(pipelines.find("default").map(|p| p.name.as_str()), Some("Default"));
        assert!(pipelines.find("missing").is_none());
        assert_eq!(pipelines.names(), vec!["Default", "Release"]);
    }
}
