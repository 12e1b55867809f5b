// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! CLI definition and entry point
//!
//! Pipelines are defined in Rust; a program hands them to [`main_with`] to
//! get the command-line interface:
//!
//! ```text
//! citree                     Run the Default pipeline
//! citree Release             Run the Release pipeline
//! citree --list              List pipelines
//! citree --plan Release      Show the Release tree without running it
//! ```

pub mod list;
pub mod plan;
pub mod run;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::errors::{CitreeError, CitreeResult};
use crate::pipeline::{Pipeline, Pipelines};

/// Task-tree pipeline runner
#[derive(Parser, Debug)]
#[clap(
    name = "citree",
    version,
    about = "Run task-tree pipelines with scoped environments and parallel stages",
    long_about = None,
    after_help = "Examples:\n\
        citree                    Run the Default pipeline\n\
        citree --list             List available pipelines\n\
        citree --plan Release     Show a pipeline without running it\n\
        citree --format json      Print the final report as JSON"
)]
pub struct Cli {
    /// Pipeline to run
    #[clap(default_value = "Default")]
    pub pipeline: String,

    /// List pipelines and exit
    #[clap(long)]
    pub list: bool,

    /// Print the task tree without running it
    #[clap(long)]
    pub plan: bool,

    /// Report format (text, json)
    #[clap(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[clap(short, long)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

/// Output format of reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Install the tracing subscriber. Logs go to stderr so stdout only
/// carries reports.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "citree=debug" } else { "citree=info" };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

/// Look a pipeline up by name
pub fn find_pipeline<'a>(pipelines: &'a Pipelines, name: &str) -> CitreeResult<&'a Pipeline> {
    pipelines
        .find(name)
        .ok_or_else(|| CitreeError::PipelineNotFound {
            name: name.to_string(),
            available: pipelines.names().join(", "),
        })
}

/// Parse the command line and run it against `pipelines`
pub async fn main_with(pipelines: Pipelines) -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    if cli.list {
        return list::run(&pipelines, cli.format);
    }

    let pipeline = find_pipeline(&pipelines, &cli.pipeline)?;
    if cli.plan {
        plan::run(pipeline, cli.format)
    } else {
        run::run(pipeline, cli.format).await
    }
}
