// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Plan command - show a pipeline's task tree without running it

use colored::Colorize;
use miette::Result;

use super::OutputFormat;
use crate::errors::CitreeError;
use crate::pipeline::Pipeline;
use crate::task::ReportNode;

pub fn run(pipeline: &Pipeline, format: OutputFormat) -> Result<()> {
    let task = pipeline.task();

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&ReportNode::from_task(&task))
                .map_err(CitreeError::from)?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            match &pipeline.description {
                Some(description) => println!("{}: {}", pipeline.name.bold(), description),
                None => println!("{}:", pipeline.name.bold()),
            }
            print!("{}", task.report());
        }
    }

    Ok(())
}
