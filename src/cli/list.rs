// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! List command - show available pipelines

use colored::Colorize;
use miette::Result;
use serde::Serialize;

use super::OutputFormat;
use crate::errors::CitreeError;
use crate::pipeline::Pipelines;

#[derive(Serialize)]
struct Entry<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

/// Print every pipeline with its description
pub fn run(pipelines: &Pipelines, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = pipelines
                .iter()
                .map(|p| Entry {
                    name: &p.name,
                    description: p.description.as_deref(),
                })
                .collect();
            let json = serde_json::to_string_pretty(&entries).map_err(CitreeError::from)?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            if pipelines.is_empty() {
                println!("{}", "No pipelines defined".dimmed());
                return Ok(());
            }

            let width = pipelines.iter().map(|p| p.name.len()).max().unwrap_or(0);
            println!("{}:", "Pipelines".bold());
            for pipeline in pipelines.iter() {
                match &pipeline.description {
                    Some(description) => println!(
                        "  {:<width$}  {}",
                        pipeline.name,
                        description.dimmed(),
                        width = width
                    ),
                    None => println!("  {}", pipeline.name),
                }
            }
        }
    }

    Ok(())
}
