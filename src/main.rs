// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! citree - task-tree pipeline runner
//!
//! Ships pipelines for building and checking a Cargo project.

use miette::Result;

use citree::dsl::*;
use citree::pipeline::Pipelines;

fn builtin_pipelines() -> Pipelines {
    pipelines(vec![
        pipeline(
            "Default",
            vec![
                stage("Fetch", vec![run("cargo", ["fetch"])]),
                stage("Build", vec![run("cargo", ["build", "--all-targets"])]),
                parallel(
                    "Verification",
                    vec![
                        stage("Test", vec![run("cargo", ["test"])]),
                        stage(
                            "Lint",
                            vec![run("cargo", ["clippy", "--all-targets", "--", "-D", "warnings"])],
                        ),
                        stage("Format", vec![run("cargo", ["fmt", "--check"])]),
                    ],
                ),
            ],
        )
        .with_description("fetch, build, then test and lint in parallel"),
        pipeline(
            "Release",
            vec![
                set_env("CARGO_PROFILE_RELEASE_DEBUG", "false"),
                stage("Build", vec![run("cargo", ["build", "--release"])]),
                when_env_set(
                    "CITREE_DIST",
                    vec![
                        remove("$CITREE_DIST/*"),
                        copy("target/release/*", "$CITREE_DIST"),
                    ],
                ),
            ],
        )
        .with_description("release build, copied to $CITREE_DIST when set"),
        pipeline(
            "Doctor",
            vec![parallel(
                "Toolchain",
                vec![run("cargo", ["--version"]), run("rustc", ["--version"])],
            )],
        )
        .with_description("check that the Rust toolchain is available"),
    ])
}

#[tokio::main]
async fn main() -> Result<()> {
    citree::cli::main_with(builtin_pipelines()).await
}
