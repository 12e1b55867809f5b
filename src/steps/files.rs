// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! File copy and removal steps
//!
//! Both only accept globs inside the script directory or the run's temp
//! directory. The filesystem work runs on the blocking thread pool.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::context::{AbsGlob, Context};
use crate::errors::{CitreeError, CitreeResult};
use crate::pipeline::Step;
use crate::task::{Action, Outcome, TaskBuilder};

/// Expand a glob into the matching paths
fn glob_matches(glob: &AbsGlob) -> CitreeResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in glob::glob(&glob.pattern)? {
        paths.push(entry?);
    }
    Ok(paths)
}

async fn blocking<T, F>(f: F) -> CitreeResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> CitreeResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CitreeError::Io {
            message: e.to_string(),
        })?
}

/// Copy everything matching a glob into a directory
///
/// Matches keep their path relative to the glob's literal directory, so
/// `cp "target/*/app" "$DIST"` creates `$DIST/debug/app` and
/// `$DIST/release/app`.
pub struct CopyFiles {
    pub source: String,
    pub destination: String,
}

fn copy_matches(source: &AbsGlob, destination: &Path) -> CitreeResult<usize> {
    let base = if source.has_wildcard() {
        source.base_dir().to_path_buf()
    } else {
        let literal = Path::new(&source.prefix);
        literal.parent().unwrap_or(literal).to_path_buf()
    };

    let mut paths = glob_matches(source)?;
    // the destination itself can match on a second run
    paths.retain(|path| path != destination);
    if let Some(ancestor) = paths.iter().find(|path| destination.starts_with(path)) {
        return Err(CitreeError::GlobPattern {
            message: format!(
                "copy destination {} is inside source {}",
                destination.display(),
                ancestor.display()
            ),
        });
    }

    let mut copied = 0;
    for path in &paths {
        let relative = path.strip_prefix(&base).unwrap_or(path);
        let target = destination.join(relative);
        if target == *path {
            continue;
        }
        copy_path(path, &target)?;
        copied += 1;
    }
    Ok(copied)
}

fn copy_path(from: &Path, to: &Path) -> CitreeResult<()> {
    if from.is_dir() {
        let entries = std::fs::read_dir(from)?.collect::<Result<Vec<_>, _>>()?;
        std::fs::create_dir_all(to)?;
        for entry in entries {
            copy_path(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(from, to)?;
    }
    Ok(())
}

#[async_trait]
impl Action for CopyFiles {
    async fn exec(&self, _context: &mut Context, subcontext: &mut Context) -> Outcome {
        let source = match subcontext.confine_glob(&self.source) {
            Ok(glob) => glob,
            Err(e) => return Outcome::Failure(e),
        };
        let destination = match subcontext.confine_path(&self.destination) {
            Ok(glob) if glob.has_wildcard() => {
                return Outcome::Failure(CitreeError::GlobPattern {
                    message: format!("copy destination '{}' must not contain wildcards", self.destination),
                })
            }
            Ok(glob) => PathBuf::from(glob.pattern),
            Err(e) => return Outcome::Failure(e),
        };

        match blocking(move || copy_matches(&source, &destination)).await {
            Ok(count) => {
                subcontext.logger().debug(format_args!("copied {} path(s)", count));
                Outcome::Success
            }
            Err(e) => Outcome::Failure(e),
        }
    }
}

impl Step for CopyFiles {
    fn attach(&self, parent: &mut TaskBuilder) {
        parent
            .subtask(format!("cp \"{}\" \"{}\"", self.source, self.destination))
            .set_action(CopyFiles {
                source: self.source.clone(),
                destination: self.destination.clone(),
            });
    }
}

/// Remove every file and directory matching a glob
pub struct RemoveFiles {
    pub pattern: String,
}

fn remove_matches(glob: &AbsGlob, roots: &[PathBuf]) -> CitreeResult<usize> {
    let paths = glob_matches(glob)?;
    for path in &paths {
        if let Some(root) = roots.iter().find(|root| root.starts_with(path)) {
            return Err(CitreeError::GlobMatchesRoot {
                pattern: glob.pattern.clone(),
                root: root.clone(),
            });
        }
    }

    for path in &paths {
        // an earlier match may have been a parent directory
        let Ok(metadata) = std::fs::symlink_metadata(path) else {
            continue;
        };
        if metadata.is_dir() {
            std::fs::remove_dir_all(path)?;
        } else {
            std::fs::remove_file(path)?;
        }
    }
    Ok(paths.len())
}

#[async_trait]
impl Action for RemoveFiles {
    async fn exec(&self, _context: &mut Context, subcontext: &mut Context) -> Outcome {
        let glob = match subcontext.confine_glob(&self.pattern) {
            Ok(glob) => glob,
            Err(e) => return Outcome::Failure(e),
        };

        let roots: Vec<PathBuf> = subcontext
            .global()
            .sanctioned_roots()
            .iter()
            .map(|root| root.to_path_buf())
            .collect();

        match blocking(move || remove_matches(&glob, &roots)).await {
            Ok(count) => {
                subcontext.logger().debug(format_args!("removed {} path(s)", count));
                Outcome::Success
            }
            Err(e) => Outcome::Failure(e),
        }
    }
}

impl Step for RemoveFiles {
    fn attach(&self, parent: &mut TaskBuilder) {
        parent
            .subtask(format!("rm \"{}\"", self.pattern))
            .set_action(RemoveFiles {
                pattern: self.pattern.clone(),
            });
    }
}
