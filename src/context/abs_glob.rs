// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Absolute glob resolution and confinement

use std::path::{Component, Path, PathBuf};

/// Characters that start a wildcard in a glob
const WILDCARDS: &[char] = &['*', '?'];

/// A glob resolved to an absolute, normalized pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsGlob {
    /// Absolute pattern
    pub pattern: String,
    /// Everything before the first wildcard; equal to `pattern` when there is none
    pub prefix: String,
}

impl AbsGlob {
    /// Resolve `pattern` against `base` (when relative) and normalize it
    pub fn resolve(pattern: &str, base: &Path) -> Self {
        let path = Path::new(pattern);
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        };

        let mut normalized = normalize(&joined).to_string_lossy().into_owned();
        // keep an explicit trailing separator, it matters for the prefix
        if pattern.ends_with(std::path::MAIN_SEPARATOR) && !normalized.ends_with(std::path::MAIN_SEPARATOR) {
            normalized.push(std::path::MAIN_SEPARATOR);
        }

        let prefix = match normalized.find(WILDCARDS) {
            Some(idx) => normalized[..idx].to_string(),
            None => normalized.clone(),
        };

        Self {
            pattern: normalized,
            prefix,
        }
    }

    /// Whether there is any wildcard in the pattern
    pub fn has_wildcard(&self) -> bool {
        self.prefix.len() != self.pattern.len()
    }

    /// Directory part of the literal prefix.
    ///
    /// The prefix may end mid-component (`/root/sub/a*`); only `/root/sub`
    /// is a real directory then.
    pub fn base_dir(&self) -> &Path {
        let literal = Path::new(&self.prefix);
        if self.has_wildcard() && !self.prefix.ends_with(std::path::MAIN_SEPARATOR) {
            literal.parent().unwrap_or(literal)
        } else {
            literal
        }
    }

    /// Whether the literal prefix lies inside `root`
    pub fn is_within(&self, root: &Path) -> bool {
        self.base_dir().starts_with(normalize(root))
    }
}

/// Lexically remove `.` and resolve `..` components
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
