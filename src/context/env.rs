// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Environment variable tables and `$NAME` expansion

use regex::Regex;
use std::sync::OnceLock;

use crate::errors::CitreeError;

/// An ordered set of environment variables.
///
/// Keys match case-insensitively and are unique: setting a key removes any
/// previous entry for it, so a lookup never has to choose between two values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: Vec<(String, String)>,
}

impl Environment {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment
    pub fn from_process() -> Self {
        let mut env = Self::new();
        for (key, value) in std::env::vars() {
            env.set(key, value);
        }
        env
    }

    /// Replace or insert a variable
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.unset(&key);
        self.vars.push((key, value.into()));
    }

    /// Remove a variable, reporting whether it was present
    pub fn unset(&mut self, key: &str) -> bool {
        let before = self.vars.len();
        self.vars.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
        self.vars.len() != before
    }

    /// Look up a variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate over `(key, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy every variable of `other` that is not defined here
    pub fn merge_missing(&mut self, other: &Environment) {
        for (key, value) in other.iter() {
            if self.get(key).is_none() {
                self.vars.push((key.to_string(), value.to_string()));
            }
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut env = Self::new();
        for (key, value) in iter {
            env.set(key, value);
        }
        env
    }
}

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$(?:\{([A-Za-z0-9_]+)\}|([A-Za-z0-9_]+))").expect("valid reference pattern")
    })
}

/// Substitute every `$NAME` / `${NAME}` reference in `template`.
///
/// The whole string is scanned before failing, so the error lists every
/// undefined name. The error also carries the partial expansion, with the
/// unresolved references left as written.
pub fn expand<F>(template: &str, lookup: F) -> Result<String, CitreeError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut expanded = String::with_capacity(template.len());
    let mut missing: Vec<String> = Vec::new();
    let mut last = 0;

    for caps in reference_pattern().captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let Some(name) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };

        expanded.push_str(&template[last..whole.start()]);
        match lookup(name.as_str()) {
            Some(value) => expanded.push_str(&value),
            None => {
                expanded.push_str(whole.as_str());
                if !missing.iter().any(|m| m == name.as_str()) {
                    missing.push(name.as_str().to_string());
                }
            }
        }
        last = whole.end();
    }
    expanded.push_str(&template[last..]);

    if missing.is_empty() {
        Ok(expanded)
    } else {
        Err(CitreeError::UndefinedVariables {
            names: missing,
            partial: expanded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_in(env: &Environment) -> impl Fn(&str) -> Option<String> + '_ {
        move |name: &str| env.get(name).map(str::to_string)
    }

    #[test]
    fn test_set_replaces_case_insensitive() {
        let mut env = Environment::new();
        env.set("Path", "/bin");
        env.set("PATH", "/usr/bin");

        assert_eq!(env.len(), 1);
        assert_eq!(env.get("path"), Some("/usr/bin"));
        assert_eq!(env.iter().next(), Some(("PATH", "/usr/bin")));
    }

    #[test]
    fn test_unset_reports_presence() {
        let mut env: Environment = [("A", "1")].into_iter().collect();

        assert!(env.unset("a"));
        assert!(!env.unset("a"));
        assert!(env.is_empty());
    }

    #[test]
    fn test_expand_simple_and_braced() {
        let env: Environment = [("A", "x"), ("HOME_DIR", "/home/me")].into_iter().collect();

        let out = expand("$A-${A}/$HOME_DIR/bin", lookup_in(&env)).unwrap();
        assert_eq!(out, "x-x//home/me/bin");
    }

    #[test]
    fn test_expand_keeps_lone_dollar() {
        let env = Environment::new();

        assert_eq!(expand("cost: $ 5", lookup_in(&env)).unwrap(), "cost: $ 5");
        assert_eq!(expand("trailing $", lookup_in(&env)).unwrap(), "trailing $");
    }

    #[test]
    fn test_expand_reports_all_missing() {
        let env: Environment = [("A", "x")].into_iter().collect();

        let err = expand("$A/$B/$C/$B", lookup_in(&env)).unwrap_err();
        match err {
            CitreeError::UndefinedVariables { names, partial } => {
                assert_eq!(names, vec!["B", "C"]);
                assert_eq!(partial, "x/$B/$C/$B");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_value_counts_as_defined() {
        let env: Environment = [("EMPTY", "")].into_iter().collect();

        assert_eq!(expand("[$EMPTY]", lookup_in(&env)).unwrap(), "[]");
    }

    #[test]
    fn test_merge_missing_keeps_local_values() {
        let mut local: Environment = [("A", "local")].into_iter().collect();
        let global: Environment = [("a", "global"), ("B", "global")].into_iter().collect();

        local.merge_missing(&global);

        assert_eq!(local.get("A"), Some("local"));
        assert_eq!(local.get("B"), Some("global"));
    }
}
