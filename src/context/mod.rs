// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Execution contexts
//!
//! A [`Context`] is the environment, working directory and logger of one
//! branch of the task tree. Branches fork their parent's context, so their
//! environment changes stay in their own subtree. Everything that must be
//! shared across branches lives in the run's [`GlobalContext`].

mod abs_glob;
mod env;
mod logger;

pub use abs_glob::{normalize, AbsGlob};
pub use env::{expand, Environment};
pub use logger::Logger;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tempfile::TempDir;

use crate::errors::{CitreeError, CitreeResult};

/// Variable holding the script directory in every root context
pub const SCRIPT_DIR_VAR: &str = "SCRIPTDIR";

/// State shared by every branch of one pipeline run
#[derive(Debug)]
pub struct GlobalContext {
    /// Directory the pipeline was started from
    script_dir: PathBuf,
    /// Root of all temp directories of this run
    temp_root: PathBuf,
    /// Owner of `temp_root`; taken on cleanup
    temp_dir: Mutex<Option<TempDir>>,
    /// Last issued temp directory id
    temp_id: AtomicU64,
    /// Variables visible from every branch
    env: Mutex<Environment>,
}

impl GlobalContext {
    /// Create the shared state for a run, including its temp root
    pub fn new(script_dir: impl AsRef<Path>, temp_prefix: &str) -> CitreeResult<Arc<Self>> {
        let script_dir = absolute(script_dir.as_ref())?;

        let temp_dir = tempfile::Builder::new()
            .prefix(temp_prefix)
            .tempdir()
            .map_err(|e| CitreeError::TempDir {
                message: format!("failed to create run directory: {}", e),
            })?;
        let temp_root = temp_dir.path().to_path_buf();

        tracing::debug!(temp_root = %temp_root.display(), "created run directory");

        Ok(Arc::new(Self {
            script_dir,
            temp_root,
            temp_dir: Mutex::new(Some(temp_dir)),
            temp_id: AtomicU64::new(0),
            env: Mutex::new(Environment::new()),
        }))
    }

    /// Root context of the run, with `SCRIPTDIR` set
    pub fn root_context(self: &Arc<Self>, mut env: Environment, log: Logger) -> Context {
        env.set(SCRIPT_DIR_VAR, self.script_dir.to_string_lossy());
        Context {
            global: Arc::clone(self),
            working_dir: self.script_dir.clone(),
            env,
            log,
        }
    }

    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// Create `<temp root>/<prefix>-<id>` with a fresh id.
    ///
    /// Ids are unique for the run and increase with every call.
    pub fn create_temp_dir(&self, prefix: &str) -> CitreeResult<PathBuf> {
        if self.lock_temp_dir().is_none() {
            return Err(CitreeError::TempDir {
                message: "the run's temp directory was already removed".to_string(),
            });
        }

        let id = self.temp_id.fetch_add(1, Ordering::SeqCst) + 1;
        let dir = self.temp_root.join(format!("{}-{}", prefix, id));
        std::fs::create_dir(&dir).map_err(|e| CitreeError::TempDir {
            message: format!("{}: {}", dir.display(), e),
        })?;

        Ok(dir)
    }

    /// Number of temp directories handed out so far
    pub fn temp_dirs_created(&self) -> u64 {
        self.temp_id.load(Ordering::SeqCst)
    }

    /// Remove the run's temp root. Only the first call does anything.
    pub fn cleanup(&self) -> CitreeResult<()> {
        let Some(temp_dir) = self.lock_temp_dir().take() else {
            return Ok(());
        };
        tracing::debug!(temp_root = %self.temp_root.display(), "removing run directory");
        temp_dir.close().map_err(|e| CitreeError::TempDir {
            message: format!("failed to remove {}: {}", self.temp_root.display(), e),
        })
    }

    /// Directories globs may resolve into
    pub fn sanctioned_roots(&self) -> [&Path; 2] {
        [self.script_dir.as_path(), self.temp_root.as_path()]
    }

    pub fn set_env(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock_env().set(key, value);
    }

    pub fn unset_env(&self, key: &str) -> bool {
        self.lock_env().unset(key)
    }

    pub fn get_env(&self, key: &str) -> Option<String> {
        self.lock_env().get(key).map(str::to_string)
    }

    /// Copy of the global variables
    pub fn env_snapshot(&self) -> Environment {
        self.lock_env().clone()
    }

    fn lock_env(&self) -> MutexGuard<'_, Environment> {
        self.env.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_temp_dir(&self) -> MutexGuard<'_, Option<TempDir>> {
        self.temp_dir.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Environment, working directory and logger of one branch
#[derive(Debug, Clone)]
pub struct Context {
    global: Arc<GlobalContext>,
    working_dir: PathBuf,
    env: Environment,
    log: Logger,
}

impl Context {
    /// Fork a context for a subtask.
    ///
    /// The environment is copied, so changes made through the fork never
    /// reach this context or its other forks.
    pub fn sub(&self, name: &str) -> Context {
        Context {
            global: Arc::clone(&self.global),
            working_dir: self.working_dir.clone(),
            env: self.env.clone(),
            log: self.log.named(name),
        }
    }

    pub fn global(&self) -> &Arc<GlobalContext> {
        &self.global
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) {
        self.working_dir = dir.into();
    }

    pub fn logger(&self) -> &Logger {
        &self.log
    }

    /// Variables set on this branch, without the global ones
    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.set(key, value);
    }

    pub fn unset_env(&mut self, key: &str) -> bool {
        self.env.unset(key)
    }

    /// Look up a variable on this branch, falling back to the global ones
    pub fn get_env(&self, key: &str) -> Option<String> {
        match self.env.get(key) {
            Some(value) => Some(value.to_string()),
            None => self.global.get_env(key),
        }
    }

    /// Environment handed to child processes: branch variables over global ones
    pub fn process_env(&self) -> Environment {
        let mut env = self.env.clone();
        env.merge_missing(&self.global.env_snapshot());
        env
    }

    /// Substitute `$NAME` references, failing with every undefined name
    pub fn expand_env(&self, template: &str) -> CitreeResult<String> {
        expand(template, |name| self.get_env(name))
    }

    /// Expand a glob and make it absolute relative to the working directory
    pub fn abs_glob(&self, pattern: &str) -> CitreeResult<AbsGlob> {
        let expanded = self.expand_env(pattern)?;
        Ok(AbsGlob::resolve(&expanded, &self.working_dir))
    }

    /// Like [`Context::abs_glob`], but only allows globs inside the script
    /// directory or the run's temp directory.
    ///
    /// A glob naming one of those directories itself is rejected, only
    /// paths below them can be matched.
    pub fn confine_glob(&self, pattern: &str) -> CitreeResult<AbsGlob> {
        let glob = self.confine_path(pattern)?;
        if !glob.has_wildcard() {
            let roots = self.global.sanctioned_roots();
            if let Some(root) = roots.iter().find(|root| Path::new(&glob.pattern) == **root) {
                return Err(CitreeError::GlobMatchesRoot {
                    pattern: pattern.to_string(),
                    root: root.to_path_buf(),
                });
            }
        }
        Ok(glob)
    }

    /// Like [`Context::confine_glob`], but the script directory and the temp
    /// root themselves are allowed. For targets that are written into, never
    /// matched or removed.
    pub fn confine_path(&self, pattern: &str) -> CitreeResult<AbsGlob> {
        let glob = self.abs_glob(pattern)?;
        if self
            .global
            .sanctioned_roots()
            .iter()
            .any(|root| glob.is_within(root))
        {
            Ok(glob)
        } else {
            Err(CitreeError::GlobOutsideRoot {
                pattern: pattern.to_string(),
                prefix: glob.prefix,
            })
        }
    }
}

fn absolute(path: &Path) -> CitreeResult<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn make_root(script_dir: &Path) -> Context {
        let global = GlobalContext::new(script_dir, "citree-test-").unwrap();
        global.root_context(Environment::new(), Logger::root("test"))
    }

    #[test]
    fn test_root_context_sets_script_dir() {
        let dir = TempDir::new().unwrap();
        let ctx = make_root(dir.path());

        assert_eq!(ctx.working_dir(), dir.path());
        assert_eq!(
            ctx.get_env("scriptdir"),
            Some(dir.path().to_string_lossy().into_owned())
        );
    }

    #[test]
    fn test_sub_copies_environment() {
        let dir = TempDir::new().unwrap();
        let mut parent = make_root(dir.path());
        parent.set_env("A", "parent");

        let mut left = parent.sub("left");
        let right = parent.sub("right");
        left.set_env("A", "left");
        left.set_env("ONLY_LEFT", "1");

        assert_eq!(parent.get_env("A").as_deref(), Some("parent"));
        assert_eq!(right.get_env("A").as_deref(), Some("parent"));
        assert_eq!(right.get_env("ONLY_LEFT"), None);
        assert_eq!(left.logger().scope(), "test/left");
    }

    #[test]
    fn test_global_env_fallback() {
        let dir = TempDir::new().unwrap();
        let mut ctx = make_root(dir.path());
        let sibling = ctx.sub("sibling");

        ctx.global().set_env("SHARED", "yes");
        ctx.set_env("LOCAL", "1");

        assert_eq!(sibling.get_env("SHARED").as_deref(), Some("yes"));
        assert_eq!(sibling.get_env("LOCAL"), None);

        ctx.set_env("SHARED", "mine");
        assert_eq!(ctx.get_env("SHARED").as_deref(), Some("mine"));
        assert_eq!(ctx.process_env().get("SHARED"), Some("mine"));
        assert_eq!(sibling.process_env().get("SHARED"), Some("yes"));
    }

    #[test]
    fn test_expand_env_partial_result() {
        let dir = TempDir::new().unwrap();
        let mut ctx = make_root(dir.path());
        ctx.set_env("A", "x");

        match ctx.expand_env("$A/$B") {
            Err(CitreeError::UndefinedVariables { names, partial }) => {
                assert_eq!(names, vec!["B"]);
                assert_eq!(partial, "x/$B");
            }
            other => panic!("expected undefined variables, got {other:?}"),
        }
    }

    #[test]
    fn test_confine_glob() {
        let dir = TempDir::new().unwrap();
        let ctx = make_root(dir.path());

        assert!(ctx.confine_glob("src/*.rs").is_ok());
        assert!(ctx.confine_glob("$SCRIPTDIR/*").is_ok());

        let temp = ctx.global().temp_root().join("*").to_string_lossy().into_owned();
        assert!(ctx.confine_glob(&temp).is_ok());

        let err = ctx.confine_glob("../*").unwrap_err();
        assert!(matches!(err, CitreeError::GlobOutsideRoot { .. }));
    }

    #[test]
    fn test_confine_glob_rejects_roots_themselves() {
        let dir = TempDir::new().unwrap();
        let ctx = make_root(dir.path());
        let temp_root = ctx.global().temp_root().to_string_lossy().into_owned();

        for pattern in [".", "$SCRIPTDIR", "$SCRIPTDIR/", "sub/..", temp_root.as_str()] {
            let err = ctx.confine_glob(pattern).unwrap_err();
            assert!(
                matches!(err, CitreeError::GlobMatchesRoot { .. }),
                "{pattern}: {err:?}"
            );
        }

        assert!(ctx.confine_glob("./*").is_ok());
        assert!(ctx.confine_glob("sub").is_ok());
        assert!(ctx.confine_path(".").is_ok());
        assert!(ctx.confine_path("..").is_err());
    }

    #[test]
    fn test_temp_dirs_are_unique_and_increasing() {
        let dir = TempDir::new().unwrap();
        let global = GlobalContext::new(dir.path(), "citree-test-").unwrap();

        let first = global.create_temp_dir("gopath").unwrap();
        let second = global.create_temp_dir("gopath").unwrap();

        assert!(first.is_dir());
        assert!(second.is_dir());
        assert!(first.ends_with("gopath-1"));
        assert!(second.ends_with("gopath-2"));
    }

    #[test]
    fn test_temp_dirs_concurrent() {
        let dir = TempDir::new().unwrap();
        let global = GlobalContext::new(dir.path(), "citree-test-").unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let global = Arc::clone(&global);
                std::thread::spawn(move || {
                    (0..8)
                        .map(|_| global.create_temp_dir("t").unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            let mut last = 0;
            for path in handle.join().unwrap() {
                let name = path.file_name().unwrap().to_string_lossy().into_owned();
                let id: u64 = name.trim_start_matches("t-").parse().unwrap();
                // ids seen by one caller keep increasing
                assert!(id > last);
                last = id;
                assert!(ids.insert(id), "duplicate temp dir id {id}");
            }
        }

        assert_eq!(ids.len(), 128);
        assert_eq!(global.temp_dirs_created(), 128);
    }

    #[test]
    fn test_cleanup_runs_once() {
        let dir = TempDir::new().unwrap();
        let global = GlobalContext::new(dir.path(), "citree-test-").unwrap();
        let temp = global.create_temp_dir("x").unwrap();

        global.cleanup().unwrap();
        assert!(!temp.exists());
        assert!(!global.temp_root().exists());

        global.cleanup().unwrap();
        assert!(global.create_temp_dir("x").is_err());
    }
}
