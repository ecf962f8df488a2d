//! Interpreter-backed engines.
//!
//! An [`InterpreterEngine`] runs scripts through an external interpreter
//! (`python3`, `jython`, `jruby`). It is available when the interpreter can
//! be found, and warms up by launching the interpreter once with a trivial
//! program so the first real script run does not pay the bootstrap cost
//! of a cold interpreter and page cache.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::BoxFuture;

use super::{EngineError, ScriptEngine};

/// Engine that delegates to an external interpreter executable.
#[derive(Debug, Clone)]
pub struct InterpreterEngine {
    kind: String,
    program: PathBuf,
    warmup_args: Vec<String>,
    extensions: Vec<String>,
}

impl InterpreterEngine {
    /// Create an engine for `program`, warmed up by running it with
    /// `warmup_args`.
    pub fn new(
        kind: impl Into<String>,
        program: impl Into<PathBuf>,
        warmup_args: &[&str],
        extensions: &[&str],
    ) -> Self {
        Self {
            kind: kind.into(),
            program: program.into(),
            warmup_args: warmup_args.iter().map(|s| s.to_string()).collect(),
            extensions: extensions.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Jython runner for `.py` scripts.
    pub fn jython() -> Self {
        Self::new("jython", "jython", &["-c", "pass"], &["py"])
    }

    /// CPython runner for `.py` scripts.
    pub fn python() -> Self {
        Self::new("python", "python3", &["-c", "pass"], &["py"])
    }

    /// JRuby runner for `.rb` scripts.
    pub fn jruby() -> Self {
        Self::new("jruby", "jruby", &["-e", "nil"], &["rb"])
    }

    /// The interpreter executable.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Resolve the interpreter to an executable path.
    ///
    /// Paths with more than one component are taken as-is; bare names are
    /// searched for on `PATH`.
    pub fn locate(&self) -> Option<PathBuf> {
        if self.program.components().count() > 1 {
            return self.program.is_file().then(|| self.program.clone());
        }
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(&self.program))
            .find(|candidate| candidate.is_file())
    }
}

impl ScriptEngine for InterpreterEngine {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn available(&self) -> bool {
        self.locate().is_some()
    }

    fn warm_up(&self) -> BoxFuture<'_, Result<(), EngineError>> {
        Box::pin(async move {
            let program = self
                .locate()
                .ok_or_else(|| EngineError::Unavailable(self.kind.clone()))?;

            tracing::debug!(
                engine = %self.kind,
                program = %program.display(),
                "Bootstrapping interpreter"
            );

            let output = tokio::process::Command::new(&program)
                .args(&self.warmup_args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| EngineError::warmup(&self.kind, format!("spawn failed: {e}")))?;

            if output.status.success() {
                Ok(())
            } else {
                Err(EngineError::warmup(
                    &self.kind,
                    format!(
                        "interpreter exited with code {}: {}",
                        output.status.code().unwrap_or(-1),
                        String::from_utf8_lossy(&output.stderr).trim()
                    ),
                ))
            }
        })
    }
}
