//! Script engines: the pluggable execution backends behind the runner registry.
//!
//! An engine is identified by its *kind* (e.g. `"python"`) and the file
//! extensions it handles. The registry never inspects how an engine runs
//! scripts; it only needs to know whether the engine is available on this
//! platform and how to warm it up before first use.
//!
//! ## Lifecycle
//!
//! ```text
//! Unregistered ──publish──▶ Registered ──spawn──▶ Initializing ─┬─▶ Ready
//!                                                               ├─▶ Failed
//!                                                               └─▶ Abandoned
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::BoxFuture;

/// Plain-text engine (always available).
pub mod text;
/// Engines backed by an external interpreter process.
pub mod process;

pub use process::InterpreterEngine;
pub use text::TextEngine;

/// Errors raised by an engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("engine '{engine}' warm-up failed: {reason}")]
    WarmupFailed { engine: String, reason: String },

    #[error("engine '{0}' is not available on this platform")]
    Unavailable(String),
}

impl EngineError {
    /// Shorthand for a [`EngineError::WarmupFailed`].
    pub fn warmup(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WarmupFailed {
            engine: engine.into(),
            reason: reason.into(),
        }
    }
}

/// A pluggable script-execution backend.
///
/// Methods returning futures use [`BoxFuture`] so engines can be held as
/// `Arc<dyn ScriptEngine>`.
pub trait ScriptEngine: Send + Sync {
    /// Engine kind, matched against the registry's candidate list.
    fn kind(&self) -> &str;

    /// File extensions (without the leading dot) this engine handles, in
    /// preference order.
    fn extensions(&self) -> &[String];

    /// Whether this engine can run on the current platform.
    fn available(&self) -> bool {
        true
    }

    /// Engine-specific initialization (interpreter bootstrap, class loading)
    /// performed ahead of the first script run.
    fn warm_up(&self) -> BoxFuture<'_, Result<(), EngineError>>;
}

/// Constructor registered with the registry for discovery.
pub type EngineFactory = Box<dyn Fn() -> Arc<dyn ScriptEngine> + Send + Sync>;

/// Wrap a constructor into an [`EngineFactory`].
pub fn factory<F, E>(make: F) -> EngineFactory
where
    F: Fn() -> E + Send + Sync + 'static,
    E: ScriptEngine + 'static,
{
    Box::new(move || Arc::new(make()) as Arc<dyn ScriptEngine>)
}

/// Factories for the engines that ship with ScriptDesk.
pub fn builtin_factories() -> Vec<EngineFactory> {
    vec![
        factory(InterpreterEngine::jython),
        factory(InterpreterEngine::python),
        factory(InterpreterEngine::jruby),
        factory(TextEngine::new),
    ]
}

// ── Lifecycle state ─────────────────────────────────────────────────────

/// Lifecycle state of a registered engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// Produced by discovery but not yet published in the registry.
    Unregistered,
    /// Published; warm-up not started.
    Registered,
    /// Warm-up task running.
    Initializing,
    /// Warm-up finished successfully.
    Ready,
    /// Warm-up returned an error or timed out.
    Failed,
    /// Warm-up still running when the registry shut down.
    Abandoned,
}

impl EngineState {
    /// Whether warm-up has reached a terminal outcome.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::Abandoned)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Unregistered,
            1 => Self::Registered,
            2 => Self::Initializing,
            3 => Self::Ready,
            4 => Self::Failed,
            _ => Self::Abandoned,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unregistered => "unregistered",
            Self::Registered => "registered",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

// ── Engine handle ───────────────────────────────────────────────────────

struct HandleInner {
    position: usize,
    engine: Arc<dyn ScriptEngine>,
    state: AtomicU8,
    failure: Mutex<Option<EngineError>>,
}

/// A registered engine: the engine itself, its discovery position, and its
/// lifecycle state.
///
/// Cloning is cheap; all clones observe the same state. Equality is
/// identity of the underlying registration.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<HandleInner>,
}

impl EngineHandle {
    pub(crate) fn new(position: usize, engine: Arc<dyn ScriptEngine>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                position,
                engine,
                state: AtomicU8::new(EngineState::Unregistered as u8),
                failure: Mutex::new(None),
            }),
        }
    }

    /// Index in discovery order (0 is the default runner).
    pub fn position(&self) -> usize {
        self.inner.position
    }

    /// Engine kind.
    pub fn kind(&self) -> &str {
        self.inner.engine.kind()
    }

    /// File extensions handled by this engine.
    pub fn extensions(&self) -> &[String] {
        self.inner.engine.extensions()
    }

    /// The engine behind this handle.
    pub fn engine(&self) -> &Arc<dyn ScriptEngine> {
        &self.inner.engine
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Whether warm-up completed successfully.
    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// The warm-up error, if the engine is [`EngineState::Failed`].
    pub fn failure(&self) -> Option<EngineError> {
        self.inner
            .failure
            .lock()
            .map(|f| f.clone())
            .unwrap_or_default()
    }

    /// Move from `from` to `to`; returns `false` if the state was not `from`.
    pub(crate) fn transition(&self, from: EngineState, to: EngineState) -> bool {
        self.inner
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record a warm-up error and move `Initializing → Failed`.
    pub(crate) fn fail(&self, error: EngineError) -> bool {
        if !self.transition(EngineState::Initializing, EngineState::Failed) {
            return false;
        }
        if let Ok(mut slot) = self.inner.failure.lock() {
            *slot = Some(error);
        }
        true
    }
}

impl PartialEq for EngineHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for EngineHandle {}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("position", &self.position())
            .field("kind", &self.kind())
            .field("extensions", &self.extensions())
            .field("state", &self.state())
            .finish()
    }
}
