//! Stub engines with scripted warm-up behaviour.
//!
//! ```ignore
//! let counter = DiscoveryCounter::new();
//! let registry = EngineRegistry::builder()
//!     .candidates(["a", "b"])
//!     .factory(counter.factory(StubEngine::new("a", &["a"])))
//!     .factory(counter.factory(StubEngine::new("b", &["b"]).warmup(WarmupPlan::Hang)))
//!     .build()?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use scriptdesk_core::BoxFuture;
use scriptdesk_core::engine::{EngineError, EngineFactory, ScriptEngine};
use tokio::sync::Notify;

/// What a [`StubEngine`] does when warmed up.
#[derive(Clone)]
pub enum WarmupPlan {
    /// Finish immediately.
    Succeed,
    /// Return a warm-up error with this reason.
    Fail(String),
    /// Never finish.
    Hang,
    /// Finish after the given delay.
    Delay(Duration),
    /// Finish once the gate is notified.
    Gate(Arc<Notify>),
}

/// Engine whose availability and warm-up outcome are fixed up front.
#[derive(Clone)]
pub struct StubEngine {
    kind: String,
    extensions: Vec<String>,
    available: bool,
    plan: WarmupPlan,
    warmups: Arc<AtomicUsize>,
}

impl StubEngine {
    /// Available engine that warms up successfully.
    pub fn new(kind: &str, extensions: &[&str]) -> Self {
        Self {
            kind: kind.to_string(),
            extensions: extensions.iter().map(|s| s.to_string()).collect(),
            available: true,
            plan: WarmupPlan::Succeed,
            warmups: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Builder: set the warm-up plan.
    pub fn warmup(mut self, plan: WarmupPlan) -> Self {
        self.plan = plan;
        self
    }

    /// Builder: report the engine as unavailable on this platform.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// How many times `warm_up` was called on this engine or its clones.
    pub fn warmup_calls(&self) -> usize {
        self.warmups.load(Ordering::SeqCst)
    }

    /// Factory producing clones of this engine.
    pub fn factory(self) -> EngineFactory {
        Box::new(move || Arc::new(self.clone()) as Arc<dyn ScriptEngine>)
    }
}

impl ScriptEngine for StubEngine {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn available(&self) -> bool {
        self.available
    }

    fn warm_up(&self) -> BoxFuture<'_, Result<(), EngineError>> {
        self.warmups.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            match &self.plan {
                WarmupPlan::Succeed => Ok(()),
                WarmupPlan::Fail(reason) => Err(EngineError::warmup(&self.kind, reason.as_str())),
                WarmupPlan::Hang => std::future::pending().await,
                WarmupPlan::Delay(delay) => {
                    tokio::time::sleep(*delay).await;
                    Ok(())
                }
                WarmupPlan::Gate(gate) => {
                    gate.notified().await;
                    Ok(())
                }
            }
        })
    }
}

/// Counts factory invocations, i.e. how many discovery passes ran.
#[derive(Clone, Default)]
pub struct DiscoveryCounter {
    calls: Arc<AtomicUsize>,
}

impl DiscoveryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `engine` in a factory that bumps this counter on every call.
    pub fn factory(&self, engine: StubEngine) -> EngineFactory {
        let calls = Arc::clone(&self.calls);
        Box::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Arc::new(engine.clone()) as Arc<dyn ScriptEngine>
        })
    }

    /// Total factory invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
