//! Runner registry: discovery, default selection, and lazy one-time setup.
//!
//! The [`EngineRegistry`] is an explicit context object: build one per
//! process (or per test) and hand it to whoever needs runners. Nothing
//! happens at construction time. The first call that needs the runner list
//! performs discovery under the registry's guard:
//!
//! 1. invoke every registered [`EngineFactory`] once and keep the engines
//!    that report themselves [`available`](crate::engine::ScriptEngine::available);
//! 2. walk the candidate kinds in canonical order, taking the first
//!    available engine of each kind;
//! 3. if nothing was found, hand over to the [`FatalReporter`] (which does
//!    not return);
//! 4. otherwise make the first engine the default, build the capability
//!    indexes for engines and editor-support adapters, and start parallel
//!    warm-up.
//!
//! Concurrent callers block on the guard until step 4 is done (not until
//! warm-up finishes). After that every read goes through an immutable
//! snapshot without touching the guard.

use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use scriptdesk_config::RegistryConfig;
use serde::Serialize;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, error, info};

use crate::capability::{CapabilityError, CapabilityIndex, EditorSupport};
use crate::engine::{EngineFactory, EngineHandle, EngineState, ScriptEngine};
use crate::warmup::{WarmupCoordinator, WarmupError, WarmupSummary};

/// Message shown when no engine could be discovered.
pub const NO_RUNNER_MESSAGE: &str = "Terminating: No script runner available";

/// Title of the fatal dialog shown when no engine could be discovered.
pub const NO_RUNNER_TITLE: &str = "IDE has problems ...";

/// Errors from the runner registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no script runner available")]
    DiscoveryEmpty,

    #[error("runner registry queried before initialization")]
    NotInitialized,

    #[error("engine discovery panicked; registry is unusable")]
    DiscoveryPanicked,

    #[error("runner registry requires a tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Warmup(#[from] WarmupError),
}

/// Surface for unrecoverable startup errors.
///
/// Implementations show `message` to the user and terminate the process;
/// the method never returns.
pub trait FatalReporter: Send + Sync {
    fn report_fatal(&self, message: &str, title: &str) -> !;
}

/// Logs the error, prints it to stderr, and exits with status 1.
pub struct ExitProcess;

impl FatalReporter for ExitProcess {
    fn report_fatal(&self, message: &str, title: &str) -> ! {
        error!(title, "{message}");
        eprintln!("{title}\n{message}");
        std::process::exit(1)
    }
}

/// Where the registry is in its one-time initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitState {
    NotStarted,
    InProgress,
    Done,
    /// Discovery came up empty and the fatal reporter was invoked.
    Fatal,
}

struct Snapshot {
    engines: Vec<EngineHandle>,
    default: EngineHandle,
    capabilities: CapabilityIndex<EngineHandle>,
    editor_support: CapabilityIndex<Arc<dyn EditorSupport>>,
    warmup: WarmupCoordinator,
}

/// Registry of script engines available to the IDE.
pub struct EngineRegistry {
    candidates: Vec<String>,
    factories: Vec<EngineFactory>,
    editor_support: Vec<Arc<dyn EditorSupport>>,
    fatal: Arc<dyn FatalReporter>,
    warmup_timeout: Option<Duration>,
    runtime: Handle,
    state: Mutex<InitState>,
    snapshot: OnceLock<Snapshot>,
}

impl EngineRegistry {
    /// Start building a registry with the default candidate order.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Run discovery, default selection, and warm-up start if no caller has
    /// done so yet.
    ///
    /// Safe to call from any number of threads. If discovery finds no
    /// engine the fatal reporter is invoked exactly once; later calls return
    /// [`RegistryError::DiscoveryEmpty`].
    pub fn init(&self) -> Result<(), RegistryError> {
        if self.snapshot.get().is_some() {
            return Ok(());
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            InitState::Done => return Ok(()),
            InitState::Fatal => return Err(RegistryError::DiscoveryEmpty),
            // Only a panic inside discovery leaves this behind.
            InitState::InProgress => return Err(RegistryError::DiscoveryPanicked),
            InitState::NotStarted => {}
        }
        *state = InitState::InProgress;

        let engines = self.discover();
        if engines.is_empty() {
            *state = InitState::Fatal;
            drop(state);
            error!(candidates = ?self.candidates, "No script runner discovered");
            self.fatal.report_fatal(NO_RUNNER_MESSAGE, NO_RUNNER_TITLE);
        }

        for handle in &engines {
            handle.transition(EngineState::Unregistered, EngineState::Registered);
        }

        let snapshot = self.snapshot.get_or_init(|| Snapshot {
            default: engines[0].clone(),
            capabilities: CapabilityIndex::for_engines(&engines),
            editor_support: CapabilityIndex::for_editor_support(&self.editor_support),
            warmup: WarmupCoordinator::start(&self.runtime, engines.clone(), self.warmup_timeout),
            engines,
        });
        *state = InitState::Done;

        info!(
            default = %snapshot.default.kind(),
            runners = snapshot.engines.len(),
            "Runner registry initialized"
        );
        Ok(())
    }

    /// Availability checks may touch the filesystem (a `PATH` search for
    /// interpreters). On a multi-threaded runtime they run inside
    /// [`block_in_place`](tokio::task::block_in_place); elsewhere inline.
    fn discover(&self) -> Vec<EngineHandle> {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| self.discover_engines())
            }
            _ => self.discover_engines(),
        }
    }

    fn discover_engines(&self) -> Vec<EngineHandle> {
        let available: Vec<Arc<dyn ScriptEngine>> = self
            .factories
            .iter()
            .map(|make| make())
            .filter(|engine| {
                let available = engine.available();
                if !available {
                    debug!(engine = %engine.kind(), "Engine not available on this platform");
                }
                available
            })
            .collect();

        let mut engines: Vec<EngineHandle> = Vec::with_capacity(self.candidates.len());
        for kind in &self.candidates {
            match available.iter().find(|engine| engine.kind() == kind) {
                Some(engine) => {
                    debug!(engine = %kind, position = engines.len(), "Discovered runner");
                    engines.push(EngineHandle::new(engines.len(), Arc::clone(engine)));
                }
                None => debug!(engine = %kind, "Candidate runner not discovered"),
            }
        }

        for engine in &available {
            if !self.candidates.iter().any(|kind| kind == engine.kind()) {
                debug!(engine = %engine.kind(), "Ignoring engine outside the candidate list");
            }
        }

        engines
    }

    fn snapshot(&self) -> Result<&Snapshot, RegistryError> {
        self.init()?;
        self.snapshot.get().ok_or(RegistryError::NotInitialized)
    }

    /// Current initialization state.
    pub fn init_state(&self) -> InitState {
        if self.snapshot.get().is_some() {
            return InitState::Done;
        }
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the runner list in discovery order, initializing first if
    /// needed.
    pub fn runners(&self) -> Result<Vec<EngineHandle>, RegistryError> {
        Ok(self.snapshot()?.engines.clone())
    }

    /// The default runner. Does not initialize.
    pub fn default_runner(&self) -> Result<EngineHandle, RegistryError> {
        self.snapshot
            .get()
            .map(|snapshot| snapshot.default.clone())
            .ok_or(RegistryError::NotInitialized)
    }

    /// Extension → engine index over the discovered runners.
    pub fn capabilities(&self) -> Result<&CapabilityIndex<EngineHandle>, RegistryError> {
        Ok(&self.snapshot()?.capabilities)
    }

    /// Extension → editor-support adapter index.
    pub fn editor_support(
        &self,
    ) -> Result<&CapabilityIndex<Arc<dyn EditorSupport>>, RegistryError> {
        Ok(&self.snapshot()?.editor_support)
    }

    /// Engine handling `extension`.
    pub fn resolve(&self, extension: &str) -> Result<EngineHandle, RegistryError> {
        Ok(self.capabilities()?.resolve(extension)?.clone())
    }

    /// Engine handling the file at `path`, by extension.
    pub fn resolve_path(&self, path: &Path) -> Result<EngineHandle, RegistryError> {
        Ok(self.capabilities()?.resolve_path(path)?.clone())
    }

    /// Warm-up progress for the discovered runners.
    pub fn coordinator(&self) -> Result<&WarmupCoordinator, RegistryError> {
        Ok(&self.snapshot()?.warmup)
    }

    /// Wait for every runner's warm-up to settle.
    pub async fn wait_all_settled(&self) -> Result<WarmupSummary, RegistryError> {
        Ok(self.coordinator()?.wait_all_settled().await?)
    }

    /// Abandon outstanding warm-ups. Returns how many were abandoned.
    pub fn shutdown(&self) -> usize {
        match self.snapshot.get() {
            Some(snapshot) => snapshot.warmup.abandon(),
            None => 0,
        }
    }
}

/// Builder for [`EngineRegistry`].
pub struct RegistryBuilder {
    candidates: Vec<String>,
    factories: Vec<EngineFactory>,
    editor_support: Vec<Arc<dyn EditorSupport>>,
    fatal: Option<Arc<dyn FatalReporter>>,
    warmup_timeout: Option<Duration>,
    runtime: Option<Handle>,
}

impl RegistryBuilder {
    /// Builder with the default candidate order and no factories.
    pub fn new() -> Self {
        Self::from_config(&RegistryConfig::default())
    }

    /// Builder seeded from the `[registry]` config section.
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self {
            candidates: config.candidates.clone(),
            factories: Vec::new(),
            editor_support: Vec::new(),
            fatal: None,
            warmup_timeout: config.warmup_timeout(),
            runtime: None,
        }
    }

    /// Builder: replace the canonical candidate order.
    pub fn candidates<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: register an engine factory.
    pub fn factory(mut self, factory: EngineFactory) -> Self {
        self.factories.push(factory);
        self
    }

    /// Builder: register several engine factories.
    pub fn factories(mut self, factories: impl IntoIterator<Item = EngineFactory>) -> Self {
        self.factories.extend(factories);
        self
    }

    /// Builder: register an editor-support adapter. Earlier adapters win
    /// extension collisions.
    pub fn editor_support(mut self, adapter: Arc<dyn EditorSupport>) -> Self {
        self.editor_support.push(adapter);
        self
    }

    /// Builder: set the fatal-error surface (defaults to [`ExitProcess`]).
    pub fn fatal_reporter(mut self, reporter: Arc<dyn FatalReporter>) -> Self {
        self.fatal = Some(reporter);
        self
    }

    /// Builder: bound each engine's warm-up.
    pub fn warmup_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.warmup_timeout = timeout;
        self
    }

    /// Builder: runtime used for warm-up tasks (defaults to the current one).
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the registry. Discovery is deferred until first use.
    pub fn build(self) -> Result<EngineRegistry, RegistryError> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| RegistryError::NoRuntime)?,
        };
        Ok(EngineRegistry {
            candidates: self.candidates,
            factories: self.factories,
            editor_support: self.editor_support,
            fatal: self.fatal.unwrap_or_else(|| Arc::new(ExitProcess)),
            warmup_timeout: self.warmup_timeout,
            runtime,
            state: Mutex::new(InitState::NotStarted),
            snapshot: OnceLock::new(),
        })
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
