//! Parallel engine warm-up.
//!
//! [`WarmupCoordinator`] starts one tokio task per registered engine so that
//! interpreter bootstrap costs overlap instead of adding up, and counts how
//! many of those tasks have *settled* (become ready, failed, or been
//! abandoned). A UI can poll [`ready_count`](WarmupCoordinator::ready_count)
//! for progress or await [`wait_all_settled`](WarmupCoordinator::wait_all_settled)
//! before the first script run.
//!
//! A failing warm-up only affects its own engine. Tasks cannot be cancelled
//! individually; [`abandon`](WarmupCoordinator::abandon) aborts whatever is
//! still running and marks those engines [`EngineState::Abandoned`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{EngineError, EngineHandle, EngineState};

/// Errors from waiting on warm-up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WarmupError {
    #[error("warm-up still pending after {waited:?} ({settled}/{total} engines settled)")]
    TimedOut {
        waited: Duration,
        settled: usize,
        total: usize,
    },

    #[error("warm-up coordinator shut down")]
    Closed,
}

/// Snapshot of warm-up progress across all engines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmupSummary {
    pub total: usize,
    pub ready: usize,
    pub failed: usize,
    pub abandoned: usize,
    pub pending: usize,
}

impl WarmupSummary {
    /// Whether every engine warmed up successfully.
    pub fn all_ready(&self) -> bool {
        self.ready == self.total
    }
}

struct Progress {
    ready: AtomicUsize,
    settled: watch::Sender<usize>,
}

impl Progress {
    fn record(&self, handle: &EngineHandle, outcome: Result<(), EngineError>) {
        match outcome {
            Ok(()) => {
                if handle.transition(EngineState::Initializing, EngineState::Ready) {
                    self.ready.fetch_add(1, Ordering::AcqRel);
                    self.settled.send_modify(|n| *n += 1);
                }
            }
            Err(error) => {
                if handle.fail(error) {
                    self.settled.send_modify(|n| *n += 1);
                }
            }
        }
    }

    fn abandon(&self, handle: &EngineHandle) -> bool {
        if handle.transition(EngineState::Initializing, EngineState::Abandoned) {
            self.settled.send_modify(|n| *n += 1);
            return true;
        }
        false
    }
}

/// Settles an engine whose warm-up future was dropped before finishing:
/// `Failed` if the task panicked, `Abandoned` if it was aborted.
struct SettleOnDrop {
    handle: EngineHandle,
    progress: Arc<Progress>,
}

impl Drop for SettleOnDrop {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let error = EngineError::warmup(self.handle.kind(), "warm-up panicked");
            self.progress.record(&self.handle, Err(error));
        } else {
            self.progress.abandon(&self.handle);
        }
    }
}

/// Tracks one warm-up task per engine.
pub struct WarmupCoordinator {
    engines: Vec<EngineHandle>,
    progress: Arc<Progress>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WarmupCoordinator {
    /// Spawn a warm-up task for every engine on `runtime`.
    ///
    /// Engines must be [`EngineState::Registered`]; each moves to
    /// `Initializing` before its task is spawned. Engines in any other state
    /// are left alone and not tracked. With `timeout` set, a
    /// warm-up that runs longer is recorded as failed.
    pub fn start(runtime: &Handle, engines: Vec<EngineHandle>, timeout: Option<Duration>) -> Self {
        let (settled, _) = watch::channel(0usize);
        let progress = Arc::new(Progress {
            ready: AtomicUsize::new(0),
            settled,
        });

        let mut tracked = Vec::with_capacity(engines.len());
        let mut tasks = Vec::with_capacity(engines.len());
        for handle in engines {
            if !handle.transition(EngineState::Registered, EngineState::Initializing) {
                debug!(engine = %handle.kind(), state = %handle.state(), "Skipping warm-up");
                continue;
            }
            tasks.push(runtime.spawn(warm_up(handle.clone(), Arc::clone(&progress), timeout)));
            tracked.push(handle);
        }
        let engines = tracked;

        info!(engines = engines.len(), "Engine warm-up started");

        Self {
            engines,
            progress,
            tasks: Mutex::new(tasks),
        }
    }

    /// Number of engines being tracked.
    pub fn total(&self) -> usize {
        self.engines.len()
    }

    /// Number of engines whose warm-up succeeded so far.
    pub fn ready_count(&self) -> usize {
        self.progress.ready.load(Ordering::Acquire)
    }

    /// Number of engines whose warm-up has reached any terminal outcome.
    pub fn settled_count(&self) -> usize {
        *self.progress.settled.borrow()
    }

    /// Per-state counts at this instant.
    pub fn summary(&self) -> WarmupSummary {
        let mut summary = WarmupSummary {
            total: self.engines.len(),
            ..WarmupSummary::default()
        };
        for handle in &self.engines {
            match handle.state() {
                EngineState::Ready => summary.ready += 1,
                EngineState::Failed => summary.failed += 1,
                EngineState::Abandoned => summary.abandoned += 1,
                _ => summary.pending += 1,
            }
        }
        summary
    }

    /// Wait until every engine has settled. Never times out.
    pub async fn wait_all_settled(&self) -> Result<WarmupSummary, WarmupError> {
        let total = self.total();
        let mut rx = self.progress.settled.subscribe();
        rx.wait_for(|settled| *settled >= total)
            .await
            .map_err(|_| WarmupError::Closed)?;
        Ok(self.summary())
    }

    /// Like [`wait_all_settled`](Self::wait_all_settled), giving up after `limit`.
    pub async fn wait_all_settled_timeout(
        &self,
        limit: Duration,
    ) -> Result<WarmupSummary, WarmupError> {
        match tokio::time::timeout(limit, self.wait_all_settled()).await {
            Ok(result) => result,
            Err(_) => Err(WarmupError::TimedOut {
                waited: limit,
                settled: self.settled_count(),
                total: self.total(),
            }),
        }
    }

    /// Abort outstanding warm-up tasks and mark their engines abandoned.
    ///
    /// Returns the number of engines abandoned. Engines that already
    /// settled keep their state.
    pub fn abandon(&self) -> usize {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        let abandoned = self
            .engines
            .iter()
            .filter(|handle| self.progress.abandon(handle))
            .count();
        if abandoned > 0 {
            warn!(abandoned, "Abandoned unfinished engine warm-ups");
        }
        abandoned
    }
}

async fn warm_up(handle: EngineHandle, progress: Arc<Progress>, timeout: Option<Duration>) {
    let guard = SettleOnDrop {
        handle: handle.clone(),
        progress: Arc::clone(&progress),
    };
    let engine = Arc::clone(handle.engine());
    let start = Instant::now();

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, engine.warm_up()).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::warmup(
                handle.kind(),
                format!("timed out after {limit:?}"),
            )),
        },
        None => engine.warm_up().await,
    };

    match &outcome {
        Ok(()) => info!(
            engine = %handle.kind(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Engine ready"
        ),
        Err(error) => warn!(engine = %handle.kind(), %error, "Engine warm-up failed"),
    }
    progress.record(&handle, outcome);
    drop(guard);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxFuture;
    use crate::engine::ScriptEngine;
    use tokio::sync::Notify;

    enum Plan {
        Succeed,
        Fail,
        Hang,
        WaitFor(Arc<Notify>),
        Panic,
    }

    struct Probe {
        kind: String,
        extensions: Vec<String>,
        plan: Plan,
    }

    impl Probe {
        fn handle(position: usize, kind: &str, plan: Plan) -> EngineHandle {
            let engine = Arc::new(Probe {
                kind: kind.to_string(),
                extensions: vec![kind.to_string()],
                plan,
            });
            let handle = EngineHandle::new(position, engine);
            handle.transition(EngineState::Unregistered, EngineState::Registered);
            handle
        }
    }

    impl ScriptEngine for Probe {
        fn kind(&self) -> &str {
            &self.kind
        }

        fn extensions(&self) -> &[String] {
            &self.extensions
        }

        fn warm_up(&self) -> BoxFuture<'_, Result<(), EngineError>> {
            Box::pin(async move {
                match &self.plan {
                    Plan::Succeed => Ok(()),
                    Plan::Fail => Err(EngineError::warmup(&self.kind, "no interpreter")),
                    Plan::Hang => std::future::pending().await,
                    Plan::WaitFor(gate) => {
                        gate.notified().await;
                        Ok(())
                    }
                    Plan::Panic => panic!("bootstrap exploded"),
                }
            })
        }
    }

    #[tokio::test]
    async fn test_all_engines_become_ready() {
        let engines = vec![
            Probe::handle(0, "a", Plan::Succeed),
            Probe::handle(1, "b", Plan::Succeed),
        ];
        let coordinator = WarmupCoordinator::start(&Handle::current(), engines.clone(), None);

        let summary = coordinator.wait_all_settled().await.unwrap();
        assert!(summary.all_ready());
        assert_eq!(coordinator.ready_count(), 2);
        assert_eq!(coordinator.settled_count(), 2);
        assert!(engines.iter().all(EngineHandle::is_ready));
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_siblings() {
        let engines = vec![
            Probe::handle(0, "a", Plan::Succeed),
            Probe::handle(1, "b", Plan::Fail),
            Probe::handle(2, "c", Plan::Succeed),
        ];
        let coordinator = WarmupCoordinator::start(&Handle::current(), engines.clone(), None);

        let summary = coordinator.wait_all_settled().await.unwrap();
        assert_eq!(summary.ready, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(engines[1].state(), EngineState::Failed);
        assert!(engines[1].failure().unwrap().to_string().contains("no interpreter"));
    }

    #[tokio::test]
    async fn test_hanging_engine_blocks_wait() {
        let engines = vec![
            Probe::handle(0, "a", Plan::Succeed),
            Probe::handle(1, "b", Plan::Hang),
            Probe::handle(2, "c", Plan::Succeed),
        ];
        let coordinator = WarmupCoordinator::start(&Handle::current(), engines, None);

        let err = coordinator
            .wait_all_settled_timeout(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            WarmupError::TimedOut {
                waited: Duration::from_millis(100),
                settled: 2,
                total: 3,
            }
        );
        assert_eq!(coordinator.summary().pending, 1);
    }

    #[tokio::test]
    async fn test_ready_count_tracks_progress() {
        let gate = Arc::new(Notify::new());
        let engines = vec![
            Probe::handle(0, "fast", Plan::Succeed),
            Probe::handle(1, "slow", Plan::WaitFor(Arc::clone(&gate))),
        ];
        let coordinator = WarmupCoordinator::start(&Handle::current(), engines, None);

        assert!(
            coordinator
                .wait_all_settled_timeout(Duration::from_millis(50))
                .await
                .is_err()
        );
        assert_eq!(coordinator.ready_count(), 1);

        gate.notify_one();
        let summary = coordinator.wait_all_settled().await.unwrap();
        assert_eq!(summary.ready, 2);
    }

    #[tokio::test]
    async fn test_warmup_timeout_marks_failed() {
        let engines = vec![Probe::handle(0, "stuck", Plan::Hang)];
        let coordinator = WarmupCoordinator::start(
            &Handle::current(),
            engines.clone(),
            Some(Duration::from_millis(20)),
        );

        let summary = coordinator.wait_all_settled().await.unwrap();
        assert_eq!(summary.failed, 1);
        assert!(engines[0].failure().unwrap().to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_panicking_warmup_is_failed() {
        let engines = vec![Probe::handle(0, "boom", Plan::Panic)];
        let coordinator = WarmupCoordinator::start(&Handle::current(), engines.clone(), None);

        let summary = coordinator.wait_all_settled().await.unwrap();
        assert_eq!(summary.failed, 1);
        assert!(engines[0].failure().unwrap().to_string().contains("panicked"));
    }

    #[tokio::test]
    async fn test_abandon_settles_outstanding_tasks() {
        let engines = vec![
            Probe::handle(0, "a", Plan::Succeed),
            Probe::handle(1, "b", Plan::Hang),
        ];
        let coordinator = WarmupCoordinator::start(&Handle::current(), engines.clone(), None);

        // Let the fast engine finish first.
        while coordinator.ready_count() < 1 {
            tokio::task::yield_now().await;
        }

        assert_eq!(coordinator.abandon(), 1);
        let summary = coordinator.wait_all_settled().await.unwrap();
        assert_eq!(summary.ready, 1);
        assert_eq!(summary.abandoned, 1);
        assert_eq!(engines[1].state(), EngineState::Abandoned);
        // Idempotent.
        assert_eq!(coordinator.abandon(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_engines_are_skipped() {
        let stray = EngineHandle::new(
            0,
            Arc::new(Probe {
                kind: "stray".to_string(),
                extensions: Vec::new(),
                plan: Plan::Succeed,
            }),
        );
        let engines = vec![stray.clone(), Probe::handle(1, "a", Plan::Succeed)];
        let coordinator = WarmupCoordinator::start(&Handle::current(), engines, None);
        assert_eq!(coordinator.total(), 1);

        let summary = coordinator
            .wait_all_settled_timeout(Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(summary.ready, 1);
        assert_eq!(summary.pending, 0);
        assert_eq!(stray.state(), EngineState::Unregistered);
    }

    #[tokio::test]
    async fn test_nothing_to_warm_up_settles_immediately() {
        let stray = EngineHandle::new(
            0,
            Arc::new(Probe {
                kind: "stray".to_string(),
                extensions: Vec::new(),
                plan: Plan::Succeed,
            }),
        );
        let coordinator = WarmupCoordinator::start(&Handle::current(), vec![stray], None);

        let summary = coordinator
            .wait_all_settled_timeout(Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(summary.total, 0);
    }
}
