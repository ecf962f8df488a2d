#![deny(unsafe_code)]

//! ScriptDesk core runtime.
//!
//! Provides the runner registry used by the IDE: engine discovery, default
//! runner selection, parallel warm-up, and extension-based lookup. Also
//! hosts the pointer device used by automation scripts and the script
//! bundle transfer helper.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future. The return type for trait
/// methods that must stay object-safe (`Arc<dyn ScriptEngine>`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Extension → handler lookup for engines and editor support.
pub mod capability;
/// Script engine trait, lifecycle state, and built-in engines.
pub mod engine;
/// Mouse pointer probing and calibration.
pub mod pointer;
/// Runner registry with one-time discovery.
pub mod registry;
/// Script bundle copying that skips engine-owned files.
pub mod transfer;
/// Parallel engine warm-up tracking.
pub mod warmup;

pub use capability::{CapabilityError, CapabilityIndex, EditorSupport};
pub use engine::{EngineError, EngineHandle, EngineState, ScriptEngine};
pub use pointer::{Point, PointerDevice, PointerPlatform, is_nearby};
pub use registry::{EngineRegistry, FatalReporter, InitState, RegistryError};
pub use warmup::{WarmupCoordinator, WarmupSummary};
