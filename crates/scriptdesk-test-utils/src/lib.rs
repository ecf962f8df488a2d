#![deny(unsafe_code)]

//! Shared test utilities for the ScriptDesk workspace.
//!
//! Stub engines with scripted warm-up behaviour, a fake pointer platform, a
//! fatal reporter that panics instead of exiting, config builders, and
//! tracing helpers.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! scriptdesk-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod engines;
pub mod fatal;
pub mod pointer;
pub mod tracing_setup;

pub use engines::{DiscoveryCounter, StubEngine, WarmupPlan};
pub use fatal::PanickingReporter;
pub use pointer::FakePointer;
