//! Plain-text engine.
//!
//! Handles `.txt` scripts. Has no interpreter to bootstrap, so warm-up
//! completes immediately and the engine is available on every platform.

use crate::BoxFuture;

use super::{EngineError, ScriptEngine};

/// Engine for plain-text scripts.
pub struct TextEngine {
    extensions: Vec<String>,
}

impl TextEngine {
    /// Create a text engine handling `.txt`.
    pub fn new() -> Self {
        Self {
            extensions: vec!["txt".to_string()],
        }
    }
}

impl Default for TextEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine for TextEngine {
    fn kind(&self) -> &str {
        "text"
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn warm_up(&self) -> BoxFuture<'_, Result<(), EngineError>> {
        Box::pin(async {
            tracing::debug!(engine = "text", "Nothing to warm up");
            Ok(())
        })
    }
}
