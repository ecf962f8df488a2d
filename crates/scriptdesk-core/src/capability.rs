//! File-extension capability index.
//!
//! Maps an extension token (`"py"`, `"rb"`) to whatever handles it: a
//! registered engine, or an editor-support adapter. The index is built once
//! from an ordered list and never mutated afterwards. When two entries claim
//! the same extension the earlier one wins and the collision is logged.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::EngineHandle;

/// Errors from capability lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("no handler registered for extension '{0}'")]
    NotFound(String),

    #[error("editor support '{name}' could not report its file types: {reason}")]
    Types { name: String, reason: String },
}

/// Anything that can own extensions in a [`CapabilityIndex`].
pub trait Capability {
    /// Name used in logs.
    fn label(&self) -> &str;
}

impl Capability for EngineHandle {
    fn label(&self) -> &str {
        self.kind()
    }
}

/// Editor-side support for a script type (syntax rules, indentation,
/// snippets), registered per file type.
pub trait EditorSupport: Send + Sync {
    /// Adapter name.
    fn name(&self) -> &str;

    /// File types (extensions) the adapter supports.
    fn file_types(&self) -> Result<Vec<String>, CapabilityError>;
}

impl Capability for Arc<dyn EditorSupport> {
    fn label(&self) -> &str {
        self.name()
    }
}

/// Lower-case an extension token and drop a leading dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

struct Slot<T> {
    owner: usize,
    entry: T,
}

/// Read-only extension → handler lookup.
pub struct CapabilityIndex<T> {
    slots: HashMap<String, Slot<T>>,
    collisions: usize,
}

impl<T: Capability + Clone> CapabilityIndex<T> {
    /// Build an index from `(entry, extensions)` pairs in precedence order.
    pub fn build<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = (T, Vec<S>)>,
        S: AsRef<str>,
    {
        let mut slots: HashMap<String, Slot<T>> = HashMap::new();
        let mut collisions = 0;

        for (owner, (entry, extensions)) in items.into_iter().enumerate() {
            for ext in &extensions {
                let key = normalize_extension(ext.as_ref());
                if key.is_empty() {
                    continue;
                }
                match slots.entry(key) {
                    Entry::Occupied(existing) if existing.get().owner == owner => {}
                    Entry::Occupied(existing) => {
                        collisions += 1;
                        warn!(
                            extension = %existing.key(),
                            kept = %existing.get().entry.label(),
                            ignored = %entry.label(),
                            "Extension claimed twice; keeping earlier handler"
                        );
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(Slot {
                            owner,
                            entry: entry.clone(),
                        });
                    }
                }
            }
        }

        debug!(extensions = slots.len(), collisions, "Capability index built");
        Self { slots, collisions }
    }
}

impl CapabilityIndex<EngineHandle> {
    /// Index registered engines by their declared extensions.
    ///
    /// `engines` must be in discovery order.
    pub fn for_engines(engines: &[EngineHandle]) -> Self {
        Self::build(
            engines
                .iter()
                .map(|handle| (handle.clone(), handle.extensions().to_vec())),
        )
    }
}

impl CapabilityIndex<Arc<dyn EditorSupport>> {
    /// Index editor-support adapters by their file types.
    ///
    /// An adapter that fails to report its types is skipped.
    pub fn for_editor_support(adapters: &[Arc<dyn EditorSupport>]) -> Self {
        let items = adapters.iter().filter_map(|adapter| match adapter.file_types() {
            Ok(types) => Some((Arc::clone(adapter), types)),
            Err(error) => {
                warn!(adapter = %adapter.name(), %error, "Skipping editor support");
                None
            }
        });
        Self::build(items)
    }
}

impl<T> CapabilityIndex<T> {
    /// Look up the handler for `extension` (case-insensitive, leading dot
    /// optional).
    pub fn resolve(&self, extension: &str) -> Result<&T, CapabilityError> {
        let key = normalize_extension(extension);
        self.slots
            .get(&key)
            .map(|slot| &slot.entry)
            .ok_or(CapabilityError::NotFound(key))
    }

    /// Look up the handler for a file by its extension.
    pub fn resolve_path(&self, path: &Path) -> Result<&T, CapabilityError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| CapabilityError::NotFound(path.display().to_string()))?;
        self.resolve(ext)
    }

    /// All indexed extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }

    /// Number of extension claims that lost to an earlier handler.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Number of indexed extensions.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
