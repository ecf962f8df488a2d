//! Script bundle transfer.
//!
//! Copies a script bundle directory to a new location while leaving out the
//! files an engine regenerates: its own source files (matched by extension),
//! the exported `.html` view, and Jython's compiled `$py.class` files. Used
//! when a script is moved between runners or saved under a new name.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::engine::ScriptEngine;

/// Suffixes always excluded from a transfer.
const GENERATED_SUFFIXES: [&str; 2] = [".html", ".$py.class"];

/// Errors from a script transfer.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("source is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to copy {from} -> {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Counts from a finished transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub copied: usize,
    pub skipped: usize,
}

/// Whether `file_name` is excluded when transferring a bundle for an engine
/// handling `extensions`.
pub fn is_excluded(file_name: &str, extensions: &[String]) -> bool {
    GENERATED_SUFFIXES
        .iter()
        .any(|suffix| file_name.ends_with(suffix))
        || extensions
            .iter()
            .any(|ext| file_name.ends_with(&format!(".{ext}")))
}

/// Copy the bundle at `src` into `dest`, skipping files owned by `engine`.
///
/// Directory structure is preserved; `dest` is created if missing.
pub fn transfer_script(
    src: &Path,
    dest: &Path,
    engine: &dyn ScriptEngine,
) -> Result<TransferReport, TransferError> {
    if !src.is_dir() {
        return Err(TransferError::NotADirectory(src.to_path_buf()));
    }
    create_dir(dest)?;

    let mut report = TransferReport::default();
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|source| TransferError::Walk {
            path: src.to_path_buf(),
            source,
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .unwrap_or_else(|_| entry.path());
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            create_dir(&target)?;
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if is_excluded(&name, engine.extensions()) {
            debug!(file = %relative.display(), engine = %engine.kind(), "Skipping on transfer");
            report.skipped += 1;
            continue;
        }

        std::fs::copy(entry.path(), &target).map_err(|source| TransferError::Copy {
            from: entry.path().to_path_buf(),
            to: target.clone(),
            source,
        })?;
        report.copied += 1;
    }

    debug!(
        src = %src.display(),
        dest = %dest.display(),
        copied = report.copied,
        skipped = report.skipped,
        "Script transferred"
    );
    Ok(report)
}

fn create_dir(path: &Path) -> Result<(), TransferError> {
    std::fs::create_dir_all(path).map_err(|source| TransferError::Copy {
        from: path.to_path_buf(),
        to: path.to_path_buf(),
        source,
    })
}
