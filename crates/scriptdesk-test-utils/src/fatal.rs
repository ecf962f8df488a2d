//! Fatal reporter for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use scriptdesk_core::FatalReporter;

/// Records the fatal report and panics instead of exiting the process.
///
/// Catch the panic with `std::panic::catch_unwind` (or run the call on a
/// separate thread) to assert that the caller never returned normally.
#[derive(Default)]
pub struct PanickingReporter {
    calls: AtomicUsize,
    last: Mutex<Option<(String, String)>>,
}

impl PanickingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fatal reports received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The last `(message, title)` reported.
    pub fn last(&self) -> Option<(String, String)> {
        self.last.lock().ok().and_then(|last| last.clone())
    }
}

impl FatalReporter for PanickingReporter {
    fn report_fatal(&self, message: &str, title: &str) -> ! {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last.lock() {
            *last = Some((message.to_string(), title.to_string()));
        }
        panic!("fatal report: {title}: {message}");
    }
}
