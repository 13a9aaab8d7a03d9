use std::collections::HashMap;
use tracing::trace;

/// Per-request execution context for a payment attempt.
///
/// Backend gateway code expects "current customer/cart" style state to exist
/// while it runs. That state is not shared between requests: each completion
/// call constructs its own context, handlers stage values into it during
/// prepare, gateways read them during process, and finalize clears them so a
/// failed attempt cannot leak into a later one.
#[derive(Debug, Default)]
pub struct PaymentContext {
    initialized: bool,
    staged: HashMap<String, String>,
}

impl PaymentContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent; safe to call more than once per request.
    pub fn ensure_initialized(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        trace!("payment context initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn stage(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.staged.insert(key.into(), value.into());
    }

    pub fn staged(&self, key: &str) -> Option<&str> {
        self.staged.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) {
        self.staged.remove(key);
    }

    pub fn clear_staged(&mut self) {
        self.staged.clear();
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }
}
