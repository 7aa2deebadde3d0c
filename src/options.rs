//! Evaluation options: the closed configuration surface of spec §6.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::model::Collection;

/// A resolver callback for `resolve()`: given a reference string, returns
/// the referenced resource (or an error). Absent means `resolve()` yields
/// empty, per spec §6.
pub type Resolver = Arc<dyn Fn(&str) -> Result<Collection> + Send + Sync>;

/// An external cancellation handle. Cloning shares the same underlying
/// flag, so a caller can cancel from another thread.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The closed option set of spec §6.
#[derive(Clone)]
pub struct EvaluateOptions {
    /// External cancellation handle; `None` means non-cancellable.
    pub cancellation: Option<CancellationToken>,
    /// Wall-clock budget for a single evaluation.
    pub timeout: Duration,
    /// Recursion cap for `descendants()`/`repeat()`.
    pub max_depth: usize,
    /// Output collection-size cap; 0 means unbounded.
    pub max_collection_size: usize,
    /// Named external variables available as `%name`.
    pub variables: HashMap<String, Collection>,
    /// Reference-resolution callback backing `resolve()`.
    pub resolver: Option<Resolver>,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            cancellation: None,
            timeout: Duration::from_secs(5),
            max_depth: 100,
            max_collection_size: 10_000,
            variables: HashMap::new(),
            resolver: None,
        }
    }
}

impl EvaluateOptions {
    pub fn with_variable(mut self, name: impl Into<String>, value: Collection) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_collection_size(mut self, max_collection_size: usize) -> Self {
        self.max_collection_size = max_collection_size;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let opts = EvaluateOptions::default();
        assert_eq!(opts.timeout, Duration::from_secs(5));
        assert_eq!(opts.max_depth, 100);
        assert_eq!(opts.max_collection_size, 10_000);
    }

    #[test]
    fn cancellation_token_is_shared_across_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
