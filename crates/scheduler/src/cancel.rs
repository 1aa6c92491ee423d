//! Cancellation tokens for pending asynchronous loads
//!
//! The editing core is single-threaded, but a few operations (bitmap decode,
//! remote image fetch) finish outside of it. The core hands a token to the
//! collaborator doing the work and cancels it when the requesting editor goes
//! away, so late results can be dropped.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation token for cooperative cancellation
///
/// Cloning shares the underlying flag, so a token handed to a loader observes
/// a cancel issued through the copy kept by the requester.
///
/// # Example
///
/// ```
/// use pdf_annotator_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let loader_token = token.clone();
///
/// token.cancel();
/// assert!(loader_token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// Cancel this token and every clone of it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokens of in-flight requests, keyed by the id of whoever asked
///
/// # Example
///
/// ```
/// use pdf_annotator_scheduler::CancellationRegistry;
///
/// let mut registry = CancellationRegistry::new();
/// let token = registry.register("editor_1");
///
/// registry.cancel(&"editor_1");
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug)]
pub struct CancellationRegistry<K> {
    tokens: HashMap<K, CancellationToken>,
}

impl<K: Eq + Hash> CancellationRegistry<K> {
    pub fn new() -> Self {
        Self { tokens: HashMap::new() }
    }

    /// Register a request and return the token to hand to the worker
    ///
    /// Registering a key again cancels the token it previously held.
    pub fn register(&mut self, key: K) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.tokens.insert(key, token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Cancel and forget a request. Returns `true` if it was registered.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.tokens.remove(key) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered request. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.tokens.len();
        for (_, token) in self.tokens.drain() {
            token.cancel();
        }
        count
    }

    /// Remove a request that completed, returning its token.
    pub fn complete(&mut self, key: &K) -> Option<CancellationToken> {
        self.tokens.remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.tokens.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl<K: Eq + Hash> Default for CancellationRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}
