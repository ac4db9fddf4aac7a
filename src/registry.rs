//! Shared snapshot of all tracked repositories
//!
//! Request handlers read the snapshot under a shared lock for the whole board
//! pipeline. The refresh task builds a replacement outside the lock and only
//! takes the exclusive lock to swap it in.

use crate::board::{self, BoardQuery, BoardView};
use crate::error::Result;
use crate::model::Repo;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Tracked repositories plus the readiness gate
#[derive(Debug, Default)]
pub struct Registry {
    repos: RwLock<Arc<Vec<Repo>>>,
    ready: AtomicBool,
    generation: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry already holding `repos` and marked ready
    pub fn with_repos(repos: Vec<Repo>) -> Self {
        let registry = Self::new();
        registry.replace(repos);
        registry.mark_ready();
        registry
    }

    /// Swap in a freshly built snapshot. Returns the new generation.
    pub fn replace(&self, repos: Vec<Repo>) -> u64 {
        let next = Arc::new(repos);
        let mut guard = self.repos.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Current snapshot. Holding it does not block a swap.
    pub fn snapshot(&self) -> Arc<Vec<Repo>> {
        Arc::clone(&self.repos.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of swaps so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Run the board pipeline under the read lock.
    pub fn board(&self, query: &BoardQuery, default_branch: Option<&str>) -> Result<BoardView> {
        let guard = self.repos.read().unwrap_or_else(PoisonError::into_inner);
        board::build(&guard, query, default_branch)
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Process-wide cancellation token
#[derive(Debug, Default)]
pub struct Shutdown {
    triggered: Mutex<bool>,
    cvar: Condvar,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        let mut triggered = self.triggered.lock().unwrap_or_else(PoisonError::into_inner);
        *triggered = true;
        self.cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.triggered.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `timeout` or until triggered. Returns true if triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut triggered = self.triggered.lock().unwrap_or_else(PoisonError::into_inner);
        while !*triggered {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            triggered = self
                .cvar
                .wait_timeout(triggered, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoardError;
    use std::thread;

    #[test]
    fn test_empty_registry() {
        let registry = Registry::new();
        assert!(!registry.is_ready());
        assert_eq!(registry.generation(), 0);
        assert_eq!(
            registry.board(&BoardQuery::default(), None).unwrap_err(),
            BoardError::NoRepositories
        );
    }

    #[test]
    fn test_replace_swaps_whole_snapshot() {
        let registry = Registry::with_repos(vec![Repo::new("a", "one", 1)]);
        assert!(registry.is_ready());
        let before = registry.snapshot();

        assert_eq!(registry.replace(vec![Repo::new("b", "two", 2)]), 2);
        // Old readers keep their snapshot; new readers see the replacement.
        assert_eq!(before[0].id, 1);
        assert_eq!(registry.snapshot()[0].id, 2);
    }

    #[test]
    fn test_shutdown_wakes_waiter() {
        let shutdown = Arc::new(Shutdown::new());
        let waiter = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || shutdown.wait_timeout(Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(20));
        shutdown.trigger();
        assert!(waiter.join().unwrap());
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_wait_timeout_expires() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.wait_timeout(Duration::from_millis(10)));
    }
}
