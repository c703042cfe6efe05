//! Fixed pool of store sessions
//!
//! The engine owns one session per loader worker plus one for the calling
//! thread, so concurrent statements never share a connection. Sessions are
//! borrowed for the duration of one statement and returned on drop.

use parking_lot::{Condvar, Mutex};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::session::Session;
use super::sqlite::SqliteSession;
use crate::error::{SosError, SosResult};

/// A pool of open sessions that can be borrowed and returned.
///
/// Cloning the pool is cheap and yields a handle on the same sessions.
#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    /// The pool of available sessions
    sessions: Vec<Arc<PooledSession>>,
    /// Round-robin counter for session selection
    next_index: AtomicUsize,
    /// Waiters for a returned session park here
    returned: Mutex<()>,
    returned_signal: Condvar,
}

/// Wrapper around a session with usage tracking
struct PooledSession {
    session: Mutex<Box<dyn Session>>,
    use_count: AtomicUsize,
    /// Whether the session is currently borrowed (lock-free acquisition)
    in_use: AtomicBool,
}

impl SessionPool {
    /// Create a pool over already opened sessions.
    pub fn new(sessions: Vec<Box<dyn Session>>) -> SosResult<Self> {
        if sessions.is_empty() {
            return Err(SosError::ConfigurationError(
                "session pool needs at least one session".to_string(),
            ));
        }

        let sessions = sessions
            .into_iter()
            .map(|session| {
                Arc::new(PooledSession {
                    session: Mutex::new(session),
                    use_count: AtomicUsize::new(0),
                    in_use: AtomicBool::new(false),
                })
            })
            .collect();

        Ok(Self {
            inner: Arc::new(PoolInner {
                sessions,
                next_index: AtomicUsize::new(0),
                returned: Mutex::new(()),
                returned_signal: Condvar::new(),
            }),
        })
    }

    /// Opens `size` SQLite sessions on the database at `path`.
    pub fn open_sqlite(path: &Path, size: usize) -> SosResult<Self> {
        let sessions = (0..size.max(1))
            .map(|_| SqliteSession::open(path).map(|s| Box::new(s) as Box<dyn Session>))
            .collect::<SosResult<Vec<_>>>()?;
        tracing::debug!(
            "[STORE] Opened {} session(s) on {}",
            sessions.len(),
            path.display()
        );
        Self::new(sessions)
    }

    pub fn size(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Borrow a session from the pool.
    ///
    /// Selection is round-robin with compare-and-swap acquisition; when every
    /// session is busy the caller blocks until one is returned.
    pub fn acquire(&self) -> SessionGuard {
        let start = self.inner.next_index.fetch_add(1, Ordering::Relaxed) % self.size();

        loop {
            if let Some(guard) = self.try_acquire(start) {
                return guard;
            }

            let mut waiting = self.inner.returned.lock();
            // a session returned before we took the lock would not wake us
            if let Some(guard) = self.try_acquire(start) {
                return guard;
            }
            self.inner.returned_signal.wait(&mut waiting);
        }
    }

    fn try_acquire(&self, start: usize) -> Option<SessionGuard> {
        let size = self.size();
        (0..size).find_map(|i| {
            let pooled = &self.inner.sessions[(start + i) % size];
            pooled
                .in_use
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .ok()
                .map(|_| {
                    pooled.use_count.fetch_add(1, Ordering::Relaxed);
                    SessionGuard {
                        pooled: pooled.clone(),
                        pool: self.inner.clone(),
                    }
                })
        })
    }

    /// Drops the compiled statements of every session.
    pub fn release_all(&self) {
        for pooled in &self.inner.sessions {
            pooled.session.lock().release();
        }
    }

    pub fn stats(&self) -> PoolStats {
        let sessions = &self.inner.sessions;
        PoolStats {
            size: sessions.len(),
            in_use: sessions
                .iter()
                .filter(|s| s.in_use.load(Ordering::Relaxed))
                .count(),
            total_uses: sessions
                .iter()
                .map(|s| s.use_count.load(Ordering::Relaxed))
                .sum(),
        }
    }
}

/// A borrowed session, returned to the pool when dropped.
pub struct SessionGuard {
    pooled: Arc<PooledSession>,
    pool: Arc<PoolInner>,
}

impl SessionGuard {
    pub fn with_session<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&dyn Session) -> R,
    {
        let guard = self.pooled.session.lock();
        f(guard.as_ref())
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.pooled.in_use.store(false, Ordering::Release);
        let _returned = self.pool.returned.lock();
        self.pool.returned_signal.notify_one();
    }
}

/// Statistics about the session pool
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Total number of sessions in the pool
    pub size: usize,
    /// Number of sessions currently borrowed
    pub in_use: usize,
    /// Total number of times sessions have been borrowed
    pub total_uses: usize,
}
