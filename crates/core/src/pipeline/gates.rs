//! Concurrency gates and cooperative cancellation (spec §4.11, §5, C12).
//!
//! Three counting semaphores bound concurrent stage entries; CPU-only stages
//! (3, 4, 5, 7) run without a gate. Grounded on the teacher's async
//! orchestration style, using `tokio::sync::Semaphore` the way the rest of
//! the pack gates concurrent I/O (e.g. `Djoe-Denne-Vocal-agent`'s
//! request-scoped task spawning).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Notify, Semaphore, SemaphorePermit};

use crate::error::{AmsError, Result};

/// Process-wide gates; constructed once and shared across all chapters.
pub struct ConcurrencyGates {
    book_index: Semaphore,
    asr: Semaphore,
    mfa: Semaphore,
}

impl ConcurrencyGates {
    pub fn new(asr_concurrency: usize, mfa_concurrency: usize) -> Self {
        Self {
            book_index: Semaphore::new(1),
            asr: Semaphore::new(asr_concurrency.max(1)),
            mfa: Semaphore::new(mfa_concurrency.max(1)),
        }
    }

    pub async fn enter_book_index(&self) -> SemaphorePermit<'_> {
        self.book_index.acquire().await.expect("gate semaphore never closes")
    }

    pub async fn enter_asr(&self) -> SemaphorePermit<'_> {
        self.asr.acquire().await.expect("gate semaphore never closes")
    }

    pub async fn enter_mfa(&self) -> SemaphorePermit<'_> {
        self.mfa.acquire().await.expect("gate semaphore never closes")
    }
}

/// A single cooperative cancellation token threaded through the whole run.
#[derive(Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self { flag: Arc::new(AtomicBool::new(false)), notify: Arc::new(Notify::new()) }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Checked at stage entry and after any blocking I/O (spec §5).
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AmsError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
