//! MFA workspace pool (spec §4.11, C12): a bounded queue of pre-created
//! workspace directories, rented under RAII and guaranteed to be returned.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

/// A rented workspace directory. Returns itself to the pool on drop, on
/// every exit path (success, failure, cancellation) per spec §5.
pub struct WorkspaceGuard {
    path: Option<PathBuf>,
    pool: Arc<Mutex<VecDeque<PathBuf>>>,
}

impl WorkspaceGuard {
    pub fn path(&self) -> &PathBuf {
        self.path.as_ref().expect("workspace guard used after release")
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let pool = self.pool.clone();
            tokio::spawn(async move {
                pool.lock().await.push_back(path);
            });
        }
    }
}

/// Isolated, reusable MFA workspace directories (`MFA_1`, `MFA_2`, ...).
pub struct MfaWorkspacePool {
    queue: Arc<Mutex<VecDeque<PathBuf>>>,
}

impl MfaWorkspacePool {
    pub fn new(base_dir: &std::path::Path, count: usize) -> Self {
        let queue = (1..=count).map(|i| base_dir.join(format!("MFA_{i}"))).collect();
        Self { queue: Arc::new(Mutex::new(queue)) }
    }

    /// Rent a workspace, blocking until one is free. Pairs with `MfaGate`:
    /// the caller should hold the gate permit across this call.
    pub async fn rent(&self) -> WorkspaceGuard {
        loop {
            if let Some(path) = self.queue.lock().await.pop_front() {
                return WorkspaceGuard { path: Some(path), pool: self.queue.clone() };
            }
            tokio::task::yield_now().await;
        }
    }

    pub async fn available(&self) -> usize {
        self.queue.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rent_then_drop_returns_workspace() {
        let pool = MfaWorkspacePool::new(std::path::Path::new("/tmp/ams-mfa"), 1);
        assert_eq!(pool.available().await, 1);
        {
            let guard = pool.rent().await;
            assert_eq!(pool.available().await, 0);
            assert_eq!(guard.path(), &std::path::PathBuf::from("/tmp/ams-mfa/MFA_1"));
        }
        // Drop schedules the return via tokio::spawn; yield to let it run.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(pool.available().await, 1);
    }

    #[tokio::test]
    async fn rent_waits_when_pool_is_empty() {
        let pool = MfaWorkspacePool::new(std::path::Path::new("/tmp/ams-mfa"), 1);
        let g1 = pool.rent().await;
        let pool2 = MfaWorkspacePool { queue: pool.queue.clone() };
        let rent_fut = tokio::spawn(async move { pool2.rent().await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        drop(g1);
        let g2 = tokio::time::timeout(std::time::Duration::from_secs(1), rent_fut).await.unwrap().unwrap();
        assert_eq!(g2.path(), &std::path::PathBuf::from("/tmp/ams-mfa/MFA_1"));
    }
}
