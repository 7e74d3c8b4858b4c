//! Post-import task queue.
//!
//! Downstream work triggered by an import (topic/contact creation in the
//! chat layer, indexing) is delivered over a channel to a single handler so
//! that it can never affect the outcome of the import itself. Tasks are
//! deduplicated by key while pending: enqueueing a task whose key is queued
//! or running is a no-op. Once the handler returns, successfully or not, the
//! key may be enqueued again, so a model deleted and re-imported under the
//! same name is delivered again.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{ArtifactId, OwnerId};
use crate::ports::CoreError;

/// Work scheduled after an import succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PostImportTask {
    /// Let collaborators attach their own records to a new model.
    ModelImported {
        artifact_id: ArtifactId,
        model_name: String,
        creator: OwnerId,
    },
}

impl PostImportTask {
    /// Deduplication key.
    pub fn key(&self) -> String {
        match self {
            Self::ModelImported {
                artifact_id,
                creator,
                ..
            } => format!("model_imported:{artifact_id}:{creator}"),
        }
    }
}

/// Consumer of post-import tasks.
#[async_trait]
pub trait PostImportHandler: Send + Sync {
    /// Process one task. Must be idempotent.
    async fn handle(&self, task: &PostImportTask) -> Result<(), CoreError>;
}

/// Handle for enqueueing post-import tasks.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<PostImportTask>,
    pending: Arc<Mutex<HashSet<String>>>,
}

fn lock(pending: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TaskQueue {
    /// Start a worker that feeds `handler` and return the queue handle.
    ///
    /// The worker ends once every `TaskQueue` clone has been dropped.
    /// Must be called from within a tokio runtime.
    pub fn spawn(handler: Arc<dyn PostImportHandler>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<PostImportTask>();
        let pending = Arc::new(Mutex::new(HashSet::new()));
        let worker_pending = Arc::clone(&pending);

        let worker = tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                let key = task.key();
                match handler.handle(&task).await {
                    Ok(()) => debug!(task = %key, "Post-import task completed"),
                    Err(e) => warn!(task = %key, error = %e, "Post-import task failed"),
                }
                lock(&worker_pending).remove(&key);
            }
        });

        (Self { tx, pending }, worker)
    }

    /// Enqueue a task. Returns `false` if the same task is already pending or
    /// the worker has stopped.
    pub fn enqueue(&self, task: PostImportTask) -> bool {
        let key = task.key();
        if !lock(&self.pending).insert(key.clone()) {
            debug!(task = %key, "Skipping duplicate post-import task");
            return false;
        }
        if self.tx.send(task).is_err() {
            lock(&self.pending).remove(&key);
            warn!(task = %key, "Post-import worker is gone; task dropped");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Recorder {
        calls: AtomicUsize,
        fail_first: bool,
        done: mpsc::UnboundedSender<()>,
    }

    #[async_trait]
    impl PostImportHandler for Recorder {
        async fn handle(&self, _task: &PostImportTask) -> Result<(), CoreError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.done.send(());
            if self.fail_first && n == 0 {
                return Err(CoreError::Internal("topic service offline".into()));
            }
            Ok(())
        }
    }

    fn task(name: &str) -> PostImportTask {
        PostImportTask::ModelImported {
            artifact_id: ArtifactId::for_name(name),
            model_name: name.to_string(),
            creator: OwnerId::new("owner-1"),
        }
    }

    #[tokio::test]
    async fn test_pending_duplicates_run_once() {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(Recorder {
            calls: AtomicUsize::new(0),
            fail_first: false,
            done: done_tx,
        });
        let (queue, _worker) = TaskQueue::spawn(handler.clone());

        assert!(queue.enqueue(task("a")));
        assert!(!queue.enqueue(task("a")));
        assert!(queue.enqueue(task("b")));

        for _ in 0..2 {
            tokio::time::timeout(Duration::from_secs(2), done_rx.recv())
                .await
                .unwrap();
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_completed_task_can_be_enqueued_again() {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(Recorder {
            calls: AtomicUsize::new(0),
            fail_first: false,
            done: done_tx,
        });
        let (queue, _worker) = TaskQueue::spawn(handler.clone());

        assert!(queue.enqueue(task("a")));
        tokio::time::timeout(Duration::from_secs(2), done_rx.recv())
            .await
            .unwrap();

        // The key is released just after `handle` returns.
        let mut requeued = false;
        for _ in 0..50 {
            if queue.enqueue(task("a")) {
                requeued = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(requeued);
        tokio::time::timeout(Duration::from_secs(2), done_rx.recv())
            .await
            .unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_task_can_be_retried() {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(Recorder {
            calls: AtomicUsize::new(0),
            fail_first: true,
            done: done_tx,
        });
        let (queue, _worker) = TaskQueue::spawn(handler.clone());

        assert!(queue.enqueue(task("a")));
        tokio::time::timeout(Duration::from_secs(2), done_rx.recv())
            .await
            .unwrap();

        // The key is released just after `handle` returns.
        let mut retried = false;
        for _ in 0..50 {
            if queue.enqueue(task("a")) {
                retried = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(retried);
        tokio::time::timeout(Duration::from_secs(2), done_rx.recv())
            .await
            .unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_task_key() {
        let key = task("a").key();
        assert!(key.starts_with("model_imported:"));
        assert!(key.ends_with(":owner-1"));
    }
}
