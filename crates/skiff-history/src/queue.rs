//! The traversal queue.
//!
//! All history-mutating operations for one traversable are expressed as
//! data commands and serialized through this queue, so at most one is in
//! flight at a time. The interior sits behind a `parking_lot::Mutex` and
//! the queue is shared via `Arc`: collaborator hooks hold a clone and may
//! submit nested requests while a step is executing. The traversable's
//! pump is the only consumer.
//!
//! Two lanes:
//! - `append`: strict global FIFO.
//! - `append_sync`: the same-document fast lane, scoped to one navigable.
//!   Runs immediately when nothing is in flight and nothing queued targets
//!   the same navigable; otherwise it is inserted after the last queued
//!   sync task for that navigable, ahead of unrelated tail entries.

use std::collections::VecDeque;

use parking_lot::Mutex;
use skiff_types::{
    HistoryHandling, NavigableId, SynchronousNavigation, UserNavigationInvolvement,
};

use crate::hooks::SourceSnapshotParams;

/// One unit of history-mutating work.
#[derive(Clone, Debug)]
pub enum QueuedTask {
    /// Apply a traverse history step.
    Traverse {
        step: i64,
        source_snapshot: Option<SourceSnapshotParams>,
        initiator: Option<NavigableId>,
        involvement: UserNavigationInvolvement,
        synchronous: SynchronousNavigation,
    },
    /// Apply a push or replace step (the entry itself was already placed).
    PushOrReplace {
        step: i64,
        handling: HistoryHandling,
        involvement: UserNavigationInvolvement,
        synchronous: SynchronousNavigation,
    },
    /// Re-apply the current step, forcing document reload.
    Reload { involvement: UserNavigationInvolvement },
    /// Re-apply the current step after a navigable was created or destroyed.
    RefreshAfterTreeChange,
}

/// A queued task plus its lane metadata.
#[derive(Clone, Debug)]
pub struct QueueEntry {
    pub task: QueuedTask,
    /// The single navigable a sync-lane task is scoped to.
    pub target: Option<NavigableId>,
    pub synchronous: bool,
}

/// Whether `append_sync` wants the caller to execute inline or wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncDisposition {
    /// Nothing conflicts; run the task right now.
    RunNow,
    /// A conflicting task is running or queued; the task has been queued.
    Queued,
}

#[derive(Default)]
struct Inner {
    queue: VecDeque<QueueEntry>,
    /// Set while the pump is executing a task (or an inline sync task).
    running: bool,
}

/// Ordered task queue for one traversable. See the module docs.
#[derive(Default)]
pub struct TraversalQueue {
    inner: Mutex<Inner>,
}

impl TraversalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue at the tail. Global FIFO relative to other `append`s.
    pub fn append(&self, task: QueuedTask) {
        tracing::debug!(?task, "queueing traversal task");
        self.inner.lock().queue.push_back(QueueEntry {
            task,
            target: None,
            synchronous: false,
        });
    }

    /// Enqueue on the synchronous lane, scoped to `target`.
    ///
    /// Returns [`SyncDisposition::RunNow`] when the caller should execute
    /// the task inline instead; in that case nothing is queued.
    pub fn append_sync(&self, task: QueuedTask, target: NavigableId) -> SyncDisposition {
        let mut inner = self.inner.lock();
        let conflicts_queued = inner
            .queue
            .iter()
            .any(|e| e.synchronous && e.target == Some(target));
        if !inner.running && !conflicts_queued {
            return SyncDisposition::RunNow;
        }

        // Insert after the last sync task for the same navigable so
        // same-target submission order is preserved; unrelated entries
        // stay behind.
        let mut index = 0;
        for (i, e) in inner.queue.iter().enumerate() {
            if e.synchronous && e.target == Some(target) {
                index = i + 1;
            }
        }
        tracing::debug!(?task, nav = %target, index, "queueing synchronous navigation task");
        inner.queue.insert(
            index,
            QueueEntry { task, target: Some(target), synchronous: true },
        );
        SyncDisposition::Queued
    }

    /// Take the next task. Consumer side of the pump.
    pub fn pop(&self) -> Option<QueueEntry> {
        self.inner.lock().queue.pop_front()
    }

    /// Mark a task as in flight (or not). The pump and inline sync
    /// execution bracket task bodies with this.
    pub fn set_running(&self, running: bool) {
        self.inner.lock().running = running;
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    /// Drop all pending tasks. Used during traversable teardown.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        if !inner.queue.is_empty() {
            tracing::debug!(dropped = inner.queue.len(), "clearing traversal queue");
        }
        inner.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traverse(step: i64) -> QueuedTask {
        QueuedTask::Traverse {
            step,
            source_snapshot: None,
            initiator: None,
            involvement: UserNavigationInvolvement::BrowserUi,
            synchronous: SynchronousNavigation::No,
        }
    }

    fn sync_push(step: i64) -> QueuedTask {
        QueuedTask::PushOrReplace {
            step,
            handling: HistoryHandling::Push,
            involvement: UserNavigationInvolvement::None,
            synchronous: SynchronousNavigation::Yes,
        }
    }

    fn steps_in_order(queue: &TraversalQueue) -> Vec<i64> {
        let mut steps = Vec::new();
        while let Some(entry) = queue.pop() {
            match entry.task {
                QueuedTask::Traverse { step, .. } | QueuedTask::PushOrReplace { step, .. } => {
                    steps.push(step)
                }
                _ => {}
            }
        }
        steps
    }

    #[test]
    fn test_append_is_fifo() {
        let queue = TraversalQueue::new();
        queue.append(traverse(1));
        queue.append(traverse(2));
        queue.append(traverse(3));
        assert_eq!(steps_in_order(&queue), vec![1, 2, 3]);
    }

    #[test]
    fn test_append_sync_runs_now_when_idle() {
        let queue = TraversalQueue::new();
        let target = NavigableId::new();
        assert_eq!(queue.append_sync(sync_push(1), target), SyncDisposition::RunNow);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_append_sync_queues_while_running() {
        let queue = TraversalQueue::new();
        let target = NavigableId::new();
        queue.set_running(true);
        assert_eq!(queue.append_sync(sync_push(1), target), SyncDisposition::Queued);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_sync_tasks_jump_ahead_of_unrelated_async_work() {
        let queue = TraversalQueue::new();
        let target = NavigableId::new();
        queue.set_running(true);
        queue.append(traverse(10));
        queue.append(traverse(11));
        queue.append_sync(sync_push(1), target);
        // The sync task lands at the front, not behind the traversals.
        assert_eq!(steps_in_order(&queue), vec![1, 10, 11]);
    }

    #[test]
    fn test_sync_tasks_same_target_keep_submission_order() {
        let queue = TraversalQueue::new();
        let target = NavigableId::new();
        queue.set_running(true);
        queue.append_sync(sync_push(1), target);
        queue.append_sync(sync_push(2), target);
        queue.append_sync(sync_push(3), target);
        assert_eq!(steps_in_order(&queue), vec![1, 2, 3]);
    }

    #[test]
    fn test_sync_task_queues_behind_queued_same_target_even_when_idle() {
        let queue = TraversalQueue::new();
        let target = NavigableId::new();
        queue.set_running(true);
        queue.append_sync(sync_push(1), target);
        queue.set_running(false);
        // Idle, but a same-target task is already queued: order must hold.
        assert_eq!(queue.append_sync(sync_push(2), target), SyncDisposition::Queued);
        assert_eq!(steps_in_order(&queue), vec![1, 2]);
    }

    #[test]
    fn test_sync_tasks_distinct_targets_interleave_independently() {
        let queue = TraversalQueue::new();
        let a = NavigableId::new();
        let b = NavigableId::new();
        queue.set_running(true);
        queue.append_sync(sync_push(1), a);
        queue.append_sync(sync_push(2), b);
        queue.append_sync(sync_push(3), a);
        // a's tasks stay in order; b's position relative to them is
        // unspecified, but same-target order must hold.
        let steps = steps_in_order(&queue);
        let pos = |s: i64| steps.iter().position(|&x| x == s).unwrap();
        assert!(pos(1) < pos(3));
        assert_eq!(steps.len(), 3);
    }

    #[test]
    fn test_clear_drops_pending() {
        let queue = TraversalQueue::new();
        queue.append(traverse(1));
        queue.clear();
        assert!(queue.is_empty());
    }
}
