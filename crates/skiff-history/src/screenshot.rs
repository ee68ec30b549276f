//! Best-effort screenshot requests.
//!
//! A plain FIFO, deliberately decoupled from the traversal queue: snapshot
//! production must never block or be blocked by history mutation. No
//! priority, no coalescing — duplicate requests for the same node are both
//! honored, in order. Drained opportunistically (typically once per repaint
//! cycle) by the traversable.

use std::collections::VecDeque;

use skiff_types::DomNodeId;

/// One snapshot request. `node` of `None` means whole viewport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenshotTask {
    pub node: Option<DomNodeId>,
}

/// A captured image handed back by the renderer collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    /// Encoded pixels; format is the renderer's business.
    pub data: Vec<u8>,
}

/// Renderer/paint collaborator that can produce snapshots.
pub trait SnapshotRenderer {
    fn capture_snapshot(&mut self, node: Option<DomNodeId>) -> Snapshot;
}

/// FIFO of pending snapshot requests for one traversable.
#[derive(Debug, Default)]
pub struct ScreenshotQueue {
    tasks: VecDeque<ScreenshotTask>,
}

impl ScreenshotQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, task: ScreenshotTask) {
        self.tasks.push_back(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drain every pending request through the renderer.
    ///
    /// With no renderer installed each task is a silent no-op (logged at
    /// debug), not a failure; the queue still empties.
    pub fn process(&mut self, mut renderer: Option<&mut dyn SnapshotRenderer>) -> Vec<Snapshot> {
        let mut captured = Vec::new();
        while let Some(task) = self.tasks.pop_front() {
            match renderer.as_deref_mut() {
                Some(r) => captured.push(r.capture_snapshot(task.node)),
                None => {
                    tracing::debug!(node = ?task.node, "dropping screenshot request: no renderer");
                }
            }
        }
        captured
    }
}
