//! Background tile preparation on a thread pool.
//!
//! Tasks own their decoded content, so workers never share state with the
//! main thread. Results come back over a channel together with the load
//! version they were submitted under; the caller discards stale ones.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use glam::DMat4;
use strata_content::TileContent;

use crate::prepare::{PendingTile, PrepareOptions, prepare_tile};
use crate::streamer::TileKey;

/// A self-contained preparation job.
pub struct TileTask {
    pub key: TileKey,
    /// Load version at submission, echoed back in the result.
    pub version: u64,
    pub content: TileContent,
    /// Tile transform into earth-fixed coordinates.
    pub transform: DMat4,
}

pub struct TileResult {
    pub key: TileKey,
    pub version: u64,
    pub pending: PendingTile,
}

/// Worker pool turning [`TileTask`]s into [`PendingTile`]s.
///
/// The main thread submits with [`submit`](Self::submit) and collects with
/// [`drain_results`](Self::drain_results) once per frame; it never blocks.
pub struct TilePipeline {
    task_sender: Option<crossbeam_channel::Sender<TileTask>>,
    result_receiver: crossbeam_channel::Receiver<TileResult>,
    worker_handles: Vec<JoinHandle<()>>,
    /// Maximum number of tasks queued or running at once.
    budget: usize,
    in_flight: Arc<AtomicUsize>,
}

impl TilePipeline {
    /// Spawn `worker_count` threads; at most `budget` tasks are in flight.
    pub fn new(worker_count: usize, budget: usize, options: PrepareOptions) -> Self {
        let (task_tx, task_rx) = crossbeam_channel::bounded::<TileTask>(budget.max(1));
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(worker_count);
        for index in 0..worker_count.max(1) {
            let rx = task_rx.clone();
            let tx = result_tx.clone();
            let flight = Arc::clone(&in_flight);

            let spawned = std::thread::Builder::new()
                .name(format!("tile-worker-{index}"))
                .spawn(move || {
                    while let Ok(task) = rx.recv() {
                        let pending = prepare_tile(&task.content, task.transform, options);
                        let _ = tx.send(TileResult {
                            key: task.key,
                            version: task.version,
                            pending,
                        });
                        flight.fetch_sub(1, Ordering::Relaxed);
                    }
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => tracing::error!(index, %err, "failed to spawn tile worker"),
            }
        }

        tracing::debug!(workers = handles.len(), budget, "tile pipeline started");
        Self {
            task_sender: Some(task_tx),
            result_receiver: result_rx,
            worker_handles: handles,
            budget,
            in_flight,
        }
    }

    /// Returns `false` if the budget is used up or the pipeline is shut down.
    pub fn submit(&self, task: TileTask) -> bool {
        let Some(sender) = &self.task_sender else {
            return false;
        };
        if self.in_flight.load(Ordering::Relaxed) >= self.budget {
            return false;
        }
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        if sender.send(task).is_err() {
            self.in_flight.fetch_sub(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    pub fn drain_results(&self) -> Vec<TileResult> {
        self.result_receiver.try_iter().collect()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Close the task channel and join every worker.
    pub fn shutdown(&mut self) {
        self.task_sender.take();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for TilePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::time::{Duration, Instant};
    use strata_content::{Model, Primitive};

    fn model_content() -> TileContent {
        TileContent::Model(Model {
            primitives: vec![Primitive::new(
                vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                vec![0, 1, 2],
            )],
            ..Model::default()
        })
    }

    fn task(key: u64, version: u64, content: TileContent) -> TileTask {
        TileTask {
            key: TileKey(key),
            version,
            content,
            transform: DMat4::IDENTITY,
        }
    }

    fn wait_for(pipeline: &TilePipeline, count: usize) -> Vec<TileResult> {
        let mut received = Vec::new();
        let start = Instant::now();
        while received.len() < count {
            received.extend(pipeline.drain_results());
            assert!(start.elapsed().as_secs() < 5, "timed out waiting for tiles");
            std::thread::sleep(Duration::from_millis(1));
        }
        received
    }

    #[test]
    fn test_task_produces_pending_tile() {
        let pipeline = TilePipeline::new(2, 8, PrepareOptions::default());
        assert!(pipeline.submit(task(7, 3, model_content())));

        let results = wait_for(&pipeline, 1);
        assert_eq!(results[0].key, TileKey(7));
        assert_eq!(results[0].version, 3);
        assert_eq!(results[0].pending.primitive_count(), 1);
    }

    #[test]
    fn test_concurrent_tasks_all_arrive() {
        let pipeline = TilePipeline::new(4, 16, PrepareOptions::default());
        for key in 0..8 {
            assert!(pipeline.submit(task(key, 1, model_content())));
        }

        let mut keys: Vec<_> = wait_for(&pipeline, 8).iter().map(|r| r.key).collect();
        keys.sort();
        assert_eq!(keys, (0..8).map(TileKey).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_content_round_trips() {
        let pipeline = TilePipeline::new(1, 4, PrepareOptions::default());
        assert!(pipeline.submit(task(1, 42, TileContent::Empty)));
        let results = wait_for(&pipeline, 1);
        assert!(matches!(results[0].pending, PendingTile::Empty));
    }

    #[test]
    fn test_budget_limits_submissions() {
        let pipeline = TilePipeline::new(1, 2, PrepareOptions::default());
        assert!(pipeline.submit(task(0, 1, model_content())));
        assert!(pipeline.submit(task(1, 1, model_content())));

        let closed = TilePipeline::new(1, 0, PrepareOptions::default());
        assert!(!closed.submit(task(0, 1, model_content())));
        assert_eq!(closed.in_flight_count(), 0);
    }

    #[test]
    fn test_workers_are_named() {
        let mut pipeline = TilePipeline::new(2, 2, PrepareOptions::default());
        let names: Vec<_> = pipeline
            .worker_handles
            .iter()
            .map(|handle| handle.thread().name().map(str::to_string))
            .collect();
        assert_eq!(
            names,
            vec![
                Some("tile-worker-0".to_string()),
                Some("tile-worker-1".to_string())
            ]
        );
        pipeline.shutdown();
        assert!(pipeline.worker_handles.is_empty());
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let mut pipeline = TilePipeline::new(1, 2, PrepareOptions::default());
        pipeline.shutdown();
        assert!(!pipeline.submit(task(0, 1, TileContent::Empty)));
    }
}
