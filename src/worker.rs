//! Background frame worker.
//!
//! Camera callbacks arrive at their own cadence and must never block on
//! inference. `FrameWorker::submit` hands a frame to a dedicated thread
//! through a one-slot channel; if a frame is already waiting the new one is
//! dropped. Results reach consumers through the pipeline's event channel.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::frame::RgbaFrame;
use crate::pipeline::DetectionPipeline;

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    dropped: AtomicU64,
    processed: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub submitted: u64,
    /// Rejected at submit because the worker was still busy.
    pub dropped: u64,
    /// Ran through the full pipeline (not rate limited, idle or failed).
    pub processed: u64,
}

pub struct FrameWorker {
    tx: Option<Sender<RgbaFrame>>,
    join: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl FrameWorker {
    pub fn spawn(pipeline: Arc<DetectionPipeline>) -> Result<Self> {
        let (tx, rx) = bounded::<RgbaFrame>(1);
        let counters = Arc::new(Counters::default());
        let thread_counters = counters.clone();
        let join = std::thread::Builder::new()
            .name("frame-worker".to_string())
            .spawn(move || {
                for frame in rx.iter() {
                    let report = pipeline.process_frame_report(&frame.data, frame.width, frame.height);
                    if report.is_processed() {
                        thread_counters.processed.fetch_add(1, Ordering::Relaxed);
                        log::trace!("frame processed {:?} after capture", frame.age());
                    } else if let Some(diagnostic) = &report.diagnostic {
                        log::trace!("frame not processed: {}", diagnostic);
                    }
                }
                log::debug!("frame worker exiting");
            })
            .context("failed to spawn frame worker thread")?;

        Ok(Self {
            tx: Some(tx),
            join: Some(join),
            counters,
        })
    }

    /// Queue a frame without blocking. Returns false if it was dropped.
    pub fn submit(&self, frame: RgbaFrame) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        match tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            processed: self.counters.processed.load(Ordering::Relaxed),
        }
    }

    /// Finish the pending frame, if any, and join the worker thread.
    pub fn shutdown(mut self) -> Result<()> {
        self.close()
    }

    fn close(&mut self) -> Result<()> {
        drop(self.tx.take());
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("frame worker thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for FrameWorker {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::error!("{}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::detect::ScriptedBackend;
    use crate::pipeline::PipelineEvent;
    use std::time::Duration;

    #[test]
    fn worker_processes_frames_and_publishes_events() {
        let pipeline = Arc::new(DetectionPipeline::new(PipelineConfig {
            min_frame_interval: Duration::ZERO,
            ..PipelineConfig::default()
        }));
        pipeline.model().load(ScriptedBackend::new()).unwrap();
        pipeline.start().unwrap();
        let events = pipeline.subscribe();

        let worker = FrameWorker::spawn(pipeline.clone()).unwrap();
        assert!(worker.submit(RgbaFrame::new(vec![0; 16 * 16 * 4], 16, 16)));

        let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
        match event {
            PipelineEvent::ObjectsDetected(report) => {
                assert!(report.detections.is_empty());
                assert_eq!(report.summary, "No obstacles detected.");
            }
            other => panic!("unexpected event {:?}", other),
        }

        worker.shutdown().unwrap();
    }

    #[test]
    fn busy_worker_drops_extra_frames() {
        let pipeline = Arc::new(DetectionPipeline::new(PipelineConfig {
            min_frame_interval: Duration::ZERO,
            ..PipelineConfig::default()
        }));
        pipeline
            .model()
            .load(ScriptedBackend::new().with_latency(Duration::from_millis(200)))
            .unwrap();
        pipeline.start().unwrap();

        let worker = FrameWorker::spawn(pipeline.clone()).unwrap();
        let accepted = (0..10)
            .filter(|_| worker.submit(RgbaFrame::new(vec![0; 64], 4, 4)))
            .count();
        assert!(accepted < 10);

        let stats = worker.stats();
        assert_eq!(stats.submitted, 10);
        assert_eq!(stats.dropped as usize, 10 - accepted);
        worker.shutdown().unwrap();
    }
}
