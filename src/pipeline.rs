//! Detection pipeline orchestrator.
//!
//! Wires preprocessing, inference, decoding, suppression, danger assessment
//! and alert gating together for one frame at a time.
//!
//! # Lifecycle
//!
//! The pipeline is `Idle` until `start()` and returns to `Idle` on `stop()`.
//! Each start opens a new session: the cooldown set is cleared, a periodic
//! task resets it every cooldown window, and a session epoch is bumped on
//! stop so an inference that was in flight when `stop()` completed is
//! discarded instead of delivered.
//!
//! # Concurrency
//!
//! `process_frame` may be called from any thread at any rate:
//! - frames arriving within the minimum interval of the last frame that
//!   reached the model are dropped,
//! - the model is entered by at most one caller at a time (`ModelSlot`),
//! - session state is locked only briefly, never across inference,
//! - events for a frame are published under the session lock, so a frame's
//!   "objects detected" event and its alerts are delivered in order and never
//!   after `stop()` returns.

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime};
use thiserror::Error;

use crate::alert::{AlertDeduplicator, DangerAlert};
use crate::config::PipelineConfig;
use crate::danger::DangerClassifier;
use crate::decoder::OutputDecoder;
use crate::describe::describe;
use crate::detect::{Detection, ModelSlot, SlotRun};
use crate::frame::{preprocess, BYTES_PER_PIXEL};
use crate::nms::suppress;
use crate::timer::PeriodicTask;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Active,
}

/// Why a frame produced no detections.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FrameDiagnostic {
    #[error("detection is not active")]
    Idle,
    #[error("no detection model is loaded")]
    ModelUnavailable,
    #[error("frame dropped by rate limiter")]
    RateLimited,
    #[error("model busy with a previous frame")]
    ModelBusy,
    #[error("detection stopped while the frame was in flight")]
    Cancelled,
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("malformed model output: {0}")]
    MalformedOutput(String),
}

/// Everything the pipeline produced for one frame.
#[derive(Clone, Debug)]
pub struct FrameReport {
    pub detections: Vec<Detection>,
    pub summary: String,
    pub alerts: Vec<DangerAlert>,
    pub diagnostic: Option<FrameDiagnostic>,
    pub timestamp: SystemTime,
}

impl FrameReport {
    fn empty(diagnostic: FrameDiagnostic) -> Self {
        Self {
            detections: Vec::new(),
            summary: describe(&[]),
            alerts: Vec::new(),
            diagnostic: Some(diagnostic),
            timestamp: SystemTime::now(),
        }
    }

    /// True when the frame ran through the full pipeline.
    pub fn is_processed(&self) -> bool {
        self.diagnostic.is_none()
    }
}

/// Payload of the "objects detected" event.
#[derive(Clone, Debug)]
pub struct DetectionReport {
    pub detections: Vec<Detection>,
    pub summary: String,
    pub timestamp: SystemTime,
}

#[derive(Clone, Debug)]
pub enum PipelineEvent {
    /// Sent for every processed frame, including frames with no detections.
    ObjectsDetected(DetectionReport),
    /// Sent once per newly alerted class within a cooldown window.
    DangerAlert(DangerAlert),
}

/// A frame that passed `admit_frame`.
struct Admission {
    epoch: u64,
    started: Instant,
    previous: Option<Instant>,
}

struct Session {
    state: PipelineState,
    epoch: u64,
    last_started: Option<Instant>,
    alerts: AlertDeduplicator,
    cooldown_timer: Option<PeriodicTask>,
}

pub struct DetectionPipeline {
    config: PipelineConfig,
    model: Arc<ModelSlot>,
    decoder: OutputDecoder,
    classifier: DangerClassifier,
    session: Arc<Mutex<Session>>,
    subscribers: Mutex<Vec<Sender<PipelineEvent>>>,
}

impl DetectionPipeline {
    /// Pipeline with an empty model slot.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_model(config, Arc::new(ModelSlot::empty()))
    }

    pub fn with_model(config: PipelineConfig, model: Arc<ModelSlot>) -> Self {
        let decoder = OutputDecoder::new(config.confidence_threshold, config.input_size)
            .with_relevance_area_fraction(config.relevance_area_fraction);
        let classifier = DangerClassifier::new(config.input_size)
            .with_close_area_fraction(config.close_area_fraction);
        Self {
            config,
            model,
            decoder,
            classifier,
            session: Arc::new(Mutex::new(Session {
                state: PipelineState::Idle,
                epoch: 0,
                last_started: None,
                alerts: AlertDeduplicator::new(),
                cooldown_timer: None,
            })),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Shared handle for loading and unloading the model.
    pub fn model(&self) -> Arc<ModelSlot> {
        self.model.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.lock_session().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == PipelineState::Active
    }

    /// Receive events from now on. Dropped receivers are pruned on publish.
    pub fn subscribe(&self) -> Receiver<PipelineEvent> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Begin a detection session. No-op when already active.
    pub fn start(&self) -> Result<()> {
        let mut session = self.lock_session();
        if session.state == PipelineState::Active {
            return Ok(());
        }

        let epoch = session.epoch;
        let shared = Arc::downgrade(&self.session);
        let timer = PeriodicTask::spawn("alert-cooldown", self.config.alert_cooldown, move || {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let mut session = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if session.state == PipelineState::Active && session.epoch == epoch {
                let window = session.alerts.window_started().elapsed();
                session.alerts.reset();
                log::debug!("alert cooldown window reset after {:?}", window);
            }
        })?;

        session.state = PipelineState::Active;
        session.last_started = None;
        session.alerts.reset();
        session.cooldown_timer = Some(timer);
        log::info!(
            "detection started (model loaded: {}, cooldown {:?}, min interval {:?})",
            self.model.is_loaded(),
            self.config.alert_cooldown,
            self.config.min_frame_interval
        );
        Ok(())
    }

    /// End the session. No-op when idle.
    ///
    /// The cooldown timer has stopped and any in-flight frame is guaranteed
    /// to be discarded by the time this returns.
    pub fn stop(&self) {
        let timer = {
            let mut session = self.lock_session();
            if session.state == PipelineState::Idle {
                return;
            }
            session.state = PipelineState::Idle;
            session.epoch = session.epoch.wrapping_add(1);
            session.last_started = None;
            session.alerts.reset();
            session.cooldown_timer.take()
        };
        // Cancel outside the lock: the timer callback takes it too.
        if let Some(timer) = timer {
            timer.cancel();
        }
        log::info!("detection stopped");
    }

    /// Detections for one frame; empty when the frame was not processed.
    pub fn process_frame(&self, pixels: &[u8], width: u32, height: u32) -> Vec<Detection> {
        self.process_frame_report(pixels, width, height).detections
    }

    pub fn process_frame_report(&self, pixels: &[u8], width: u32, height: u32) -> FrameReport {
        let admission = match self.admit_frame() {
            Ok(admission) => admission,
            Err(diagnostic) => return FrameReport::empty(diagnostic),
        };
        let epoch = admission.epoch;

        let expected_len = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(BYTES_PER_PIXEL);
        if pixels.len() < expected_len {
            log::debug!(
                "frame buffer holds {} bytes, {}x{} needs {}; missing pixels skipped",
                pixels.len(),
                width,
                height,
                expected_len
            );
        }

        let input = preprocess(pixels, width, height, self.config.input_size);
        let output = match self.model.try_run(input.view()) {
            SlotRun::Ran(Ok(output)) => output,
            SlotRun::Ran(Err(err)) => {
                log::warn!("inference failed: {:#}", err);
                return FrameReport::empty(FrameDiagnostic::InferenceFailed(err.to_string()));
            }
            SlotRun::Busy => {
                log::debug!("frame dropped: model busy");
                self.revoke_admission(&admission);
                return FrameReport::empty(FrameDiagnostic::ModelBusy);
            }
            SlotRun::Unavailable => {
                self.revoke_admission(&admission);
                return FrameReport::empty(FrameDiagnostic::ModelUnavailable);
            }
        };

        let candidates = match self.decoder.try_decode(output.view(), width, height) {
            Ok(candidates) => candidates,
            Err(err) => {
                log::warn!("decoder: discarding frame output: {}", err);
                return FrameReport::empty(FrameDiagnostic::MalformedOutput(err.to_string()));
            }
        };

        let mut detections = suppress(candidates, self.config.iou_threshold);
        for detection in &mut detections {
            self.classifier.assess(detection);
        }
        let summary = describe(&detections);
        let timestamp = SystemTime::now();

        let mut session = self.lock_session();
        if session.state != PipelineState::Active || session.epoch != epoch {
            log::debug!("frame discarded: detection stopped during inference");
            return FrameReport::empty(FrameDiagnostic::Cancelled);
        }
        let alerts = session.alerts.observe(&detections);

        self.publish(PipelineEvent::ObjectsDetected(DetectionReport {
            detections: detections.clone(),
            summary: summary.clone(),
            timestamp,
        }));
        for alert in &alerts {
            log::info!("danger alert: {}", alert.message);
            self.publish(PipelineEvent::DangerAlert(alert.clone()));
        }
        drop(session);

        FrameReport {
            detections,
            summary,
            alerts,
            diagnostic: None,
            timestamp,
        }
    }

    /// Gate a frame on session state, model presence and the rate limiter.
    fn admit_frame(&self) -> Result<Admission, FrameDiagnostic> {
        let mut session = self.lock_session();
        if session.state != PipelineState::Active {
            return Err(FrameDiagnostic::Idle);
        }
        if !self.model.is_loaded() {
            return Err(FrameDiagnostic::ModelUnavailable);
        }
        let now = Instant::now();
        if let Some(last) = session.last_started {
            if now.duration_since(last) < self.config.min_frame_interval {
                return Err(FrameDiagnostic::RateLimited);
            }
        }
        let previous = session.last_started.replace(now);
        Ok(Admission {
            epoch: session.epoch,
            started: now,
            previous,
        })
    }

    /// Undo the rate limiter's reference point for a frame that never
    /// reached the model, unless a later frame has already moved it.
    fn revoke_admission(&self, admission: &Admission) {
        let mut session = self.lock_session();
        if session.epoch == admission.epoch && session.last_started == Some(admission.started) {
            session.last_started = admission.previous;
        }
    }

    fn publish(&self, event: PipelineEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DetectionPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::{DangerTier, ObjectClass};
    use crate::detect::{Anchor, ScriptedBackend};
    use std::time::Duration;

    fn frame() -> Vec<u8> {
        vec![128; 64 * 48 * BYTES_PER_PIXEL]
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            min_frame_interval: Duration::ZERO,
            ..PipelineConfig::default()
        }
    }

    fn car_ahead() -> Anchor {
        Anchor::new(ObjectClass::CAR, 0.9, 320.0, 320.0, 405.0, 405.0)
    }

    #[test]
    fn idle_pipeline_ignores_frames() {
        let pipeline = DetectionPipeline::new(fast_config());
        pipeline.model().load(ScriptedBackend::new()).unwrap();
        let report = pipeline.process_frame_report(&frame(), 64, 48);
        assert_eq!(report.diagnostic, Some(FrameDiagnostic::Idle));
        assert!(report.detections.is_empty());
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let pipeline = DetectionPipeline::new(fast_config());
        assert!(!pipeline.is_active());
        pipeline.stop();
        pipeline.start().unwrap();
        pipeline.start().unwrap();
        assert!(pipeline.is_active());
        pipeline.stop();
        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[test]
    fn processed_frame_carries_tiers_and_alerts() {
        let pipeline = DetectionPipeline::new(fast_config());
        pipeline
            .model()
            .load(ScriptedBackend::new().push_anchors(&[car_ahead()]))
            .unwrap();
        pipeline.start().unwrap();

        let report = pipeline.process_frame_report(&frame(), 640, 640);
        assert!(report.is_processed());
        assert_eq!(report.detections.len(), 1);
        assert_eq!(report.detections[0].danger_tier, Some(DangerTier::Critical));
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].message, "Stop! car directly ahead!");
        assert_eq!(report.summary, "Warning! a car directly ahead!");
    }

    #[test]
    fn inference_failure_is_reported_not_raised() {
        let pipeline = DetectionPipeline::new(fast_config());
        pipeline
            .model()
            .load(ScriptedBackend::new().push_failure("gpu lost"))
            .unwrap();
        pipeline.start().unwrap();
        let events = pipeline.subscribe();

        let report = pipeline.process_frame_report(&frame(), 64, 48);
        assert!(matches!(
            report.diagnostic,
            Some(FrameDiagnostic::InferenceFailed(ref msg)) if msg.contains("gpu lost")
        ));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn cooldown_resets_after_window() {
        let config = PipelineConfig {
            min_frame_interval: Duration::ZERO,
            alert_cooldown: Duration::from_millis(100),
            ..PipelineConfig::default()
        };
        let pipeline = DetectionPipeline::new(config);
        pipeline
            .model()
            .load(ScriptedBackend::new().with_fallback(crate::detect::output_tensor(&[car_ahead()])))
            .unwrap();
        pipeline.start().unwrap();

        assert_eq!(pipeline.process_frame_report(&frame(), 640, 640).alerts.len(), 1);
        assert!(pipeline.process_frame_report(&frame(), 640, 640).alerts.is_empty());

        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(pipeline.process_frame_report(&frame(), 640, 640).alerts.len(), 1);
    }

    #[test]
    fn restart_clears_cooldown() {
        let pipeline = DetectionPipeline::new(fast_config());
        pipeline
            .model()
            .load(ScriptedBackend::new().with_fallback(crate::detect::output_tensor(&[car_ahead()])))
            .unwrap();
        pipeline.start().unwrap();
        assert_eq!(pipeline.process_frame_report(&frame(), 640, 640).alerts.len(), 1);
        pipeline.stop();
        pipeline.start().unwrap();
        assert_eq!(pipeline.process_frame_report(&frame(), 640, 640).alerts.len(), 1);
    }
}
