//! Obstacle Kernel
//!
//! On-device obstacle detection for a walking-navigation assistant. A camera
//! frame goes in; a deduplicated, danger-ranked list of obstacles, a spoken
//! summary and rate-limited hazard alerts come out.
//!
//! # Pipeline
//!
//! 1. `frame`: RGBA bytes resampled into the model's `[1, 3, S, S]` input
//! 2. `detect`: model slot and inference backends (at most one inference in flight)
//! 3. `decoder`: raw `[1, 4 + C, N]` output into candidate detections
//! 4. `nms`: same-class duplicate suppression
//! 5. `danger`: per-detection danger tier
//! 6. `alert`: per-class cooldown so each hazard is announced once per window
//! 7. `describe`: one spoken summary per frame
//!
//! `pipeline::DetectionPipeline` runs the stages, owns the session state and
//! publishes events; `worker::FrameWorker` feeds it from a camera callback
//! without blocking.
//!
//! Nothing in the per-frame path panics or returns an error to the frame
//! source. A frame that cannot be processed yields an empty result and a
//! `FrameDiagnostic`.

pub mod alert;
pub mod classes;
pub mod config;
pub mod danger;
pub mod decoder;
pub mod describe;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod nms;
pub mod pipeline;
pub mod source;
pub mod timer;
pub mod worker;

pub use alert::{AlertDeduplicator, DangerAlert};
pub use classes::{DangerTier, ObjectClass};
pub use config::PipelineConfig;
pub use danger::DangerClassifier;
pub use decoder::{DecodeError, OutputDecoder};
pub use describe::{describe, NO_OBSTACLES};
pub use detect::{Detection, InferenceBackend, ModelSlot, Position, ScriptedBackend};
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use frame::RgbaFrame;
pub use geometry::BoundingBox;
pub use nms::suppress;
pub use pipeline::{
    DetectionPipeline, DetectionReport, FrameDiagnostic, FrameReport, PipelineEvent, PipelineState,
};
pub use source::{FrameSource, SyntheticConfig, SyntheticSource};
pub use worker::{FrameWorker, WorkerStats};
