//! obstacled - obstacle detection daemon
//!
//! This daemon:
//! 1. Loads the pipeline configuration (file + env)
//! 2. Loads the detector (ONNX with `backend-tract`, or a scripted scene with `--demo`)
//! 3. Feeds frames from a synthetic source through the frame worker
//! 4. Logs summaries and danger alerts until the run ends or Ctrl-C

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use obstacle_kernel::detect::{output_tensor, Anchor};
use obstacle_kernel::{
    DetectionPipeline, FrameSource, FrameWorker, ModelSlot, ObjectClass, PipelineConfig,
    PipelineEvent, ScriptedBackend, SyntheticConfig, SyntheticSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML by extension).
    #[arg(long, env = "OBSTACLE_CONFIG")]
    config: Option<PathBuf>,
    /// ONNX model path (requires the backend-tract feature).
    #[arg(long)]
    model: Option<PathBuf>,
    /// Replay a scripted street scene instead of a real model.
    #[arg(long, conflicts_with = "model")]
    demo: bool,
    /// Run time in seconds; 0 runs until Ctrl-C.
    #[arg(long, default_value_t = 10)]
    seconds: u64,
    /// Camera frame rate to simulate.
    #[arg(long, default_value_t = 30)]
    fps: u32,
    #[arg(long, default_value_t = 640)]
    width: u32,
    #[arg(long, default_value_t = 480)]
    height: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = PipelineConfig::load_from(args.config.as_deref())?;
    if let Some(model) = &args.model {
        config.model_path = Some(model.clone());
    }

    let slot = Arc::new(ModelSlot::empty());
    if args.demo {
        load_demo_scene(&slot);
    } else {
        load_model(&slot, &config);
    }
    let pipeline = Arc::new(DetectionPipeline::with_model(config, slot));
    if !pipeline.model().is_loaded() {
        log::warn!("no detection model loaded; limited detection available");
    }

    let events = pipeline.subscribe();
    let listener = std::thread::Builder::new()
        .name("event-log".to_string())
        .spawn(move || {
            for event in events.iter() {
                match event {
                    PipelineEvent::ObjectsDetected(report) => {
                        log::info!("{} ({} objects)", report.summary, report.detections.len());
                    }
                    PipelineEvent::DangerAlert(alert) => {
                        log::warn!("ALERT [{:?}] {}", alert.tier(), alert.message);
                    }
                }
            }
        })
        .context("failed to spawn event listener")?;

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    let mut source = SyntheticSource::new(SyntheticConfig {
        width: args.width,
        height: args.height,
    })?;
    let worker = FrameWorker::spawn(pipeline.clone())?;
    pipeline.start()?;

    let frame_period = Duration::from_secs(1) / args.fps.max(1);
    let deadline = (args.seconds > 0).then(|| Instant::now() + Duration::from_secs(args.seconds));
    log::info!(
        "obstacled running: {}x{} @ {} fps",
        args.width,
        args.height,
        args.fps
    );

    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        let frame = source.next_frame()?;
        worker.submit(frame);
        std::thread::sleep(frame_period);
    }

    pipeline.stop();
    let stats = worker.stats();
    worker.shutdown()?;
    log::info!(
        "frames submitted={} dropped={} processed={} captured={}",
        stats.submitted,
        stats.dropped,
        stats.processed,
        source.frames_captured()
    );

    drop(pipeline);
    if listener.join().is_err() {
        log::error!("event listener panicked");
    }
    Ok(())
}

fn load_model(slot: &ModelSlot, config: &PipelineConfig) {
    let Some(path) = &config.model_path else {
        return;
    };
    #[cfg(feature = "backend-tract")]
    if let Err(err) = obstacle_kernel::TractBackend::new(path, config.input_size)
        .and_then(|backend| slot.load(backend))
    {
        log::error!("failed to load model {}: {:#}", path.display(), err);
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        let _ = slot;
        log::error!(
            "cannot load model {}: built without the backend-tract feature",
            path.display()
        );
    }
}

fn load_demo_scene(slot: &ModelSlot) {
    // A car filling the centre, a person on the left, a dog on the right.
    let scene = output_tensor(&[
        Anchor::new(ObjectClass::CAR, 0.91, 320.0, 330.0, 420.0, 380.0),
        Anchor::new(ObjectClass::PERSON, 0.84, 90.0, 300.0, 60.0, 180.0),
        Anchor::new(ObjectClass::DOG, 0.77, 560.0, 420.0, 90.0, 70.0),
    ]);
    match slot.load(ScriptedBackend::new().with_fallback(scene)) {
        Ok(()) => log::warn!("demo mode: detections come from a scripted scene"),
        Err(err) => log::error!("failed to load demo scene: {:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_stays_empty_without_a_model() {
        let slot = ModelSlot::empty();
        load_model(&slot, &PipelineConfig::default());
        assert!(!slot.is_loaded());
    }

    #[test]
    fn unloadable_model_leaves_slot_empty() {
        let slot = ModelSlot::empty();
        let config = PipelineConfig {
            model_path: Some(PathBuf::from("/nonexistent/detector.onnx")),
            ..PipelineConfig::default()
        };
        load_model(&slot, &config);
        assert!(!slot.is_loaded());
    }

    #[test]
    fn demo_scene_is_opt_in() {
        let args = Args::try_parse_from(["obstacled"]).unwrap();
        assert!(!args.demo);

        let args = Args::try_parse_from(["obstacled", "--demo"]).unwrap();
        assert!(args.demo);
        let slot = ModelSlot::empty();
        load_demo_scene(&slot);
        assert_eq!(slot.backend_name(), Some("scripted"));

        assert!(Args::try_parse_from(["obstacled", "--demo", "--model", "m.onnx"]).is_err());
    }
}
