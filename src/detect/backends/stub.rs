use anyhow::{anyhow, Result};
use ndarray::{Array3, ArrayD, ArrayView4};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::classes::{ObjectClass, CLASS_COUNT};
use crate::detect::backend::InferenceBackend;

/// One synthetic anchor in model-input pixel space.
#[derive(Clone, Copy, Debug)]
pub struct Anchor {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub class: ObjectClass,
    pub score: f32,
}

impl Anchor {
    pub fn new(class: ObjectClass, score: f32, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            cx,
            cy,
            w,
            h,
            class,
            score,
        }
    }
}

/// Build a `[1, 4 + 80, N]` output tensor holding the given anchors.
pub fn output_tensor(anchors: &[Anchor]) -> ArrayD<f32> {
    let mut out = Array3::<f32>::zeros((1, 4 + CLASS_COUNT, anchors.len()));
    for (i, anchor) in anchors.iter().enumerate() {
        out[[0, 0, i]] = anchor.cx;
        out[[0, 1, i]] = anchor.cy;
        out[[0, 2, i]] = anchor.w;
        out[[0, 3, i]] = anchor.h;
        out[[0, 4 + anchor.class.index(), i]] = anchor.score;
    }
    out.into_dyn()
}

enum Step {
    Output(ArrayD<f32>),
    Fail(String),
}

/// Scripted backend for tests and the demo daemon.
///
/// Replays queued outputs in order, then repeats the fallback output (an
/// empty anchor set unless overridden). An optional latency simulates slow
/// inference.
pub struct ScriptedBackend {
    queue: VecDeque<Step>,
    fallback: ArrayD<f32>,
    latency: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            fallback: output_tensor(&[]),
            latency: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Output returned once the queue is exhausted.
    pub fn with_fallback(mut self, output: ArrayD<f32>) -> Self {
        self.fallback = output;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push_output(mut self, output: ArrayD<f32>) -> Self {
        self.queue.push_back(Step::Output(output));
        self
    }

    pub fn push_anchors(self, anchors: &[Anchor]) -> Self {
        self.push_output(output_tensor(anchors))
    }

    pub fn push_failure(mut self, message: &str) -> Self {
        self.queue.push_back(Step::Fail(message.to_string()));
        self
    }

    /// Shared counter of `run` invocations.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn run(&mut self, input: ArrayView4<'_, f32>) -> Result<ArrayD<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if input.shape()[0] != 1 || input.shape()[1] != 3 {
            return Err(anyhow!("unexpected input shape {:?}", input.shape()));
        }
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        match self.queue.pop_front() {
            Some(Step::Output(output)) => Ok(output),
            Some(Step::Fail(message)) => Err(anyhow!(message)),
            None => Ok(self.fallback.clone()),
        }
    }
}
