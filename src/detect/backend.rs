use anyhow::Result;
use ndarray::{ArrayD, ArrayView4};

/// Model inference backend.
///
/// # Contract
///
/// - Input is the preprocessed `[1, 3, S, S]` tensor, RGB, scaled to 0..1.
/// - Output follows the `[1, 4 + C, N]` convention: box rows `cx, cy, w, h`
///   in model-input pixels followed by one score row per class.
///
/// Backends are not re-entrant. `run` takes `&mut self` and the model slot
/// holds each backend behind a mutex, so at most one inference is in flight
/// per loaded model.
pub trait InferenceBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the model on one input tensor.
    fn run(&mut self, input: ArrayView4<'_, f32>) -> Result<ArrayD<f32>>;

    /// Optional warm-up hook, called once when the backend is loaded.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
