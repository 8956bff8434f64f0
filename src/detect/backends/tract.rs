#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ndarray::{ArrayD, ArrayView4, IxDyn};
use tract_onnx::prelude::*;

use crate::detect::backend::InferenceBackend;

/// Tract-based backend for ONNX inference.
///
/// Loads a local YOLO-style detector (e.g. `yolov8n.onnx`) with a fixed
/// `[1, 3, S, S]` input. It does not perform any network I/O.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: usize,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let input_size = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, input_size, input_size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, input_size })
    }

    fn build_input(&self, input: ArrayView4<'_, f32>) -> Result<Tensor> {
        let expected = [1, 3, self.input_size, self.input_size];
        if input.shape() != expected {
            return Err(anyhow!(
                "input shape {:?} does not match model input {:?}",
                input.shape(),
                expected
            ));
        }
        let data: Vec<f32> = input.iter().copied().collect();
        let array = tract_ndarray::Array4::from_shape_vec(
            (1, 3, self.input_size, self.input_size),
            data,
        )
        .context("failed to shape input tensor")?;
        Ok(array.into_tensor())
    }

    fn extract_output(&self, outputs: TVec<TValue>) -> Result<ArrayD<f32>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        let data: Vec<f32> = view.iter().copied().collect();
        ArrayD::from_shape_vec(IxDyn(&shape), data).context("failed to copy model output")
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn run(&mut self, input: ArrayView4<'_, f32>) -> Result<ArrayD<f32>> {
        let input = self.build_input(input)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_output(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let zeros = ndarray::Array4::<f32>::zeros((1, 3, self.input_size, self.input_size));
        self.run(zeros.view()).map(|_| ())
    }
}
