use super::{InferenceBackend, ModelMetadata, OutputInfo};
use anyhow::{Context, anyhow, bail};
use ndarray::{Array, ArrayD, IxDyn};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::{TensorRef, ValueType},
};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    Cpu,
    Cuda,
}

impl ExecutionProvider {
    pub fn from_acceleration(use_acceleration: bool) -> Self {
        if use_acceleration { Self::Cuda } else { Self::Cpu }
    }
}

pub struct OrtBackend {
    session: Session,
    metadata: ModelMetadata,
}

impl OrtBackend {
    /// Load model with specified execution provider
    pub fn load_model_with_provider(
        path: &Path,
        provider: ExecutionProvider,
    ) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;

        match provider {
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;
        let metadata = read_metadata(&session)?;

        tracing::info!(
            path = %path.display(),
            input = %metadata.input_name,
            input_width = metadata.input_width,
            input_height = metadata.input_height,
            outputs = ?metadata.outputs,
            "Model loaded"
        );
        Ok(Self { session, metadata })
    }
}

fn tensor_shape(value_type: &ValueType) -> Option<Vec<i64>> {
    match value_type {
        ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
        _ => None,
    }
}

fn read_metadata(session: &Session) -> anyhow::Result<ModelMetadata> {
    let input = session
        .inputs
        .first()
        .ok_or_else(|| anyhow!("Model declares no inputs"))?;
    let input_shape = tensor_shape(&input.input_type)
        .ok_or_else(|| anyhow!("Model input {} is not a tensor", input.name))?;

    let [_, _, height, width] = input_shape[..] else {
        bail!(
            "Model input {} has shape {:?}, expected NCHW",
            input.name,
            input_shape
        );
    };
    if height <= 0 || width <= 0 {
        bail!(
            "Model input {} has dynamic spatial dimensions {:?}",
            input.name,
            input_shape
        );
    }

    let outputs = session
        .outputs
        .iter()
        .map(|output| OutputInfo {
            name: output.name.clone(),
            shape: tensor_shape(&output.output_type).unwrap_or_default(),
        })
        .collect();

    Ok(ModelMetadata {
        input_name: input.name.clone(),
        input_width: width as u32,
        input_height: height as u32,
        outputs,
    })
}

impl InferenceBackend for OrtBackend {
    fn load_model(path: &Path, use_acceleration: bool) -> anyhow::Result<Self> {
        Self::load_model_with_provider(path, ExecutionProvider::from_acceleration(use_acceleration))
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<Vec<ArrayD<f32>>> {
        let outputs = self.session.run(ort::inputs![
            self.metadata.input_name.as_str() => TensorRef::from_array_view(images.view())?
        ])?;

        let mut tensors = Vec::with_capacity(self.metadata.outputs.len());
        for info in &self.metadata.outputs {
            let tensor = outputs[info.name.as_str()]
                .try_extract_array::<f32>()
                .with_context(|| format!("Output {} is not a float tensor", info.name))?;
            tensors.push(tensor.into_owned());
        }
        Ok(tensors)
    }
}
