use super::{InferenceBackend, InferenceParams};
use crate::processing::{
    decode::{NMS_IOU_THRESHOLD, decode_yolo},
    pre::{PreProcessor, enhance},
};
use image::RgbImage;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use schema::RawDetection;
use std::sync::Mutex;

const INPUT_NAME: &str = "images";
const OUTPUT_NAME: &str = "output0";

#[derive(Debug, Clone, Copy)]
pub enum ExecutionProvider {
    Cpu,
    #[cfg(feature = "cuda")]
    Cuda,
}

struct OrtState {
    session: Session,
    preprocessor: PreProcessor,
}

/// YOLO detector exported to ONNX, run through ONNX Runtime.
pub struct OrtBackend {
    state: Mutex<OrtState>,
}

impl OrtBackend {
    pub fn load_model(path: &str, input_size: u32) -> anyhow::Result<Self> {
        #[cfg(feature = "cuda")]
        let provider = ExecutionProvider::Cuda;
        #[cfg(not(feature = "cuda"))]
        let provider = ExecutionProvider::Cpu;

        Self::load_model_with_provider(path, input_size, provider)
    }

    /// Load model with specified execution provider
    pub fn load_model_with_provider(
        path: &str,
        input_size: u32,
        provider: ExecutionProvider,
    ) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        #[allow(unused_mut)]
        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;

        match provider {
            #[cfg(feature = "cuda")]
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

        let session = builder.commit_from_file(path)?;

        tracing::info!(path, input_size, "Model loaded");
        Ok(Self {
            state: Mutex::new(OrtState {
                session,
                preprocessor: PreProcessor::new(input_size),
            }),
        })
    }
}

impl InferenceBackend for OrtBackend {
    fn infer(
        &self,
        image: &RgbImage,
        params: &InferenceParams,
    ) -> anyhow::Result<Vec<RawDetection>> {
        let enhanced = enhance(image);

        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("inference session lock poisoned"))?;
        let OrtState {
            session,
            preprocessor,
        } = &mut *state;

        if preprocessor.input_size != params.input_size {
            *preprocessor = PreProcessor::new(params.input_size);
        }

        let (input, transform) = preprocessor.preprocess(&enhanced)?;

        let outputs = {
            let _s = common::span!("model_inference");
            session.run(ort::inputs![
                INPUT_NAME => TensorRef::from_array_view(input.view())?
            ])?
        };

        let predictions = outputs[OUTPUT_NAME].try_extract_array::<f32>()?;

        decode_yolo(
            &predictions,
            &transform,
            params.confidence_floor,
            NMS_IOU_THRESHOLD,
        )
    }
}
