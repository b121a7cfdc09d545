use image::RgbImage;
use schema::RawDetection;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// Knobs passed to the model on every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceParams {
    /// Side of the square model input, in pixels.
    pub input_size: u32,
    /// Candidates scoring below this never leave the backend.
    pub confidence_floor: f32,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence_floor: 0.20,
        }
    }
}

/// Object-detection model, loaded once at startup and shared read-only
/// between requests.
pub trait InferenceBackend: Send + Sync {
    /// Run the model on a decoded image. Returned boxes are normalized
    /// to the original image size.
    fn infer(&self, image: &RgbImage, params: &InferenceParams)
    -> anyhow::Result<Vec<RawDetection>>;

    /// Render the candidates onto a copy of the image at its original resolution.
    fn plot(&self, image: &RgbImage, candidates: &[RawDetection]) -> RgbImage {
        crate::annotate::plot(image, candidates)
    }
}
