use serde::{Deserialize, Serialize};

/// Normalized box in center format. Every field is a fraction of the image
/// dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x_center: f64, y_center: f64, width: f64, height: f64) -> Self {
        Self {
            x_center,
            y_center,
            width,
            height,
        }
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Corner coordinates in pixels for an image of the given size.
    pub fn to_pixel_xyxy(&self, image_width: u32, image_height: u32) -> (f32, f32, f32, f32) {
        let w = image_width as f64;
        let h = image_height as f64;
        let x1 = (self.x_center - self.width / 2.0) * w;
        let y1 = (self.y_center - self.height / 2.0) * h;
        let x2 = (self.x_center + self.width / 2.0) * w;
        let y2 = (self.y_center + self.height / 2.0) * h;
        (x1 as f32, y1 as f32, x2 as f32, y2 as f32)
    }
}

/// Unfiltered candidate straight from the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub class_id: u32,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Candidate that survived filtering, with its resolved label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f64,
    pub label: String,
    pub bbox: BoundingBox,
}

/// Round to 3 decimal places, the precision used for confidences and timings.
#[inline]
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
