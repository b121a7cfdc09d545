use super::pre::LetterboxTransform;
use schema::{BoundingBox, RawDetection};

pub const NMS_IOU_THRESHOLD: f32 = 0.7;
pub const MAX_DETECTIONS: usize = 300;

/// Candidate in original-image pixel coordinates, before normalization.
#[derive(Debug, Clone, Copy)]
struct PixelBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
    class_id: u32,
}

impl PixelBox {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &PixelBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }
}

/// Decode a YOLO detection head of shape `[1, 4 + classes, anchors]`.
///
/// Boxes come out of the model as cxcywh in letterboxed input pixels; the
/// result is normalized to the original image.
#[tracing::instrument(skip(predictions, transform))]
pub fn decode_yolo(
    predictions: &ndarray::ArrayViewD<f32>,
    transform: &LetterboxTransform,
    confidence_floor: f32,
    iou_threshold: f32,
) -> anyhow::Result<Vec<RawDetection>> {
    let shape = predictions.shape();
    if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
        anyhow::bail!("Unexpected YOLO output shape {:?}", shape);
    }

    let num_classes = shape[1] - 4;
    let num_anchors = shape[2];

    let mut candidates = Vec::new();

    for a in 0..num_anchors {
        let mut confidence = f32::NEG_INFINITY;
        let mut class_id = 0usize;
        for c in 0..num_classes {
            let score = predictions[[0, 4 + c, a]];
            if score > confidence {
                confidence = score;
                class_id = c;
            }
        }

        if confidence < confidence_floor {
            continue;
        }

        let cx = predictions[[0, 0, a]];
        let cy = predictions[[0, 1, a]];
        let w = predictions[[0, 2, a]];
        let h = predictions[[0, 3, a]];

        let orig_w = transform.orig_width as f32;
        let orig_h = transform.orig_height as f32;

        let x1 = ((cx - w / 2.0 - transform.offset_x) / transform.scale).clamp(0.0, orig_w);
        let y1 = ((cy - h / 2.0 - transform.offset_y) / transform.scale).clamp(0.0, orig_h);
        let x2 = ((cx + w / 2.0 - transform.offset_x) / transform.scale).clamp(0.0, orig_w);
        let y2 = ((cy + h / 2.0 - transform.offset_y) / transform.scale).clamp(0.0, orig_h);

        candidates.push(PixelBox {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id: class_id as u32,
        });
    }

    let kept = non_max_suppression(candidates, iou_threshold);

    tracing::trace!(kept = kept.len(), "YOLO output decoded");

    Ok(kept
        .into_iter()
        .map(|b| normalize(&b, transform))
        .collect())
}

/// Greedy per-class NMS, highest confidence first.
fn non_max_suppression(mut boxes: Vec<PixelBox>, iou_threshold: f32) -> Vec<PixelBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<PixelBox> = Vec::new();
    for candidate in boxes {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
            if kept.len() == MAX_DETECTIONS {
                break;
            }
        }
    }
    kept
}

fn normalize(b: &PixelBox, transform: &LetterboxTransform) -> RawDetection {
    let w = transform.orig_width as f64;
    let h = transform.orig_height as f64;
    let (x1, y1, x2, y2) = (b.x1 as f64, b.y1 as f64, b.x2 as f64, b.y2 as f64);

    RawDetection {
        class_id: b.class_id,
        confidence: b.confidence as f64,
        bbox: BoundingBox::new(
            (x1 + x2) / 2.0 / w,
            (y1 + y2) / 2.0 / h,
            (x2 - x1) / w,
            (y2 - y1) / h,
        ),
    }
}
