//! Fixed-section report layout for one detection record.
//!
//! The assembler decides what goes on the page and how large the image is;
//! [`crate::pdf`] turns the result into PDF bytes.

use image::{DynamicImage, ImageFormat, codecs::jpeg::JpegEncoder};
use schema::DetectionRecord;

pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
pub const MARGIN: f32 = 50.0;
pub const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
pub const MAX_IMAGE_HEIGHT: f32 = 260.0;

pub const TITLE: &str = "Durian Leaf Detection Report";
pub const DESCRIPTION_HEADING: &str = "Description:";
pub const FOOTER: &str = "Generated by DurianLeaf AI";
pub const DESCRIPTION_FONT_SIZE: f32 = 10.0;

const JPEG_QUALITY: u8 = 92;

#[derive(Debug, Clone, PartialEq)]
pub struct ReportField {
    pub label: &'static str,
    pub value: String,
}

/// Annotated image ready for embedding: baseline RGB JPEG plus its size on
/// the page in points.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportImage {
    pub jpeg: Vec<u8>,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub record_id: String,
    pub title: &'static str,
    pub fields: Vec<ReportField>,
    pub image: Option<ReportImage>,
    pub description_heading: &'static str,
    pub description_lines: Vec<String>,
    pub footer: &'static str,
}

impl ReportDocument {
    pub fn file_name(&self) -> String {
        format!("report_{}.pdf", self.record_id)
    }
}

/// Lay out the report for `record`. A missing or undecodable image leaves
/// the image section out.
pub fn assemble(record: &DetectionRecord, image_bytes: Option<&[u8]>) -> ReportDocument {
    let fields = vec![
        ReportField {
            label: "ID",
            value: record.id.clone(),
        },
        ReportField {
            label: "Time",
            value: record.timestamp.clone(),
        },
        ReportField {
            label: "Result",
            value: record.dominant_label.clone(),
        },
        ReportField {
            label: "Inference",
            value: format!("{} s", record.inference_time),
        },
    ];

    let image = image_bytes.and_then(|bytes| match prepare_image(bytes) {
        Ok(image) => Some(image),
        Err(e) => {
            tracing::warn!(record_id = %record.id, error = %e, "Report image unusable, leaving it out");
            None
        }
    });

    ReportDocument {
        record_id: record.id.clone(),
        title: TITLE,
        fields,
        image,
        description_heading: DESCRIPTION_HEADING,
        description_lines: wrap_text(&record.description, DESCRIPTION_FONT_SIZE, CONTENT_WIDTH),
        footer: FOOTER,
    }
}

/// Largest size with the image's aspect ratio that fits inside
/// `max_width` x `max_height`.
pub fn fit_within(width: u32, height: u32, max_width: f32, max_height: f32) -> (f32, f32) {
    if width == 0 || height == 0 {
        return (0.0, 0.0);
    }
    let (w, h) = (width as f32, height as f32);
    let scale = (max_width / w).min(max_height / h);
    (w * scale, h * scale)
}

fn prepare_image(bytes: &[u8]) -> Result<ReportImage, image::ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    let (pixel_width, pixel_height) = (decoded.width(), decoded.height());

    let is_rgb_jpeg = matches!(image::guess_format(bytes), Ok(ImageFormat::Jpeg))
        && matches!(decoded, DynamicImage::ImageRgb8(_));

    let jpeg = if is_rgb_jpeg {
        bytes.to_vec()
    } else {
        let mut out = Vec::new();
        decoded
            .to_rgb8()
            .write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))?;
        out
    };

    let (width, height) = fit_within(pixel_width, pixel_height, CONTENT_WIDTH, MAX_IMAGE_HEIGHT);

    Ok(ReportImage {
        jpeg,
        pixel_width,
        pixel_height,
        width,
        height,
    })
}

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Width of `text` set in Helvetica at `font_size`, in points.
pub fn text_width(text: &str, font_size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c as u32 {
            code @ 32..=126 => HELVETICA_WIDTHS[(code - 32) as usize] as u32,
            _ => 556,
        })
        .sum();
    units as f32 * font_size / 1000.0
}

/// Greedy word wrap. A word wider than `max_width` gets a line of its own.
pub fn wrap_text(text: &str, font_size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if text_width(&candidate, font_size) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
