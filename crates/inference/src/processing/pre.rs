use common::span;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use image::RgbImage;
use ndarray::{Array, IxDyn};

const LETTERBOX_COLOR: u8 = 114;
const CONTRAST_FACTOR: f32 = 1.1;
const COLOR_FACTOR: f32 = 1.05;

/// Mapping between the letterboxed model input and the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    pub orig_width: u32,
    pub orig_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// Light enhancement applied before the model call: contrast, then colour
/// saturation.
pub fn enhance(image: &RgbImage) -> RgbImage {
    let _s = span!("enhance");
    let contrasted = adjust_contrast(image, CONTRAST_FACTOR);
    adjust_color(&contrasted, COLOR_FACTOR)
}

#[inline]
fn luma(px: &[u8]) -> f32 {
    (px[0] as f32 * 299.0 + px[1] as f32 * 587.0 + px[2] as f32 * 114.0) / 1000.0
}

#[inline]
fn blend(degenerate: f32, value: u8, factor: f32) -> u8 {
    (degenerate + factor * (value as f32 - degenerate))
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Blend every pixel with a flat image of the mean gray level.
pub fn adjust_contrast(image: &RgbImage, factor: f32) -> RgbImage {
    let pixels = image.as_raw();
    let count = (pixels.len() / 3).max(1);
    let mean = (pixels.chunks_exact(3).map(|px| luma(px) as f64).sum::<f64>() / count as f64)
        .round() as f32;

    let mut out = image.clone();
    for v in out.iter_mut() {
        *v = blend(mean, *v, factor);
    }
    out
}

/// Blend every pixel with its own grayscale value.
pub fn adjust_color(image: &RgbImage, factor: f32) -> RgbImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        let gray = luma(&px.0);
        for c in px.0.iter_mut() {
            *c = blend(gray, *c, factor);
        }
    }
    out
}

pub struct PreProcessor {
    pub input_size: u32,
    rgb_buffer: Vec<u8>,
    letterboxed_buffer: Vec<u8>,
}

impl PreProcessor {
    pub fn new(input_size: u32) -> Self {
        Self {
            input_size,
            rgb_buffer: Vec::new(),
            letterboxed_buffer: vec![LETTERBOX_COLOR; (input_size * input_size * 3) as usize],
        }
    }

    /// Letterbox the image into the square model input and build a CHW tensor
    /// scaled to [0, 1].
    pub fn preprocess(
        &mut self,
        image: &RgbImage,
    ) -> anyhow::Result<(Array<f32, IxDyn>, LetterboxTransform)> {
        let _s = span!("preprocess_image");

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            anyhow::bail!("Cannot preprocess an empty {}x{} image", width, height);
        }

        tracing::trace!(width, height, "Preprocessing image dimensions");

        self.rgb_buffer.clear();
        self.rgb_buffer.extend_from_slice(image.as_raw());

        let transform = self.resize_and_letterbox(width, height)?;
        let input = self.normalize()?;

        Ok((input, transform))
    }

    fn resize_and_letterbox(
        &mut self,
        width: u32,
        height: u32,
    ) -> anyhow::Result<LetterboxTransform> {
        let _s = span!("resize_and_letterbox");

        let side = self.input_size;
        let scale = (side as f32 / width as f32).min(side as f32 / height as f32);
        let new_width = ((width as f32 * scale) as u32).clamp(1, side);
        let new_height = ((height as f32 * scale) as u32).clamp(1, side);

        let offset_x = (side - new_width) / 2;
        let offset_y = (side - new_height) / 2;

        let src = Image::from_slice_u8(width, height, &mut self.rgb_buffer, PixelType::U8x3)?;
        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        Resizer::new().resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        self.letterboxed_buffer.fill(LETTERBOX_COLOR);

        let resized_data = resized.buffer();
        let stride = side * 3;
        let row_bytes = (new_width * 3) as usize;

        for y in 0..new_height {
            let src_row = (y * new_width * 3) as usize;
            let dst_row = ((y + offset_y) * stride + offset_x * 3) as usize;

            self.letterboxed_buffer[dst_row..dst_row + row_bytes]
                .copy_from_slice(&resized_data[src_row..src_row + row_bytes]);
        }

        Ok(LetterboxTransform {
            orig_width: width,
            orig_height: height,
            scale,
            offset_x: offset_x as f32,
            offset_y: offset_y as f32,
        })
    }

    fn normalize(&self) -> anyhow::Result<Array<f32, IxDyn>> {
        let _s = span!("normalize");

        let side = self.input_size as usize;
        let spatial = side * side;
        let mut output = vec![0.0f32; 3 * spatial];

        for (i, px) in self.letterboxed_buffer.chunks_exact(3).enumerate() {
            output[i] = px[0] as f32 / 255.0;
            output[i + spatial] = px[1] as f32 / 255.0;
            output[i + 2 * spatial] = px[2] as f32 / 255.0;
        }

        Ok(Array::from_shape_vec(IxDyn(&[1, 3, side, side]), output)?)
    }
}

impl Default for PreProcessor {
    fn default() -> Self {
        Self::new(640)
    }
}
