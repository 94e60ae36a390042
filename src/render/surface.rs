//! Reusable drawing surface.
//!
//! One surface is reused for many posters, so every render must start from
//! a blank canvas. [`Surface::begin`] is the only way to get at the pixels
//! for drawing and it always clears them first.

use super::backend::RenderError;
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};

#[derive(Debug)]
pub struct Surface {
    canvas: RgbaImage,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    /// Clear to transparent and hand out the canvas for drawing.
    ///
    /// Reallocates when the requested size differs from the current one.
    pub fn begin(&mut self, width: u32, height: u32) -> &mut RgbaImage {
        if self.canvas.dimensions() != (width, height) {
            self.canvas = RgbaImage::new(width, height);
        } else {
            self.canvas.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));
        }
        &mut self.canvas
    }

    /// Read-only view of the last render.
    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Encode the current canvas as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut buf = Vec::new();
        let (width, height) = self.canvas.dimensions();
        image::codecs::png::PngEncoder::new(&mut buf)
            .write_image(self.canvas.as_raw(), width, height, ExtendedColorType::Rgba8)
            .map_err(|e| RenderError::ProcessingFailed(format!("PNG encode failed: {e}")))?;
        Ok(buf)
    }
}
