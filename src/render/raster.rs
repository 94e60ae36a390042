//! Production poster backend built on the `image` crate.
//!
//! The background template is decoded and stretched to the canvas once, when
//! the backend is built. Every render then starts from a cleared
//! [`Surface`], lays the template down, draws both captions, and stretches
//! the photo into its box with no aspect correction.

use super::backend::{PosterBackend, PosterJob, RenderError};
use super::layout::PosterLayout;
use super::surface::Surface;
use super::text::{TextPainter, TextRun};
use crate::config::PosterConfig;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbaImage};
use std::path::Path;
use std::time::Instant;

pub struct RasterBackend {
    layout: PosterLayout,
    background: RgbaImage,
    text: TextPainter,
}

impl RasterBackend {
    /// Build a backend, loading the background template from disk.
    pub fn new(config: &PosterConfig, background: &Path) -> Result<Self, RenderError> {
        let template = ImageReader::open(background)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| RenderError::Decode(format!("{}: {e}", background.display())))?;
        Self::with_background(config, template)
    }

    /// Build a backend around an already decoded template.
    pub fn with_background(
        config: &PosterConfig,
        template: DynamicImage,
    ) -> Result<Self, RenderError> {
        let layout = PosterLayout::from_config(config);
        if !layout.photo.intersects_canvas(layout.width, layout.height) {
            tracing::warn!(photo = ?layout.photo, "photo box lies entirely outside the canvas");
        }
        let background = template
            .resize_exact(layout.width, layout.height, FilterType::Lanczos3)
            .to_rgba8();
        Ok(Self {
            layout,
            background,
            text: TextPainter::new(&config.text)?,
        })
    }

    pub fn layout(&self) -> &PosterLayout {
        &self.layout
    }

    /// Installed family standing in for the configured caption fonts, if any.
    pub fn font_fallback(&self) -> Option<&str> {
        self.text.fallback()
    }
}

impl PosterBackend for RasterBackend {
    fn canvas_size(&self) -> (u32, u32) {
        (self.layout.width, self.layout.height)
    }

    fn render(&self, surface: &mut Surface, job: &PosterJob) -> Result<Vec<u8>, RenderError> {
        let started = Instant::now();
        let photo = job.asset.decode()?;
        let layout = &self.layout;

        let canvas = surface.begin(layout.width, layout.height);
        image::imageops::overlay(canvas, &self.background, 0, 0);
        self.text.draw(
            canvas,
            &[
                TextRun {
                    text: &job.school,
                    anchor: layout.school,
                },
                TextRun {
                    text: &job.major,
                    anchor: layout.major,
                },
            ],
        )?;
        let photo = photo
            .resize_exact(layout.photo.width, layout.photo.height, FilterType::Lanczos3)
            .to_rgba8();
        image::imageops::overlay(
            canvas,
            &photo,
            i64::from(layout.photo.x),
            i64::from(layout.photo.y),
        );

        let png = surface.encode_png()?;
        tracing::debug!(
            row = job.row,
            bytes = png.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rendered poster"
        );
        Ok(png)
    }
}
