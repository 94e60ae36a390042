//! Rendering backend trait and shared types.
//!
//! The [`PosterBackend`] trait is the seam between the batch pipeline and
//! the pixel work. The production implementation is
//! [`RasterBackend`](super::raster::RasterBackend); tests use
//! [`MockBackend`](tests::MockBackend) to exercise the pipeline without
//! decoding or encoding anything.

use super::surface::Surface;
use crate::assets::Asset;
use crate::naming::poster_entry_name;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot decode image: {0}")]
    Decode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("font unavailable: {0}")]
    Font(String),
}

/// One validated row joined to its photo.
#[derive(Debug, Clone, PartialEq)]
pub struct PosterJob {
    /// 1-based data row the job came from.
    pub row: usize,
    pub school: String,
    pub major: String,
    /// Photo file name as written in the spreadsheet.
    pub image: String,
    pub asset: Asset,
}

impl PosterJob {
    /// Archive entry name for this poster.
    pub fn entry_name(&self) -> String {
        poster_entry_name(&self.school, &self.major)
    }
}

/// Anything that can turn a [`PosterJob`] into encoded poster bytes.
///
/// `Sync` so one backend can be shared across rayon workers; each worker
/// brings its own [`Surface`].
pub trait PosterBackend: Sync {
    /// Canvas size the backend draws at.
    fn canvas_size(&self) -> (u32, u32);

    /// Render one poster on `surface` and return it PNG-encoded.
    fn render(&self, surface: &mut Surface, job: &PosterJob) -> Result<Vec<u8>, RenderError>;
}
