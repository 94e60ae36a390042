//! Poster rendering.
//!
//! | Step | Crate / function |
//! |---|---|
//! | **Clear + background** | [`Surface::begin`] + `image::imageops::overlay` |
//! | **Captions** | `usvg` text layout + `resvg` rasterisation ([`TextPainter`]) |
//! | **Photo** | `DynamicImage::resize_exact` (Lanczos3), no aspect correction |
//! | **Encode** | `image` PNG encoder |
//!
//! The module is split into:
//! - **Layout**: [`PosterLayout`], the pixel geometry resolved from config
//! - **Surface**: the reusable canvas every render starts by clearing
//! - **Backend**: [`PosterBackend`] trait + [`RasterBackend`]
//! - **Text**: caption rasterisation

pub mod backend;
mod layout;
pub mod raster;
mod surface;
mod text;

pub use backend::{PosterBackend, PosterJob, RenderError};
pub use layout::{PhotoRect, PosterLayout, TextAnchor};
pub use raster::RasterBackend;
pub use surface::Surface;
pub use text::{TextPainter, TextRun};
