//! Pixel geometry of a poster.
//!
//! [`PosterLayout`] is the resolved, validated view of the layout sections of
//! [`PosterConfig`](crate::config::PosterConfig). It says *where* things go;
//! the backend decides *how* to draw them.

use crate::config::{PhotoSlot, PosterConfig, TextSlot};

/// Left edge and baseline of one caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextAnchor {
    pub x: i32,
    pub y: i32,
}

impl From<TextSlot> for TextAnchor {
    fn from(slot: TextSlot) -> Self {
        Self {
            x: slot.x,
            y: slot.y,
        }
    }
}

/// Destination box of the photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl From<PhotoSlot> for PhotoRect {
    fn from(slot: PhotoSlot) -> Self {
        Self {
            x: slot.x,
            y: slot.y,
            width: slot.width,
            height: slot.height,
        }
    }
}

impl PhotoRect {
    /// Whether any part of the box lands on a `width`×`height` canvas.
    pub fn intersects_canvas(&self, width: u32, height: u32) -> bool {
        let (x, y) = (i64::from(self.x), i64::from(self.y));
        let right = x + i64::from(self.width);
        let bottom = y + i64::from(self.height);
        right > 0 && bottom > 0 && x < i64::from(width) && y < i64::from(height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosterLayout {
    pub width: u32,
    pub height: u32,
    pub school: TextAnchor,
    pub major: TextAnchor,
    pub photo: PhotoRect,
}

impl PosterLayout {
    pub fn from_config(config: &PosterConfig) -> Self {
        Self {
            width: config.canvas.width,
            height: config.canvas.height,
            school: config.school.into(),
            major: config.major.into(),
            photo: config.photo.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_layout() {
        let layout = PosterLayout::from_config(&PosterConfig::default());
        assert_eq!((layout.width, layout.height), (750, 1334));
        assert_eq!(layout.school, TextAnchor { x: 85, y: 550 });
        assert_eq!(layout.major, TextAnchor { x: 85, y: 670 });
        assert_eq!(
            layout.photo,
            PhotoRect {
                x: 85,
                y: 800,
                width: 580,
                height: 400
            }
        );
    }

    #[test]
    fn stock_photo_fits_canvas() {
        let layout = PosterLayout::from_config(&PosterConfig::default());
        assert!(layout.photo.intersects_canvas(layout.width, layout.height));
        assert!(layout.photo.x as u32 + layout.photo.width <= layout.width);
        assert!(layout.photo.y as u32 + layout.photo.height <= layout.height);
    }

    #[test]
    fn photo_outside_canvas_does_not_intersect() {
        let rect = PhotoRect {
            x: 800,
            y: 0,
            width: 10,
            height: 10,
        };
        assert!(!rect.intersects_canvas(750, 1334));

        let above = PhotoRect {
            x: 0,
            y: -20,
            width: 10,
            height: 20,
        };
        assert!(!above.intersects_canvas(750, 1334));
    }

    #[test]
    fn photo_partially_on_canvas_intersects() {
        let rect = PhotoRect {
            x: -5,
            y: -5,
            width: 10,
            height: 10,
        };
        assert!(rect.intersects_canvas(750, 1334));
    }
}
