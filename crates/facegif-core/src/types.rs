use image::{GrayImage, Luma, Rgb, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Axis-aligned face rectangle in frame pixel coordinates.
///
/// Edges follow the (top, right, bottom, left) convention; `right` and
/// `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl BoundingBox {
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self { top, right, bottom, left }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Blend center: `(left + width/2, top + height/2)` with integer division.
    pub fn center(&self) -> (i32, i32) {
        (self.left + self.width() / 2, self.top + self.height() / 2)
    }

    /// Intersect with a `width`×`height` frame. `None` when nothing is left.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<BoundingBox> {
        let clipped = BoundingBox {
            top: self.top.max(0),
            right: self.right.min(width as i32),
            bottom: self.bottom.min(height as i32),
            left: self.left.max(0),
        };
        (!clipped.is_empty()).then_some(clipped)
    }

    /// Grow by `padding × dimension` on each side, clamped to the frame.
    ///
    /// The padding is truncated to whole pixels before it is applied.
    pub fn padded(&self, padding: f32, width: u32, height: u32) -> BoundingBox {
        let pad_h = (self.height() as f32 * padding) as i32;
        let pad_w = (self.width() as f32 * padding) as i32;
        BoundingBox {
            top: (self.top - pad_h).max(0),
            right: (self.right + pad_w).min(width as i32),
            bottom: (self.bottom + pad_h).min(height as i32),
            left: (self.left - pad_w).max(0),
        }
    }
}

/// Named facial features, each an ordered run of 2D points in image coordinates.
pub type Landmarks = BTreeMap<String, Vec<(f32, f32)>>;

/// Single-channel blend weight map; 0 = keep the frame, 255 = take the source.
pub type Mask = GrayImage;

/// The reference face every detected face is replaced with.
#[derive(Debug, Clone)]
pub struct SourceFace {
    pub image: RgbImage,
    pub landmarks: Option<Landmarks>,
}

impl SourceFace {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// A decoded animation frame.
///
/// Compositing works on the color planes only; an alpha plane, when the
/// source had one, is carried through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub rgb: RgbImage,
    pub alpha: Option<GrayImage>,
}

impl Frame {
    pub fn from_rgb(rgb: RgbImage) -> Self {
        Self { rgb, alpha: None }
    }

    /// Split off the alpha plane; color planes are flattened over white so
    /// transparent areas read as background, not as black.
    pub fn from_rgba(rgba: &RgbaImage) -> Self {
        let (width, height) = rgba.dimensions();
        let mut rgb = RgbImage::new(width, height);
        let mut alpha = GrayImage::new(width, height);
        for (x, y, px) in rgba.enumerate_pixels() {
            let a = px[3] as u32;
            let flattened = [px[0], px[1], px[2]].map(|c| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8);
            rgb.put_pixel(x, y, Rgb(flattened));
            alpha.put_pixel(x, y, Luma([px[3]]));
        }
        Self { rgb, alpha: Some(alpha) }
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.rgb.dimensions()
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }

    /// Recombine into RGBA. Frames without alpha come back fully opaque.
    pub fn to_rgba(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width(), self.height(), |x, y| {
            let [r, g, b] = self.rgb.get_pixel(x, y).0;
            let a = self
                .alpha
                .as_ref()
                .map(|alpha| alpha.get_pixel(x, y)[0])
                .unwrap_or(255);
            image::Rgba([r, g, b, a])
        })
    }
}
