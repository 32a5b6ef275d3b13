//! Geometric fitting of the source face onto a target box.

use crate::types::SourceFace;
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Resize the source face to exactly `target_width`×`target_height`.
///
/// Aspect ratio is not preserved: the face is stretched to fill the box.
pub fn fit(source: &SourceFace, target_width: u32, target_height: u32) -> RgbImage {
    if source.image.dimensions() == (target_width, target_height) {
        return source.image.clone();
    }
    imageops::resize(&source.image, target_width, target_height, FilterType::Lanczos3)
}
