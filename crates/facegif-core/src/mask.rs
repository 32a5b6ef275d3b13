//! Feathered elliptical blend masks.

use crate::types::Mask;
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::drawing::draw_filled_ellipse_mut;
use imageproc::filter::separable_filter_equal;

const ELLIPSE_WIDTH_RATIO: f32 = 0.45;
const ELLIPSE_HEIGHT_RATIO: f32 = 0.48;
const FEATHER_KERNEL_SIZE: usize = 21;
const FEATHER_SIGMA: f32 = 11.0;

/// Build the blend mask for a `width`×`height` region.
///
/// A filled ellipse (semi-axes 0.45·width and 0.48·height, centered on the
/// region) is feathered with a 21-tap Gaussian so the edge ramps smoothly
/// from 0 to 255. The result depends only on the two dimensions.
pub fn synthesize(width: u32, height: u32) -> Mask {
    if width == 0 || height == 0 {
        return GrayImage::new(width, height);
    }

    let center = ((width / 2) as i32, (height / 2) as i32);
    let axes = (
        (width as f32 * ELLIPSE_WIDTH_RATIO) as i32,
        (height as f32 * ELLIPSE_HEIGHT_RATIO) as i32,
    );
    // Filtered at f32 so the interior rounds back to exactly 255.
    let mut ellipse: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::new(width, height);
    draw_filled_ellipse_mut(&mut ellipse, center, axes.0, axes.1, Luma([255.0f32]));

    let feathered = separable_filter_equal(&ellipse, &feather_kernel());
    GrayImage::from_fn(width, height, |x, y| {
        Luma([feathered.get_pixel(x, y)[0].round().clamp(0.0, 255.0) as u8])
    })
}

/// Normalized 1-D Gaussian taps for the feather blur.
fn feather_kernel() -> [f32; FEATHER_KERNEL_SIZE] {
    let radius = (FEATHER_KERNEL_SIZE / 2) as f32;
    let mut kernel = [0.0f32; FEATHER_KERNEL_SIZE];
    for (i, tap) in kernel.iter_mut().enumerate() {
        let d = i as f32 - radius;
        *tap = (-(d * d) / (2.0 * FEATHER_SIGMA * FEATHER_SIGMA)).exp();
    }
    let sum: f32 = kernel.iter().sum();
    for tap in kernel.iter_mut() {
        *tap /= sum;
    }
    kernel
}
