//! Blending a prepared face patch into a frame.
//!
//! The primary path is a Poisson (gradient-domain) clone: inside the mask the
//! frame takes the patch's gradients while its boundary keeps the frame's own
//! colors, so seams disappear. When the patch cannot be placed wholly inside
//! the frame, or the solver cannot produce a result, a plain mask-weighted
//! alpha blend is used instead.

use crate::types::{BoundingBox, Mask};
use image::{Rgb, RgbImage};
use ndarray::Array2;
use thiserror::Error;

const MAX_SOLVER_ITERATIONS: usize = 1500;
const SOLVER_TOLERANCE: f32 = 0.05;

#[derive(Error, Debug)]
pub enum CompositeError {
    #[error("blend center ({cx}, {cy}) too close to the frame edge for a {width}x{height} patch")]
    OutOfBounds {
        cx: i32,
        cy: i32,
        width: u32,
        height: u32,
    },
    #[error("mask selects no interior pixels")]
    EmptyRegion,
    #[error("poisson solver produced non-finite values")]
    Diverged,
}

/// Which blend produced a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendPath {
    Seamless,
    Alpha,
    /// Patch and mask disagreed in size; the frame was returned as-is.
    Skipped,
}

/// A composited frame plus the path that produced it.
#[derive(Debug, Clone)]
pub struct Composite {
    pub image: RgbImage,
    pub path: BlendPath,
}

/// Merge `patch` into `frame` over `face`, weighted by `mask` and `blend_strength`.
///
/// `patch` and `mask` must both have the box's dimensions. Inputs are left
/// untouched; the composite is a new image of the frame's size.
pub fn composite(
    frame: &RgbImage,
    face: &BoundingBox,
    patch: &RgbImage,
    mask: &Mask,
    blend_strength: f32,
) -> Composite {
    if patch.dimensions() != mask.dimensions() {
        tracing::warn!(
            patch = ?patch.dimensions(),
            mask = ?mask.dimensions(),
            "patch/mask size mismatch, leaving frame unchanged"
        );
        return Composite { image: frame.clone(), path: BlendPath::Skipped };
    }

    match seamless_clone(frame, face, patch, mask) {
        Ok(mut blended) => {
            if blend_strength < 1.0 {
                mix_with_frame(&mut blended, frame, face, patch.dimensions(), blend_strength);
            }
            Composite { image: blended, path: BlendPath::Seamless }
        }
        Err(err) => {
            tracing::debug!(error = %err, ?face, "seamless clone unavailable, using alpha blend");
            Composite {
                image: alpha_blend(frame, face.top, face.left, patch, mask, blend_strength),
                path: BlendPath::Alpha,
            }
        }
    }
}

/// Top-left frame coordinate at which a patch centered on the box lands.
fn patch_origin(face: &BoundingBox, width: u32, height: u32) -> (i32, i32) {
    let (cx, cy) = face.center();
    (cx - (width / 2) as i32, cy - (height / 2) as i32)
}

/// Check that the patch, centered on the box, lies inside the frame.
fn check_placement(frame: &RgbImage, face: &BoundingBox, width: u32, height: u32) -> Result<(), CompositeError> {
    let (cx, cy) = face.center();
    let half_w = (width / 2) as i32;
    let half_h = (height / 2) as i32;
    let frame_w = frame.width() as i32;
    let frame_h = frame.height() as i32;

    if cx < half_w || cx >= frame_w - half_w || cy < half_h || cy >= frame_h - half_h {
        return Err(CompositeError::OutOfBounds { cx, cy, width, height });
    }
    Ok(())
}

/// Poisson clone with the patch's gradients as the guidance field.
fn seamless_clone(
    frame: &RgbImage,
    face: &BoundingBox,
    patch: &RgbImage,
    mask: &Mask,
) -> Result<RgbImage, CompositeError> {
    let (width, height) = patch.dimensions();
    check_placement(frame, face, width, height)?;

    let (ox, oy) = patch_origin(face, width, height);
    let (w, h) = (width as usize, height as usize);
    let frame_w = frame.width() as i32;
    let frame_h = frame.height() as i32;

    // Interior pixels: masked in, off the patch's outer ring, inside the frame.
    let mut interior = Array2::<bool>::from_elem((h, w), false);
    let mut pixels = Vec::new();
    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let fx = ox + x as i32;
            let fy = oy + y as i32;
            let in_frame = fx >= 1 && fy >= 1 && fx < frame_w - 1 && fy < frame_h - 1;
            if in_frame && mask.get_pixel(x as u32, y as u32)[0] > 0 {
                interior[[y, x]] = true;
                pixels.push((y, x));
            }
        }
    }
    if pixels.is_empty() {
        return Err(CompositeError::EmptyRegion);
    }

    let omega = 2.0 / (1.0 + (std::f32::consts::PI / w.max(h) as f32).sin());
    let mut out = frame.clone();

    for ch in 0..3 {
        let source = Array2::from_shape_fn((h, w), |(y, x)| patch.get_pixel(x as u32, y as u32)[ch] as f32);
        let target = Array2::from_shape_fn((h, w), |(y, x)| {
            let fx = (ox + x as i32).clamp(0, frame_w - 1) as u32;
            let fy = (oy + y as i32).clamp(0, frame_h - 1) as u32;
            frame.get_pixel(fx, fy)[ch] as f32
        });

        let solved = solve_channel(&source, &target, &interior, &pixels, omega)?;

        for &(y, x) in &pixels {
            let px = out.get_pixel_mut((ox + x as i32) as u32, (oy + y as i32) as u32);
            px[ch] = solved[[y, x]].round().clamp(0.0, 255.0) as u8;
        }
    }

    Ok(out)
}

/// Solve Δf = Δsource over the interior with f = target on its boundary.
///
/// Successive over-relaxation, started from the source shifted by the mean
/// boundary offset so only the low-frequency mismatch has to diffuse in.
fn solve_channel(
    source: &Array2<f32>,
    target: &Array2<f32>,
    interior: &Array2<bool>,
    pixels: &[(usize, usize)],
    omega: f32,
) -> Result<Array2<f32>, CompositeError> {
    const NEIGHBORS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

    let neighbor = |y: usize, x: usize, (dy, dx): (isize, isize)| {
        ((y as isize + dy) as usize, (x as isize + dx) as usize)
    };

    let mut offset_sum = 0.0f64;
    let mut offset_count = 0usize;
    let mut divergence = Vec::with_capacity(pixels.len());
    for &(y, x) in pixels {
        let mut div = 0.0f32;
        for d in NEIGHBORS {
            let (ny, nx) = neighbor(y, x, d);
            div += source[[y, x]] - source[[ny, nx]];
            if !interior[[ny, nx]] {
                offset_sum += (target[[ny, nx]] - source[[ny, nx]]) as f64;
                offset_count += 1;
            }
        }
        divergence.push(div);
    }
    let offset = if offset_count > 0 { (offset_sum / offset_count as f64) as f32 } else { 0.0 };

    let mut f = target.clone();
    for &(y, x) in pixels {
        f[[y, x]] = source[[y, x]] + offset;
    }

    for iteration in 0..MAX_SOLVER_ITERATIONS {
        let mut max_delta = 0.0f32;
        for (&(y, x), &div) in pixels.iter().zip(&divergence) {
            let sum: f32 = NEIGHBORS
                .iter()
                .map(|&d| {
                    let (ny, nx) = neighbor(y, x, d);
                    f[[ny, nx]]
                })
                .sum();
            let gauss_seidel = (sum + div) / 4.0;
            let delta = omega * (gauss_seidel - f[[y, x]]);
            f[[y, x]] += delta;
            max_delta = max_delta.max(delta.abs());
        }
        if !max_delta.is_finite() {
            return Err(CompositeError::Diverged);
        }
        if max_delta < SOLVER_TOLERANCE {
            tracing::trace!(iteration, "poisson solve converged");
            break;
        }
    }

    if pixels.iter().any(|&(y, x)| !f[[y, x]].is_finite()) {
        return Err(CompositeError::Diverged);
    }
    Ok(f)
}

/// `blended ← (1 − s)·frame + s·blended` over the patch rectangle.
fn mix_with_frame(blended: &mut RgbImage, frame: &RgbImage, face: &BoundingBox, size: (u32, u32), strength: f32) {
    let (ox, oy) = patch_origin(face, size.0, size.1);
    let x0 = ox.max(0) as u32;
    let y0 = oy.max(0) as u32;
    let x1 = ((ox + size.0 as i32).max(0) as u32).min(frame.width());
    let y1 = ((oy + size.1 as i32).max(0) as u32).min(frame.height());

    for y in y0..y1 {
        for x in x0..x1 {
            let original = frame.get_pixel(x, y);
            let px = blended.get_pixel_mut(x, y);
            for ch in 0..3 {
                let v = (1.0 - strength) * original[ch] as f32 + strength * px[ch] as f32;
                px[ch] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Mask-weighted linear blend of `patch` placed at (`top`, `left`).
///
/// Only the part of the patch overlapping the frame is used; the rest is
/// dropped. An empty overlap, or a mask not matching the patch size,
/// returns an unmodified copy of the frame.
pub fn alpha_blend(
    frame: &RgbImage,
    top: i32,
    left: i32,
    patch: &RgbImage,
    mask: &Mask,
    blend_strength: f32,
) -> RgbImage {
    let mut result = frame.clone();
    if patch.dimensions() != mask.dimensions() {
        tracing::warn!(
            patch = ?patch.dimensions(),
            mask = ?mask.dimensions(),
            "patch/mask size mismatch, leaving frame unchanged"
        );
        return result;
    }
    let (w, h) = patch.dimensions();
    let frame_w = frame.width() as i64;
    let frame_h = frame.height() as i64;

    let start_x = (left as i64).max(0);
    let start_y = (top as i64).max(0);
    let end_x = (left as i64 + w as i64).min(frame_w);
    let end_y = (top as i64 + h as i64).min(frame_h);

    if end_x <= start_x || end_y <= start_y {
        return result;
    }

    for fy in start_y..end_y {
        for fx in start_x..end_x {
            let px = (fx - left as i64) as u32;
            let py = (fy - top as i64) as u32;
            let weight = mask.get_pixel(px, py)[0] as f32 / 255.0 * blend_strength;
            let src = patch.get_pixel(px, py);
            let dst = *result.get_pixel(fx as u32, fy as u32);
            let blended = Rgb(std::array::from_fn(|ch| {
                let v = weight * src[ch] as f32 + (1.0 - weight) * dst[ch] as f32;
                v.round().clamp(0.0, 255.0) as u8
            }));
            result.put_pixel(fx as u32, fy as u32, blended);
        }
    }

    result
}
