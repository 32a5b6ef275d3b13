//! Statistical color transfer in CIE L*a*b*.
//!
//! The fitted source face is shifted so each Lab channel has the target
//! region's mean and standard deviation. Channels are quantized to the 8-bit
//! Lab scale (L·255/100, a+128, b+128) so clipping happens in [0, 255] and a
//! neutral channel is exactly flat.

use image::{Rgb, RgbImage};

/// LAB color (D65). L in 0–100, a/b roughly −128..+128.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    pub l: f32,
    pub a: f32,
    pub b: f32,
}

const D65_X: f32 = 0.95047;
const D65_Y: f32 = 1.00000;
const D65_Z: f32 = 1.08883;

const SRGB_TO_XYZ: [[f32; 3]; 3] = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.1191920, 0.9503041],
];

const XYZ_TO_SRGB: [[f32; 3]; 3] = [
    [3.2404542, -1.5371385, -0.4985314],
    [-0.9692660, 1.8760108, 0.0415560],
    [0.0556434, -0.2040259, 1.0572252],
];

#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    const DELTA_CUBED: f32 = DELTA * DELTA * DELTA;

    if t > DELTA_CUBED {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

#[inline]
fn lab_f_inv(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;

    if t > DELTA {
        t * t * t
    } else {
        3.0 * DELTA * DELTA * (t - 4.0 / 29.0)
    }
}

/// Convert an 8-bit sRGB pixel to LAB.
pub fn srgb_to_lab(px: Rgb<u8>) -> Lab {
    let [r, g, b] = px.0.map(|c| srgb_to_linear(c as f32 / 255.0));

    let x = SRGB_TO_XYZ[0][0] * r + SRGB_TO_XYZ[0][1] * g + SRGB_TO_XYZ[0][2] * b;
    let y = SRGB_TO_XYZ[1][0] * r + SRGB_TO_XYZ[1][1] * g + SRGB_TO_XYZ[1][2] * b;
    let z = SRGB_TO_XYZ[2][0] * r + SRGB_TO_XYZ[2][1] * g + SRGB_TO_XYZ[2][2] * b;

    let fx = lab_f(x / D65_X);
    let fy = lab_f(y / D65_Y);
    let fz = lab_f(z / D65_Z);

    Lab {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

/// Convert LAB back to 8-bit sRGB, clamping out-of-gamut colors.
pub fn lab_to_srgb(lab: Lab) -> Rgb<u8> {
    let fy = (lab.l + 16.0) / 116.0;
    let fx = lab.a / 500.0 + fy;
    let fz = fy - lab.b / 200.0;

    let x = D65_X * lab_f_inv(fx);
    let y = D65_Y * lab_f_inv(fy);
    let z = D65_Z * lab_f_inv(fz);

    let r = XYZ_TO_SRGB[0][0] * x + XYZ_TO_SRGB[0][1] * y + XYZ_TO_SRGB[0][2] * z;
    let g = XYZ_TO_SRGB[1][0] * x + XYZ_TO_SRGB[1][1] * y + XYZ_TO_SRGB[1][2] * z;
    let b = XYZ_TO_SRGB[2][0] * x + XYZ_TO_SRGB[2][1] * y + XYZ_TO_SRGB[2][2] * z;

    Rgb([r, g, b].map(|c| (linear_to_srgb(c) * 255.0).round().clamp(0.0, 255.0) as u8))
}

/// LAB quantized to the 8-bit channel scale.
fn to_scaled_channels(lab: Lab) -> [f32; 3] {
    [lab.l * 255.0 / 100.0, lab.a + 128.0, lab.b + 128.0].map(|v| v.round().clamp(0.0, 255.0))
}

fn from_scaled_channels(c: [f32; 3]) -> Lab {
    Lab {
        l: c[0] * 100.0 / 255.0,
        a: c[1] - 128.0,
        b: c[2] - 128.0,
    }
}

/// Per-channel mean and population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub mean: f64,
    pub std: f64,
}

/// Mean and standard deviation of each scaled Lab channel.
pub fn channel_stats(pixels: &[[f32; 3]]) -> [ChannelStats; 3] {
    let mut stats = [ChannelStats { mean: 0.0, std: 0.0 }; 3];
    if pixels.is_empty() {
        return stats;
    }
    let n = pixels.len() as f64;
    for (ch, s) in stats.iter_mut().enumerate() {
        let mean = pixels.iter().map(|p| p[ch] as f64).sum::<f64>() / n;
        let variance = pixels
            .iter()
            .map(|p| (p[ch] as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        *s = ChannelStats { mean, std: variance.sqrt() };
    }
    stats
}

fn image_to_scaled_lab(image: &RgbImage) -> Vec<[f32; 3]> {
    image.pixels().map(|px| to_scaled_channels(srgb_to_lab(*px))).collect()
}

/// Shift the fitted source's color statistics onto the target region's.
///
/// A channel whose source standard deviation is zero (a flat color) is
/// passed through unscaled. An empty target leaves the source unchanged.
pub fn harmonize(source: &RgbImage, target: &RgbImage) -> RgbImage {
    if source.is_empty() || target.is_empty() {
        return source.clone();
    }

    let mut source_lab = image_to_scaled_lab(source);
    let target_lab = image_to_scaled_lab(target);

    let source_stats = channel_stats(&source_lab);
    let target_stats = channel_stats(&target_lab);

    for ch in 0..3 {
        let s = source_stats[ch];
        let t = target_stats[ch];
        if s.std > 0.0 {
            let ratio = t.std / s.std;
            for px in source_lab.iter_mut() {
                px[ch] = ((px[ch] as f64 - s.mean) * ratio + t.mean) as f32;
            }
        } else {
            tracing::trace!(channel = ch, "flat source channel, skipping transfer");
        }
    }

    let mut out = RgbImage::new(source.width(), source.height());
    for (dst, lab) in out.pixels_mut().zip(source_lab) {
        let clipped = lab.map(|v| v.clamp(0.0, 255.0));
        *dst = lab_to_srgb(from_scaled_channels(clipped));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lab_roundtrip() {
        let cases = [
            [255u8, 0, 0],
            [0, 255, 0],
            [0, 0, 255],
            [255, 255, 255],
            [0, 0, 0],
            [128, 128, 128],
            [204, 102, 51],
        ];
        for c in cases {
            let back = lab_to_srgb(srgb_to_lab(Rgb(c)));
            for i in 0..3 {
                assert!(
                    (back[i] as i32 - c[i] as i32).abs() <= 1,
                    "roundtrip mismatch for {c:?}: {:?}",
                    back.0
                );
            }
        }
    }

    #[test]
    fn test_lab_reference_values() {
        let white = srgb_to_lab(Rgb([255, 255, 255]));
        assert!((white.l - 100.0).abs() < 0.1);
        assert!(white.a.abs() < 0.1 && white.b.abs() < 0.1);

        let gray = srgb_to_lab(Rgb([119, 119, 119]));
        assert!((gray.l - 50.0).abs() < 0.5, "L = {}", gray.l);
        assert!(gray.a.abs() < 0.1 && gray.b.abs() < 0.1);
    }

    #[test]
    fn test_channel_stats() {
        let pixels = [[1.0, 10.0, 0.0], [3.0, 10.0, 0.0]];
        let stats = channel_stats(&pixels);
        assert!((stats[0].mean - 2.0).abs() < 1e-9);
        assert!((stats[0].std - 1.0).abs() < 1e-9);
        assert_eq!(stats[1].std, 0.0);
    }

    #[test]
    fn test_harmonize_moves_mean_toward_target() {
        let source = RgbImage::from_fn(32, 32, |x, y| Rgb([40 + (x as u8), 40 + (y as u8), 60]));
        let target = RgbImage::from_fn(32, 32, |x, y| Rgb([200 - (x as u8), 180 - (y as u8), 150]));

        let out = harmonize(&source, &target);
        assert_eq!(out.dimensions(), source.dimensions());

        let mean_l = |img: &RgbImage| {
            let lab = image_to_scaled_lab(img);
            channel_stats(&lab)[0].mean
        };
        let target_l = mean_l(&target);
        let before = (mean_l(&source) - target_l).abs();
        let after = (mean_l(&out) - target_l).abs();
        assert!(after < before / 4.0, "lightness gap before={before:.2} after={after:.2}");
    }

    #[test]
    fn test_harmonize_flat_source_passes_through() {
        let source = RgbImage::from_pixel(16, 16, Rgb([100, 150, 200]));
        let target = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 30]));

        let out = harmonize(&source, &target);
        let first = *out.get_pixel(0, 0);
        assert!(out.pixels().all(|p| *p == first), "flat source must stay flat");
        for i in 0..3 {
            assert!(
                (first[i] as i32 - source.get_pixel(0, 0)[i] as i32).abs() <= 2,
                "flat channel must be left unscaled: {:?}",
                first.0
            );
        }
    }

    #[test]
    fn test_harmonize_single_flat_channel_no_nan() {
        // Gray ramp: a/b channels are flat, L varies.
        let source = RgbImage::from_fn(20, 1, |x, _| {
            let v = 50 + (x * 8) as u8;
            Rgb([v, v, v])
        });
        let target = RgbImage::from_fn(20, 1, |x, _| Rgb([(x * 10) as u8, 90, 200]));

        let out = harmonize(&source, &target);
        for px in out.pixels() {
            let [r, g, b] = px.0.map(|c| c as i32);
            assert!(
                (r - g).abs() <= 2 && (g - b).abs() <= 2,
                "chroma channels must stay neutral, got {:?}",
                px.0
            );
        }
    }

    #[test]
    fn test_harmonize_empty_target() {
        let source = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
        let out = harmonize(&source, &RgbImage::new(0, 0));
        assert_eq!(out, source);
    }
}
