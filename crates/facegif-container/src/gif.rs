//! Animated GIF decode/encode via the `image` crate.

use crate::ContainerError;
use image::codecs::gif::{GifDecoder, GifEncoder};
use image::{AnimationDecoder, Delay, RgbaImage};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, Write};
use std::path::Path;

pub use image::codecs::gif::Repeat;

/// Delay assumed for frames that don't carry one.
pub const DEFAULT_DELAY_MS: u32 = 100;

/// Frame rate reported when no delay information is usable.
pub const DEFAULT_FPS: f32 = 10.0;

/// Decoded animation: full-canvas RGBA frames and their display delays.
#[derive(Debug, Clone, Default)]
pub struct GifSequence {
    pub frames: Vec<RgbaImage>,
    pub delays_ms: Vec<u32>,
}

/// Summary of a sequence, as printed by `facegif info`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GifInfo {
    pub frames: usize,
    pub width: u32,
    pub height: u32,
    pub fps: f32,
    pub duration_ms: u64,
}

impl GifSequence {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Canvas size, taken from the first frame.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.frames.first().map(|f| f.dimensions())
    }

    /// Advisory playback rate: 1000 / mean delay.
    pub fn fps(&self) -> f32 {
        if self.delays_ms.is_empty() {
            return DEFAULT_FPS;
        }
        let total: u64 = self.delays_ms.iter().map(|&d| d as u64).sum();
        if total == 0 {
            return DEFAULT_FPS;
        }
        let mean = total as f32 / self.delays_ms.len() as f32;
        1000.0 / mean
    }

    pub fn info(&self) -> GifInfo {
        let (width, height) = self.dimensions().unwrap_or((0, 0));
        GifInfo {
            frames: self.len(),
            width,
            height,
            fps: self.fps(),
            duration_ms: self.delays_ms.iter().map(|&d| d as u64).sum(),
        }
    }
}

fn delay_ms(delay: Delay) -> u32 {
    let (numer, denom) = delay.numer_denom_ms();
    match numer.checked_div(denom) {
        Some(ms) if ms > 0 => ms,
        _ => DEFAULT_DELAY_MS,
    }
}

/// Decode every frame of a GIF, composited onto the full logical screen.
pub fn decode_gif<R: BufRead + Seek>(reader: R) -> Result<GifSequence, ContainerError> {
    let decoder = GifDecoder::new(reader)?;
    let mut sequence = GifSequence::default();
    for frame in decoder.into_frames() {
        let frame = frame?;
        sequence.delays_ms.push(delay_ms(frame.delay()));
        sequence.frames.push(frame.into_buffer());
    }
    tracing::debug!(
        frames = sequence.len(),
        dimensions = ?sequence.dimensions(),
        fps = sequence.fps(),
        "GIF decoded"
    );
    Ok(sequence)
}

pub fn read_gif(path: &Path) -> Result<GifSequence, ContainerError> {
    let file = File::open(path)?;
    decode_gif(BufReader::new(file))
}

/// Encode frames as an animated GIF, one delay per frame.
pub fn encode_gif<W: Write>(
    writer: W,
    frames: &[RgbaImage],
    delays_ms: &[u32],
    repeat: Repeat,
) -> Result<(), ContainerError> {
    if frames.is_empty() {
        return Err(ContainerError::NoFrames);
    }
    if frames.len() != delays_ms.len() {
        return Err(ContainerError::DelayCountMismatch {
            frames: frames.len(),
            delays: delays_ms.len(),
        });
    }

    let mut encoder = GifEncoder::new(writer);
    encoder.set_repeat(repeat)?;
    for (buffer, &ms) in frames.iter().zip(delays_ms) {
        let delay = Delay::from_numer_denom_ms(ms, 1);
        encoder.encode_frame(image::Frame::from_parts(buffer.clone(), 0, 0, delay))?;
    }
    tracing::debug!(frames = frames.len(), "GIF encoded");
    Ok(())
}

/// Write a looping GIF to `path`.
pub fn write_gif(path: &Path, frames: &[RgbaImage], delays_ms: &[u32]) -> Result<(), ContainerError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_gif(&mut writer, frames, delays_ms, Repeat::Infinite)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::io::Cursor;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    fn encoded(frames: &[RgbaImage], delays: &[u32]) -> Vec<u8> {
        let mut bytes = Vec::new();
        encode_gif(&mut bytes, frames, delays, Repeat::Infinite).unwrap();
        bytes
    }

    #[test]
    fn test_encode_decode_preserves_count_size_and_delays() {
        let frames = vec![
            solid(12, 8, [255, 0, 0, 255]),
            solid(12, 8, [0, 0, 255, 255]),
            solid(12, 8, [0, 255, 0, 255]),
        ];
        let bytes = encoded(&frames, &[80, 120, 40]);
        assert_eq!(&bytes[..3], b"GIF");

        let decoded = decode_gif(Cursor::new(bytes)).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded.dimensions(), Some((12, 8)));
        assert_eq!(decoded.delays_ms, vec![80, 120, 40]);

        let first = decoded.frames[0].get_pixel(3, 3);
        assert!(first[0] > 200 && first[2] < 50, "expected red, got {:?}", first.0);
        let second = decoded.frames[1].get_pixel(3, 3);
        assert!(second[2] > 200 && second[0] < 50, "expected blue, got {:?}", second.0);
    }

    #[test]
    fn test_encode_empty_is_error() {
        let mut bytes = Vec::new();
        let err = encode_gif(&mut bytes, &[], &[], Repeat::Infinite).unwrap_err();
        assert!(matches!(err, ContainerError::NoFrames));
    }

    #[test]
    fn test_encode_delay_count_mismatch() {
        let mut bytes = Vec::new();
        let frames = vec![solid(4, 4, [0, 0, 0, 255])];
        let err = encode_gif(&mut bytes, &frames, &[100, 100], Repeat::Infinite).unwrap_err();
        assert!(matches!(err, ContainerError::DelayCountMismatch { frames: 1, delays: 2 }));
    }

    #[test]
    fn test_decode_garbage_is_error() {
        assert!(decode_gif(Cursor::new(b"not a gif".to_vec())).is_err());
    }

    #[test]
    fn test_fps_from_mean_delay() {
        let sequence = GifSequence {
            frames: vec![solid(2, 2, [0; 4]); 2],
            delays_ms: vec![40, 60],
        };
        assert!((sequence.fps() - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_fps_default_without_delays() {
        assert_eq!(GifSequence::default().fps(), DEFAULT_FPS);
    }

    #[test]
    fn test_zero_delay_uses_default() {
        assert_eq!(delay_ms(Delay::from_numer_denom_ms(0, 1)), DEFAULT_DELAY_MS);
        assert_eq!(delay_ms(Delay::from_numer_denom_ms(70, 1)), 70);
    }

    #[test]
    fn test_info_serializes() {
        let sequence = GifSequence {
            frames: vec![solid(5, 3, [0; 4]); 4],
            delays_ms: vec![100; 4],
        };
        let info = sequence.info();
        assert_eq!(info.frames, 4);
        assert_eq!((info.width, info.height), (5, 3));
        assert_eq!(info.duration_ms, 400);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["fps"], 10.0);
    }
}
