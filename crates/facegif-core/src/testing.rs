//! Scripted locator and synthetic images for pipeline tests.

use crate::locator::{Capabilities, FaceLocator, LocateError};
use crate::types::{BoundingBox, Landmarks};
use image::{Rgb, RgbImage};
use std::collections::HashSet;

/// Returns a fixed list of boxes per call, in order. Calls past the end of
/// the script see no faces; calls listed in `failures` return an error.
pub struct ScriptedLocator {
    script: Vec<Vec<BoundingBox>>,
    failures: HashSet<usize>,
    landmarks: bool,
    pub calls: usize,
}

impl ScriptedLocator {
    pub fn new(script: Vec<Vec<BoundingBox>>) -> Self {
        Self { script, failures: HashSet::new(), landmarks: false, calls: 0 }
    }

    pub fn failing_at(script: Vec<Vec<BoundingBox>>, failures: &[usize]) -> Self {
        Self { failures: failures.iter().copied().collect(), ..Self::new(script) }
    }

    /// Report a single `nose_tip` landmark at the box center.
    pub fn with_landmarks(mut self) -> Self {
        self.landmarks = true;
        self
    }
}

impl FaceLocator for ScriptedLocator {
    fn locate(&mut self, _image: &RgbImage) -> Result<Vec<BoundingBox>, LocateError> {
        let call = self.calls;
        self.calls += 1;
        if self.failures.contains(&call) {
            return Err(LocateError::DetectionFailed(format!("scripted failure on call {call}")));
        }
        Ok(self.script.get(call).cloned().unwrap_or_default())
    }

    fn landmarks(&mut self, _image: &RgbImage, face: &BoundingBox) -> Result<Option<Landmarks>, LocateError> {
        if !self.landmarks {
            return Ok(None);
        }
        let (cx, cy) = face.center();
        let mut landmarks = Landmarks::new();
        landmarks.insert("nose_tip".to_string(), vec![(cx as f32, cy as f32)]);
        Ok(Some(landmarks))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { model: None, landmarks: self.landmarks }
    }
}

/// Deterministic non-flat image.
pub fn textured_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 7 + y * 3) % 256) as u8,
            ((x * 2 + y * 5) % 256) as u8,
            ((x * y + 40) % 256) as u8,
        ])
    })
}

/// Bright, noisy face-like patch used as a replacement source.
pub fn source_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = ((x * 13 + y * 29) % 64) as u8;
        Rgb([190 + v, 140 + v / 2, 110 + v / 3])
    })
}
