//! Per-frame face replacement.

use crate::composite::{self, BlendPath};
use crate::config::{DetectionFailurePolicy, ReplaceStrategy, ReplacerConfig};
use crate::locator::{FaceLocator, LocateError};
use crate::source::{SourceError, SourceFaceManager};
use crate::types::{BoundingBox, Frame, SourceFace};
use crate::{color, fit, mask};
use image::{GenericImageView, RgbImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplaceError {
    #[error("no source face set")]
    NoSourceFace,
    #[error("frame sequence is empty")]
    EmptySequence,
    #[error(transparent)]
    Detection(#[from] LocateError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Replaces every face found in a frame with the cached source face.
///
/// Holds the job state: the source face and, for the harmonized strategy,
/// the last non-empty set of detected boxes.
pub struct FaceReplacer<L: FaceLocator> {
    locator: L,
    config: ReplacerConfig,
    source: SourceFaceManager,
    last_locations: Vec<BoundingBox>,
}

impl<L: FaceLocator> FaceReplacer<L> {
    pub fn new(locator: L, config: ReplacerConfig) -> Self {
        Self {
            locator,
            source: SourceFaceManager::new(config.source_padding),
            config,
            last_locations: Vec::new(),
        }
    }

    pub fn config(&self) -> &ReplacerConfig {
        &self.config
    }

    pub fn locator(&self) -> &L {
        &self.locator
    }

    pub fn source_face(&self) -> Option<&SourceFace> {
        self.source.face()
    }

    /// Boxes reused when a frame comes back without detections.
    pub fn last_locations(&self) -> &[BoundingBox] {
        &self.last_locations
    }

    /// Extract the largest face of `image` as the source and start a fresh job.
    pub fn set_source_face(&mut self, image: &RgbImage) -> Result<(), ReplaceError> {
        self.source.set_source(&mut self.locator, image)?;
        self.reset();
        Ok(())
    }

    /// Forget remembered locations, keeping the source face.
    pub fn reset(&mut self) {
        self.last_locations.clear();
    }

    /// Replace all faces in one frame.
    ///
    /// A frame without faces (and nothing to coast on) is returned as-is.
    pub fn replace_faces_in_frame(&mut self, frame: Frame, blend_strength: f32) -> Result<Frame, ReplaceError> {
        let source = self.source.face().ok_or(ReplaceError::NoSourceFace)?;

        let detected = match self.locator.locate(&frame.rgb) {
            Ok(boxes) => boxes,
            Err(err) => match self.config.on_detection_failure {
                DetectionFailurePolicy::Abort => return Err(err.into()),
                DetectionFailurePolicy::Skip => {
                    tracing::warn!(error = %err, "detection failed, treating frame as faceless");
                    Vec::new()
                }
            },
        };

        let boxes = match self.config.strategy {
            ReplaceStrategy::Plain => detected,
            ReplaceStrategy::Harmonized if !detected.is_empty() => {
                self.last_locations.clone_from(&detected);
                detected
            }
            ReplaceStrategy::Harmonized => {
                if !self.last_locations.is_empty() {
                    tracing::warn!(
                        faces = self.last_locations.len(),
                        "no faces detected, reusing last known locations"
                    );
                }
                self.last_locations.clone()
            }
        };

        if boxes.is_empty() {
            tracing::debug!("no faces in frame, passing through");
            return Ok(frame);
        }

        let Frame { mut rgb, alpha } = frame;
        for face in &boxes {
            if let Some(updated) = replace_one(&rgb, face, source, &self.config, blend_strength) {
                rgb = updated;
            }
        }
        tracing::debug!(faces = boxes.len(), "frame composited");
        Ok(Frame { rgb, alpha })
    }
}

/// Composite the source onto one box. `None` when the box is degenerate.
fn replace_one(
    frame: &RgbImage,
    face: &BoundingBox,
    source: &SourceFace,
    config: &ReplacerConfig,
    blend_strength: f32,
) -> Option<RgbImage> {
    if face.is_empty() {
        tracing::warn!(?face, "degenerate face box, skipping");
        return None;
    }
    let (width, height) = (face.width() as u32, face.height() as u32);

    let fitted = fit::fit(source, width, height);
    let patch = match config.strategy {
        ReplaceStrategy::Plain => fitted,
        ReplaceStrategy::Harmonized => match face.clip_to(frame.width(), frame.height()) {
            Some(region) => {
                let target = frame
                    .view(
                        region.left as u32,
                        region.top as u32,
                        region.width() as u32,
                        region.height() as u32,
                    )
                    .to_image();
                color::harmonize(&fitted, &target)
            }
            None => fitted,
        },
    };
    let weights = mask::synthesize(width, height);

    let result = composite::composite(frame, face, &patch, &weights, blend_strength);
    if result.path == BlendPath::Alpha {
        tracing::warn!(?face, "seamless blend unavailable, used alpha blend");
    }
    Some(result.image)
}
