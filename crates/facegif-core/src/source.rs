//! Extraction and caching of the reference face.

use crate::locator::{FaceLocator, LocateError};
use crate::types::{BoundingBox, SourceFace};
use image::{GenericImageView, RgbImage};
use thiserror::Error;

/// Margin kept around the source face, as a fraction of the box size per side.
///
/// Wider than [`TARGET_PADDING`] so the fitted face keeps some context when it
/// is stretched onto differently shaped boxes.
pub const SOURCE_PADDING: f32 = 0.4;

/// Margin used when cropping faces out of target frames.
pub const TARGET_PADDING: f32 = 0.3;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("no face found in the source image")]
    NoFaceFound,
    #[error(transparent)]
    Locate(#[from] LocateError),
}

/// The box with the largest area; the first one wins a tie.
pub fn largest_face(faces: &[BoundingBox]) -> Option<&BoundingBox> {
    faces.iter().fold(None, |best: Option<&BoundingBox>, face| match best {
        Some(b) if b.area() >= face.area() => Some(b),
        _ => Some(face),
    })
}

/// Crop `face` out of `image`, grown by `padding` on every side and clamped
/// to the image. Returns the crop and the box it was taken from, or `None`
/// if nothing of the box lies inside the image.
pub fn extract_face(image: &RgbImage, face: &BoundingBox, padding: f32) -> Option<(RgbImage, BoundingBox)> {
    let (width, height) = image.dimensions();
    let region = face.padded(padding, width, height).clip_to(width, height)?;
    let crop = image
        .view(
            region.left as u32,
            region.top as u32,
            region.width() as u32,
            region.height() as u32,
        )
        .to_image();
    Some((crop, region))
}

/// Owns the single source face used for every replacement in a job.
#[derive(Debug, Clone)]
pub struct SourceFaceManager {
    padding: f32,
    face: Option<SourceFace>,
}

impl Default for SourceFaceManager {
    fn default() -> Self {
        Self::new(SOURCE_PADDING)
    }
}

impl SourceFaceManager {
    pub fn new(padding: f32) -> Self {
        Self { padding, face: None }
    }

    /// Locate the largest face in `image` and cache it as the source face.
    ///
    /// On failure any previously cached face is kept.
    pub fn set_source<L: FaceLocator + ?Sized>(
        &mut self,
        locator: &mut L,
        image: &RgbImage,
    ) -> Result<&SourceFace, SourceError> {
        let faces = locator.locate(image)?;
        let face = *largest_face(&faces).ok_or(SourceError::NoFaceFound)?;
        let (crop, region) = extract_face(image, &face, self.padding).ok_or(SourceError::NoFaceFound)?;

        let landmarks = if locator.capabilities().landmarks {
            match locator.landmarks(image, &face) {
                Ok(landmarks) => landmarks,
                Err(err) => {
                    tracing::warn!(error = %err, "source landmarks unavailable, continuing without");
                    None
                }
            }
        } else {
            None
        };

        tracing::info!(
            candidates = faces.len(),
            ?face,
            ?region,
            width = crop.width(),
            height = crop.height(),
            landmarks = landmarks.as_ref().map_or(0, |l| l.len()),
            "source face set"
        );

        Ok(self.face.insert(SourceFace { image: crop, landmarks }))
    }

    pub fn face(&self) -> Option<&SourceFace> {
        self.face.as_ref()
    }
}
