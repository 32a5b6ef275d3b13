//! Face localization seam between the pipeline and a detection oracle.

use crate::types::{BoundingBox, Landmarks};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("face detection failed: {0}")]
    DetectionFailed(String),
    #[error("landmark extraction failed: {0}")]
    LandmarksFailed(String),
}

/// Which detection model backs a locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorModel {
    /// SCRFD 10G: slower, better on small and profile faces.
    #[default]
    Accurate,
    /// SCRFD 500M: fast CPU model.
    Fast,
}

impl DetectorModel {
    /// ONNX file name inside the model directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            DetectorModel::Accurate => "det_10g.onnx",
            DetectorModel::Fast => "det_500m.onnx",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorModel::Accurate => "accurate",
            DetectorModel::Fast => "fast",
        }
    }
}

impl fmt::Display for DetectorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "accurate" | "scrfd_10g" | "cnn" => Ok(DetectorModel::Accurate),
            "fast" | "scrfd_500m" | "hog" => Ok(DetectorModel::Fast),
            other => Err(format!("unknown detector model: {other}")),
        }
    }
}

/// What the oracle behind a locator can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub model: Option<DetectorModel>,
    pub landmarks: bool,
}

/// Finds faces in RGB images.
///
/// `locate` returns every face found, in no particular order. An empty list
/// means no face; oracle failures are reported as errors, never as empty.
pub trait FaceLocator {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, LocateError>;

    /// Landmarks for one previously located face, when the oracle supports them.
    fn landmarks(&mut self, _image: &RgbImage, _face: &BoundingBox) -> Result<Option<Landmarks>, LocateError> {
        Ok(None)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { model: None, landmarks: false }
    }
}

impl<L: FaceLocator + ?Sized> FaceLocator for Box<L> {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, LocateError> {
        (**self).locate(image)
    }

    fn landmarks(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Option<Landmarks>, LocateError> {
        (**self).landmarks(image, face)
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }
}

impl<L: FaceLocator + ?Sized> FaceLocator for &mut L {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, LocateError> {
        (**self).locate(image)
    }

    fn landmarks(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Option<Landmarks>, LocateError> {
        (**self).landmarks(image, face)
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_model_parse() {
        assert_eq!("fast".parse::<DetectorModel>().unwrap(), DetectorModel::Fast);
        assert_eq!("Accurate".parse::<DetectorModel>().unwrap(), DetectorModel::Accurate);
        assert_eq!("hog".parse::<DetectorModel>().unwrap(), DetectorModel::Fast);
        assert!("yolo".parse::<DetectorModel>().is_err());
    }

    #[test]
    fn test_detector_model_file_names() {
        assert_eq!(DetectorModel::Accurate.file_name(), "det_10g.onnx");
        assert_eq!(DetectorModel::Fast.file_name(), "det_500m.onnx");
    }

    #[test]
    fn test_default_capabilities() {
        struct Nothing;
        impl FaceLocator for Nothing {
            fn locate(&mut self, _image: &RgbImage) -> Result<Vec<BoundingBox>, LocateError> {
                Ok(Vec::new())
            }
        }
        let mut boxed: Box<dyn FaceLocator> = Box::new(Nothing);
        assert!(!boxed.capabilities().landmarks);
        let img = RgbImage::new(4, 4);
        assert!(boxed.landmarks(&img, &BoundingBox::new(0, 2, 2, 0)).unwrap().is_none());
    }
}
