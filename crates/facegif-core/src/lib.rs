//! facegif-core — Face replacement compositing over frame sequences.
//!
//! Faces are located with SCRFD via ONNX Runtime, a single source face is
//! fitted, color-matched and Poisson-blended onto each of them, and detected
//! positions are carried across frames where detection drops out.

pub mod color;
pub mod composite;
pub mod config;
pub mod detector;
pub mod fit;
pub mod locator;
pub mod mask;
pub mod replacer;
pub mod sequence;
pub mod source;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;

pub use config::{DetectionFailurePolicy, ReplaceStrategy, ReplacerConfig};
pub use detector::ScrfdDetector;
pub use locator::{Capabilities, DetectorModel, FaceLocator, LocateError};
pub use replacer::{FaceReplacer, ReplaceError};
pub use source::{SourceError, SourceFaceManager, SOURCE_PADDING, TARGET_PADDING};
pub use types::{BoundingBox, Frame, Landmarks, Mask, SourceFace};

/// Where ONNX models live when `FACEGIF_MODEL_DIR` is not set:
/// `$XDG_DATA_HOME/facegif/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegif")
        .join("models")
}
