//! Still images: source faces, face crops, single-frame inputs.

use crate::gif::{read_gif, GifSequence, DEFAULT_DELAY_MS};
use crate::ContainerError;
use image::RgbImage;
use std::path::Path;

/// Load any image format `image` understands, as 8-bit RGB.
pub fn load_still(path: &Path) -> Result<RgbImage, ContainerError> {
    let image = image::open(path)?;
    tracing::debug!(path = %path.display(), width = image.width(), height = image.height(), "still loaded");
    Ok(image.to_rgb8())
}

/// Save an RGB image; the format follows the file extension.
pub fn save_still(path: &Path, image: &RgbImage) -> Result<(), ContainerError> {
    image.save(path)?;
    Ok(())
}

fn is_gif(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"))
}

/// Load a path as a frame sequence: a GIF's frames, or a still as one frame.
pub fn load_frames(path: &Path) -> Result<GifSequence, ContainerError> {
    if is_gif(path) {
        return read_gif(path);
    }
    let image = image::open(path)?;
    Ok(GifSequence {
        frames: vec![image.to_rgba8()],
        delays_ms: vec![DEFAULT_DELAY_MS],
    })
}
