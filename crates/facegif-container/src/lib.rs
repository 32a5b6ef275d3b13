//! facegif-container — Frame sources and sinks for the replacement pipeline.
//!
//! Decodes animated GIFs into full-canvas RGBA frames with per-frame delays,
//! encodes them back, and loads still images for source faces.

pub mod gif;
pub mod still;

use thiserror::Error;

pub use gif::{decode_gif, encode_gif, read_gif, write_gif, GifInfo, GifSequence, Repeat};
pub use still::{load_frames, load_still, save_still};

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("no frames to encode")]
    NoFrames,
    #[error("{frames} frames but {delays} delays")]
    DelayCountMismatch { frames: usize, delays: usize },
}
