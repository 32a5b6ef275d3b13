//! Driving the replacer over an ordered frame sequence.

use crate::locator::FaceLocator;
use crate::replacer::{FaceReplacer, ReplaceError};
use crate::types::Frame;

/// Progress callback: `(frames done, total frames)`.
pub type Progress<'a> = &'a mut dyn FnMut(usize, usize);

impl<L: FaceLocator> FaceReplacer<L> {
    /// Replace faces in every frame, in order, returning one frame per input.
    ///
    /// Remembered locations are cleared first so a sequence never coasts on
    /// boxes from a previous one. `progress` is called after each frame.
    pub fn process_sequence(
        &mut self,
        frames: Vec<Frame>,
        blend_strength: f32,
        mut progress: Option<Progress<'_>>,
    ) -> Result<Vec<Frame>, ReplaceError> {
        if frames.is_empty() {
            return Err(ReplaceError::EmptySequence);
        }
        if self.source_face().is_none() {
            return Err(ReplaceError::NoSourceFace);
        }

        let total = frames.len();
        tracing::info!(
            frames = total,
            blend_strength,
            strategy = %self.config().strategy,
            "processing frame sequence"
        );
        self.reset();

        let mut output = Vec::with_capacity(total);
        for (index, frame) in frames.into_iter().enumerate() {
            let processed = self.replace_faces_in_frame(frame, blend_strength).map_err(|err| {
                tracing::error!(frame = index, error = %err, "frame processing failed");
                err
            })?;
            output.push(processed);
            if let Some(callback) = progress.as_mut() {
                callback(index + 1, total);
            }
        }

        tracing::info!(frames = total, "frame sequence complete");
        Ok(output)
    }
}
