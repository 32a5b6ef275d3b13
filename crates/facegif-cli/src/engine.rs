use facegif_core::detector::DetectorError;
use facegif_core::{
    BoundingBox, DetectorModel, FaceLocator, FaceReplacer, Frame, LocateError, ReplaceError, ReplacerConfig,
    ScrfdDetector,
};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("detection failed: {0}")]
    Locate(#[from] LocateError),
    #[error(transparent)]
    Replace(#[from] ReplaceError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// One face replacement job.
pub struct ReplaceJob {
    pub id: Uuid,
    pub source: RgbImage,
    pub frames: Vec<Frame>,
    pub config: ReplacerConfig,
}

/// Frames finished so far for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobProgress {
    pub id: Uuid,
    pub done: usize,
    pub total: usize,
}

/// Messages sent from the front end to the engine thread.
enum EngineRequest {
    Replace {
        job: ReplaceJob,
        progress: mpsc::UnboundedSender<JobProgress>,
        reply: oneshot::Sender<Result<Vec<Frame>, EngineError>>,
    },
    Detect {
        frames: Vec<RgbImage>,
        reply: oneshot::Sender<Result<Vec<Vec<BoundingBox>>, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Run a replacement job, streaming per-frame progress into `progress`.
    pub async fn replace(
        &self,
        job: ReplaceJob,
        progress: mpsc::UnboundedSender<JobProgress>,
    ) -> Result<Vec<Frame>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Replace {
                job,
                progress,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Locate faces in each frame independently.
    pub async fn detect(&self, frames: Vec<RgbImage>) -> Result<Vec<Vec<BoundingBox>>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Detect {
                frames,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Load the SCRFD model from `model_dir` and spawn the engine around it.
///
/// Fails fast if the model cannot be loaded.
pub fn spawn_engine(
    model_dir: &Path,
    model: DetectorModel,
    confidence_threshold: f32,
) -> Result<EngineHandle, EngineError> {
    let detector = ScrfdDetector::load_from_dir(model_dir, model)?.with_confidence_threshold(confidence_threshold);
    tracing::info!(
        dir = %model_dir.display(),
        model = %detector.model(),
        confidence_threshold,
        "SCRFD detector loaded"
    );
    spawn_with_locator(detector)
}

/// Spawn the engine on a dedicated OS thread that owns `locator`.
pub fn spawn_with_locator<L>(mut locator: L) -> Result<EngineHandle, EngineError>
where
    L: FaceLocator + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("facegif-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Replace { job, progress, reply } => {
                        let result = run_replace(&mut locator, job, &progress);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Detect { frames, reply } => {
                        let result = run_detect(&mut locator, &frames);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

fn run_replace<L: FaceLocator>(
    locator: &mut L,
    job: ReplaceJob,
    progress: &mpsc::UnboundedSender<JobProgress>,
) -> Result<Vec<Frame>, EngineError> {
    let ReplaceJob { id, source, frames, config } = job;
    tracing::info!(job = %id, frames = frames.len(), strategy = %config.strategy, "replace: job started");

    let mut replacer = FaceReplacer::new(locator, config);
    replacer.set_source_face(&source)?;

    let mut report = |done: usize, total: usize| {
        // The receiver going away only means nobody is watching.
        let _ = progress.send(JobProgress { id, done, total });
    };
    let output = replacer.process_sequence(frames, config.blend_strength, Some(&mut report))?;

    tracing::info!(job = %id, frames = output.len(), "replace: job finished");
    Ok(output)
}

fn run_detect<L: FaceLocator>(locator: &mut L, frames: &[RgbImage]) -> Result<Vec<Vec<BoundingBox>>, EngineError> {
    let mut results = Vec::with_capacity(frames.len());
    for (index, frame) in frames.iter().enumerate() {
        let faces = locator.locate(frame)?;
        tracing::debug!(frame = index, faces = faces.len(), "detect: frame done");
        results.push(faces);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Reports the same box on every call.
    struct FixedLocator(Vec<BoundingBox>);

    impl FaceLocator for FixedLocator {
        fn locate(&mut self, _image: &RgbImage) -> Result<Vec<BoundingBox>, LocateError> {
            Ok(self.0.clone())
        }
    }

    /// Never finds anything.
    struct BlindLocator;

    impl FaceLocator for BlindLocator {
        fn locate(&mut self, _image: &RgbImage) -> Result<Vec<BoundingBox>, LocateError> {
            Ok(Vec::new())
        }
    }

    fn textured(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x * 5 % 256) as u8, (y * 3 % 256) as u8, 90]))
    }

    fn job(frames: usize) -> ReplaceJob {
        ReplaceJob {
            id: Uuid::new_v4(),
            source: textured(80, 80),
            frames: (0..frames).map(|_| Frame::from_rgb(textured(80, 80))).collect(),
            config: ReplacerConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_replace_streams_progress() {
        let face = BoundingBox::new(20, 60, 60, 20);
        let engine = spawn_with_locator(FixedLocator(vec![face])).unwrap();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

        let job = job(3);
        let id = job.id;
        let frames = engine.replace(job, progress_tx).await.unwrap();
        assert_eq!(frames.len(), 3);

        let mut seen = Vec::new();
        while let Some(update) = progress_rx.recv().await {
            assert_eq!(update.id, id);
            seen.push((update.done, update.total));
        }
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn test_replace_without_source_face_fails() {
        let engine = spawn_with_locator(BlindLocator).unwrap();
        let (progress_tx, _progress_rx) = mpsc::unbounded_channel();
        let err = engine.replace(job(2), progress_tx).await.unwrap_err();
        assert!(matches!(err, EngineError::Replace(ReplaceError::Source(_))));
    }

    #[tokio::test]
    async fn test_detect_per_frame() {
        let face = BoundingBox::new(1, 5, 5, 1);
        let engine = spawn_with_locator(FixedLocator(vec![face])).unwrap();
        let results = engine.detect(vec![textured(8, 8), textured(8, 8)]).await.unwrap();
        assert_eq!(results, vec![vec![face], vec![face]]);
    }

    #[tokio::test]
    async fn test_handle_is_shared() {
        let engine = spawn_with_locator(BlindLocator).unwrap();
        let other = engine.clone();
        let (a, b) = tokio::join!(engine.detect(vec![textured(4, 4)]), other.detect(vec![]));
        assert_eq!(a.unwrap(), vec![Vec::<BoundingBox>::new()]);
        assert!(b.unwrap().is_empty());
    }

    #[test]
    fn test_spawn_engine_reports_missing_model() {
        let Err(err) = spawn_engine(Path::new("/nonexistent/models"), DetectorModel::Accurate, 0.5) else {
            panic!("engine should not start without a model");
        };
        assert!(matches!(err, EngineError::Detector(DetectorError::ModelNotFound(path)) if path.ends_with("det_10g.onnx")));
    }
}
