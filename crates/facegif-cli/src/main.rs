use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use facegif_container::{load_frames, load_still, read_gif, save_still, write_gif};
use facegif_core::source::extract_face;
use facegif_core::{BoundingBox, DetectionFailurePolicy, DetectorModel, Frame, ReplaceStrategy, TARGET_PADDING};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use uuid::Uuid;

mod config;
mod engine;

use config::{Config, FileConfig};
use engine::{EngineHandle, JobProgress, ReplaceJob};

#[derive(Parser)]
#[command(name = "facegif", about = "Replace faces in animated GIFs", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that loads the detector.
#[derive(Args)]
struct DetectorArgs {
    /// Detection model: accurate (SCRFD 10G) or fast (SCRFD 500M)
    #[arg(long)]
    model: Option<DetectorModel>,
    /// Directory holding the ONNX models
    #[arg(long)]
    model_dir: Option<PathBuf>,
    /// TOML config file, applied over FACEGIF_* environment variables
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace every face in a GIF with the face from an image
    Replace {
        /// Image containing the source face (largest face is used)
        #[arg(long)]
        face: PathBuf,
        /// Input GIF
        #[arg(long)]
        gif: PathBuf,
        /// Output GIF
        #[arg(short, long)]
        output: PathBuf,
        /// Blend strength in [0, 1]
        #[arg(long)]
        blend: Option<f32>,
        /// plain or harmonized
        #[arg(long)]
        strategy: Option<ReplaceStrategy>,
        /// What a failed detection does: skip the frame or abort the job
        #[arg(long)]
        on_detection_failure: Option<DetectionFailurePolicy>,
        #[command(flatten)]
        detector: DetectorArgs,
    },
    /// Print detected faces per frame as JSON
    Detect {
        /// GIF or still image
        path: PathBuf,
        /// Write each detected face (with margin) as a PNG into this directory
        #[arg(long)]
        crops: Option<PathBuf>,
        #[command(flatten)]
        detector: DetectorArgs,
    },
    /// Print GIF metadata as JSON
    Info {
        gif: PathBuf,
    },
}

#[derive(Serialize)]
struct FrameFaces {
    frame: usize,
    faces: Vec<BoundingBox>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replace {
            face,
            gif,
            output,
            blend,
            strategy,
            on_detection_failure,
            detector,
        } => {
            let mut config = load_config(&detector)?;
            if let Some(blend) = blend {
                config.replacer.blend_strength = blend;
            }
            if let Some(strategy) = strategy {
                config.replacer.strategy = strategy;
            }
            if let Some(policy) = on_detection_failure {
                config.replacer.on_detection_failure = policy;
            }
            replace(&config, &face, &gif, &output).await?;
        }
        Commands::Detect { path, crops, detector } => {
            let config = load_config(&detector)?;
            detect(&config, &path, crops.as_deref()).await?;
        }
        Commands::Info { gif } => {
            let sequence = read_gif(&gif).with_context(|| format!("failed to read {}", gif.display()))?;
            println!("{}", serde_json::to_string_pretty(&sequence.info())?);
        }
    }

    Ok(())
}

/// Environment, then config file, then detector flags.
fn load_config(args: &DetectorArgs) -> Result<Config> {
    let mut config = Config::from_env();
    if let Some(path) = &args.config {
        config.apply_file(FileConfig::load(path)?);
    }
    if let Some(model) = args.model {
        config.detector_model = model;
    }
    if let Some(dir) = &args.model_dir {
        config.model_dir = dir.clone();
    }
    Ok(config)
}

fn start_engine(config: &Config) -> Result<EngineHandle> {
    engine::spawn_engine(&config.model_dir, config.detector_model, config.confidence_threshold)
        .with_context(|| format!("failed to start engine with model {}", config.detector_model_path().display()))
}

async fn replace(config: &Config, face: &Path, gif: &Path, output: &Path) -> Result<()> {
    let blend = config.replacer.blend_strength;
    if !(0.0..=1.0).contains(&blend) {
        bail!("blend strength must be within [0, 1], got {blend}");
    }
    if config.replacer.source_padding <= 0.0 {
        bail!("source padding must be positive, got {}", config.replacer.source_padding);
    }

    let source = load_still(face).with_context(|| format!("failed to read face image {}", face.display()))?;
    let sequence = read_gif(gif).with_context(|| format!("failed to read {}", gif.display()))?;
    if sequence.is_empty() {
        bail!("{} contains no frames", gif.display());
    }
    let delays = sequence.delays_ms.clone();
    let frames: Vec<Frame> = sequence.frames.iter().map(Frame::from_rgba).collect();

    let engine = start_engine(config)?;
    let id = Uuid::new_v4();
    tracing::info!(
        job = %id,
        face = %face.display(),
        gif = %gif.display(),
        frames = frames.len(),
        fps = sequence.fps(),
        "job submitted"
    );

    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(log_progress(progress_rx));

    let job = ReplaceJob {
        id,
        source,
        frames,
        config: config.replacer,
    };
    let result = engine.replace(job, progress_tx).await;
    if let Err(err) = reporter.await {
        tracing::warn!(job = %id, error = %err, "progress reporter failed");
    }
    let processed = result.with_context(|| format!("job {id} failed"))?;

    let rgba: Vec<_> = processed.iter().map(Frame::to_rgba).collect();
    write_gif(output, &rgba, &delays).with_context(|| format!("failed to write {}", output.display()))?;

    tracing::info!(job = %id, output = %output.display(), "job complete");
    println!("{}", output.display());
    Ok(())
}

/// Log job progress at roughly every tenth of the sequence.
async fn log_progress(mut rx: mpsc::UnboundedReceiver<JobProgress>) {
    let mut last_decile = 0;
    while let Some(JobProgress { id, done, total }) = rx.recv().await {
        let decile = done * 10 / total.max(1);
        if decile > last_decile || done == total {
            last_decile = decile;
            tracing::info!(job = %id, done, total, "progress");
        } else {
            tracing::debug!(job = %id, done, total, "progress");
        }
    }
}

async fn detect(config: &Config, path: &Path, crops: Option<&Path>) -> Result<()> {
    let sequence = load_frames(path).with_context(|| format!("failed to read {}", path.display()))?;
    let frames: Vec<_> = sequence
        .frames
        .into_iter()
        .map(|f| Frame::from_rgba(&f).rgb)
        .collect();

    let engine = start_engine(config)?;
    let detections = engine.detect(frames.clone()).await?;

    if let Some(dir) = crops {
        std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let mut written = 0;
        for (index, (frame, faces)) in frames.iter().zip(&detections).enumerate() {
            for (n, face) in faces.iter().enumerate() {
                let Some((crop, _)) = extract_face(frame, face, TARGET_PADDING) else {
                    continue;
                };
                let file = dir.join(format!("frame{index:04}_face{n}.png"));
                save_still(&file, &crop).with_context(|| format!("failed to write {}", file.display()))?;
                written += 1;
            }
        }
        tracing::info!(dir = %dir.display(), crops = written, "face crops written");
    }

    let report: Vec<FrameFaces> = detections
        .into_iter()
        .enumerate()
        .map(|(frame, faces)| FrameFaces { frame, faces })
        .collect();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
