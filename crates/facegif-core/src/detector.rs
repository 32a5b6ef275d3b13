//! SCRFD face detector via ONNX Runtime.
//!
//! Implements the SCRFD (Sample and Computation Redistribution for Efficient Face
//! Detection) model with 3-stride anchor-free decoding and NMS post-processing,
//! and exposes it to the pipeline as a [`FaceLocator`].

use crate::locator::{Capabilities, DetectorModel, FaceLocator, LocateError};
use crate::types::{BoundingBox, Landmarks};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const SCRFD_INPUT_SIZE: usize = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;
/// Minimum overlap for a fresh detection to count as the face landmarks were asked for.
const LANDMARK_MATCH_IOU: f32 = 0.3;

/// Keypoint order of the five SCRFD landmarks.
const LANDMARK_NAMES: [&str; 5] = ["left_eye", "right_eye", "nose_tip", "mouth_left", "mouth_right"];

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}; download it from insightface and place in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("cannot run detection on an empty {0}x{1} frame")]
    EmptyFrame(u32, u32),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

impl From<DetectorError> for LocateError {
    fn from(err: DetectorError) -> Self {
        LocateError::DetectionFailed(err.to_string())
    }
}

/// A raw detection in frame coordinates, before integer snapping.
#[derive(Debug, Clone)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    /// Five-point landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub keypoints: Option<[(f32, f32); 5]>,
}

impl Detection {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Snap to integer edges and clip to the frame. `None` if nothing is left.
    pub fn to_bounding_box(&self, width: u32, height: u32) -> Option<BoundingBox> {
        BoundingBox::new(
            self.y1.round() as i32,
            self.x2.round() as i32,
            self.y2.round() as i32,
            self.x1.round() as i32,
        )
        .clip_to(width, height)
    }

    /// Keypoints as named landmark runs.
    pub fn landmarks(&self) -> Option<Landmarks> {
        let kps = self.keypoints?;
        Some(
            LANDMARK_NAMES
                .iter()
                .zip(kps)
                .map(|(name, point)| (name.to_string(), vec![point]))
                .collect(),
        )
    }
}

/// Metadata for coordinate de-mapping after letterbox resize.
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Output tensor indices for one stride: (score_idx, bbox_idx, kps_idx).
type StrideOutputIndices = (usize, usize, usize);

/// SCRFD-based face detector.
pub struct ScrfdDetector {
    session: Session,
    model: DetectorModel,
    input_height: usize,
    input_width: usize,
    confidence_threshold: f32,
    /// Per-stride output indices [(score, bbox, kps)] for strides [8, 16, 32].
    /// Discovered by name at load time; falls back to positional ordering.
    stride_indices: [StrideOutputIndices; 3],
}

impl ScrfdDetector {
    /// Load the SCRFD ONNX model for `model` from `model_dir`.
    pub fn load_from_dir(model_dir: &Path, model: DetectorModel) -> Result<Self, DetectorError> {
        let path = model_dir.join(model.file_name());
        Self::load(&path.to_string_lossy(), model)
    }

    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &str, model: DetectorModel) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        let num_outputs = output_names.len();

        tracing::info!(
            path = model_path,
            %model,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        if num_outputs < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs (3 strides × score/bbox/kps), got {num_outputs}"
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            model,
            input_height: SCRFD_INPUT_SIZE,
            input_width: SCRFD_INPUT_SIZE,
            confidence_threshold: SCRFD_CONFIDENCE_THRESHOLD,
            stride_indices,
        })
    }

    /// Override the minimum score a detection needs to be kept.
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn model(&self) -> DetectorModel {
        self.model
    }

    /// Detect faces in an RGB frame, returning raw detections sorted by confidence.
    pub fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectorError::EmptyFrame(width, height));
        }

        let (input, letterbox) = preprocess(frame, self.input_width, self.input_height);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut all_detections = Vec::new();

        for (stride_pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx, kps_idx) = self.stride_indices[stride_pos];

            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
            let (_, kps) = outputs[kps_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("kps stride {stride}: {e}")))?;

            let dets = decode_stride(
                scores,
                bboxes,
                kps,
                stride,
                self.input_width,
                self.input_height,
                &letterbox,
                self.confidence_threshold,
            );
            all_detections.extend(dets);
        }

        let result = nms(all_detections, SCRFD_NMS_THRESHOLD);
        tracing::trace!(faces = result.len(), width, height, "SCRFD detect");
        Ok(result)
    }
}

impl FaceLocator for ScrfdDetector {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, LocateError> {
        let (width, height) = image.dimensions();
        let detections = self.detect(image)?;
        Ok(detections
            .iter()
            .filter_map(|d| d.to_bounding_box(width, height))
            .collect())
    }

    fn landmarks(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Option<Landmarks>, LocateError> {
        let detections = self
            .detect(image)
            .map_err(|e| LocateError::LandmarksFailed(e.to_string()))?;
        let target = Detection {
            x1: face.left as f32,
            y1: face.top as f32,
            x2: face.right as f32,
            y2: face.bottom as f32,
            confidence: 1.0,
            keypoints: None,
        };
        Ok(best_overlap(&detections, &target).and_then(Detection::landmarks))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { model: Some(self.model), landmarks: true }
    }
}

/// The detection overlapping `target` the most, if it overlaps enough.
fn best_overlap<'a>(detections: &'a [Detection], target: &Detection) -> Option<&'a Detection> {
    detections
        .iter()
        .map(|d| (d, iou(d, target)))
        .filter(|(_, overlap)| *overlap >= LANDMARK_MATCH_IOU)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(d, _)| d)
}

/// Preprocess an RGB frame into a NCHW float tensor with letterbox padding.
fn preprocess(frame: &RgbImage, input_width: usize, input_height: usize) -> (Array4<f32>, LetterboxInfo) {
    let (width, height) = (frame.width() as usize, frame.height() as usize);

    // Compute letterbox scale (fit within input_width × input_height)
    let scale_w = input_width as f32 / width as f32;
    let scale_h = input_height as f32 / height as f32;
    let scale = scale_w.min(scale_h);

    let new_w = ((width as f32 * scale).round() as usize).clamp(1, input_width);
    let new_h = ((height as f32 * scale).round() as usize).clamp(1, input_height);
    let pad_x = (input_width - new_w) as f32 / 2.0;
    let pad_y = (input_height - new_h) as f32 / 2.0;

    let letterbox = LetterboxInfo { scale, pad_x, pad_y };

    let resized = imageops::resize(frame, new_w as u32, new_h as u32, FilterType::Triangle);

    // Create NCHW tensor with letterbox padding (pad with SCRFD_MEAN → normalizes to 0.0)
    let pad_x_start = pad_x.floor() as usize;
    let pad_y_start = pad_y.floor() as usize;

    let mut tensor = Array4::<f32>::zeros((1, 3, input_height, input_width));

    for (x, y, px) in resized.enumerate_pixels() {
        let tx = pad_x_start + x as usize;
        let ty = pad_y_start + y as usize;
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = (px[c] as f32 - SCRFD_MEAN) / SCRFD_STD;
        }
    }

    (tensor, letterbox)
}

/// Discover output tensor ordering by name.
///
/// SCRFD models may export tensors with named outputs ("score_8", "bbox_16", ...) or
/// generic numeric names. If named pattern is detected, maps them to stride slots.
/// Otherwise falls back to the standard positional ordering:
///   [0-2] = scores (strides 8, 16, 32)
///   [3-5] = bboxes (strides 8, 16, 32)
///   [6-8] = kps    (strides 8, 16, 32)
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    const POSITIONAL: [StrideOutputIndices; 3] = [(0, 3, 6), (1, 4, 7), (2, 5, 8)];

    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let mut indices = POSITIONAL;
    for (slot, &stride) in indices.iter_mut().zip(SCRFD_STRIDES.iter()) {
        match (find("score", stride), find("bbox", stride), find("kps", stride)) {
            (Some(score), Some(bbox), Some(kps)) => *slot = (score, bbox, kps),
            _ => {
                tracing::info!(
                    ?names,
                    "SCRFD: output names not recognized, using positional mapping [0-2]=scores, [3-5]=bboxes, [6-8]=kps"
                );
                return POSITIONAL;
            }
        }
    }

    tracing::info!("SCRFD: using name-based output tensor mapping");
    indices
}

/// Decode detections for a single stride level.
#[allow(clippy::too_many_arguments)]
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    input_width: usize,
    input_height: usize,
    letterbox: &LetterboxInfo,
    threshold: f32,
) -> Vec<Detection> {
    let grid_h = input_height / stride;
    let grid_w = input_width / stride;
    let num_anchors = grid_h * grid_w * SCRFD_ANCHORS_PER_CELL;

    let unletterbox = |x: f32, y: f32| {
        (
            (x - letterbox.pad_x) / letterbox.scale,
            (y - letterbox.pad_y) / letterbox.scale,
        )
    };

    let mut detections = Vec::new();

    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }

        let anchor_idx = idx / SCRFD_ANCHORS_PER_CELL;
        let anchor_cx = (anchor_idx % grid_w) as f32 * stride as f32;
        let anchor_cy = (anchor_idx / grid_w) as f32 * stride as f32;

        // Decode bbox: [x1_offset, y1_offset, x2_offset, y2_offset] * stride
        let bbox_off = idx * 4;
        if bbox_off + 3 >= bboxes.len() {
            continue;
        }
        let (x1, y1) = unletterbox(
            anchor_cx - bboxes[bbox_off] * stride as f32,
            anchor_cy - bboxes[bbox_off + 1] * stride as f32,
        );
        let (x2, y2) = unletterbox(
            anchor_cx + bboxes[bbox_off + 2] * stride as f32,
            anchor_cy + bboxes[bbox_off + 3] * stride as f32,
        );

        let kps_off = idx * 10;
        let keypoints = (kps_off + 9 < kps.len()).then(|| {
            std::array::from_fn(|i| {
                unletterbox(
                    anchor_cx + kps[kps_off + i * 2] * stride as f32,
                    anchor_cy + kps[kps_off + i * 2 + 1] * stride as f32,
                )
            })
        });

        detections.push(Detection { x1, y1, x2, y2, confidence: score, keypoints });
    }

    detections
}

/// Non-Maximum Suppression: remove overlapping detections, highest confidence first.
fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] {
                continue;
            }
            if iou(&detections[i], &detections[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Compute Intersection-over-Union between two detections.
fn iou(a: &Detection, b: &Detection) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union_area = a.area() + b.area() - inter_area;

    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}
