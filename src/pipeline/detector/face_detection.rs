//! BlazeFace short-range detector. Finds the face box the mesh model is
//! cropped to.

use std::{cmp::Ordering, path::Path};

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use serde::{Deserialize, Serialize};

use super::common::{self, LetterboxInfo};
use crate::types::Frame;

pub const FACE_DETECTOR_INPUT_SIZE: u32 = 128;

/// Eyes, nose tip, mouth, ear tragions.
const FACE_KEYPOINTS: usize = 6;

/// (stride, anchors per cell) of the short-range SSD head.
const ANCHOR_LAYERS: [(u32, usize); 2] = [(8, 2), (16, 6)];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub intra_threads: usize,
}

impl Default for FaceDetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            nms_threshold: 0.3,
            intra_threads: 2,
        }
    }
}

/// One detected face in source-frame pixels. `keypoints[0]` is the right
/// eye and `keypoints[1]` the left eye, from the subject's point of view.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceDetection {
    pub bbox: [f32; 4],
    pub keypoints: Vec<(f32, f32)>,
    pub score: f32,
}

pub struct FaceDetector {
    session: Session,
    cfg: FaceDetectorConfig,
    anchors: Vec<[f32; 2]>,
}

impl FaceDetector {
    pub fn new(model_path: &Path, cfg: FaceDetectorConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(cfg.intra_threads)?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("failed to load face detector from {}", model_path.display())
            })?;

        Ok(Self {
            session,
            cfg,
            anchors: generate_anchors(FACE_DETECTOR_INPUT_SIZE),
        })
    }

    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>> {
        let (input, letterbox) = common::prepare_frame_chw(frame, FACE_DETECTOR_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run face detector session")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "face detector returned {} outputs, expected at least 2",
                outputs.len()
            ));
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let box_shape = regressors.shape().to_vec();
        let score_shape = scores.shape().to_vec();

        decode_face_outputs(
            regressors
                .as_slice()
                .ok_or_else(|| anyhow!("face boxes not contiguous"))?,
            &box_shape,
            scores
                .as_slice()
                .ok_or_else(|| anyhow!("face scores not contiguous"))?,
            &score_shape,
            &self.anchors,
            &letterbox,
            &self.cfg,
        )
    }
}

/// Anchor centres, normalized to the input square, in output order.
pub fn generate_anchors(input_size: u32) -> Vec<[f32; 2]> {
    let mut anchors = Vec::new();
    for (stride, per_cell) in ANCHOR_LAYERS {
        let grid = input_size.div_ceil(stride);
        for y in 0..grid {
            for x in 0..grid {
                let center = [
                    (x as f32 + 0.5) / grid as f32,
                    (y as f32 + 0.5) / grid as f32,
                ];
                anchors.extend(std::iter::repeat_n(center, per_cell));
            }
        }
    }
    anchors
}

fn decode_face_outputs(
    regressors: &[f32],
    box_shape: &[usize],
    scores: &[f32],
    score_shape: &[usize],
    anchors: &[[f32; 2]],
    letterbox: &LetterboxInfo,
    cfg: &FaceDetectorConfig,
) -> Result<Vec<FaceDetection>> {
    if box_shape.len() < 2 || score_shape.len() < 2 {
        return Err(anyhow!(
            "unexpected face detector shapes {box_shape:?} / {score_shape:?}"
        ));
    }

    let anchor_dim = box_shape[box_shape.len() - 2];
    let feature_dim = box_shape[box_shape.len() - 1];
    let score_anchor_dim = score_shape[score_shape.len() - 2];
    let score_feature_dim = score_shape[score_shape.len() - 1].max(1);

    if feature_dim < 4 + FACE_KEYPOINTS * 2 {
        return Err(anyhow!("face box feature dimension too small: {feature_dim}"));
    }
    if anchor_dim != score_anchor_dim {
        return Err(anyhow!(
            "anchor dimension mismatch between boxes ({anchor_dim}) and scores ({score_anchor_dim})"
        ));
    }

    let count = anchors.len().min(anchor_dim);
    let pad_bias_x = letterbox.pad_x / letterbox.scale;
    let pad_bias_y = letterbox.pad_y / letterbox.scale;
    let scale = letterbox.orig_w.max(letterbox.orig_h) as f32;
    let input = FACE_DETECTOR_INPUT_SIZE as f32;
    let to_frame = |nx: f32, ny: f32| (nx * scale - pad_bias_x, ny * scale - pad_bias_y);

    let mut candidates = Vec::new();
    for (idx, anchor) in anchors.iter().take(count).enumerate() {
        let raw_score = *scores
            .get(idx * score_feature_dim)
            .ok_or_else(|| anyhow!("missing score for face anchor {idx}"))?;
        let score = common::sigmoid(raw_score);
        if score < cfg.score_threshold {
            continue;
        }

        let offset = idx * feature_dim;
        let feature = regressors
            .get(offset..offset + 4 + FACE_KEYPOINTS * 2)
            .ok_or_else(|| anyhow!("missing regressors for face anchor {idx}"))?;

        let cx = feature[0] / input + anchor[0];
        let cy = feature[1] / input + anchor[1];
        let hw = feature[2] / input / 2.0;
        let hh = feature[3] / input / 2.0;
        if hw <= 0.0 || hh <= 0.0 {
            continue;
        }

        let (x1, y1) = to_frame(cx - hw, cy - hh);
        let (x2, y2) = to_frame(cx + hw, cy + hh);
        let keypoints = feature[4..]
            .chunks_exact(2)
            .map(|kp| to_frame(kp[0] / input + anchor[0], kp[1] / input + anchor[1]))
            .collect();

        candidates.push(FaceDetection {
            bbox: [x1, y1, x2, y2],
            keypoints,
            score,
        });
    }

    let kept = nms(&candidates, cfg.nms_threshold);
    Ok(kept
        .into_iter()
        .filter_map(|idx| candidates.get(idx).cloned())
        .collect())
}

pub fn pick_primary(detections: &[FaceDetection]) -> Option<&FaceDetection> {
    detections
        .iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal))
}

fn nms(candidates: &[FaceDetection], threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|a, b| {
        candidates[*b]
            .score
            .partial_cmp(&candidates[*a].score)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<usize> = Vec::new();
    'outer: for &idx in &order {
        for &k in &keep {
            if iou(&candidates[idx].bbox, &candidates[k].bbox) >= threshold {
                continue 'outer;
            }
        }
        keep.push(idx);
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}
