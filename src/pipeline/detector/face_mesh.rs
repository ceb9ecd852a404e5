use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use serde::{Deserialize, Serialize};

use super::{
    LandmarkDetector,
    common::{self, InputMapping},
    face_detection::{FaceDetector, pick_primary},
    roi::{FaceRoi, RoiTracker},
};
use crate::{
    landmarks::FACE_MESH_POINTS,
    types::{FaceLandmarks, Frame, LandmarkPoint},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceMeshConfig {
    /// Square model input side in pixels.
    pub input_size: u32,
    /// Minimum face-presence probability; frames below it report no face.
    pub min_presence: f32,
    pub intra_threads: usize,
    /// Frames a tracked face region is reused before the face detector
    /// runs again.
    pub redetect_interval: u32,
}

impl Default for FaceMeshConfig {
    fn default() -> Self {
        Self {
            input_size: 192,
            min_presence: 0.5,
            intra_threads: 2,
            redetect_interval: 30,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum MeshInput {
    Region(FaceRoi),
    FullFrame,
}

/// MediaPipe face-mesh model run through ONNX Runtime. Reports at most one
/// face.
///
/// The mesh model expects a tight face crop. The region comes from the
/// previous frame's mesh while tracking holds, otherwise from the face
/// detector. Without a face detector the whole letterboxed frame is used,
/// which only works when the face fills most of it.
pub struct FaceMeshDetector {
    session: Session,
    cfg: FaceMeshConfig,
    face_detector: Option<FaceDetector>,
    tracker: RoiTracker,
}

impl FaceMeshDetector {
    pub fn new(model_path: &Path, cfg: FaceMeshConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(cfg.intra_threads)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load face mesh from {}", model_path.display()))?;

        // Without a detector there is nothing to re-anchor to.
        let tracker = RoiTracker::new(u32::MAX);
        Ok(Self {
            session,
            cfg,
            face_detector: None,
            tracker,
        })
    }

    pub fn with_face_detector(mut self, detector: FaceDetector) -> Self {
        self.face_detector = Some(detector);
        self.tracker = RoiTracker::new(self.cfg.redetect_interval);
        self
    }

    /// `None` when the face detector found nothing.
    fn mesh_input(&mut self, frame: &Frame) -> Option<MeshInput> {
        if let Some(roi) = self.tracker.next(frame.width, frame.height) {
            return Some(MeshInput::Region(roi));
        }
        let detector = match self.face_detector.as_mut() {
            Some(detector) => detector,
            None => return Some(MeshInput::FullFrame),
        };

        let detections = detector.detect(frame).unwrap_or_else(|err| {
            log::warn!("face detection failed: {err:?}");
            Vec::new()
        });
        let roi = pick_primary(&detections).map(FaceRoi::from_detection)?;
        roi.is_usable(frame.width, frame.height)
            .then_some(MeshInput::Region(roi))
    }

    fn run_mesh(
        &mut self,
        frame: &Frame,
        source: MeshInput,
    ) -> Result<Option<Vec<LandmarkPoint>>> {
        let (input, mapping) = match source {
            MeshInput::Region(roi) => {
                let (input, transform) =
                    common::prepare_roi_chw(frame, &roi, self.cfg.input_size)?;
                (input, InputMapping::Roi(transform))
            }
            MeshInput::FullFrame => {
                let (input, letterbox) = common::prepare_frame_chw(frame, self.cfg.input_size)?;
                (input, InputMapping::Letterbox(letterbox))
            }
        };

        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run face mesh session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("face mesh returned no outputs"));
        }

        // Second output, when the export has it, is a presence logit.
        let presence = if outputs.len() > 1 {
            outputs[1]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .map(common::sigmoid)
                .unwrap_or(1.0)
        } else {
            1.0
        };
        if presence < self.cfg.min_presence {
            log::trace!("face presence {presence:.2} below threshold");
            return Ok(None);
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let raw = common::decode_landmarks(&flattened, FACE_MESH_POINTS)?;
        Ok(Some(mapping.normalize(&raw)))
    }
}

impl LandmarkDetector for FaceMeshDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceLandmarks>> {
        let Some(source) = self.mesh_input(frame) else {
            return Ok(Vec::new());
        };

        let points = match self.run_mesh(frame, source) {
            Ok(Some(points)) => points,
            Ok(None) => {
                self.tracker.lose();
                return Ok(Vec::new());
            }
            Err(err) => {
                self.tracker.lose();
                return Err(err);
            }
        };
        self.tracker.update(&points, frame.width, frame.height);

        Ok(vec![FaceLandmarks {
            points,
            image_width: frame.width,
            image_height: frame.height,
        }])
    }

    fn label(&self) -> &'static str {
        "face-mesh ort"
    }
}
