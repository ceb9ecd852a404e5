mod common;
mod face_detection;
mod face_mesh;
mod roi;

use crate::types::{FaceLandmarks, Frame};

pub use face_detection::{FaceDetection, FaceDetector, FaceDetectorConfig};
pub use face_mesh::{FaceMeshConfig, FaceMeshDetector};
pub use roi::{FaceRoi, RoiTracker};

/// External landmark detector. Returns every face found in `frame`, best
/// first; an empty list means no face.
pub trait LandmarkDetector: Send + 'static {
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<FaceLandmarks>>;

    fn label(&self) -> &'static str {
        "landmarks"
    }
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<FaceLandmarks>> {
        (**self).detect(frame)
    }

    fn label(&self) -> &'static str {
        (**self).label()
    }
}
