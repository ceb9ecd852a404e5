//! YAML configuration for the cut-out application.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    calibration::{MAX_SCALE, MIN_SCALE},
    error::{Error, Result},
    geometry::Padding,
    model_download::{default_face_detector_model_path, default_face_mesh_model_path},
    pipeline::{
        compositor::{CutoutProfile, Enhancement},
        detector::{FaceDetectorConfig, FaceMeshConfig},
    },
    placement::PositionMode,
};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture device and detector throttle
    pub camera: CameraConfig,

    /// Face detector and face-mesh models
    pub model: ModelConfig,

    /// Cut-out geometry and grading
    pub cutout: CutoutConfig,

    /// Initial overlay placement
    pub placement: PlacementConfig,

    /// Window and backdrop
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Capture device index
    pub index: u32,

    /// Maximum frames per second handed to the detector
    pub detector_fps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the face-mesh ONNX model
    pub path: PathBuf,

    /// Where to fetch the model from when it is missing
    pub url: Option<String>,

    /// Square model input size in pixels
    pub input_size: u32,

    /// Face presence threshold (0.0-1.0)
    pub min_presence: f32,

    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,

    /// Path to the face detector ONNX model that frames the mesh input
    pub detector_path: PathBuf,

    /// Where to fetch the face detector from when it is missing
    pub detector_url: Option<String>,

    /// Face detector score threshold (0.0-1.0)
    pub detector_score: f32,

    /// Frames a tracked face is reused before detecting again
    pub redetect_interval: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoutProfileKind {
    FullFace,
    LowerFace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutoutConfig {
    pub profile: CutoutProfileKind,

    /// Output width override; the profile default when unset
    pub width: Option<u32>,

    /// Output height override; the profile default when unset
    pub height: Option<u32>,

    /// Bounding-box padding as fractions of the frame size
    pub padding: Padding,

    /// Brightness, contrast and saturation multipliers
    pub enhancement: Enhancement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub mode: PositionMode,

    /// Scale before any calibration (0.5-2.0)
    pub initial_scale: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub window_width: u32,
    pub window_height: u32,

    /// Redraw rate of the window
    pub target_fps: u32,

    /// Flip the camera image horizontally
    pub mirror: bool,

    /// Draw landmark outlines on the camera preview
    pub show_landmarks: bool,

    /// Backdrop image; a plain background is used when unset
    pub backdrop: Option<PathBuf>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            detector_fps: 30,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let mesh = FaceMeshConfig::default();
        let detector = FaceDetectorConfig::default();
        Self {
            path: default_face_mesh_model_path(),
            url: None,
            input_size: mesh.input_size,
            min_presence: mesh.min_presence,
            intra_threads: mesh.intra_threads,
            detector_path: default_face_detector_model_path(),
            detector_url: None,
            detector_score: detector.score_threshold,
            redetect_interval: mesh.redetect_interval,
        }
    }
}

impl Default for CutoutConfig {
    fn default() -> Self {
        Self {
            profile: CutoutProfileKind::FullFace,
            width: None,
            height: None,
            padding: Padding::FACE,
            enhancement: Enhancement::default(),
        }
    }
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            mode: PositionMode::Percent,
            initial_scale: 1.0,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window_width: 960,
            window_height: 720,
            target_fps: 30,
            mirror: true,
            show_landmarks: false,
            backdrop: None,
        }
    }
}

impl ModelConfig {
    pub fn face_mesh(&self) -> FaceMeshConfig {
        FaceMeshConfig {
            input_size: self.input_size,
            min_presence: self.min_presence,
            intra_threads: self.intra_threads,
            redetect_interval: self.redetect_interval,
        }
    }

    pub fn face_detector(&self) -> FaceDetectorConfig {
        FaceDetectorConfig {
            score_threshold: self.detector_score,
            intra_threads: self.intra_threads,
            ..FaceDetectorConfig::default()
        }
    }
}

impl CutoutConfig {
    /// Resolve the named profile and apply the size, padding overrides.
    pub fn profile(&self) -> CutoutProfile {
        let mut profile = match self.profile {
            CutoutProfileKind::FullFace => CutoutProfile::full_face(),
            CutoutProfileKind::LowerFace => CutoutProfile::lower_face(),
        };
        if let Some(width) = self.width {
            profile.width = width;
        }
        if let Some(height) = self.height {
            profile.height = height;
        }
        profile.padding = self.padding;
        profile
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let profile = self.cutout.profile();
        if profile.width == 0 || profile.height == 0 {
            return Err(Error::Config(format!(
                "cut-out size must be positive, got {}x{}",
                profile.width, profile.height
            )));
        }

        let pad = &self.cutout.padding;
        if [pad.left, pad.right, pad.top, pad.bottom]
            .iter()
            .any(|p| !p.is_finite() || *p < 0.0)
        {
            return Err(Error::Config("padding must be non-negative".to_string()));
        }

        let grade = &self.cutout.enhancement;
        if [grade.brightness, grade.contrast, grade.saturation]
            .iter()
            .any(|f| !f.is_finite() || *f < 0.0)
        {
            return Err(Error::Config(
                "enhancement factors must be non-negative".to_string(),
            ));
        }

        if !(MIN_SCALE..=MAX_SCALE).contains(&self.placement.initial_scale) {
            return Err(Error::Config(format!(
                "initial scale must be between {MIN_SCALE} and {MAX_SCALE}"
            )));
        }

        if self.camera.detector_fps == 0 || self.display.target_fps == 0 {
            return Err(Error::Config("fps must be greater than 0".to_string()));
        }

        if !(0.0..=1.0).contains(&self.model.min_presence) {
            return Err(Error::Config(
                "min_presence must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.model.detector_score) {
            return Err(Error::Config(
                "detector_score must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.model.input_size == 0 {
            return Err(Error::Config("model input size must be positive".to_string()));
        }

        if self.display.window_width == 0 || self.display.window_height == 0 {
            return Err(Error::Config("window size must be positive".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Face cut-out configuration

camera:
  index: 0
  detector_fps: 30

model:
  path: "models/face_mesh_192x192.onnx"
  # url: "https://example.invalid/face_mesh.onnx"
  input_size: 192
  min_presence: 0.5
  intra_threads: 2
  detector_path: "models/face_detection_short_range.onnx"
  # detector_url: "https://example.invalid/face_detection.onnx"
  detector_score: 0.5
  redetect_interval: 30

cutout:
  profile: full_face      # or lower_face
  # width: 180
  # height: 200
  padding:
    left: 0.08
    right: 0.08
    top: 0.10
    bottom: 0.05
  enhancement:
    brightness: 1.05
    contrast: 1.10
    saturation: 1.10

placement:
  mode: percent           # or pixel_offset
  initial_scale: 1.0

display:
  window_width: 960
  window_height: 720
  target_fps: 30
  mirror: true
  show_landmarks: false
  # backdrop: "backdrop.png"
"#;
