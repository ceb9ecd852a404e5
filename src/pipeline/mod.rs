#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod compositor;
pub mod detector;
pub mod frame_loop;
pub mod rgba_converter;

// Re-exports for convenience
#[cfg(feature = "camera-nokhwa")]
pub use camera::{CameraDevice, CameraStream, CaptureOptions, available_cameras, start_camera_stream};
pub use compositor::{Compositor, CutoutProfile, Enhancement};
pub use detector::{
    FaceDetector, FaceDetectorConfig, FaceMeshConfig, FaceMeshDetector, LandmarkDetector,
};
pub use frame_loop::{
    CancellationToken, FrameLoop, FrameLoopHandle, FrameProcessor, TickOutcome, start_frame_loop,
};
