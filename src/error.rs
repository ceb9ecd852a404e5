//! Error types for the cut-out pipeline.

use thiserror::Error;

/// Errors raised by the geometry, compositing and configuration layers.
///
/// Per-frame variants (`EmptyInput`, `InvalidRegion`, `DegeneratePolygon`,
/// `FrameMismatch`, `MissingLandmark`) never escape the frame loop; they are
/// turned into a "no cut-out this frame" update.
#[derive(Error, Debug)]
pub enum Error {
    /// No landmarks were available to build a crop region
    #[error("no landmarks available")]
    EmptyInput,

    /// Crop rectangle has a non-positive extent
    #[error("invalid crop region {width}x{height}")]
    InvalidRegion { width: f32, height: f32 },

    /// Clip polygon has fewer than three vertices
    #[error("degenerate polygon with {points} points")]
    DegeneratePolygon { points: usize },

    /// A landmark index is outside the detector's point list
    #[error("landmark {index} missing (detector returned {available} points)")]
    MissingLandmark { index: usize, available: usize },

    /// Detector reported a frame size that does not match the pixels it was given
    #[error("frame mismatch: landmarks for {expected_w}x{expected_h}, frame is {actual_w}x{actual_h}")]
    FrameMismatch {
        expected_w: u32,
        expected_h: u32,
        actual_w: u32,
        actual_h: u32,
    },

    /// RGBA buffer length does not match its dimensions
    #[error("pixel buffer size mismatch: got {got}, expected {expected}")]
    BufferSize { got: usize, expected: usize },

    /// Resampling failed inside the resizer
    #[error("resize failed: {0}")]
    Resize(String),

    /// Image decoding failed
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// File I/O failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed or is out of range
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
