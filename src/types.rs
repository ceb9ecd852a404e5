use std::{sync::Arc, time::Instant};

use image::RgbaImage;
use rayon::prelude::*;

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        if rgba.len() != expected {
            return Err(Error::BufferSize {
                got: rgba.len(),
                expected,
            });
        }
        Ok(Self {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        })
    }

    /// Flip the frame left-to-right, the way a selfie preview is shown.
    pub fn mirror_horizontally(&mut self) {
        let stride = self.width as usize * 4;
        if stride == 0 {
            return;
        }
        self.rgba.par_chunks_exact_mut(stride).for_each(|row| {
            let (mut left, mut right) = (0usize, row.len() / 4);
            while left + 1 < right {
                right -= 1;
                for c in 0..4 {
                    row.swap(left * 4 + c, right * 4 + c);
                }
                left += 1;
            }
        });
    }
}

/// Detector output point, normalized to `[0,1]` of the frame size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
}

impl LandmarkPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One face as reported by the detector.
#[derive(Clone, Debug)]
pub struct FaceLandmarks {
    pub points: Vec<LandmarkPoint>,
    pub image_width: u32,
    pub image_height: u32,
}

impl FaceLandmarks {
    /// Resolve an ordered index list into points, failing on the first index
    /// the detector did not provide.
    pub fn select(&self, indices: &[usize]) -> Result<Vec<LandmarkPoint>> {
        indices
            .iter()
            .map(|&index| {
                self.points
                    .get(index)
                    .copied()
                    .ok_or(Error::MissingLandmark {
                        index,
                        available: self.points.len(),
                    })
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionState {
    NoFace,
    FaceDetected,
}

impl DetectionState {
    pub fn label(&self) -> &'static str {
        match self {
            DetectionState::NoFace => "no face detected",
            DetectionState::FaceDetected => "face detected",
        }
    }
}

/// Fixed-size clipped face image. Cloning shares the pixels; the buffer is
/// never mutated after construction.
#[derive(Clone, Debug)]
pub struct CutoutImage {
    image: Arc<RgbaImage>,
}

impl CutoutImage {
    pub(crate) fn from_image(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.image.width() || y >= self.image.height() {
            return None;
        }
        Some(self.image.get_pixel(x, y).0)
    }

    pub fn alpha_at(&self, x: u32, y: u32) -> Option<u8> {
        self.pixel(x, y).map(|px| px[3])
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }
}

/// What the frame loop publishes to the renderer after each processed frame.
#[derive(Clone, Debug)]
pub struct FrameUpdate {
    pub frame: Frame,
    pub state: DetectionState,
    pub landmarks: Option<FaceLandmarks>,
    pub cutout: Option<CutoutImage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_wrong_buffer_length() {
        let err = Frame::new(vec![0; 10], 2, 2).unwrap_err();
        assert!(matches!(err, Error::BufferSize { got: 10, expected: 16 }));
    }

    #[test]
    fn mirror_swaps_columns() {
        let rgba = vec![
            1, 1, 1, 255, 2, 2, 2, 255, 3, 3, 3, 255, //
            4, 4, 4, 255, 5, 5, 5, 255, 6, 6, 6, 255,
        ];
        let mut frame = Frame::new(rgba, 3, 2).unwrap();
        frame.mirror_horizontally();
        let firsts: Vec<u8> = frame.rgba.chunks_exact(4).map(|px| px[0]).collect();
        assert_eq!(firsts, vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn select_reports_missing_index() {
        let face = FaceLandmarks {
            points: vec![LandmarkPoint::new(0.1, 0.2); 3],
            image_width: 10,
            image_height: 10,
        };
        assert_eq!(face.select(&[0, 2]).unwrap().len(), 2);
        let err = face.select(&[1, 7]).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingLandmark {
                index: 7,
                available: 3
            }
        ));
    }
}
