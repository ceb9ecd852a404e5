//! Landmark to pixel mapping and crop-region computation.

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    types::{FaceLandmarks, LandmarkPoint},
};

/// Padding around the landmark bounding box, as fractions of the frame size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Padding {
    /// Extra headroom on top for the hairline, a little less below the chin.
    pub const FACE: Padding = Padding {
        left: 0.08,
        right: 0.08,
        top: 0.10,
        bottom: 0.05,
    };

    pub fn new(horizontal: f32, top: f32, bottom: f32) -> Self {
        Self {
            left: horizontal,
            right: horizontal,
            top,
            bottom,
        }
    }
}

impl Default for Padding {
    fn default() -> Self {
        Padding::FACE
    }
}

/// Source-pixel rectangle selected for extraction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRegion {
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn validate(&self) -> Result<()> {
        if self.width > 0.0 && self.height > 0.0 {
            Ok(())
        } else {
            Err(Error::InvalidRegion {
                width: self.width,
                height: self.height,
            })
        }
    }
}

/// Map a normalized landmark into output-canvas pixels.
///
/// No rounding is applied; rasterizers decide how to snap.
pub fn transform(
    point: LandmarkPoint,
    frame_w: u32,
    frame_h: u32,
    crop: &CropRegion,
    out_w: u32,
    out_h: u32,
) -> Result<(f32, f32)> {
    crop.validate()?;
    let sx = point.x * frame_w as f32;
    let sy = point.y * frame_h as f32;
    Ok((
        (sx - crop.x) / crop.width * out_w as f32,
        (sy - crop.y) / crop.height * out_h as f32,
    ))
}

/// Bounding box of `points` expanded by `pad`, converted to pixels and
/// clamped to the frame.
pub fn compute_crop(
    points: &[LandmarkPoint],
    frame_w: u32,
    frame_h: u32,
    pad: &Padding,
) -> Result<CropRegion> {
    if points.is_empty() {
        return Err(Error::EmptyInput);
    }

    let (min_x, max_x, min_y, max_y) = points.iter().fold(
        (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
        |acc, p| (acc.0.min(p.x), acc.1.max(p.x), acc.2.min(p.y), acc.3.max(p.y)),
    );

    let (fw, fh) = (frame_w as f32, frame_h as f32);
    let left = ((min_x - pad.left) * fw).clamp(0.0, fw);
    let right = ((max_x + pad.right) * fw).clamp(0.0, fw);
    let top = ((min_y - pad.top) * fh).clamp(0.0, fh);
    let bottom = ((max_y + pad.bottom) * fh).clamp(0.0, fh);

    let region = CropRegion {
        x: left,
        y: top,
        width: span_within(left, right),
        height: span_within(top, bottom),
    };
    region.validate()?;
    Ok(region)
}

/// `end - start`, shrunk by an ulp where rounding would put `start + span`
/// past `end`.
fn span_within(start: f32, end: f32) -> f32 {
    let mut span = end - start;
    while span > 0.0 && start + span > end {
        span = f32::from_bits(span.to_bits() - 1);
    }
    span
}

/// Resolve `indices` on `face` and map each point into the output canvas.
pub fn project_polygon(
    face: &FaceLandmarks,
    indices: &[usize],
    crop: &CropRegion,
    out_w: u32,
    out_h: u32,
) -> Result<Vec<(f32, f32)>> {
    face.select(indices)?
        .into_iter()
        .map(|p| transform(p, face.image_width, face.image_height, crop, out_w, out_h))
        .collect()
}
