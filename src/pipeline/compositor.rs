use std::cmp::Ordering;

use fast_image_resize as fir;
use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    geometry::{self, CropRegion, Padding},
    landmarks::{Feature, combined_indices},
    types::{CutoutImage, FaceLandmarks, Frame},
};

/// Default cut-out size for the full-face profile.
pub const FACE_CUTOUT_WIDTH: u32 = 180;
pub const FACE_CUTOUT_HEIGHT: u32 = 200;

/// Default cut-out size for the lips/nose profile.
pub const LOWER_FACE_CUTOUT_WIDTH: u32 = 200;
pub const LOWER_FACE_CUTOUT_HEIGHT: u32 = 150;

/// Color grading applied to every cut-out, matching CSS
/// `brightness() contrast() saturate()` applied in that order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Enhancement {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
}

impl Default for Enhancement {
    fn default() -> Self {
        Self {
            brightness: 1.05,
            contrast: 1.10,
            saturation: 1.10,
        }
    }
}

impl Enhancement {
    pub const IDENTITY: Enhancement = Enhancement {
        brightness: 1.0,
        contrast: 1.0,
        saturation: 1.0,
    };

    pub fn apply(&self, px: &mut [u8]) {
        let mut rgb = [
            px[0] as f32 / 255.0,
            px[1] as f32 / 255.0,
            px[2] as f32 / 255.0,
        ];

        for c in rgb.iter_mut() {
            *c = (*c * self.brightness).clamp(0.0, 1.0);
        }
        for c in rgb.iter_mut() {
            *c = ((*c - 0.5) * self.contrast + 0.5).clamp(0.0, 1.0);
        }

        let s = self.saturation;
        let [r, g, b] = rgb;
        rgb = [
            (0.213 + 0.787 * s) * r + (0.715 - 0.715 * s) * g + (0.072 - 0.072 * s) * b,
            (0.213 - 0.213 * s) * r + (0.715 + 0.285 * s) * g + (0.072 - 0.072 * s) * b,
            (0.213 - 0.213 * s) * r + (0.715 - 0.715 * s) * g + (0.072 + 0.928 * s) * b,
        ];

        for (dst, c) in px.iter_mut().zip(rgb) {
            *dst = (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    }
}

/// Which landmarks frame the crop, which outline clips it, and how big the
/// result is.
#[derive(Clone, Debug, PartialEq)]
pub struct CutoutProfile {
    pub crop_features: Vec<Feature>,
    pub clip_feature: Feature,
    pub padding: Padding,
    pub width: u32,
    pub height: u32,
}

impl CutoutProfile {
    pub fn full_face() -> Self {
        Self {
            crop_features: Feature::OUTLINE.to_vec(),
            clip_feature: Feature::FaceContour,
            padding: Padding::FACE,
            width: FACE_CUTOUT_WIDTH,
            height: FACE_CUTOUT_HEIGHT,
        }
    }

    /// Mouth, nose and jaw framing. Still clipped to the face outline so the
    /// background around the cheeks is dropped.
    pub fn lower_face() -> Self {
        Self {
            crop_features: vec![Feature::Lips, Feature::Nose, Feature::LowerFaceContour],
            clip_feature: Feature::FaceContour,
            padding: Padding::FACE,
            width: LOWER_FACE_CUTOUT_WIDTH,
            height: LOWER_FACE_CUTOUT_HEIGHT,
        }
    }
}

impl Default for CutoutProfile {
    fn default() -> Self {
        CutoutProfile::full_face()
    }
}

pub struct Compositor {
    profile: CutoutProfile,
    enhancement: Enhancement,
    resizer: fir::Resizer,
    crop_indices: Vec<usize>,
}

impl Compositor {
    pub fn new(profile: CutoutProfile, enhancement: Enhancement) -> Self {
        let crop_indices = combined_indices(&profile.crop_features);
        Self {
            profile,
            enhancement,
            resizer: fir::Resizer::new(),
            crop_indices,
        }
    }

    pub fn profile(&self) -> &CutoutProfile {
        &self.profile
    }

    /// Full per-face pass: crop from the profile's landmark set, project the
    /// clip outline, then composite.
    pub fn cutout_for_face(&mut self, frame: &Frame, face: &FaceLandmarks) -> Result<CutoutImage> {
        if face.image_width != frame.width || face.image_height != frame.height {
            return Err(Error::FrameMismatch {
                expected_w: face.image_width,
                expected_h: face.image_height,
                actual_w: frame.width,
                actual_h: frame.height,
            });
        }

        let crop_points = face.select(&self.crop_indices)?;
        let crop = geometry::compute_crop(
            &crop_points,
            face.image_width,
            face.image_height,
            &self.profile.padding,
        )?;
        let polygon = geometry::project_polygon(
            face,
            self.profile.clip_feature.indices(),
            &crop,
            self.profile.width,
            self.profile.height,
        )?;

        self.composite(frame, &crop, &polygon)
    }

    /// Resample `crop` of `source` to the profile size (stretching freely),
    /// grade it, and zero everything outside `polygon`.
    pub fn composite(
        &mut self,
        source: &Frame,
        crop: &CropRegion,
        polygon: &[(f32, f32)],
    ) -> Result<CutoutImage> {
        if polygon.len() < 3 {
            return Err(Error::DegeneratePolygon {
                points: polygon.len(),
            });
        }
        crop.validate()?;

        let (out_w, out_h) = (self.profile.width, self.profile.height);
        let mut rgba = self.resample(source, crop, out_w, out_h)?;

        let enhancement = self.enhancement;
        rgba.par_chunks_exact_mut(4)
            .for_each(|px| enhancement.apply(px));

        clip_to_polygon(&mut rgba, out_w, out_h, polygon);

        let image = RgbaImage::from_raw(out_w, out_h, rgba).ok_or(Error::BufferSize {
            got: 0,
            expected: out_w as usize * out_h as usize * 4,
        })?;
        Ok(CutoutImage::from_image(image))
    }

    fn resample(
        &mut self,
        source: &Frame,
        crop: &CropRegion,
        out_w: u32,
        out_h: u32,
    ) -> Result<Vec<u8>> {
        let expected_len = (source.width as usize)
            .saturating_mul(source.height as usize)
            .saturating_mul(4);
        if source.rgba.len() != expected_len {
            return Err(Error::BufferSize {
                got: source.rgba.len(),
                expected: expected_len,
            });
        }

        let src_image = fir::images::ImageRef::new(
            source.width,
            source.height,
            &source.rgba,
            fir::PixelType::U8x4,
        )
        .map_err(|err| Error::Resize(err.to_string()))?;
        let mut dst_image = fir::images::Image::new(out_w, out_h, fir::PixelType::U8x4);
        let (x, y, width, height) = crop_box_within(crop, source.width, source.height);
        let options = fir::ResizeOptions::new()
            .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear))
            .crop(x, y, width, height);
        self.resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|err| Error::Resize(err.to_string()))?;
        Ok(dst_image.into_vec())
    }
}

/// Crop box in `f64` for the resizer. An edge clamped to the frame in `f32`
/// can land one ulp past it once `x + width` is summed, so the size is
/// capped at what is left of the frame.
fn crop_box_within(crop: &CropRegion, frame_w: u32, frame_h: u32) -> (f64, f64, f64, f64) {
    let x = crop.x as f64;
    let y = crop.y as f64;
    let width = (crop.width as f64).min(frame_w as f64 - x);
    let height = (crop.height as f64).min(frame_h as f64 - y);
    (x, y, width, height)
}

/// Rasterize `polygon` (non-zero winding, pixel-center sampling) and clear
/// every pixel outside it to transparent black. The path is closed
/// implicitly from the last vertex back to the first.
pub fn clip_to_polygon(rgba: &mut [u8], width: u32, height: u32, polygon: &[(f32, f32)]) {
    let stride = width as usize * 4;
    if stride == 0 {
        return;
    }

    rgba.par_chunks_exact_mut(stride)
        .take(height as usize)
        .enumerate()
        .for_each(|(row, pixels)| {
            let spans = row_spans(polygon, row as f32 + 0.5);
            let mut inside = vec![false; width as usize];
            for (start, end) in spans {
                let first = (start - 0.5).ceil().clamp(0.0, width as f32) as usize;
                let last = (end - 0.5).ceil().clamp(0.0, width as f32) as usize;
                for flag in inside.iter_mut().take(last).skip(first) {
                    *flag = true;
                }
            }
            for (px, keep) in pixels.chunks_exact_mut(4).zip(inside) {
                if !keep {
                    px.copy_from_slice(&[0, 0, 0, 0]);
                }
            }
        });
}

/// Horizontal intervals of scanline `y` with non-zero winding.
fn row_spans(polygon: &[(f32, f32)], y: f32) -> Vec<(f32, f32)> {
    let n = polygon.len();
    let mut crossings: Vec<(f32, i32)> = Vec::new();
    for i in 0..n {
        let (x0, y0) = polygon[i];
        let (x1, y1) = polygon[(i + 1) % n];
        let dir = if y0 <= y && y1 > y {
            1
        } else if y1 <= y && y0 > y {
            -1
        } else {
            continue;
        };
        let t = (y - y0) / (y1 - y0);
        crossings.push((x0 + t * (x1 - x0), dir));
    }
    crossings.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut spans = Vec::new();
    let mut winding = 0;
    let mut span_start = 0.0;
    for (x, dir) in crossings {
        let was_inside = winding != 0;
        winding += dir;
        let is_inside = winding != 0;
        if !was_inside && is_inside {
            span_start = x;
        } else if was_inside && !is_inside {
            spans.push((span_start, x));
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, color: [u8; 4]) -> Frame {
        let rgba = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Frame::new(rgba, width, height).unwrap()
    }

    fn square_profile(size: u32) -> CutoutProfile {
        CutoutProfile {
            width: size,
            height: size,
            ..CutoutProfile::full_face()
        }
    }

    #[test]
    fn crop_clamped_to_right_edge_still_resamples() {
        let crop = CropRegion {
            x: 140.8,
            y: 96.00001,
            width: 499.2,
            height: 216.00003,
        };
        assert!(crop.x as f64 + crop.width as f64 > 640.0);

        let (x, _, width, _) = crop_box_within(&crop, 640, 480);
        assert!(x + width <= 640.0);

        let frame = solid_frame(640, 480, [90, 90, 90, 255]);
        let mut compositor = Compositor::new(square_profile(32), Enhancement::IDENTITY);
        let square = [(0.0, 0.0), (32.0, 0.0), (32.0, 32.0), (0.0, 32.0)];
        let cutout = compositor.composite(&frame, &crop, &square).unwrap();
        assert_eq!(cutout.alpha_at(16, 16), Some(255));
    }

    #[test]
    fn identity_enhancement_keeps_color() {
        let mut px = [12u8, 200, 77, 255];
        Enhancement::IDENTITY.apply(&mut px);
        assert_eq!(px, [12, 200, 77, 255]);
    }

    #[test]
    fn default_enhancement_brightens_gray() {
        let mut px = [128u8, 128, 128, 255];
        Enhancement::default().apply(&mut px);
        for c in &px[..3] {
            assert!((*c as i32 - 135).abs() <= 1, "got {c}");
        }
        assert_eq!(px[3], 255);
    }

    #[test]
    fn saturation_pushes_channels_apart() {
        let mut px = [150u8, 100, 100, 255];
        let boost = Enhancement {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.5,
        };
        boost.apply(&mut px);
        assert!(px[0] > 150);
        assert!(px[1] < 100);
    }

    #[test]
    fn triangle_clips_outside() {
        let mut rgba = vec![255u8; 10 * 10 * 4];
        clip_to_polygon(&mut rgba, 10, 10, &[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]);
        let alpha = |x: usize, y: usize| rgba[(y * 10 + x) * 4 + 3];
        assert_eq!(alpha(1, 1), 255);
        assert_eq!(alpha(8, 8), 0);
        assert_eq!(alpha(8, 0), 255);
        assert_eq!(alpha(9, 9), 0);
    }

    #[test]
    fn winding_direction_does_not_matter() {
        let mut cw = vec![255u8; 8 * 8 * 4];
        let mut ccw = cw.clone();
        let square = [(2.0, 2.0), (6.0, 2.0), (6.0, 6.0), (2.0, 6.0)];
        let reversed: Vec<_> = square.iter().rev().copied().collect();
        clip_to_polygon(&mut cw, 8, 8, &square);
        clip_to_polygon(&mut ccw, 8, 8, &reversed);
        assert_eq!(cw, ccw);
        let opaque = cw.chunks_exact(4).filter(|px| px[3] == 255).count();
        assert_eq!(opaque, 16);
    }

    #[test]
    fn composite_rejects_degenerate_polygon() {
        let frame = solid_frame(20, 20, [10, 20, 30, 255]);
        let mut compositor = Compositor::new(square_profile(8), Enhancement::IDENTITY);
        let crop = CropRegion::full_frame(20, 20);
        let err = compositor
            .composite(&frame, &crop, &[(0.0, 0.0), (4.0, 4.0)])
            .unwrap_err();
        assert!(matches!(err, Error::DegeneratePolygon { points: 2 }));
    }

    #[test]
    fn composite_produces_profile_sized_cutout() {
        let frame = solid_frame(64, 48, [90, 120, 150, 255]);
        let mut compositor = Compositor::new(square_profile(16), Enhancement::IDENTITY);
        let crop = CropRegion {
            x: 8.0,
            y: 8.0,
            width: 32.0,
            height: 24.0,
        };
        let polygon = [(4.0, 4.0), (12.0, 4.0), (12.0, 12.0), (4.0, 12.0)];
        let cutout = compositor.composite(&frame, &crop, &polygon).unwrap();
        assert_eq!((cutout.width(), cutout.height()), (16, 16));
        let center = cutout.pixel(8, 8).unwrap();
        for (got, want) in center.iter().zip([90u8, 120, 150, 255]) {
            assert!((*got as i32 - want as i32).abs() <= 1);
        }
        assert_eq!(cutout.alpha_at(0, 0), Some(0));
        assert_eq!(cutout.alpha_at(15, 15), Some(0));
    }
}
