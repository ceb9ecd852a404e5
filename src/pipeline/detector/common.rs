use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use super::roi::FaceRoi;
use crate::types::{Frame, LandmarkPoint};

#[derive(Clone, Debug)]
pub struct LetterboxInfo {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

/// Maps model-input pixels of a [`FaceRoi`] crop back to the source frame.
#[derive(Clone, Debug)]
pub struct RoiTransform {
    pub roi: FaceRoi,
    pub output_size: u32,
    pub orig_w: u32,
    pub orig_h: u32,
}

impl RoiTransform {
    pub fn project(&self, x: f32, y: f32) -> (f32, f32) {
        let half = self.output_size as f32 / 2.0;
        let scale = self.roi.side / self.output_size as f32;
        let dx = (x - half) * scale;
        let dy = (y - half) * scale;
        let (sin, cos) = self.roi.angle.sin_cos();
        (
            self.roi.center.0 + dx * cos - dy * sin,
            self.roi.center.1 + dx * sin + dy * cos,
        )
    }
}

/// How a model input was cut from the frame.
#[derive(Clone, Debug)]
pub enum InputMapping {
    Letterbox(LetterboxInfo),
    Roi(RoiTransform),
}

impl InputMapping {
    pub fn normalize(&self, landmarks: &[[f32; 3]]) -> Vec<LandmarkPoint> {
        match self {
            InputMapping::Letterbox(letterbox) => normalize_landmarks(landmarks, letterbox),
            InputMapping::Roi(transform) => {
                let w = transform.orig_w.max(1) as f32;
                let h = transform.orig_h.max(1) as f32;
                landmarks
                    .iter()
                    .map(|[x, y, _z]| {
                        let (px, py) = transform.project(*x, *y);
                        LandmarkPoint::new(px / w, py / h)
                    })
                    .collect()
            }
        }
    }
}

fn check_frame_len(frame: &Frame) -> Result<()> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected_len {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgba.len(),
            expected_len
        ));
    }
    Ok(())
}

/// Letterbox `frame` into a `target_size` square and build a 1x3xHxW tensor
/// normalized to `[-1, 1]`.
pub fn prepare_frame_chw(frame: &Frame, target_size: u32) -> Result<(Array4<f32>, LetterboxInfo)> {
    check_frame_len(frame)?;

    let scale = target_size as f32 / (frame.width.max(frame.height) as f32);
    let new_w = ((frame.width as f32 * scale).round() as u32).clamp(1, target_size);
    let new_h = ((frame.height as f32 * scale).round() as u32).clamp(1, target_size);

    let src_image =
        fir::images::ImageRef::new(frame.width, frame.height, &frame.rgba, fir::PixelType::U8x4)?;
    let mut dst_image = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x4);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;
    let resized = dst_image.into_vec();

    let side = target_size as usize;
    let pad_x = (side - new_w as usize) / 2;
    let pad_y = (side - new_h as usize) / 2;
    let plane = side * side;

    // Padding is black, which is -1 after normalization.
    let mut data = vec![-1.0f32; plane * 3];
    let (r_plane, rest) = data.split_at_mut(plane);
    let (g_plane, b_plane) = rest.split_at_mut(plane);
    let src_stride = new_w as usize * 4;

    r_plane
        .par_chunks_exact_mut(side)
        .zip(g_plane.par_chunks_exact_mut(side))
        .zip(b_plane.par_chunks_exact_mut(side))
        .enumerate()
        .for_each(|(row, ((r, g), b))| {
            if row < pad_y || row >= pad_y + new_h as usize {
                return;
            }
            let src_row = &resized[(row - pad_y) * src_stride..(row - pad_y + 1) * src_stride];
            for (col, px) in src_row.chunks_exact(4).enumerate() {
                let x = pad_x + col;
                r[x] = px[0] as f32 / 127.5 - 1.0;
                g[x] = px[1] as f32 / 127.5 - 1.0;
                b[x] = px[2] as f32 / 127.5 - 1.0;
            }
        });

    let input = Array4::<f32>::from_shape_vec((1, 3, side, side), data)
        .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;

    let letterbox = LetterboxInfo {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    Ok((input, letterbox))
}

/// Sample the rotated square `roi` into an `output_size` square, 1x3xHxW in
/// `[-1, 1]`. Samples outside the frame are black.
pub fn prepare_roi_chw(
    frame: &Frame,
    roi: &FaceRoi,
    output_size: u32,
) -> Result<(Array4<f32>, RoiTransform)> {
    check_frame_len(frame)?;

    let side = output_size as usize;
    let half = output_size as f32 / 2.0;
    let scale = roi.side / output_size as f32;
    let (sin, cos) = roi.angle.sin_cos();
    let plane = side * side;

    let mut data = vec![-1.0f32; plane * 3];
    let (r_plane, rest) = data.split_at_mut(plane);
    let (g_plane, b_plane) = rest.split_at_mut(plane);

    r_plane
        .par_chunks_exact_mut(side)
        .zip(g_plane.par_chunks_exact_mut(side))
        .zip(b_plane.par_chunks_exact_mut(side))
        .enumerate()
        .for_each(|(row, ((r, g), b))| {
            let dy = (row as f32 + 0.5 - half) * scale;
            for col in 0..side {
                let dx = (col as f32 + 0.5 - half) * scale;
                let src_x = roi.center.0 + dx * cos - dy * sin;
                let src_y = roi.center.1 + dx * sin + dy * cos;
                let [cr, cg, cb] = sample_rgb(frame, src_x, src_y);
                r[col] = cr / 127.5 - 1.0;
                g[col] = cg / 127.5 - 1.0;
                b[col] = cb / 127.5 - 1.0;
            }
        });

    let input = Array4::<f32>::from_shape_vec((1, 3, side, side), data)
        .map_err(|err| anyhow!("failed to build roi tensor: {err}"))?;

    let transform = RoiTransform {
        roi: *roi,
        output_size,
        orig_w: frame.width,
        orig_h: frame.height,
    };
    Ok((input, transform))
}

/// Bilinear RGB sample in `[0, 255]`.
fn sample_rgb(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if x.is_nan() || y.is_nan() {
        return [0.0; 3];
    }
    // Pixel centres sit at +0.5.
    let x = x - 0.5;
    let y = y - 0.5;
    let x0 = x.floor();
    let y0 = y.floor();

    let (w, h) = (frame.width as i64, frame.height as i64);
    let fetch = |cx: f32, cy: f32| -> [f32; 3] {
        let (ix, iy) = (cx as i64, cy as i64);
        if ix < 0 || iy < 0 || ix >= w || iy >= h {
            return [0.0; 3];
        }
        let idx = (iy as usize * frame.width as usize + ix as usize) * 4;
        match frame.rgba.get(idx..idx + 3) {
            Some(px) => [px[0] as f32, px[1] as f32, px[2] as f32],
            None => [0.0; 3],
        }
    };

    let fx = x - x0;
    let fy = y - y0;
    let c00 = fetch(x0, y0);
    let c10 = fetch(x0 + 1.0, y0);
    let c01 = fetch(x0, y0 + 1.0);
    let c11 = fetch(x0 + 1.0, y0 + 1.0);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    std::array::from_fn(|c| lerp(lerp(c00[c], c10[c], fx), lerp(c01[c], c11[c], fx), fy))
}

pub fn decode_landmarks(flat: &[f32], count: usize) -> Result<Vec<[f32; 3]>> {
    if flat.len() < count * 3 {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            count * 3
        ));
    }

    Ok(flat
        .chunks_exact(3)
        .take(count)
        .map(|chunk| [chunk[0], chunk[1], chunk[2]])
        .collect())
}

/// Undo the letterbox and normalize by the original frame size. Points are
/// not clamped; the crop calculator clamps later.
pub fn normalize_landmarks(landmarks: &[[f32; 3]], letterbox: &LetterboxInfo) -> Vec<LandmarkPoint> {
    let (w, h) = (letterbox.orig_w.max(1) as f32, letterbox.orig_h.max(1) as f32);
    landmarks
        .iter()
        .map(|[x, y, _z]| {
            let px = (x - letterbox.pad_x) / letterbox.scale;
            let py = (y - letterbox.pad_y) / letterbox.scale;
            LandmarkPoint::new(px / w, py / h)
        })
        .collect()
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_pads_short_side() {
        let frame = Frame::new(vec![255; 40 * 20 * 4], 40, 20).unwrap();
        let (input, letterbox) = prepare_frame_chw(&frame, 8).unwrap();
        assert_eq!(input.shape(), &[1, 3, 8, 8]);
        assert_eq!(letterbox.pad_x, 0.0);
        assert_eq!(letterbox.pad_y, 2.0);
        assert!((input[[0, 0, 0, 0]] + 1.0).abs() < 1e-6);
        assert!((input[[0, 1, 4, 4]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_inverts_letterbox() {
        let letterbox = LetterboxInfo {
            scale: 0.5,
            pad_x: 0.0,
            pad_y: 40.0,
            orig_w: 384,
            orig_h: 224,
        };
        let points = normalize_landmarks(&[[96.0, 96.0, 0.0]], &letterbox);
        assert!((points[0].x - 0.5).abs() < 1e-6);
        assert!((points[0].y - 112.0 / 224.0).abs() < 1e-6);
    }

    fn split_frame() -> Frame {
        // Left half white, right half black.
        let rgba = (0..64 * 64)
            .flat_map(|i| if i % 64 < 32 { [255u8; 4] } else { [0, 0, 0, 255] })
            .collect();
        Frame::new(rgba, 64, 64).unwrap()
    }

    #[test]
    fn roi_crop_samples_the_region() {
        let roi = FaceRoi {
            center: (32.0, 32.0),
            side: 32.0,
            angle: 0.0,
        };
        let (input, transform) = prepare_roi_chw(&split_frame(), &roi, 8).unwrap();
        assert_eq!(input.shape(), &[1, 3, 8, 8]);
        assert!((input[[0, 0, 4, 1]] - 1.0).abs() < 1e-5);
        assert!((input[[0, 0, 4, 6]] + 1.0).abs() < 1e-5);

        let (x, y) = transform.project(4.0, 4.0);
        assert!((x - 32.0).abs() < 1e-5 && (y - 32.0).abs() < 1e-5);
        let (x, _) = transform.project(0.0, 4.0);
        assert!((x - 16.0).abs() < 1e-5);
    }

    #[test]
    fn rotated_roi_flips_sampling_and_projection() {
        let roi = FaceRoi {
            center: (32.0, 32.0),
            side: 32.0,
            angle: std::f32::consts::PI,
        };
        let (input, transform) = prepare_roi_chw(&split_frame(), &roi, 8).unwrap();
        assert!((input[[0, 0, 4, 1]] + 1.0).abs() < 1e-5);
        assert!((input[[0, 0, 4, 6]] - 1.0).abs() < 1e-5);

        let (x, y) = transform.project(0.0, 4.0);
        assert!((x - 48.0).abs() < 1e-4 && (y - 32.0).abs() < 1e-4);
    }

    #[test]
    fn roi_mapping_normalizes_by_frame_size() {
        let mapping = InputMapping::Roi(RoiTransform {
            roi: FaceRoi {
                center: (100.0, 50.0),
                side: 40.0,
                angle: 0.0,
            },
            output_size: 4,
            orig_w: 200,
            orig_h: 100,
        });
        let points = mapping.normalize(&[[2.0, 2.0, 0.0], [4.0, 0.0, 0.0]]);
        assert_eq!(points[0], LandmarkPoint::new(0.5, 0.5));
        assert_eq!(points[1], LandmarkPoint::new(0.6, 0.3));
    }

    #[test]
    fn decode_rejects_short_output() {
        assert!(decode_landmarks(&[0.0; 5], 2).is_err());
        assert_eq!(decode_landmarks(&[0.0; 9], 2).unwrap().len(), 2);
    }
}
