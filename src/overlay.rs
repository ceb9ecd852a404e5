//! Landmark outlines stroked onto a preview buffer.

use crate::{
    error::Result,
    geometry::{self, CropRegion},
    landmarks::Feature,
    types::FaceLandmarks,
};

pub const OUTLINE_THICKNESS: i32 = 2;

pub fn feature_color(feature: Feature) -> [u8; 4] {
    match feature {
        Feature::FaceContour | Feature::LowerFaceContour => [56, 189, 248, 255],
        Feature::LeftEye | Feature::RightEye => [16, 185, 129, 255],
        Feature::LeftEyebrow | Feature::RightEyebrow => [250, 204, 21, 255],
        Feature::Nose => [244, 114, 182, 255],
        Feature::Lips => [248, 113, 113, 255],
    }
}

/// Stroke the closed outline of `feature` onto an RGBA buffer that shows
/// the whole camera frame at `width`x`height`.
pub fn draw_feature_outline(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    face: &FaceLandmarks,
    feature: Feature,
    color: [u8; 4],
    thickness: i32,
) -> Result<()> {
    let crop = CropRegion::full_frame(face.image_width, face.image_height);
    let points = geometry::project_polygon(face, feature.indices(), &crop, width, height)?;

    for (i, a) in points.iter().enumerate() {
        let b = &points[(i + 1) % points.len()];
        draw_line(buffer, width, height, a, b, color, thickness);
    }
    Ok(())
}

/// Every outline feature in its own color. Stops at the first feature the
/// detector did not fully provide.
pub fn draw_face_outlines(buffer: &mut [u8], width: u32, height: u32, face: &FaceLandmarks) -> Result<()> {
    for feature in Feature::OUTLINE {
        draw_feature_outline(
            buffer,
            width,
            height,
            face,
            feature,
            feature_color(feature),
            OUTLINE_THICKNESS,
        )?;
    }
    Ok(())
}

fn draw_line(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    p0: &(f32, f32),
    p1: &(f32, f32),
    color: [u8; 4],
    thickness: i32,
) {
    let (mut x0, mut y0) = (p0.0 as i32, p0.1 as i32);
    let (x1, y1) = (p1.0 as i32, p1.1 as i32);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        stamp(buffer, width, height, (x0, y0), radius, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

// Diamond brush; radius 0 is a single pixel.
fn stamp(buffer: &mut [u8], width: u32, height: u32, center: (i32, i32), radius: i32, color: [u8; 4]) {
    let (cx, cy) = center;
    for oy in -radius..=radius {
        for ox in -radius..=radius {
            if ox.abs() + oy.abs() <= radius {
                put_pixel_safe(buffer, width, height, cx + ox, cy + oy, color);
            }
        }
    }
}

fn put_pixel_safe(buffer: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= width || uy >= height {
        return;
    }
    let idx = (uy as usize * width as usize + ux as usize) * 4;
    if let Some(px) = buffer.get_mut(idx..idx + 4) {
        px.copy_from_slice(&color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{landmarks::FACE_MESH_POINTS, types::LandmarkPoint};

    fn flat_face(x: f32, y: f32) -> FaceLandmarks {
        FaceLandmarks {
            points: vec![LandmarkPoint::new(x, y); FACE_MESH_POINTS],
            image_width: 640,
            image_height: 480,
        }
    }

    #[test]
    fn line_stays_inside_buffer() {
        let mut buf = vec![0u8; 10 * 10 * 4];
        draw_line(&mut buf, 10, 10, &(-5.0, 5.0), &(20.0, 5.0), [1, 2, 3, 4], 3);
        let row = &buf[5 * 40..6 * 40];
        assert!(row.chunks_exact(4).all(|px| px == [1, 2, 3, 4]));
    }

    #[test]
    fn outline_lands_at_scaled_position() {
        let mut buf = vec![0u8; 64 * 48 * 4];
        let face = flat_face(0.5, 0.5);
        draw_feature_outline(&mut buf, 64, 48, &face, Feature::Nose, [9, 9, 9, 255], 1).unwrap();
        let idx = (24 * 64 + 32) * 4;
        assert_eq!(&buf[idx..idx + 4], &[9, 9, 9, 255]);
        let painted = buf.chunks_exact(4).filter(|px| px[3] == 255).count();
        assert_eq!(painted, 1);
    }

    #[test]
    fn short_landmark_list_is_reported() {
        let mut buf = vec![0u8; 16 * 16 * 4];
        let mut face = flat_face(0.5, 0.5);
        face.points.truncate(3);
        assert!(draw_face_outlines(&mut buf, 16, 16, &face).is_err());
    }
}
