use image::RgbaImage;

use crate::{error::Result, overlay, scene, types::FrameUpdate};

pub(super) const BACKGROUND: [u8; 4] = [24, 24, 27, 255];
const PREVIEW_FRACTION: f32 = 0.25;
const PREVIEW_MARGIN: i64 = 12;

/// minifb wants `0x00RRGGBB`.
pub(super) fn pack_rgb(px: &[u8]) -> u32 {
    ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | px[2] as u32
}

pub(super) fn fill(dst: &mut [u32], color: [u8; 4]) {
    dst.fill(pack_rgb(&color));
}

/// Copy `src` into the window buffer with its top-left at (`left`, `top`),
/// dropping whatever falls outside. Alpha is ignored.
pub(super) fn blit(dst: &mut [u32], dst_w: usize, dst_h: usize, src: &RgbaImage, left: i64, top: i64) {
    let (src_w, src_h) = (src.width() as i64, src.height() as i64);
    let x0 = left.max(0);
    let x1 = (left + src_w).min(dst_w as i64);
    let y0 = top.max(0);
    let y1 = (top + src_h).min(dst_h as i64);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let raw = src.as_raw();
    for y in y0..y1 {
        let src_row = ((y - top) * src_w) as usize * 4;
        let dst_row = y as usize * dst_w;
        for x in x0..x1 {
            let s = src_row + (x - left) as usize * 4;
            dst[dst_row + x as usize] = pack_rgb(&raw[s..s + 4]);
        }
    }
}

/// Camera preview for the top-right corner, with landmark outlines when
/// the update carries a face.
pub(super) fn preview_inset(
    update: &FrameUpdate,
    window_w: u32,
    window_h: u32,
) -> Result<Option<(RgbaImage, i64, i64)>> {
    let frame = &update.frame;
    let Some(source) = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone()) else {
        return Ok(None);
    };
    let max_w = ((window_w as f32 * PREVIEW_FRACTION) as u32).max(1);
    let (w, h) = scene::fit_within(frame.width, frame.height, max_w, window_h.max(1));
    let mut inset = scene::resize_rgba(&source, w, h)?;

    if let Some(face) = &update.landmarks {
        if let Err(err) = overlay::draw_face_outlines(&mut inset, w, h, face) {
            log::debug!("outline skipped: {err}");
        }
    }

    let left = window_w as i64 - w as i64 - PREVIEW_MARGIN;
    Ok(Some((inset, left, PREVIEW_MARGIN)))
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    #[test]
    fn packs_rgb_and_drops_alpha() {
        assert_eq!(pack_rgb(&[0x12, 0x34, 0x56, 0x78]), 0x0012_3456);
    }

    #[test]
    fn blit_clips_to_window() {
        let mut dst = vec![0u32; 4 * 4];
        let src = RgbaImage::from_pixel(3, 3, Rgba([255, 0, 0, 255]));
        blit(&mut dst, 4, 4, &src, 2, -1);

        let red = 0x00FF_0000;
        assert_eq!(dst[2], red);
        assert_eq!(dst[3], red);
        assert_eq!(dst[4 + 3], red);
        assert_eq!(dst[2 * 4 + 2], 0);
        assert_eq!(dst[1], 0);
    }
}
