//! Backdrop plus cut-out at the current placement, composed in memory.

use std::path::Path;

use fast_image_resize as fir;
use image::RgbaImage;
use rayon::prelude::*;

use crate::{
    error::{Error, Result},
    placement::{PlacementState, PositionMode},
    types::CutoutImage,
};

/// Where the scaled cut-out lands on the backdrop, in backdrop pixels.
/// May extend past any edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub fn load_backdrop(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path)?.to_rgba8();
    log::info!(
        "loaded backdrop {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Largest size with the aspect ratio of `width`x`height` that fits in the
/// bounds. Never returns a zero dimension.
pub fn fit_within(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (max_w.max(1), max_h.max(1));
    }
    let scale = (max_w as f32 / width as f32).min(max_h as f32 / height as f32);
    (
        ((width as f32 * scale).round() as u32).max(1),
        ((height as f32 * scale).round() as u32).max(1),
    )
}

pub fn resize_rgba(image: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage> {
    if image.dimensions() == (width, height) {
        return Ok(image.clone());
    }
    let src = fir::images::Image::from_vec_u8(
        image.width(),
        image.height(),
        image.as_raw().clone(),
        fir::PixelType::U8x4,
    )
    .map_err(|err| Error::Resize(err.to_string()))?;
    let mut dst = fir::images::Image::new(width, height, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    fir::Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .map_err(|err| Error::Resize(err.to_string()))?;

    RgbaImage::from_raw(width, height, dst.into_vec()).ok_or(Error::BufferSize {
        got: 0,
        expected: width as usize * height as usize * 4,
    })
}

pub fn cutout_rect(
    cutout_w: u32,
    cutout_h: u32,
    placement: &PlacementState,
    mode: PositionMode,
    backdrop_w: u32,
    backdrop_h: u32,
) -> PlacedRect {
    let width = cutout_w as f32 * placement.scale;
    let height = cutout_h as f32 * placement.scale;
    let (cx, cy) = match mode {
        PositionMode::Percent => (
            placement.position.x / 100.0 * backdrop_w as f32,
            placement.position.y / 100.0 * backdrop_h as f32,
        ),
        PositionMode::PixelOffset => (
            backdrop_w as f32 / 2.0 + placement.position.x,
            backdrop_h as f32 / 2.0 + placement.position.y,
        ),
    };
    PlacedRect {
        x: cx - width / 2.0,
        y: cy - height / 2.0,
        width,
        height,
    }
}

/// Draw `cutout` over a copy of `backdrop` (source-over). A non-positive
/// scale draws nothing.
pub fn compose(
    backdrop: &RgbaImage,
    cutout: &CutoutImage,
    placement: &PlacementState,
    mode: PositionMode,
) -> Result<RgbaImage> {
    let mut canvas = backdrop.clone();
    let rect = cutout_rect(
        cutout.width(),
        cutout.height(),
        placement,
        mode,
        backdrop.width(),
        backdrop.height(),
    );
    let (draw_w, draw_h) = (rect.width.round(), rect.height.round());
    if !(draw_w >= 1.0 && draw_h >= 1.0) {
        return Ok(canvas);
    }

    let scaled = resize_rgba(cutout.as_image(), draw_w as u32, draw_h as u32)?;
    blend_onto(&mut canvas, &scaled, rect.x.round() as i64, rect.y.round() as i64);
    Ok(canvas)
}

fn blend_onto(canvas: &mut RgbaImage, src: &RgbaImage, left: i64, top: i64) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    let (sw, sh) = (src.width() as i64, src.height() as i64);
    let x0 = left.max(0);
    let x1 = (left + sw).min(cw);
    if x0 >= x1 {
        return;
    }
    let stride = cw as usize * 4;
    let src_stride = sw as usize * 4;
    let src_raw = src.as_raw();

    canvas
        .par_chunks_exact_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let sy = y as i64 - top;
            if y as i64 >= ch || sy < 0 || sy >= sh {
                return;
            }
            let src_row = &src_raw[sy as usize * src_stride..(sy as usize + 1) * src_stride];
            for x in x0..x1 {
                let sx = (x - left) as usize;
                let s = &src_row[sx * 4..sx * 4 + 4];
                let d = &mut row[x as usize * 4..x as usize * 4 + 4];
                source_over(d, s);
            }
        });
}

fn source_over(dst: &mut [u8], src: &[u8]) {
    let sa = src[3] as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let s = src[c] as f32 * sa;
        let d = dst[c] as f32 * da * (1.0 - sa);
        dst[c] = ((s + d) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round() as u8;
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;
    use crate::placement::Position;

    fn solid_cutout(w: u32, h: u32, color: [u8; 4]) -> CutoutImage {
        CutoutImage::from_image(RgbaImage::from_pixel(w, h, Rgba(color)))
    }

    fn placed(x: f32, y: f32, scale: f32, mode: PositionMode) -> PlacementState {
        let mut state = PlacementState::initial(mode);
        state.position = Position::new(x, y);
        state.scale = scale;
        state
    }

    #[test]
    fn fit_keeps_aspect_ratio() {
        assert_eq!(fit_within(1920, 1080, 960, 960), (960, 540));
        assert_eq!(fit_within(100, 400, 800, 200), (50, 200));
    }

    #[test]
    fn percent_mode_centres_on_position() {
        let state = placed(25.0, 50.0, 0.5, PositionMode::Percent);
        let rect = cutout_rect(180, 200, &state, PositionMode::Percent, 400, 300);
        assert_eq!(
            rect,
            PlacedRect { x: 55.0, y: 100.0, width: 90.0, height: 100.0 }
        );
    }

    #[test]
    fn pixel_mode_offsets_from_centre() {
        let state = placed(-20.0, 5.0, 1.0, PositionMode::PixelOffset);
        let rect = cutout_rect(10, 10, &state, PositionMode::PixelOffset, 100, 100);
        assert_eq!(
            rect,
            PlacedRect { x: 25.0, y: 50.0, width: 10.0, height: 10.0 }
        );
    }

    #[test]
    fn compose_blends_inside_rect_only() {
        let backdrop = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 255, 255]));
        let cutout = solid_cutout(10, 10, [255, 0, 0, 255]);
        let state = placed(50.0, 50.0, 1.0, PositionMode::Percent);
        let out = compose(&backdrop, &cutout, &state, PositionMode::Percent).unwrap();
        assert_eq!(out.get_pixel(50, 50).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(45, 45).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(44, 50).0, [0, 0, 255, 255]);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn transparent_cutout_leaves_backdrop() {
        let backdrop = RgbaImage::from_pixel(20, 20, Rgba([10, 20, 30, 255]));
        let cutout = solid_cutout(8, 8, [255, 255, 255, 0]);
        let state = placed(50.0, 50.0, 1.0, PositionMode::Percent);
        let out = compose(&backdrop, &cutout, &state, PositionMode::Percent).unwrap();
        assert_eq!(out, backdrop);
    }

    #[test]
    fn off_canvas_and_zero_scale_are_noops() {
        let backdrop = RgbaImage::from_pixel(20, 20, Rgba([10, 20, 30, 255]));
        let cutout = solid_cutout(8, 8, [255, 0, 0, 255]);
        let far_state = placed(500.0, 500.0, 1.0, PositionMode::PixelOffset);
        let far = compose(&backdrop, &cutout, &far_state, PositionMode::PixelOffset).unwrap();
        assert_eq!(far, backdrop);
        let zero_state = placed(50.0, 50.0, 0.0, PositionMode::Percent);
        let zero = compose(&backdrop, &cutout, &zero_state, PositionMode::Percent).unwrap();
        assert_eq!(zero, backdrop);
    }

    #[test]
    fn half_alpha_mixes_colors() {
        let mut dst = [0u8, 0, 200, 255];
        source_over(&mut dst, &[200, 0, 0, 128]);
        assert!((dst[0] as i32 - 100).abs() <= 1);
        assert!((dst[2] as i32 - 100).abs() <= 1);
        assert_eq!(dst[3], 255);
    }
}
