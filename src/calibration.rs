//! Green-marker scan used to seed the overlay placement from a backdrop.

use image::RgbaImage;
use rayon::prelude::*;

pub const MARKER_MIN_GREEN: u8 = 100;
pub const MARKER_DOMINANCE: f32 = 1.5;

/// Fraction of the marker size the cut-out should fill.
pub const FIT_MARGIN: f32 = 0.9;
pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 2.0;

pub fn is_marker_pixel(r: u8, g: u8, b: u8) -> bool {
    let gf = g as f32;
    g > MARKER_MIN_GREEN && gf > r as f32 * MARKER_DOMINANCE && gf > b as f32 * MARKER_DOMINANCE
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingExtent {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl BoundingExtent {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GreenAreaResult {
    /// Mean marker position as a percentage of the image size.
    pub centroid: (f32, f32),
    pub extent: BoundingExtent,
    pub pixel_count: u64,
}

impl GreenAreaResult {
    /// Scale at which a `reference_w x reference_h` cut-out fits inside the
    /// marker with a small margin, clamped to the slider range.
    pub fn fit_scale(&self, reference_w: u32, reference_h: u32) -> f32 {
        let width_scale = self.extent.width() as f32 / reference_w.max(1) as f32;
        let height_scale = self.extent.height() as f32 / reference_h.max(1) as f32;
        (width_scale.min(height_scale) * FIT_MARGIN).clamp(MIN_SCALE, MAX_SCALE)
    }
}

#[derive(Clone, Copy, Debug)]
struct Accumulator {
    count: u64,
    sum_x: u64,
    sum_y: u64,
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
}

impl Accumulator {
    const EMPTY: Accumulator = Accumulator {
        count: 0,
        sum_x: 0,
        sum_y: 0,
        min_x: u32::MAX,
        max_x: 0,
        min_y: u32::MAX,
        max_y: 0,
    };

    fn push(mut self, x: u32, y: u32) -> Self {
        self.count += 1;
        self.sum_x += x as u64;
        self.sum_y += y as u64;
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
        self
    }

    fn merge(self, other: Self) -> Self {
        Self {
            count: self.count + other.count,
            sum_x: self.sum_x + other.sum_x,
            sum_y: self.sum_y + other.sum_y,
            min_x: self.min_x.min(other.min_x),
            max_x: self.max_x.max(other.max_x),
            min_y: self.min_y.min(other.min_y),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// Classify every pixel of `image` and summarize the marker pixels.
/// Returns `None` when the image has no marker.
pub fn scan_for_marker(image: &RgbaImage) -> Option<GreenAreaResult> {
    let (width, height) = image.dimensions();
    let stride = width as usize * 4;
    if stride == 0 || height == 0 {
        return None;
    }

    let acc = image
        .as_raw()
        .par_chunks_exact(stride)
        .enumerate()
        .map(|(y, row)| {
            row.chunks_exact(4)
                .enumerate()
                .filter(|(_, px)| is_marker_pixel(px[0], px[1], px[2]))
                .fold(Accumulator::EMPTY, |acc, (x, _)| acc.push(x as u32, y as u32))
        })
        .reduce(|| Accumulator::EMPTY, Accumulator::merge);

    if acc.count == 0 {
        log::debug!("no calibration marker in {width}x{height} backdrop");
        return None;
    }

    let mean_x = acc.sum_x as f64 / acc.count as f64;
    let mean_y = acc.sum_y as f64 / acc.count as f64;
    let result = GreenAreaResult {
        centroid: (
            (mean_x / width as f64 * 100.0) as f32,
            (mean_y / height as f64 * 100.0) as f32,
        ),
        extent: BoundingExtent {
            min_x: acc.min_x,
            max_x: acc.max_x,
            min_y: acc.min_y,
            max_y: acc.max_y,
        },
        pixel_count: acc.count,
    };
    log::info!(
        "calibration marker: {} px centred at ({:.1}%, {:.1}%)",
        result.pixel_count,
        result.centroid.0,
        result.centroid.1
    );
    Some(result)
}
