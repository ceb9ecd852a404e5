//! Green marker scan scenarios

use face_cutout::calibration::{MAX_SCALE, MIN_SCALE, scan_for_marker};
use image::{Rgba, RgbaImage};

fn backdrop_with_square(size: u32, left: u32, top: u32, side: u32) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(size, size, Rgba([30, 30, 30, 255]));
    for y in top..top + side {
        for x in left..left + side {
            image.put_pixel(x, y, Rgba([0, 255, 0, 255]));
        }
    }
    image
}

#[test]
fn test_top_left_square_centroid_and_count() {
    let image = backdrop_with_square(100, 0, 0, 10);
    let result = scan_for_marker(&image).expect("marker should be found");

    assert_eq!(result.pixel_count, 100);
    assert!((result.centroid.0 - 5.0).abs() < 0.6);
    assert!((result.centroid.1 - 5.0).abs() < 0.6);
    assert_eq!((result.extent.min_x, result.extent.max_x), (0, 9));
    assert_eq!((result.extent.min_y, result.extent.max_y), (0, 9));
}

#[test]
fn test_scan_is_idempotent() {
    let image = backdrop_with_square(120, 37, 55, 23);
    assert_eq!(scan_for_marker(&image), scan_for_marker(&image));
}

#[test]
fn test_no_marker_returns_none() {
    let mut image = RgbaImage::from_pixel(50, 50, Rgba([150, 200, 150, 255]));
    // Green but not dominant enough, and dominant but too dark.
    image.put_pixel(3, 3, Rgba([10, 95, 10, 255]));
    assert_eq!(scan_for_marker(&image), None);
}

#[test]
fn test_fit_scale_is_clamped_to_slider_range() {
    let small = scan_for_marker(&backdrop_with_square(100, 0, 0, 10)).unwrap();
    assert_eq!(small.fit_scale(180, 200), MIN_SCALE);

    let large = scan_for_marker(&backdrop_with_square(900, 0, 0, 880)).unwrap();
    assert_eq!(large.fit_scale(180, 200), MAX_SCALE);

    let fitted = scan_for_marker(&backdrop_with_square(400, 10, 10, 201)).unwrap();
    assert!((fitted.fit_scale(180, 200) - 0.9).abs() < 1e-5);
}
