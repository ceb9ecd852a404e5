//! Property sweeps for the crop calculator and the coordinate transform


use face_cutout::{
    Error,
    geometry::{CropRegion, Padding, compute_crop, transform},
    types::LandmarkPoint,
};
use test_helpers::Lcg;

#[test]
fn test_crop_is_contained_in_frame() {
    let mut rng = Lcg::new(7);
    let frames = [(640u32, 480u32), (1280, 720), (97, 211), (1, 1)];

    for _ in 0..500 {
        // Points range a little outside the unit square on purpose.
        let count = 1 + (rng.next_f32() * 40.0) as usize;
        let points: Vec<LandmarkPoint> = (0..count)
            .map(|_| LandmarkPoint::new(rng.next_f32() * 1.4 - 0.2, rng.next_f32() * 1.4 - 0.2))
            .collect();
        let (fw, fh) = frames[(rng.next_f32() * frames.len() as f32) as usize % frames.len()];

        match compute_crop(&points, fw, fh, &Padding::FACE) {
            Ok(crop) => {
                assert!(crop.x >= 0.0 && crop.y >= 0.0);
                assert!(crop.right() <= fw as f32 + 1e-3);
                assert!(crop.bottom() <= fh as f32 + 1e-3);
                assert!(crop.width > 0.0 && crop.height > 0.0);
            }
            // Every point can fall off one side of the frame.
            Err(Error::InvalidRegion { .. }) => {}
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
}

#[test]
fn test_crop_of_empty_input_is_empty_input_error() {
    let err = compute_crop(&[], 640, 480, &Padding::FACE).unwrap_err();
    assert!(matches!(err, Error::EmptyInput));
}

#[test]
fn test_single_point_still_gets_padding() {
    let crop = compute_crop(&[LandmarkPoint::new(0.5, 0.5)], 100, 100, &Padding::FACE).unwrap();
    assert!((crop.width - 16.0).abs() < 1e-3);
    assert!((crop.height - 15.0).abs() < 1e-3);
}

#[test]
fn test_transform_is_monotonic() {
    let mut rng = Lcg::new(42);

    for _ in 0..300 {
        let crop = CropRegion {
            x: rng.next_f32() * 300.0,
            y: rng.next_f32() * 200.0,
            width: 1.0 + rng.next_f32() * 300.0,
            height: 1.0 + rng.next_f32() * 200.0,
        };
        let a = LandmarkPoint::new(rng.next_f32(), rng.next_f32());
        let b = LandmarkPoint::new(rng.next_f32(), rng.next_f32());

        let pa = transform(a, 640, 480, &crop, 180, 200).unwrap();
        let pb = transform(b, 640, 480, &crop, 180, 200).unwrap();
        if a.x > b.x {
            assert!(pa.0 >= pb.0);
        }
        if a.y > b.y {
            assert!(pa.1 >= pb.1);
        }
    }
}

#[test]
fn test_transform_is_affine() {
    let crop = CropRegion {
        x: 40.0,
        y: 30.0,
        width: 200.0,
        height: 100.0,
    };
    let p0 = transform(LandmarkPoint::new(0.2, 0.2), 640, 480, &crop, 180, 200).unwrap();
    let p1 = transform(LandmarkPoint::new(0.4, 0.4), 640, 480, &crop, 180, 200).unwrap();
    let mid = transform(LandmarkPoint::new(0.3, 0.3), 640, 480, &crop, 180, 200).unwrap();
    assert!(((p0.0 + p1.0) / 2.0 - mid.0).abs() < 1e-3);
    assert!(((p0.1 + p1.1) / 2.0 - mid.1).abs() < 1e-3);
}
