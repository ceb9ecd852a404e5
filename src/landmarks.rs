//! Named groupings of face-mesh landmark indices.
//!
//! Indices follow the 468-point MediaPipe face mesh topology. Order matters:
//! each list is walked in sequence when it is used as a polygon.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Number of points the face-mesh model emits per face.
pub const FACE_MESH_POINTS: usize = 468;

pub const FACE_CONTOUR: &[usize] = &[
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
];

pub const LEFT_EYE: &[usize] = &[
    33, 7, 163, 144, 145, 153, 154, 155, 133, 173, 157, 158, 159, 160, 161, 246,
];

pub const RIGHT_EYE: &[usize] = &[
    362, 382, 381, 380, 374, 373, 390, 249, 263, 466, 388, 387, 386, 385, 384, 398,
];

pub const LEFT_EYEBROW: &[usize] = &[70, 63, 105, 66, 107, 55, 65, 52, 53, 46];

pub const RIGHT_EYEBROW: &[usize] = &[300, 293, 334, 296, 336, 285, 295, 282, 283, 276];

pub const NOSE: &[usize] = &[
    168, 6, 197, 195, 5, 4, 1, 19, 94, 2, 164, 0, 11, 12, 13, 14, 15, 16, 17, 18, 200, 199, 175,
];

// Outer upper, outer lower, inner upper, inner lower.
pub const LIPS: &[usize] = &[
    61, 185, 40, 39, 37, 0, 267, 269, 270, 409, //
    61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291, 308, 324, 318, 402, 317, 14, 87, 178, 88,
    78, 191, 80, 81, 82, 13, 312, 311, 310, 415, //
    78, 95, 88, 178, 87, 14, 317, 402, 318, 324,
];

/// Chin and left jaw up to the temple; the tail of [`FACE_CONTOUR`].
pub const LOWER_FACE_CONTOUR: &[usize] = &[
    152, 148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    FaceContour,
    LeftEye,
    RightEye,
    LeftEyebrow,
    RightEyebrow,
    Nose,
    Lips,
    LowerFaceContour,
}

impl Feature {
    /// The seven features that make up the full face outline.
    pub const OUTLINE: [Feature; 7] = [
        Feature::FaceContour,
        Feature::LeftEye,
        Feature::RightEye,
        Feature::LeftEyebrow,
        Feature::RightEyebrow,
        Feature::Nose,
        Feature::Lips,
    ];

    pub fn indices(&self) -> &'static [usize] {
        match self {
            Feature::FaceContour => FACE_CONTOUR,
            Feature::LeftEye => LEFT_EYE,
            Feature::RightEye => RIGHT_EYE,
            Feature::LeftEyebrow => LEFT_EYEBROW,
            Feature::RightEyebrow => RIGHT_EYEBROW,
            Feature::Nose => NOSE,
            Feature::Lips => LIPS,
            Feature::LowerFaceContour => LOWER_FACE_CONTOUR,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Feature::FaceContour => "face_contour",
            Feature::LeftEye => "left_eye",
            Feature::RightEye => "right_eye",
            Feature::LeftEyebrow => "left_eyebrow",
            Feature::RightEyebrow => "right_eyebrow",
            Feature::Nose => "nose",
            Feature::Lips => "lips",
            Feature::LowerFaceContour => "lower_face_contour",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [Feature::LowerFaceContour]
            .into_iter()
            .chain(Feature::OUTLINE)
            .find(|feature| feature.name() == name)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::from_name(s).ok_or_else(|| format!("unknown landmark feature '{s}'"))
    }
}

/// Concatenate the index lists of several features, keeping their order.
pub fn combined_indices(features: &[Feature]) -> Vec<usize> {
    features
        .iter()
        .flat_map(|feature| feature.indices().iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_index_fits_the_mesh() {
        for feature in Feature::OUTLINE.into_iter().chain([Feature::LowerFaceContour]) {
            assert!(
                feature.indices().iter().all(|&i| i < FACE_MESH_POINTS),
                "{feature} has an out-of-range index"
            );
        }
    }

    #[test]
    fn names_round_trip() {
        for feature in Feature::OUTLINE.into_iter().chain([Feature::LowerFaceContour]) {
            assert_eq!(feature.name().parse::<Feature>().unwrap(), feature);
        }
        assert!("forehead".parse::<Feature>().is_err());
    }

    #[test]
    fn lower_face_is_tail_of_contour() {
        let tail = &FACE_CONTOUR[FACE_CONTOUR.len() - LOWER_FACE_CONTOUR.len()..];
        assert_eq!(tail, LOWER_FACE_CONTOUR);
    }

    #[test]
    fn combined_preserves_order() {
        let all = combined_indices(&[Feature::LeftEyebrow, Feature::RightEyebrow]);
        assert_eq!(all.len(), 20);
        assert_eq!(all[0], 70);
        assert_eq!(all[10], 300);
    }
}
