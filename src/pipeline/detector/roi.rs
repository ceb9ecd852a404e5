//! The square face region handed to the mesh model, and its frame-to-frame
//! tracking.

use super::face_detection::FaceDetection;
use crate::types::LandmarkPoint;

/// Side of the mesh crop relative to the face box, leaving room for the
/// forehead and chin.
pub const ROI_SCALE: f32 = 1.5;

const MIN_ROI_SIDE: f32 = 16.0;

/// Outer eye corners on the 468-point mesh.
const RIGHT_EYE_OUTER: usize = 33;
const LEFT_EYE_OUTER: usize = 263;

/// Square region in source pixels, rotated by `angle` around `center` so
/// the eye line is horizontal in the crop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceRoi {
    pub center: (f32, f32),
    pub side: f32,
    pub angle: f32,
}

impl FaceRoi {
    pub fn from_detection(detection: &FaceDetection) -> Self {
        let [x1, y1, x2, y2] = detection.bbox;
        let angle = match (detection.keypoints.first(), detection.keypoints.get(1)) {
            (Some(right), Some(left)) => eye_line_angle(*right, *left),
            _ => 0.0,
        };
        Self {
            center: ((x1 + x2) * 0.5, (y1 + y2) * 0.5),
            side: (x2 - x1).max(y2 - y1) * ROI_SCALE,
            angle,
        }
    }

    /// Region for the next frame from this frame's mesh. `None` when the
    /// mesh collapsed or drifted out of the frame.
    pub fn from_landmarks(points: &[LandmarkPoint], frame_w: u32, frame_h: u32) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let (fw, fh) = (frame_w as f32, frame_h as f32);
        let (min_x, max_x, min_y, max_y) = points.iter().fold(
            (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
            |acc, p| {
                (
                    acc.0.min(p.x * fw),
                    acc.1.max(p.x * fw),
                    acc.2.min(p.y * fh),
                    acc.3.max(p.y * fh),
                )
            },
        );

        let angle = match (points.get(RIGHT_EYE_OUTER), points.get(LEFT_EYE_OUTER)) {
            (Some(right), Some(left)) => {
                eye_line_angle((right.x * fw, right.y * fh), (left.x * fw, left.y * fh))
            }
            _ => 0.0,
        };

        let roi = Self {
            center: ((min_x + max_x) * 0.5, (min_y + max_y) * 0.5),
            side: (max_x - min_x).max(max_y - min_y) * ROI_SCALE,
            angle,
        };
        roi.is_usable(frame_w, frame_h).then_some(roi)
    }

    pub fn is_usable(&self, frame_w: u32, frame_h: u32) -> bool {
        self.side.is_finite()
            && self.side >= MIN_ROI_SIDE
            && (0.0..=frame_w as f32).contains(&self.center.0)
            && (0.0..=frame_h as f32).contains(&self.center.1)
    }
}

fn eye_line_angle(right: (f32, f32), left: (f32, f32)) -> f32 {
    (left.1 - right.1).atan2(left.0 - right.0)
}

/// Reuses the previous frame's mesh as the next region so the face detector
/// only runs when the track is lost or has aged out.
#[derive(Debug)]
pub struct RoiTracker {
    current: Option<(FaceRoi, u32, u32)>,
    age: u32,
    max_age: u32,
}

impl RoiTracker {
    /// `max_age` frames after a detection the track is dropped so the
    /// detector gets to re-anchor it.
    pub fn new(max_age: u32) -> Self {
        Self {
            current: None,
            age: 0,
            max_age,
        }
    }

    /// Region to reuse for a `frame_w`x`frame_h` frame, if any.
    pub fn next(&mut self, frame_w: u32, frame_h: u32) -> Option<FaceRoi> {
        match self.current {
            Some((roi, w, h)) if w == frame_w && h == frame_h && self.age < self.max_age => {
                self.age += 1;
                Some(roi)
            }
            _ => {
                self.lose();
                None
            }
        }
    }

    pub fn update(&mut self, points: &[LandmarkPoint], frame_w: u32, frame_h: u32) {
        match FaceRoi::from_landmarks(points, frame_w, frame_h) {
            Some(roi) => self.current = Some((roi, frame_w, frame_h)),
            None => self.lose(),
        }
    }

    pub fn lose(&mut self) {
        self.current = None;
        self.age = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::FACE_MESH_POINTS;

    fn mesh(center: (f32, f32), half: f32) -> Vec<LandmarkPoint> {
        let mut points = vec![LandmarkPoint::new(center.0, center.1); FACE_MESH_POINTS];
        points[0] = LandmarkPoint::new(center.0 - half, center.1 - half);
        points[1] = LandmarkPoint::new(center.0 + half, center.1 + half);
        points[RIGHT_EYE_OUTER] = LandmarkPoint::new(center.0 - half * 0.5, center.1);
        points[LEFT_EYE_OUTER] = LandmarkPoint::new(center.0 + half * 0.5, center.1);
        points
    }

    #[test]
    fn detection_roi_is_enlarged_and_levelled() {
        let detection = FaceDetection {
            bbox: [100.0, 50.0, 200.0, 130.0],
            keypoints: vec![(130.0, 80.0), (170.0, 80.0)],
            score: 0.9,
        };
        let roi = FaceRoi::from_detection(&detection);
        assert_eq!(roi.center, (150.0, 90.0));
        assert!((roi.side - 150.0).abs() < 1e-4);
        assert!(roi.angle.abs() < 1e-6);
    }

    #[test]
    fn tilted_eyes_rotate_the_roi() {
        let detection = FaceDetection {
            bbox: [0.0, 0.0, 100.0, 100.0],
            keypoints: vec![(30.0, 40.0), (70.0, 80.0)],
            score: 0.9,
        };
        let roi = FaceRoi::from_detection(&detection);
        assert!((roi.angle - std::f32::consts::FRAC_PI_4).abs() < 1e-5);
    }

    #[test]
    fn landmarks_roi_covers_the_mesh() {
        let roi = FaceRoi::from_landmarks(&mesh((0.5, 0.5), 0.1), 200, 100).unwrap();
        assert!((roi.center.0 - 100.0).abs() < 1e-3);
        assert!((roi.center.1 - 50.0).abs() < 1e-3);
        // 40 px wide, 20 px tall; the wider side wins.
        assert!((roi.side - 60.0).abs() < 1e-3);
        assert!(roi.angle.abs() < 1e-6);
    }

    #[test]
    fn collapsed_or_escaped_mesh_is_rejected() {
        assert!(FaceRoi::from_landmarks(&mesh((0.5, 0.5), 0.0), 200, 100).is_none());
        assert!(FaceRoi::from_landmarks(&mesh((1.5, 0.5), 0.1), 200, 100).is_none());
        assert!(FaceRoi::from_landmarks(&[], 200, 100).is_none());
    }

    #[test]
    fn tracker_reuses_then_ages_out() {
        let mut tracker = RoiTracker::new(2);
        assert!(tracker.next(200, 100).is_none());

        tracker.update(&mesh((0.5, 0.5), 0.1), 200, 100);
        assert!(tracker.next(200, 100).is_some());
        tracker.update(&mesh((0.5, 0.5), 0.1), 200, 100);
        assert!(tracker.next(200, 100).is_some());
        tracker.update(&mesh((0.5, 0.5), 0.1), 200, 100);
        assert!(tracker.next(200, 100).is_none());
    }

    #[test]
    fn tracker_drops_on_resize_or_loss() {
        let mut tracker = RoiTracker::new(u32::MAX);
        tracker.update(&mesh((0.5, 0.5), 0.1), 200, 100);
        assert!(tracker.next(320, 240).is_none());

        tracker.update(&mesh((0.5, 0.5), 0.1), 200, 100);
        tracker.lose();
        assert!(tracker.next(200, 100).is_none());
    }
}
