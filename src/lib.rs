//! Live face cut-out compositing.
//!
//! A face detector frames the face and a face-mesh model finds its 468
//! landmarks in each camera frame. The pipeline then:
//! 1. computes a padded crop region around the selected features,
//! 2. resamples it into a fixed-size canvas and grades its colors,
//! 3. clips it to the face outline so only the face stays opaque,
//! 4. hands the cut-out to a renderer that places it over a backdrop.
//!
//! The backdrop can carry a green marker region; [`calibration`] finds it
//! and seeds the initial position and scale of the cut-out.
//!
//! ```no_run
//! use face_cutout::{
//!     pipeline::{Compositor, CutoutProfile, Enhancement},
//!     types::{FaceLandmarks, Frame},
//! };
//!
//! # fn main() -> face_cutout::Result<()> {
//! # let (frame, face): (Frame, FaceLandmarks) = unimplemented!();
//! let mut compositor = Compositor::new(CutoutProfile::full_face(), Enhancement::default());
//! let cutout = compositor.cutout_for_face(&frame, &face)?;
//! assert_eq!((cutout.width(), cutout.height()), (180, 200));
//! # Ok(())
//! # }
//! ```

pub mod calibration;
pub mod config;
pub mod error;
pub mod geometry;
pub mod landmarks;
pub mod model_download;
pub mod overlay;
pub mod pipeline;
pub mod placement;
pub mod scene;
pub mod types;
pub mod ui;

pub use error::{Error, Result};
