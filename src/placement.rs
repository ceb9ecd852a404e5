//! Interactive position/scale state for the displayed cut-out.
//!
//! Nothing here fails: every input is clamped instead of rejected. The scale
//! setter takes raw values; the slider range lives in [`ScaleSlider`] and is
//! the caller's responsibility.

use serde::{Deserialize, Serialize};

use crate::calibration::{GreenAreaResult, MAX_SCALE, MIN_SCALE};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    /// Centre of the cut-out as a percentage of the container, clamped to `[0,100]`.
    Percent,
    /// Unclamped pixel translation from the container centre.
    PixelOffset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn get(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    fn set(&mut self, axis: Axis, value: f32) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementState {
    pub position: Position,
    pub scale: f32,
    pub dragging: bool,
    pub drag_anchor: Position,
}

impl PlacementState {
    pub fn initial(mode: PositionMode) -> Self {
        let position = match mode {
            PositionMode::Percent => Position::new(50.0, 50.0),
            PositionMode::PixelOffset => Position::default(),
        };
        Self {
            position,
            scale: 1.0,
            dragging: false,
            drag_anchor: Position::default(),
        }
    }
}

/// Range and granularity of the size slider.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleSlider {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Default for ScaleSlider {
    fn default() -> Self {
        Self {
            min: MIN_SCALE,
            max: MAX_SCALE,
            step: 0.1,
        }
    }
}

impl ScaleSlider {
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    /// Value the slider lands on for a raw input: clamped, then snapped to
    /// the nearest step.
    pub fn snap(&self, value: f32) -> f32 {
        let clamped = self.clamp(value);
        let steps = ((clamped - self.min) / self.step).round();
        self.clamp(self.min + steps * self.step)
    }

    pub fn step_up(&self, current: f32) -> f32 {
        self.snap(current + self.step)
    }

    pub fn step_down(&self, current: f32) -> f32 {
        self.snap(current - self.step)
    }
}

#[derive(Clone, Debug)]
pub struct PlacementController {
    state: PlacementState,
    /// Where `reset` returns to: the initial state plus any seeding.
    home: PlacementState,
    mode: PositionMode,
    container: (f32, f32),
}

impl PlacementController {
    pub fn new(mode: PositionMode, container_w: f32, container_h: f32) -> Self {
        let state = PlacementState::initial(mode);
        Self {
            state,
            home: state,
            mode,
            container: (container_w, container_h),
        }
    }

    pub fn state(&self) -> &PlacementState {
        &self.state
    }

    pub fn mode(&self) -> PositionMode {
        self.mode
    }

    pub fn set_container_size(&mut self, width: f32, height: f32) {
        self.container = (width, height);
    }

    pub fn begin_drag(&mut self, pointer: (f32, f32)) {
        self.state.drag_anchor = Position::new(pointer.0, pointer.1);
        self.state.dragging = true;
    }

    pub fn continue_drag(&mut self, pointer: (f32, f32)) {
        if !self.state.dragging {
            return;
        }
        let dx = pointer.0 - self.state.drag_anchor.x;
        let dy = pointer.1 - self.state.drag_anchor.y;

        match self.mode {
            PositionMode::Percent => {
                let (cw, ch) = self.container;
                if cw > 0.0 {
                    self.shift(Axis::X, dx / cw * 100.0);
                }
                if ch > 0.0 {
                    self.shift(Axis::Y, dy / ch * 100.0);
                }
            }
            PositionMode::PixelOffset => {
                self.shift(Axis::X, dx);
                self.shift(Axis::Y, dy);
            }
        }

        self.state.drag_anchor = Position::new(pointer.0, pointer.1);
    }

    pub fn end_drag(&mut self) {
        self.state.dragging = false;
    }

    /// Assigns the raw value; clamp with [`ScaleSlider`] first.
    pub fn set_scale(&mut self, value: f32) {
        self.state.scale = value;
    }

    /// Like [`set_scale`](Self::set_scale), but `reset` returns to it too.
    pub fn seed_scale(&mut self, value: f32) {
        self.state.scale = value;
        self.home.scale = value;
    }

    pub fn nudge(&mut self, axis: Axis, delta: f32) {
        self.shift(axis, delta);
    }

    /// Absolute assignment from a position slider.
    pub fn set_axis(&mut self, axis: Axis, value: f32) {
        let value = self.clamp_axis(value);
        self.state.position.set(axis, value);
    }

    /// Seed position and scale from a backdrop marker. Pixel-offset layouts
    /// have no container-relative origin for the centroid, so only the scale
    /// is taken there.
    pub fn apply_calibration(&mut self, marker: &GreenAreaResult, reference: (u32, u32)) {
        if self.mode == PositionMode::Percent {
            self.set_axis(Axis::X, marker.centroid.0);
            self.set_axis(Axis::Y, marker.centroid.1);
        }
        self.state.scale = marker.fit_scale(reference.0, reference.1);
        self.home.position = self.state.position;
        self.home.scale = self.state.scale;
        log::debug!(
            "placement seeded at ({:.1}, {:.1}) scale {:.2}",
            self.state.position.x,
            self.state.position.y,
            self.state.scale
        );
    }

    /// Back to the seeded state (initial scale, calibration), keeping mode
    /// and container.
    pub fn reset(&mut self) {
        self.state = self.home;
    }

    fn shift(&mut self, axis: Axis, delta: f32) {
        let value = self.state.position.get(axis) + delta;
        self.state.position.set(axis, self.clamp_axis(value));
    }

    fn clamp_axis(&self, value: f32) -> f32 {
        match self.mode {
            PositionMode::Percent => value.clamp(0.0, 100.0),
            PositionMode::PixelOffset => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::BoundingExtent;

    #[test]
    fn continue_without_begin_is_noop() {
        let mut ctl = PlacementController::new(PositionMode::Percent, 100.0, 100.0);
        ctl.continue_drag((30.0, 30.0));
        assert_eq!(ctl.state().position, Position::new(50.0, 50.0));
    }

    #[test]
    fn pixel_offset_drag_is_unclamped() {
        let mut ctl = PlacementController::new(PositionMode::PixelOffset, 100.0, 100.0);
        ctl.begin_drag((0.0, 0.0));
        ctl.continue_drag((-250.0, 400.0));
        ctl.end_drag();
        assert_eq!(ctl.state().position, Position::new(-250.0, 400.0));
        assert!(!ctl.state().dragging);
    }

    #[test]
    fn drag_anchor_follows_pointer() {
        let mut ctl = PlacementController::new(PositionMode::PixelOffset, 100.0, 100.0);
        ctl.begin_drag((10.0, 10.0));
        ctl.continue_drag((15.0, 10.0));
        ctl.continue_drag((20.0, 12.0));
        assert_eq!(ctl.state().position, Position::new(10.0, 2.0));
        assert_eq!(ctl.state().drag_anchor, Position::new(20.0, 12.0));
    }

    #[test]
    fn nudge_clamps_in_percent_mode() {
        let mut ctl = PlacementController::new(PositionMode::Percent, 200.0, 100.0);
        ctl.nudge(Axis::X, 80.0);
        ctl.nudge(Axis::Y, -80.0);
        assert_eq!(ctl.state().position, Position::new(100.0, 0.0));
    }

    #[test]
    fn slider_snaps_to_steps() {
        let slider = ScaleSlider::default();
        assert_eq!(slider.clamp(3.0), 2.0);
        assert_eq!(slider.clamp(0.1), 0.5);
        assert!((slider.snap(1.04) - 1.0).abs() < 1e-5);
        assert!((slider.step_up(1.0) - 1.1).abs() < 1e-5);
        assert!((slider.step_down(0.5) - 0.5).abs() < 1e-5);
        assert_eq!(slider.clamp(f32::NAN), 0.5);
    }

    #[test]
    fn calibration_seeds_percent_position_and_scale() {
        let mut ctl = PlacementController::new(PositionMode::Percent, 400.0, 300.0);
        let marker = GreenAreaResult {
            centroid: (25.0, 75.0),
            extent: BoundingExtent {
                min_x: 0,
                max_x: 180,
                min_y: 0,
                max_y: 400,
            },
            pixel_count: 1000,
        };
        ctl.apply_calibration(&marker, (180, 200));
        assert_eq!(ctl.state().position, Position::new(25.0, 75.0));
        assert!((ctl.state().scale - 0.9).abs() < 1e-6);

        ctl.set_scale(1.7);
        ctl.nudge(Axis::X, 5.0);
        assert_eq!(ctl.state().scale, 1.7);
        assert_eq!(ctl.state().position.x, 30.0);

        ctl.reset();
        assert_eq!(ctl.state().position, Position::new(25.0, 75.0));
        assert!((ctl.state().scale - 0.9).abs() < 1e-6);
    }

    #[test]
    fn reset_returns_to_seeded_scale() {
        let mut ctl = PlacementController::new(PositionMode::Percent, 100.0, 100.0);
        ctl.seed_scale(1.4);
        ctl.set_scale(0.6);
        ctl.nudge(Axis::Y, 20.0);
        ctl.begin_drag((1.0, 1.0));

        ctl.reset();
        assert_eq!(ctl.state().scale, 1.4);
        assert_eq!(ctl.state().position, Position::new(50.0, 50.0));
        assert!(!ctl.state().dragging);
    }

    #[test]
    fn calibration_only_scales_pixel_offset_mode() {
        let mut ctl = PlacementController::new(PositionMode::PixelOffset, 400.0, 300.0);
        let marker = GreenAreaResult {
            centroid: (25.0, 75.0),
            extent: BoundingExtent {
                min_x: 0,
                max_x: 360,
                min_y: 0,
                max_y: 400,
            },
            pixel_count: 1000,
        };
        ctl.apply_calibration(&marker, (180, 200));
        assert_eq!(ctl.state().position, Position::default());
        assert!((ctl.state().scale - 1.8).abs() < 1e-6);
    }
}
