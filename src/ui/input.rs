use crate::placement::{Axis, PlacementController, PositionMode, ScaleSlider};

/// Keyboard actions the window understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Grow,
    Shrink,
    Left,
    Right,
    Up,
    Down,
    Reset,
}

/// Turns the per-redraw mouse snapshot into drag begin/continue/end calls.
#[derive(Debug, Default)]
pub struct PointerTracker {
    was_down: bool,
}

impl PointerTracker {
    /// `pos` is already in stage coordinates; `None` means the pointer is
    /// outside the window.
    pub fn update(&mut self, controller: &mut PlacementController, down: bool, pos: Option<(f32, f32)>) {
        match (self.was_down, down, pos) {
            (false, true, Some(pos)) => controller.begin_drag(pos),
            (true, true, Some(pos)) => controller.continue_drag(pos),
            (true, false, _) => controller.end_drag(),
            _ => {}
        }
        self.was_down = down && (self.was_down || pos.is_some());
    }
}

fn nudge_step(mode: PositionMode) -> f32 {
    match mode {
        PositionMode::Percent => 3.0,
        PositionMode::PixelOffset => 5.0,
    }
}

pub fn apply_key(controller: &mut PlacementController, slider: &ScaleSlider, action: KeyAction) {
    let step = nudge_step(controller.mode());
    let scale = controller.state().scale;
    match action {
        KeyAction::Grow => controller.set_scale(slider.step_up(scale)),
        KeyAction::Shrink => controller.set_scale(slider.step_down(scale)),
        KeyAction::Left => controller.nudge(Axis::X, -step),
        KeyAction::Right => controller.nudge(Axis::X, step),
        KeyAction::Up => controller.nudge(Axis::Y, -step),
        KeyAction::Down => controller.nudge(Axis::Y, step),
        KeyAction::Reset => controller.reset(),
    }
}
