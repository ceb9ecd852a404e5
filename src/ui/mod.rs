//! Minimal window: backdrop, live cut-out, optional camera preview.

use anyhow::{Result, anyhow};
use crossbeam_channel::Receiver;
use image::{Rgba, RgbaImage};
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use crate::{
    calibration,
    pipeline::CancellationToken,
    placement::{PlacementController, PositionMode, ScaleSlider},
    scene,
    types::{DetectionState, FrameUpdate},
};

mod input;
mod render_util;

pub use input::{KeyAction, PointerTracker, apply_key};

const WINDOW_TITLE: &str = "Face Cutout";

const KEY_BINDINGS: &[(Key, KeyAction)] = &[
    (Key::Equal, KeyAction::Grow),
    (Key::NumPadPlus, KeyAction::Grow),
    (Key::Minus, KeyAction::Shrink),
    (Key::NumPadMinus, KeyAction::Shrink),
    (Key::Left, KeyAction::Left),
    (Key::Right, KeyAction::Right),
    (Key::Up, KeyAction::Up),
    (Key::Down, KeyAction::Down),
    (Key::R, KeyAction::Reset),
];

pub struct UiOptions {
    pub window_width: u32,
    pub window_height: u32,
    pub target_fps: u32,
    pub show_landmarks: bool,
    pub mode: PositionMode,
    pub initial_scale: f32,
    /// Unscaled cut-out size, used to fit the calibration marker.
    pub cutout_size: (u32, u32),
    pub backdrop: Option<RgbaImage>,
}

/// Stage = the backdrop fitted into the window. Placement coordinates are
/// relative to it.
struct Stage {
    image: RgbaImage,
    left: i64,
    top: i64,
}

impl Stage {
    fn new(backdrop: Option<&RgbaImage>, window_w: u32, window_h: u32) -> crate::Result<Self> {
        let image = match backdrop {
            Some(backdrop) => {
                let (w, h) = scene::fit_within(backdrop.width(), backdrop.height(), window_w, window_h);
                scene::resize_rgba(backdrop, w, h)?
            }
            None => RgbaImage::from_pixel(window_w, window_h, Rgba([40, 44, 52, 255])),
        };
        let left = (window_w as i64 - image.width() as i64) / 2;
        let top = (window_h as i64 - image.height() as i64) / 2;
        Ok(Self { image, left, top })
    }

    fn to_stage(&self, window_pos: (f32, f32)) -> (f32, f32) {
        (window_pos.0 - self.left as f32, window_pos.1 - self.top as f32)
    }
}

fn window_title(state: DetectionState, calibrated: bool) -> String {
    let marker = if calibrated { "marker found" } else { "no marker" };
    format!("{WINDOW_TITLE} - {} - {marker}", state.label())
}

/// Run the window until it is closed or Esc is pressed, then cancel the
/// frame loop.
pub fn run(
    options: UiOptions,
    update_rx: Receiver<FrameUpdate>,
    cancel: CancellationToken,
) -> Result<()> {
    let (win_w, win_h) = (options.window_width as usize, options.window_height as usize);
    let title = window_title(DetectionState::NoFace, false);
    let mut window = Window::new(&title, win_w, win_h, WindowOptions::default())
        .map_err(|err| anyhow!("failed to open window: {err}"))?;
    window.set_target_fps(options.target_fps as usize);

    let stage = Stage::new(options.backdrop.as_ref(), options.window_width, options.window_height)?;
    let mut controller = PlacementController::new(
        options.mode,
        stage.image.width() as f32,
        stage.image.height() as f32,
    );
    let slider = ScaleSlider::default();
    controller.seed_scale(slider.clamp(options.initial_scale));

    let calibrated = match calibration::scan_for_marker(&stage.image) {
        Some(marker) => {
            controller.apply_calibration(&marker, options.cutout_size);
            true
        }
        None => false,
    };

    let mut pointer = PointerTracker::default();
    let mut latest: Option<FrameUpdate> = None;
    let mut shown_state = DetectionState::NoFace;
    let mut buffer = vec![0u32; win_w * win_h];

    while window.is_open() && !window.is_key_down(Key::Escape) {
        if let Some(update) = update_rx.try_iter().last() {
            if update.state != shown_state {
                shown_state = update.state;
                window.set_title(&window_title(shown_state, calibrated));
            }
            latest = Some(update);
        }

        let pos = window
            .get_mouse_pos(MouseMode::Discard)
            .map(|p| stage.to_stage(p));
        pointer.update(&mut controller, window.get_mouse_down(MouseButton::Left), pos);
        for (key, action) in KEY_BINDINGS {
            if window.is_key_pressed(*key, KeyRepeat::Yes) {
                apply_key(&mut controller, &slider, *action);
            }
        }

        render_util::fill(&mut buffer, render_util::BACKGROUND);
        let composed = match latest.as_ref().and_then(|u| u.cutout.as_ref()) {
            Some(cutout) => scene::compose(&stage.image, cutout, controller.state(), controller.mode())?,
            None => stage.image.clone(),
        };
        render_util::blit(&mut buffer, win_w, win_h, &composed, stage.left, stage.top);

        if options.show_landmarks {
            if let Some(update) = latest.as_ref() {
                if let Some((inset, left, top)) =
                    render_util::preview_inset(update, options.window_width, options.window_height)?
                {
                    render_util::blit(&mut buffer, win_w, win_h, &inset, left, top);
                }
            }
        }

        window
            .update_with_buffer(&buffer, win_w, win_h)
            .map_err(|err| anyhow!("failed to present frame: {err}"))?;
    }

    log::info!("window closed");
    cancel.cancel();
    Ok(())
}
