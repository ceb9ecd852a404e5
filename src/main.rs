use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossbeam_channel::bounded;
use log::info;

use face_cutout::{
    config::{Config, CutoutProfileKind},
    model_download,
    pipeline::{Compositor, FaceDetector, FaceMeshDetector, start_frame_loop},
    placement::PositionMode,
    scene,
    ui::{self, UiOptions},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Camera index to use
    #[arg(long)]
    camera: Option<u32>,

    /// Backdrop image; a green area on it calibrates the placement
    #[arg(short, long)]
    backdrop: Option<PathBuf>,

    /// Face-mesh ONNX model
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Cut-out profile (full_face, lower_face)
    #[arg(short, long)]
    profile: Option<String>,

    /// Placement mode (percent, pixel_offset)
    #[arg(long)]
    mode: Option<String>,

    /// Draw the camera preview with landmark outlines
    #[arg(long)]
    landmarks: bool,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// List cameras and exit
    #[arg(long)]
    list_cameras: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn parse_profile(name: &str) -> Result<CutoutProfileKind> {
    match name {
        "full_face" => Ok(CutoutProfileKind::FullFace),
        "lower_face" => Ok(CutoutProfileKind::LowerFace),
        other => bail!("unknown profile '{other}' (expected full_face or lower_face)"),
    }
}

fn parse_mode(name: &str) -> Result<PositionMode> {
    match name {
        "percent" => Ok(PositionMode::Percent),
        "pixel_offset" => Ok(PositionMode::PixelOffset),
        other => bail!("unknown placement mode '{other}' (expected percent or pixel_offset)"),
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).with_context(|| format!("failed to load {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(index) = args.camera {
        config.camera.index = index;
    }
    if let Some(path) = &args.backdrop {
        config.display.backdrop = Some(path.clone());
    }
    if let Some(path) = &args.model {
        config.model.path = path.clone();
    }
    if let Some(name) = &args.profile {
        config.cutout.profile = parse_profile(name)?;
    }
    if let Some(name) = &args.mode {
        config.placement.mode = parse_mode(name)?;
    }
    if args.landmarks {
        config.display.show_landmarks = true;
    }

    config.validate()?;
    Ok(config)
}

fn load_face_detector(config: &Config) -> Result<FaceDetector> {
    let path = &config.model.detector_path;
    model_download::ensure_model_ready(path, config.model.detector_url.as_deref(), |event| {
        log::debug!("face detector: {event:?}");
    })?;
    FaceDetector::new(path, config.model.face_detector())
}

#[cfg(feature = "camera-nokhwa")]
fn list_cameras() -> Result<()> {
    for device in face_cutout::pipeline::available_cameras()? {
        println!("{}: {}", device.index, device.label);
    }
    Ok(())
}

#[cfg(not(feature = "camera-nokhwa"))]
fn list_cameras() -> Result<()> {
    bail!("built without camera support (enable the camera-nokhwa feature)")
}

#[cfg(feature = "camera-nokhwa")]
fn start_camera(
    config: &Config,
    frame_tx: crossbeam_channel::Sender<face_cutout::types::Frame>,
) -> Result<face_cutout::pipeline::CameraStream> {
    use face_cutout::pipeline::{CaptureOptions, start_camera_stream};

    start_camera_stream(
        CaptureOptions {
            index: config.camera.index,
            target_fps: config.camera.detector_fps,
            mirror: config.display.mirror,
        },
        frame_tx,
    )
}

#[cfg(not(feature = "camera-nokhwa"))]
fn start_camera(
    _config: &Config,
    _frame_tx: crossbeam_channel::Sender<face_cutout::types::Frame>,
) -> Result<()> {
    bail!("built without camera support (enable the camera-nokhwa feature)")
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{}", face_cutout::config::EXAMPLE_CONFIG);
        return Ok(());
    }
    if args.list_cameras {
        return list_cameras();
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            log::error!("{err:#}");
            return Err(err);
        }
    };

    model_download::ensure_model_ready(&config.model.path, config.model.url.as_deref(), |event| {
        log::debug!("model: {event:?}");
    })?;
    let detector = FaceMeshDetector::new(&config.model.path, config.model.face_mesh())?;
    let detector = match load_face_detector(&config) {
        Ok(face_detector) => detector.with_face_detector(face_detector),
        Err(err) => {
            log::warn!("running without face detection, keep the face filling the frame: {err:#}");
            detector
        }
    };

    let backdrop = match &config.display.backdrop {
        Some(path) => Some(scene::load_backdrop(path)?),
        None => None,
    };

    let profile = config.cutout.profile();
    let cutout_size = (profile.width, profile.height);
    let compositor = Compositor::new(profile, config.cutout.enhancement);

    let (frame_tx, frame_rx) = bounded(1);
    let (update_tx, update_rx) = bounded(2);

    let camera = start_camera(&config, frame_tx).context("failed to start camera")?;
    let frame_loop = start_frame_loop(
        detector,
        compositor,
        frame_rx,
        update_tx,
        Duration::from_millis(100),
    );

    let result = ui::run(
        UiOptions {
            window_width: config.display.window_width,
            window_height: config.display.window_height,
            target_fps: config.display.target_fps,
            show_landmarks: config.display.show_landmarks,
            mode: config.placement.mode,
            initial_scale: config.placement.initial_scale,
            cutout_size,
            backdrop,
        },
        update_rx,
        frame_loop.cancel_token(),
    );

    frame_loop.stop();
    drop(camera);
    result
}
