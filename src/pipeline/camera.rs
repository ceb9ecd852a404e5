use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Result, anyhow};
use crossbeam_channel::Sender;
use nokhwa::{
    Camera, query,
    pixel_format::RgbFormat,
    utils::{
        ApiBackend, CameraIndex, CameraInfo, FrameFormat, RequestedFormat, RequestedFormatType,
    },
};

use super::rgba_converter::{self, PixelLayout};
use crate::types::Frame;

// Built-in macOS cameras often reject YUYV even though it is reported.
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats() -> [RequestedFormat<'static>; 3] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: u32,
    pub label: String,
}

#[derive(Clone, Debug)]
pub struct CaptureOptions {
    pub index: u32,
    pub target_fps: u32,
    /// Flip frames left-to-right before they reach the detector.
    pub mirror: bool,
}

#[derive(Debug)]
pub struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CameraStream {
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .iter()
        .enumerate()
        .map(|(position, info)| CameraDevice {
            index: camera_number(info).unwrap_or(position as u32),
            label: info.human_name(),
        })
        .collect())
}

fn camera_number(info: &CameraInfo) -> Option<u32> {
    match info.index() {
        CameraIndex::Index(n) => Some(*n),
        CameraIndex::String(_) => None,
    }
}

fn layout_for(format: FrameFormat) -> PixelLayout {
    match format {
        FrameFormat::NV12 => PixelLayout::Nv12,
        FrameFormat::YUYV => PixelLayout::Yuyv,
        FrameFormat::MJPEG => PixelLayout::Mjpeg,
        FrameFormat::RAWRGB => PixelLayout::Rgb,
        FrameFormat::RAWBGR => PixelLayout::Bgr,
        FrameFormat::GRAY => PixelLayout::Gray,
    }
}

fn open_camera(index: u32) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(CameraIndex::Index(index), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => {
                    log::info!(
                        "camera {index} opened at {} ({})",
                        camera.resolution(),
                        camera.frame_format()
                    );
                    return Ok(camera);
                }
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("camera {index} supports none of the requested formats")))
}

/// Start capturing on a background thread. Frames are throttled to
/// `target_fps` and dropped when the consumer is behind.
pub fn start_camera_stream(options: CaptureOptions, frame_tx: Sender<Frame>) -> Result<CameraStream> {
    // Fail fast before spawning the capture thread.
    drop(open_camera(options.index)?);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let min_interval = Duration::from_secs_f64(1.0 / options.target_fps.max(1) as f64);

    let handle = thread::spawn(move || {
        let mut camera = match open_camera(options.index) {
            Ok(cam) => cam,
            Err(err) => {
                log::error!("failed to open camera: {err:?}");
                return;
            }
        };
        let mut last_sent: Option<Instant> = None;

        while !stop_flag.load(Ordering::Relaxed) {
            let buffer = match camera.frame() {
                Ok(buffer) => buffer,
                Err(err) => {
                    log::warn!("camera frame read failed: {err:?}");
                    continue;
                }
            };

            if last_sent.is_some_and(|at| at.elapsed() < min_interval) {
                continue;
            }

            let resolution = buffer.resolution();
            let mut frame = match rgba_converter::to_frame(
                layout_for(buffer.source_frame_format()),
                buffer.buffer(),
                resolution.width_x,
                resolution.height_y,
            ) {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!("failed to decode camera frame: {err:?}");
                    continue;
                }
            };
            if options.mirror {
                frame.mirror_horizontally();
            }

            last_sent = Some(Instant::now());
            let _ = frame_tx.try_send(frame);
        }

        if let Err(err) = camera.stop_stream() {
            log::debug!("camera stop failed: {err:?}");
        }
    });

    Ok(CameraStream {
        stop,
        handle: Some(handle),
    })
}
