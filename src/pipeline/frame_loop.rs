//! Per-frame detect → crop → composite cycle.
//!
//! One frame is in flight at a time: the next frame is not pulled from the
//! camera until the previous detector result has been processed and
//! published. Cancellation is checked before each submission and again
//! before a result is applied, so nothing is published after teardown.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::{
    compositor::Compositor,
    detector::LandmarkDetector,
};
use crate::types::{DetectionState, FaceLandmarks, Frame, FrameUpdate};

#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub enum TickOutcome {
    /// No new camera frame was ready.
    Idle,
    /// Detector failed; state left untouched.
    Skipped,
    /// Cancelled before or during detection; any result was dropped.
    Cancelled,
    Published(FrameUpdate),
}

/// Turns detector results into cut-outs and tracks the detection state.
pub struct FrameProcessor {
    compositor: Compositor,
    state: DetectionState,
}

impl FrameProcessor {
    pub fn new(compositor: Compositor) -> Self {
        Self {
            compositor,
            state: DetectionState::NoFace,
        }
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    /// Apply one detector result. Geometry failures clear the cut-out
    /// instead of keeping a stale one.
    pub fn process(&mut self, frame: Frame, faces: Vec<FaceLandmarks>) -> FrameUpdate {
        let update = self.build_update(frame, faces);
        self.commit(update.state);
        update
    }

    /// Composite the update without touching the tracked state.
    fn build_update(&mut self, frame: Frame, faces: Vec<FaceLandmarks>) -> FrameUpdate {
        let primary = faces.into_iter().next();

        let (state, cutout) = match &primary {
            Some(face) => match self.compositor.cutout_for_face(&frame, face) {
                Ok(cutout) => (DetectionState::FaceDetected, Some(cutout)),
                Err(err) => {
                    log::debug!("skipping cut-out for this frame: {err}");
                    (DetectionState::NoFace, None)
                }
            },
            None => (DetectionState::NoFace, None),
        };

        FrameUpdate {
            frame,
            state,
            landmarks: primary,
            cutout,
        }
    }

    fn commit(&mut self, state: DetectionState) {
        if state != self.state {
            log::info!("{}", state.label());
            self.state = state;
        }
    }
}

pub struct FrameLoop<D: LandmarkDetector> {
    detector: D,
    processor: FrameProcessor,
    cancel: CancellationToken,
}

impl<D: LandmarkDetector> FrameLoop<D> {
    pub fn new(detector: D, compositor: Compositor, cancel: CancellationToken) -> Self {
        Self {
            detector,
            processor: FrameProcessor::new(compositor),
            cancel,
        }
    }

    pub fn state(&self) -> DetectionState {
        self.processor.state()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run one scheduling tick with whatever frame the camera had ready.
    pub fn tick(&mut self, frame: Option<Frame>) -> TickOutcome {
        if self.cancel.is_cancelled() {
            return TickOutcome::Cancelled;
        }
        let Some(frame) = frame else {
            return TickOutcome::Idle;
        };

        let faces = match self.detector.detect(&frame) {
            Ok(faces) => faces,
            Err(err) => {
                log::warn!("{} detection failed: {err:?}", self.detector.label());
                return TickOutcome::Skipped;
            }
        };

        if self.cancel.is_cancelled() {
            log::debug!("discarding detector result that arrived after cancellation");
            return TickOutcome::Cancelled;
        }

        let update = self.processor.build_update(frame, faces);
        if self.cancel.is_cancelled() {
            log::debug!("discarding cut-out finished after cancellation");
            return TickOutcome::Cancelled;
        }
        self.processor.commit(update.state);
        TickOutcome::Published(update)
    }
}

#[derive(Debug)]
pub struct FrameLoopHandle {
    cancel: CancellationToken,
    handle: Option<thread::JoinHandle<()>>,
}

impl FrameLoopHandle {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FrameLoopHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Spawn the loop on its own thread. Updates go out through `update_tx` in
/// arrival order; the loop ends on cancellation or when either channel
/// disconnects.
pub fn start_frame_loop<D: LandmarkDetector>(
    detector: D,
    compositor: Compositor,
    frame_rx: Receiver<Frame>,
    update_tx: Sender<FrameUpdate>,
    poll_interval: Duration,
) -> FrameLoopHandle {
    let cancel = CancellationToken::new();
    let mut frame_loop = FrameLoop::new(detector, compositor, cancel.clone());

    let handle = thread::spawn(move || {
        log::info!("frame loop started ({})", frame_loop.detector.label());
        loop {
            let frame = match recv_latest_frame(&frame_rx, poll_interval) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    log::info!("camera channel closed, stopping frame loop");
                    break;
                }
            };

            match frame_loop.tick(frame) {
                TickOutcome::Published(update) => {
                    if !publish(&update_tx, update, &frame_loop.cancel) {
                        break;
                    }
                }
                TickOutcome::Cancelled => break,
                TickOutcome::Idle | TickOutcome::Skipped => {}
            }
        }
        log::debug!("frame loop exited");
    });

    FrameLoopHandle {
        cancel,
        handle: Some(handle),
    }
}

/// Hand `update` to the renderer unless the loop was cancelled meanwhile.
/// Returns whether the loop should keep running.
fn publish(
    update_tx: &Sender<FrameUpdate>,
    update: FrameUpdate,
    cancel: &CancellationToken,
) -> bool {
    if cancel.is_cancelled() {
        log::debug!("dropping update produced after cancellation");
        return false;
    }
    if update_tx.send(update).is_err() {
        log::info!("renderer went away, stopping frame loop");
        return false;
    }
    true
}

fn recv_latest_frame(
    frame_rx: &Receiver<Frame>,
    timeout: Duration,
) -> Result<Option<Frame>, RecvTimeoutError> {
    let mut frame = frame_rx.recv_timeout(timeout)?;
    // Drop stale frames if detection is still behind to avoid backlog.
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Ok(Some(frame))
}
