//! The per-tick tracking loop.

use std::path::PathBuf;

use log::{debug, error};
use thiserror::Error;

use marker_ar_core::CameraParams;
use marker_ar_detect::{DetectError, MarkerDetector, MarkerHypothesis, PatternId, PatternTable};
use marker_ar_pose::{estimate_square_pose, SquarePose};

use crate::capture::save_frame_jpeg;
use crate::source::FrameSource;
use crate::{CAPTURE_JPEG_QUALITY, ROTATE_RATE_DEG_PER_S, TICK_INTERVAL_MS};

/// Loop-owned state, one instance for the life of the process.
#[derive(Clone, Debug)]
pub struct LoopState {
    pub found: bool,
    pub pose: Option<SquarePose>,
    pub rotate_enabled: bool,
    /// Always in [0, 360).
    pub rotate_angle_deg: f32,
    pub capture_requested: bool,
    pub capture_seq: u32,
    pub last_tick_ms: Option<u64>,
    /// Detection calls since the FPS counter was last reset.
    pub detect_count: u64,
    pub fps_timer_ms: u64,
}

impl Default for LoopState {
    fn default() -> Self {
        Self {
            found: false,
            pose: None,
            rotate_enabled: true,
            rotate_angle_deg: 0.0,
            capture_requested: false,
            capture_seq: 0,
            last_tick_ms: None,
            detect_count: 0,
            fps_timer_ms: 0,
        }
    }
}

/// What one tick did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TickOutcome {
    /// Less than the minimum interval since the last accepted tick.
    RateGated,
    /// No frame was available from the source.
    NoFrame,
    /// Frame processed; a redraw is due.
    Redraw,
}

/// Detector failure is the only tick-fatal condition.
#[derive(Error, Debug)]
pub enum TickError {
    #[error(transparent)]
    Detect(#[from] DetectError),
}

/// Drives acquisition, detection, selection and pose per tick.
pub struct Tracker {
    pub marker_id: PatternId,
    pub edge_len: f64,
    /// Directory capture files are written into.
    pub capture_dir: PathBuf,
    pub state: LoopState,
}

impl Tracker {
    pub fn new(marker_id: PatternId, edge_len: f64, capture_dir: PathBuf) -> Self {
        Self {
            marker_id,
            edge_len,
            capture_dir,
            state: LoopState::default(),
        }
    }

    /// Advance the loop by one tick at `now_ms` (monotonic milliseconds).
    pub fn tick(
        &mut self,
        now_ms: u64,
        source: &mut dyn FrameSource,
        detector: &mut MarkerDetector,
        table: &PatternTable,
        cam: &CameraParams,
    ) -> Result<TickOutcome, TickError> {
        // Rate gate: never run more often than 100 Hz.
        let dt_s = match self.state.last_tick_ms {
            Some(prev) => {
                let elapsed = now_ms.saturating_sub(prev);
                if elapsed < TICK_INTERVAL_MS {
                    return Ok(TickOutcome::RateGated);
                }
                elapsed as f32 * 1e-3
            }
            None => 0.0,
        };
        self.state.last_tick_ms = Some(now_ms);

        if self.state.rotate_enabled {
            self.state.rotate_angle_deg =
                (self.state.rotate_angle_deg + dt_s * ROTATE_RATE_DEG_PER_S).rem_euclid(360.0);
        }

        let Some(frame) = source.next_frame() else {
            return Ok(TickOutcome::NoFrame);
        };

        if self.state.capture_requested {
            let name = format!("image-{:04}.jpg", self.state.capture_seq);
            self.state.capture_seq += 1;
            let path = self.capture_dir.join(&name);
            if let Err(err) = save_frame_jpeg(&frame, &path, CAPTURE_JPEG_QUALITY) {
                error!("error saving video image {name}: {err}");
            }
            self.state.capture_requested = false;
        }

        self.state.detect_count += 1;
        let hypotheses = detector.detect(&frame, table)?;

        match select_best(&hypotheses, self.marker_id) {
            Some(best) => match estimate_square_pose(cam, &best.corners, self.edge_len) {
                Ok(pose) => {
                    self.state.pose = Some(pose);
                    self.state.found = true;
                }
                Err(err) => {
                    debug!("pose estimation failed: {err}");
                    self.state.found = false;
                }
            },
            None => self.state.found = false,
        }

        Ok(TickOutcome::Redraw)
    }
}

/// Highest-confidence hypothesis with the registered identity; ties go to
/// the first one in detector order.
pub fn select_best(
    hypotheses: &[MarkerHypothesis],
    marker_id: PatternId,
) -> Option<&MarkerHypothesis> {
    let mut best: Option<&MarkerHypothesis> = None;
    for hyp in hypotheses.iter().filter(|h| h.id == marker_id) {
        match best {
            None => best = Some(hyp),
            Some(current) if hyp.confidence > current.confidence => best = Some(hyp),
            Some(_) => {}
        }
    }
    best
}
