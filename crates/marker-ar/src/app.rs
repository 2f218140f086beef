//! Application lifecycle and the interactive loop.
//!
//! Startup builds every long-lived handle in dependency order (mesh, camera,
//! intrinsics, detector and pattern, window); failures at any step log with
//! context and unwind through `Drop`, releasing whatever was already open.
//! The run loop is single-threaded and cooperative: pump window events, map
//! keys to commands, tick the tracker while the window is visible, redraw.

use std::path::PathBuf;
use std::time::Instant;

use log::{info, warn};
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use thiserror::Error;

use marker_ar_core::{CameraParamError, CameraParams, FrameView, MeshError, PixelFormat, TriangleMesh};
use marker_ar_detect::{DetectorParams, MarkerDetector, PatternError, PatternTable};

use crate::camera_source::CameraSource;
use crate::hud::{self, HudState};
use crate::input::{self, InputTargets};
use crate::render::{marker_transform, SoftwareRenderer};
use crate::source::{FrameSource, SourceError};
use crate::tracker::{TickError, TickOutcome, Tracker};
use crate::{MARKER_EDGE_LEN, VIEW_DISTANCE_MAX, VIEW_DISTANCE_MIN};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("loading mesh: {0}")]
    Mesh(#[from] MeshError),

    #[error("opening camera: {0}")]
    Source(#[from] SourceError),

    #[error("loading camera parameters: {0}")]
    CameraParams(#[from] CameraParamError),

    #[error("loading marker pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("reading detector config: {0}")]
    DetectorConfigIo(std::io::Error),

    #[error("parsing detector config: {0}")]
    DetectorConfig(#[from] serde_json::Error),

    #[error("creating window: {0}")]
    Window(#[from] minifb::Error),

    #[error(transparent)]
    Tick(#[from] TickError),
}

/// Startup inputs, normally filled in from the command line.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub camera_params: PathBuf,
    pub pattern: PathBuf,
    pub model: PathBuf,
    pub width: usize,
    pub height: usize,
    pub detector_config: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera_params: PathBuf::from("Data/camera_para.dat"),
            pattern: PathBuf::from("Data/patt.irc"),
            model: PathBuf::from("Data/bunny.obj"),
            width: 640,
            height: 480,
            detector_config: None,
        }
    }
}

/// The tracking pipeline without any window attached, so tests can drive it
/// with in-memory sources and a scripted clock.
pub struct Pipeline<S> {
    pub source: S,
    pub detector: MarkerDetector,
    pub table: PatternTable,
    pub cam: CameraParams,
    pub tracker: Tracker,
}

impl<S: FrameSource> Pipeline<S> {
    /// One cooperative iteration. Ticks run only while the window is
    /// visible; while hidden, no frame is pulled and no work happens.
    pub fn advance(
        &mut self,
        now_ms: u64,
        visible: bool,
    ) -> Result<Option<TickOutcome>, TickError> {
        if !visible {
            return Ok(None);
        }
        self.tracker
            .tick(
                now_ms,
                &mut self.source,
                &mut self.detector,
                &self.table,
                &self.cam,
            )
            .map(Some)
    }
}

pub struct App {
    pipeline: Pipeline<CameraSource>,
    mesh: TriangleMesh,
    hud: HudState,
    renderer: SoftwareRenderer,
    window: Window,
    clock: Instant,
}

impl App {
    pub fn new(cfg: &AppConfig) -> Result<Self, AppError> {
        let mut mesh = TriangleMesh::load_obj(&cfg.model)?;
        mesh.unitize();
        mesh.scale(1.5 * MARKER_EDGE_LEN as f32);
        info!(
            "loaded mesh {} ({} vertices, {} triangles)",
            cfg.model.display(),
            mesh.positions.len(),
            mesh.faces.len()
        );

        let mut source = CameraSource::open()?;
        let (xsize, ysize) = source.size();

        let mut cam = CameraParams::load(&cfg.camera_params)?;
        if (cam.xsize as usize, cam.ysize as usize) != (xsize, ysize) {
            warn!(
                "camera parameter size {}x{} differs from image size {}x{}, rescaling",
                cam.xsize, cam.ysize, xsize, ysize
            );
            cam = cam.resized(xsize as u32, ysize as u32);
        }

        let params = match &cfg.detector_config {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(AppError::DetectorConfigIo)?;
                serde_json::from_str(&text)?
            }
            None => DetectorParams::default(),
        };
        // Debug display always starts off, whatever the config says.
        let detector = MarkerDetector::new(DetectorParams {
            debug: false,
            ..params
        });

        let mut table = PatternTable::new();
        let marker_id = table.load_pattern(&cfg.pattern)?;
        info!("loaded pattern {} as id {}", cfg.pattern.display(), marker_id.0);

        source.start()?;

        let window = Window::new(
            "marker-ar",
            cfg.width,
            cfg.height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )?;
        let renderer = SoftwareRenderer::new(cfg.width, cfg.height);

        let tracker = Tracker::new(marker_id, MARKER_EDGE_LEN, PathBuf::from("."));

        Ok(Self {
            pipeline: Pipeline {
                source,
                detector,
                table,
                cam,
                tracker,
            },
            mesh,
            hud: HudState::default(),
            renderer,
            window,
            clock: Instant::now(),
        })
    }

    pub fn run(&mut self) -> Result<(), AppError> {
        while self.window.is_open() {
            let now_ms = self.clock.elapsed().as_millis() as u64;

            let shift = self.window.is_key_down(Key::LeftShift)
                || self.window.is_key_down(Key::RightShift);
            let mut quit = false;
            for key in self.window.get_keys_pressed(KeyRepeat::No) {
                let Some(cmd) = input::command_for_key(key, shift) else {
                    continue;
                };
                quit |= input::apply(
                    cmd,
                    now_ms,
                    InputTargets {
                        params: &mut self.pipeline.detector.params,
                        state: &mut self.pipeline.tracker.state,
                        hud: &mut self.hud,
                        draw_mode: &mut self.renderer.draw_mode,
                    },
                );
            }
            if quit {
                break;
            }

            let (w, h) = self.window.get_size();
            if (w, h) != (self.renderer.width, self.renderer.height) {
                self.renderer.resize(w, h);
            }

            let visible = self.window.is_active();
            match self.pipeline.advance(now_ms, visible)? {
                Some(TickOutcome::Redraw) => {
                    self.render();
                    self.window.update_with_buffer(self.renderer.buffer(), w, h)?;
                }
                _ => self.window.update(),
            }
        }

        self.pipeline.source.stop();
        info!("shut down cleanly");
        Ok(())
    }

    /// Compose one frame: background, AR-registered mesh, HUD.
    fn render(&mut self) {
        let r = &mut self.renderer;
        r.clear();

        // Background: the detector's binarised image while the debug flag is
        // set, the live camera frame otherwise.
        if let Some(dbg) = self.pipeline.detector.debug_image() {
            r.blit_frame(&FrameView {
                width: dbg.width,
                height: dbg.height,
                format: PixelFormat::Gray8,
                data: &dbg.data,
            });
        } else if let Some(frame) = self.pipeline.source.current_frame() {
            r.blit_frame(&frame);
        }

        let state = &self.pipeline.tracker.state;
        if state.found {
            if let Some(pose) = &state.pose {
                let projection = self
                    .pipeline
                    .cam
                    .frustum_rh(VIEW_DISTANCE_MIN, VIEW_DISTANCE_MAX);
                let modelview =
                    marker_transform(pose, state.rotate_angle_deg, MARKER_EDGE_LEN * 0.5);
                r.draw_mesh(&self.mesh, &projection, &modelview);
            }
        }

        let (frame_w, frame_h) = self.pipeline.source.size();
        hud::draw(
            r,
            &self.hud,
            &hud::HudContext {
                frame_w,
                frame_h,
                params: &self.pipeline.detector.params,
                last_auto_thresh: self.pipeline.detector.last_threshold(),
            },
        );
    }
}
