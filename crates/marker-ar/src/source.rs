//! Frame sources.
//!
//! A [`FrameSource`] hands out borrowed [`FrameView`]s: the pixel buffer
//! belongs to the source and a view stays valid only until `next_frame` is
//! called again, which the borrow checker enforces (`next_frame` takes
//! `&mut self` while a view borrows `&self`).

use thiserror::Error;

use marker_ar_core::{FrameView, PixelFormat};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("unable to open a connection to the camera")]
    CameraOpen,

    #[error("camera produced no frame while probing its format")]
    CameraProbe,

    #[error("camera is using an unsupported pixel format")]
    UnsupportedFormat,

    #[error("camera frame size changed from {from_w}x{from_h} to {to_w}x{to_h}")]
    SizeChanged {
        from_w: usize,
        from_h: usize,
        to_w: usize,
        to_h: usize,
    },
}

pub trait FrameSource {
    /// Frame size in pixels, known after the source is opened.
    fn size(&self) -> (usize, usize);

    fn pixel_format(&self) -> PixelFormat;

    /// Begin capture. Must be called before the first `next_frame`.
    fn start(&mut self) -> Result<(), SourceError>;

    fn stop(&mut self);

    /// Pull the next frame. `None` means no frame is available this tick,
    /// which is transient.
    fn next_frame(&mut self) -> Option<FrameView<'_>>;

    /// The frame handed out by the last `next_frame` call, for the draw that
    /// follows a tick. `None` before the first pull.
    fn current_frame(&self) -> Option<FrameView<'_>>;
}

/// In-memory source that serves the same frame over and over. Used by the
/// tests and handy for running the pipeline headless.
#[derive(Clone, Debug)]
pub struct StillSource {
    width: usize,
    height: usize,
    format: PixelFormat,
    data: Vec<u8>,
    started: bool,
    paused: bool,
    pulled_once: bool,
    pulls: u64,
}

impl StillSource {
    pub fn new(width: usize, height: usize, format: PixelFormat, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), width * height * format.bytes_per_pixel());
        Self {
            width,
            height,
            format,
            data,
            started: false,
            paused: false,
            pulled_once: false,
            pulls: 0,
        }
    }

    /// While paused, `next_frame` reports no frame available.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Replace the served pixels (size and format must not change).
    pub fn set_data(&mut self, data: Vec<u8>) {
        assert_eq!(data.len(), self.data.len());
        self.data = data;
    }

    /// Number of `next_frame` calls that returned a frame.
    pub fn pulls(&self) -> u64 {
        self.pulls
    }

    fn view(&self) -> FrameView<'_> {
        FrameView {
            width: self.width,
            height: self.height,
            format: self.format,
            data: &self.data,
        }
    }
}

impl FrameSource for StillSource {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn start(&mut self) -> Result<(), SourceError> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn next_frame(&mut self) -> Option<FrameView<'_>> {
        if !self.started || self.paused {
            return None;
        }
        self.pulls += 1;
        self.pulled_once = true;
        Some(self.view())
    }

    fn current_frame(&self) -> Option<FrameView<'_>> {
        self.pulled_once.then(|| self.view())
    }
}
