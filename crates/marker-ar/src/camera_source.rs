//! Live camera frame source backed by `kamera`.

use log::info;

use marker_ar_core::{FrameView, PixelFormat};

use crate::source::{FrameSource, SourceError};

/// Default camera device as a [`FrameSource`].
///
/// Frames are copied out of the capture callback into an internal buffer so
/// the borrow handed to the tracking loop has a well-defined lifetime.
pub struct CameraSource {
    camera: kamera::Camera,
    width: usize,
    height: usize,
    buffer: Vec<u8>,
    have_frame: bool,
}

impl CameraSource {
    /// Open the default device and probe its frame size and pixel format.
    pub fn open() -> Result<Self, SourceError> {
        let camera = kamera::Camera::new_default_device();
        camera.start();

        // The device reports its geometry through the first frame.
        let Some(frame) = camera.wait_for_frame() else {
            camera.stop();
            return Err(SourceError::CameraProbe);
        };
        let (w, h) = frame.size_u32();
        if w == 0 || h == 0 {
            camera.stop();
            return Err(SourceError::UnsupportedFormat);
        }

        let width = w as usize;
        let height = h as usize;
        info!("camera image size (x,y) = ({width},{height}), format BGRA8");

        Ok(Self {
            camera,
            width,
            height,
            buffer: Vec::new(),
            have_frame: false,
        })
    }

    fn view(&self) -> FrameView<'_> {
        FrameView {
            width: self.width,
            height: self.height,
            format: PixelFormat::Bgra8,
            data: &self.buffer,
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        // Stopping an already-stopped device is harmless, so teardown stays
        // idempotent on both the clean and the error paths.
        self.camera.stop();
    }
}

impl FrameSource for CameraSource {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn pixel_format(&self) -> PixelFormat {
        // kamera delivers 32-bit frames with B, G, R, A byte order.
        PixelFormat::Bgra8
    }

    fn start(&mut self) -> Result<(), SourceError> {
        // Capture is already running from `open`; nothing more to begin.
        Ok(())
    }

    fn stop(&mut self) {
        self.camera.stop();
    }

    fn next_frame(&mut self) -> Option<FrameView<'_>> {
        let frame = self.camera.wait_for_frame()?;
        let (w, h) = frame.size_u32();
        if w as usize != self.width || h as usize != self.height {
            // Device renegotiated its format mid-stream; treat the frame as
            // unavailable rather than handing out mismatched geometry.
            log::warn!(
                "camera frame size changed from {}x{} to {}x{}, dropping frame",
                self.width,
                self.height,
                w,
                h
            );
            return None;
        }

        let data = frame.data();
        self.buffer.clear();
        self.buffer.extend_from_slice(data.data_u8());
        self.have_frame = true;
        Some(self.view())
    }

    fn current_frame(&self) -> Option<FrameView<'_>> {
        self.have_frame.then(|| self.view())
    }
}
