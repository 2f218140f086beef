//! Saving camera frames to disk.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use thiserror::Error;

use marker_ar_core::FrameView;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("unable to create capture file: {0}")]
    Io(#[from] std::io::Error),

    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Write a frame to `path` as a JPEG at the given quality.
pub fn save_frame_jpeg(
    frame: &FrameView<'_>,
    path: &Path,
    quality: u8,
) -> Result<(), CaptureError> {
    let mut rgb = Vec::with_capacity(frame.width * frame.height * 3);
    for y in 0..frame.height as i32 {
        for x in 0..frame.width as i32 {
            rgb.extend_from_slice(&frame.rgb(x, y));
        }
    }

    let writer = BufWriter::new(File::create(path)?);
    let encoder = JpegEncoder::new_with_quality(writer, quality);
    encoder.encode(
        &rgb,
        frame.width as u32,
        frame.height as u32,
        ExtendedColorType::Rgb8,
    )?;
    Ok(())
}
