use log::trace;
use nalgebra::Point2;
use thiserror::Error;

use marker_ar_core::{homography_from_4pt, sample_bilinear_rgb, FrameView, GrayImage};

use crate::label::{label_regions, trace_contour, MIN_REGION_AREA};
use crate::params::{DetectorParams, ImageProcMode};
use crate::pattern::{PatternId, PatternTable, PATTERN_SIZE};
use crate::quad::fit_quad;
use crate::threshold::binarize;

/// Candidates below this confidence are discarded.
pub const MIN_CONFIDENCE: f32 = 0.5;

/// One candidate marker detection, valid for the current frame only.
///
/// Corners are in full-frame pixels, clockwise, reordered so that corner 0
/// is the pattern's own top-left regardless of how the marker is rotated in
/// the image.
#[derive(Clone, Copy, Debug)]
pub struct MarkerHypothesis {
    pub id: PatternId,
    pub confidence: f32,
    pub corners: [Point2<f32>; 4],
}

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("frame buffer has {got} bytes, expected {expected}")]
    BadFrameBuffer { expected: usize, got: usize },
}

/// Square-marker detector.
///
/// Owns the tuning surface and scratch state (the last auto threshold and,
/// in debug mode, the last binarised image).
#[derive(Clone, Debug, Default)]
pub struct MarkerDetector {
    pub params: DetectorParams,
    last_threshold: Option<u8>,
    debug_image: Option<GrayImage>,
}

impl MarkerDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self {
            params,
            last_threshold: None,
            debug_image: None,
        }
    }

    /// The threshold used by the last `detect` call. `None` before the
    /// first frame and for the adaptive mode, which has no single value.
    pub fn last_threshold(&self) -> Option<u8> {
        self.last_threshold
    }

    /// Last binarised frame; retained only while the debug flag is set.
    pub fn debug_image(&self) -> Option<&GrayImage> {
        self.debug_image.as_ref()
    }

    /// Detect marker candidates in a frame and identify them against the
    /// pattern table.
    pub fn detect(
        &mut self,
        frame: &FrameView<'_>,
        table: &PatternTable,
    ) -> Result<Vec<MarkerHypothesis>, DetectError> {
        let expected = frame.width * frame.height * frame.format.bytes_per_pixel();
        if frame.data.len() != expected {
            return Err(DetectError::BadFrameBuffer {
                expected,
                got: frame.data.len(),
            });
        }

        let gray = match self.params.image_proc {
            ImageProcMode::FullFrame => frame.to_gray(),
            ImageProcMode::EvenField => frame.to_gray_even_field(),
        };
        let y_scale = match self.params.image_proc {
            ImageProcMode::FullFrame => 1.0f32,
            ImageProcMode::EvenField => 2.0,
        };

        let (mask, threshold) = binarize(&gray.view(), &self.params);
        if threshold.is_some() {
            self.last_threshold = threshold;
        }
        self.debug_image = self.params.debug.then(|| mask.to_gray());

        let mut hypotheses = Vec::new();
        for region in label_regions(&mask) {
            if region.area < MIN_REGION_AREA || region.touches_border {
                continue;
            }
            let contour = trace_contour(&mask, region.seed);
            let Some(quad) = fit_quad(&contour) else {
                continue;
            };

            // Back to full-frame coordinates before sampling the pattern.
            let corners = quad
                .corners
                .map(|c| Point2::new(c.x, c.y * y_scale));

            let Some(samples) = self.sample_pattern(frame, &corners) else {
                continue;
            };
            let Some((id, rotation, confidence)) =
                table.best_match(&samples, self.params.pattern_mode)
            else {
                continue;
            };
            if confidence < MIN_CONFIDENCE {
                continue;
            }

            // Rotate the corner ring so corner 0 is the pattern's top-left.
            let r = rotation as usize;
            let corners = [
                corners[r],
                corners[(r + 1) % 4],
                corners[(r + 2) % 4],
                corners[(r + 3) % 4],
            ];

            hypotheses.push(MarkerHypothesis {
                id,
                confidence,
                corners,
            });
        }

        trace!("frame yielded {} marker hypothesis(es)", hypotheses.len());
        Ok(hypotheses)
    }

    /// Sample the pattern interior of a quad as 16x16 B, G, R triples.
    fn sample_pattern(
        &self,
        frame: &FrameView<'_>,
        corners: &[Point2<f32>; 4],
    ) -> Option<Vec<[f32; 3]>> {
        let unit = [
            Point2::new(0.0f32, 0.0),
            Point2::new(1.0f32, 0.0),
            Point2::new(1.0f32, 1.0),
            Point2::new(0.0f32, 1.0),
        ];
        let h = homography_from_4pt(&unit, corners)?;

        let b = self.params.border_ratio.clamp(0.01, 0.45);
        let span = 1.0 - 2.0 * b;
        let mut samples = Vec::with_capacity(PATTERN_SIZE * PATTERN_SIZE);
        for iy in 0..PATTERN_SIZE {
            for ix in 0..PATTERN_SIZE {
                let u = b + span * (ix as f32 + 0.5) / PATTERN_SIZE as f32;
                let v = b + span * (iy as f32 + 0.5) / PATTERN_SIZE as f32;
                let p = h.apply(Point2::new(u, v));
                let [r, g, bl] = sample_bilinear_rgb(frame, p.x, p.y);
                samples.push([bl, g, r]);
            }
        }
        Some(samples)
    }
}
