//! Square-marker detection for the AR demo.
//!
//! The detector finds dark square borders in a camera frame, fits quads to
//! them and identifies each candidate by normalised cross-correlation
//! against a table of 16x16 pattern templates. Its behaviour is steered by
//! [`DetectorParams`], the surface the interactive key bindings mutate:
//! threshold mode, manual threshold, full-frame versus even-field
//! processing, colour versus mono template matching, border ratio and the
//! debug flag.

mod detector;
mod label;
mod params;
mod pattern;
mod quad;
mod threshold;

pub use detector::{DetectError, MarkerDetector, MarkerHypothesis, MIN_CONFIDENCE};
pub use params::{DetectorParams, ImageProcMode, PatternMode, ThresholdMode};
pub use pattern::{PatternError, PatternId, PatternTable, PATTERN_SIZE};
pub use quad::Quad;
pub use threshold::{adaptive_binarize, binarize, median_threshold, otsu_threshold, BinaryImage};
