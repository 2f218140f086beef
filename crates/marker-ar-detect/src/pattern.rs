//! Pattern templates and normalised-correlation matching.
//!
//! Pattern files are the classic text format: one 16x16 template stored
//! four times (once per 90-degree rotation), each rotation as three colour
//! planes (B, G, R) of 16 rows with 16 integers in 0..=255.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::params::PatternMode;

/// Template edge length in samples.
pub const PATTERN_SIZE: usize = 16;

const PLANE_LEN: usize = PATTERN_SIZE * PATTERN_SIZE;
const COLOR_LEN: usize = 3 * PLANE_LEN;
const FILE_VALUES: usize = 4 * COLOR_LEN;

/// Identity assigned to a loaded pattern, sequential from 0.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct PatternId(pub u32);

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("unable to read pattern file: {0}")]
    Io(#[from] std::io::Error),

    #[error("pattern file has {got} values, expected {expected}")]
    BadValueCount { got: usize, expected: usize },

    #[error("pattern value {token:?} is not an integer in 0..=255")]
    BadValue { token: String },
}

/// Zero-mean template vector with its norm, one per rotation.
#[derive(Clone, Debug)]
struct TemplateSet {
    /// Colour vectors, concatenated B, G, R planes.
    color: [Vec<f32>; 4],
    color_norm: [f32; 4],
    /// Channel-averaged vectors.
    mono: [Vec<f32>; 4],
    mono_norm: [f32; 4],
}

/// Registered marker templates.
#[derive(Clone, Debug, Default)]
pub struct PatternTable {
    templates: Vec<TemplateSet>,
}

impl PatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Load a pattern file and register it, returning its id.
    pub fn load_pattern(&mut self, path: &Path) -> Result<PatternId, PatternError> {
        let text = fs::read_to_string(path)?;
        self.parse_pattern(&text)
    }

    /// Parse a pattern body and register it, returning its id.
    pub fn parse_pattern(&mut self, text: &str) -> Result<PatternId, PatternError> {
        let mut values = Vec::with_capacity(FILE_VALUES);
        for token in text.split_whitespace() {
            let v: u16 = token.parse().map_err(|_| PatternError::BadValue {
                token: token.to_string(),
            })?;
            if v > 255 {
                return Err(PatternError::BadValue {
                    token: token.to_string(),
                });
            }
            values.push(v as f32);
        }
        if values.len() != FILE_VALUES {
            return Err(PatternError::BadValueCount {
                got: values.len(),
                expected: FILE_VALUES,
            });
        }

        let mut color: [Vec<f32>; 4] = Default::default();
        let mut color_norm = [0.0f32; 4];
        let mut mono: [Vec<f32>; 4] = Default::default();
        let mut mono_norm = [0.0f32; 4];

        for rot in 0..4 {
            let plane = &values[rot * COLOR_LEN..(rot + 1) * COLOR_LEN];
            let (c, cn) = normalise(plane);
            color[rot] = c;
            color_norm[rot] = cn;

            let avg: Vec<f32> = (0..PLANE_LEN)
                .map(|i| (plane[i] + plane[PLANE_LEN + i] + plane[2 * PLANE_LEN + i]) / 3.0)
                .collect();
            let (m, mn) = normalise(&avg);
            mono[rot] = m;
            mono_norm[rot] = mn;
        }

        let id = PatternId(self.templates.len() as u32);
        self.templates.push(TemplateSet {
            color,
            color_norm,
            mono,
            mono_norm,
        });
        Ok(id)
    }

    /// Match a sampled candidate against every registered pattern.
    ///
    /// `samples` holds `PATTERN_SIZE`^2 B, G, R triples in row-major order.
    /// Returns the best (id, rotation, confidence); confidence is the
    /// normalised cross-correlation clamped to [0, 1].
    pub fn best_match(
        &self,
        samples: &[[f32; 3]],
        mode: PatternMode,
    ) -> Option<(PatternId, u8, f32)> {
        debug_assert_eq!(samples.len(), PLANE_LEN);

        let probe: Vec<f32> = match mode {
            PatternMode::TemplateColor => {
                // Concatenated planes, matching the template layout.
                let mut v = Vec::with_capacity(COLOR_LEN);
                for c in 0..3 {
                    v.extend(samples.iter().map(|s| s[c]));
                }
                v
            }
            PatternMode::TemplateMono => samples
                .iter()
                .map(|s| (s[0] + s[1] + s[2]) / 3.0)
                .collect(),
        };
        let (probe, probe_norm) = normalise(&probe);
        if probe_norm < 1e-6 {
            return None; // featureless sample
        }

        let mut best: Option<(PatternId, u8, f32)> = None;
        for (idx, template) in self.templates.iter().enumerate() {
            for rot in 0..4 {
                let (t, t_norm) = match mode {
                    PatternMode::TemplateColor => (&template.color[rot], template.color_norm[rot]),
                    PatternMode::TemplateMono => (&template.mono[rot], template.mono_norm[rot]),
                };
                if t_norm < 1e-6 {
                    continue;
                }
                let dot: f32 = probe.iter().zip(t.iter()).map(|(a, b)| a * b).sum();
                let corr = dot / (probe_norm * t_norm);
                if best.map(|(_, _, c)| corr > c).unwrap_or(true) {
                    best = Some((PatternId(idx as u32), rot as u8, corr));
                }
            }
        }

        best.map(|(id, rot, corr)| (id, rot, corr.clamp(0.0, 1.0)))
    }
}

/// Subtract the mean; return the centred vector and its Euclidean norm.
fn normalise(values: &[f32]) -> (Vec<f32>, f32) {
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    let centred: Vec<f32> = values.iter().map(|v| v - mean).collect();
    let norm = centred.iter().map(|v| v * v).sum::<f32>().sqrt();
    (centred, norm)
}
