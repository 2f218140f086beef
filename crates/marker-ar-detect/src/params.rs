use serde::{Deserialize, Serialize};

/// How the labelling threshold is chosen each frame.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum ThresholdMode {
    #[default]
    Manual,
    AutoMedian,
    AutoOtsu,
    AutoAdaptive,
}

impl ThresholdMode {
    /// Deterministic cycle used by the `a` key.
    pub fn next(self) -> Self {
        match self {
            ThresholdMode::Manual => ThresholdMode::AutoMedian,
            ThresholdMode::AutoMedian => ThresholdMode::AutoOtsu,
            ThresholdMode::AutoOtsu => ThresholdMode::AutoAdaptive,
            ThresholdMode::AutoAdaptive => ThresholdMode::Manual,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ThresholdMode::Manual => "MANUAL",
            ThresholdMode::AutoMedian => "AUTO_MEDIAN",
            ThresholdMode::AutoOtsu => "AUTO_OTSU",
            ThresholdMode::AutoAdaptive => "AUTO_ADAPTIVE",
        }
    }
}

/// Whether the detector works on the full frame or the even field only.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum ImageProcMode {
    #[default]
    FullFrame,
    EvenField,
}

impl ImageProcMode {
    pub fn next(self) -> Self {
        match self {
            ImageProcMode::FullFrame => ImageProcMode::EvenField,
            ImageProcMode::EvenField => ImageProcMode::FullFrame,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ImageProcMode::FullFrame => "full frame",
            ImageProcMode::EvenField => "even field only",
        }
    }
}

/// Template matching colour handling.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum PatternMode {
    #[default]
    TemplateColor,
    TemplateMono,
}

impl PatternMode {
    pub fn next(self) -> Self {
        match self {
            PatternMode::TemplateColor => PatternMode::TemplateMono,
            PatternMode::TemplateMono => PatternMode::TemplateColor,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PatternMode::TemplateColor => "Colour template (pattern)",
            PatternMode::TemplateMono => "Mono template (pattern)",
        }
    }
}

/// The detector tuning surface mutated by the interactive key bindings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectorParams {
    #[serde(default)]
    pub thresh_mode: ThresholdMode,
    /// Labelling threshold used in manual mode, always in [0, 255].
    #[serde(default = "default_manual_thresh")]
    pub manual_thresh: u8,
    #[serde(default)]
    pub image_proc: ImageProcMode,
    #[serde(default)]
    pub pattern_mode: PatternMode,
    /// Fraction of the marker edge taken up by the black border on each
    /// side; the pattern occupies the remaining interior.
    #[serde(default = "default_border_ratio")]
    pub border_ratio: f32,
    /// When set, the detector keeps its binarised image around for display.
    #[serde(default)]
    pub debug: bool,
}

fn default_manual_thresh() -> u8 {
    100
}

fn default_border_ratio() -> f32 {
    0.25
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            thresh_mode: ThresholdMode::default(),
            manual_thresh: default_manual_thresh(),
            image_proc: ImageProcMode::default(),
            pattern_mode: PatternMode::default(),
            border_ratio: default_border_ratio(),
            debug: false,
        }
    }
}

impl DetectorParams {
    /// Adjust the manual threshold by `delta`, saturating at 0 and 255.
    pub fn nudge_manual_thresh(&mut self, delta: i16) {
        self.manual_thresh = (self.manual_thresh as i16 + delta).clamp(0, 255) as u8;
    }
}
