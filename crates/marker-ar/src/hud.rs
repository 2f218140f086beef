//! On-screen help and status panels.
//!
//! Both panels anchor at the top-left window corner with a 2-pixel inset and
//! advance 12 pixels per line. The help panel sits on a half-transparent
//! black quad; the mode panel is bare text over the video.

use marker_ar_detect::{DetectorParams, ThresholdMode};

use crate::font::{text_width, LINE_HEIGHT};
use crate::render::{DrawMode, SoftwareRenderer};

/// Vertical advance between HUD lines, pixels.
const LINE_ADVANCE: usize = 12;
/// Inset of the panels from the window corner, pixels.
const INSET: usize = 2;

pub const HELP_LINES: [&str; 11] = [
    "Keys:",
    " ? or /        Show/hide this help.",
    " q or [esc]    Quit program.",
    " [space]       Start/stop the mesh rotation.",
    " d             Activate / deactivate debug mode.",
    " m             Toggle display of mode info.",
    " a             Toggle between available threshold modes.",
    " - and +       Adjust the manual threshold down/up by 5.",
    " x             Change image processing mode.",
    " c             Change the frame drawing mode.",
    " s             Save a JPEG of the next camera frame.",
];

/// Which overlay panels are visible.
#[derive(Clone, Copy, Debug)]
pub struct HudState {
    /// 0 or 1; kept numeric so further help pages could slot in.
    pub show_help: u8,
    pub show_mode: bool,
}

impl Default for HudState {
    fn default() -> Self {
        Self {
            show_help: 1,
            show_mode: true,
        }
    }
}

impl HudState {
    /// Advance the help page, wrapping back to hidden after the last one.
    pub fn toggle_help(&mut self) {
        self.show_help = if self.show_help > 0 { 0 } else { 1 };
    }
}

/// Backing quad size for the help panel: as wide as the longest line, as
/// tall as the stacked line boxes with 2-pixel spacing between them.
pub fn help_panel_size() -> (usize, usize) {
    let widest = HELP_LINES.iter().map(|l| text_width(l)).max().unwrap_or(0);
    let n = HELP_LINES.len();
    (widest, n * LINE_HEIGHT + (n - 1) * 2)
}

/// Read-only snapshot of the state the mode panel reports.
pub struct HudContext<'a> {
    pub frame_w: usize,
    pub frame_h: usize,
    pub params: &'a DetectorParams,
    /// Last auto-computed threshold, if the detector has produced one.
    pub last_auto_thresh: Option<u8>,
}

/// The four status lines of the mode panel.
pub fn mode_lines(ctx: &HudContext<'_>, draw_mode: DrawMode, win_w: usize, win_h: usize) -> [String; 4] {
    let params = ctx.params;

    // Every mode except adaptive has a single threshold value to show; the
    // auto modes report the value computed on the last frame.
    let thresh = match params.thresh_mode {
        ThresholdMode::Manual => Some(params.manual_thresh),
        ThresholdMode::AutoAdaptive => None,
        ThresholdMode::AutoMedian | ThresholdMode::AutoOtsu => {
            Some(ctx.last_auto_thresh.unwrap_or(params.manual_thresh))
        }
    };
    let mut thresh_line = format!("Threshold mode: {}", params.thresh_mode.label());
    if let Some(t) = thresh {
        thresh_line.push_str(&format!(", thresh={t}"));
    }

    [
        format!(
            "Processing {}x{} video frames {}",
            ctx.frame_w,
            ctx.frame_h,
            params.image_proc.label()
        ),
        thresh_line,
        format!(
            "Border: {:.1}%, Pattern detection mode: {}",
            f64::from(params.border_ratio) * 100.0,
            params.pattern_mode.label()
        ),
        format!("Drawing using {} into {win_w}x{win_h} window", draw_mode.label()),
    ]
}

/// Draw the visible panels into the renderer's 2D overlay.
pub fn draw(r: &mut SoftwareRenderer, hud: &HudState, ctx: &HudContext<'_>) {
    if hud.show_mode {
        let lines = mode_lines(ctx, r.draw_mode, r.width, r.height);
        for (i, line) in lines.iter().enumerate() {
            r.draw_text(INSET, i * LINE_ADVANCE + INSET, line);
        }
    }

    if hud.show_help == 1 {
        let (bw, bh) = help_panel_size();
        r.fill_rect_blend(INSET, INSET, bw, bh, [0, 0, 0], 0.5);
        for (i, line) in HELP_LINES.iter().enumerate() {
            r.draw_text(INSET, i * LINE_ADVANCE + INSET, line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::CHAR_WIDTH;
    use marker_ar_detect::{ImageProcMode, PatternMode};

    fn ctx(params: &DetectorParams, last_auto: Option<u8>) -> HudContext<'_> {
        HudContext {
            frame_w: 640,
            frame_h: 480,
            params,
            last_auto_thresh: last_auto,
        }
    }

    #[test]
    fn help_panel_metrics_follow_the_line_count() {
        let (w, h) = help_panel_size();
        let n = HELP_LINES.len();
        assert_eq!(h, n * 10 + (n - 1) * 2);

        let widest = HELP_LINES.iter().map(|l| l.chars().count()).max().unwrap();
        assert_eq!(w, widest * CHAR_WIDTH);
    }

    #[test]
    fn toggling_help_twice_round_trips() {
        let mut hud = HudState::default();
        assert_eq!(hud.show_help, 1);
        hud.toggle_help();
        assert_eq!(hud.show_help, 0);
        hud.toggle_help();
        assert_eq!(hud.show_help, 1);
    }

    #[test]
    fn manual_mode_reports_the_manual_threshold() {
        let params = DetectorParams::default();
        let lines = mode_lines(&ctx(&params, None), DrawMode::PixelCopy, 640, 480);
        assert_eq!(lines[0], "Processing 640x480 video frames full frame");
        assert_eq!(lines[1], "Threshold mode: MANUAL, thresh=100");
        assert_eq!(
            lines[2],
            "Border: 25.0%, Pattern detection mode: Colour template (pattern)"
        );
        assert_eq!(lines[3], "Drawing using pixel copy into 640x480 window");
    }

    #[test]
    fn auto_modes_report_the_last_computed_threshold() {
        let params = DetectorParams {
            thresh_mode: ThresholdMode::AutoOtsu,
            ..DetectorParams::default()
        };
        let lines = mode_lines(&ctx(&params, Some(132)), DrawMode::PixelCopy, 640, 480);
        assert_eq!(lines[1], "Threshold mode: AUTO_OTSU, thresh=132");
    }

    #[test]
    fn adaptive_mode_hides_the_threshold() {
        let params = DetectorParams {
            thresh_mode: ThresholdMode::AutoAdaptive,
            ..DetectorParams::default()
        };
        let lines = mode_lines(&ctx(&params, Some(132)), DrawMode::PixelCopy, 640, 480);
        assert_eq!(lines[1], "Threshold mode: AUTO_ADAPTIVE");
    }

    #[test]
    fn mode_lines_follow_the_rings() {
        let params = DetectorParams {
            image_proc: ImageProcMode::EvenField,
            pattern_mode: PatternMode::TemplateMono,
            ..DetectorParams::default()
        };
        let lines = mode_lines(&ctx(&params, None), DrawMode::TextureHalf, 800, 600);
        assert_eq!(lines[0], "Processing 640x480 video frames even field only");
        assert!(lines[2].ends_with("Mono template (pattern)"));
        assert_eq!(
            lines[3],
            "Drawing using texture mapping (even field only) into 800x600 window"
        );
    }

    #[test]
    fn draw_renders_both_panels_without_panicking() {
        let mut r = SoftwareRenderer::new(320, 240);
        r.clear();
        let params = DetectorParams::default();
        draw(&mut r, &HudState::default(), &ctx(&params, None));
        assert!(r.buffer().iter().any(|p| *p == 0x00ff_ffff));
    }
}
