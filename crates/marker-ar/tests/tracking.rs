//! End-to-end tests of the tracking loop over in-memory frames: rate
//! gating, rotation timing, marker acquisition and loss, frame capture and
//! visibility handling, all with a scripted clock.

use std::path::PathBuf;

use marker_ar::app::Pipeline;
use marker_ar::source::StillSource;
use marker_ar::tracker::{TickOutcome, Tracker};
use marker_ar::MARKER_EDGE_LEN;
use marker_ar_core::{CameraParams, PixelFormat};
use marker_ar_detect::{DetectorParams, MarkerDetector, PatternTable, PATTERN_SIZE};

const FRAME_W: usize = 160;
const FRAME_H: usize = 120;
const MARKER_X: usize = 40;
const MARKER_Y: usize = 28;
const MARKER_SIDE: usize = 64;

/// A deliberately rotation-asymmetric 16x16 glyph, dark on light.
fn glyph_plane() -> [f32; PATTERN_SIZE * PATTERN_SIZE] {
    let mut plane = [220.0f32; PATTERN_SIZE * PATTERN_SIZE];
    for y in 2..14 {
        for x in 2..5 {
            plane[y * PATTERN_SIZE + x] = 30.0;
        }
    }
    for y in 11..14 {
        for x in 2..12 {
            plane[y * PATTERN_SIZE + x] = 30.0;
        }
    }
    plane
}

/// Rotate a plane clockwise by `rot` quarter turns.
fn rotate_plane(
    plane: &[f32; PATTERN_SIZE * PATTERN_SIZE],
    rot: usize,
) -> [f32; PATTERN_SIZE * PATTERN_SIZE] {
    let n = PATTERN_SIZE;
    let mut out = *plane;
    for _ in 0..rot % 4 {
        let src = out;
        for y in 0..n {
            for x in 0..n {
                out[y * n + x] = src[(n - 1 - x) * n + y];
            }
        }
    }
    out
}

/// The four-rotation pattern file body for the glyph.
fn glyph_file_body() -> String {
    let base = glyph_plane();
    let mut out = String::new();
    for rot in 0..4 {
        let plane = rotate_plane(&base, rot);
        for _channel in 0..3 {
            for y in 0..PATTERN_SIZE {
                let row: Vec<String> = (0..PATTERN_SIZE)
                    .map(|x| format!("{:3}", plane[y * PATTERN_SIZE + x] as u32))
                    .collect();
                out.push_str(&row.join(" "));
                out.push('\n');
            }
        }
        out.push('\n');
    }
    out
}

/// An all-white RGB frame.
fn blank_frame() -> Vec<u8> {
    vec![255u8; FRAME_W * FRAME_H * 3]
}

/// An RGB frame with one upright marker: black border, glyph interior.
fn marker_frame() -> Vec<u8> {
    let pattern = glyph_plane();
    let mut data = blank_frame();
    for py in 0..MARKER_SIDE {
        for px in 0..MARKER_SIDE {
            let u = (px as f32 + 0.5) / MARKER_SIDE as f32;
            let v = (py as f32 + 0.5) / MARKER_SIDE as f32;
            let value = if !(0.25..0.75).contains(&u) || !(0.25..0.75).contains(&v) {
                0u8
            } else {
                let ix = ((u - 0.25) / 0.5 * PATTERN_SIZE as f32) as usize;
                let iy = ((v - 0.25) / 0.5 * PATTERN_SIZE as f32) as usize;
                pattern[iy.min(PATTERN_SIZE - 1) * PATTERN_SIZE + ix.min(PATTERN_SIZE - 1)] as u8
            };
            let i = ((MARKER_Y + py) * FRAME_W + MARKER_X + px) * 3;
            data[i] = value;
            data[i + 1] = value;
            data[i + 2] = value;
        }
    }
    data
}

fn test_camera() -> CameraParams {
    CameraParams {
        xsize: FRAME_W as u32,
        ysize: FRAME_H as u32,
        mat: [
            [150.0, 0.0, 80.0, 0.0],
            [0.0, 150.0, 60.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ],
        dist: [80.0, 60.0, 0.0, 1.0],
    }
}

fn pipeline(data: Vec<u8>, capture_dir: PathBuf) -> Pipeline<StillSource> {
    let mut source = StillSource::new(FRAME_W, FRAME_H, PixelFormat::Rgb8, data);
    source.start().expect("start source");

    let mut table = PatternTable::new();
    let marker_id = table.parse_pattern(&glyph_file_body()).expect("pattern");

    Pipeline {
        source,
        detector: MarkerDetector::new(DetectorParams::default()),
        table,
        cam: test_camera(),
        tracker: Tracker::new(marker_id, MARKER_EDGE_LEN, capture_dir),
    }
}

#[test]
fn blank_frame_leaves_found_false() {
    let mut p = pipeline(blank_frame(), PathBuf::from("."));
    let outcome = p.advance(0, true).expect("tick");
    assert_eq!(outcome, Some(TickOutcome::Redraw));
    assert!(!p.tracker.state.found);
    assert!(p.tracker.state.pose.is_none());
}

#[test]
fn rate_gate_spaces_accepted_ticks_by_ten_ms() {
    let mut p = pipeline(blank_frame(), PathBuf::from("."));

    assert_eq!(p.advance(0, true).expect("tick"), Some(TickOutcome::Redraw));
    assert_eq!(
        p.advance(5, true).expect("tick"),
        Some(TickOutcome::RateGated)
    );
    assert_eq!(p.source.pulls(), 1, "a gated tick must not pull a frame");
    assert_eq!(p.advance(12, true).expect("tick"), Some(TickOutcome::Redraw));
    assert_eq!(p.source.pulls(), 2);
}

#[test]
fn rotation_advances_forty_five_degrees_per_second() {
    let mut p = pipeline(blank_frame(), PathBuf::from("."));
    assert!(p.tracker.state.rotate_enabled, "rotation starts enabled");

    p.advance(0, true).expect("tick");
    assert_eq!(p.tracker.state.rotate_angle_deg, 0.0);

    p.advance(1000, true).expect("tick");
    assert!((p.tracker.state.rotate_angle_deg - 45.0).abs() < 1e-3);
}

#[test]
fn rotation_wraps_modulo_360() {
    let mut p = pipeline(blank_frame(), PathBuf::from("."));
    p.advance(0, true).expect("tick");
    p.tracker.state.rotate_angle_deg = 350.0;

    p.advance(1000, true).expect("tick");
    let angle = p.tracker.state.rotate_angle_deg;
    assert!((angle - 35.0).abs() < 1e-3, "angle = {angle}");
    assert!((0.0..360.0).contains(&angle));
}

#[test]
fn disabled_rotation_keeps_the_angle() {
    let mut p = pipeline(blank_frame(), PathBuf::from("."));
    p.tracker.state.rotate_enabled = false;
    p.advance(0, true).expect("tick");
    p.advance(1000, true).expect("tick");
    assert_eq!(p.tracker.state.rotate_angle_deg, 0.0);
}

#[test]
fn marker_frame_sets_found_and_a_plausible_pose() {
    let mut p = pipeline(marker_frame(), PathBuf::from("."));
    p.advance(0, true).expect("tick");

    assert!(p.tracker.state.found);
    let pose = p.tracker.state.pose.expect("pose");
    // 80-unit marker spanning 64 px under f = 150 sits about 190 units out.
    let tz = pose.transform[2][3];
    assert!((150.0..230.0).contains(&tz), "tz = {tz}");
    assert!(pose.residual < 2.0, "residual = {}", pose.residual);
}

#[test]
fn losing_the_marker_reverts_found() {
    let mut p = pipeline(marker_frame(), PathBuf::from("."));
    p.advance(0, true).expect("tick");
    assert!(p.tracker.state.found);

    p.source.set_data(blank_frame());
    p.advance(20, true).expect("tick");
    assert!(!p.tracker.state.found);
}

#[test]
fn capture_writes_sequentially_named_jpegs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut p = pipeline(blank_frame(), dir.path().to_path_buf());

    p.tracker.state.capture_requested = true;
    p.advance(0, true).expect("tick");
    assert!(!p.tracker.state.capture_requested, "request cleared");
    assert_eq!(p.tracker.state.capture_seq, 1);
    assert!(dir.path().join("image-0000.jpg").is_file());

    p.tracker.state.capture_requested = true;
    p.advance(20, true).expect("tick");
    assert_eq!(p.tracker.state.capture_seq, 2);
    assert!(dir.path().join("image-0001.jpg").is_file());
}

#[test]
fn capture_failure_is_logged_not_fatal() {
    let mut p = pipeline(blank_frame(), PathBuf::from("/definitely/not/a/dir"));

    p.tracker.state.capture_requested = true;
    let outcome = p.advance(0, true).expect("tick survives a failed save");
    assert_eq!(outcome, Some(TickOutcome::Redraw));
    assert!(!p.tracker.state.capture_requested, "request cleared anyway");
    assert_eq!(p.tracker.state.capture_seq, 1, "counter still advances");
}

#[test]
fn hidden_window_pulls_no_frames() {
    let mut p = pipeline(blank_frame(), PathBuf::from("."));

    assert_eq!(p.advance(0, false).expect("advance"), None);
    assert_eq!(p.advance(20, false).expect("advance"), None);
    assert_eq!(p.source.pulls(), 0);

    assert_eq!(
        p.advance(40, true).expect("advance"),
        Some(TickOutcome::Redraw)
    );
    assert_eq!(p.source.pulls(), 1);
}

#[test]
fn no_frame_available_skips_the_tick() {
    let mut p = pipeline(blank_frame(), PathBuf::from("."));
    p.source.set_paused(true);
    assert_eq!(p.advance(0, true).expect("tick"), Some(TickOutcome::NoFrame));
    assert!(!p.tracker.state.found);

    p.source.set_paused(false);
    assert_eq!(p.advance(20, true).expect("tick"), Some(TickOutcome::Redraw));
}
