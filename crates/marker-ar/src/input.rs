//! Keystroke handling.
//!
//! Each binding maps to a [`Command`], a non-blocking mutation of the
//! detector parameters, the loop state, the HUD or the renderer draw mode.
//! Unknown keys map to nothing.

use log::info;
use minifb::Key;

use marker_ar_detect::DetectorParams;

use crate::hud::HudState;
use crate::render::DrawMode;
use crate::tracker::LoopState;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    Quit,
    ToggleRotation,
    ToggleHelp,
    ToggleModePanel,
    ToggleDebug,
    CycleThreshMode,
    NudgeThresh(i16),
    CycleImageProc,
    /// Also prints the frame rate since the last cycle and resets it.
    CycleDrawMode,
    RequestCapture,
}

/// Resolve a typed character to its command. Letters are case-insensitive.
pub fn command_for_char(c: char) -> Option<Command> {
    match c {
        'q' | 'Q' | '\u{1b}' => Some(Command::Quit),
        ' ' => Some(Command::ToggleRotation),
        '?' | '/' => Some(Command::ToggleHelp),
        'm' | 'M' => Some(Command::ToggleModePanel),
        'd' | 'D' => Some(Command::ToggleDebug),
        'a' | 'A' => Some(Command::CycleThreshMode),
        '-' => Some(Command::NudgeThresh(-5)),
        '+' | '=' => Some(Command::NudgeThresh(5)),
        'x' | 'X' => Some(Command::CycleImageProc),
        'c' | 'C' => Some(Command::CycleDrawMode),
        's' | 'S' => Some(Command::RequestCapture),
        _ => None,
    }
}

/// Resolve a window key event to its command.
pub fn command_for_key(key: Key, shift: bool) -> Option<Command> {
    let c = match key {
        Key::Escape => '\u{1b}',
        Key::Q => 'q',
        Key::Space => ' ',
        Key::Slash => {
            if shift {
                '?'
            } else {
                '/'
            }
        }
        Key::Minus | Key::NumPadMinus => '-',
        Key::Equal => {
            if shift {
                '+'
            } else {
                '='
            }
        }
        Key::NumPadPlus => '+',
        Key::A => 'a',
        Key::C => 'c',
        Key::D => 'd',
        Key::M => 'm',
        Key::S => 's',
        Key::X => 'x',
        _ => return None,
    };
    command_for_char(c)
}

/// The mutable state a command may touch.
pub struct InputTargets<'a> {
    pub params: &'a mut DetectorParams,
    pub state: &'a mut LoopState,
    pub hud: &'a mut HudState,
    pub draw_mode: &'a mut DrawMode,
}

/// Apply one command. Returns true when the program should shut down.
pub fn apply(cmd: Command, now_ms: u64, t: InputTargets<'_>) -> bool {
    match cmd {
        Command::Quit => return true,
        Command::ToggleRotation => t.state.rotate_enabled = !t.state.rotate_enabled,
        Command::ToggleHelp => t.hud.toggle_help(),
        Command::ToggleModePanel => t.hud.show_mode = !t.hud.show_mode,
        Command::ToggleDebug => t.params.debug = !t.params.debug,
        Command::CycleThreshMode => t.params.thresh_mode = t.params.thresh_mode.next(),
        Command::NudgeThresh(delta) => t.params.nudge_manual_thresh(delta),
        Command::CycleImageProc => t.params.image_proc = t.params.image_proc.next(),
        Command::CycleDrawMode => {
            *t.draw_mode = t.draw_mode.next();
            let elapsed_s = now_ms.saturating_sub(t.state.fps_timer_ms) as f64 * 1e-3;
            if elapsed_s > 0.0 {
                info!(
                    "*** camera - {:.1} (frames/sec)",
                    t.state.detect_count as f64 / elapsed_s
                );
            }
            t.state.detect_count = 0;
            t.state.fps_timer_ms = now_ms;
        }
        Command::RequestCapture => t.state.capture_requested = true,
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use marker_ar_detect::ThresholdMode;

    fn targets<'a>(
        params: &'a mut DetectorParams,
        state: &'a mut LoopState,
        hud: &'a mut HudState,
        draw_mode: &'a mut DrawMode,
    ) -> InputTargets<'a> {
        InputTargets {
            params,
            state,
            hud,
            draw_mode,
        }
    }

    #[test]
    fn bindings_are_case_insensitive() {
        assert_eq!(command_for_char('q'), Some(Command::Quit));
        assert_eq!(command_for_char('Q'), Some(Command::Quit));
        assert_eq!(command_for_char('a'), command_for_char('A'));
        assert_eq!(command_for_char('x'), command_for_char('X'));
    }

    #[test]
    fn escape_question_mark_and_plus_aliases_resolve() {
        assert_eq!(command_for_char('\u{1b}'), Some(Command::Quit));
        assert_eq!(command_for_char('?'), Some(Command::ToggleHelp));
        assert_eq!(command_for_char('/'), Some(Command::ToggleHelp));
        assert_eq!(command_for_char('+'), Some(Command::NudgeThresh(5)));
        assert_eq!(command_for_char('='), Some(Command::NudgeThresh(5)));
        assert_eq!(command_for_char('-'), Some(Command::NudgeThresh(-5)));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        assert_eq!(command_for_char('z'), None);
        assert_eq!(command_for_char('5'), None);
        assert_eq!(command_for_key(Key::F1, false), None);
    }

    #[test]
    fn key_events_map_like_characters() {
        assert_eq!(command_for_key(Key::Escape, false), Some(Command::Quit));
        assert_eq!(command_for_key(Key::Slash, true), Some(Command::ToggleHelp));
        assert_eq!(
            command_for_key(Key::Equal, true),
            Some(Command::NudgeThresh(5))
        );
        assert_eq!(
            command_for_key(Key::NumPadMinus, false),
            Some(Command::NudgeThresh(-5))
        );
        assert_eq!(command_for_key(Key::Space, false), Some(Command::ToggleRotation));
    }

    #[test]
    fn toggles_round_trip() {
        let mut params = DetectorParams::default();
        let mut state = LoopState::default();
        let mut hud = HudState::default();
        let mut mode = DrawMode::default();

        let before_rotate = state.rotate_enabled;
        for _ in 0..2 {
            apply(
                Command::ToggleRotation,
                0,
                targets(&mut params, &mut state, &mut hud, &mut mode),
            );
        }
        assert_eq!(state.rotate_enabled, before_rotate);

        for _ in 0..2 {
            apply(
                Command::ToggleModePanel,
                0,
                targets(&mut params, &mut state, &mut hud, &mut mode),
            );
        }
        assert!(hud.show_mode);

        for _ in 0..2 {
            apply(
                Command::ToggleDebug,
                0,
                targets(&mut params, &mut state, &mut hud, &mut mode),
            );
        }
        assert!(!params.debug);
    }

    #[test]
    fn rings_return_after_full_cycles() {
        let mut params = DetectorParams::default();
        let mut state = LoopState::default();
        let mut hud = HudState::default();
        let mut mode = DrawMode::default();

        for _ in 0..4 {
            apply(
                Command::CycleThreshMode,
                0,
                targets(&mut params, &mut state, &mut hud, &mut mode),
            );
        }
        assert_eq!(params.thresh_mode, ThresholdMode::Manual);

        for _ in 0..3 {
            apply(
                Command::CycleDrawMode,
                0,
                targets(&mut params, &mut state, &mut hud, &mut mode),
            );
        }
        assert_eq!(mode, DrawMode::PixelCopy);

        for _ in 0..2 {
            apply(
                Command::CycleImageProc,
                0,
                targets(&mut params, &mut state, &mut hud, &mut mode),
            );
        }
        assert_eq!(params.image_proc, marker_ar_detect::ImageProcMode::FullFrame);
    }

    #[test]
    fn threshold_saturates_at_the_top() {
        let mut params = DetectorParams {
            manual_thresh: 253,
            ..DetectorParams::default()
        };
        let mut state = LoopState::default();
        let mut hud = HudState::default();
        let mut mode = DrawMode::default();

        for _ in 0..3 {
            apply(
                Command::NudgeThresh(5),
                0,
                targets(&mut params, &mut state, &mut hud, &mut mode),
            );
        }
        assert_eq!(params.manual_thresh, 255);
    }

    #[test]
    fn draw_mode_cycle_resets_the_fps_counter() {
        let mut params = DetectorParams::default();
        let mut state = LoopState {
            detect_count: 42,
            fps_timer_ms: 1000,
            ..LoopState::default()
        };
        let mut hud = HudState::default();
        let mut mode = DrawMode::default();

        apply(
            Command::CycleDrawMode,
            3000,
            targets(&mut params, &mut state, &mut hud, &mut mode),
        );
        assert_eq!(state.detect_count, 0);
        assert_eq!(state.fps_timer_ms, 3000);
        assert_eq!(mode, DrawMode::TextureFull);
    }

    #[test]
    fn capture_request_and_quit() {
        let mut params = DetectorParams::default();
        let mut state = LoopState::default();
        let mut hud = HudState::default();
        let mut mode = DrawMode::default();

        assert!(!apply(
            Command::RequestCapture,
            0,
            targets(&mut params, &mut state, &mut hud, &mut mode),
        ));
        assert!(state.capture_requested);

        assert!(apply(
            Command::Quit,
            0,
            targets(&mut params, &mut state, &mut hud, &mut mode),
        ));
    }
}
