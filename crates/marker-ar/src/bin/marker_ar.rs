//! Single-marker AR demo.
//!
//! Opens the default camera, tracks one printed square marker and draws a
//! textured mesh anchored to it over the live image. Press `?` in the window
//! for the key bindings.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, LevelFilter};

use marker_ar::app::{App, AppConfig};

#[derive(Parser, Debug)]
#[command(name = "marker-ar", version, about = "Track a printed square marker and overlay a 3D mesh")]
struct Cli {
    /// Camera intrinsics file (binary parameter format).
    #[arg(long, default_value = "Data/camera_para.dat")]
    camera_params: PathBuf,

    /// Marker pattern file.
    #[arg(long, default_value = "Data/patt.irc")]
    pattern: PathBuf,

    /// OBJ mesh drawn on the marker.
    #[arg(long, default_value = "Data/bunny.obj")]
    model: PathBuf,

    /// Window width in pixels.
    #[arg(long, default_value_t = 640)]
    width: usize,

    /// Window height in pixels.
    #[arg(long, default_value_t = 480)]
    height: usize,

    /// JSON file with initial detector parameters.
    #[arg(long)]
    detector_config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if marker_ar::core::init_with_level(level).is_err() {
        eprintln!("warning: logger already installed");
    }

    let cfg = AppConfig {
        camera_params: cli.camera_params,
        pattern: cli.pattern,
        model: cli.model,
        width: cli.width,
        height: cli.height,
        detector_config: cli.detector_config,
    };

    let mut app = match App::new(&cfg) {
        Ok(app) => app,
        Err(err) => {
            error!("startup failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    match app.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
