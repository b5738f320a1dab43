use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;

use indicatif::ProgressStyle;
use tracing::{info, info_span, warn};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use marker_drift::camera::CameraSource;
use marker_drift::config::*;
use marker_drift::dataset::Dataset;
use marker_drift::detector::{QrDetector, RecordedDetector};
use marker_drift::frame::FrameSource;
use marker_drift::recording::Recorder;
use marker_drift::session::{Session, SessionSummary};
use marker_drift::visualization::{forward_line_commands, LogPresenter, WindowPresenter};

#[derive(Parser)]
pub struct Args {
    /// Capture device index
    #[clap(long, default_value = "0")]
    pub camera: i32,
    /// Replay recorded detections from a JSONL file instead of capturing
    #[clap(long)]
    pub replay: Option<PathBuf>,
    /// Save the session to a rerun .rrd file
    #[clap(long)]
    pub record: Option<PathBuf>,
    /// Log status changes instead of opening a window
    #[clap(long)]
    pub headless: bool,
    #[clap(flatten)]
    pub config: Config,
}

fn main() -> Result<()> {
    let args = Args::parse();
    args.config.validate()?;

    // setup logging
    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stdout_writer()))
        .with(indicatif_layer)
        .init();

    let recorder = args.record.as_deref().map(Recorder::save).transpose()?;
    let (tx, rx) = mpsc::channel();

    info!(
        "tracking {:?} in {:?} mode, reporting in {}",
        args.config.target_payload,
        args.config.mode,
        args.config.unit.label()
    );

    let summary = if let Some(path) = &args.replay {
        let dataset = Dataset::open(path, tx)?;

        let header_span = info_span!("header");
        header_span.pb_set_style(&ProgressStyle::default_bar());
        header_span.pb_set_length(dataset.length().unwrap_or(0));
        let _header_span_enter = header_span.enter();

        Session::new(&args.config, dataset, RecordedDetector, LogPresenter::new(recorder), rx)?.run()?
    } else {
        let camera = CameraSource::open(args.camera)?;
        let detector = QrDetector::new()?;
        if args.headless {
            print_instructions(&args.config, true);
            std::thread::spawn(move || {
                if let Err(e) = forward_line_commands(std::io::stdin().lock(), &tx) {
                    warn!("command input closed: {e}");
                }
            });
            Session::new(&args.config, camera, detector, LogPresenter::new(recorder), rx)?.run()?
        } else {
            let presenter = WindowPresenter::new("Marker Drift Monitor", tx, recorder)?;
            print_instructions(&args.config, false);
            Session::new(&args.config, camera, detector, presenter, rx)?.run()?
        }
    };

    report(&summary);
    Ok(())
}

fn print_instructions(config: &Config, headless: bool) {
    let (set, reset, quit) = if headless {
        ("type 'c' and Enter", "type 'r' and Enter", "type 'q' and Enter")
    } else {
        ("press 'c'", "press 'r'", "press 'q'")
    };
    println!("Instructions:");
    match config.mode {
        ModeKind::Manual => {
            println!("  - Point the camera at the printed marker.");
            println!("  - Then {set} to set the current position as the center point.");
        }
        ModeKind::Dual => {
            println!("  - Point the camera at both markers.");
            println!("  - The center marker sets the reference position automatically.");
        }
    }
    println!("  - To reset the center, {reset}.");
    println!("  - To quit, {quit}.");
    println!(
        "  - The marker counts as still after {}s within {}mm",
        config.still_time, config.movement_threshold_mm
    );
}

fn report(summary: &SessionSummary) {
    match summary.last_status {
        Some(status) => info!("{} frames processed, last status: {status}", summary.frames),
        None => info!("{} frames processed, no status emitted", summary.frames),
    }
}
