//! edgecam - real-time Sobel edge detection over a camera or file stream
//!
//! Runs the frame pipeline until the user quits or the source ends:
//! acquire, transform at the live threshold, stamp the measured fps,
//! present both streams, and optionally persist the processed stream.

use anyhow::Result;
use clap::Parser;

use edgecam::config::EdgecamConfig;
use edgecam::control::ThresholdControl;
use edgecam::display::HeadlessPresenter;
use edgecam::pipeline::{PipelineLoop, PipelineReport};
use edgecam::record::{AviRecorder, Recorder};
use edgecam::source::{create_source, Selector};
use edgecam::transform::SobelCpu;
use edgecam::DEFAULT_THRESHOLD;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Source selector: cam:<index> (default cam:0), a video file path, or
    /// stub://<name> for the synthetic source.
    source: Option<String>,

    /// Persist the processed stream to the configured output file.
    #[arg(long)]
    save: bool,

    /// Initial edge-detection threshold (0-255).
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: u8,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(report) => {
            println!(
                "edgecam: {:?} after {} frames",
                report.reason, report.frames_processed
            );
        }
        Err(err) => {
            log::error!("{err:#}");
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<PipelineReport> {
    let cfg = EdgecamConfig::load()?;
    let selector = Selector::parse(args.source.as_deref())?;

    println!("edgecam: Sobel edge detection, source {selector}");
    println!("edgecam: quit with Ctrl-C");
    if args.save {
        println!("edgecam: recording enabled, saving to {}", cfg.record_path);
    }

    let source = create_source(&selector, &cfg.capture)?;
    let transform = Box::new(SobelCpu::new());
    let presenter = Box::new(HeadlessPresenter::new());
    let recorder: Option<Box<dyn Recorder>> = if args.save {
        Some(Box::new(AviRecorder::new(&cfg.record_path)))
    } else {
        None
    };
    let threshold = ThresholdControl::new(args.threshold);

    let mut pipeline = PipelineLoop::new(source, transform, presenter, recorder, threshold)
        .with_poll_timeout(cfg.poll_timeout);
    pipeline.run()
}
