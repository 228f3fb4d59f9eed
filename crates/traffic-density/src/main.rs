mod cli;

use std::{io, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use traffic_density::{
    DensityConfig, FrameProcessor, ImagePipeline, MediaKind, SharedDetector, VideoPipeline,
    VideoRunner,
    shell::{self, ShellCommand},
    telemetry,
};
use video_ingest::FfmpegBackend;

use crate::cli::{Cli, Command};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.verbose);
    let metrics_handle = telemetry::init_metrics_recorder();

    let mut config = match &cli.config {
        Some(path) => DensityConfig::from_json_file(path)?,
        None => DensityConfig::default(),
    };
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }

    let detector = build_detector(&cli)?;
    let classes = Arc::new(config.class_set());
    let mut stdout = io::stdout();

    match &cli.command {
        Command::Image { path, save } => {
            if MediaKind::from_path(path) != Some(MediaKind::Image) {
                warn!("{} does not look like an image file", path.display());
            }
            let processor = FrameProcessor::new(detector, classes, config.image_timing);
            let pipeline = ImagePipeline::new(processor);
            shell::show_image(&pipeline, path, save.as_deref(), &mut stdout)?;
        }
        Command::Video { path } => {
            if MediaKind::from_path(path) != Some(MediaKind::Video) {
                warn!("{} does not look like a video file", path.display());
            }
            let processor = FrameProcessor::new(detector, classes, config.video_timing);
            let backend = Arc::new(FfmpegBackend::default());
            let runner = VideoRunner::new(VideoPipeline::new(processor, backend, config.output_fps));

            let (command_tx, command_rx) = crossbeam_channel::unbounded();
            {
                let command_tx = command_tx.clone();
                if let Err(err) = ctrlc::set_handler(move || {
                    let _ = command_tx.send(ShellCommand::Exit);
                }) {
                    warn!("Failed to install Ctrl+C handler: {err}");
                }
            }
            shell::spawn_command_reader(io::BufReader::new(io::stdin()), command_tx)?;

            let output = config.output_path();
            match shell::play_video(&runner, path.clone(), output, &command_rx, &mut stdout)? {
                Some(summary) => info!(
                    frames = summary.frames_processed,
                    stopped_early = summary.stopped_early,
                    "Video run finished"
                ),
                None => warn!("Video pipeline still running at exit"),
            }
        }
    }

    if let Some(path) = &cli.metrics_file {
        std::fs::write(path, metrics_handle.render())
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
        info!("Metrics written to {}", path.display());
    }
    Ok(())
}

#[cfg(feature = "with-tch")]
fn build_detector(cli: &Cli) -> Result<SharedDetector> {
    use ml_core::{detector::TorchDetector, tch::Device};

    let device = if cli.cpu {
        Device::Cpu
    } else {
        Device::cuda_if_available()
    };
    let size = cli.detector_size;
    let detector = TorchDetector::new(&cli.model, device, (size, size))
        .with_context(|| format!("failed to load detector model {}", cli.model.display()))?
        .with_confidence_threshold(cli.confidence)
        .with_iou_threshold(cli.iou);
    info!(?device, model = %cli.model.display(), "Detector ready");
    Ok(traffic_density::shared_detector(detector))
}

#[cfg(not(feature = "with-tch"))]
fn build_detector(_cli: &Cli) -> Result<SharedDetector> {
    anyhow::bail!(
        "no detector backend compiled in; rebuild with `--features with-tch` to load TorchScript models"
    )
}
