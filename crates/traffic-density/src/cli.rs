use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Estimate traffic density from an image or video and derive green time.
#[derive(Debug, Parser)]
#[command(name = "traffic-density", version)]
pub struct Cli {
    /// TorchScript YOLO model exported with `format=torchscript`.
    #[arg(long, global = true, default_value = "models/best.torchscript")]
    pub model: PathBuf,

    /// JSON file overriding the built-in configuration.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for annotated video output.
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Force CPU inference even when CUDA is available.
    #[arg(long, global = true)]
    pub cpu: bool,

    /// Enable debug logging (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Square detector input size in pixels.
    #[arg(long, global = true, default_value_t = 640)]
    pub detector_size: u32,

    /// Minimum detection confidence.
    #[arg(long, global = true, default_value_t = 0.25)]
    pub confidence: f32,

    /// Overlap above which same-class boxes are merged.
    #[arg(long, global = true, default_value_t = 0.45)]
    pub iou: f32,

    /// Write a Prometheus text snapshot of the run's metrics here on exit.
    #[arg(long, global = true)]
    pub metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Count vehicles in a single image.
    Image {
        path: PathBuf,
        /// Also write the annotated image here.
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Play a video, annotating and encoding every frame.
    Video { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_image_command_with_globals() {
        let cli = Cli::try_parse_from([
            "traffic-density",
            "image",
            "junction.jpg",
            "--save",
            "out.png",
            "--cpu",
            "--confidence",
            "0.4",
            "--metrics-file",
            "metrics.prom",
        ])
        .expect("arguments parse");
        assert!(cli.cpu);
        assert_eq!(cli.confidence, 0.4);
        assert_eq!(cli.detector_size, 640);
        assert_eq!(cli.iou, 0.45);
        assert_eq!(cli.metrics_file, Some(PathBuf::from("metrics.prom")));
        match cli.command {
            Command::Image { path, save } => {
                assert_eq!(path, PathBuf::from("junction.jpg"));
                assert_eq!(save, Some(PathBuf::from("out.png")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn video_requires_a_path() {
        assert!(Cli::try_parse_from(["traffic-density", "video"]).is_err());
    }
}
