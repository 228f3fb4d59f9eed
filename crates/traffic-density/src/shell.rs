//! Headless presentation shell.
//!
//! Stands in for a GUI: prints the count and timing for each result,
//! reports progress, and forwards play/pause and exit commands to the run.
//! All pipeline output reaches it as events, so nothing here runs on the
//! pipeline thread.

use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, never, select};
use tracing::{info, warn};

use crate::{
    pipeline::{FrameUpdate, VideoSummary},
    runner::{PipelineEvent, VideoRunner},
    still::ImagePipeline,
    timing::TimingResult,
};

/// How long exit waits for the run thread before tearing down anyway.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShellCommand {
    TogglePlayback,
    Exit,
}

impl ShellCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" | "play" => Some(ShellCommand::TogglePlayback),
            "q" | "quit" | "exit" => Some(ShellCommand::Exit),
            _ => None,
        }
    }
}

/// Forward commands typed on `input` until it closes.
pub fn spawn_command_reader<R>(input: R, commands: Sender<ShellCommand>) -> Result<()>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("shell-input".into())
        .spawn(move || {
            for line in input.lines() {
                let Ok(line) = line else { break };
                match ShellCommand::parse(&line) {
                    Some(command) => {
                        if commands.send(command).is_err() {
                            break;
                        }
                    }
                    None => warn!("Unknown command {line:?}; use 'p' to play/pause or 'q' to quit"),
                }
            }
        })
        .context("failed to spawn shell input thread")?;
    Ok(())
}

fn write_timing(out: &mut impl Write, timing: &TimingResult) -> Result<()> {
    writeln!(
        out,
        "Vehicle Count: {}\nGreen Signal Time: {} seconds",
        timing.vehicle_count, timing.green_seconds
    )?;
    Ok(())
}

/// Process one image and print its result, optionally saving the annotated
/// frame. Nothing is written when the image fails to load.
pub fn show_image(
    pipeline: &ImagePipeline,
    path: &Path,
    save_to: Option<&Path>,
    out: &mut impl Write,
) -> Result<TimingResult> {
    let outcome = pipeline
        .process_image(path)
        .with_context(|| format!("failed to process image {}", path.display()))?;
    write_timing(out, &outcome.timing)?;

    if let Some(target) = save_to {
        outcome
            .save_annotated(target)
            .with_context(|| format!("failed to save annotated image to {}", target.display()))?;
        writeln!(out, "Annotated image saved to {}", target.display())?;
    }
    Ok(outcome.timing)
}

enum Step {
    Event(Option<PipelineEvent>),
    Command(Option<ShellCommand>),
}

/// Drive one video run until it ends or the operator exits.
///
/// Returns `None` when the run thread did not acknowledge the stop in time.
pub fn play_video(
    runner: &VideoRunner,
    source: PathBuf,
    sink: PathBuf,
    commands: &Receiver<ShellCommand>,
    out: &mut impl Write,
) -> Result<Option<VideoSummary>> {
    let handle = runner
        .start(source.clone(), sink)
        .with_context(|| format!("failed to start video run for {}", source.display()))?;
    writeln!(out, "Playing {} ('p' play/pause, 'q' quit)", source.display())?;

    let mut commands_open = true;
    let mut last_whole_percent: i64 = -1;
    loop {
        let command_rx = if commands_open {
            commands.clone()
        } else {
            never()
        };
        let step = select! {
            recv(handle.events()) -> event => Step::Event(event.ok()),
            recv(command_rx) -> command => Step::Command(command.ok()),
        };

        match step {
            Step::Event(Some(PipelineEvent::Frame(update))) => show_frame(out, &update)?,
            Step::Event(Some(PipelineEvent::Progress(percent))) => {
                let whole = percent.floor() as i64;
                if whole > last_whole_percent {
                    last_whole_percent = whole;
                    writeln!(out, "Progress: {whole}%")?;
                }
            }
            Step::Event(None) => break,
            Step::Command(Some(ShellCommand::TogglePlayback)) => {
                let mode = handle.toggle();
                writeln!(out, "Playback {}", mode.label())?;
            }
            Step::Command(Some(ShellCommand::Exit)) => {
                info!("Exit requested, stopping video run");
                return match handle.stop(STOP_TIMEOUT) {
                    Some(result) => {
                        let summary = result?;
                        write_summary(out, &summary)?;
                        Ok(Some(summary))
                    }
                    None => Ok(None),
                };
            }
            // Input closed; keep playing to the end.
            Step::Command(None) => commands_open = false,
        }
    }

    let summary = handle.join()?;
    write_summary(out, &summary)?;
    Ok(Some(summary))
}

fn show_frame(out: &mut impl Write, update: &FrameUpdate) -> Result<()> {
    writeln!(
        out,
        "Frame {}: Vehicle Count: {} | Green Signal Time: {} seconds",
        update.frame_number, update.timing.vehicle_count, update.timing.green_seconds
    )?;
    Ok(())
}

fn write_summary(out: &mut impl Write, summary: &VideoSummary) -> Result<()> {
    writeln!(
        out,
        "Processed {} frame(s){}; annotated video saved to {}",
        summary.frames_processed,
        if summary.stopped_early {
            " before stop"
        } else {
            ""
        },
        summary.output_path.display()
    )?;
    if summary.frames_skipped > 0 {
        writeln!(out, "Skipped {} frame(s) after detector errors", summary.frames_skipped)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(ShellCommand::parse("p"), Some(ShellCommand::TogglePlayback));
        assert_eq!(ShellCommand::parse(" Pause \n"), Some(ShellCommand::TogglePlayback));
        assert_eq!(ShellCommand::parse("q"), Some(ShellCommand::Exit));
        assert_eq!(ShellCommand::parse("EXIT"), Some(ShellCommand::Exit));
        assert_eq!(ShellCommand::parse("rewind"), None);
    }

    #[test]
    fn command_reader_forwards_known_lines() {
        let (tx, rx) = crossbeam_channel::unbounded();
        spawn_command_reader(std::io::Cursor::new("p\nbogus\nq\n"), tx).expect("reader spawns");
        let received: Vec<ShellCommand> = rx.iter().collect();
        assert_eq!(
            received,
            vec![ShellCommand::TogglePlayback, ShellCommand::Exit]
        );
    }
}
