use std::{
    ffi::OsString,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use anyhow::anyhow;
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, bounded};
use image::RgbImage;
use tracing::{debug, warn};

use crate::{
    backend::{FrameSink, FrameSource, SinkSpec},
    types::{CaptureError, Frame, FrameFormat, SourceInfo, WriterError},
};

/// Frames buffered between the decoder thread and the consumer.
const READER_QUEUE: usize = 2;
/// How long a freshly spawned encoder is watched for an immediate exit.
const ENCODER_STARTUP_GRACE: Duration = Duration::from_millis(150);
const ENCODER_STARTUP_POLL: Duration = Duration::from_millis(10);

/// Arguments decoding `input` to raw `rgb24` frames of exactly
/// `width`x`height` on stdout.
///
/// Autorotation is off and the output is scaled to the probed size, so each
/// frame on stdout has the stride the reader splits on.
pub fn reader_args(input: &Path, width: u32, height: u32) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostdin",
        "-noautorotate",
        "-i",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(input.as_os_str().to_owned());
    let scale = format!("scale={width}:{height}");
    args.extend(
        ["-an", "-vf", scale.as_str(), "-f", "rawvideo", "-pix_fmt", "rgb24", "-"]
            .iter()
            .map(OsString::from),
    );
    args
}

/// Arguments encoding raw `rgb24` on stdin into an MPEG-4 file.
pub fn writer_args(spec: &SinkSpec) -> Vec<OsString> {
    let size = format!("{}x{}", spec.width, spec.height);
    let rate = format!("{}", spec.fps);
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-y",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgb24",
        "-s",
        size.as_str(),
        "-r",
        rate.as_str(),
        "-i",
        "-",
        "-an",
        "-c:v",
        "mpeg4",
        "-q:v",
        "5",
        "-pix_fmt",
        "yuv420p",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(spec.path.as_os_str().to_owned());
    args
}

/// Decoder backed by an `ffmpeg` child process.
///
/// A background thread reads fixed-size frames from the child's stdout and
/// forwards them over a small bounded channel so decoding overlaps with
/// inference. Dropping the source kills the child.
pub struct FfmpegSource {
    info: SourceInfo,
    frames: Receiver<Result<Frame, CaptureError>>,
    child: Child,
}

impl FfmpegSource {
    pub fn spawn(ffmpeg: &Path, input: &Path, info: SourceInfo) -> Result<Self, CaptureError> {
        let mut child = Command::new(ffmpeg)
            .args(reader_args(input, info.width, info.height))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| CaptureError::Other(err.into()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Other(anyhow!("failed to capture ffmpeg stdout")))?;

        let (tx, rx) = bounded(READER_QUEUE);
        let frame_bytes = Frame::byte_len(info.width, info.height);
        let (width, height) = (info.width, info.height);
        thread::Builder::new()
            .name("video-decode".into())
            .spawn(move || {
                if let Err(err) = reader_loop(stdout, width, height, frame_bytes, &tx) {
                    let _ = tx.send(Err(err));
                }
            })
            .map_err(|err| CaptureError::Other(err.into()))?;

        Ok(Self {
            info,
            frames: rx,
            child,
        })
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        match self.frames.recv() {
            Ok(Ok(frame)) => Ok(Some(frame)),
            Ok(Err(err)) => Err(err),
            // Reader thread hung up at end of stream.
            Err(_) => Ok(None),
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn reader_loop(
    mut stdout: impl Read,
    width: u32,
    height: u32,
    frame_bytes: usize,
    tx: &Sender<Result<Frame, CaptureError>>,
) -> Result<(), CaptureError> {
    loop {
        let mut buffer = vec![0u8; frame_bytes];
        let filled = read_full(&mut stdout, &mut buffer).map_err(|e| CaptureError::Other(e.into()))?;
        if filled == 0 {
            return Ok(());
        }
        if filled < frame_bytes {
            return Err(CaptureError::Truncated {
                expected: frame_bytes,
                got: filled,
            });
        }

        let frame = Frame {
            data: buffer,
            width,
            height,
            timestamp_ms: Utc::now().timestamp_millis(),
            format: FrameFormat::Rgb8,
        };
        if tx.send(Ok(frame)).is_err() {
            return Ok(());
        }
    }
}

/// Read until `buf` is full or the stream ends, returning the bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

/// Encoder backed by an `ffmpeg` child process reading raw frames on stdin.
///
/// Frames are written whole; closing stdin lets ffmpeg finalise the file, so
/// everything written before a stop is kept.
pub struct FfmpegSink {
    path: PathBuf,
    size: (u32, u32),
    stdin: Option<ChildStdin>,
    child: Child,
}

impl FfmpegSink {
    pub fn spawn(ffmpeg: &Path, spec: &SinkSpec) -> Result<Self, WriterError> {
        let create_err = |source: io::Error| WriterError::Create {
            path: spec.path.clone(),
            source,
        };
        let mut child = Command::new(ffmpeg)
            .args(writer_args(spec))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(create_err)?;
        let stdin = child.stdin.take().ok_or_else(|| {
            create_err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "failed to capture ffmpeg stdin",
            ))
        })?;

        if let Some(status) = wait_for_early_exit(&mut child)? {
            return Err(create_err(io::Error::other(format!(
                "encoder exited during startup with {status}"
            ))));
        }

        debug!(path = %spec.path.display(), width = spec.width, height = spec.height, fps = spec.fps, "encoder started");
        Ok(Self {
            path: spec.path.clone(),
            size: (spec.width, spec.height),
            stdin: Some(stdin),
            child,
        })
    }

    fn close(&mut self) -> Result<(), WriterError> {
        drop(self.stdin.take());
        let status = self.child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(WriterError::Encoder {
                status: status.to_string(),
            })
        }
    }
}

/// Give the encoder a moment to fail on its output before any frame is
/// decoded. `Some` carries the exit status of an encoder that already quit.
fn wait_for_early_exit(child: &mut Child) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + ENCODER_STARTUP_GRACE;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(ENCODER_STARTUP_POLL);
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), WriterError> {
        if frame.dimensions() != self.size {
            return Err(WriterError::FrameSize {
                expected: self.size,
                got: frame.dimensions(),
            });
        }
        let stdin = self.stdin.as_mut().ok_or(WriterError::Closed)?;
        stdin.write_all(frame.as_raw())?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<(), WriterError> {
        self.close()
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            if let Err(err) = self.close() {
                warn!("encoder for {} did not exit cleanly: {err}", self.path.display());
            }
        }
    }
}
