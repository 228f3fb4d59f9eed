//! `ffprobe`-based discovery of frame size, frame count, and frame rate.

use std::{
    path::Path,
    process::{Command, Stdio},
};

use serde::Deserialize;

use crate::types::{CaptureError, SourceInfo};

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    nb_frames: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Run `ffprobe` against the first video stream of `path`.
pub fn probe_source(ffprobe: &Path, path: &Path) -> Result<SourceInfo, CaptureError> {
    let uri = path.display().to_string();
    if !path.is_file() {
        return Err(CaptureError::Open { uri });
    }

    let output = Command::new(ffprobe)
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height,nb_frames,avg_frame_rate")
        .arg("-of")
        .arg("json")
        .arg(path)
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|err| CaptureError::Probe {
            uri: uri.clone(),
            reason: format!("failed to run {}: {err}", ffprobe.display()),
        })?;

    if !output.status.success() {
        return Err(CaptureError::Probe {
            uri,
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let json = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(&json).map_err(|reason| CaptureError::Probe { uri, reason })
}

/// Parse `ffprobe -of json` output. Frame count and rate are optional since
/// many containers leave them out or report `N/A`.
pub fn parse_probe_output(json: &str) -> Result<SourceInfo, String> {
    let parsed: ProbeOutput =
        serde_json::from_str(json).map_err(|err| format!("invalid ffprobe output: {err}"))?;
    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream found".to_string())?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        other => return Err(format!("video stream has no usable size: {other:?}")),
    };

    let total_frames = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0);
    let fps = stream.avg_frame_rate.as_deref().and_then(parse_rational);

    Ok(SourceInfo {
        width,
        height,
        total_frames,
        fps,
    })
}

fn parse_rational(value: &str) -> Option<f64> {
    let (num, den) = value.split_once('/').unwrap_or((value, "1"));
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_stream() {
        let json = r#"{"programs":[],"streams":[{"width":1280,"height":720,"avg_frame_rate":"30000/1001","nb_frames":"452"}]}"#;
        let info = parse_probe_output(json).expect("valid probe");
        assert_eq!((info.width, info.height), (1280, 720));
        assert_eq!(info.total_frames, Some(452));
        let fps = info.fps.expect("fps present");
        assert!((fps - 29.97).abs() < 0.01);
    }

    #[test]
    fn missing_frame_count_is_unknown() {
        let json = r#"{"streams":[{"width":640,"height":480,"avg_frame_rate":"0/0","nb_frames":"N/A"}]}"#;
        let info = parse_probe_output(json).expect("valid probe");
        assert_eq!(info.total_frames, None);
        assert_eq!(info.fps, None);
    }

    #[test]
    fn no_stream_is_an_error() {
        assert!(parse_probe_output(r#"{"streams":[]}"#).is_err());
    }

    #[test]
    fn missing_file_fails_before_spawning() {
        let err = probe_source(Path::new("ffprobe"), Path::new("/nonexistent/clip.mp4"))
            .expect_err("missing file");
        assert!(matches!(err, CaptureError::Open { .. }));
    }
}
