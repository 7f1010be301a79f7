//! Media probing.
//!
//! [`MediaProbe`] is the seam between the classifier and whatever extracts
//! stream properties from a container. [`FfprobeProbe`] is the production
//! implementation and shells out to `ffprobe`.

use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

/// Errors raised while probing a single file.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    #[error("ffprobe failed: {0}")]
    ExecutionFailed(String),
    #[error("Not a media file ({mime}): {}", path.display())]
    NotMedia { path: PathBuf, mime: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Stream properties as reported by the probe, before any derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProps {
    /// `-1` when no video stream was found.
    pub width: i32,
    /// `-1` when no video stream was found.
    pub height: i32,
    /// Display-matrix rotation in degrees.
    pub rotation: i32,
    /// Frame rate expression such as `30000/1001`.
    pub frame_rate: String,
    pub video_bitrate_bps: u64,
    pub audio_bitrate_bps: u64,
    pub duration_secs: f64,
    pub codec_name: String,
}

impl Default for RawProps {
    fn default() -> Self {
        Self {
            width: -1,
            height: -1,
            rotation: 0,
            frame_rate: "0".to_string(),
            video_bitrate_bps: 0,
            audio_bitrate_bps: 0,
            duration_secs: 0.0,
            codec_name: "unknown".to_string(),
        }
    }
}

/// Extracts properties and keyframe positions from a media file.
///
/// Implementations are called from worker threads.
pub trait MediaProbe: Send + Sync {
    fn analyze(&self, path: &Path) -> Result<RawProps, ProbeError>;

    /// Keyframe timestamps (seconds) within the first `window_secs` of the file.
    fn keyframe_timestamps(&self, path: &Path, window_secs: f64) -> Result<Vec<f64>, ProbeError>;
}

/// [`MediaProbe`] backed by the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    ffprobe_path: PathBuf,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeProbe {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Returns true if the configured binary can be executed.
    pub fn is_available(&self) -> bool {
        Command::new(&self.ffprobe_path)
            .arg("-version")
            .output()
            .is_ok()
    }

    fn run_json(&self, args: &[&str], path: &Path) -> Result<Value, ProbeError> {
        let output = Command::new(&self.ffprobe_path)
            .args(args)
            .arg("--")
            .arg(path)
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    ProbeError::ToolNotFound(self.ffprobe_path.display().to_string())
                }
                _ => ProbeError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!(
                    "could not analyze {} (exit code: {:?})",
                    path.display(),
                    output.status.code()
                )
            } else {
                format!("{}: {}", path.display(), stderr.trim())
            };
            return Err(ProbeError::ExecutionFailed(message));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| ProbeError::Parse(e.to_string()))
    }
}

impl MediaProbe for FfprobeProbe {
    fn analyze(&self, path: &Path) -> Result<RawProps, ProbeError> {
        // Skip the process spawn for files that are clearly not media.
        if let Ok(Some(kind)) = infer::get_from_path(path)
            && !matches!(
                kind.matcher_type(),
                infer::MatcherType::Video | infer::MatcherType::Audio
            )
        {
            return Err(ProbeError::NotMedia {
                path: path.to_path_buf(),
                mime: kind.mime_type().to_string(),
            });
        }

        debug!(path = %path.display(), "probing streams");
        let json = self.run_json(
            &[
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ],
            path,
        )?;
        Ok(parse_probe_json(&json))
    }

    fn keyframe_timestamps(&self, path: &Path, window_secs: f64) -> Result<Vec<f64>, ProbeError> {
        debug!(path = %path.display(), window_secs, "probing keyframes");
        let interval = format!("%+{}", window_secs);
        let json = self.run_json(
            &[
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-skip_frame",
                "nokey",
                "-show_entries",
                "frame=pts_time",
                "-read_intervals",
                &interval,
                "-of",
                "json",
            ],
            path,
        )?;
        Ok(parse_keyframe_json(&json))
    }
}

/// Converts `ffprobe -show_streams -show_format` JSON into [`RawProps`].
///
/// Missing streams or fields fall back to the [`RawProps::default`] values.
pub fn parse_probe_json(json: &Value) -> RawProps {
    let defaults = RawProps::default();
    let empty = Vec::new();
    let streams = json["streams"].as_array().unwrap_or(&empty);

    let is_video = |s: &&Value| s["codec_type"].as_str() == Some("video");
    let video = streams
        .iter()
        .filter(is_video)
        .find(|s| s.get("bit_rate").is_some())
        .or_else(|| streams.iter().find(is_video));
    let audio = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("audio"));

    let Some(video) = video else {
        return RawProps {
            audio_bitrate_bps: audio.and_then(stream_bitrate).unwrap_or(0),
            ..defaults
        };
    };

    let duration_secs = number_field(&video["duration"])
        .or_else(|| number_field(&json["format"]["duration"]))
        .unwrap_or(0.0);

    RawProps {
        width: video["width"].as_i64().map_or(defaults.width, |w| w as i32),
        height: video["height"].as_i64().map_or(defaults.height, |h| h as i32),
        rotation: rotation(video),
        frame_rate: video["r_frame_rate"]
            .as_str()
            .unwrap_or(defaults.frame_rate.as_str())
            .to_string(),
        video_bitrate_bps: stream_bitrate(video).unwrap_or(0),
        audio_bitrate_bps: audio.and_then(stream_bitrate).unwrap_or(0),
        duration_secs,
        codec_name: video["codec_name"]
            .as_str()
            .unwrap_or(defaults.codec_name.as_str())
            .to_string(),
    }
}

/// Extracts `frames[].pts_time` from a keyframe probe.
pub fn parse_keyframe_json(json: &Value) -> Vec<f64> {
    json["frames"]
        .as_array()
        .map(|frames| {
            frames
                .iter()
                .filter_map(|f| number_field(&f["pts_time"]))
                .collect()
        })
        .unwrap_or_default()
}

/// Evaluates a frame-rate expression like `30000/1001` or `25`.
///
/// Returns 0.0 for malformed input or a zero denominator.
pub fn parse_frame_rate(expr: &str) -> f64 {
    let expr = expr.trim();
    match expr.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().unwrap_or(0.0);
            let den: f64 = den.trim().parse().unwrap_or(0.0);
            if den == 0.0 { 0.0 } else { num / den }
        }
        None => expr.parse().unwrap_or(0.0),
    }
}

/// ffprobe prints most numbers as strings.
fn number_field(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn stream_bitrate(stream: &Value) -> Option<u64> {
    number_field(&stream["bit_rate"])
        // Matroska keeps per-stream bitrate in the statistics tags.
        .or_else(|| number_field(&stream["tags"]["BPS"]))
        .map(|bps| bps as u64)
}

fn rotation(video: &Value) -> i32 {
    let from_matrix = video["side_data_list"].as_array().and_then(|list| {
        list.iter()
            .filter(|d| d["side_data_type"].as_str() == Some("Display Matrix"))
            .find_map(|d| number_field(&d["rotation"]))
    });

    from_matrix
        .or_else(|| number_field(&video["tags"]["rotate"]))
        .map_or(0, |r| r as i32)
}
